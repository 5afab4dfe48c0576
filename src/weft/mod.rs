//! Top-level module wiring the compilation pipeline together.
//!
//! The submodules follow the data flow: `grammar` builds a validated IR from
//! a declarative description, `tables` compiles the IR into an LR(1) parse
//! table, `artifact` serializes and reads back the versioned byte artifact,
//! `language` loads artifacts into immutable handles, and `scanner` defines
//! the external-scanner capability injected into parse sessions.

pub mod artifact;
pub mod grammar;
pub mod language;
pub mod scanner;
pub mod tables;

use std::fmt;

use crate::weft::artifact::{encode, Artifact};
use crate::weft::grammar::{build_ir, GrammarDefinitionError, GrammarDescription};
use crate::weft::tables::{compile_tables, ConflictRecord, UnresolvedConflictError};

/// Errors that abort grammar compilation
///
/// Both variants carry the complete diagnostic list for their stage; the
/// compiler never surfaces a partial result alongside an error.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The grammar description is malformed or inconsistent
    Definition(Vec<GrammarDefinitionError>),
    /// The grammar is ambiguous and GLR mode is not enabled
    Conflicts(Vec<UnresolvedConflictError>),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Definition(errors) => {
                write!(f, "grammar definition failed with {} error(s):", errors.len())?;
                for err in errors {
                    write!(f, "\n  {}", err)?;
                }
                Ok(())
            }
            CompileError::Conflicts(errors) => {
                write!(f, "table construction failed with {} conflict(s):", errors.len())?;
                for err in errors {
                    write!(f, "\n  {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile a grammar description into a serialized artifact.
///
/// Convenience wrapper over [`compile_with_diagnostics`] for callers that do
/// not care about resolved-conflict diagnostics.
pub fn compile(description: &GrammarDescription) -> Result<Artifact, CompileError> {
    compile_with_diagnostics(description).map(|(artifact, _)| artifact)
}

/// Compile a grammar description, returning the artifact together with the
/// list of conflicts the table compiler encountered and resolved.
///
/// Unresolved conflicts abort compilation with [`CompileError::Conflicts`];
/// resolved ones are reported so grammar authors can audit how ambiguity was
/// settled (precedence, associativity, declaration order, or a GLR branch).
pub fn compile_with_diagnostics(
    description: &GrammarDescription,
) -> Result<(Artifact, Vec<ConflictRecord>), CompileError> {
    let ir = build_ir(description).map_err(CompileError::Definition)?;
    let (table, diagnostics) = compile_tables(&ir).map_err(CompileError::Conflicts)?;
    Ok((encode(&ir, &table), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display_lists_every_definition_error() {
        let err = CompileError::Definition(vec![
            GrammarDefinitionError::new("a", "undefined symbol `b`"),
            GrammarDefinitionError::new("a", "undefined symbol `c`"),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("2 error(s)"));
        assert!(rendered.contains("`b`"));
        assert!(rendered.contains("`c`"));
    }
}
