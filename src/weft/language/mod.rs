//! Loaded language handles
//!
//! [`Language::load`] validates an artifact (header, version window,
//! checksum, full structural decode) and wraps the tables in an immutable,
//! reference-counted handle. Loading either returns a usable handle or a
//! single descriptive [`LoadError`], never a partially initialized handle,
//! and never a panic on untrusted bytes.
//!
//! The handle is `Clone + Send + Sync`; any number of concurrent parse
//! sessions can share one language because every table behind it is
//! read-only after construction.

pub mod session;

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use crate::weft::artifact::reader::decode;
use crate::weft::artifact::{Artifact, LoadError};
use crate::weft::grammar::{Production, Symbol, SymbolId, SymbolKind};
use crate::weft::tables::Action;

pub use session::{Node, ParseError, Session, Tree};

/// Decoded tables plus pre-compiled token matchers
pub(crate) struct LanguageData {
    pub name: String,
    pub version: u32,
    pub glr: bool,
    pub start: SymbolId,
    pub terminal_count: u32,
    pub symbols: Vec<Symbol>,
    pub productions: Vec<Production>,
    pub actions: Vec<BTreeMap<SymbolId, Vec<Action>>>,
    pub gotos: Vec<BTreeMap<SymbolId, u32>>,
    /// Anchored regex per pattern terminal, indexed by symbol
    pub matchers: Vec<Option<Regex>>,
}

/// An immutable, shareable, validated grammar handle
#[derive(Clone)]
pub struct Language {
    pub(crate) data: Arc<LanguageData>,
}

impl Language {
    /// Load and validate an artifact from raw bytes.
    pub fn load(bytes: &[u8]) -> Result<Language, LoadError> {
        let decoded = decode(bytes)?;

        let mut matchers = Vec::with_capacity(decoded.symbols.len());
        for symbol in &decoded.symbols {
            let matcher = match &symbol.kind {
                SymbolKind::Pattern(pattern) => {
                    let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|err| {
                        LoadError::corrupt(format!(
                            "token `{}` has an invalid pattern: {}",
                            symbol.name, err
                        ))
                    })?;
                    Some(regex)
                }
                _ => None,
            };
            matchers.push(matcher);
        }

        Ok(Language {
            data: Arc::new(LanguageData {
                name: decoded.name,
                version: decoded.version,
                glr: decoded.glr,
                start: decoded.start,
                terminal_count: decoded.terminal_count,
                symbols: decoded.symbols,
                productions: decoded.productions,
                actions: decoded.actions,
                gotos: decoded.gotos,
                matchers,
            }),
        })
    }

    /// Load from an in-memory [`Artifact`].
    pub fn load_artifact(artifact: &Artifact) -> Result<Language, LoadError> {
        Self::load(artifact.bytes())
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Format version the artifact was written with
    pub fn version(&self) -> u32 {
        self.data.version
    }

    pub fn glr(&self) -> bool {
        self.data.glr
    }

    pub fn symbol_count(&self) -> u32 {
        self.data.symbols.len() as u32
    }

    pub fn state_count(&self) -> u32 {
        self.data.actions.len() as u32
    }

    /// Name of a symbol by id
    pub fn symbol_name(&self, symbol: SymbolId) -> Option<&str> {
        self.data
            .symbols
            .get(symbol as usize)
            .map(|s| s.name.as_str())
    }

    /// Id of a symbol by name
    pub fn symbol_id(&self, name: &str) -> Option<SymbolId> {
        self.data
            .symbols
            .iter()
            .position(|s| s.name == name)
            .map(|index| index as SymbolId)
    }

    /// Names of the node kinds this language can produce: visible terminals
    /// and visible rules, skipping synthesized and skip symbols
    pub fn node_kinds(&self) -> impl Iterator<Item = &str> {
        self.data
            .symbols
            .iter()
            .filter(|s| !s.hidden && !s.skip)
            .map(|s| s.name.as_str())
    }

    /// Create a parse session against this language.
    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }
}

impl std::fmt::Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.data.name)
            .field("version", &self.data.version)
            .field("states", &self.data.actions.len())
            .field("symbols", &self.data.symbols.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::compile;
    use crate::weft::grammar::GrammarDescription;

    fn language_for(dsl: &str) -> Language {
        let artifact = compile(&GrammarDescription::from_dsl(dsl).unwrap()).unwrap();
        Language::load(artifact.bytes()).unwrap()
    }

    #[test]
    fn test_handle_exposes_symbols() {
        let language = language_for("grammar g\ntoken x = \"x\"\nrule s = x");
        assert!(language.symbol_count() > 0);
        assert_eq!(language.name(), "g");
        let kinds: Vec<&str> = language.node_kinds().collect();
        assert!(kinds.contains(&"s"));
        assert!(kinds.contains(&"x"));
        assert!(!kinds.contains(&"$accept"));
        let s = language.symbol_id("s").unwrap();
        assert_eq!(language.symbol_name(s), Some("s"));
    }

    #[test]
    fn test_handle_is_cheaply_cloneable() {
        let language = language_for("token x = \"x\"\nrule s = x");
        let clone = language.clone();
        assert!(Arc::ptr_eq(&language.data, &clone.data));
    }
}
