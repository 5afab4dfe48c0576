//! Validated intermediate representation
//!
//! Symbols are interned into a single index space: terminals first (index 0
//! is the synthesized end-of-input marker), then non-terminals (the
//! synthesized augmented start symbol comes last). Rule expressions are
//! flattened into plain productions; repetition, optionality, and nested
//! groups become hidden auxiliary rules with `$`-suffixed names that user
//! grammars cannot collide with.

use crate::weft::grammar::ast::Precedence;

/// Index into [`GrammarIr::symbols`]
pub type SymbolId = u32;

/// End-of-input terminal; always symbol 0
pub const EOF: SymbolId = 0;

/// What a symbol is and how terminals match input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Eof,
    Literal(String),
    Pattern(String),
    External,
    NonTerminal,
}

/// One interned symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub hidden: bool,
    pub skip: bool,
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, SymbolKind::NonTerminal)
    }
}

/// A flattened production `lhs -> rhs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    /// Declaration index of the originating rule; auxiliary productions
    /// inherit the index of the rule they were desugared from
    pub rule_index: u32,
    pub prec: Option<Precedence>,
}

/// Validated grammar, ready for table compilation
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarIr {
    pub name: String,
    /// Terminals occupy `0..terminal_count`, non-terminals the rest
    pub symbols: Vec<Symbol>,
    pub terminal_count: u32,
    /// Production 0 is the augmented start production `$accept -> start`
    pub productions: Vec<Production>,
    /// The user-declared start non-terminal
    pub start: SymbolId,
    /// The synthesized augmented start non-terminal (last symbol)
    pub accept: SymbolId,
    /// Declared rule names in declaration order, for diagnostics
    pub rule_names: Vec<String>,
    pub glr: bool,
}

impl GrammarIr {
    pub fn is_terminal(&self, symbol: SymbolId) -> bool {
        symbol < self.terminal_count
    }

    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        &self.symbols[symbol as usize].name
    }

    /// Name of the rule a production was declared in
    pub fn rule_name(&self, production: usize) -> &str {
        let index = self.productions[production].rule_index as usize;
        self.rule_names
            .get(index)
            .map(|name| name.as_str())
            .unwrap_or("$accept")
    }
}
