//! Declarative grammar description
//!
//! `GrammarDescription` is the input to the compiler. It can be produced
//! three equivalent ways: parsed from the textual DSL (`.wg` files), or
//! deserialized from JSON or YAML. All three forms round-trip through the
//! same serde-derived structures, so programmatic construction works too.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// How a terminal symbol matches input text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Exact string match
    Literal(String),
    /// Regular-expression match, anchored at the current position
    Pattern(String),
}

/// A named terminal symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescription {
    pub name: String,
    pub kind: TokenKind,
    /// Skip tokens are consumed between meaningful tokens and never appear
    /// in the parse tree (whitespace, comments)
    #[serde(default)]
    pub skip: bool,
}

/// Associativity of a precedence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assoc {
    Left,
    Right,
    NonAssoc,
}

/// Explicit precedence attached to a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precedence {
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assoc: Option<Assoc>,
}

/// Body expression of a grammar rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleExpr {
    /// Reference to a token, external token, or rule by name
    Symbol(String),
    /// Inline literal; creates (or reuses) an anonymous literal token
    Literal(String),
    Seq(Vec<RuleExpr>),
    Choice(Vec<RuleExpr>),
    Optional(Box<RuleExpr>),
    Repeat(Box<RuleExpr>),
    Repeat1(Box<RuleExpr>),
}

/// A named production rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescription {
    pub name: String,
    /// Hidden rules do not produce tree nodes; their children are spliced
    /// into the parent node
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prec: Option<Precedence>,
    pub expr: RuleExpr,
}

/// A complete declarative grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarDescription {
    pub name: String,
    /// Start rule; defaults to the first declared rule when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Opt in to GLR branching for conflicts that survive precedence,
    /// associativity, and declaration-order resolution
    #[serde(default)]
    pub glr: bool,
    #[serde(default)]
    pub tokens: Vec<TokenDescription>,
    /// Terminals recognized by an external scanner instead of the built-in
    /// lexer
    #[serde(default)]
    pub externals: Vec<String>,
    pub rules: Vec<RuleDescription>,
}

/// Errors reading a grammar description from text or disk
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarSourceError {
    /// Unreadable character in the DSL source
    Lex { offset: usize, message: String },
    /// DSL syntax error
    Parse { offset: usize, message: String },
    Json(String),
    Yaml(String),
    Io(String),
    /// File extension does not identify a supported description format
    UnknownFormat(String),
}

impl fmt::Display for GrammarSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarSourceError::Lex { offset, message } => {
                write!(f, "lex error at byte {}: {}", offset, message)
            }
            GrammarSourceError::Parse { offset, message } => {
                write!(f, "syntax error at byte {}: {}", offset, message)
            }
            GrammarSourceError::Json(msg) => write!(f, "invalid JSON grammar: {}", msg),
            GrammarSourceError::Yaml(msg) => write!(f, "invalid YAML grammar: {}", msg),
            GrammarSourceError::Io(msg) => write!(f, "IO error: {}", msg),
            GrammarSourceError::UnknownFormat(ext) => {
                write!(f, "unknown grammar format `{}` (expected wg, json, or yaml)", ext)
            }
        }
    }
}

impl std::error::Error for GrammarSourceError {}

impl From<std::io::Error> for GrammarSourceError {
    fn from(err: std::io::Error) -> Self {
        GrammarSourceError::Io(err.to_string())
    }
}

impl GrammarDescription {
    /// Parse a description from the textual DSL.
    pub fn from_dsl(source: &str) -> Result<Self, GrammarSourceError> {
        crate::weft::grammar::parser::parse_dsl(source)
    }

    /// Deserialize a description from JSON.
    pub fn from_json(source: &str) -> Result<Self, GrammarSourceError> {
        serde_json::from_str(source).map_err(|e| GrammarSourceError::Json(e.to_string()))
    }

    /// Deserialize a description from YAML.
    pub fn from_yaml(source: &str) -> Result<Self, GrammarSourceError> {
        serde_yaml::from_str(source).map_err(|e| GrammarSourceError::Yaml(e.to_string()))
    }

    /// Load a description from disk, picking the format by file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, GrammarSourceError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "wg" => Self::from_dsl(&source),
            "json" => Self::from_json(&source),
            "yaml" | "yml" => Self::from_yaml(&source),
            other => Err(GrammarSourceError::UnknownFormat(other.to_string())),
        }
    }
}
