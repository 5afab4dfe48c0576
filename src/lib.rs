//! # weft
//!
//! A grammar compiler and parse-table loader for markup languages.
//!
//! The crate turns a declarative grammar description (rules, precedence,
//! token definitions, external lexical hooks) into a compact, versioned
//! parse-table artifact, and loads such artifacts back into an immutable
//! `Language` handle after validating binary compatibility.
//!
//! Pipeline
//!
//! ```text
//! description (.wg / .json / .yaml)
//!   -> grammar::GrammarDescription      declarative form
//!   -> grammar::GrammarIr               validated, interned, flattened
//!   -> tables::ParseTable               LR(1) automaton, conflicts resolved
//!   -> artifact::Artifact               versioned byte layout + checksum
//!   -> language::Language               loaded, validated, shareable handle
//! ```
//!
//! The handle hands out parse sessions; a session can carry an external
//! scanner for context-sensitive tokens (raw text inside markup tags and the
//! like). Incremental re-parsing is out of scope: sessions run a batch
//! table-driven driver, enough to exercise every compiled table end to end.

pub mod weft;
