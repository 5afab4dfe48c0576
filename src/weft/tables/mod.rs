//! Parse-table compilation
//!
//! Turns validated IR into a deterministic (or explicitly GLR) LR(1) parse
//! table. Construction is a purely functional batch transform: state
//! discovery follows a fixed canonical order, and conflict resolution is a
//! pure comparator, so the same IR always compiles to the same table.

pub mod builder;
pub mod conflicts;
pub mod first;
pub mod items;

pub use builder::{compile_tables, Action, ParseTable};
pub use conflicts::{ConflictRecord, Resolution, UnresolvedConflictError};
