//! Artifact decoder
//!
//! Reads the byte layout back into table structures, treating the input as
//! untrusted: every length, index, and tag is bounds-checked, and any
//! malformed content fails with `CorruptArtifact` instead of panicking.
//! Validation order follows the loader contract: header first, then the
//! version window, then the checksum, then the full structural decode.

use std::collections::BTreeMap;

use crate::weft::artifact::checksum::fnv1a64;
use crate::weft::artifact::layout::{
    ACTION_ACCEPT, ACTION_REDUCE, ACTION_SHIFT, ASSOC_LEFT, ASSOC_NONASSOC, ASSOC_NONE,
    ASSOC_RIGHT, FLAG_HIDDEN, FLAG_SKIP, FORMAT_VERSION, HEADER_LEN, KIND_EOF, KIND_EXTERNAL,
    KIND_LITERAL, KIND_NONTERMINAL, KIND_PATTERN, MIN_SUPPORTED_VERSION,
};
use crate::weft::artifact::LoadError;
use crate::weft::grammar::{Assoc, Precedence, Production, Symbol, SymbolId, SymbolKind};
use crate::weft::tables::Action;

/// Fully decoded artifact contents, not yet wrapped in a handle
#[derive(Debug)]
pub(crate) struct DecodedArtifact {
    pub version: u32,
    pub name: String,
    pub glr: bool,
    pub start: SymbolId,
    pub terminal_count: u32,
    pub symbols: Vec<Symbol>,
    pub productions: Vec<Production>,
    pub actions: Vec<BTreeMap<SymbolId, Vec<Action>>>,
    pub gotos: Vec<BTreeMap<SymbolId, u32>>,
}

pub(crate) fn decode(bytes: &[u8]) -> Result<DecodedArtifact, LoadError> {
    if bytes.len() < HEADER_LEN {
        return Err(LoadError::corrupt(format!(
            "artifact is {} byte(s), too short to hold a header",
            bytes.len()
        )));
    }

    let version = read_header_u32(bytes, 0);
    if !(MIN_SUPPORTED_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(LoadError::IncompatibleVersion {
            found: version,
            min: MIN_SUPPORTED_VERSION,
            max: FORMAT_VERSION,
        });
    }

    let state_count = read_header_u32(bytes, 4);
    let symbol_count = read_header_u32(bytes, 8);
    let stored_checksum = u64::from_le_bytes(
        bytes[12..20].try_into().unwrap_or([0; 8]),
    );
    let body = &bytes[HEADER_LEN..];
    if fnv1a64(body) != stored_checksum {
        return Err(LoadError::corrupt("checksum mismatch over table bytes"));
    }

    let mut reader = Reader { bytes: body, pos: 0 };

    // state section
    let name = reader.read_string()?;
    let start = reader.read_u32()?;
    let glr = reader.read_u8()? != 0;

    let production_count = reader.read_u32()?;
    let mut productions = Vec::new();
    for _ in 0..production_count {
        let lhs = reader.read_u32()?;
        let rule_index = reader.read_u32()?;
        let has_prec = reader.read_u8()?;
        let level = reader.read_u32()?;
        let assoc_tag = reader.read_u8()?;
        let prec = match has_prec {
            0 => None,
            1 => Some(Precedence {
                level,
                assoc: match assoc_tag {
                    ASSOC_NONE => None,
                    ASSOC_LEFT => Some(Assoc::Left),
                    ASSOC_RIGHT => Some(Assoc::Right),
                    ASSOC_NONASSOC => Some(Assoc::NonAssoc),
                    other => {
                        return Err(LoadError::corrupt(format!(
                            "unknown associativity tag {}",
                            other
                        )))
                    }
                },
            }),
            other => {
                return Err(LoadError::corrupt(format!(
                    "unknown precedence flag {}",
                    other
                )))
            }
        };
        let rhs_len = reader.read_u32()?;
        let mut rhs = Vec::new();
        for _ in 0..rhs_len {
            rhs.push(reader.read_u32()?);
        }
        productions.push(Production {
            lhs,
            rhs,
            rule_index,
            prec,
        });
    }

    let mut actions = Vec::new();
    let mut gotos = Vec::new();
    for _ in 0..state_count {
        let mut action_row = BTreeMap::new();
        let entry_count = reader.read_u32()?;
        for _ in 0..entry_count {
            let terminal = reader.read_u32()?;
            let action_count = reader.read_u8()?;
            if action_count == 0 {
                return Err(LoadError::corrupt("empty action cell"));
            }
            let mut cell = Vec::new();
            for _ in 0..action_count {
                let tag = reader.read_u8()?;
                let payload = reader.read_u32()?;
                cell.push(match tag {
                    ACTION_SHIFT => Action::Shift(payload),
                    ACTION_REDUCE => Action::Reduce(payload),
                    ACTION_ACCEPT => Action::Accept,
                    other => {
                        return Err(LoadError::corrupt(format!("unknown action tag {}", other)))
                    }
                });
            }
            action_row.insert(terminal, cell);
        }
        let goto_count = reader.read_u32()?;
        let mut goto_row = BTreeMap::new();
        for _ in 0..goto_count {
            let non_terminal = reader.read_u32()?;
            let target = reader.read_u32()?;
            goto_row.insert(non_terminal, target);
        }
        actions.push(action_row);
        gotos.push(goto_row);
    }

    // symbol section
    let terminal_count = reader.read_u32()?;
    let mut symbols = Vec::new();
    for _ in 0..symbol_count {
        let symbol_name = reader.read_string()?;
        let kind_tag = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let payload = reader.read_string()?;
        let kind = match kind_tag {
            KIND_EOF => SymbolKind::Eof,
            KIND_LITERAL => SymbolKind::Literal(payload),
            KIND_PATTERN => SymbolKind::Pattern(payload),
            KIND_EXTERNAL => SymbolKind::External,
            KIND_NONTERMINAL => SymbolKind::NonTerminal,
            other => {
                return Err(LoadError::corrupt(format!("unknown symbol kind {}", other)))
            }
        };
        symbols.push(Symbol {
            name: symbol_name,
            kind,
            hidden: flags & FLAG_HIDDEN != 0,
            skip: flags & FLAG_SKIP != 0,
        });
    }

    if reader.pos != body.len() {
        return Err(LoadError::corrupt("trailing bytes after symbol section"));
    }

    let decoded = DecodedArtifact {
        version,
        name,
        glr,
        start,
        terminal_count,
        symbols,
        productions,
        actions,
        gotos,
    };
    validate(&decoded, state_count, symbol_count)?;
    Ok(decoded)
}

/// Structural validation: every index must land inside the tables it refers
/// to, and the symbol space must be partitioned terminals-first.
fn validate(
    decoded: &DecodedArtifact,
    state_count: u32,
    symbol_count: u32,
) -> Result<(), LoadError> {
    let terminal_count = decoded.terminal_count;
    if state_count == 0 {
        return Err(LoadError::corrupt("artifact has no automaton states"));
    }
    if terminal_count > symbol_count {
        return Err(LoadError::corrupt("terminal count exceeds symbol count"));
    }
    if decoded.symbols.first().map(|s| &s.kind) != Some(&SymbolKind::Eof) {
        return Err(LoadError::corrupt("symbol 0 is not the end-of-input marker"));
    }
    for (index, symbol) in decoded.symbols.iter().enumerate() {
        let is_terminal_slot = (index as u32) < terminal_count;
        if is_terminal_slot == matches!(symbol.kind, SymbolKind::NonTerminal) {
            return Err(LoadError::corrupt(format!(
                "symbol {} is on the wrong side of the terminal partition",
                index
            )));
        }
    }

    let in_symbols = |id: SymbolId| id < symbol_count;
    let is_non_terminal = |id: SymbolId| id >= terminal_count && id < symbol_count;

    if !is_non_terminal(decoded.start) {
        return Err(LoadError::corrupt("start symbol is not a non-terminal"));
    }

    for (index, production) in decoded.productions.iter().enumerate() {
        if !is_non_terminal(production.lhs) {
            return Err(LoadError::corrupt(format!(
                "production {} has a terminal left-hand side",
                index
            )));
        }
        if production.rhs.iter().any(|&s| !in_symbols(s)) {
            return Err(LoadError::corrupt(format!(
                "production {} references an unknown symbol",
                index
            )));
        }
    }

    let production_count = decoded.productions.len() as u32;
    for (state, (action_row, goto_row)) in
        decoded.actions.iter().zip(&decoded.gotos).enumerate()
    {
        for (&terminal, cell) in action_row {
            if terminal >= terminal_count {
                return Err(LoadError::corrupt(format!(
                    "state {} has an action on a non-terminal",
                    state
                )));
            }
            for action in cell {
                match action {
                    Action::Shift(target) if *target >= state_count => {
                        return Err(LoadError::corrupt(format!(
                            "state {} shifts to unknown state {}",
                            state, target
                        )));
                    }
                    Action::Reduce(production) if *production >= production_count => {
                        return Err(LoadError::corrupt(format!(
                            "state {} reduces by unknown production {}",
                            state, production
                        )));
                    }
                    _ => {}
                }
            }
        }
        for (&non_terminal, &target) in goto_row {
            if !is_non_terminal(non_terminal) || target >= state_count {
                return Err(LoadError::corrupt(format!(
                    "state {} has an invalid goto entry",
                    state
                )));
            }
        }
    }

    Ok(())
}

fn read_header_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_or([0; 4]))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| LoadError::corrupt("unexpected end of artifact"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, LoadError> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes(slice.try_into().unwrap_or([0; 4])))
    }

    fn read_string(&mut self) -> Result<String, LoadError> {
        let len = self.read_u32()? as usize;
        let slice = self.take(len)?;
        String::from_utf8(slice.to_vec())
            .map_err(|_| LoadError::corrupt("string is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::artifact::encode;
    use crate::weft::grammar::{build_ir, GrammarDescription};
    use crate::weft::tables::compile_tables;

    fn sample_bytes() -> Vec<u8> {
        let ir = build_ir(
            &GrammarDescription::from_dsl("token x = \"x\"\nrule s = x").unwrap(),
        )
        .unwrap();
        let (table, _) = compile_tables(&ir).unwrap();
        encode(&ir, &table).into_bytes()
    }

    #[test]
    fn test_round_trip_preserves_tables() {
        let bytes = sample_bytes();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.version, FORMAT_VERSION);
        assert_eq!(decoded.actions.len(), decoded.gotos.len());
        assert!(decoded.symbols.iter().any(|s| s.name == "s"));
    }

    #[test]
    fn test_zero_byte_artifact_is_corrupt() {
        match decode(&[]) {
            Err(LoadError::CorruptArtifact { .. }) => {}
            other => panic!("expected CorruptArtifact, got {other:?}"),
        }
    }

    #[test]
    fn test_body_tamper_is_detected() {
        let mut bytes = sample_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        match decode(&bytes) {
            Err(LoadError::CorruptArtifact { reason }) => {
                assert!(reason.contains("checksum"));
            }
            other => panic!("expected CorruptArtifact, got {other:?}"),
        }
    }

    #[test]
    fn test_future_version_is_incompatible() {
        let mut bytes = sample_bytes();
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        match decode(&bytes) {
            Err(LoadError::IncompatibleVersion { found, min, max }) => {
                assert_eq!(found, 99);
                assert_eq!(min, MIN_SUPPORTED_VERSION);
                assert_eq!(max, FORMAT_VERSION);
            }
            other => panic!("expected IncompatibleVersion, got {other:?}"),
        }
    }
}
