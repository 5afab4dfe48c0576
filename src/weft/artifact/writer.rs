//! Artifact serializer
//!
//! Encodes a compiled table plus symbol metadata into the byte layout
//! described in [`layout`](crate::weft::artifact::layout). Every collection
//! written here is already canonically ordered (vectors and `BTreeMap`s), so
//! the output is byte-for-byte reproducible.

use crate::weft::artifact::checksum::fnv1a64;
use crate::weft::artifact::layout::{
    ACTION_ACCEPT, ACTION_REDUCE, ACTION_SHIFT, ASSOC_LEFT, ASSOC_NONASSOC, ASSOC_NONE,
    ASSOC_RIGHT, FLAG_HIDDEN, FLAG_SKIP, FORMAT_VERSION, KIND_EOF, KIND_EXTERNAL, KIND_LITERAL,
    KIND_NONTERMINAL, KIND_PATTERN,
};
use crate::weft::artifact::Artifact;
use crate::weft::grammar::{Assoc, GrammarIr, SymbolKind};
use crate::weft::tables::{Action, ParseTable};

/// Serialize a compiled grammar.
pub fn encode(ir: &GrammarIr, table: &ParseTable) -> Artifact {
    let mut body = Vec::new();

    // state section: metadata, productions, states
    write_string(&mut body, &ir.name);
    write_u32(&mut body, ir.start);
    body.push(ir.glr as u8);

    write_u32(&mut body, ir.productions.len() as u32);
    for production in &ir.productions {
        write_u32(&mut body, production.lhs);
        write_u32(&mut body, production.rule_index);
        match production.prec {
            Some(prec) => {
                body.push(1);
                write_u32(&mut body, prec.level);
                body.push(match prec.assoc {
                    None => ASSOC_NONE,
                    Some(Assoc::Left) => ASSOC_LEFT,
                    Some(Assoc::Right) => ASSOC_RIGHT,
                    Some(Assoc::NonAssoc) => ASSOC_NONASSOC,
                });
            }
            None => {
                body.push(0);
                write_u32(&mut body, 0);
                body.push(ASSOC_NONE);
            }
        }
        write_u32(&mut body, production.rhs.len() as u32);
        for &symbol in &production.rhs {
            write_u32(&mut body, symbol);
        }
    }

    for (action_row, goto_row) in table.actions.iter().zip(&table.gotos) {
        write_u32(&mut body, action_row.len() as u32);
        for (&terminal, actions) in action_row {
            write_u32(&mut body, terminal);
            body.push(actions.len() as u8);
            for action in actions {
                match action {
                    Action::Shift(target) => {
                        body.push(ACTION_SHIFT);
                        write_u32(&mut body, *target);
                    }
                    Action::Reduce(production) => {
                        body.push(ACTION_REDUCE);
                        write_u32(&mut body, *production);
                    }
                    Action::Accept => {
                        body.push(ACTION_ACCEPT);
                        write_u32(&mut body, 0);
                    }
                }
            }
        }
        write_u32(&mut body, goto_row.len() as u32);
        for (&non_terminal, &target) in goto_row {
            write_u32(&mut body, non_terminal);
            write_u32(&mut body, target);
        }
    }

    // symbol section
    write_u32(&mut body, ir.terminal_count);
    for symbol in &ir.symbols {
        write_string(&mut body, &symbol.name);
        let (kind, payload) = match &symbol.kind {
            SymbolKind::Eof => (KIND_EOF, ""),
            SymbolKind::Literal(text) => (KIND_LITERAL, text.as_str()),
            SymbolKind::Pattern(pattern) => (KIND_PATTERN, pattern.as_str()),
            SymbolKind::External => (KIND_EXTERNAL, ""),
            SymbolKind::NonTerminal => (KIND_NONTERMINAL, ""),
        };
        body.push(kind);
        let mut flags = 0;
        if symbol.hidden {
            flags |= FLAG_HIDDEN;
        }
        if symbol.skip {
            flags |= FLAG_SKIP;
        }
        body.push(flags);
        write_string(&mut body, payload);
    }

    // header
    let mut bytes = Vec::with_capacity(20 + body.len());
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&table.state_count().to_le_bytes());
    bytes.extend_from_slice(&(ir.symbols.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&fnv1a64(&body).to_le_bytes());
    bytes.extend_from_slice(&body);

    Artifact::from_bytes(bytes)
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::grammar::{build_ir, GrammarDescription};
    use crate::weft::tables::compile_tables;

    fn artifact_for(dsl: &str) -> Artifact {
        let ir = build_ir(&GrammarDescription::from_dsl(dsl).unwrap()).unwrap();
        let (table, _) = compile_tables(&ir).unwrap();
        encode(&ir, &table)
    }

    #[test]
    fn test_header_fields() {
        let artifact = artifact_for("token x = \"x\"\nrule s = x");
        assert_eq!(artifact.version(), Some(FORMAT_VERSION));
        assert!(artifact.len() > crate::weft::artifact::layout::HEADER_LEN);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = artifact_for("token x = \"x\"\ntoken y = \"y\"\nrule s = x y | y x");
        let b = artifact_for("token x = \"x\"\ntoken y = \"y\"\nrule s = x y | y x");
        assert_eq!(a.bytes(), b.bytes());
    }

    #[test]
    fn test_checksum_covers_body() {
        let artifact = artifact_for("token x = \"x\"\nrule s = x");
        let bytes = artifact.bytes();
        let stored = u64::from_le_bytes(bytes[12..20].try_into().unwrap());
        assert_eq!(stored, fnv1a64(&bytes[20..]));
    }
}
