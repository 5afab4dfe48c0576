//! FIRST sets and nullability
//!
//! Computed once per grammar by fixpoint iteration and consulted during
//! item-set closure. Sets are `BTreeSet`s so every downstream iteration is
//! deterministic.

use std::collections::BTreeSet;

use crate::weft::grammar::{GrammarIr, SymbolId};

pub struct FirstSets {
    nullable: Vec<bool>,
    first: Vec<BTreeSet<SymbolId>>,
}

impl FirstSets {
    pub fn compute(ir: &GrammarIr) -> Self {
        let symbol_count = ir.symbols.len();
        let mut nullable = vec![false; symbol_count];
        let mut first: Vec<BTreeSet<SymbolId>> = vec![BTreeSet::new(); symbol_count];
        for terminal in 0..ir.terminal_count {
            first[terminal as usize].insert(terminal);
        }

        loop {
            let mut changed = false;
            for production in &ir.productions {
                let lhs = production.lhs as usize;
                let mut all_nullable = true;
                for &symbol in &production.rhs {
                    let additions: Vec<SymbolId> =
                        first[symbol as usize].iter().copied().collect();
                    for addition in additions {
                        changed |= first[lhs].insert(addition);
                    }
                    if !nullable[symbol as usize] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        FirstSets { nullable, first }
    }

    pub fn nullable(&self, symbol: SymbolId) -> bool {
        self.nullable[symbol as usize]
    }

    /// FIRST of a symbol sequence followed by a lookahead terminal
    pub fn first_of_seq(&self, seq: &[SymbolId], lookahead: SymbolId) -> BTreeSet<SymbolId> {
        let mut out = BTreeSet::new();
        for &symbol in seq {
            out.extend(self.first[symbol as usize].iter().copied());
            if !self.nullable[symbol as usize] {
                return out;
            }
        }
        out.insert(lookahead);
        out
    }
}
