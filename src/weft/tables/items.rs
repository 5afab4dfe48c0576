//! LR(1) items and item-set operations

use std::collections::{BTreeMap, BTreeSet};

use crate::weft::grammar::{GrammarIr, SymbolId};
use crate::weft::tables::first::FirstSets;

/// One LR(1) item: a production, a dot position, and a lookahead terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    pub production: u32,
    pub dot: u32,
    pub lookahead: SymbolId,
}

/// Canonically ordered set of items; the ordering makes state identity and
/// numbering reproducible
pub type ItemSet = BTreeSet<Item>;

/// Close a kernel under non-terminal expansion.
pub fn closure(
    kernel: ItemSet,
    ir: &GrammarIr,
    first: &FirstSets,
    by_lhs: &[Vec<u32>],
) -> ItemSet {
    let mut set = kernel;
    let mut queue: Vec<Item> = set.iter().copied().collect();
    while let Some(item) = queue.pop() {
        let production = &ir.productions[item.production as usize];
        let Some(&next) = production.rhs.get(item.dot as usize) else {
            continue;
        };
        if ir.is_terminal(next) {
            continue;
        }
        let rest = &production.rhs[item.dot as usize + 1..];
        let lookaheads = first.first_of_seq(rest, item.lookahead);
        for &expansion in &by_lhs[next as usize] {
            for &lookahead in &lookaheads {
                let new_item = Item {
                    production: expansion,
                    dot: 0,
                    lookahead,
                };
                if set.insert(new_item) {
                    queue.push(new_item);
                }
            }
        }
    }
    set
}

/// Kernel sets reachable from a state, grouped by transition symbol.
///
/// The `BTreeMap` grouping fixes the order in which successor states are
/// discovered and therefore numbered.
pub fn transitions(set: &ItemSet, ir: &GrammarIr) -> BTreeMap<SymbolId, ItemSet> {
    let mut out: BTreeMap<SymbolId, ItemSet> = BTreeMap::new();
    for item in set {
        let production = &ir.productions[item.production as usize];
        if let Some(&next) = production.rhs.get(item.dot as usize) {
            out.entry(next).or_default().insert(Item {
                dot: item.dot + 1,
                ..*item
            });
        }
    }
    out
}
