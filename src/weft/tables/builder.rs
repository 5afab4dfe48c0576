//! LR(1) state construction and action table assembly
//!
//! States are discovered breadth-first from the augmented start item and
//! numbered in discovery order; together with the `BTreeMap` transition
//! grouping this makes compilation fully reproducible, so identical IR
//! always yields an identical table regardless of environment.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::weft::grammar::{GrammarIr, SymbolId, EOF};
use crate::weft::tables::conflicts::{resolve, Candidate, ConflictRecord, UnresolvedConflictError};
use crate::weft::tables::first::FirstSets;
use crate::weft::tables::items::{closure, transitions, Item, ItemSet};

/// One parse action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume the lookahead and enter a state
    Shift(u32),
    /// Replace the top of the stack by a production's left-hand side
    Reduce(u32),
    Accept,
}

/// The compiled automaton
///
/// Owned by the compiled artifact and immutable once built. A cell holding
/// more than one action is a GLR branch point; deterministic grammars only
/// ever have single-action cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTable {
    /// Per state: lookahead terminal -> actions
    pub actions: Vec<BTreeMap<SymbolId, Vec<Action>>>,
    /// Per state: non-terminal -> successor state
    pub gotos: Vec<BTreeMap<SymbolId, u32>>,
}

impl ParseTable {
    pub fn state_count(&self) -> u32 {
        self.actions.len() as u32
    }
}

/// Compile IR into a parse table.
///
/// On success also returns the conflict diagnostics (conflicts that were
/// settled by the comparator). On failure returns every unresolved conflict,
/// never a partial table.
pub fn compile_tables(
    ir: &GrammarIr,
) -> Result<(ParseTable, Vec<ConflictRecord>), Vec<UnresolvedConflictError>> {
    let first = FirstSets::compute(ir);
    let mut by_lhs: Vec<Vec<u32>> = vec![Vec::new(); ir.symbols.len()];
    for (index, production) in ir.productions.iter().enumerate() {
        by_lhs[production.lhs as usize].push(index as u32);
    }

    // state discovery
    let start_kernel: ItemSet = [Item {
        production: 0,
        dot: 0,
        lookahead: EOF,
    }]
    .into_iter()
    .collect();
    let start_state = closure(start_kernel, ir, &first, &by_lhs);

    let mut states: Vec<ItemSet> = vec![start_state.clone()];
    let mut state_index: HashMap<ItemSet, u32> = HashMap::new();
    state_index.insert(start_state, 0);
    let mut successors: Vec<BTreeMap<SymbolId, u32>> = Vec::new();

    let mut cursor = 0;
    while cursor < states.len() {
        let set = states[cursor].clone();
        let mut row = BTreeMap::new();
        for (symbol, kernel) in transitions(&set, ir) {
            let next = closure(kernel, ir, &first, &by_lhs);
            let target = match state_index.get(&next) {
                Some(&existing) => existing,
                None => {
                    let id = states.len() as u32;
                    states.push(next.clone());
                    state_index.insert(next, id);
                    id
                }
            };
            row.insert(symbol, target);
        }
        successors.push(row);
        cursor += 1;
    }

    // action assembly
    let mut actions = Vec::with_capacity(states.len());
    let mut gotos = Vec::with_capacity(states.len());
    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (state_id, set) in states.iter().enumerate() {
        let mut action_row: BTreeMap<SymbolId, Vec<Action>> = BTreeMap::new();
        let mut goto_row: BTreeMap<SymbolId, u32> = BTreeMap::new();
        let mut cells: BTreeMap<SymbolId, Vec<Candidate>> = BTreeMap::new();

        for (&symbol, &target) in &successors[state_id] {
            if ir.is_terminal(symbol) {
                let attribution = shift_attribution(set, symbol, ir);
                cells.entry(symbol).or_default().push(Candidate {
                    action: Action::Shift(target),
                    production: attribution,
                });
            } else {
                goto_row.insert(symbol, target);
            }
        }

        let mut reduces: BTreeMap<SymbolId, BTreeSet<u32>> = BTreeMap::new();
        for item in set {
            let production = &ir.productions[item.production as usize];
            if item.dot as usize == production.rhs.len() {
                reduces
                    .entry(item.lookahead)
                    .or_default()
                    .insert(item.production);
            }
        }
        for (symbol, productions) in reduces {
            let cell = cells.entry(symbol).or_default();
            for production in productions {
                let action = if production == 0 {
                    Action::Accept
                } else {
                    Action::Reduce(production)
                };
                cell.push(Candidate { action, production });
            }
        }

        for (symbol, candidates) in cells {
            let lookahead = ir.symbol_name(symbol);
            match resolve(state_id as u32, lookahead, candidates, ir) {
                Ok((resolved, record)) => {
                    action_row.insert(symbol, resolved);
                    if let Some(record) = record {
                        records.push(record);
                    }
                }
                Err(error) => errors.push(error),
            }
        }

        actions.push(action_row);
        gotos.push(goto_row);
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok((ParseTable { actions, gotos }, records))
}

/// Pick the production a shift action is attributed to for precedence and
/// diagnostics: highest explicit precedence first, then earliest-declared
/// rule, then lowest production index.
fn shift_attribution(set: &ItemSet, symbol: SymbolId, ir: &GrammarIr) -> u32 {
    let mut best: Option<u32> = None;
    for item in set {
        let production = &ir.productions[item.production as usize];
        if production.rhs.get(item.dot as usize) != Some(&symbol) {
            continue;
        }
        best = Some(match best {
            None => item.production,
            Some(current) => pick_attribution(current, item.production, ir),
        });
    }
    best.unwrap_or(0)
}

fn pick_attribution(a: u32, b: u32, ir: &GrammarIr) -> u32 {
    let prec = |p: u32| ir.productions[p as usize].prec.map(|pr| pr.level);
    let order = |p: u32| ir.productions[p as usize].rule_index;
    match (prec(a), prec(b)) {
        (Some(pa), Some(pb)) if pa != pb => {
            if pa > pb {
                a
            } else {
                b
            }
        }
        (Some(_), None) => a,
        (None, Some(_)) => b,
        _ => {
            if (order(a), a) <= (order(b), b) {
                a
            } else {
                b
            }
        }
    }
}
