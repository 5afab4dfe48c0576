//! Conflict records and the resolution comparator
//!
//! When one automaton cell (state + lookahead) admits more than one action,
//! the competing candidates are settled by a pure function over the
//! candidates and the grammar (never by mutable compiler state) in a fixed
//! order: explicit precedence, then associativity, then rule declaration
//! order, then a GLR branch when the grammar opted in. Silent nondeterminism
//! is never allowed: every multi-action cell either produces a
//! [`ConflictRecord`] describing how it was settled or aborts compilation
//! with an [`UnresolvedConflictError`].

use std::fmt;

use crate::weft::grammar::{Assoc, GrammarIr};
use crate::weft::tables::builder::Action;

/// An ambiguity the comparator could not settle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedConflictError {
    pub state: u32,
    pub lookahead: String,
    pub first_rule: String,
    pub second_rule: String,
    pub reason: String,
}

impl fmt::Display for UnresolvedConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unresolved conflict on `{}`: rule `{}` competes with rule `{}` ({}) in state {}",
            self.lookahead, self.first_rule, self.second_rule, self.reason, self.state
        )
    }
}

impl std::error::Error for UnresolvedConflictError {}

/// Which step of the comparator settled a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Precedence,
    Associativity,
    DeclarationOrder,
    GlrBranch,
}

/// Diagnostic describing one settled conflict cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub state: u32,
    pub lookahead: String,
    pub shift_rule: Option<String>,
    pub reduce_rules: Vec<String>,
    pub resolution: Resolution,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match (&self.shift_rule, self.reduce_rules.len()) {
            (Some(_), 0) => "shift/shift",
            (Some(_), _) => "shift/reduce",
            (None, _) => "reduce/reduce",
        };
        let how = match self.resolution {
            Resolution::Precedence => "resolved by precedence",
            Resolution::Associativity => "resolved by associativity",
            Resolution::DeclarationOrder => "resolved by declaration order",
            Resolution::GlrBranch => "kept as a glr branch",
        };
        write!(f, "state {}: {} on `{}` {}", self.state, kind, self.lookahead, how)?;
        if let Some(shift) = &self.shift_rule {
            write!(f, "; shift `{}`", shift)?;
        }
        if !self.reduce_rules.is_empty() {
            write!(f, "; reduce {}", self.reduce_rules.join(", "))?;
        }
        Ok(())
    }
}

/// One competing action plus the production it is attributed to
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub action: Action,
    pub production: u32,
}

/// Settle one automaton cell.
///
/// Returns the surviving actions in canonical order (shift first, then
/// reduces by production index) plus a record when the cell was actually
/// contested.
pub(crate) fn resolve(
    state: u32,
    lookahead: &str,
    candidates: Vec<Candidate>,
    ir: &GrammarIr,
) -> Result<(Vec<Action>, Option<ConflictRecord>), UnresolvedConflictError> {
    if candidates.len() == 1 {
        return Ok((vec![candidates[0].action], None));
    }

    let shift_rule = candidates
        .iter()
        .find(|c| matches!(c.action, Action::Shift(_)))
        .map(|c| ir.rule_name(c.production as usize).to_string());
    let reduce_rules: Vec<String> = candidates
        .iter()
        .filter(|c| !matches!(c.action, Action::Shift(_)))
        .map(|c| ir.rule_name(c.production as usize).to_string())
        .collect();

    let prec_of = |c: &Candidate| ir.productions[c.production as usize].prec;
    let assoc_of = |c: &Candidate| prec_of(c).and_then(|p| p.assoc);
    let is_shift = |c: &Candidate| matches!(c.action, Action::Shift(_));

    let mut survivors: Vec<Candidate> = candidates.clone();
    let mut resolution: Option<Resolution> = None;

    // 1 + 2: precedence and associativity apply only when every competing
    // production carries explicit precedence
    if survivors.iter().all(|c| prec_of(c).is_some()) {
        if let Some(max) = survivors.iter().filter_map(&prec_of).map(|p| p.level).max() {
            let filtered: Vec<Candidate> = survivors
                .iter()
                .copied()
                .filter(|c| prec_of(c).map(|p| p.level) == Some(max))
                .collect();
            if filtered.len() < survivors.len() {
                resolution = Some(Resolution::Precedence);
            }
            survivors = filtered;
        }

        if survivors.len() > 1 {
            if survivors.iter().any(|c| assoc_of(c) == Some(Assoc::NonAssoc)) {
                return Err(conflict_error(
                    state,
                    lookahead,
                    &survivors,
                    ir,
                    "competing rules are non-associative",
                ));
            }
            let has_shift = survivors.iter().any(|c| is_shift(c));
            let has_reduce = survivors.iter().any(|c| !is_shift(c));
            if has_shift && has_reduce {
                let all_left = survivors.iter().all(|c| assoc_of(c) == Some(Assoc::Left));
                let all_right = survivors.iter().all(|c| assoc_of(c) == Some(Assoc::Right));
                if all_left {
                    survivors.retain(|c| !is_shift(c));
                    resolution = Some(Resolution::Associativity);
                } else if all_right {
                    survivors.retain(|c| is_shift(c));
                    resolution = Some(Resolution::Associativity);
                }
            }
        }
    }

    // 3: declaration order; the augmented start production outranks every
    // declared rule so accepting is never shadowed
    if survivors.len() > 1 {
        let order_of = |c: &Candidate| {
            if c.production == 0 {
                -1i64
            } else {
                ir.productions[c.production as usize].rule_index as i64
            }
        };
        if let Some(min) = survivors.iter().map(order_of).min() {
            let filtered: Vec<Candidate> = survivors
                .iter()
                .copied()
                .filter(|c| order_of(c) == min)
                .collect();
            survivors = filtered;
            if survivors.len() == 1 {
                resolution = Some(Resolution::DeclarationOrder);
            }
        }
    }

    // 4: keep the branch point or give up
    let resolution = if survivors.len() == 1 {
        resolution.unwrap_or(Resolution::DeclarationOrder)
    } else if ir.glr {
        Resolution::GlrBranch
    } else {
        return Err(conflict_error(
            state,
            lookahead,
            &survivors,
            ir,
            "ambiguity requires glr mode",
        ));
    };

    let mut actions: Vec<Action> = survivors.iter().map(|c| c.action).collect();
    actions.sort_by_key(action_sort_key);
    actions.dedup();

    Ok((
        actions,
        Some(ConflictRecord {
            state,
            lookahead: lookahead.to_string(),
            shift_rule,
            reduce_rules,
            resolution,
        }),
    ))
}

fn conflict_error(
    state: u32,
    lookahead: &str,
    survivors: &[Candidate],
    ir: &GrammarIr,
    reason: &str,
) -> UnresolvedConflictError {
    let first_rule = survivors
        .first()
        .map(|c| ir.rule_name(c.production as usize).to_string())
        .unwrap_or_default();
    let second_rule = survivors
        .get(1)
        .map(|c| ir.rule_name(c.production as usize).to_string())
        .unwrap_or_else(|| first_rule.clone());
    UnresolvedConflictError {
        state,
        lookahead: lookahead.to_string(),
        first_rule,
        second_rule,
        reason: reason.to_string(),
    }
}

fn action_sort_key(action: &Action) -> (u8, u32) {
    match action {
        Action::Shift(target) => (0, *target),
        Action::Accept => (1, 0),
        Action::Reduce(production) => (1, *production),
    }
}
