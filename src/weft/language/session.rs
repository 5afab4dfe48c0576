//! Parse sessions and the batch reference driver
//!
//! A session drives the loaded tables over a complete input string: it lexes
//! state-by-state (skip tokens first, then the external scanner for external
//! symbols the state expects, then literal and pattern terminals by longest
//! match), applies shift/reduce actions, and forks the stack at GLR branch
//! points. Branching is bounded; exceeding the cap is a parse error, not a
//! crash or a silently dropped branch.
//!
//! Incremental re-parsing is not implemented here; the driver exists so the
//! compiled tables and the scanner bridge can be exercised end to end.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::weft::grammar::{SymbolId, SymbolKind, EOF};
use crate::weft::language::{Language, LanguageData};
use crate::weft::scanner::{ExternalScanner, ScanCursor, ValidSymbols};
use crate::weft::tables::Action;

/// Most live branches a single parse may hold
pub const MAX_BRANCHES: usize = 32;

/// Guard against reduction cycles in pathological ambiguous tables
const MAX_REDUCTIONS_PER_STEP: usize = 10_000;

/// Errors produced by a parse session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Syntax {
        offset: usize,
        expected: Vec<String>,
        found: Option<String>,
    },
    BranchLimit {
        offset: usize,
        limit: usize,
    },
}

impl ParseError {
    pub fn offset(&self) -> usize {
        match self {
            ParseError::Syntax { offset, .. } => *offset,
            ParseError::BranchLimit { offset, .. } => *offset,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax {
                offset,
                expected,
                found,
            } => {
                write!(f, "syntax error at byte {}", offset)?;
                if let Some(found) = found {
                    write!(f, ": found `{}`", found)?;
                }
                if !expected.is_empty() {
                    write!(f, ", expected {}", expected.join(" | "))?;
                }
                Ok(())
            }
            ParseError::BranchLimit { offset, limit } => write!(
                f,
                "too many ambiguity branches at byte {} (limit {})",
                offset, limit
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// A node of the produced parse tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: String,
    range: Range<usize>,
    children: Vec<Node>,
}

impl Node {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Source text this node spans
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range.clone()]
    }
}

/// Result of a successful parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: Node,
}

impl Tree {
    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// One parse session against a loaded language
///
/// Sessions are cheap to create; the heavy state (tables, matchers) lives in
/// the shared language handle. A session owns its external scanner
/// exclusively, so scanners may be stateful without any locking.
pub struct Session {
    language: Language,
    scanner: Option<Box<dyn ExternalScanner>>,
    max_branches: usize,
}

impl Session {
    pub(crate) fn new(language: Language) -> Self {
        Session {
            language,
            scanner: None,
            max_branches: MAX_BRANCHES,
        }
    }

    /// Attach an external scanner for this session's external tokens.
    pub fn with_scanner(mut self, scanner: Box<dyn ExternalScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Parse a complete input string.
    pub fn parse(&mut self, input: &str) -> Result<Tree, ParseError> {
        if let Some(scanner) = self.scanner.as_mut() {
            scanner.reset();
        }
        let data = Arc::clone(&self.language.data);

        let mut branches = vec![Branch {
            states: vec![0],
            values: vec![],
            pos: 0,
        }];
        let mut best_error: Option<ParseError> = None;

        loop {
            if branches.is_empty() {
                return Err(best_error.unwrap_or(ParseError::Syntax {
                    offset: 0,
                    expected: vec![],
                    found: None,
                }));
            }
            if branches.len() > self.max_branches {
                let offset = branches.iter().map(|b| b.pos).max().unwrap_or(0);
                return Err(ParseError::BranchLimit {
                    offset,
                    limit: self.max_branches,
                });
            }

            let mut next_round = Vec::new();
            for branch in branches {
                match step(&data, self.scanner.as_deref_mut(), input, branch) {
                    StepOutcome::Accepted(tree) => return Ok(tree),
                    StepOutcome::Continue(forks) => next_round.extend(forks),
                    StepOutcome::Failed(error) => merge_error(&mut best_error, error),
                }
            }
            branches = next_round;
        }
    }
}

/// Keep whichever error got furthest into the input
fn merge_error(best: &mut Option<ParseError>, candidate: ParseError) {
    let replace = match best {
        None => true,
        Some(current) => candidate.offset() > current.offset(),
    };
    if replace {
        *best = Some(candidate);
    }
}

#[derive(Clone)]
struct Branch {
    /// State stack; index 0 is always the start state
    states: Vec<u32>,
    /// Value stack: one forest per stack symbol (hidden rules contribute
    /// their children directly, so an entry can hold several nodes)
    values: Vec<Vec<Node>>,
    pos: usize,
}

enum StepOutcome {
    Accepted(Tree),
    Continue(Vec<Branch>),
    Failed(ParseError),
}

struct Lexed {
    symbol: SymbolId,
    start: usize,
    end: usize,
}

/// Advance one branch by one token (or fork it at a GLR branch point).
fn step(
    data: &LanguageData,
    scanner: Option<&mut (dyn ExternalScanner + 'static)>,
    input: &str,
    mut branch: Branch,
) -> StepOutcome {
    let state = current_state(&branch);
    let token = match lex(data, scanner, input, branch.pos, state) {
        Ok(token) => token,
        Err(error) => return StepOutcome::Failed(error),
    };

    let mut reductions = 0;
    loop {
        let state = current_state(&branch);
        let row = &data.actions[state as usize];
        let Some(cell) = row.get(&token.symbol) else {
            return StepOutcome::Failed(syntax_error(data, state, &token));
        };

        if cell.len() > 1 {
            // GLR branch point: fork once per action; forks that only
            // reduced will re-lex on the next round under their new state
            let mut forks = Vec::new();
            for action in cell {
                let mut fork = branch.clone();
                match apply_action(data, &mut fork, *action, &token) {
                    Applied::Accepted(tree) => return StepOutcome::Accepted(tree),
                    Applied::Continue => forks.push(fork),
                    Applied::Dead => {}
                }
            }
            return StepOutcome::Continue(forks);
        }

        match cell[0] {
            Action::Shift(target) => {
                apply_shift(data, &mut branch, target, &token);
                return StepOutcome::Continue(vec![branch]);
            }
            Action::Reduce(production) => {
                reductions += 1;
                if reductions > MAX_REDUCTIONS_PER_STEP {
                    return StepOutcome::Failed(stack_error(token.start));
                }
                if let Err(error) = apply_reduce(data, &mut branch, production, token.start) {
                    return StepOutcome::Failed(error);
                }
            }
            Action::Accept => {
                return StepOutcome::Accepted(finish_tree(data, branch));
            }
        }
    }
}

enum Applied {
    Accepted(Tree),
    Continue,
    Dead,
}

fn apply_action(data: &LanguageData, branch: &mut Branch, action: Action, token: &Lexed) -> Applied {
    match action {
        Action::Shift(target) => {
            apply_shift(data, branch, target, token);
            Applied::Continue
        }
        Action::Reduce(production) => match apply_reduce(data, branch, production, token.start) {
            Ok(()) => Applied::Continue,
            Err(_) => Applied::Dead,
        },
        Action::Accept => Applied::Accepted(finish_tree(data, branch.clone())),
    }
}

fn current_state(branch: &Branch) -> u32 {
    branch.states.last().copied().unwrap_or(0)
}

fn apply_shift(data: &LanguageData, branch: &mut Branch, target: u32, token: &Lexed) {
    branch.states.push(target);
    let kind = data.symbols[token.symbol as usize].name.clone();
    branch.values.push(vec![Node {
        kind,
        range: token.start..token.end,
        children: vec![],
    }]);
    branch.pos = token.end;
}

fn apply_reduce(
    data: &LanguageData,
    branch: &mut Branch,
    production: u32,
    at: usize,
) -> Result<(), ParseError> {
    let prod = &data.productions[production as usize];
    let popped = prod.rhs.len();

    let Some(new_len) = branch.states.len().checked_sub(popped).filter(|&n| n >= 1) else {
        return Err(stack_error(at));
    };
    branch.states.truncate(new_len);
    let children: Vec<Node> = branch
        .values
        .split_off(branch.values.len().saturating_sub(popped))
        .into_iter()
        .flatten()
        .collect();

    let state = current_state(branch);
    let Some(&target) = data.gotos[state as usize].get(&prod.lhs) else {
        return Err(stack_error(at));
    };
    branch.states.push(target);

    let lhs = &data.symbols[prod.lhs as usize];
    let forest = if lhs.hidden {
        children
    } else {
        let range = match (children.first(), children.last()) {
            (Some(first), Some(last)) => first.range.start..last.range.end,
            _ => at..at,
        };
        vec![Node {
            kind: lhs.name.clone(),
            range,
            children,
        }]
    };
    branch.values.push(forest);
    Ok(())
}

/// Inconsistent stack discipline; unreachable with compiler-produced tables
fn stack_error(at: usize) -> ParseError {
    ParseError::Syntax {
        offset: at,
        expected: vec![],
        found: None,
    }
}

fn finish_tree(data: &LanguageData, mut branch: Branch) -> Tree {
    let mut forest = branch.values.pop().unwrap_or_default();
    let root = if forest.len() == 1 {
        forest.remove(0)
    } else {
        let range = match (forest.first(), forest.last()) {
            (Some(first), Some(last)) => first.range.start..last.range.end,
            _ => branch.pos..branch.pos,
        };
        Node {
            kind: data.symbols[data.start as usize].name.clone(),
            range,
            children: forest,
        }
    };
    Tree { root }
}

fn syntax_error(data: &LanguageData, state: u32, token: &Lexed) -> ParseError {
    ParseError::Syntax {
        offset: token.start,
        expected: expected_names(data, state),
        found: if token.symbol == EOF {
            None
        } else {
            Some(data.symbols[token.symbol as usize].name.clone())
        },
    }
}

fn expected_names(data: &LanguageData, state: u32) -> Vec<String> {
    data.actions[state as usize]
        .keys()
        .map(|&symbol| data.symbols[symbol as usize].name.clone())
        .collect()
}

/// State-driven lexer over the artifact's token definitions.
///
/// Order of attempts mirrors the lexical priorities of markup grammars:
/// skip tokens are consumed up front, the external scanner is consulted for
/// any external symbol the state expects, then built-in terminals compete by
/// longest match (literals beating patterns of equal length, lower symbol
/// ids beating higher ones).
fn lex(
    data: &LanguageData,
    scanner: Option<&mut (dyn ExternalScanner + 'static)>,
    input: &str,
    pos: usize,
    state: u32,
) -> Result<Lexed, ParseError> {
    let pos = skip_tokens(data, input, pos);
    let row = &data.actions[state as usize];

    // external scanner gets the first try, gated on the valid set
    if let Some(scanner) = scanner {
        let externals: BTreeSet<SymbolId> = row
            .keys()
            .copied()
            .filter(|&s| matches!(data.symbols[s as usize].kind, SymbolKind::External))
            .collect();
        if !externals.is_empty() {
            let valid = ValidSymbols::new(externals);
            let mut cursor = ScanCursor::new(input, pos);
            if let Some(symbol) = scanner.scan(&mut cursor, &valid) {
                let end = cursor.token_end();
                if valid.contains(symbol) && end > pos {
                    return Ok(Lexed {
                        symbol,
                        start: cursor.token_start(),
                        end,
                    });
                }
            }
            // a failed scan discards the cursor; the input position is
            // untouched and the built-in lexer takes over
        }
    }

    if pos >= input.len() {
        return Ok(Lexed {
            symbol: EOF,
            start: pos,
            end: pos,
        });
    }

    // built-in terminals: longest match, literals before patterns, then
    // lowest symbol id
    let mut best: Option<(usize, u8, SymbolId)> = None;
    for &symbol in row.keys() {
        let rank = match &data.symbols[symbol as usize].kind {
            SymbolKind::Literal(_) => 0,
            SymbolKind::Pattern(_) => 1,
            _ => continue,
        };
        let Some(length) = match_terminal(data, symbol, input, pos) else {
            continue;
        };
        if length == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_len, best_rank, best_symbol)) => {
                length > best_len
                    || (length == best_len && rank < best_rank)
                    || (length == best_len && rank == best_rank && symbol < best_symbol)
            }
        };
        if better {
            best = Some((length, rank, symbol));
        }
    }

    match best {
        Some((length, _, symbol)) => Ok(Lexed {
            symbol,
            start: pos,
            end: pos + length,
        }),
        None => Err(ParseError::Syntax {
            offset: pos,
            expected: expected_names(data, state),
            found: input[pos..].chars().next().map(|c| c.to_string()),
        }),
    }
}

/// Consume skip tokens (whitespace, comments) until none match.
fn skip_tokens(data: &LanguageData, input: &str, mut pos: usize) -> usize {
    loop {
        let mut advanced = false;
        for symbol in 0..data.terminal_count {
            if !data.symbols[symbol as usize].skip {
                continue;
            }
            if let Some(length) = match_terminal(data, symbol, input, pos) {
                if length > 0 {
                    pos += length;
                    advanced = true;
                    break;
                }
            }
        }
        if !advanced {
            return pos;
        }
    }
}

fn match_terminal(data: &LanguageData, symbol: SymbolId, input: &str, pos: usize) -> Option<usize> {
    match &data.symbols[symbol as usize].kind {
        SymbolKind::Literal(text) => input[pos..]
            .starts_with(text.as_str())
            .then(|| text.len()),
        SymbolKind::Pattern(_) => data.matchers[symbol as usize]
            .as_ref()
            .and_then(|regex| regex.find(&input[pos..]))
            .map(|found| found.end()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::compile;
    use crate::weft::grammar::GrammarDescription;

    fn language_for(dsl: &str) -> Language {
        let artifact = compile(&GrammarDescription::from_dsl(dsl).unwrap()).unwrap();
        Language::load(artifact.bytes()).unwrap()
    }

    #[test]
    fn test_parse_simple_sequence() {
        let language = language_for(
            "token a = \"a\"\ntoken b = \"b\"\nskip token ws = /[ \\t]+/\nrule s = a b",
        );
        let tree = language.session().parse("a  b").unwrap();
        let root = tree.root();
        assert_eq!(root.kind(), "s");
        assert_eq!(root.child_count(), 2);
        assert_eq!(root.child(0).map(|n| n.kind()), Some("a"));
        assert_eq!(root.child(1).map(|n| n.kind()), Some("b"));
    }

    #[test]
    fn test_hidden_rule_children_are_spliced() {
        let language = language_for(
            "token x = \"x\"\nrule s = inner\nhidden rule inner = x",
        );
        let tree = language.session().parse("x").unwrap();
        let root = tree.root();
        assert_eq!(root.kind(), "s");
        // inner is hidden, so x is a direct child of s
        assert_eq!(root.child(0).map(|n| n.kind()), Some("x"));
    }

    #[test]
    fn test_repetition_collects_children() {
        let language = language_for("token x = \"x\"\nrule s = x*");
        let tree = language.session().parse("xxx").unwrap();
        assert_eq!(tree.root().child_count(), 3);
        let empty = language.session().parse("").unwrap();
        assert_eq!(empty.root().child_count(), 0);
    }

    #[test]
    fn test_syntax_error_reports_offset_and_expectations() {
        let language = language_for("token a = \"a\"\ntoken b = \"b\"\nrule s = a b");
        let error = language.session().parse("aa").unwrap_err();
        match error {
            ParseError::Syntax {
                offset, expected, ..
            } => {
                assert_eq!(offset, 1);
                assert!(expected.contains(&"b".to_string()));
            }
            other => panic!("expected a syntax error, got {other}"),
        }
    }

    #[test]
    fn test_longest_match_wins() {
        let language = language_for(
            "token eq = \"=\"\ntoken arrow = \"==\"\nrule s = arrow | eq",
        );
        let tree = language.session().parse("==").unwrap();
        assert_eq!(tree.root().child(0).map(|n| n.kind()), Some("arrow"));
    }

    #[test]
    fn test_pattern_tokens_match_by_regex() {
        let language = language_for(
            "token name = /[a-z]+/\ntoken num = /[0-9]+/\nskip token ws = / +/\nrule s = name num",
        );
        let tree = language.session().parse("abc 42").unwrap();
        let root = tree.root();
        assert_eq!(root.child(0).map(|n| n.range()), Some(0..3));
        assert_eq!(root.child(1).map(|n| n.range()), Some(4..6));
    }

    #[test]
    fn test_glr_parse_of_ambiguous_grammar() {
        let language = language_for("glr\ntoken x = \"x\"\nrule s = s s | x");
        let tree = language.session().parse("xxx").unwrap();
        assert_eq!(tree.root().kind(), "s");
        // each leaf x is nested somewhere under the root
        fn count_leaves(node: &Node) -> usize {
            if node.kind() == "x" {
                1
            } else {
                node.children().iter().map(count_leaves).sum()
            }
        }
        assert_eq!(count_leaves(tree.root()), 3);
    }
}
