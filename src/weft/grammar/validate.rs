//! Description validation and IR lowering
//!
//! Every violation is collected before the builder gives up, so grammar
//! authors see the complete list in one pass instead of fixing errors one
//! at a time. A successful build yields a [`GrammarIr`] with interned
//! symbols and flattened productions.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::weft::grammar::ast::{GrammarDescription, RuleExpr, TokenKind};
use crate::weft::grammar::ir::{GrammarIr, Production, Symbol, SymbolId, SymbolKind};

/// Symbol names synthesized by the compiler; user grammars cannot take them
static RESERVED_NAMES: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["$eof", "$accept"]);

static NAME_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name shape pattern is valid"));

/// A malformed or inconsistent grammar description
///
/// Carries the offending rule (or token) name and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarDefinitionError {
    pub rule: String,
    pub reason: String,
}

impl GrammarDefinitionError {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        GrammarDefinitionError {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GrammarDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule `{}`: {}", self.rule, self.reason)
    }
}

impl std::error::Error for GrammarDefinitionError {}

/// Validate a description and lower it into IR.
///
/// Returns every definition error found; the caller never receives a
/// partially built grammar.
pub fn build_ir(description: &GrammarDescription) -> Result<GrammarIr, Vec<GrammarDefinitionError>> {
    let mut builder = IrBuilder::new(description);
    builder.check_names();
    builder.intern_terminals();
    builder.intern_rules();
    builder.lower_rules();
    builder.finish()
}

struct IrBuilder<'a> {
    description: &'a GrammarDescription,
    errors: Vec<GrammarDefinitionError>,
    symbols: Vec<Symbol>,
    by_name: HashMap<String, SymbolId>,
    /// Literal text -> terminal id, for declared and anonymous literals
    by_literal: HashMap<String, SymbolId>,
    terminal_count: u32,
    productions: Vec<Production>,
    rule_names: Vec<String>,
}

impl<'a> IrBuilder<'a> {
    fn new(description: &'a GrammarDescription) -> Self {
        IrBuilder {
            description,
            errors: Vec::new(),
            symbols: Vec::new(),
            by_name: HashMap::new(),
            by_literal: HashMap::new(),
            terminal_count: 0,
            productions: Vec::new(),
            rule_names: Vec::new(),
        }
    }

    fn error(&mut self, rule: &str, reason: impl Into<String>) {
        self.errors.push(GrammarDefinitionError::new(rule, reason));
    }

    fn check_names(&mut self) {
        let description = self.description;
        let mut seen: HashMap<&str, &str> = HashMap::new();
        let token_names = description.tokens.iter().map(|t| (t.name.as_str(), "token"));
        let external_names = description
            .externals
            .iter()
            .map(|n| (n.as_str(), "external token"));
        let rule_names = description.rules.iter().map(|r| (r.name.as_str(), "rule"));

        for (name, what) in token_names.chain(external_names).chain(rule_names) {
            if RESERVED_NAMES.iter().any(|reserved| *reserved == name) || name.contains('$') {
                self.error(name, format!("`{}` is a reserved name", name));
                continue;
            }
            if !NAME_SHAPE.is_match(name) {
                self.error(name, format!("`{}` is not a valid {} name", name, what));
                continue;
            }
            if let Some(previous) = seen.insert(name, what) {
                self.error(name, format!("`{}` is already defined as a {}", name, previous));
            }
        }
    }

    fn push_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = self.symbols.len() as SymbolId;
        self.by_name.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        id
    }

    fn intern_terminals(&mut self) {
        let description = self.description;

        self.push_symbol(Symbol {
            name: "$eof".to_string(),
            kind: SymbolKind::Eof,
            hidden: true,
            skip: false,
        });

        for token in &description.tokens {
            match &token.kind {
                TokenKind::Literal(text) => {
                    if text.is_empty() {
                        self.error(&token.name, "literal token must not be empty");
                    }
                    let id = self.push_symbol(Symbol {
                        name: token.name.clone(),
                        kind: SymbolKind::Literal(text.clone()),
                        hidden: false,
                        skip: token.skip,
                    });
                    self.by_literal.entry(text.clone()).or_insert(id);
                }
                TokenKind::Pattern(pattern) => {
                    if let Err(err) = Regex::new(&format!("^(?:{})", pattern)) {
                        self.error(
                            &token.name,
                            format!("invalid token pattern /{}/: {}", pattern, err),
                        );
                    }
                    self.push_symbol(Symbol {
                        name: token.name.clone(),
                        kind: SymbolKind::Pattern(pattern.clone()),
                        hidden: false,
                        skip: token.skip,
                    });
                }
            }
        }

        for name in &description.externals {
            self.push_symbol(Symbol {
                name: name.clone(),
                kind: SymbolKind::External,
                hidden: false,
                skip: false,
            });
        }

        // Anonymous literals, in first-use order across all rule bodies
        let mut inline_literals = Vec::new();
        for rule in &description.rules {
            collect_literals(&rule.expr, &mut inline_literals);
        }
        for text in inline_literals {
            if self.by_literal.contains_key(&text) {
                continue;
            }
            if text.is_empty() {
                let grammar = description.name.clone();
                self.error(&grammar, "inline literal must not be empty");
                continue;
            }
            let taken_by_rule = description.rules.iter().any(|r| r.name == text);
            if self.by_name.contains_key(&text) || taken_by_rule {
                self.error(
                    &text,
                    format!("inline literal \"{}\" collides with a declared symbol", text),
                );
                continue;
            }
            let id = self.push_symbol(Symbol {
                name: text.clone(),
                kind: SymbolKind::Literal(text.clone()),
                hidden: false,
                skip: false,
            });
            self.by_literal.insert(text, id);
        }

        self.terminal_count = self.symbols.len() as u32;
    }

    fn intern_rules(&mut self) {
        let description = self.description;
        for rule in &description.rules {
            self.rule_names.push(rule.name.clone());
            self.push_symbol(Symbol {
                name: rule.name.clone(),
                kind: SymbolKind::NonTerminal,
                hidden: rule.hidden,
                skip: false,
            });
        }
    }

    fn lower_rules(&mut self) {
        let description = self.description;
        for (rule_index, rule) in description.rules.iter().enumerate() {
            let Some(&lhs) = self.by_name.get(&rule.name) else {
                continue;
            };
            let mut lowerer = Lowerer {
                rule_name: rule.name.clone(),
                rule_index: rule_index as u32,
                aux_counter: 0,
            };
            let mut bodies = Vec::new();
            for alternative in split_choice(&rule.expr) {
                bodies.push(self.lower_sequence(&mut lowerer, alternative));
            }
            for rhs in bodies {
                self.productions.push(Production {
                    lhs,
                    rhs,
                    rule_index: rule_index as u32,
                    prec: rule.prec,
                });
            }
        }
    }

    fn lower_sequence(&mut self, lowerer: &mut Lowerer, expr: &RuleExpr) -> Vec<SymbolId> {
        split_seq(expr)
            .into_iter()
            .filter_map(|factor| self.lower_factor(lowerer, factor))
            .collect()
    }

    fn lower_factor(&mut self, lowerer: &mut Lowerer, expr: &RuleExpr) -> Option<SymbolId> {
        match expr {
            RuleExpr::Symbol(name) => match self.by_name.get(name).copied() {
                Some(id) => {
                    if self.symbols[id as usize].skip {
                        let rule = lowerer.rule_name.clone();
                        self.error(
                            &rule,
                            format!("skip token `{}` cannot be referenced in a rule body", name),
                        );
                        return None;
                    }
                    Some(id)
                }
                None => {
                    let rule = lowerer.rule_name.clone();
                    self.error(&rule, format!("undefined symbol `{}`", name));
                    None
                }
            },
            RuleExpr::Literal(text) => self.by_literal.get(text).copied(),
            RuleExpr::Optional(inner) => {
                let aux = self.new_aux(lowerer, "opt");
                self.lower_alternatives_into(lowerer, aux, inner, true);
                Some(aux)
            }
            RuleExpr::Repeat(inner) => {
                let element = self.lower_factor(lowerer, inner)?;
                let aux = self.new_aux(lowerer, "rep");
                self.productions.push(Production {
                    lhs: aux,
                    rhs: vec![],
                    rule_index: lowerer.rule_index,
                    prec: None,
                });
                self.productions.push(Production {
                    lhs: aux,
                    rhs: vec![aux, element],
                    rule_index: lowerer.rule_index,
                    prec: None,
                });
                Some(aux)
            }
            RuleExpr::Repeat1(inner) => {
                let element = self.lower_factor(lowerer, inner)?;
                let aux = self.new_aux(lowerer, "rep");
                self.productions.push(Production {
                    lhs: aux,
                    rhs: vec![element],
                    rule_index: lowerer.rule_index,
                    prec: None,
                });
                self.productions.push(Production {
                    lhs: aux,
                    rhs: vec![aux, element],
                    rule_index: lowerer.rule_index,
                    prec: None,
                });
                Some(aux)
            }
            RuleExpr::Choice(_) | RuleExpr::Seq(_) => {
                let aux = self.new_aux(lowerer, "grp");
                self.lower_alternatives_into(lowerer, aux, expr, false);
                Some(aux)
            }
        }
    }

    fn lower_alternatives_into(
        &mut self,
        lowerer: &mut Lowerer,
        lhs: SymbolId,
        expr: &RuleExpr,
        include_empty: bool,
    ) {
        let mut bodies = Vec::new();
        if include_empty {
            bodies.push(Vec::new());
        }
        for alternative in split_choice(expr) {
            bodies.push(self.lower_sequence(lowerer, alternative));
        }
        for rhs in bodies {
            self.productions.push(Production {
                lhs,
                rhs,
                rule_index: lowerer.rule_index,
                prec: None,
            });
        }
    }

    fn new_aux(&mut self, lowerer: &mut Lowerer, kind: &str) -> SymbolId {
        let name = format!("{}${}{}", lowerer.rule_name, kind, lowerer.aux_counter);
        lowerer.aux_counter += 1;
        let id = self.symbols.len() as SymbolId;
        self.symbols.push(Symbol {
            name,
            kind: SymbolKind::NonTerminal,
            hidden: true,
            skip: false,
        });
        id
    }

    fn finish(mut self) -> Result<GrammarIr, Vec<GrammarDefinitionError>> {
        let description = self.description;
        let start = if description.rules.is_empty() {
            let grammar = description.name.clone();
            self.error(&grammar, "grammar has no rules");
            None
        } else {
            match &description.start {
                Some(name) => match self.by_name.get(name).copied() {
                    Some(id) if !self.symbols[id as usize].is_terminal() => Some(id),
                    Some(_) => {
                        self.error(name, format!("start symbol `{}` is a token, not a rule", name));
                        None
                    }
                    None => {
                        self.error(name, format!("start rule `{}` is not defined", name));
                        None
                    }
                },
                None => self.by_name.get(&description.rules[0].name).copied(),
            }
        };

        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        let Some(start) = start else {
            return Err(vec![GrammarDefinitionError::new(
                description.name.clone(),
                "no start rule",
            )]);
        };

        let accept = self.symbols.len() as SymbolId;
        self.symbols.push(Symbol {
            name: "$accept".to_string(),
            kind: SymbolKind::NonTerminal,
            hidden: true,
            skip: false,
        });

        let mut productions = Vec::with_capacity(self.productions.len() + 1);
        productions.push(Production {
            lhs: accept,
            rhs: vec![start],
            rule_index: u32::MAX,
            prec: None,
        });
        productions.extend(self.productions);

        Ok(GrammarIr {
            name: description.name.clone(),
            symbols: self.symbols,
            terminal_count: self.terminal_count,
            productions,
            start,
            accept,
            rule_names: self.rule_names,
            glr: description.glr,
        })
    }
}

struct Lowerer {
    rule_name: String,
    rule_index: u32,
    aux_counter: u32,
}

fn split_choice(expr: &RuleExpr) -> Vec<&RuleExpr> {
    match expr {
        RuleExpr::Choice(alternatives) => alternatives.iter().collect(),
        other => vec![other],
    }
}

fn split_seq(expr: &RuleExpr) -> Vec<&RuleExpr> {
    match expr {
        RuleExpr::Seq(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn collect_literals(expr: &RuleExpr, out: &mut Vec<String>) {
    match expr {
        RuleExpr::Literal(text) => {
            if !out.contains(text) {
                out.push(text.clone());
            }
        }
        RuleExpr::Symbol(_) => {}
        RuleExpr::Seq(items) | RuleExpr::Choice(items) => {
            for item in items {
                collect_literals(item, out);
            }
        }
        RuleExpr::Optional(inner) | RuleExpr::Repeat(inner) | RuleExpr::Repeat1(inner) => {
            collect_literals(inner, out);
        }
    }
}
