//! Parser for the grammar DSL
//!
//! Combinator-based parser over `(Token, Range<usize>)` pairs produced by
//! the lexer. The DSL is statement-oriented; every statement begins with a
//! keyword, so no terminator tokens are needed:
//!
//! ```text
//! # arithmetic over markup attribute values
//! grammar calc
//! token number = /[0-9]+/
//! skip token ws = /[ \t]+/
//! rule sum prec 1 left = expr "+" expr
//! hidden rule expr = sum | number
//! ```

use chumsky::prelude::*;
use std::ops::Range;

use crate::weft::grammar::ast::{
    Assoc, GrammarDescription, GrammarSourceError, Precedence, RuleDescription, RuleExpr,
    TokenDescription, TokenKind,
};
use crate::weft::grammar::lexer::{self, Token};

/// Type alias for token with location
type TokenLocation = (Token, Range<usize>);

/// Type alias for parser error
type ParserError = Simple<TokenLocation>;

/// One DSL statement, in source order
#[derive(Debug, Clone)]
enum Stmt {
    Name(String),
    Start(String),
    Glr,
    Token {
        name: String,
        kind: TokenKind,
        skip: bool,
    },
    External(Vec<String>),
    Rule(RuleDescription),
}

fn kw(expected: Token) -> impl Parser<TokenLocation, (), Error = ParserError> + Clone {
    filter(move |(token, _): &TokenLocation| *token == expected).ignored()
}

fn ident() -> impl Parser<TokenLocation, String, Error = ParserError> + Clone {
    filter_map(|span, (token, _): TokenLocation| match token {
        Token::Ident(name) => Ok(name),
        _ => Err(Simple::custom(span, "expected an identifier")),
    })
}

fn integer() -> impl Parser<TokenLocation, u32, Error = ParserError> + Clone {
    filter_map(|span, (token, _): TokenLocation| match token {
        Token::Int(value) => Ok(value),
        _ => Err(Simple::custom(span, "expected a precedence level")),
    })
}

fn unwrap_single(mut items: Vec<RuleExpr>, wrap: fn(Vec<RuleExpr>) -> RuleExpr) -> RuleExpr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

/// Rule body: alternation of sequences of postfix-annotated atoms
fn rule_expr() -> impl Parser<TokenLocation, RuleExpr, Error = ParserError> + Clone {
    recursive(|expr| {
        let literal = filter_map(|span, (token, _): TokenLocation| match token {
            Token::Literal(text) => Ok(RuleExpr::Literal(text)),
            _ => Err(Simple::custom(span, "expected a symbol, literal, or group")),
        });

        let atom = ident()
            .map(RuleExpr::Symbol)
            .or(literal)
            .or(expr
                .clone()
                .delimited_by(kw(Token::LParen), kw(Token::RParen)));

        let postfix_op =
            filter(|(token, _): &TokenLocation| {
                matches!(token, Token::Star | Token::Plus | Token::Question)
            });

        let postfix = atom.then(postfix_op.repeated()).map(|(base, ops)| {
            ops.into_iter().fold(base, |acc, (op, _)| match op {
                Token::Star => RuleExpr::Repeat(Box::new(acc)),
                Token::Plus => RuleExpr::Repeat1(Box::new(acc)),
                _ => RuleExpr::Optional(Box::new(acc)),
            })
        });

        let seq = postfix
            .repeated()
            .at_least(1)
            .map(|items| unwrap_single(items, RuleExpr::Seq));

        seq.separated_by(kw(Token::Pipe))
            .at_least(1)
            .map(|alts| unwrap_single(alts, RuleExpr::Choice))
    })
}

fn statement() -> impl Parser<TokenLocation, Stmt, Error = ParserError> + Clone {
    let grammar_stmt = kw(Token::Grammar).ignore_then(ident()).map(Stmt::Name);
    let start_stmt = kw(Token::Start).ignore_then(ident()).map(Stmt::Start);
    let glr_stmt = kw(Token::Glr).to(Stmt::Glr);

    let token_kind = filter_map(|span, (token, _): TokenLocation| match token {
        Token::Literal(text) => Ok(TokenKind::Literal(text)),
        Token::Pattern(text) => Ok(TokenKind::Pattern(text)),
        _ => Err(Simple::custom(span, "expected a \"literal\" or /pattern/")),
    });
    let token_stmt = kw(Token::Skip)
        .or_not()
        .then_ignore(kw(Token::TokenKw))
        .then(ident())
        .then_ignore(kw(Token::Eq))
        .then(token_kind)
        .map(|((skip, name), kind)| Stmt::Token {
            name,
            kind,
            skip: skip.is_some(),
        });

    let external_stmt = kw(Token::External)
        .ignore_then(ident().repeated().at_least(1))
        .map(Stmt::External);

    let modifiers = filter(|(token, _): &TokenLocation| {
        matches!(token, Token::Hidden | Token::Inline)
    })
    .repeated();
    let assoc = filter_map(|span, (token, _): TokenLocation| match token {
        Token::Left => Ok(Assoc::Left),
        Token::Right => Ok(Assoc::Right),
        Token::Nonassoc => Ok(Assoc::NonAssoc),
        _ => Err(Simple::custom(span, "expected left, right, or nonassoc")),
    });
    let prec = kw(Token::Prec)
        .ignore_then(integer())
        .then(assoc.or_not())
        .map(|(level, assoc)| Precedence { level, assoc });
    let rule_stmt = modifiers
        .then_ignore(kw(Token::Rule))
        .then(ident())
        .then(prec.or_not())
        .then_ignore(kw(Token::Eq))
        .then(rule_expr())
        .map(|(((mods, name), prec), expr)| {
            Stmt::Rule(RuleDescription {
                name,
                hidden: !mods.is_empty(),
                prec,
                expr,
            })
        });

    grammar_stmt
        .or(start_stmt)
        .or(glr_stmt)
        .or(token_stmt)
        .or(external_stmt)
        .or(rule_stmt)
}

/// Parse DSL source into a grammar description.
pub fn parse_dsl(source: &str) -> Result<GrammarDescription, GrammarSourceError> {
    let tokens = lexer::tokenize(source).map_err(|offset| GrammarSourceError::Lex {
        offset,
        message: "unreadable character".to_string(),
    })?;

    let program = statement().repeated().then_ignore(end());
    let stmts = program
        .parse(tokens.clone())
        .map_err(|errors| render_error(&errors, &tokens, source))?;

    let mut description = GrammarDescription {
        name: "unnamed".to_string(),
        start: None,
        glr: false,
        tokens: Vec::new(),
        externals: Vec::new(),
        rules: Vec::new(),
    };
    for stmt in stmts {
        match stmt {
            Stmt::Name(name) => description.name = name,
            Stmt::Start(name) => description.start = Some(name),
            Stmt::Glr => description.glr = true,
            Stmt::Token { name, kind, skip } => {
                description.tokens.push(TokenDescription { name, kind, skip })
            }
            Stmt::External(names) => description.externals.extend(names),
            Stmt::Rule(rule) => description.rules.push(rule),
        }
    }
    Ok(description)
}

fn render_error(
    errors: &[ParserError],
    tokens: &[TokenLocation],
    source: &str,
) -> GrammarSourceError {
    let Some(err) = errors.first() else {
        return GrammarSourceError::Parse {
            offset: 0,
            message: "invalid grammar source".to_string(),
        };
    };
    let index = err.span().start;
    let offset = tokens
        .get(index)
        .map(|(_, range)| range.start)
        .unwrap_or(source.len());
    let message = match err.reason() {
        chumsky::error::SimpleReason::Custom(msg) => msg.clone(),
        _ => match tokens.get(index) {
            Some((token, _)) => format!("unexpected {:?}", token),
            None => "unexpected end of input".to_string(),
        },
    };
    GrammarSourceError::Parse { offset, message }
}
