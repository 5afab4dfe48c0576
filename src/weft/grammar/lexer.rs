//! Token definitions for the grammar DSL
//!
//! The DSL is tokenized entirely by logos. Whitespace and `#` line comments
//! are skipped; every statement is introduced by a keyword, so newlines carry
//! no meaning.

use logos::Logos;

/// All tokens of the grammar DSL
#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("grammar")]
    Grammar,
    #[token("start")]
    Start,
    #[token("token")]
    TokenKw,
    #[token("skip")]
    Skip,
    #[token("external")]
    External,
    #[token("rule")]
    Rule,
    #[token("hidden")]
    Hidden,
    #[token("inline")]
    Inline,
    #[token("prec")]
    Prec,
    #[token("left")]
    Left,
    #[token("right")]
    Right,
    #[token("nonassoc")]
    Nonassoc,
    #[token("glr")]
    Glr,

    #[token("=")]
    Eq,
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u32>().ok())]
    Int(u32),

    // "quoted string" with backslash escapes
    #[regex(r#""(\\.|[^"\\])*""#, unquote_literal)]
    Literal(String),

    // /regex pattern/; only \/ is translated, other escapes are kept for the
    // regex engine
    #[regex(r"/(\\.|[^/\\])+/", unquote_pattern)]
    Pattern(String),
}

fn unquote_literal(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unquote_pattern(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    inner.replace("\\/", "/")
}

/// Tokenize DSL source, pairing each token with its byte range.
///
/// Returns the offset of the first unreadable character on failure.
pub fn tokenize(source: &str) -> Result<Vec<(Token, std::ops::Range<usize>)>, usize> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span().start),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("rule document = element"),
            vec![
                Token::Rule,
                Token::Ident("document".to_string()),
                Token::Eq,
                Token::Ident("element".to_string()),
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_stays_ident() {
        assert_eq!(kinds("rules"), vec![Token::Ident("rules".to_string())]);
        assert_eq!(kinds("tokens"), vec![Token::Ident("tokens".to_string())]);
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(
            kinds(r#"token nl = "\n""#),
            vec![
                Token::TokenKw,
                Token::Ident("nl".to_string()),
                Token::Eq,
                Token::Literal("\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_pattern_keeps_regex_escapes() {
        let tokens = kinds(r"token name = /[a-z\d]+/");
        assert_eq!(tokens[3], Token::Pattern(r"[a-z\d]+".to_string()));
    }

    #[test]
    fn test_pattern_escaped_slash() {
        let tokens = kinds(r"token path = /a\/b/");
        assert_eq!(tokens[3], Token::Pattern("a/b".to_string()));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("# heading\nglr # trailing"),
            vec![Token::Glr]
        );
    }

    #[test]
    fn test_unreadable_character_reports_offset() {
        assert_eq!(tokenize("rule a = @"), Err(9));
    }
}
