//! End-to-end: compile a markup grammar, load it, and parse documents with
//! an external scanner recognizing raw text between tags.
//!
//! The scanner follows the usual markup contract: consume until the next
//! `<`, report a match only if something was consumed, and leave the cursor
//! untouched on failure so the built-in lexer can try the tag tokens.

use weft::weft::compile;
use weft::weft::grammar::{GrammarDescription, SymbolId};
use weft::weft::language::{Language, Node, ParseError};
use weft::weft::scanner::{ExternalScanner, ScanCursor, ValidSymbols};

const MARKUP_GRAMMAR: &str = r#"
grammar markup

token lt = "<"
token lt_slash = "</"
token gt = ">"
token slash_gt = "/>"
token eq = "="
token name = /[a-zA-Z_][a-zA-Z0-9_-]*/
token string = /"[^"]*"/
skip token ws = /[ \t\r\n]+/

external raw_text

rule document = element
rule element = tag_start gt content close_tag | tag_start slash_gt
rule tag_start = lt name attribute*
rule attribute = name eq string
rule close_tag = lt_slash name gt
hidden rule content = (element | raw_text)*
"#;

/// Raw text runs to the next `<`; empty runs are no match.
struct RawTextScanner {
    raw_text: SymbolId,
}

impl ExternalScanner for RawTextScanner {
    fn scan(&mut self, cursor: &mut ScanCursor<'_>, valid: &ValidSymbols) -> Option<SymbolId> {
        if !valid.contains(self.raw_text) {
            return None;
        }
        let mut has_content = false;
        while let Some(c) = cursor.lookahead() {
            if c == '<' {
                break;
            }
            cursor.advance();
            has_content = true;
        }
        if has_content {
            cursor.mark_end();
            Some(self.raw_text)
        } else {
            None
        }
    }
}

/// A scanner that moves its cursor and then gives up; the engine must
/// discard the cursor so the tag tokens still lex from the same position.
struct GreedyFailingScanner;

impl ExternalScanner for GreedyFailingScanner {
    fn scan(&mut self, cursor: &mut ScanCursor<'_>, _valid: &ValidSymbols) -> Option<SymbolId> {
        cursor.advance();
        cursor.advance();
        None
    }
}

fn markup_language() -> Language {
    let description = GrammarDescription::from_dsl(MARKUP_GRAMMAR).unwrap();
    let artifact = compile(&description).unwrap();
    Language::load(artifact.bytes()).unwrap()
}

fn raw_text_scanner(language: &Language) -> Box<RawTextScanner> {
    Box::new(RawTextScanner {
        raw_text: language.symbol_id("raw_text").unwrap(),
    })
}

fn kinds(node: &Node) -> Vec<&str> {
    node.children().iter().map(|child| child.kind()).collect()
}

#[test]
fn test_simple_element_with_raw_text() {
    let language = markup_language();
    let scanner = raw_text_scanner(&language);
    let source = "<wxs>alert(1)</wxs>";
    let tree = language
        .session()
        .with_scanner(scanner)
        .parse(source)
        .unwrap();

    let document = tree.root();
    assert_eq!(document.kind(), "document");
    let element = document.child(0).unwrap();
    assert_eq!(element.kind(), "element");
    assert_eq!(
        kinds(element),
        vec!["tag_start", "gt", "raw_text", "close_tag"]
    );
    let raw = element.child(2).unwrap();
    assert_eq!(raw.text(source), "alert(1)");
}

#[test]
fn test_raw_text_may_contain_tag_like_punctuation() {
    let language = markup_language();
    let source = "<wxs>var a = data[0] > 1;</wxs>";
    let tree = language
        .session()
        .with_scanner(raw_text_scanner(&language))
        .parse(source)
        .unwrap();
    let element = tree.root().child(0).unwrap();
    let raw = element.child(2).unwrap();
    assert_eq!(raw.kind(), "raw_text");
    assert_eq!(raw.text(source), "var a = data[0] > 1;");
}

#[test]
fn test_nested_elements() {
    let language = markup_language();
    let source = "<view><text>hi</text><image src=\"a.png\"/></view>";
    let tree = language
        .session()
        .with_scanner(raw_text_scanner(&language))
        .parse(source)
        .unwrap();

    let outer = tree.root().child(0).unwrap();
    assert_eq!(
        kinds(outer),
        vec!["tag_start", "gt", "element", "element", "close_tag"]
    );
    let text_element = outer.child(2).unwrap();
    assert_eq!(text_element.child(2).map(|n| n.kind()), Some("raw_text"));

    let image_element = outer.child(3).unwrap();
    assert_eq!(kinds(image_element), vec!["tag_start", "slash_gt"]);
    let image_start = image_element.child(0).unwrap();
    assert_eq!(kinds(image_start), vec!["lt", "name", "attribute"]);
}

#[test]
fn test_self_closing_element_without_scanner() {
    // no raw text involved, so the built-in lexer is enough
    let language = markup_language();
    let tree = language.session().parse("<input disabled=\"true\"/>").unwrap();
    let element = tree.root().child(0).unwrap();
    assert_eq!(kinds(element), vec!["tag_start", "slash_gt"]);
}

#[test]
fn test_failed_scan_leaves_position_untouched() {
    let language = markup_language();
    let tree = language
        .session()
        .with_scanner(Box::new(GreedyFailingScanner))
        .parse("<a></a>")
        .unwrap();
    assert_eq!(tree.root().kind(), "document");
}

#[test]
fn test_unclosed_element_is_a_syntax_error() {
    let language = markup_language();
    let error = language
        .session()
        .with_scanner(raw_text_scanner(&language))
        .parse("<view>")
        .unwrap_err();
    match error {
        ParseError::Syntax { offset, .. } => assert_eq!(offset, 6),
        other => panic!("expected a syntax error, got {other}"),
    }
}

#[test]
fn test_mismatched_close_tag_still_parses_as_tree_shape() {
    // tag-name matching is a semantic check, not a grammar check; the parse
    // itself succeeds and exposes both names for later validation
    let language = markup_language();
    let source = "<a></b>";
    let tree = language
        .session()
        .with_scanner(raw_text_scanner(&language))
        .parse(source)
        .unwrap();
    let element = tree.root().child(0).unwrap();
    let open_name = element.child(0).unwrap().child(1).unwrap();
    let close_name = element.child(2).unwrap().child(1).unwrap();
    assert_eq!(open_name.text(source), "a");
    assert_eq!(close_name.text(source), "b");
}

#[test]
fn test_shared_handle_across_concurrent_sessions() {
    let language = markup_language();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let language = language.clone();
            std::thread::spawn(move || {
                let scanner = Box::new(RawTextScanner {
                    raw_text: language.symbol_id("raw_text").unwrap(),
                });
                let source = format!("<item>value-{}</item>", i);
                let tree = language
                    .session()
                    .with_scanner(scanner)
                    .parse(&source)
                    .unwrap();
                tree.root().kind().to_string()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), "document");
    }
}
