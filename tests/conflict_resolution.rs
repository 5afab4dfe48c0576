//! Integration tests for conflict resolution
//!
//! The comparator order is fixed: explicit precedence (higher wins), then
//! associativity at equal precedence, then rule declaration order, then a
//! GLR branch when the grammar opted in; otherwise compilation fails with
//! the two competing rules and the lookahead named.

use weft::weft::grammar::GrammarDescription;
use weft::weft::language::Language;
use weft::weft::tables::Resolution;
use weft::weft::{compile, compile_with_diagnostics, CompileError};

fn language_for(dsl: &str) -> Language {
    let artifact = compile(&GrammarDescription::from_dsl(dsl).unwrap()).unwrap();
    Language::load(artifact.bytes()).unwrap()
}

#[test]
fn test_higher_precedence_wins_regardless_of_declaration_order() {
    // p and q both match a single `a`; q carries the higher precedence
    let q_last = "token a = \"a\"\nrule s = p | q\nrule p prec 1 = a\nrule q prec 2 = a";
    let q_first = "token a = \"a\"\nrule s = p | q\nrule q prec 2 = a\nrule p prec 1 = a";

    for dsl in [q_last, q_first] {
        let language = language_for(dsl);
        let tree = language.session().parse("a").unwrap();
        assert_eq!(
            tree.root().child(0).map(|n| n.kind()),
            Some("q"),
            "precedence 2 must win in {dsl:?}"
        );
    }
}

#[test]
fn test_precedence_resolution_is_recorded() {
    let description = GrammarDescription::from_dsl(
        "token a = \"a\"\nrule s = p | q\nrule p prec 1 = a\nrule q prec 2 = a",
    )
    .unwrap();
    let (_, diagnostics) = compile_with_diagnostics(&description).unwrap();
    assert!(diagnostics
        .iter()
        .any(|record| record.resolution == Resolution::Precedence));
}

#[test]
fn test_left_associativity_groups_to_the_left() {
    let language = language_for(
        "token n = /[0-9]+/\ntoken plus = \"+\"\nskip token ws = / +/\nhidden rule expr = sum | n\nrule sum prec 1 left = expr plus expr",
    );
    let tree = language.session().parse("1 + 2 + 3").unwrap();
    let root = tree.root();
    assert_eq!(root.kind(), "sum");
    // (1 + 2) + 3
    assert_eq!(root.child(0).map(|n| n.kind()), Some("sum"));
    assert_eq!(root.child(2).map(|n| n.kind()), Some("n"));
}

#[test]
fn test_right_associativity_groups_to_the_right() {
    let language = language_for(
        "token n = /[0-9]+/\ntoken pow = \"^\"\nskip token ws = / +/\nhidden rule expr = power | n\nrule power prec 1 right = expr pow expr",
    );
    let tree = language.session().parse("1 ^ 2 ^ 3").unwrap();
    let root = tree.root();
    assert_eq!(root.kind(), "power");
    // 1 ^ (2 ^ 3)
    assert_eq!(root.child(0).map(|n| n.kind()), Some("n"));
    assert_eq!(root.child(2).map(|n| n.kind()), Some("power"));
}

#[test]
fn test_precedence_levels_nest_products_inside_sums() {
    let language = language_for(
        "token n = /[0-9]+/\ntoken plus = \"+\"\ntoken star = \"*\"\nskip token ws = / +/\nhidden rule expr = sum | product | n\nrule sum prec 1 left = expr plus expr\nrule product prec 2 left = expr star expr",
    );
    let tree = language.session().parse("1 + 2 * 3").unwrap();
    let root = tree.root();
    assert_eq!(root.kind(), "sum");
    assert_eq!(root.child(2).map(|n| n.kind()), Some("product"));
}

#[test]
fn test_nonassoc_conflict_is_a_hard_error() {
    let description = GrammarDescription::from_dsl(
        "token n = /[0-9]+/\ntoken less = \"<\"\nhidden rule expr = cmp | n\nrule cmp prec 1 nonassoc = expr less expr",
    )
    .unwrap();
    match compile(&description) {
        Err(CompileError::Conflicts(errors)) => {
            assert!(errors
                .iter()
                .any(|e| e.reason.contains("non-associative")));
        }
        other => panic!("expected conflict errors, got {other:?}"),
    }
}

#[test]
fn test_unresolved_ambiguity_names_rules_and_lookahead() {
    let description =
        GrammarDescription::from_dsl("token x = \"x\"\nrule s = s s | x").unwrap();
    match compile(&description) {
        Err(CompileError::Conflicts(errors)) => {
            assert!(!errors.is_empty());
            let error = &errors[0];
            assert_eq!(error.first_rule, "s");
            assert_eq!(error.second_rule, "s");
            assert_eq!(error.lookahead, "x");
            let rendered = error.to_string();
            assert!(rendered.contains("`s`"));
            assert!(rendered.contains("`x`"));
        }
        other => panic!("expected conflict errors, got {other:?}"),
    }
}

#[test]
fn test_glr_opt_in_turns_the_same_grammar_compilable() {
    let ambiguous = "token x = \"x\"\nrule s = s s | x";
    let with_glr = format!("glr\n{ambiguous}");

    assert!(matches!(
        compile(&GrammarDescription::from_dsl(ambiguous).unwrap()),
        Err(CompileError::Conflicts(_))
    ));

    let description = GrammarDescription::from_dsl(&with_glr).unwrap();
    let (_, diagnostics) = compile_with_diagnostics(&description).unwrap();
    assert!(diagnostics
        .iter()
        .any(|record| record.resolution == Resolution::GlrBranch));

    let language = language_for(&with_glr);
    assert!(language.glr());
    let tree = language.session().parse("xxxx").unwrap();
    assert_eq!(tree.root().kind(), "s");
}

#[test]
fn test_declaration_order_breaks_untyped_ties() {
    // dangling-else flavored: both rules can absorb `a`; the earlier rule wins
    let language = language_for(
        "token a = \"a\"\nrule s = first | second\nrule first = a\nrule second = a",
    );
    let tree = language.session().parse("a").unwrap();
    assert_eq!(tree.root().child(0).map(|n| n.kind()), Some("first"));
}
