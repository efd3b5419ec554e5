//! Evaluator integration tests
//!
//! Each test builds a small grammar and checks the value and the rendered
//! error list of a parse.

use pegterp::engine::grammar::Expr;
use pegterp::prelude::*;
use pegterp::{parse_reader, ErrorKind, Fault, SourcePosition, TraceAction};

fn build(builder: GrammarBuilder<()>) -> Grammar<()> {
    builder.build().unwrap()
}

fn run(grammar: &Grammar<()>, input: &str) -> ParseOutput<()> {
    grammar.parse("", input.as_bytes(), &ParseOptions::default())
}

fn text(s: &str) -> Value<()> {
    Value::Text(s.to_string())
}

// ============================================================================
// Matching semantics
// ============================================================================

#[test]
fn test_ordered_choice_first_match_wins() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a").or(lit("ab"))));
    let out = run(&grammar, "ab");
    assert_eq!(out.value, Some(text("a")));
    assert!(out.errors.is_empty());
}

#[test]
fn test_sequence_value_is_list() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a").then(lit("b"))));
    let out = run(&grammar, "ab");
    assert_eq!(out.value, Some(Value::List(vec![text("a"), text("b")])));
}

#[test]
fn test_repetitions() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a").many()));
    assert_eq!(run(&grammar, "").value, Some(Value::List(vec![])));
    assert_eq!(
        run(&grammar, "aab").value,
        Some(Value::List(vec![text("a"), text("a")]))
    );

    let grammar = build(GrammarBuilder::new().rule("S", lit("a").many1()));
    assert!(run(&grammar, "b").value.is_none());
}

#[test]
fn test_repetition_of_empty_match_terminates() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("x").optional().many()));
    let out = run(&grammar, "yyy");
    assert_eq!(out.value, Some(Value::List(vec![Value::Nil])));
}

#[test]
fn test_optional_yields_nil() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a").optional().then(lit("b"))));
    let out = run(&grammar, "b");
    assert_eq!(out.value, Some(Value::List(vec![Value::Nil, text("b")])));
}

#[test]
fn test_lookaheads_consume_nothing() {
    let grammar = build(
        GrammarBuilder::new().rule(
            "S",
            seq(vec![
                dynamic(lit("a").lookahead()),
                dynamic(lit("b").not_ahead()),
                dynamic(any()),
            ]),
        ),
    );
    let out = run(&grammar, "ac");
    assert_eq!(
        out.value,
        Some(Value::List(vec![Value::Nil, Value::Nil, text("a")]))
    );
    assert!(run(&grammar, "b").value.is_none());
}

#[test]
fn test_case_insensitive_literal() {
    let grammar = build(GrammarBuilder::new().rule("S", lit_i("HeLLo")));
    assert_eq!(run(&grammar, "hello").value, Some(text("hello")));

    let out = run(&grammar, "help");
    assert_eq!(
        out.errors.to_string(),
        "1:1 (0): no match found, expected: \"HeLLo\"i"
    );
}

#[test]
fn test_unicode_category_class() {
    let grammar = build(GrammarBuilder::new().rule(
        "S",
        class(CharClass::new().category("L")).many1(),
    ));
    let out = run(&grammar, "héllo1");
    assert_eq!(
        out.value.as_ref().and_then(Value::as_list).map(<[_]>::len),
        Some(5)
    );

    let bad = GrammarBuilder::<()>::new()
        .rule("S", class(CharClass::new().category("NoSuchCategory")))
        .build();
    assert_eq!(
        bad.err(),
        Some(GrammarError::UnknownCategory("NoSuchCategory".into()))
    );
}

#[test]
fn test_multibyte_positions() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("é").then(lit("x"))));
    let out = run(&grammar, "éy");
    assert_eq!(
        out.errors.to_string(),
        "1:2 (2): no match found, expected: \"x\""
    );
}

#[test]
fn test_newline_starts_next_line() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a\n").then(lit("x"))));
    let out = run(&grammar, "a\nb");
    assert_eq!(
        out.errors.to_string(),
        "2:1 (2): no match found, expected: \"x\""
    );
}

// ============================================================================
// Labels and callbacks
// ============================================================================

#[test]
fn test_action_sees_labels() {
    let grammar = build(
        GrammarBuilder::new()
            .rule(
                "S",
                lit("a").label("x").then(lit("b").label("y")).map("pair"),
            )
            .action("pair", |ctx| {
                let x = ctx.get("x").and_then(Value::as_text).unwrap_or("?");
                let y = ctx.get("y").and_then(Value::as_text).unwrap_or("?");
                Ok(Value::Text(format!("{}{}@{}", x, y, ctx.position().offset)))
            }),
    );
    assert_eq!(run(&grammar, "ab").value, Some(text("ab@0")));
}

#[test]
fn test_labels_do_not_leak_out_of_rules() {
    let grammar = build(
        GrammarBuilder::new()
            .rule("S", rule_ref("Inner").then(lit("!")).map("check"))
            .rule("Inner", lit("a").label("x"))
            .action("check", |ctx| {
                Ok(Value::Text(format!("{}:{}", ctx.bindings().len(), ctx.text())))
            }),
    );
    assert_eq!(run(&grammar, "a!").value, Some(text("0:a!")));
}

#[test]
fn test_later_binding_shadows_earlier() {
    let grammar = build(
        GrammarBuilder::new()
            .rule(
                "S",
                lit("a").label("x").then(lit("b").label("x")).map("last"),
            )
            .action("last", |ctx| Ok(ctx.get("x").cloned().unwrap_or_default())),
    );
    assert_eq!(run(&grammar, "ab").value, Some(text("b")));
}

#[test]
fn test_action_error_keeps_match() {
    let grammar = build(
        GrammarBuilder::new()
            .rule("S", lit("a").map("fail").then(lit("b")))
            .action("fail", |_| Err(ActionError::new("nope"))),
    );
    let out = run(&grammar, "ab");
    assert_eq!(out.value, Some(Value::List(vec![Value::Nil, text("b")])));
    assert_eq!(out.errors.to_string(), "1:1 (0): rule \"S\": nope");
    assert!(!out.is_success());
}

#[test]
fn test_predicates() {
    let grammar = build(
        GrammarBuilder::new()
            .rule(
                "S",
                seq(vec![
                    dynamic(and_pred("at_start")),
                    dynamic(lit("a")),
                    dynamic(not_pred("at_start")),
                ]),
            )
            .predicate("at_start", |ctx| Ok(ctx.position().offset == 0)),
    );
    assert!(run(&grammar, "a").is_success());

    let grammar = build(
        GrammarBuilder::new()
            .rule("S", not_pred("broken").then(lit("a")))
            .predicate("broken", |_| Err(ActionError::new("predicate failed"))),
    );
    let out = run(&grammar, "a");
    // an erroring predicate counts as false, so the negation holds
    assert_eq!(out.value, Some(Value::List(vec![Value::Nil, text("a")])));
    assert_eq!(out.errors.to_string(), "1:1 (0): rule \"S\": predicate failed");
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_farthest_failure_expected_set() {
    let grammar = build(
        GrammarBuilder::new().rule("S", lit("a").then(lit("b").or(lit("c")))),
    );
    let out = run(&grammar, "ax");
    assert!(out.value.is_none());
    assert_eq!(
        out.errors.to_string(),
        "1:2 (1): no match found, expected: \"b\" or \"c\""
    );
}

#[test]
fn test_farthest_failure_from_abandoned_alternative() {
    let grammar = build(GrammarBuilder::new().rule(
        "S",
        lit("ab").then(lit("c")).or(lit("a").then(lit("x"))),
    ));
    for memoize in [false, true] {
        let options = ParseOptions::default().with_memoize(memoize);
        let out = grammar.parse("", b"abz", &options);
        assert!(out.value.is_none());
        assert_eq!(
            out.errors.to_string(),
            "1:3 (2): no match found, expected: \"c\""
        );
    }
}

#[test]
fn test_farthest_failure_on_later_line() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a\nb\n").then(lit("c"))));
    let out = run(&grammar, "a\nb\nz");
    assert_eq!(
        out.errors.to_string(),
        "3:1 (4): no match found, expected: \"c\""
    );
}

#[test]
fn test_expected_eof_sorts_last() {
    let grammar = build(GrammarBuilder::new().rule(
        "S",
        choice(vec![
            dynamic(lit("a").then(eof())),
            dynamic(lit("a").then(lit("c"))),
        ]),
    ));
    let out = run(&grammar, "ab");
    assert_eq!(
        out.errors.to_string(),
        "1:2 (1): no match found, expected: \"c\" or EOF"
    );
}

#[test]
fn test_undefined_rule_reported_once() {
    let grammar = build(GrammarBuilder::new().rule(
        "S",
        rule_ref("Missing").or(lit("x").then(rule_ref("Missing"))),
    ));
    let out = run(&grammar, "x");
    assert!(out.value.is_none());
    assert_eq!(out.errors.messages(), vec!["1:1 (0): rule \"S\": undefined rule: Missing"]);
    assert!(matches!(
        out.errors.iter().next().map(|e| &e.kind),
        Some(ErrorKind::UndefinedRule(name)) if name == "Missing"
    ));
}

#[test]
fn test_invalid_encoding() {
    let grammar = build(GrammarBuilder::new().rule("S", any().many()));
    let out = grammar.parse("bin", b"a\xffb", &ParseOptions::default());
    assert_eq!(out.value, Some(Value::List(vec![text("a")])));
    assert_eq!(out.errors.to_string(), "bin:1:2 (1): rule \"S\": invalid encoding");

    let out = grammar.parse("bin", b"\xff", &ParseOptions::default());
    assert_eq!(out.errors.to_string(), "bin:1:1 (0): invalid encoding");
}

#[test]
fn test_invalid_encoding_reported_once_per_offset() {
    let grammar = build(
        GrammarBuilder::new()
            .rule("S", rule_ref("A").or(rule_ref("B")))
            .rule("A", lit("a").then(any()).then(lit("z")))
            .rule("B", lit("a").then(any().optional())),
    );
    for memoize in [false, true] {
        let options = ParseOptions::default().with_memoize(memoize);
        let out = grammar.parse("", b"a\xff", &options);
        assert!(out.value.is_some());
        // B reads the same byte again; only the first read is reported
        assert_eq!(out.errors.messages(), vec!["1:2 (1): rule \"A\": invalid encoding"]);
    }
}

#[test]
fn test_no_rules() {
    let json = r#"{"rules": [], "nodes": []}"#;
    let grammar: Grammar<()> = Grammar::from_json(json, Actions::new()).unwrap();
    let out = grammar.parse("empty", b"anything", &ParseOptions::default());
    assert!(out.value.is_none());
    assert_eq!(out.errors.to_string(), "empty:1:1 (0): grammar has no rule");
}

#[test]
fn test_display_name_in_context() {
    let grammar = build(
        GrammarBuilder::new()
            .rule_as("Start", "start", rule_ref("Num"))
            .rule_as("Num", "number", lit("1").map("boom"))
            .action("boom", |_| Err(ActionError::new("bad number"))),
    );
    let out = grammar.parse("calc", b"1", &ParseOptions::default());
    assert_eq!(out.errors.to_string(), "calc:1:1 (0): rule \"number\": bad number");
}

// ============================================================================
// Internal faults
// ============================================================================

fn missing_name_grammar() -> Grammar<()> {
    let mut def = GrammarDef::new();
    let r = def.push_at(
        SourcePosition::new(12, 2, 5),
        Expr::RuleRef {
            name: String::new(),
        },
    );
    def.add_rule("S", None, r);
    Grammar::new(def, Actions::new()).unwrap()
}

#[test]
fn test_internal_fault_recovered() {
    let out = run(&missing_name_grammar(), "x");
    assert!(out.value.is_none());
    assert_eq!(
        out.errors.to_string(),
        "1:1 (0): rule \"S\": 2:5 (12): invalid rule: missing name"
    );
    assert!(matches!(
        out.errors.iter().next().map(|e| &e.kind),
        Some(ErrorKind::Internal(Fault::MissingRuleName(pos))) if pos.line == 2 && pos.column == 5
    ));
}

#[test]
#[should_panic]
fn test_internal_fault_propagates_without_recover() {
    let options = ParseOptions::default().with_recover(false);
    missing_name_grammar().parse("", b"x", &options);
}

#[test]
fn test_panicking_action_recovered() {
    let grammar = build(
        GrammarBuilder::new()
            .rule("S", lit("ab").map("explode"))
            .action("explode", |_| panic!("boom")),
    );
    let out = run(&grammar, "ab");
    assert!(out.value.is_none());
    assert_eq!(out.errors.to_string(), "1:3 (2): rule \"S\": boom");
}

#[test]
fn test_recursion_limit() {
    let grammar = build(GrammarBuilder::new().rule("S", rule_ref("S").then(lit("a"))));
    let options = ParseOptions::default().with_max_recursion_depth(100);
    for memoize in [false, true] {
        let out = grammar.parse("", b"aaa", &options.clone().with_memoize(memoize));
        assert!(out.value.is_none());
        assert_eq!(
            out.errors.to_string(),
            "1:1 (0): rule \"S\": maximum recursion depth exceeded: 101 > 100"
        );
    }
}

#[test]
fn test_default_limit_stops_left_recursion() {
    let grammar = build(
        GrammarBuilder::new().rule("A", rule_ref("A").then(lit("x")).or(lit("x"))),
    );
    let out = run(&grammar, "xx");
    assert!(out.value.is_none());
    assert_eq!(
        out.errors.to_string(),
        "1:1 (0): rule \"A\": maximum recursion depth exceeded: 1001 > 1000"
    );
}

#[test]
fn test_deep_right_recursion_within_default_limit() {
    let grammar = build(
        GrammarBuilder::new().rule("List", lit("a").then(rule_ref("List")).or(lit(""))),
    );
    let input = "a".repeat(900);
    for memoize in [false, true] {
        let options = ParseOptions::default().with_memoize(memoize);
        let out = grammar.parse("", input.as_bytes(), &options);
        assert!(out.is_success(), "{}", out.errors);
        assert!(out.errors.is_empty());
    }
}

// ============================================================================
// Grammar loading, tracing and input helpers
// ============================================================================

#[test]
fn test_json_grammar_with_actions() {
    let json = r#"{
        "rules": [
            { "name": "Word", "display_name": "word", "expr": 2 }
        ],
        "nodes": [
            { "expr": { "CharClass": { "ranges": [["a", "z"]] } } },
            { "expr": { "OneOrMore": { "expr": 0 } } },
            { "expr": { "Action": { "expr": 1, "action": "upper" } } }
        ]
    }"#;
    let actions = Actions::new().action("upper", |ctx| Ok(Value::Text(ctx.text().to_uppercase())));
    let grammar: Grammar<()> = Grammar::from_json(json, actions).unwrap();
    assert_eq!(run(&grammar, "abc").value, Some(text("ABC")));

    let out = run(&grammar, "1");
    assert_eq!(
        out.errors.to_string(),
        "1:1 (0): no match found, expected: [a-z]"
    );

    let reloaded: Grammar<()> = Grammar::from_json(
        &grammar.to_json().unwrap(),
        Actions::new().action("upper", |_| Ok(Value::Nil)),
    )
    .unwrap();
    assert_eq!(reloaded.def(), grammar.def());
}

#[test]
fn test_unbound_action_rejected() {
    let json = r#"{
        "rules": [ { "name": "S", "expr": 1 } ],
        "nodes": [
            { "expr": "AnyChar" },
            { "expr": { "Action": { "expr": 0, "action": "nowhere" } } }
        ]
    }"#;
    let result = Grammar::<()>::from_json(json, Actions::new());
    assert_eq!(result.err(), Some(GrammarError::UnboundAction("nowhere".into())));
}

#[test]
fn test_debug_trace() {
    let grammar = build(
        GrammarBuilder::new()
            .rule("S", rule_ref("A").then(rule_ref("A")))
            .rule("A", lit("a")),
    );
    let options = ParseOptions::default().with_debug(true);
    let out = grammar.parse("", b"aa", &options);
    let trace = out.trace.expect("trace requested");

    assert_eq!(trace.count(TraceAction::Fail), 0);
    let listing = trace.format(&grammar);
    assert!(listing.starts_with("-> rule S at 1:1 (0)\n"));
    assert!(listing.contains("-> rule A at 1:2 (1)"));

    assert!(run(&grammar, "aa").trace.is_none());
}

#[test]
fn test_parse_reader() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("hi")));
    let reader = std::io::Cursor::new(b"hi".to_vec());
    let out = parse_reader(&grammar, "stdin", reader, &ParseOptions::default()).unwrap();
    assert!(out.is_success());
}

#[test]
fn test_into_result() {
    let grammar = build(GrammarBuilder::new().rule("S", lit("a")));
    assert_eq!(run(&grammar, "a").into_result(), Ok(text("a")));

    let err = run(&grammar, "b").into_result().unwrap_err();
    assert_eq!(err.len(), 1);
}
