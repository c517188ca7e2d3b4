use composer::directive::{self, Directive};
use composer::{ComposeError, binding, context::ContextStack};
use doctree::SectionKind;
use serde_json::{Value, json};

fn compose_doc(template: &str, data: Value) -> composer::Composed {
    let doc = doctree::Parser::new(template.to_string(), 0).parse();
    composer::compose(&doc, &data).expect("compose failed")
}

fn run(template: &str, data: Value) -> String {
    compose_doc(template, data).document.to_markdown()
}

fn run_trimmed(template: &str, data: Value) -> String {
    run(template, data).trim().to_string()
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

#[test]
fn inline_substitution() {
    assert_eq!(
        run_trimmed("Hello `@{name}`!", json!({"name": "Ada"})),
        "Hello Ada!"
    );
}

#[test]
fn scalar_stringification() {
    assert_eq!(
        run_trimmed("`@{count}` of `@{done}`", json!({"count": 3, "done": true})),
        "3 of true"
    );
}

#[test]
fn block_substitution_produces_paragraph() {
    assert_eq!(
        run_trimmed("`@{title}`", json!({"title": "Quarterly Report"})),
        "Quarterly Report"
    );
}

#[test]
fn cell_substitution_keeps_table_shape() {
    let template = "| `@{x}` | y |\n| --- | --- |";
    assert_eq!(
        run_trimmed(template, json!({"x": 1})),
        "| 1 | y |\n| --- | --- |"
    );
}

#[test]
fn unresolved_binding_left_untouched() {
    assert_eq!(
        run_trimmed("`@{missing}` and `@{present}`", json!({"present": "ok"})),
        "`@{missing}` and ok"
    );
}

#[test]
fn null_suppresses_substitution() {
    assert_eq!(run_trimmed("`@{x}`", json!({"x": null})), "`@{x}`");
}

#[test]
fn nested_path_with_index() {
    let data = json!({"order": {"items": [{"name": "bolt"}, {"name": "widget"}]}});
    assert_eq!(run_trimmed("`@{order.items[1].name}`", data), "widget");
}

#[test]
fn non_scalar_substitutes_compact_json() {
    assert_eq!(
        run_trimmed("`@{obj}`", json!({"obj": {"a": 1}})),
        "{\"a\":1}"
    );
}

#[test]
fn malformed_expression_is_noop() {
    assert_eq!(run_trimmed("`@{a..b}`", json!({"a": {"b": 1}})), "`@{a..b}`");
}

// ---------------------------------------------------------------------------
// Context stack
// ---------------------------------------------------------------------------

#[test]
fn context_scopes_bindings() {
    let template = "`@Context{customer}`\n\n`@{name}`\n\n`@EndContext`";
    assert_eq!(
        run_trimmed(template, json!({"customer": {"name": "Ada"}})),
        "Ada"
    );
}

#[test]
fn named_scope_resolves_below_stack_top() {
    let template = "`@Context[outer]{customer}`\n\n`@Context{order}`\n\n`@[outer]{name}` `@{id}`\n\n`@EndContext`\n\n`@EndContext`";
    let data = json!({"customer": {"name": "Ada"}, "order": {"id": 7}});
    assert_eq!(run_trimmed(template, data), "Ada 7");
}

#[test]
fn null_scope_degrades_to_noop() {
    let template = "`@Context{missing}`\n\n`@{name}`\n\n`@EndContext`";
    assert_eq!(run_trimmed(template, json!({"name": "x"})), "`@{name}`");
}

#[test]
fn end_context_on_empty_stack_is_noop() {
    // The first pop drains the root scope; the second pops an empty
    // stack. Both placeholders are still consumed.
    let template = "`@EndContext`\n\n`@EndContext`\n\n`@{name}`";
    assert_eq!(run_trimmed(template, json!({"name": "x"})), "`@{name}`");
}

#[test]
fn unknown_named_scope_is_noop() {
    assert_eq!(
        run_trimmed("`@[nope]{name}`", json!({"name": "x"})),
        "`@[nope]{name}`"
    );
}

// ---------------------------------------------------------------------------
// Block-range repeat
// ---------------------------------------------------------------------------

#[test]
fn repeat_clones_template_range_per_element() {
    let template = "`@Repeat{items}`\n\n`@{name}`\n\n`@EndRepeat`";
    let data = json!({"items": [{"name": "a"}, {"name": "b"}, {"name": "c"}]});
    assert_eq!(run_trimmed(template, data), "a\n\nb\n\nc");
}

#[test]
fn repeat_zero_length_leaves_empty_gap() {
    let template = "before\n\n`@Repeat{items}`\n\n`@{name}`\n\n`@EndRepeat`\n\nafter";
    assert_eq!(
        run_trimmed(template, json!({"items": []})),
        "before\n\nafter"
    );
}

#[test]
fn repeat_non_array_stays_literal() {
    let template = "`@Repeat{items}`\n\n`@{name}`\n\n`@EndRepeat`";
    assert_eq!(
        run_trimmed(template, json!({"items": "not an array"})),
        "`@Repeat{items}`\n\n`@{name}`\n\n`@EndRepeat`"
    );
}

#[test]
fn nested_repeat_expands_outer_first_then_clones() {
    let template = "`@Repeat{groups}`\n\n`@Repeat{inner}`\n\n`@{v}`\n\n`@EndRepeat`\n\n`@EndRepeat`";
    let data = json!({
        "groups": [
            {"inner": [{"v": 1}, {"v": 2}]},
            {"inner": [{"v": 3}]},
        ]
    });
    assert_eq!(run_trimmed(template, data), "1\n\n2\n\n3");
}

#[test]
fn repeat_within_one_paragraph() {
    let template = "`@Repeat{items}` `@{name}` `@EndRepeat`";
    let data = json!({"items": [{"name": "a"}, {"name": "b"}]});
    assert_eq!(run_trimmed(template, data), "a  b");
}

#[test]
fn repeat_scope_closes_after_end() {
    let template = "`@Repeat{items}`\n\n`@{name}`\n\n`@EndRepeat`\n\n`@{version}`";
    let data = json!({"items": [{"name": "a"}, {"name": "b"}], "version": "v9"});
    assert_eq!(run_trimmed(template, data), "a\n\nb\n\nv9");
}

#[test]
fn unclosed_repeat_reports_diagnostic_and_truncates_pass() {
    let template = "`@Repeat{items}`\n\n`@{name}`";
    let composed = compose_doc(template, json!({"items": [1, 2], "name": "x"}));

    assert_eq!(composed.diagnostics.len(), 1);
    let diag = &composed.diagnostics[0];
    assert!(!diag.is_warning);
    assert!(diag.message.contains("no matching @EndRepeat"));
    assert!(diag.span.is_some());

    // The seek swallowed the rest of the pass: everything stays literal.
    let output = composed.document.to_markdown();
    assert!(output.contains("`@Repeat{items}`"));
    assert!(output.contains("`@{name}`"));
}

#[test]
fn stray_end_repeat_is_unrecognized_text() {
    let composed = compose_doc("`@EndRepeat`", json!({}));
    assert!(composed.diagnostics.is_empty());
    assert_eq!(composed.document.to_markdown().trim(), "`@EndRepeat`");
}

// ---------------------------------------------------------------------------
// Row repeat
// ---------------------------------------------------------------------------

#[test]
fn row_repeat_expands_rows_with_index_tokens() {
    let template = "| Product | Price |\n| --- | --- |\n| `@RowRepeat[i]{products}` `@{products[#i].name}` | `@{prices[#i]}` |";
    let data = json!({
        "products": [{"name": "A"}, {"name": "B"}, {"name": "C"}],
        "prices": [1, 2, 3],
    });
    assert_eq!(
        run_trimmed(template, data),
        "| Product | Price |\n| --- | --- |\n| A | 1 |\n| B | 2 |\n| C | 3 |"
    );
}

#[test]
fn row_repeat_spanning_two_rows() {
    let template = "| H |\n| --- |\n| `@RowRepeat[i,2]{items}` `@{items[#i].a}` |\n| `@{items[#i].b}` |";
    let data = json!({"items": [{"a": "a0", "b": "b0"}, {"a": "a1", "b": "b1"}]});
    assert_eq!(
        run_trimmed(template, data),
        "| H |\n| --- |\n| a0 |\n| b0 |\n| a1 |\n| b1 |"
    );
}

#[test]
fn row_repeat_outside_table_is_noop() {
    assert_eq!(
        run_trimmed("`@RowRepeat[i]{items}`", json!({"items": [1]})),
        "`@RowRepeat[i]{items}`"
    );
}

// ---------------------------------------------------------------------------
// Column repeat
// ---------------------------------------------------------------------------

#[test]
fn col_repeat_span_two_expands_every_row() {
    let template = "| A | `@ColRepeat[i,2]{cols}` `@{cols[#i]}` | C | D |\n| --- | --- | --- | --- |\n| a | `@{cols[#i]}`b | c | d |";
    let data = json!({"cols": ["x", "y"]});
    assert_eq!(
        run_trimmed(template, data),
        "| A | x | C | y | C | D |\n| --- | --- | --- | --- | --- | --- |\n| a | xb | c | yb | c | d |"
    );
}

#[test]
fn col_repeat_without_enough_cells_is_noop() {
    let template = "| `@ColRepeat[i,3]{cols}`x | y |\n| --- | --- |";
    assert_eq!(
        run_trimmed(template, json!({"cols": ["a"]})),
        "| `@ColRepeat[i,3]{cols}`x | y |\n| --- | --- |"
    );
}

// ---------------------------------------------------------------------------
// Row and column visibility
// ---------------------------------------------------------------------------

#[test]
fn row_hide_true_deletes_row() {
    let template = "| H |\n| --- |\n| `@RowHide{flag}` keep |";
    assert_eq!(
        run_trimmed(template, json!({"flag": true})),
        "| H |\n| --- |"
    );
}

#[test]
fn row_hide_false_blanks_placeholder_and_keeps_row() {
    let template = "| H |\n| --- |\n| `@RowHide{flag}` keep |";
    assert_eq!(
        run_trimmed(template, json!({"flag": false})),
        "| H |\n| --- |\n| keep |"
    );
}

#[test]
fn row_hide_non_boolean_is_noop() {
    let template = "| H |\n| --- |\n| `@RowHide{flag}` keep |";
    assert_eq!(
        run_trimmed(template, json!({"flag": "yes"})),
        "| H |\n| --- |\n| `@RowHide{flag}` keep |"
    );
}

#[test]
fn row_show_false_deletes_row() {
    let template = "| H |\n| --- |\n| `@RowShow{flag}` keep |";
    assert_eq!(
        run_trimmed(template, json!({"flag": false})),
        "| H |\n| --- |"
    );
    assert_eq!(
        run_trimmed(template, json!({"flag": true})),
        "| H |\n| --- |\n| keep |"
    );
}

#[test]
fn row_show_unresolved_keeps_everything() {
    let template = "| H |\n| --- |\n| `@RowShow{flag}` keep |";
    assert_eq!(
        run_trimmed(template, json!({})),
        "| H |\n| --- |\n| `@RowShow{flag}` keep |"
    );
}

#[test]
fn cell_placeholder_blank_preserves_column_count() {
    let template = "| `@RowShow{show}` | B |\n| --- | --- |";
    assert_eq!(
        run_trimmed(template, json!({"show": true})),
        "|  | B |\n| --- | --- |"
    );
}

#[test]
fn col_hide_true_removes_column_in_every_row() {
    let template = "| A | B |\n| --- | --- |\n| `@ColHide{secret}`1 | 2 |";
    assert_eq!(
        run_trimmed(template, json!({"secret": true})),
        "| B |\n| --- |\n| 2 |"
    );
}

#[test]
fn col_hide_false_blanks_placeholder() {
    let template = "| A | B |\n| --- | --- |\n| `@ColHide{secret}`1 | 2 |";
    assert_eq!(
        run_trimmed(template, json!({"secret": false})),
        "| A | B |\n| --- | --- |\n| 1 | 2 |"
    );
}

#[test]
fn col_show_false_removes_column() {
    let template = "| A | B |\n| --- | --- |\n| `@ColShow{keep}`1 | 2 |";
    assert_eq!(
        run_trimmed(template, json!({"keep": false})),
        "| B |\n| --- |\n| 2 |"
    );
}

// ---------------------------------------------------------------------------
// Sections and detachment
// ---------------------------------------------------------------------------

#[test]
fn header_pass_shares_context_stack_with_body() {
    let mut doc = doctree::Parser::new("`@Context{meta}`\n\nBody text".to_string(), 0).parse();
    doctree::Parser::new("`@{title}`".to_string(), 1).parse_section(&mut doc, SectionKind::Header);

    let composed = composer::compose(&doc, &json!({"meta": {"title": "T"}})).expect("compose");
    assert_eq!(composed.document.to_markdown().trim(), "T\n\nBody text");
}

#[test]
fn directives_in_deleted_rows_are_skipped() {
    let template = "| H |\n| --- |\n| `@RowHide{hide}` `@{boom}` |";
    let data = json!({"hide": true, "boom": "should never appear"});
    assert_eq!(run_trimmed(template, data), "| H |\n| --- |");
}

// ---------------------------------------------------------------------------
// Engine API
// ---------------------------------------------------------------------------

#[test]
fn data_root_must_be_object() {
    let doc = doctree::Parser::new("x".to_string(), 0).parse();
    let err = composer::compose(&doc, &json!([1, 2])).unwrap_err();
    assert!(matches!(err, ComposeError::DataNotObject));
}

#[test]
fn compose_to_streams_rendered_bytes() {
    let doc = doctree::Parser::new("Hello `@{name}`".to_string(), 0).parse();
    let mut sink = Vec::new();
    let diagnostics =
        composer::compose_to(&doc, &json!({"name": "Ada"}), &mut sink).expect("compose_to");
    assert!(diagnostics.is_empty());
    assert_eq!(String::from_utf8(sink).unwrap().trim(), "Hello Ada");
}

#[test]
fn template_is_not_mutated() {
    let doc = doctree::Parser::new("`@{name}`".to_string(), 0).parse();
    let before = doc.to_markdown();
    composer::compose(&doc, &json!({"name": "Ada"})).expect("compose");
    assert_eq!(doc.to_markdown(), before);
}

// ---------------------------------------------------------------------------
// Binding expression evaluator
// ---------------------------------------------------------------------------

fn scope(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().expect("object").clone()
}

#[test]
fn binding_resolves_dotted_and_indexed_paths() {
    let scope = scope(json!({
        "a": {"b": {"c": 42}},
        "items": ["zero", "one"],
    }));
    assert_eq!(binding::resolve(&scope, "a.b.c"), Some(&json!(42)));
    assert_eq!(binding::resolve(&scope, "items[1]"), Some(&json!("one")));
    assert_eq!(binding::resolve(&scope, " a.b.c "), Some(&json!(42)));
}

#[test]
fn binding_unresolved_cases() {
    let scope = scope(json!({
        "a": {"b": 1},
        "items": [1],
        "nothing": null,
    }));
    assert_eq!(binding::resolve(&scope, "missing"), None);
    assert_eq!(binding::resolve(&scope, "items[5]"), None);
    assert_eq!(binding::resolve(&scope, "a[0]"), None);
    assert_eq!(binding::resolve(&scope, "items.x"), None);
    assert_eq!(binding::resolve(&scope, "a..b"), None);
    assert_eq!(binding::resolve(&scope, "a.b."), None);
    assert_eq!(binding::resolve(&scope, "items[x]"), None);
    assert_eq!(binding::resolve(&scope, "a]"), None);
    assert_eq!(binding::resolve(&scope, ""), None);
    assert_eq!(binding::resolve(&scope, "nothing"), None);
}

#[test]
fn binding_stringify_forms() {
    assert_eq!(binding::stringify(&json!("text")), "text");
    assert_eq!(binding::stringify(&json!(3)), "3");
    assert_eq!(binding::stringify(&json!(true)), "true");
    assert_eq!(binding::stringify(&json!([1, 2])), "[1,2]");
}

// ---------------------------------------------------------------------------
// Directive grammar
// ---------------------------------------------------------------------------

#[test]
fn directive_grammar_accepts_each_form() {
    assert_eq!(
        directive::parse("@{a.b}"),
        Some(Directive::Bind {
            scope_name: None,
            expr: "a.b".to_string()
        })
    );
    assert_eq!(
        directive::parse("@[outer]{a}"),
        Some(Directive::Bind {
            scope_name: Some("outer".to_string()),
            expr: "a".to_string()
        })
    );
    assert_eq!(
        directive::parse("@Context{c}"),
        Some(Directive::Context {
            name: None,
            path: "c".to_string()
        })
    );
    assert_eq!(
        directive::parse("@Context[n]{c}"),
        Some(Directive::Context {
            name: Some("n".to_string()),
            path: "c".to_string()
        })
    );
    assert_eq!(directive::parse("@EndContext"), Some(Directive::EndContext));
    assert_eq!(
        directive::parse("@Repeat{items}"),
        Some(Directive::Repeat {
            path: "items".to_string()
        })
    );
    assert_eq!(directive::parse("@EndRepeat"), Some(Directive::EndRepeat));
    assert_eq!(
        directive::parse("@RowRepeat[i]{rows}"),
        Some(Directive::RowRepeat {
            index_var: "i".to_string(),
            span: 1,
            path: "rows".to_string()
        })
    );
    assert_eq!(
        directive::parse("@RowRepeat[i,3]{rows}"),
        Some(Directive::RowRepeat {
            index_var: "i".to_string(),
            span: 3,
            path: "rows".to_string()
        })
    );
    assert_eq!(
        directive::parse("@ColRepeat[i,2]{cols}"),
        Some(Directive::ColRepeat {
            index_var: "i".to_string(),
            span: 2,
            path: "cols".to_string()
        })
    );
    assert_eq!(
        directive::parse("@RowShow{f}"),
        Some(Directive::RowShow {
            path: "f".to_string()
        })
    );
    assert_eq!(
        directive::parse("@ColHide{f}"),
        Some(Directive::ColHide {
            path: "f".to_string()
        })
    );
}

#[test]
fn directive_grammar_rejects_malformed_text() {
    assert_eq!(directive::parse("plain text"), None);
    assert_eq!(directive::parse("@Bogus{x}"), None);
    assert_eq!(directive::parse("@{}"), None);
    assert_eq!(directive::parse("@Repeat{}"), None);
    assert_eq!(directive::parse("@Repeat"), None);
    assert_eq!(directive::parse("@EndRepeatX"), None);
    assert_eq!(directive::parse("@RowRepeat[]{x}"), None);
    assert_eq!(directive::parse("@RowRepeat[i,x]{y}"), None);
    assert_eq!(directive::parse("@RowRepeat[i]"), None);
    assert_eq!(directive::parse("@{a}trailing"), None);
}

#[test]
fn zero_span_is_clamped_to_one() {
    assert_eq!(
        directive::parse("@RowRepeat[i,0]{rows}"),
        Some(Directive::RowRepeat {
            index_var: "i".to_string(),
            span: 1,
            path: "rows".to_string()
        })
    );
}

// ---------------------------------------------------------------------------
// Context stack unit behavior
// ---------------------------------------------------------------------------

#[test]
fn context_stack_named_lookup_is_nearest_pushed() {
    let root = scope(json!({"where": "root"}));
    let first = scope(json!({"where": "first"}));
    let second = scope(json!({"where": "second"}));

    let mut stack = ContextStack::new(&root);
    stack.push(Some(&first), Some("n".to_string()));
    stack.push(Some(&second), Some("n".to_string()));

    let found = stack.named("n").expect("named scope");
    assert_eq!(found.get("where"), Some(&json!("second")));
    assert_eq!(stack.named("$").expect("root").get("where"), Some(&json!("root")));
    assert!(stack.named("absent").is_none());
}

#[test]
fn context_stack_pops_to_empty_without_error() {
    let root = scope(json!({}));
    let mut stack = ContextStack::new(&root);
    assert!(stack.pop().is_some());
    assert!(stack.pop().is_none());
    assert!(stack.current().is_none());
    assert!(stack.is_empty());
}
