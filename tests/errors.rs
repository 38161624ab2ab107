//! Error reporting tests: compile errors carry resource and line,
//! missing templates are reported as such, and runtime failures abort
//! the render.

use weft::{Engine, Error, InMemoryLoader, Value};

fn engine(pairs: &[(&str, &str)]) -> Engine {
    let mut loader = InMemoryLoader::new();
    for (name, source) in pairs {
        loader.insert(*name, *source);
    }
    Engine::new(loader)
}

fn no_vars() -> impl IntoIterator<Item = (String, Value)> {
    std::iter::empty()
}

/// Helper to check that a render fails with a message containing a
/// substring.
fn assert_error(e: &Engine, name: &str, expected: &str) {
    match e.render(name, no_vars()) {
        Ok(out) => panic!("expected error for '{}', got output '{}'", name, out),
        Err(err) => {
            let msg = err.to_string();
            assert!(
                msg.to_lowercase().contains(&expected.to_lowercase()),
                "error '{}' does not contain '{}'",
                msg,
                expected
            );
        }
    }
}

#[test]
fn unterminated_block_names_the_block() {
    let e = engine(&[("t", "{if $x}no close")]);
    assert_error(&e, "t", "unterminated block `if`");
}

#[test]
fn unterminated_foreach() {
    let e = engine(&[("t", "{foreach $items as $v}body")]);
    assert_error(&e, "t", "unterminated block `foreach`");
}

#[test]
fn unmatched_tag_delimiter_is_a_tokenize_error() {
    let e = engine(&[("t", "text {unclosed")]);
    assert_error(&e, "t", "unmatched `{`");
}

#[test]
fn compile_errors_carry_resource_and_line() {
    let e = engine(&[("page.tpl", "line one\nline two\n{if $x}oops")]);
    let err = e.render("page.tpl", no_vars()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("page.tpl"), "got: {msg}");
    assert!(msg.contains("line 3"), "got: {msg}");
}

#[test]
fn missing_template_is_not_a_syntax_error() {
    let e = engine(&[]);
    let err = e.render("missing.tpl", no_vars()).unwrap_err();
    assert!(matches!(err, Error::NotFound(name) if name == "missing.tpl"));
}

#[test]
fn missing_include_target_is_reported_as_not_found() {
    let e = engine(&[("page.tpl", "{include \"gone.tpl\"}")]);
    let err = e.render("page.tpl", no_vars()).unwrap_err();
    assert!(err.to_string().contains("template not found"), "got: {err}");
}

#[test]
fn errors_in_included_templates_are_wrapped_with_both_positions() {
    let e = engine(&[
        ("partial.tpl", "\n{if $x}unclosed"),
        ("page.tpl", "{include \"partial.tpl\"}"),
    ]);
    let err = e.render("page.tpl", no_vars()).unwrap_err();
    let outer = err.to_string();
    assert!(outer.contains("page.tpl"), "got: {outer}");
    // the inner cause keeps the position inside the partial
    let Error::Compile(compile) = &err else {
        panic!("expected a compile error, got {err}");
    };
    let inner = compile
        .cause
        .as_ref()
        .expect("inner cause preserved")
        .to_string();
    assert!(inner.contains("partial.tpl"), "got: {inner}");
    assert!(inner.contains("line 2"), "got: {inner}");
}

#[test]
fn output_outside_blocks_in_extends_is_rejected() {
    let e = engine(&[
        ("base.tpl", "{block \"x\"}d{/block}"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}stray text{/extends}",
        ),
    ]);
    assert_error(&e, "child.tpl", "output not allowed");
}

#[test]
fn overriding_an_unknown_block_is_rejected() {
    let e = engine(&[
        ("base.tpl", "{block \"x\"}d{/block}"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"nope\"}y{/block}{/extends}",
        ),
    ]);
    assert_error(&e, "child.tpl", "output not allowed in block `nope`");
}

#[test]
fn circular_includes_are_detected() {
    let e = engine(&[
        ("a.tpl", "{include \"b.tpl\"}"),
        ("b.tpl", "{include \"a.tpl\"}"),
    ]);
    assert_error(&e, "a.tpl", "circular");
}

#[test]
fn unknown_filter_fails_at_render_time() {
    let e = engine(&[("t", "{$x|nonsense}")]);
    // the template compiles; the failure is a runtime dispatch miss
    assert!(e.load_template("t").is_ok());
    let err = e
        .render("t", [("x".to_string(), Value::from(1.0))])
        .unwrap_err();
    assert!(matches!(err, Error::Runtime(_)));
    assert!(err.to_string().contains("nonsense"));
}

#[test]
fn method_call_on_a_scalar_is_a_runtime_error() {
    let e = engine(&[("t", "{$v.fmt()}")]);
    let err = e
        .render("t", [("v".to_string(), Value::from(5.0))])
        .unwrap_err();
    assert!(err.to_string().contains("not an object"), "got: {err}");
}

#[test]
fn stray_closing_tag_is_rejected() {
    let e = engine(&[("t", "text {/if}")]);
    assert_error(&e, "t", "unexpected closing tag");
}

#[test]
fn malformed_foreach_signature() {
    let e = engine(&[("t", "{foreach $items}x{/foreach}")]);
    assert_error(&e, "t", "expected `$list as $value`");
}

#[test]
fn operator_without_operand() {
    let e = engine(&[("t", "{$a + }")]);
    assert_error(&e, "t", "missing an operand");
}

#[test]
fn branch_after_else_is_rejected() {
    let e = engine(&[("t", "{if $a}x{else}y{elseif $b}z{/if}")]);
    assert_error(&e, "t", "after `else`");
}

#[test]
fn elseif_outside_if_does_not_dispatch() {
    // `elseif` is privately registered inside `if` scopes only; at top
    // level it is not a block, so the tag falls through to the
    // expression compiler and fails there.
    let e = engine(&[("t", "{elseif $x}")]);
    assert!(e.render("t", no_vars()).is_err());
}
