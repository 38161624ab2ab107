//! Template inheritance tests: named block regions, static and dynamic
//! extends, override modes and parent substitution.

use weft::{Engine, InMemoryLoader, Value};

fn engine(pairs: &[(&str, &str)]) -> Engine {
    let mut loader = InMemoryLoader::new();
    for (name, source) in pairs {
        loader.insert(*name, *source);
    }
    Engine::new(loader)
}

fn render(e: &Engine, name: &str) -> String {
    e.render(name, std::iter::empty::<(String, Value)>())
        .unwrap_or_else(|err| panic!("render failed for '{}': {}", name, err))
}

#[test]
fn base_renders_its_own_blocks() {
    let e = engine(&[("base.tpl", "<{block \"title\"}Default{/block}>")]);
    assert_eq!(render(&e, "base.tpl"), "<Default>");
}

#[test]
fn replace_override_wins() {
    let e = engine(&[
        ("base.tpl", "<{block \"title\"}Default{/block}>"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"title\"}extra{/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "<extra>");
}

#[test]
fn append_keeps_the_ancestor_first() {
    let e = engine(&[
        ("base.tpl", "<{block \"title\"}Default{/block}>"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"title\" append} - extra{/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "<Default - extra>");
}

#[test]
fn prepend_puts_the_override_first() {
    let e = engine(&[
        ("base.tpl", "<{block \"title\"}Default{/block}>"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"title\" prepend}extra - {/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "<extra - Default>");
}

#[test]
fn parent_marker_splices_the_ancestor_content() {
    let e = engine(&[
        ("base.tpl", "<{block \"title\"}Default{/block}>"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"title\"}[{parent}]{/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "<[Default]>");
}

#[test]
fn unoverridden_blocks_keep_their_default() {
    let e = engine(&[
        (
            "base.tpl",
            "{block \"head\"}H{/block}|{block \"body\"}B{/block}",
        ),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"body\"}custom{/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "H|custom");
}

#[test]
fn inheritance_chains_through_grandparents() {
    let e = engine(&[
        ("grand.tpl", "({block \"x\"}G{/block})"),
        (
            "parent.tpl",
            "{extends \"grand.tpl\"}{block \"x\" append}P{/block}{/extends}",
        ),
        (
            "child.tpl",
            "{extends \"parent.tpl\"}{block \"x\" append}C{/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "(GPC)");
}

#[test]
fn whitespace_between_extends_and_blocks_is_tolerated() {
    let e = engine(&[
        ("base.tpl", "{block \"a\"}x{/block}"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}\n  {block \"a\"}y{/block}\n{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "y");
}

#[test]
fn dynamic_extends_defers_to_runtime() {
    let e = engine(&[
        ("a.tpl", "A[{block \"slot\"}a{/block}]"),
        ("b.tpl", "B[{block \"slot\"}b{/block}]"),
        (
            "child.tpl",
            "{extends $base}{block \"slot\"}child{/block}{/extends}",
        ),
    ]);
    for (base, expected) in [("a.tpl", "A[child]"), ("b.tpl", "B[child]")] {
        let out = e
            .render("child.tpl", [("base".to_string(), Value::from(base))])
            .unwrap();
        assert_eq!(out, expected);
    }
}

#[test]
fn dynamic_extends_records_the_clause_in_the_artifact() {
    let e = engine(&[(
        "child.tpl",
        "{extends $base}{block \"x\"}y{/block}{/extends}",
    )]);
    let template = e.load_template("child.tpl").unwrap();
    assert_eq!(template.extends_key.as_deref(), Some("$base"));
}

#[test]
fn static_extends_tracks_the_parent_as_a_dependency() {
    let e = engine(&[
        ("base.tpl", "{block \"x\"}d{/block}"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"x\"}o{/block}{/extends}",
        ),
    ]);
    let template = e.load_template("child.tpl").unwrap();
    assert!(template.dependencies.iter().any(|d| d == "base.tpl"));
    assert!(template.dependencies.iter().any(|d| d == "child.tpl"));
}

#[test]
fn blocks_inside_conditionals_still_resolve() {
    let e = engine(&[
        ("base.tpl", "{if true}[{block \"x\"}d{/block}]{/if}"),
        (
            "child.tpl",
            "{extends \"base.tpl\"}{block \"x\"}o{/block}{/extends}",
        ),
    ]);
    assert_eq!(render(&e, "child.tpl"), "[o]");
}
