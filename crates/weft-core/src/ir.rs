//! The compiled template representation.
//!
//! A template compiles to a tree of instructions rather than flat text with
//! positional markers: named block regions are structural nodes, which keeps
//! the inheritance override logic (replace/append/prepend, parent
//! substitution) testable in isolation.

use std::sync::Arc;

use crate::value::Value;

/// A compiled instruction sequence.
pub type Body = Vec<Instr>;

/// How an overriding block combines with the region it overrides.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum OverrideMode {
    /// The new content wins; `{parent}` markers splice the ancestor in.
    #[default]
    Replace,
    /// Ancestor content first, then the new content.
    Append,
    /// New content first, then the ancestor content.
    Prepend,
}

/// An override of a named region, deferred to runtime by a dynamic extends.
#[derive(Clone, PartialEq, Debug)]
pub struct RegionOverride {
    pub name: String,
    pub mode: OverrideMode,
    pub body: Body,
}

/// One filter application in a chain.
#[derive(Clone, PartialEq, Debug)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
}

impl FilterCall {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// Assignment flavors compiled from `=` and `~=`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AssignOp {
    Set,
    Concat,
}

/// A compiled expression, evaluated against the runtime context.
#[derive(Clone, PartialEq, Debug)]
pub enum Expr {
    /// A scalar literal.
    Literal(Value),
    /// A variable reference; the dotted path is resolved at lookup time.
    Var(String),
    /// Bracket indexing: `$v[$k]`.
    Index { base: Box<Expr>, index: Box<Expr> },
    /// A dotted step after a dynamic base: `$v[$k].name`.
    Attr { base: Box<Expr>, name: String },
    /// Method dispatch on an object value; the receiver is checked at
    /// runtime, not at compile time.
    Method {
        base: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// A named function call.
    Call { name: String, args: Vec<Expr> },
    /// Array literal with optional `key = value` pairs.
    Array(Vec<(Option<Expr>, Expr)>),
    /// A left-leaning operator chain, evaluated strictly in encounter
    /// order. Parentheses are the only grouping mechanism.
    Chain {
        first: Box<Expr>,
        rest: Vec<(String, Expr)>,
    },
    /// A logical-operator chain, evaluated left-to-right with the
    /// short-circuit rule each registered operator declares.
    Logic {
        first: Box<Expr>,
        rest: Vec<(String, Expr)>,
    },
    /// A filter chain; each call receives the previous result first.
    Filter { base: Box<Expr>, calls: Vec<FilterCall> },
    /// Assignment statement: `$x = ...` or `$x ~= ...`.
    Assign {
        path: String,
        op: AssignOp,
        value: Box<Expr>,
    },
}

impl Expr {
    /// Whether this expression is a statement (prints nothing).
    pub fn is_statement(&self) -> bool {
        matches!(self, Expr::Assign { .. })
    }
}

/// A compiled instruction.
#[derive(Clone, PartialEq, Debug)]
pub enum Instr {
    /// Print verbatim text.
    Literal(String),
    /// Evaluate and print.
    Print(Expr),
    /// Evaluate for effect, discard the result.
    Eval(Expr),
    /// Conditional with ordered branches and an optional else body.
    If {
        branches: Vec<(Expr, Body)>,
        otherwise: Option<Body>,
    },
    /// Iterate a list, exposing the value and optionally key/loop vars.
    Foreach {
        list: Expr,
        value: String,
        key: Option<String>,
        loop_var: Option<String>,
        body: Body,
    },
    /// Leave the innermost loop.
    Break,
    /// Skip to the next loop iteration.
    Continue,
    /// A named, overridable region (template inheritance).
    Region { name: String, body: Body },
    /// Marker replaced by the ancestor region content during overrides.
    Parent,
    /// Include with a runtime-computed target, optionally seeding vars.
    Include { target: Expr, with: Option<Expr> },
    /// A statically spliced body executed in a child scope with extra vars.
    With { vars: Expr, body: Body },
    /// Extends with a runtime-computed parent; overrides stored verbatim.
    Extend {
        target: Expr,
        overrides: Vec<RegionOverride>,
    },
    /// Declare a template function; visible after the declaring scope ends.
    Define {
        name: String,
        params: Vec<(String, Option<Expr>)>,
        body: Arc<Body>,
    },
    /// Render the body into a string and store it in a variable.
    Capture { var: String, body: Body },
    /// Render the body, pass it through a filter chain, print the result.
    FilterRegion { filters: Vec<FilterCall>, body: Body },
    /// Print the next element of a literal array, wrapping around.
    Cycle { id: usize, values: Expr },
}

/// A compiled template artifact.
///
/// Immutable once produced; the engine shares it behind an `Arc`. The
/// dependency list records every resource transitively touched during
/// compilation, for modification-time staleness checks.
#[derive(Clone, PartialEq, Debug)]
pub struct Template {
    /// The resource this template was compiled from.
    pub resource: String,
    /// The compiled body.
    pub body: Body,
    /// Resources transitively touched (includes, extends parents).
    pub dependencies: Vec<String>,
    /// The literal text of a dynamic extends clause, if the template has
    /// one; part of the cache fingerprint.
    pub extends_key: Option<String>,
}

/// Replace every `Parent` marker in `body` with the ancestor content.
pub fn substitute_parent(body: &mut Body, ancestor: &[Instr]) {
    let mut i = 0;
    while i < body.len() {
        match &mut body[i] {
            Instr::Parent => {
                body.splice(i..=i, ancestor.iter().cloned());
                i += ancestor.len();
                continue;
            }
            Instr::If {
                branches,
                otherwise,
            } => {
                for (_, b) in branches.iter_mut() {
                    substitute_parent(b, ancestor);
                }
                if let Some(b) = otherwise {
                    substitute_parent(b, ancestor);
                }
            }
            Instr::Foreach { body: b, .. }
            | Instr::Region { body: b, .. }
            | Instr::With { body: b, .. }
            | Instr::Capture { body: b, .. }
            | Instr::FilterRegion { body: b, .. } => substitute_parent(b, ancestor),
            _ => {}
        }
        i += 1;
    }
}

/// Apply an override to the first matching region at or below `body`,
/// searching instructions from `from` onward. Returns true when a region
/// with the name was found.
pub fn apply_override(
    body: &mut Body,
    from: usize,
    name: &str,
    mode: OverrideMode,
    mut new_body: Body,
) -> bool {
    let start = from.min(body.len());
    for instr in body[start..].iter_mut() {
        if override_in(instr, name, mode, &mut new_body) {
            return true;
        }
    }
    false
}

fn override_in(instr: &mut Instr, name: &str, mode: OverrideMode, new_body: &mut Body) -> bool {
    match instr {
        Instr::Region { name: n, body } if n == name => {
            match mode {
                OverrideMode::Replace => {
                    let mut replacement = std::mem::take(new_body);
                    substitute_parent(&mut replacement, body);
                    *body = replacement;
                }
                OverrideMode::Append => body.append(new_body),
                OverrideMode::Prepend => {
                    let mut replacement = std::mem::take(new_body);
                    replacement.append(body);
                    *body = replacement;
                }
            }
            true
        }
        Instr::Region { body, .. } | Instr::Foreach { body, .. } | Instr::With { body, .. } => {
            body.iter_mut()
                .any(|i| override_in(i, name, mode, new_body))
        }
        Instr::If {
            branches,
            otherwise,
        } => branches
            .iter_mut()
            .flat_map(|(_, b)| b.iter_mut())
            .chain(otherwise.iter_mut().flatten())
            .any(|i| override_in(i, name, mode, new_body)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str, text: &str) -> Instr {
        Instr::Region {
            name: name.to_string(),
            body: vec![Instr::Literal(text.to_string())],
        }
    }

    #[test]
    fn replace_override_wins() {
        let mut body = vec![region("title", "Default")];
        let ok = apply_override(
            &mut body,
            0,
            "title",
            OverrideMode::Replace,
            vec![Instr::Literal("extra".to_string())],
        );
        assert!(ok);
        assert_eq!(
            body[0],
            Instr::Region {
                name: "title".to_string(),
                body: vec![Instr::Literal("extra".to_string())],
            }
        );
    }

    #[test]
    fn append_keeps_ancestor_first() {
        let mut body = vec![region("title", "Default")];
        apply_override(
            &mut body,
            0,
            "title",
            OverrideMode::Append,
            vec![Instr::Literal(" - extra".to_string())],
        );
        let Instr::Region { body: inner, .. } = &body[0] else {
            panic!("expected region");
        };
        assert_eq!(
            inner,
            &vec![
                Instr::Literal("Default".to_string()),
                Instr::Literal(" - extra".to_string()),
            ]
        );
    }

    #[test]
    fn prepend_puts_new_content_first() {
        let mut body = vec![region("title", "Default")];
        apply_override(
            &mut body,
            0,
            "title",
            OverrideMode::Prepend,
            vec![Instr::Literal("extra - ".to_string())],
        );
        let Instr::Region { body: inner, .. } = &body[0] else {
            panic!("expected region");
        };
        assert_eq!(inner[0], Instr::Literal("extra - ".to_string()));
        assert_eq!(inner[1], Instr::Literal("Default".to_string()));
    }

    #[test]
    fn replace_substitutes_parent_marker() {
        let mut body = vec![region("title", "Default")];
        apply_override(
            &mut body,
            0,
            "title",
            OverrideMode::Replace,
            vec![
                Instr::Literal("<".to_string()),
                Instr::Parent,
                Instr::Literal(">".to_string()),
            ],
        );
        let Instr::Region { body: inner, .. } = &body[0] else {
            panic!("expected region");
        };
        assert_eq!(
            inner,
            &vec![
                Instr::Literal("<".to_string()),
                Instr::Literal("Default".to_string()),
                Instr::Literal(">".to_string()),
            ]
        );
    }

    #[test]
    fn search_scope_skips_instructions_before_from() {
        let mut body = vec![region("title", "sibling"), region("title", "ancestor")];
        apply_override(
            &mut body,
            1,
            "title",
            OverrideMode::Replace,
            vec![Instr::Literal("new".to_string())],
        );
        // The sibling region before the search boundary is untouched.
        assert_eq!(body[0], region("title", "sibling"));
        let Instr::Region { body: inner, .. } = &body[1] else {
            panic!("expected region");
        };
        assert_eq!(inner, &vec![Instr::Literal("new".to_string())]);
    }

    #[test]
    fn missing_region_reports_false() {
        let mut body = vec![region("title", "Default")];
        assert!(!apply_override(
            &mut body,
            0,
            "footer",
            OverrideMode::Replace,
            vec![],
        ));
    }

    #[test]
    fn override_descends_into_nested_regions() {
        let mut body = vec![Instr::Region {
            name: "outer".to_string(),
            body: vec![region("inner", "old")],
        }];
        let ok = apply_override(
            &mut body,
            0,
            "inner",
            OverrideMode::Replace,
            vec![Instr::Literal("new".to_string())],
        );
        assert!(ok);
    }
}
