//! The standard library for the weft template engine.
//!
//! This crate provides:
//! - `flow` - `if`/`elseif`/`else`, `foreach` with `break`/`continue`
//! - `inherit` - `block`, `extends`, `include`, `parent`
//! - `declare` - `function`, `capture`, `literal`, `filter`, `cycle`
//! - `filters` - the standard filter/function set
//! - `operators` - arithmetic, comparison and logical operators
//!
//! Everything registers onto a [`TemplateContext`]; the session engine
//! calls [`register_standard`] on its base context.

mod declare;
mod filters;
mod flow;
mod inherit;
mod operators;
mod util;

pub use declare::{CaptureBlock, CycleBlock, FilterBlock, FunctionBlock, LiteralBlock};
pub use flow::{BreakBlock, ContinueBlock, ElseBlock, ElseifBlock, ForeachBlock, IfBlock};
pub use inherit::{BlockBlock, ExtendsBlock, IncludeBlock, ParentBlock};

use std::sync::Arc;

use weft_lang::TemplateContext;

/// Register the standard blocks.
pub fn register_standard_blocks(ctx: &mut TemplateContext) {
    ctx.set_block(Arc::new(IfBlock));
    ctx.set_block(Arc::new(ForeachBlock));
    ctx.set_block(Arc::new(BlockBlock));
    ctx.set_block(Arc::new(ExtendsBlock));
    ctx.set_block(Arc::new(IncludeBlock));
    ctx.set_block(Arc::new(ParentBlock));
    ctx.set_block(Arc::new(FunctionBlock));
    ctx.set_block(Arc::new(CaptureBlock));
    ctx.set_block(Arc::new(LiteralBlock));
    ctx.set_block(Arc::new(FilterBlock));
    ctx.set_block(Arc::new(CycleBlock));
}

/// Register the standard filter/function set.
pub fn register_standard_functions(ctx: &mut TemplateContext) {
    filters::register(ctx);
}

/// Register the standard expression and logical operators.
pub fn register_standard_operators(ctx: &mut TemplateContext) {
    operators::register(ctx);
}

/// Register everything a default engine context carries.
pub fn register_standard(ctx: &mut TemplateContext) {
    register_standard_blocks(ctx);
    register_standard_functions(ctx);
    register_standard_operators(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ir::{Instr, Template};
    use weft_lang::Compiler;
    use weft_source::InMemoryLoader;

    fn compile(source: &str) -> Result<Template, weft_core::Error> {
        let loader = InMemoryLoader::new();
        let mut ctx = TemplateContext::new();
        register_standard(&mut ctx);
        let mut compiler = Compiler::new(&loader, ctx);
        compiler.compile("test", source)
    }

    #[test]
    fn if_collects_branches_and_else() {
        let tpl = compile("{if $a}1{elseif $b}2{else}3{/if}").unwrap();
        let [Instr::If {
            branches,
            otherwise,
        }] = tpl.body.as_slice()
        else {
            panic!("expected a single if, got {:?}", tpl.body);
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].1, vec![Instr::Literal("1".to_string())]);
        assert_eq!(branches[1].1, vec![Instr::Literal("2".to_string())]);
        assert_eq!(
            otherwise.as_deref(),
            Some(&[Instr::Literal("3".to_string())][..])
        );
    }

    #[test]
    fn nested_same_name_blocks_close_correctly() {
        let tpl = compile("{if $a}{if $b}x{/if}y{/if}z").unwrap();
        let Instr::If { branches, .. } = &tpl.body[0] else {
            panic!("expected if");
        };
        // the outer branch holds the inner if plus its trailing text
        assert_eq!(branches[0].1.len(), 2);
        assert!(matches!(branches[0].1[0], Instr::If { .. }));
        assert_eq!(branches[0].1[1], Instr::Literal("y".to_string()));
        assert_eq!(tpl.body[1], Instr::Literal("z".to_string()));
    }

    #[test]
    fn foreach_signature_fields() {
        let tpl = compile("{foreach $items as $item key $k loop $l}x{/foreach}").unwrap();
        let [Instr::Foreach {
            value,
            key,
            loop_var,
            ..
        }] = tpl.body.as_slice()
        else {
            panic!("expected foreach");
        };
        assert_eq!(value, "item");
        assert_eq!(key.as_deref(), Some("k"));
        assert_eq!(loop_var.as_deref(), Some("l"));
    }

    #[test]
    fn elseif_is_invisible_inside_a_foreach_body() {
        // the private registration must not leak into the loop scope
        let err = compile("{if $a}{foreach $l as $v}{elseif $b}x{/foreach}{/if}").unwrap_err();
        assert!(
            !err.to_string().contains("unterminated"),
            "elseif must fail as an unknown tag, got: {err}"
        );
    }

    #[test]
    fn break_works_inside_a_nested_if() {
        let tpl = compile("{foreach $l as $v}{if $v}{break}{/if}{/foreach}").unwrap();
        let Instr::Foreach { body, .. } = &tpl.body[0] else {
            panic!("expected foreach");
        };
        let Instr::If { branches, .. } = &body[0] else {
            panic!("expected if");
        };
        assert_eq!(branches[0].1, vec![Instr::Break]);
    }

    #[test]
    fn break_outside_a_loop_is_not_a_block() {
        // at top level `break` is just a bare word expression
        let tpl = compile("{break}").unwrap();
        assert!(matches!(tpl.body[0], Instr::Print(_)));
    }

    #[test]
    fn literal_emits_its_body_verbatim() {
        let tpl = compile("{literal}{$x|upper}{/literal}").unwrap();
        assert_eq!(tpl.body, vec![Instr::Literal("{$x|upper}".to_string())]);
    }

    #[test]
    fn block_emits_a_named_region() {
        let tpl = compile("{block \"title\"}hi{/block}").unwrap();
        let [Instr::Region { name, body }] = tpl.body.as_slice() else {
            panic!("expected region");
        };
        assert_eq!(name, "title");
        assert_eq!(body, &vec![Instr::Literal("hi".to_string())]);
    }

    #[test]
    fn function_declares_params_with_defaults() {
        let tpl = compile("{function pad($s, $w = 8)}{$s}{/function}").unwrap();
        let [Instr::Define { name, params, .. }] = tpl.body.as_slice() else {
            panic!("expected define");
        };
        assert_eq!(name, "pad");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].0, "s");
        assert!(params[0].1.is_none());
        assert_eq!(params[1].0, "w");
        assert!(params[1].1.is_some());
    }

    #[test]
    fn cycles_get_distinct_state_slots() {
        let tpl = compile("{cycle [1]}{cycle [2]}").unwrap();
        let [Instr::Cycle { id: a, .. }, Instr::Cycle { id: b, .. }] = tpl.body.as_slice() else {
            panic!("expected two cycles");
        };
        assert_ne!(a, b);
    }

    #[test]
    fn unterminated_block_is_a_compile_error_naming_it() {
        let err = compile("{if $x}no close").unwrap_err();
        assert!(err.to_string().contains("unterminated block `if`"));
    }
}
