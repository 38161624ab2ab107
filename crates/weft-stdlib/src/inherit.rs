//! Template inheritance and inclusion: `block`, `extends`, `include`
//! and the `parent` marker.

use weft_core::Token;
use weft_core::error::Error;
use weft_core::ir::{Instr, OverrideMode};
use weft_lang::block::Block;
use weft_lang::compile::Compiler;
use weft_lang::tokenize::signature_tokenizer;

use crate::util::quoted;

/// `{block "name" [append|prepend]} ... {/block}`
///
/// Outside an extends region this defines a fresh named, overridable
/// region. Inside a static extends it overrides the ancestor region of
/// the same name; inside a dynamic extends the override is deferred to
/// runtime.
pub struct BlockBlock;

impl Block for BlockBlock {
    fn name(&self) -> &'static str {
        "block"
    }

    fn has_signature(&self) -> bool {
        true
    }

    fn needs_close(&self) -> bool {
        true
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        signature: &str,
        body: Option<&[Token]>,
    ) -> Result<(), Error> {
        let signature = signature.trim();
        let (name_text, mode_text) = match signature.find(char::is_whitespace) {
            Some(at) => (&signature[..at], signature[at..].trim()),
            None => (signature, ""),
        };
        let name = quoted(name_text).unwrap_or_else(|| name_text.to_string());
        if name.is_empty() {
            return Err(compiler.error("block needs a name"));
        }
        let mode = match mode_text {
            "" => OverrideMode::Replace,
            "append" => OverrideMode::Append,
            "prepend" => OverrideMode::Prepend,
            other => {
                return Err(
                    compiler.error(format!("unknown block mode `{other}`"))
                );
            }
        };

        compiler.enter_scope();
        compiler.push_output_allowed(true);
        let compiled = compiler.compile_body(body.unwrap_or(&[]));
        compiler.pop_output_allowed();
        compiler.leave_scope(true);
        let body = compiled?;

        compiler.define_region(&name, mode, body)
    }
}

/// `{extends "resource"} ... {/extends}` or `{extends $expr} ...`
///
/// A literal target is resolved and spliced at compile time; an
/// expression target defers to a runtime extend that re-renders the
/// parent with the stored overrides. Between the tags only `block`
/// regions may produce output.
pub struct ExtendsBlock;

impl Block for ExtendsBlock {
    fn name(&self) -> &'static str {
        "extends"
    }

    fn has_signature(&self) -> bool {
        true
    }

    fn needs_close(&self) -> bool {
        true
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        signature: &str,
        body: Option<&[Token]>,
    ) -> Result<(), Error> {
        let signature = signature.trim();
        let body = body.unwrap_or(&[]);

        if let Some(resource) = quoted(signature) {
            let parent = compiler.subcompile_resource(&resource)?;
            compiler.begin_static_extends(parent);
            let compiled = compiler.compile_tokens(body);
            compiler.end_extends();
            return compiled;
        }

        let target = compiler.compile_expression(signature)?;
        compiler.begin_dynamic_extends(signature);
        let compiled = compiler.compile_tokens(body);
        let overrides = compiler.end_extends().unwrap_or_default();
        compiled?;
        compiler.emit(Instr::Extend { target, overrides })
    }
}

/// `{include "resource" [with [vars = ...]]}`
///
/// A literal target without `with` splices the compiled body inline; a
/// literal target with `with` wraps it in a child scope seeded with the
/// given variables; an expression target defers loading to runtime.
pub struct IncludeBlock;

impl Block for IncludeBlock {
    fn name(&self) -> &'static str {
        "include"
    }

    fn has_signature(&self) -> bool {
        true
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        signature: &str,
        _body: Option<&[Token]>,
    ) -> Result<(), Error> {
        let tokens = signature_tokenizer(&[" with "])
            .tokenize(signature.trim())
            .map_err(|e| compiler.error(e.message.clone()))?;
        let mut target_text = String::new();
        let mut with_text = String::new();
        let mut seen_with = false;
        for token in &tokens {
            if token.as_text() == Some(" with ") && !seen_with {
                seen_with = true;
            } else if seen_with {
                token.flatten_into(&mut with_text);
            } else {
                token.flatten_into(&mut target_text);
            }
        }
        let target_text = target_text.trim();
        let with = if seen_with {
            Some(compiler.compile_expression(&with_text)?)
        } else {
            None
        };

        if let Some(resource) = quoted(target_text) {
            let body = compiler.subcompile_resource(&resource)?;
            return match with {
                None => compiler.splice_body(body),
                Some(vars) => compiler.emit(Instr::With { vars, body }),
            };
        }

        let target = compiler.compile_expression(target_text)?;
        compiler.emit(Instr::Include { target, with })
    }
}

/// `{parent}` - inside an overriding block, splices the ancestor
/// region's content.
pub struct ParentBlock;

impl Block for ParentBlock {
    fn name(&self) -> &'static str {
        "parent"
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        _signature: &str,
        _body: Option<&[Token]>,
    ) -> Result<(), Error> {
        compiler.emit(Instr::Parent)
    }
}
