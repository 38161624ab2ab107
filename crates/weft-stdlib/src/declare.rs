//! Declaration and capture blocks: `function`, `capture`, `literal`,
//! `filter` and `cycle`.

use std::sync::Arc;

use weft_core::error::Error;
use weft_core::ir::{Expr, Instr};
use weft_core::token::{self, Token};
use weft_lang::block::Block;
use weft_lang::compile::Compiler;

use crate::util::{leading_ident, paren_group, quoted, top_level_eq};

/// `{function name($a, $b = default)} ... {/function}`
///
/// Declares a named template function. The body compiles once; invoking
/// the function binds positional arguments (with declared defaults) in a
/// fresh scope and renders the body.
pub struct FunctionBlock;

impl Block for FunctionBlock {
    fn name(&self) -> &'static str {
        "function"
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
        let name = leading_ident(signature);
        if name.is_empty() {
            return Err(compiler.error("function needs a name"));
        }
        let rest = signature[name.len()..].trim();

        let mut params: Vec<(String, Option<Expr>)> = Vec::new();
        if !rest.is_empty() {
            let Some((interior, after)) = paren_group(rest) else {
                return Err(compiler.error(format!(
                    "malformed function signature `{signature}`"
                )));
            };
            if !after.trim().is_empty() {
                return Err(compiler.error(format!(
                    "unexpected `{}` after function arguments",
                    after.trim()
                )));
            }
            for fragment in split_params(interior) {
                let fragment = fragment.trim();
                if fragment.is_empty() {
                    continue;
                }
                let (param_text, default) = match top_level_eq(fragment) {
                    Some(at) => {
                        let default = compiler.compile_expression(&fragment[at + 1..])?;
                        (fragment[..at].trim(), Some(default))
                    }
                    None => (fragment, None),
                };
                let param = param_text.strip_prefix('$').unwrap_or_default();
                if param.is_empty() || leading_ident(param) != param {
                    return Err(compiler.error(format!(
                        "malformed function parameter `{param_text}`"
                    )));
                }
                params.push((param.to_string(), default));
            }
        }

        compiler.enter_scope();
        let compiled = compiler.compile_body(body.unwrap_or(&[]));
        compiler.leave_scope(false);
        let body = compiled?;

        compiler.emit(Instr::Define {
            name: name.to_string(),
            params,
            body: Arc::new(body),
        })
    }
}

/// `{capture name} ... {/capture}` - render the body immediately and
/// store the text in a variable instead of printing it.
pub struct CaptureBlock;

impl Block for CaptureBlock {
    fn name(&self) -> &'static str {
        "capture"
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
        let var = quoted(signature)
            .unwrap_or_else(|| signature.strip_prefix('$').unwrap_or(signature).to_string());
        if var.is_empty() {
            return Err(compiler.error("capture needs a variable name"));
        }

        compiler.enter_scope();
        let compiled = compiler.compile_body(body.unwrap_or(&[]));
        compiler.leave_scope(true);
        let body = compiled?;

        compiler.emit(Instr::Capture { var, body })
    }
}

/// `{literal} ... {/literal}` - the body is emitted verbatim, bypassing
/// all further tokenization.
pub struct LiteralBlock;

impl Block for LiteralBlock {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn needs_close(&self) -> bool {
        true
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        _signature: &str,
        body: Option<&[Token]>,
    ) -> Result<(), Error> {
        let text = token::flatten(body.unwrap_or(&[]));
        compiler.bump_lines(&text);
        compiler.emit(Instr::Literal(text))
    }
}

/// `{filter name|name(args)} ... {/filter}` - render the body, pass it
/// through the filter chain, print the result.
pub struct FilterBlock;

impl Block for FilterBlock {
    fn name(&self) -> &'static str {
        "filter"
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
        let filters = compiler.compile_filter_chain(signature)?;

        compiler.enter_scope();
        let compiled = compiler.compile_body(body.unwrap_or(&[]));
        compiler.leave_scope(true);
        let body = compiled?;

        compiler.emit(Instr::FilterRegion { filters, body })
    }
}

/// `{cycle [...]}` - print the next element of the array on each
/// invocation, wrapping back to the first after exhaustion.
pub struct CycleBlock;

impl Block for CycleBlock {
    fn name(&self) -> &'static str {
        "cycle"
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
        let values = compiler.compile_expression(signature)?;
        let id = compiler.next_id();
        compiler.emit(Instr::Cycle { id, values })
    }
}

/// Split a parameter list on top-level commas, skipping quoted and
/// bracketed spans.
fn split_params(text: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            if let Some(last) = parts.last_mut() {
                last.push(c);
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = parts.last_mut() {
            last.push(c);
        }
    }
    parts
}
