//! Control-flow blocks: `if`/`elseif`/`else` and `foreach` with
//! `break`/`continue`.

use std::sync::Arc;

use weft_core::Token;
use weft_core::error::Error;
use weft_core::ir::Instr;
use weft_lang::block::Block;
use weft_lang::compile::Compiler;
use weft_lang::tokenize::signature_tokenizer;

/// `{if cond} ... {elseif cond} ... {else} ... {/if}`
///
/// The branch keywords are registered privately inside the `if` body
/// scope, so they never leak into nested scopes that should not see them
/// (a `foreach` body inside the `if`, for instance).
pub struct IfBlock;

impl Block for IfBlock {
    fn name(&self) -> &'static str {
        "if"
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
        let condition = compiler.compile_expression(signature)?;
        compiler.enter_scope();
        compiler.context_mut().set_private_block(Arc::new(ElseifBlock));
        compiler.context_mut().set_private_block(Arc::new(ElseBlock));
        compiler.begin_branches(condition);
        let compiled = compiler.compile_tokens(body.unwrap_or(&[]));
        let (branches, otherwise) = compiler.end_branches();
        compiler.leave_scope(true);
        compiled?;
        compiler.emit(Instr::If {
            branches,
            otherwise,
        })
    }
}

/// `{elseif cond}` - only visible inside an `if` body.
pub struct ElseifBlock;

impl Block for ElseifBlock {
    fn name(&self) -> &'static str {
        "elseif"
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
        let condition = compiler.compile_expression(signature)?;
        compiler.split_branch(Some(condition))
    }
}

/// `{else}` - only visible inside an `if` body.
pub struct ElseBlock;

impl Block for ElseBlock {
    fn name(&self) -> &'static str {
        "else"
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        _signature: &str,
        _body: Option<&[Token]>,
    ) -> Result<(), Error> {
        compiler.split_branch(None)
    }
}

/// `{foreach $list as $value [key $key] [loop $loop]} ... {/foreach}`
pub struct ForeachBlock;

impl Block for ForeachBlock {
    fn name(&self) -> &'static str {
        "foreach"
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
        let tokens = signature_tokenizer(&[" as "])
            .tokenize(signature)
            .map_err(|e| compiler.error(e.message.clone()))?;
        let mut list_text = String::new();
        let mut tail = String::new();
        let mut seen_as = false;
        for token in &tokens {
            if token.as_text() == Some(" as ") {
                if seen_as {
                    return Err(compiler.error("malformed foreach: repeated `as`"));
                }
                seen_as = true;
            } else if seen_as {
                token.flatten_into(&mut tail);
            } else {
                token.flatten_into(&mut list_text);
            }
        }
        if !seen_as {
            return Err(
                compiler.error("malformed foreach: expected `$list as $value`")
            );
        }

        let list = compiler.compile_expression(&list_text)?;

        let words: Vec<&str> = tail.split_whitespace().collect();
        let value = match words.first().and_then(|w| w.strip_prefix('$')) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(compiler.error("malformed foreach: expected `$value` after `as`")),
        };
        let mut key = None;
        let mut loop_var = None;
        let mut i = 1;
        while i < words.len() {
            let var = words
                .get(i + 1)
                .and_then(|w| w.strip_prefix('$'))
                .map(str::to_string);
            match (words[i], var) {
                ("key", Some(name)) => key = Some(name),
                ("loop", Some(name)) => loop_var = Some(name),
                _ => {
                    return Err(compiler.error(format!(
                        "unexpected `{}` in foreach signature",
                        words[i]
                    )));
                }
            }
            i += 2;
        }

        compiler.enter_scope();
        // Shared within the loop scope so `{break}` works inside nested
        // `{if}` bodies; the registration dies with the scope because
        // absorbing a child never merges block registries.
        compiler.context_mut().set_block(Arc::new(BreakBlock));
        compiler.context_mut().set_block(Arc::new(ContinueBlock));
        let compiled = compiler.compile_body(body.unwrap_or(&[]));
        compiler.leave_scope(true);
        let body = compiled?;

        compiler.emit(Instr::Foreach {
            list,
            value,
            key,
            loop_var,
            body,
        })
    }
}

/// `{break}` - only visible inside a `foreach` body.
pub struct BreakBlock;

impl Block for BreakBlock {
    fn name(&self) -> &'static str {
        "break"
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        _signature: &str,
        _body: Option<&[Token]>,
    ) -> Result<(), Error> {
        compiler.emit(Instr::Break)
    }
}

/// `{continue}` - only visible inside a `foreach` body.
pub struct ContinueBlock;

impl Block for ContinueBlock {
    fn name(&self) -> &'static str {
        "continue"
    }

    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        _signature: &str,
        _body: Option<&[Token]>,
    ) -> Result<(), Error> {
        compiler.emit(Instr::Continue)
    }
}
