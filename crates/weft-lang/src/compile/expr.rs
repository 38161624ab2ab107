//! The expression and value compiler.
//!
//! Expression text splits in three passes, each respecting string and
//! bracket nesting: assignment detection, logical-operator chaining, then
//! expression-operator chaining. Operators resolve in encounter order
//! (left-to-right); parentheses are the only grouping mechanism. The
//! remaining single operand compiles as a value: scalar literal, array
//! literal, variable reference with postfix index/method access, or a
//! function call, with an optional filter chain.

use weft_core::error::Error;
use weft_core::ir::{AssignOp, Expr, FilterCall};
use weft_core::token::Token;
use weft_core::value::Value;

use crate::tokenize::{args_tokenizer, array_tokenizer, filter_tokenizer, operator_tokenizer,
    string_literal_tokenizer};

use super::compiler::Compiler;

impl Compiler<'_> {
    /// Compile expression text that may be an assignment statement.
    /// The flag reports a statement (which prints nothing).
    pub fn compile_expression_or_statement(&mut self, text: &str) -> Result<(Expr, bool), Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.error("empty expression"));
        }
        if let Some((path, op, rhs)) = self.match_assignment(text)? {
            let value = self.compile_expression(&rhs)?;
            return Ok((
                Expr::Assign {
                    path,
                    op,
                    value: Box::new(value),
                },
                true,
            ));
        }
        Ok((self.compile_logic(text)?, false))
    }

    /// Compile expression text in a value position; assignments error.
    pub fn compile_expression(&mut self, text: &str) -> Result<Expr, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.error("empty expression"));
        }
        if self.match_assignment(text)?.is_some() {
            return Err(self.error("assignment is not allowed here"));
        }
        self.compile_logic(text)
    }

    /// Detect a top-level `=` or `~=` and split the assignment.
    fn match_assignment(&mut self, text: &str) -> Result<Option<(String, AssignOp, String)>, Error> {
        let mut syntaxes = self.context().expression_operator_syntaxes();
        for extra in ["=", "~="] {
            if !syntaxes.iter().any(|s| s == extra) {
                syntaxes.push(extra.to_string());
            }
        }
        let tokens = self.tokenize_fragment(&operator_tokenizer(&syntaxes), text)?;
        let mut before = String::new();
        for (idx, token) in tokens.iter().enumerate() {
            let op = match token.as_text() {
                Some("=") => AssignOp::Set,
                Some("~=") => AssignOp::Concat,
                _ => {
                    token.flatten_into(&mut before);
                    continue;
                }
            };
            let mut after = String::new();
            for rest in &tokens[idx + 1..] {
                rest.flatten_into(&mut after);
            }
            let target = before.trim().to_string();
            let path = target
                .strip_prefix('$')
                .filter(|p| is_dotted_path(p))
                .ok_or_else(|| self.error(format!("invalid assignment target `{target}`")))?;
            return Ok(Some((path.to_string(), op, after)));
        }
        Ok(None)
    }

    /// Split on logical operators and build the left-to-right chain.
    fn compile_logic(&mut self, text: &str) -> Result<Expr, Error> {
        let names = self.context().logical_operator_names();
        let mut delimiters = Vec::with_capacity(names.len());
        for name in &names {
            if name.chars().all(char::is_alphanumeric) {
                delimiters.push(format!(" {name} "));
            } else {
                delimiters.push(name.clone());
            }
        }
        let tokens = self.tokenize_fragment(&operator_tokenizer(&delimiters), text)?;
        let (parts, seps) = split_tokens(&tokens, &delimiters);
        if seps.is_empty() {
            return self.compile_chain(text);
        }
        for (k, part) in parts.iter().enumerate() {
            if part.trim().is_empty() {
                let op = seps[k.min(seps.len() - 1)].trim().to_string();
                return Err(self.error(format!("operator `{op}` is missing an operand")));
            }
        }
        let first = self.compile_chain(&parts[0])?;
        let mut rest = Vec::with_capacity(seps.len());
        for (sep, part) in seps.iter().zip(&parts[1..]) {
            rest.push((sep.trim().to_string(), self.compile_chain(part)?));
        }
        Ok(Expr::Logic {
            first: Box::new(first),
            rest,
        })
    }

    /// Split on expression operators and build the left-leaning chain.
    fn compile_chain(&mut self, text: &str) -> Result<Expr, Error> {
        let text = text.trim();
        // A whole-text numeric literal never splits, so negative numbers
        // and exponents survive the `-` operator.
        if looks_numeric(text) {
            if let Ok(n) = text.parse::<f64>() {
                return Ok(Expr::Literal(Value::Number(n)));
            }
        }

        let mut syntaxes = self.context().expression_operator_syntaxes();
        for extra in ["=", "~="] {
            if !syntaxes.iter().any(|s| s == extra) {
                syntaxes.push(extra.to_string());
            }
        }
        let tokens = self.tokenize_fragment(&operator_tokenizer(&syntaxes), text)?;
        let (mut parts, mut ops) = split_tokens(&tokens, &syntaxes);

        if let Some(eq) = ops.iter().find(|o| *o == "=" || *o == "~=") {
            return Err(self.error(format!("unexpected `{eq}`")));
        }

        fold_signs(&mut parts, &mut ops);

        for (k, part) in parts.iter().enumerate() {
            if part.trim().is_empty() {
                let op = ops
                    .get(k.saturating_sub(1))
                    .or_else(|| ops.last())
                    .cloned()
                    .unwrap_or_default();
                return Err(self.error(format!("operator `{op}` is missing an operand")));
            }
        }

        if ops.is_empty() {
            return self.compile_value(&parts[0]);
        }
        let first = self.compile_value(&parts[0])?;
        let mut rest = Vec::with_capacity(ops.len());
        for (op, part) in ops.iter().zip(&parts[1..]) {
            rest.push((op.clone(), self.compile_value(part)?));
        }
        Ok(Expr::Chain {
            first: Box::new(first),
            rest,
        })
    }

    /// Compile a single operand: a base value with an optional filter
    /// chain.
    fn compile_value(&mut self, text: &str) -> Result<Expr, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.error("empty value"));
        }
        let tokens = self.tokenize_fragment(&filter_tokenizer(), text)?;
        let pipe = ["|".to_string()];
        let (parts, seps) = split_tokens(&tokens, &pipe);
        let base = self.compile_base_value(parts[0].trim())?;
        if seps.is_empty() {
            return Ok(base);
        }
        let mut calls = Vec::with_capacity(seps.len());
        for part in &parts[1..] {
            calls.push(self.parse_filter_call(part)?);
        }
        Ok(Expr::Filter {
            base: Box::new(base),
            calls,
        })
    }

    /// Compile a bare filter chain (`upper|truncate(30)`), as used by
    /// filter blocks.
    pub fn compile_filter_chain(&mut self, text: &str) -> Result<Vec<FilterCall>, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.error("empty filter chain"));
        }
        let tokens = self.tokenize_fragment(&filter_tokenizer(), text)?;
        let pipe = ["|".to_string()];
        let (parts, _) = split_tokens(&tokens, &pipe);
        parts
            .iter()
            .map(|part| self.parse_filter_call(part))
            .collect()
    }

    fn parse_filter_call(&mut self, text: &str) -> Result<FilterCall, Error> {
        let text = text.trim();
        let name = leading_ident(text);
        if name.is_empty() {
            return Err(self.error(format!("invalid filter `{text}`")));
        }
        let rest = text[name.len()..].trim();
        if rest.is_empty() {
            return Ok(FilterCall::bare(name));
        }
        match matched_group(rest, '(', ')') {
            Some(interior) => Ok(FilterCall {
                name: name.to_string(),
                args: self.compile_args(interior)?,
            }),
            None => Err(self.error(format!("malformed filter `{text}`"))),
        }
    }

    /// Compile a comma-separated argument list.
    fn compile_args(&mut self, text: &str) -> Result<Vec<Expr>, Error> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self.tokenize_fragment(&args_tokenizer(), text)?;
        let comma = [",".to_string()];
        let (parts, _) = split_tokens(&tokens, &comma);
        parts
            .iter()
            .map(|part| self.compile_expression(part))
            .collect()
    }

    fn compile_base_value(&mut self, text: &str) -> Result<Expr, Error> {
        if text.is_empty() {
            return Err(self.error("empty value"));
        }

        // parenthesized group
        if text.starts_with('(') {
            if let Some(interior) = matched_group(text, '(', ')') {
                return self.compile_expression(interior);
            }
        }

        // quoted string
        if text.starts_with('"') || text.starts_with('\'') {
            let tokens = self.tokenize_fragment(&string_literal_tokenizer(), text)?;
            match tokens.as_slice() {
                [group @ Token::Group(_)] => {
                    let content = group
                        .interior()
                        .ok_or_else(|| self.error("malformed string literal"))?;
                    return Ok(Expr::Literal(Value::Str(content)));
                }
                _ => return Err(self.error(format!("malformed string literal `{text}`"))),
            }
        }

        // numeric literal
        if looks_numeric(text) {
            if let Ok(n) = text.parse::<f64>() {
                return Ok(Expr::Literal(Value::Number(n)));
            }
        }

        match text {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }

        // a signed non-literal value becomes a zero-left chain
        if let Some(rest) = text.strip_prefix('-') {
            let value = self.compile_base_value(rest.trim_start())?;
            return Ok(Expr::Chain {
                first: Box::new(Expr::Literal(Value::Number(0.0))),
                rest: vec![("-".to_string(), value)],
            });
        }
        if let Some(rest) = text.strip_prefix('+') {
            return self.compile_base_value(rest.trim_start());
        }

        // variable reference
        if text.starts_with('$') {
            return self.compile_var_ref(text);
        }

        // array literal
        if text.starts_with('[') {
            if let Some(interior) = matched_group(text, '[', ']') {
                return self.compile_array(interior);
            }
            return Err(self.error(format!("unbalanced `[` in `{text}`")));
        }

        // function call or bare word
        let name = leading_ident(text);
        if !name.is_empty() {
            let rest = &text[name.len()..];
            if rest.is_empty() {
                // bare words are string literals, the modifier-argument
                // convention
                return Ok(Expr::Literal(Value::Str(name.to_string())));
            }
            if rest.starts_with('(') {
                if let Some(interior) = matched_group(rest, '(', ')') {
                    return Ok(Expr::Call {
                        name: name.to_string(),
                        args: self.compile_args(interior)?,
                    });
                }
            }
        }

        Err(self.error(format!("unrecognized value `{text}`")))
    }

    /// Compile `$name.path` with postfix indexing, attribute steps and
    /// method calls. Nesting depth of `(` and `[` is tracked
    /// independently; whether a call target is actually an object is a
    /// runtime question.
    fn compile_var_ref(&mut self, text: &str) -> Result<Expr, Error> {
        let body = &text[1..];
        let path_len = body
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
            .map(char::len_utf8)
            .sum::<usize>();
        let path = &body[..path_len];
        if path.is_empty() || !is_dotted_path(path) {
            return Err(self.error(format!("invalid variable `{text}`")));
        }
        let mut rest = &body[path_len..];

        let mut expr = if rest.starts_with('(') {
            // a call directly on the path: the last dotted segment is
            // the method, the rest is the receiver
            let Some(dot) = path.rfind('.') else {
                return Err(self.error(format!("`${path}` is not callable")));
            };
            let interior = matched_group(rest, '(', ')')
                .ok_or_else(|| self.error(format!("unbalanced `(` in `{text}`")))?;
            let args = self.compile_args(interior)?;
            let consumed = interior.len() + 2;
            let method = Expr::Method {
                base: Box::new(Expr::Var(path[..dot].to_string())),
                name: path[dot + 1..].to_string(),
                args,
            };
            rest = &rest[consumed..];
            method
        } else {
            Expr::Var(path.to_string())
        };

        while !rest.is_empty() {
            if rest.starts_with('[') {
                let interior = matched_group_prefix(rest, '[', ']')
                    .ok_or_else(|| self.error(format!("unbalanced `[` in `{text}`")))?;
                let index = self.compile_expression(interior)?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
                rest = &rest[interior.len() + 2..];
            } else if let Some(after_dot) = rest.strip_prefix('.') {
                let name = leading_ident(after_dot);
                if name.is_empty() {
                    return Err(self.error(format!("invalid member access in `{text}`")));
                }
                let after = &after_dot[name.len()..];
                if after.starts_with('(') {
                    let interior = matched_group_prefix(after, '(', ')')
                        .ok_or_else(|| self.error(format!("unbalanced `(` in `{text}`")))?;
                    let args = self.compile_args(interior)?;
                    expr = Expr::Method {
                        base: Box::new(expr),
                        name: name.to_string(),
                        args,
                    };
                    rest = &after[interior.len() + 2..];
                } else {
                    expr = Expr::Attr {
                        base: Box::new(expr),
                        name: name.to_string(),
                    };
                    rest = after;
                }
            } else {
                return Err(self.error(format!("unexpected `{rest}` after value in `{text}`")));
            }
        }
        Ok(expr)
    }

    /// Compile an array literal interior: comma-separated elements with
    /// optional `key = value` pairs.
    fn compile_array(&mut self, interior: &str) -> Result<Expr, Error> {
        if interior.trim().is_empty() {
            return Ok(Expr::Array(Vec::new()));
        }
        let tokens = self.tokenize_fragment(&array_tokenizer(), interior)?;

        let mut elements: Vec<(Option<String>, String)> = Vec::new();
        let mut key: Option<String> = None;
        let mut current = String::new();
        for token in &tokens {
            match token.as_text() {
                Some(",") => {
                    elements.push((key.take(), std::mem::take(&mut current)));
                }
                Some("=") => {
                    if key.is_some() {
                        return Err(self.error("malformed array element: repeated `=`"));
                    }
                    key = Some(std::mem::take(&mut current));
                }
                _ => token.flatten_into(&mut current),
            }
        }
        if key.is_some() || !current.trim().is_empty() {
            elements.push((key.take(), current));
        }

        let mut compiled = Vec::with_capacity(elements.len());
        for (key, value) in &elements {
            let key = match key {
                Some(k) => Some(self.compile_expression(k)?),
                None => None,
            };
            compiled.push((key, self.compile_expression(value)?));
        }
        Ok(Expr::Array(compiled))
    }

    /// Attach the globally registered output filters to a printed
    /// expression, unless the chain already requests them, the `raw`
    /// sentinel is present, or there is nothing to inject.
    pub fn inject_output_filters(&self, expr: Expr) -> Expr {
        let output = self.context().output_filters();
        let (base, mut calls) = match expr {
            Expr::Filter { base, calls } => (*base, calls),
            other => (other, Vec::new()),
        };
        let had_raw = calls.iter().any(|c| c.name == "raw");
        calls.retain(|c| c.name != "raw");
        if !had_raw {
            for name in output {
                if !calls.iter().any(|c| &c.name == name) {
                    calls.push(FilterCall::bare(name.clone()));
                }
            }
        }
        if calls.is_empty() {
            base
        } else {
            Expr::Filter {
                base: Box::new(base),
                calls,
            }
        }
    }

    fn tokenize_fragment(
        &self,
        tokenizer: &crate::tokenize::Tokenizer,
        text: &str,
    ) -> Result<Vec<Token>, Error> {
        tokenizer
            .tokenize(text)
            .map_err(|e| self.error(e.message.clone()))
    }
}

/// Split a token run on separator texts, flattening everything between
/// them back into operand strings.
fn split_tokens(tokens: &[Token], separators: &[String]) -> (Vec<String>, Vec<String>) {
    let mut parts = vec![String::new()];
    let mut seps = Vec::new();
    for token in tokens {
        match token.as_text() {
            Some(text) if separators.iter().any(|s| s == text) => {
                seps.push(text.to_string());
                parts.push(String::new());
            }
            _ => {
                if let Some(last) = parts.last_mut() {
                    token.flatten_into(last);
                }
            }
        }
    }
    (parts, seps)
}

/// Fold a `+`/`-` that directly follows another operator (or starts the
/// text) into the operand after it, so signed literals survive the
/// operator split.
fn fold_signs(parts: &mut Vec<String>, ops: &mut Vec<String>) {
    while parts.len() >= 2
        && parts[0].trim().is_empty()
        && !ops.is_empty()
        && (ops[0] == "-" || ops[0] == "+")
    {
        let sign = ops.remove(0);
        let operand = parts.remove(1);
        parts[0] = format!("{}{}", sign, operand.trim_start());
    }
    let mut k = 1;
    while k < parts.len() {
        if parts[k].trim().is_empty()
            && k < ops.len()
            && (ops[k] == "-" || ops[k] == "+")
            && k + 1 < parts.len()
        {
            let sign = ops.remove(k);
            let operand = parts.remove(k + 1);
            parts[k] = format!("{}{}", sign, operand.trim_start());
        } else {
            k += 1;
        }
    }
}

/// Whether text could be a numeric literal (and so must not split on a
/// sign or be taken for a bare word).
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') | Some('+') | Some('.') => {
            matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '.')
        }
        _ => false,
    }
}

/// The leading identifier of a fragment.
fn leading_ident(text: &str) -> &str {
    let mut end = 0;
    for (i, c) in text.char_indices() {
        let ok = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    &text[..end]
}

/// Valid dotted-path characters with non-empty segments.
fn is_dotted_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// When `text` is exactly one `open ... close` group, return its
/// interior.
fn matched_group(text: &str, open: char, close: char) -> Option<&str> {
    let interior = matched_group_prefix(text, open, close)?;
    if interior.len() + open.len_utf8() + close.len_utf8() == text.len() {
        Some(interior)
    } else {
        None
    }
}

/// When `text` starts with an `open ... close` group, return its
/// interior. Quoted spans are skipped, with `\` escaping.
fn matched_group_prefix(text: &str, open: char, close: char) -> Option<&str> {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c == open => {}
        _ => return None,
    }
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in chars {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open.len_utf8()..i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::TemplateContext;
    use weft_source::InMemoryLoader;

    fn test_context() -> TemplateContext {
        let mut ctx = TemplateContext::new();
        for op in ["+", "-", "*", "/", "%", "~", "==", "===", "!=", "!==", ">", ">=", "<", "<="] {
            ctx.set_expression_operator(op, |_, _| Ok(Value::Null));
        }
        for name in ["and", "or", "xor", "&&", "||"] {
            ctx.set_logical_operator(
                name,
                crate::scope::LogicalOperator {
                    apply: |a, b| a && b,
                    short_circuit: None,
                },
            );
        }
        ctx
    }

    fn compile(text: &str) -> Result<Expr, Error> {
        let loader = InMemoryLoader::new();
        let mut compiler = Compiler::new(&loader, test_context());
        compiler.compile_expression(text)
    }

    fn compile_stmt(text: &str) -> Result<(Expr, bool), Error> {
        let loader = InMemoryLoader::new();
        let mut compiler = Compiler::new(&loader, test_context());
        compiler.compile_expression_or_statement(text)
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(compile("5").unwrap(), Expr::Literal(Value::Number(5.0)));
        assert_eq!(compile("-5.5").unwrap(), Expr::Literal(Value::Number(-5.5)));
        assert_eq!(compile("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(compile("null").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(
            compile("\"hi\"").unwrap(),
            Expr::Literal(Value::string("hi"))
        );
        assert_eq!(compile("'hi'").unwrap(), Expr::Literal(Value::string("hi")));
    }

    #[test]
    fn string_escapes_are_stripped() {
        assert_eq!(
            compile(r#""say \"hi\"""#).unwrap(),
            Expr::Literal(Value::string(r#"say "hi""#))
        );
    }

    #[test]
    fn variable_reference_keeps_dotted_path_opaque() {
        assert_eq!(compile("$a.b.c").unwrap(), Expr::Var("a.b.c".to_string()));
    }

    #[test]
    fn chain_is_left_leaning_in_encounter_order() {
        let expr = compile("$a + $b - $c").unwrap();
        let Expr::Chain { first, rest } = expr else {
            panic!("expected chain");
        };
        assert_eq!(*first, Expr::Var("a".to_string()));
        assert_eq!(
            rest,
            vec![
                ("+".to_string(), Expr::Var("b".to_string())),
                ("-".to_string(), Expr::Var("c".to_string())),
            ]
        );
    }

    #[test]
    fn parentheses_group_subexpressions() {
        let expr = compile("$a * ($b + $c)").unwrap();
        let Expr::Chain { rest, .. } = expr else {
            panic!("expected chain");
        };
        assert!(matches!(rest[0].1, Expr::Chain { .. }));
    }

    #[test]
    fn negated_variable_becomes_a_zero_left_chain() {
        let expr = compile("-$a").unwrap();
        let Expr::Chain { first, rest } = expr else {
            panic!("expected chain");
        };
        assert_eq!(*first, Expr::Literal(Value::Number(0.0)));
        assert_eq!(rest, vec![("-".to_string(), Expr::Var("a".to_string()))]);
    }

    #[test]
    fn signed_operand_after_operator() {
        let expr = compile("$a * -2").unwrap();
        let Expr::Chain { rest, .. } = expr else {
            panic!("expected chain");
        };
        assert_eq!(rest[0], ("*".to_string(), Expr::Literal(Value::Number(-2.0))));
    }

    #[test]
    fn filters_chain_in_order_with_args() {
        let expr = compile("$x|f1(1)|f2(2)").unwrap();
        let Expr::Filter { base, calls } = expr else {
            panic!("expected filter");
        };
        assert_eq!(*base, Expr::Var("x".to_string()));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "f1");
        assert_eq!(calls[0].args, vec![Expr::Literal(Value::Number(1.0))]);
        assert_eq!(calls[1].name, "f2");
    }

    #[test]
    fn operators_inside_strings_do_not_split() {
        let expr = compile("\"a + b\"").unwrap();
        assert_eq!(expr, Expr::Literal(Value::string("a + b")));
    }

    #[test]
    fn logical_operators_split_before_comparisons() {
        let expr = compile("$a > 1 and $b < 2").unwrap();
        let Expr::Logic { first, rest } = expr else {
            panic!("expected logic chain");
        };
        assert!(matches!(*first, Expr::Chain { .. }));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0, "and");
    }

    #[test]
    fn assignment_is_a_statement() {
        let (expr, statement) = compile_stmt("$x = 5").unwrap();
        assert!(statement);
        assert_eq!(
            expr,
            Expr::Assign {
                path: "x".to_string(),
                op: AssignOp::Set,
                value: Box::new(Expr::Literal(Value::Number(5.0))),
            }
        );
    }

    #[test]
    fn concat_assignment() {
        let (expr, statement) = compile_stmt("$x ~= \"tail\"").unwrap();
        assert!(statement);
        assert!(matches!(
            expr,
            Expr::Assign {
                op: AssignOp::Concat,
                ..
            }
        ));
    }

    #[test]
    fn equality_is_not_an_assignment() {
        let (_, statement) = compile_stmt("$x == 5").unwrap();
        assert!(!statement);
    }

    #[test]
    fn assignment_in_value_position_errors() {
        assert!(compile("$x = 5").is_err());
    }

    #[test]
    fn invalid_assignment_target_errors() {
        assert!(compile_stmt("5 = 3").is_err());
    }

    #[test]
    fn array_literal_with_keys() {
        let expr = compile("[a = 1, b = 2]").unwrap();
        let Expr::Array(items) = expr else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, Some(Expr::Literal(Value::string("a"))));
        assert_eq!(items[0].1, Expr::Literal(Value::Number(1.0)));
    }

    #[test]
    fn empty_array_literal() {
        assert_eq!(compile("[]").unwrap(), Expr::Array(Vec::new()));
    }

    #[test]
    fn nested_array_commas_do_not_split_outer() {
        let expr = compile("[[1, 2], 3]").unwrap();
        let Expr::Array(items) = expr else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0].1, Expr::Array(ref inner) if inner.len() == 2));
    }

    #[test]
    fn bracket_index_and_attribute() {
        let expr = compile("$v[$k].name").unwrap();
        let Expr::Attr { base, name } = expr else {
            panic!("expected attr");
        };
        assert_eq!(name, "name");
        assert!(matches!(*base, Expr::Index { .. }));
    }

    #[test]
    fn method_calls_chain() {
        let expr = compile("$v.fmt(1).pad(2)").unwrap();
        let Expr::Method { base, name, args } = expr else {
            panic!("expected method");
        };
        assert_eq!(name, "pad");
        assert_eq!(args.len(), 1);
        let Expr::Method { base, name, .. } = *base else {
            panic!("expected inner method");
        };
        assert_eq!(name, "fmt");
        assert_eq!(*base, Expr::Var("v".to_string()));
    }

    #[test]
    fn function_call_with_args() {
        let expr = compile("min(1, 2)").unwrap();
        let Expr::Call { name, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(name, "min");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn plain_call_on_variable_is_rejected() {
        assert!(compile("$f(1)").is_err());
    }

    #[test]
    fn unbalanced_bracket_errors() {
        assert!(compile("$v[1").is_err());
        assert!(compile("[1, 2").is_err());
    }

    #[test]
    fn missing_operand_errors() {
        assert!(compile("$a +").is_err());
        assert!(compile("* $a").is_err());
    }

    #[test]
    fn raw_sentinel_suppresses_output_filters() {
        let loader = InMemoryLoader::new();
        let mut ctx = test_context();
        ctx.add_output_filter("escape");
        let mut compiler = Compiler::new(&loader, ctx);

        let plain = compiler.compile_expression("$x").unwrap();
        let injected = compiler.inject_output_filters(plain);
        let Expr::Filter { calls, .. } = injected else {
            panic!("expected injected filter");
        };
        assert_eq!(calls[0].name, "escape");

        let raw = compiler.compile_expression("$x|raw").unwrap();
        let injected = compiler.inject_output_filters(raw);
        assert_eq!(injected, Expr::Var("x".to_string()));
    }

    #[test]
    fn explicit_escape_is_not_doubled() {
        let loader = InMemoryLoader::new();
        let mut ctx = test_context();
        ctx.add_output_filter("escape");
        let mut compiler = Compiler::new(&loader, ctx);
        let expr = compiler.compile_expression("$x|escape").unwrap();
        let injected = compiler.inject_output_filters(expr);
        let Expr::Filter { calls, .. } = injected else {
            panic!("expected filter");
        };
        assert_eq!(calls.len(), 1);
    }
}
