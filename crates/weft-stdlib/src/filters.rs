//! The standard filter/function set.
//!
//! Filters are ordinary registered functions receiving the piped value
//! as their first argument:
//! - `upper`, `lower`, `capitalize` - case conversion
//! - `truncate` - length-limit with an optional marker
//! - `replace`, `trim`, `cat` - string edits
//! - `default` - fallback for null/empty values
//! - `count` / `length` - element or character count
//! - `escape` - HTML escaping (also the auto-escape output filter)
//! - `join` - concatenate array elements with a separator
//! - `format` - fixed-decimal number formatting

use weft_core::error::RuntimeError;
use weft_core::value::Value;
use weft_lang::TemplateContext;
use weft_lang::scope::Function;

pub(crate) fn register(ctx: &mut TemplateContext) {
    ctx.set_function("upper", Function::native(upper));
    ctx.set_function("lower", Function::native(lower));
    ctx.set_function("capitalize", Function::native(capitalize));
    ctx.set_function("truncate", Function::native(truncate));
    ctx.set_function("replace", Function::native(replace));
    ctx.set_function("trim", Function::native(trim));
    ctx.set_function("cat", Function::native(cat));
    ctx.set_function("default", Function::native(default));
    ctx.set_function("count", Function::native(count));
    ctx.set_function("length", Function::native(count));
    ctx.set_function("escape", Function::native(escape));
    ctx.set_function("join", Function::native(join));
    ctx.set_function("format", Function::native(format_number));
}

fn piped<'a>(args: &'a [Value], name: &'static str) -> Result<&'a Value, RuntimeError> {
    args.first().ok_or(RuntimeError::FilterArity {
        name,
        expected: 1,
        got: 0,
    })
}

fn upper(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Str(piped(args, "upper")?.to_output().to_uppercase()))
}

fn lower(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Str(piped(args, "lower")?.to_output().to_lowercase()))
}

fn capitalize(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = piped(args, "capitalize")?.to_output();
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    Ok(Value::Str(out))
}

fn truncate(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = piped(args, "truncate")?.to_output();
    let length = args
        .get(1)
        .and_then(Value::as_number)
        .map(|n| n.max(0.0) as usize)
        .unwrap_or(80);
    let marker = args.get(2).map(Value::to_output).unwrap_or_default();
    if text.chars().count() <= length {
        return Ok(Value::Str(text));
    }
    let mut out: String = text.chars().take(length).collect();
    out.push_str(&marker);
    Ok(Value::Str(out))
}

fn replace(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = piped(args, "replace")?.to_output();
    let (Some(from), Some(to)) = (args.get(1), args.get(2)) else {
        return Err(RuntimeError::FilterArity {
            name: "replace",
            expected: 3,
            got: args.len(),
        });
    };
    Ok(Value::Str(text.replace(&from.to_output(), &to.to_output())))
}

fn trim(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Str(
        piped(args, "trim")?.to_output().trim().to_string(),
    ))
}

fn cat(args: &[Value]) -> Result<Value, RuntimeError> {
    let mut out = piped(args, "cat")?.to_output();
    for arg in &args[1..] {
        out.push_str(&arg.to_output());
    }
    Ok(Value::Str(out))
}

fn default(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = piped(args, "default")?;
    let fallback = args.get(1).cloned().unwrap_or(Value::Null);
    let empty = matches!(value, Value::Null)
        || matches!(value, Value::Str(s) if s.is_empty());
    Ok(if empty { fallback } else { value.clone() })
}

fn count(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = piped(args, "count")?;
    match value.len() {
        Some(n) => Ok(Value::Number(n as f64)),
        None => Ok(Value::Number(0.0)),
    }
}

fn escape(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = piped(args, "escape")?.to_output();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Ok(Value::Str(out))
}

fn join(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = piped(args, "join")?;
    let separator = args.get(1).map(Value::to_output).unwrap_or_default();
    let pieces: Vec<String> = match value {
        Value::Array(items) => items.iter().map(Value::to_output).collect(),
        Value::Map(entries) => entries.iter().map(|(_, v)| v.to_output()).collect(),
        other => vec![other.to_output()],
    };
    Ok(Value::Str(pieces.join(&separator)))
}

fn format_number(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = piped(args, "format")?;
    let Some(n) = value.as_number() else {
        return Err(RuntimeError::msg(format!(
            "cannot format a {} as a number",
            value.type_name()
        )));
    };
    let decimals = args
        .get(1)
        .and_then(Value::as_number)
        .map(|d| d.max(0.0) as usize)
        .unwrap_or(0);
    Ok(Value::Str(format!("{:.*}", decimals, n)))
}
