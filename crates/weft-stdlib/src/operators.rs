//! The standard operator set.
//!
//! Expression operators: `+ - * / %` arithmetic, `~` concatenation,
//! `== === != !== > >= < <=` comparisons. Logical operators: `and`/`&&`
//! (short-circuits on false), `or`/`||` (short-circuits on true), `xor`.
//!
//! Operators resolve in encounter order at compile time; these entries
//! only supply the runtime behavior for each syntax.

use std::cmp::Ordering;

use weft_core::error::RuntimeError;
use weft_core::value::Value;
use weft_lang::scope::LogicalOperator;
use weft_lang::TemplateContext;

pub(crate) fn register(ctx: &mut TemplateContext) {
    ctx.set_expression_operator("+", |a, b| arithmetic(a, b, "+", |x, y| x + y));
    ctx.set_expression_operator("-", |a, b| arithmetic(a, b, "-", |x, y| x - y));
    ctx.set_expression_operator("*", |a, b| arithmetic(a, b, "*", |x, y| x * y));
    ctx.set_expression_operator("/", divide);
    ctx.set_expression_operator("%", modulo);
    ctx.set_expression_operator("~", |a, b| {
        Ok(Value::Str(format!("{}{}", a.to_output(), b.to_output())))
    });

    ctx.set_expression_operator("==", |a, b| Ok(Value::Bool(a.loose_eq(b))));
    ctx.set_expression_operator("!=", |a, b| Ok(Value::Bool(!a.loose_eq(b))));
    ctx.set_expression_operator("===", |a, b| Ok(Value::Bool(a.strict_eq(b))));
    ctx.set_expression_operator("!==", |a, b| Ok(Value::Bool(!a.strict_eq(b))));
    ctx.set_expression_operator(">", |a, b| {
        Ok(Value::Bool(a.compare(b) == Ordering::Greater))
    });
    ctx.set_expression_operator(">=", |a, b| {
        Ok(Value::Bool(a.compare(b) != Ordering::Less))
    });
    ctx.set_expression_operator("<", |a, b| {
        Ok(Value::Bool(a.compare(b) == Ordering::Less))
    });
    ctx.set_expression_operator("<=", |a, b| {
        Ok(Value::Bool(a.compare(b) != Ordering::Greater))
    });

    let and = LogicalOperator {
        apply: |a, b| a && b,
        short_circuit: Some(false),
    };
    let or = LogicalOperator {
        apply: |a, b| a || b,
        short_circuit: Some(true),
    };
    ctx.set_logical_operator("and", and);
    ctx.set_logical_operator("&&", and);
    ctx.set_logical_operator("or", or);
    ctx.set_logical_operator("||", or);
    ctx.set_logical_operator(
        "xor",
        LogicalOperator {
            apply: |a, b| a ^ b,
            short_circuit: None,
        },
    );
}

fn arithmetic(
    a: &Value,
    b: &Value,
    op: &str,
    f: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok(Value::Number(f(x, y))),
        _ => Err(RuntimeError::msg(format!(
            "cannot apply `{op}` to {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn divide(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a.as_number(), b.as_number()) {
        (Some(_), Some(y)) if y == 0.0 => Err(RuntimeError::msg("division by zero")),
        (Some(x), Some(y)) => Ok(Value::Number(x / y)),
        _ => Err(RuntimeError::msg(format!(
            "cannot apply `/` to {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn modulo(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a.as_number(), b.as_number()) {
        (Some(_), Some(y)) if y == 0.0 => Err(RuntimeError::msg("division by zero")),
        (Some(x), Some(y)) => Ok(Value::Number(x % y)),
        _ => Err(RuntimeError::msg(format!(
            "cannot apply `%` to {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        let mut ctx = TemplateContext::new();
        register(&mut ctx);
        ctx
    }

    fn apply(ctx: &TemplateContext, op: &str, a: Value, b: Value) -> Result<Value, RuntimeError> {
        let f = ctx.get_expression_operator(op).expect("registered");
        f(&a, &b)
    }

    #[test]
    fn arithmetic_coerces_numeric_strings() {
        let ctx = ctx();
        assert_eq!(
            apply(&ctx, "+", Value::string("2"), Value::Number(3.0)).unwrap(),
            Value::Number(5.0)
        );
    }

    #[test]
    fn division_by_zero_errors() {
        let ctx = ctx();
        assert!(apply(&ctx, "/", Value::Number(1.0), Value::Number(0.0)).is_err());
        assert!(apply(&ctx, "%", Value::Number(1.0), Value::Number(0.0)).is_err());
    }

    #[test]
    fn concatenation_stringifies() {
        let ctx = ctx();
        assert_eq!(
            apply(&ctx, "~", Value::string("a"), Value::Number(2.0)).unwrap(),
            Value::string("a2")
        );
    }

    #[test]
    fn loose_vs_strict_equality() {
        let ctx = ctx();
        assert_eq!(
            apply(&ctx, "==", Value::string("5"), Value::Number(5.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            apply(&ctx, "===", Value::string("5"), Value::Number(5.0)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            apply(&ctx, "!==", Value::string("5"), Value::Number(5.0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn comparisons() {
        let ctx = ctx();
        assert_eq!(
            apply(&ctx, ">", Value::Number(2.0), Value::Number(1.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            apply(&ctx, "<=", Value::Number(2.0), Value::Number(2.0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn cannot_add_arrays() {
        let ctx = ctx();
        assert!(apply(&ctx, "+", Value::Array(vec![]), Value::Number(1.0)).is_err());
    }
}
