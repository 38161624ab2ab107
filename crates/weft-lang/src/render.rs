//! Execution of compiled templates.
//!
//! The renderer walks the instruction tree against a [`TemplateContext`],
//! producing the output string. Dynamic includes and extends resolve
//! their targets through a [`TemplateEnv`], implemented by the session
//! engine (which owns the loader and the artifact cache).

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use weft_core::error::{Error, RuntimeError};
use weft_core::ir::{self, Expr, Instr, Template};
use weft_core::value::Value;

use crate::scope::{Function, TemplateContext};

/// Resolves template names at render time.
pub trait TemplateEnv {
    /// Load (and compile, if needed) a template by resource name.
    fn load(&self, name: &str) -> Result<Arc<Template>, Error>;
}

/// An environment with no resources; every dynamic include fails with
/// "template not found". For renders that never leave one template.
pub struct NullEnv;

impl TemplateEnv for NullEnv {
    fn load(&self, name: &str) -> Result<Arc<Template>, Error> {
        Err(Error::NotFound(name.to_string()))
    }
}

/// Loop control bubbling out of a body.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Signal {
    Normal,
    Break,
    Continue,
}

/// Executes compiled templates.
///
/// A renderer owns the in-flight output buffer and per-render state
/// (cycle counters); each render should own its own context chain.
pub struct Renderer<'e> {
    env: &'e dyn TemplateEnv,
    out: String,
    cycles: HashMap<usize, usize>,
}

impl<'e> Renderer<'e> {
    pub fn new(env: &'e dyn TemplateEnv) -> Self {
        Self {
            env,
            out: String::new(),
            cycles: HashMap::new(),
        }
    }

    /// Render a template against a context, returning the output.
    pub fn render(
        &mut self,
        template: &Template,
        ctx: &mut TemplateContext,
    ) -> Result<String, Error> {
        self.out.clear();
        self.cycles.clear();
        self.exec_body(&template.body, ctx)?;
        Ok(mem::take(&mut self.out))
    }

    fn exec_body(&mut self, body: &[Instr], ctx: &mut TemplateContext) -> Result<Signal, Error> {
        for instr in body {
            match self.exec(instr, ctx)? {
                Signal::Normal => {}
                signal => return Ok(signal),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec(&mut self, instr: &Instr, ctx: &mut TemplateContext) -> Result<Signal, Error> {
        match instr {
            Instr::Literal(text) => self.out.push_str(text),

            Instr::Print(expr) => {
                let value = self.eval(expr, ctx)?;
                self.out.push_str(&value.to_output());
            }

            Instr::Eval(expr) => {
                self.eval(expr, ctx)?;
            }

            Instr::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.eval(condition, ctx)?.is_truthy() {
                        return self.exec_scoped(body, ctx, true);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_scoped(body, ctx, true);
                }
            }

            Instr::Foreach {
                list,
                value,
                key,
                loop_var,
                body,
            } => {
                let list_value = self.eval(list, ctx)?;
                let items = self.iterable(&list_value)?;
                let length = items.len();
                let mut child = ctx.create_child();
                for (index, (item_key, item)) in items.into_iter().enumerate() {
                    child.set_variable(value, item);
                    if let Some(key_name) = key {
                        child.set_variable(key_name, item_key);
                    }
                    if let Some(loop_name) = loop_var {
                        child.set_variable(loop_name, loop_metadata(index, length));
                    }
                    match self.exec_body(body, &mut child)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                    }
                }
                ctx.absorb(child, true);
            }

            Instr::Break => return Ok(Signal::Break),
            Instr::Continue => return Ok(Signal::Continue),

            Instr::Region { body, .. } => return self.exec_body(body, ctx),

            // An unsubstituted parent marker renders nothing.
            Instr::Parent => {}

            Instr::Include { target, with } => {
                let name = self.eval(target, ctx)?.to_output();
                let template = self.env.load(&name)?;
                let mut child = ctx.create_child();
                if let Some(vars) = with {
                    let seeded = self.eval(vars, ctx)?;
                    seed_variables(&mut child, seeded);
                }
                self.exec_body(&template.body, &mut child)?;
                ctx.absorb(child, false);
            }

            Instr::With { vars, body } => {
                let seeded = self.eval(vars, ctx)?;
                let mut child = ctx.create_child();
                seed_variables(&mut child, seeded);
                let signal = self.exec_body(body, &mut child)?;
                ctx.absorb(child, false);
                return Ok(signal);
            }

            Instr::Extend { target, overrides } => {
                let name = self.eval(target, ctx)?.to_output();
                let parent = self.env.load(&name)?;
                let mut body = parent.body.clone();
                for o in overrides {
                    ir::apply_override(&mut body, 0, &o.name, o.mode, o.body.clone());
                }
                return self.exec_body(&body, ctx);
            }

            Instr::Define { name, params, body } => {
                ctx.set_function(
                    name.clone(),
                    Function::Template {
                        params: Arc::new(params.clone()),
                        body: Arc::clone(body),
                    },
                );
            }

            Instr::Capture { var, body } => {
                let mut child = ctx.create_child();
                let captured = self.render_scoped(body, &mut child)?;
                ctx.absorb(child, true);
                ctx.set_variable(var, Value::Str(captured));
            }

            Instr::FilterRegion { filters, body } => {
                let mut child = ctx.create_child();
                let captured = self.render_scoped(body, &mut child)?;
                ctx.absorb(child, true);
                let mut value = Value::Str(captured);
                for call in filters {
                    if call.name == "raw" {
                        continue;
                    }
                    let mut args = vec![value];
                    for arg in &call.args {
                        args.push(self.eval(arg, ctx)?);
                    }
                    value = self.call_function(ctx, &call.name, args)?;
                }
                self.out.push_str(&value.to_output());
            }

            Instr::Cycle { id, values } => {
                let list = self.eval(values, ctx)?;
                let items: Vec<Value> = match list {
                    Value::Array(items) => items,
                    Value::Map(entries) => entries.into_iter().map(|(_, v)| v).collect(),
                    other => vec![other],
                };
                if !items.is_empty() {
                    let counter = self.cycles.entry(*id).or_insert(0);
                    let index = *counter % items.len();
                    *counter += 1;
                    self.out.push_str(&items[index].to_output());
                }
            }
        }
        Ok(Signal::Normal)
    }

    /// Execute a body in a child scope, absorbing it back afterwards.
    fn exec_scoped(
        &mut self,
        body: &[Instr],
        ctx: &mut TemplateContext,
        keep_variables: bool,
    ) -> Result<Signal, Error> {
        let mut child = ctx.create_child();
        let signal = self.exec_body(body, &mut child)?;
        ctx.absorb(child, keep_variables);
        Ok(signal)
    }

    /// Render a body into a string instead of the main output.
    fn render_scoped(
        &mut self,
        body: &[Instr],
        ctx: &mut TemplateContext,
    ) -> Result<String, Error> {
        let saved = mem::take(&mut self.out);
        let result = self.exec_body(body, ctx);
        let captured = mem::replace(&mut self.out, saved);
        result.map(|_| captured)
    }

    /// Evaluate an expression against the context.
    pub fn eval(&mut self, expr: &Expr, ctx: &mut TemplateContext) -> Result<Value, Error> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Var(path) => Ok(ctx.get_variable(path, Value::Null)),

            Expr::Index { base, index } => {
                let base = self.eval(base, ctx)?;
                let index = self.eval(index, ctx)?;
                let segment = index.to_output();
                Ok(base.lookup(&segment).unwrap_or(Value::Null))
            }

            Expr::Attr { base, name } => {
                let base = self.eval(base, ctx)?;
                Ok(base.lookup(name).unwrap_or(Value::Null))
            }

            Expr::Method { base, name, args } => {
                let receiver = self.eval(base, ctx)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, ctx)?);
                }
                match receiver {
                    Value::Object(obj) => {
                        obj.call_method(name, &evaluated).map_err(Error::from)
                    }
                    _ => Err(RuntimeError::NotAnObject(describe_target(base)).into()),
                }
            }

            Expr::Call { name, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, ctx)?);
                }
                self.call_function(ctx, name, evaluated)
            }

            Expr::Array(elements) => {
                let keyed = elements.iter().any(|(k, _)| k.is_some());
                if keyed {
                    let mut entries = Vec::with_capacity(elements.len());
                    let mut next_index = 0usize;
                    for (key, value) in elements {
                        let value = self.eval(value, ctx)?;
                        let key = match key {
                            Some(expr) => self.eval(expr, ctx)?.to_output(),
                            None => {
                                let k = next_index.to_string();
                                next_index += 1;
                                k
                            }
                        };
                        entries.push((key, value));
                    }
                    Ok(Value::Map(entries))
                } else {
                    let mut items = Vec::with_capacity(elements.len());
                    for (_, value) in elements {
                        items.push(self.eval(value, ctx)?);
                    }
                    Ok(Value::Array(items))
                }
            }

            Expr::Chain { first, rest } => {
                let mut acc = self.eval(first, ctx)?;
                for (op, operand) in rest {
                    let apply = ctx
                        .get_expression_operator(op)
                        .ok_or_else(|| RuntimeError::UnknownOperator(op.clone()))?;
                    let rhs = self.eval(operand, ctx)?;
                    acc = apply(&acc, &rhs)?;
                }
                Ok(acc)
            }

            Expr::Logic { first, rest } => {
                let mut acc = self.eval(first, ctx)?.is_truthy();
                for (name, operand) in rest {
                    let op = ctx
                        .get_logical_operator(name)
                        .ok_or_else(|| RuntimeError::UnknownOperator(name.clone()))?;
                    if op.short_circuit == Some(acc) {
                        continue;
                    }
                    let rhs = self.eval(operand, ctx)?.is_truthy();
                    acc = (op.apply)(acc, rhs);
                }
                Ok(Value::Bool(acc))
            }

            Expr::Filter { base, calls } => {
                let mut value = self.eval(base, ctx)?;
                for call in calls {
                    if call.name == "raw" {
                        continue;
                    }
                    let mut args = vec![value];
                    for arg in &call.args {
                        args.push(self.eval(arg, ctx)?);
                    }
                    value = self.call_function(ctx, &call.name, args)?;
                }
                Ok(value)
            }

            Expr::Assign { path, op, value } => {
                let value = self.eval(value, ctx)?;
                match op {
                    ir::AssignOp::Set => ctx.set_variable(path, value),
                    ir::AssignOp::Concat => {
                        let existing = ctx.get_variable(path, Value::Str(String::new()));
                        let combined = format!("{}{}", existing.to_output(), value.to_output());
                        ctx.set_variable(path, Value::Str(combined));
                    }
                }
                Ok(Value::Null)
            }
        }
    }

    /// Dispatch a function call: a registered native, a compiled template
    /// function (fresh child scope, positional binding with defaults), or
    /// the host fallback.
    pub fn call_function(
        &mut self,
        ctx: &mut TemplateContext,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        match ctx.get_function(name).cloned() {
            Some(Function::Native(f)) => f(&args).map_err(Error::from),
            Some(Function::Template { params, body }) => {
                let mut vars = HashMap::new();
                for (i, (param, default)) in params.iter().enumerate() {
                    let value = match args.get(i) {
                        Some(v) => v.clone(),
                        None => match default {
                            Some(expr) => self.eval(expr, ctx)?,
                            None => Value::Null,
                        },
                    };
                    vars.insert(param.clone(), value);
                }
                let mut child = ctx.create_child();
                child.reset_variables(vars);
                let output = self.render_scoped(&body, &mut child)?;
                ctx.absorb(child, false);
                Ok(Value::Str(output))
            }
            None => match ctx.host_functions() {
                Some(host) if host.exists(name) => host.invoke(name, &args).map_err(Error::from),
                _ => Err(RuntimeError::UnknownFunction(name.to_string()).into()),
            },
        }
    }

    /// Turn a value into (key, item) pairs for iteration.
    fn iterable(&self, value: &Value) -> Result<Vec<(Value, Value)>, Error> {
        match value {
            Value::Array(items) => Ok(items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v.clone()))
                .collect()),
            Value::Map(entries) => Ok(entries
                .iter()
                .map(|(k, v)| (Value::string(k.clone()), v.clone()))
                .collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(RuntimeError::msg(format!(
                "cannot iterate a {} value",
                other.type_name()
            ))
            .into()),
        }
    }
}

/// The per-iteration loop variable.
fn loop_metadata(index: usize, length: usize) -> Value {
    Value::Map(vec![
        ("index".to_string(), Value::Number(index as f64)),
        (
            "revindex".to_string(),
            Value::Number((length - index - 1) as f64),
        ),
        ("first".to_string(), Value::Bool(index == 0)),
        ("last".to_string(), Value::Bool(index + 1 == length)),
        ("length".to_string(), Value::Number(length as f64)),
    ])
}

/// Seed a child scope with the entries of an evaluated `with` map.
fn seed_variables(ctx: &mut TemplateContext, seeded: Value) {
    match seeded {
        Value::Map(entries) => {
            for (name, value) in entries {
                ctx.set_variable(&name, value);
            }
        }
        Value::Array(items) => {
            for (i, value) in items.into_iter().enumerate() {
                ctx.set_variable(&i.to_string(), value);
            }
        }
        _ => {}
    }
}

/// A readable name for a method-call receiver in error messages.
fn describe_target(base: &Expr) -> String {
    match base {
        Expr::Var(path) => format!("${path}"),
        Expr::Attr { name, .. } => format!("`{name}`"),
        Expr::Index { .. } => "the indexed value".to_string(),
        _ => "the value".to_string(),
    }
}
