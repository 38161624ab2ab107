//! The hierarchical template context.
//!
//! A context holds the variable scope and four independent registries:
//! blocks, functions, expression operators and logical operators, plus an
//! ordered list of output filters. Child contexts copy the parent's
//! registries and variables by value at creation time; later mutations on
//! either side stay invisible to the other until the child is absorbed
//! back, which always merges functions (a function defined inside a block
//! is visible after the block ends) and optionally the variables.

use std::collections::HashMap;
use std::sync::Arc;

use weft_core::error::RuntimeError;
use weft_core::ir::{Body, Expr};
use weft_core::value::Value;

use crate::block::Block;

/// A callable registered on the context.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// A binary expression operator implementation.
pub type OperatorFn = dyn Fn(&Value, &Value) -> Result<Value, RuntimeError> + Send + Sync;

/// A registered function: native code or a compiled template function.
#[derive(Clone)]
pub enum Function {
    Native(Arc<NativeFn>),
    Template {
        params: Arc<Vec<(String, Option<Expr>)>>,
        body: Arc<Body>,
    },
}

impl Function {
    pub fn native(
        f: impl Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        Function::Native(Arc::new(f))
    }
}

/// A logical operator with its short-circuit rule: when the accumulated
/// left side equals `short_circuit`, the right operand is not evaluated.
#[derive(Clone, Copy)]
pub struct LogicalOperator {
    pub apply: fn(bool, bool) -> bool,
    pub short_circuit: Option<bool>,
}

/// Host-environment function fallback, consulted when a called name has
/// no registered function.
pub trait HostFunctions: Send + Sync {
    fn exists(&self, name: &str) -> bool;
    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError>;
}

#[derive(Clone)]
struct BlockEntry {
    block: Arc<dyn Block>,
    /// Scope depth of a private registration. Private blocks are visible
    /// only at the depth they were registered and are never copied into
    /// children.
    private_depth: Option<usize>,
}

/// A node in the scope tree.
#[derive(Clone, Default)]
pub struct TemplateContext {
    depth: usize,
    vars: HashMap<String, Value>,
    blocks: HashMap<String, BlockEntry>,
    functions: HashMap<String, Function>,
    expr_ops: HashMap<String, Arc<OperatorFn>>,
    logic_ops: HashMap<String, LogicalOperator>,
    output_filters: Vec<String>,
    host: Option<Arc<dyn HostFunctions>>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Create a child scope: registries and variables copied by value,
    /// private block registrations left behind.
    pub fn create_child(&self) -> Self {
        Self {
            depth: self.depth + 1,
            vars: self.vars.clone(),
            blocks: self
                .blocks
                .iter()
                .filter(|(_, e)| e.private_depth.is_none())
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
            functions: self.functions.clone(),
            expr_ops: self.expr_ops.clone(),
            logic_ops: self.logic_ops.clone(),
            output_filters: self.output_filters.clone(),
            host: self.host.clone(),
        }
    }

    /// Return from a child scope. Functions defined in the child become
    /// visible here; variables only when `keep_variables` is set.
    pub fn absorb(&mut self, child: TemplateContext, keep_variables: bool) {
        self.functions = child.functions;
        if keep_variables {
            self.vars = child.vars;
        }
    }

    // ---- variables -------------------------------------------------

    /// Look up a dotted path, falling back to `default` when any segment
    /// is missing.
    pub fn get_variable(&self, name: &str, default: Value) -> Value {
        let mut segments = name.split('.');
        let Some(first) = segments.next() else {
            return default;
        };
        let Some(mut current) = self.vars.get(first).cloned() else {
            return default;
        };
        for segment in segments {
            match current.lookup(segment) {
                Some(next) => current = next,
                None => return default,
            }
        }
        current
    }

    /// Check whether the top-level segment of a name is set.
    pub fn has_variable(&self, name: &str) -> bool {
        let first = name.split('.').next().unwrap_or(name);
        self.vars.contains_key(first)
    }

    /// Store a dotted path, creating intermediate containers as needed.
    /// Setting a top-level name to null removes it.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        let segments: Vec<&str> = name.split('.').collect();
        match segments.as_slice() {
            [] => {}
            [single] => {
                if matches!(value, Value::Null) {
                    self.vars.remove(*single);
                } else {
                    self.vars.insert((*single).to_string(), value);
                }
            }
            [first, rest @ ..] => {
                let root = self
                    .vars
                    .entry((*first).to_string())
                    .or_insert_with(|| Value::Map(Vec::new()));
                set_path(root, rest, value);
            }
        }
    }

    /// Replace the whole variable map. Used when invoking a template
    /// function, which starts from an empty scope.
    pub fn reset_variables(&mut self, vars: HashMap<String, Value>) {
        self.vars = vars;
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.vars
    }

    // ---- blocks ----------------------------------------------------

    pub fn set_block(&mut self, block: Arc<dyn Block>) {
        self.blocks.insert(
            block.name().to_string(),
            BlockEntry {
                block,
                private_depth: None,
            },
        );
    }

    /// Register a block visible only in this scope, never in children.
    pub fn set_private_block(&mut self, block: Arc<dyn Block>) {
        self.blocks.insert(
            block.name().to_string(),
            BlockEntry {
                block,
                private_depth: Some(self.depth),
            },
        );
    }

    pub fn get_block(&self, name: &str) -> Option<Arc<dyn Block>> {
        let entry = self.blocks.get(name)?;
        match entry.private_depth {
            Some(depth) if depth != self.depth => None,
            _ => Some(Arc::clone(&entry.block)),
        }
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.get_block(name).is_some()
    }

    // ---- functions -------------------------------------------------

    pub fn set_function(&mut self, name: impl Into<String>, function: Function) {
        self.functions.insert(name.into(), function);
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call a native function, consulting the host fallback for names
    /// with no registration. Template functions need the renderer and are
    /// dispatched there.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match self.functions.get(name) {
            Some(Function::Native(f)) => f(args),
            Some(Function::Template { .. }) => Err(RuntimeError::msg(format!(
                "function `{name}` requires the renderer"
            ))),
            None => match &self.host {
                Some(host) if host.exists(name) => host.invoke(name, args),
                _ => Err(RuntimeError::UnknownFunction(name.to_string())),
            },
        }
    }

    /// Left-fold a value through a list of native filters.
    pub fn apply_filters(
        &self,
        value: Value,
        filters: &[(String, Vec<Value>)],
    ) -> Result<Value, RuntimeError> {
        let mut current = value;
        for (name, extra) in filters {
            let mut args = Vec::with_capacity(extra.len() + 1);
            args.push(current);
            args.extend(extra.iter().cloned());
            current = self.call(name, &args)?;
        }
        Ok(current)
    }

    pub fn set_host_functions(&mut self, host: Arc<dyn HostFunctions>) {
        self.host = Some(host);
    }

    pub fn host_functions(&self) -> Option<&Arc<dyn HostFunctions>> {
        self.host.as_ref()
    }

    // ---- operators -------------------------------------------------

    pub fn set_expression_operator(
        &mut self,
        syntax: impl Into<String>,
        apply: impl Fn(&Value, &Value) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) {
        self.expr_ops.insert(syntax.into(), Arc::new(apply));
    }

    pub fn get_expression_operator(&self, syntax: &str) -> Option<Arc<OperatorFn>> {
        self.expr_ops.get(syntax).cloned()
    }

    /// The registered expression-operator syntaxes, longest first.
    pub fn expression_operator_syntaxes(&self) -> Vec<String> {
        let mut syntaxes: Vec<String> = self.expr_ops.keys().cloned().collect();
        syntaxes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        syntaxes
    }

    pub fn set_logical_operator(&mut self, name: impl Into<String>, op: LogicalOperator) {
        self.logic_ops.insert(name.into(), op);
    }

    pub fn get_logical_operator(&self, name: &str) -> Option<LogicalOperator> {
        self.logic_ops.get(name).copied()
    }

    /// The registered logical-operator names, longest first.
    pub fn logical_operator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.logic_ops.keys().cloned().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        names
    }

    // ---- output filters --------------------------------------------

    /// Append a filter applied to every printed expression unless the
    /// expression opts out.
    pub fn add_output_filter(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.output_filters.contains(&name) {
            self.output_filters.push(name);
        }
    }

    pub fn output_filters(&self) -> &[String] {
        &self.output_filters
    }
}

/// Walk a dotted path through containers, creating intermediate maps.
fn set_path(container: &mut Value, segments: &[&str], value: Value) -> bool {
    match segments {
        [] => false,
        [last] => container.store(last, value),
        [first, rest @ ..] => {
            let needs_container = !matches!(
                container.lookup(first),
                Some(Value::Map(_)) | Some(Value::Array(_))
            );
            if needs_container && !container.store(first, Value::Map(Vec::new())) {
                return false;
            }
            match container {
                Value::Map(entries) => entries
                    .iter_mut()
                    .find(|(k, _)| k == first)
                    .map(|(_, v)| set_path(v, rest, value))
                    .unwrap_or(false),
                Value::Array(items) => first
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get_mut(idx))
                    .map(|v| set_path(v, rest, value))
                    .unwrap_or(false),
                _ => false,
            }
        }
    }
}
