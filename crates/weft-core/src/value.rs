use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RuntimeError;

/// Reflection interface for host objects exposed to templates.
///
/// Dotted variable paths and method calls resolve against this trait when
/// they reach an [`Value::Object`] segment. Implementations decide how a
/// property name maps onto their data (struct field, getter, computed).
pub trait Reflect: fmt::Debug + Send + Sync {
    /// Look up a property by name. `None` means the property is absent.
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Store a property by name. Returns false when the object is
    /// read-only or does not accept the property.
    fn set_property(&self, _name: &str, _value: Value) -> bool {
        false
    }

    /// Invoke a method by name with evaluated arguments.
    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError>;

    /// A short type name used in error messages.
    fn type_name(&self) -> &'static str {
        "object"
    }
}

/// A runtime template value.
#[derive(Clone, Debug)]
pub enum Value {
    /// The absent value. Prints as an empty string.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number (64-bit float; all template numerics are floats).
    Number(f64),
    /// String value.
    Str(String),
    /// Sequential array.
    Array(Vec<Value>),
    /// Insertion-ordered string-keyed map.
    Map(Vec<(String, Value)>),
    /// Host object resolved through the [`Reflect`] trait.
    Object(Arc<dyn Reflect>),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Create an object value from a reflection implementation.
    pub fn object(obj: impl Reflect + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Try to get as a number, coercing bools and numeric strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            Value::Null => Some(0.0),
            _ => None,
        }
    }

    /// Try to get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements for containers, code points for strings.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Check if the container or string is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Check if this value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
            Value::Array(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Look up one path segment in a container or object.
    ///
    /// Arrays accept numeric segments, maps accept their keys, objects go
    /// through [`Reflect::get_property`]. Anything else resolves to `None`.
    pub fn lookup(&self, segment: &str) -> Option<Value> {
        match self {
            Value::Array(items) => {
                let idx = segment.parse::<usize>().ok()?;
                items.get(idx).cloned()
            }
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == segment)
                .map(|(_, v)| v.clone()),
            Value::Object(obj) => obj.get_property(segment),
            _ => None,
        }
    }

    /// Store one path segment into a container, creating the slot if absent.
    ///
    /// Returns false when the value cannot hold the segment (scalars,
    /// read-only objects, non-numeric array index).
    pub fn store(&mut self, segment: &str, value: Value) -> bool {
        match self {
            Value::Array(items) => {
                let Ok(idx) = segment.parse::<usize>() else {
                    return false;
                };
                if idx < items.len() {
                    items[idx] = value;
                } else if idx == items.len() {
                    items.push(value);
                } else {
                    return false;
                }
                true
            }
            Value::Map(entries) => {
                if let Some(slot) = entries.iter_mut().find(|(k, _)| k == segment) {
                    slot.1 = value;
                } else {
                    entries.push((segment.to_string(), value));
                }
                true
            }
            Value::Object(obj) => obj.set_property(segment, value),
            _ => false,
        }
    }

    /// Render this value the way the print instruction does.
    pub fn to_output(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(items) => items.iter().map(Value::to_output).collect(),
            Value::Map(entries) => entries.iter().map(|(_, v)| v.to_output()).collect(),
            Value::Object(obj) => format!("[{}]", obj.type_name()),
        }
    }

    /// Loose equality: numeric when both sides coerce to numbers,
    /// string comparison otherwise.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self.to_output() == other.to_output(),
            },
        }
    }

    /// Strict equality: identical variants and identical contents.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_eq(vb))
            }
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for the comparison operators: numeric when both sides
    /// coerce, lexicographic otherwise.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.to_output().cmp(&other.to_output()),
        }
    }

    /// A short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(obj) => obj.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        let mut entries: Vec<(String, Value)> = map.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Value::Map(entries)
    }
}

/// Format a number without a trailing `.0` for integral values.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_formats_integral_numbers_without_fraction() {
        assert_eq!(Value::Number(5.0).to_output(), "5");
        assert_eq!(Value::Number(5.25).to_output(), "5.25");
        assert_eq!(Value::Number(-3.0).to_output(), "-3");
    }

    #[test]
    fn null_and_false_print_empty() {
        assert_eq!(Value::Null.to_output(), "");
        assert_eq!(Value::Bool(false).to_output(), "");
        assert_eq!(Value::Bool(true).to_output(), "1");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::string("0").is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Array(vec![Value::Null]).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn lookup_array_by_numeric_segment() {
        let v = Value::Array(vec![Value::from(10.0), Value::from(20.0)]);
        assert_eq!(v.lookup("1"), Some(Value::Number(20.0)));
        assert_eq!(v.lookup("5"), None);
        assert_eq!(v.lookup("x"), None);
    }

    #[test]
    fn lookup_map_by_key() {
        let v = Value::Map(vec![("a".to_string(), Value::from(1.0))]);
        assert_eq!(v.lookup("a"), Some(Value::Number(1.0)));
        assert_eq!(v.lookup("b"), None);
    }

    #[test]
    fn store_creates_map_entries() {
        let mut v = Value::Map(vec![]);
        assert!(v.store("a", Value::from(1.0)));
        assert!(v.store("a", Value::from(2.0)));
        assert_eq!(v.lookup("a"), Some(Value::Number(2.0)));
    }

    #[test]
    fn store_rejects_scalars() {
        let mut v = Value::Number(1.0);
        assert!(!v.store("a", Value::Null));
    }

    #[test]
    fn loose_eq_coerces_numbers() {
        assert!(Value::string("5").loose_eq(&Value::Number(5.0)));
        assert!(!Value::string("5").strict_eq(&Value::Number(5.0)));
        assert!(Value::string("abc").loose_eq(&Value::string("abc")));
    }

    #[test]
    fn compare_is_numeric_when_possible() {
        assert_eq!(
            Value::string("10").compare(&Value::Number(9.0)),
            Ordering::Greater
        );
        assert_eq!(
            Value::string("b").compare(&Value::string("a")),
            Ordering::Greater
        );
    }
}
