//! Script values and property keys.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::function::{ClassRef, FunctionRef};
use crate::object::ObjectRef;

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// A unique key. Two symbols are equal only if they came from the same
/// `Symbol(...)` call, whatever their descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    pub fn new(description: Option<&str>) -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.map(Arc::from),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or(""))
    }
}

/// Key of a public property or a slot-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(Arc<str>),
    Symbol(Symbol),
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(Arc::from(s))
    }
}

impl From<Symbol> for PropertyKey {
    fn from(s: Symbol) -> Self {
        PropertyKey::Symbol(s)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => f.write_str(s),
            PropertyKey::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Symbol(Symbol),
    Object(ObjectRef),
    Function(FunctionRef),
    Class(ClassRef),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(Arc::from(s))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_)
            | Value::Object(_)
            | Value::Function(_)
            | Value::Class(_) => true,
        }
    }

    /// Result of `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Function(_) | Value::Class(_) => "function",
        }
    }

    /// `==`: primitives by value, everything else by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Key used when this value appears in `obj[v]` or `private[v]`.
    pub fn to_property_key(&self) -> PropertyKey {
        match self {
            Value::String(s) => PropertyKey::String(s.clone()),
            Value::Symbol(s) => PropertyKey::Symbol(s.clone()),
            other => PropertyKey::String(Arc::from(other.to_string())),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Short description for error messages: `5`, `"id"`, `object #3`.
    pub fn describe(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s.as_ref()),
            Value::Object(o) => format!("object #{}", o.id()),
            Value::Function(f) => format!("function {}", f.display_name()),
            Value::Class(c) => format!("class {}", c.name()),
            other => other.to_string(),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(func) => write!(f, "[function {}]", func.display_name()),
            Value::Class(class) => write!(f, "[class {}]", class.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::Object(o) => write!(f, "Object(#{})", o.id()),
            Value::Function(func) => write!(f, "Function({})", func.display_name()),
            Value::Class(class) => write!(f, "Class({})", class.name()),
            other => write!(f, "{}", other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn numeric_keys_are_canonical_strings() {
        assert_eq!(Value::Number(1.0).to_property_key(), PropertyKey::from("1"));
        assert_eq!(Value::string("1").to_property_key(), PropertyKey::from("1"));
    }

    #[test]
    fn symbols_are_unique() {
        let a = Symbol::new(Some("k"));
        let b = Symbol::new(Some("k"));
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert_ne!(PropertyKey::from(a.clone()), PropertyKey::from("k"));
        assert_eq!(a.to_string(), "Symbol(k)");
    }

    #[test]
    fn object_equality_is_identity() {
        let a = Value::Object(Object::new(None));
        let b = Value::Object(Object::new(None));
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::Object(Object::new(None)).is_truthy());
    }
}
