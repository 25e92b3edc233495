//! Attribute values carried by a log record.
//!
//! Most attributes are plain JSON. Anything else a caller wants to attach is
//! wrapped as [`Opaque`]: it renders through `Display` in text styles but is
//! not natively JSON serializable.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// A value that is not natively JSON encodable.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    aliases: Vec<String>,
    inner: Arc<dyn fmt::Display + Send + Sync>,
}

impl Opaque {
    pub fn new<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            aliases: Vec::new(),
            inner: Arc::new(value),
        }
    }

    /// Register an additional type name this value answers to when matched
    /// by name (e.g. a trait or "parent" name).
    pub fn also_named(mut self, name: &str) -> Self {
        self.aliases.push(name.to_string());
        self
    }

    /// Fully qualified Rust type name, e.g. `my_app::session::Session`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the qualified type name.
    pub fn short_type_name(&self) -> &'static str {
        short_name(self.type_name)
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({}: {})", self.type_name, self.inner)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.to_string() == other.to_string()
    }
}

/// A record attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Json(Value),
    Opaque(Opaque),
}

impl AttrValue {
    pub fn opaque<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        AttrValue::Opaque(Opaque::new(value))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            AttrValue::Json(v) => Some(v),
            AttrValue::Opaque(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            AttrValue::Json(v) => Some(v),
            AttrValue::Opaque(_) => None,
        }
    }

    /// `''`, `{}` and `[]` are the values pruned by remove-empty mode.
    pub fn is_empty_value(&self) -> bool {
        matches!(self, AttrValue::Json(v) if is_empty_value(v))
    }

    /// Name used when matching attributes by type.
    pub fn type_name(&self) -> &str {
        match self {
            AttrValue::Json(v) => json_type_name(v),
            AttrValue::Opaque(o) => o.type_name(),
        }
    }

    /// Text used when the value is substituted into a string.
    pub fn to_text(&self) -> String {
        match self {
            AttrValue::Json(v) => value_to_string(v),
            AttrValue::Opaque(o) => o.to_string(),
        }
    }

    /// Unambiguous text (`%r`, `!r`): strings come out quoted.
    pub fn to_repr(&self) -> String {
        match self {
            AttrValue::Json(v) => v.to_string(),
            AttrValue::Opaque(o) => o.to_string(),
        }
    }
}

impl Default for AttrValue {
    fn default() -> Self {
        AttrValue::Json(Value::String(String::new()))
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::Json(value)
    }
}

impl From<Opaque> for AttrValue {
    fn from(value: Opaque) -> Self {
        AttrValue::Opaque(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Json(Value::String(value.to_string()))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Json(Value::String(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Json(Value::Bool(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Json(Value::from(value))
    }
}

/// Convert a JSON value to the text substituted into format strings.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => value.to_string(), // numbers, bools, null, arrays and objects as JSON text
    }
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub(crate) fn short_name(qualified: &str) -> &str {
    // Strip generic parameters before taking the last path segment.
    let base = qualified.split('<').next().unwrap_or(qualified);
    base.rsplit("::").next().unwrap_or(base)
}
