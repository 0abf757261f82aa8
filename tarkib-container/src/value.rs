//! Runtime values passed through the container.
//!
//! Constructors and methods registered in the
//! [`TypeTable`](crate::descriptor::TypeTable) receive and return
//! [`Value`]s. Objects are reference-counted handles whose fields live
//! behind a lock, so an object can be allocated first and initialised
//! later by its constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::key::TypeName;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Instance),
}

impl Value {
    /// Short name of the runtime kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => f.debug_map().entries(map).finish(),
            Value::Object(instance) => write!(f, "{instance:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
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

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Object(instance)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ═══════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════

/// An object built by the container.
///
/// Fields start empty and are filled in by the type's constructor body.
pub struct Object {
    class: TypeName,
    fields: RwLock<BTreeMap<String, Value>>,
}

impl Object {
    /// The concrete type this object was allocated as.
    #[inline]
    pub fn class(&self) -> &TypeName {
        &self.class
    }

    /// Reads a field, cloning the value out.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.read().get(field).cloned()
    }

    /// Reads a field that holds an object.
    pub fn get_object(&self, field: &str) -> Option<Instance> {
        match self.fields.read().get(field) {
            Some(Value::Object(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Writes a field, returning the previous value.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.write().insert(field.into(), value.into())
    }

    /// Returns `true` once any field has been written.
    pub fn is_initialized(&self) -> bool {
        !self.fields.read().is_empty()
    }
}

/// Shared handle to an [`Object`]. Cloning is cheap; identity is the pointer.
#[derive(Clone)]
pub struct Instance(Arc<Object>);

impl Instance {
    /// Allocates an object of `class` with no fields set.
    pub fn allocate(class: TypeName) -> Self {
        Instance(Arc::new(Object {
            class,
            fields: RwLock::new(BTreeMap::new()),
        }))
    }

    /// Returns `true` if both handles point at the same object.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Instance {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

// Fields are not printed: shared objects may reference each other.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.0.class, Arc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_identity() {
        let a = Instance::allocate(TypeName::new("Logger"));
        let b = a.clone();
        let c = Instance::allocate(TypeName::new("Logger"));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(Value::from(a.clone()), Value::from(b));
        assert_ne!(Value::from(a), Value::from(c));
    }

    #[test]
    fn fields_set_after_allocation() {
        let obj = Instance::allocate(TypeName::new("Config"));
        assert!(!obj.is_initialized());
        obj.set("dsn", "sqlite::memory:");
        assert!(obj.is_initialized());
        assert_eq!(obj.get("dsn"), Some(Value::from("sqlite::memory:")));
        assert_eq!(obj.get("missing"), None);
    }

    #[test]
    fn json_conversion() {
        let value = Value::from(serde_json::json!({"a": [1, 2.5, "x", null, true]}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(
            map["a"],
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Null,
                Value::Bool(true),
            ])
        );
    }

    #[test]
    fn kinds() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::from(vec![1i64]).kind(), "list");
    }
}
