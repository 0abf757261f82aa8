//! Type descriptors: the container's view of constructible types.
//!
//! A [`TypeDescriptor`] lists a type's supertypes, its constructor and its
//! callable methods, each with a declared parameter list. The container
//! plans construction from these descriptors the way a reflective
//! container would inspect class signatures.
//!
//! # Examples
//! ```
//! use tarkib_container::descriptor::{Method, Param, TypeDescriptor};
//! use tarkib_container::value::Value;
//!
//! let logger = TypeDescriptor::interface("Logger");
//! let file_logger = TypeDescriptor::class("FileLogger")
//!     .implements("Logger")
//!     .constructor(
//!         Method::new(|this, args| {
//!             this.set("path", args.first().cloned().unwrap_or_default());
//!             Ok(Value::Null)
//!         })
//!         .param(Param::string("path").default_value("app.log")),
//!     );
//! # let _ = (logger, file_logger);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tarkib_support::rendering::suggest_similar;
use tracing::debug;

use crate::error::{BoxError, Result, TarkibError, UnknownTypeError};
use crate::key::{TypeName, canonicalize};
use crate::value::{Instance, Value};

/// Body of a constructor or method: receives the target object and the
/// resolved argument list.
pub type MethodBody = Arc<dyn Fn(&Instance, Vec<Value>) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Whether a type can be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A concrete type.
    Class,
    /// An abstract base: usable as a supertype, never instantiated.
    Abstract,
    /// A pure capability: usable as a parameter type, never instantiated.
    Interface,
}

impl TypeKind {
    #[inline]
    pub fn is_instantiable(&self) -> bool {
        matches!(self, TypeKind::Class)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Class => write!(f, "class"),
            TypeKind::Abstract => write!(f, "abstract class"),
            TypeKind::Interface => write!(f, "interface"),
        }
    }
}

/// Declared scalar type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Mixed,
}

impl ScalarType {
    /// Returns `true` if `value`'s runtime kind satisfies this type.
    ///
    /// No coercion: an `Int` never satisfies `Float` and vice versa.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ScalarType::Bool => matches!(value, Value::Bool(_)),
            ScalarType::Int => matches!(value, Value::Int(_)),
            ScalarType::Float => matches!(value, Value::Float(_)),
            ScalarType::Str => matches!(value, Value::Str(_)),
            ScalarType::List => matches!(value, Value::List(_)),
            ScalarType::Map => matches!(value, Value::Map(_)),
            ScalarType::Mixed => true,
        }
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Untyped,
    Scalar(ScalarType),
    Class(TypeName),
}

/// A declared constructor or method parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub variadic: bool,
}

impl Param {
    fn with_type(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            variadic: false,
        }
    }

    /// A parameter with no declared type.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::with_type(name, ParamType::Untyped)
    }

    /// A parameter declared with an object type.
    pub fn class(name: impl Into<String>, type_name: impl Into<TypeName>) -> Self {
        Self::with_type(name, ParamType::Class(type_name.into()))
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::with_type(name, ParamType::Scalar(scalar))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Str)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Int)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Bool)
    }

    /// A trailing variadic parameter that takes every remaining argument.
    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            variadic: true,
            ..Self::untyped(name)
        }
    }

    /// Marks the parameter as accepting `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the value used when nothing else matches.
    ///
    /// A `null` default also makes the parameter nullable.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            self.nullable = true;
        }
        self.default = Some(value);
        self
    }

    /// The declared object type, if any.
    pub fn class_type(&self) -> Option<&TypeName> {
        match &self.ty {
            ParamType::Class(name) => Some(name),
            _ => None,
        }
    }
}

/// A constructor or method: declared parameters plus a body.
#[derive(Clone)]
pub struct Method {
    params: Vec<Param>,
    body: MethodBody,
}

impl Method {
    pub fn new(
        body: impl Fn(&Instance, Vec<Value>) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Appends a declared parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Runs the body against `target`.
    pub fn invoke(&self, target: &Instance, args: Vec<Value>) -> std::result::Result<Value, BoxError> {
        (self.body)(target, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("params", &self.params).finish()
    }
}

/// Describes one type: its kind, supertypes, constructor and methods.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: TypeName,
    kind: TypeKind,
    internal: bool,
    parents: Vec<TypeName>,
    constructor: Option<Method>,
    methods: HashMap<String, Method>,
}

impl TypeDescriptor {
    fn new(name: impl Into<TypeName>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            internal: false,
            parents: Vec::new(),
            constructor: None,
            methods: HashMap::new(),
        }
    }

    /// A concrete, instantiable type.
    pub fn class(name: impl Into<TypeName>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn abstract_class(name: impl Into<TypeName>) -> Self {
        Self::new(name, TypeKind::Abstract)
    }

    pub fn interface(name: impl Into<TypeName>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Declares a base type.
    pub fn extends(mut self, parent: impl Into<TypeName>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Declares an implemented interface (same relation as [`extends`](Self::extends)).
    pub fn implements(self, interface: impl Into<TypeName>) -> Self {
        self.extends(interface)
    }

    /// Marks the type as one that cannot be allocated without running its
    /// constructor, so shared construction cannot split the two steps.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn constructor(mut self, constructor: Method) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Adds a callable method. Method names are case-insensitive.
    pub fn method(mut self, name: &str, method: Method) -> Self {
        self.methods.insert(name.to_lowercase(), method);
        self
    }

    #[inline]
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    #[inline]
    pub fn parents(&self) -> &[TypeName] {
        &self.parents
    }

    #[inline]
    pub fn get_constructor(&self) -> Option<&Method> {
        self.constructor.as_ref()
    }

    pub fn get_method(&self, name: &str) -> Option<&Method> {
        self.methods.get(&name.to_lowercase())
    }
}

// ═══════════════════════════════════════════
// Static registration
// ═══════════════════════════════════════════

/// A descriptor submitted at link time.
///
/// ```rust,ignore
/// inventory::submit! {
///     TypeRegistration(|| TypeDescriptor::class("NullLogger").implements("Logger"))
/// }
/// ```
pub struct TypeRegistration(pub fn() -> TypeDescriptor);

inventory::collect!(TypeRegistration);

// ═══════════════════════════════════════════
// TypeTable
// ═══════════════════════════════════════════

/// All known type descriptors, keyed by canonical name.
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    types: HashMap<TypeName, Arc<TypeDescriptor>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a descriptor.
    pub fn insert(&mut self, descriptor: TypeDescriptor) {
        debug!(type_name = %descriptor.name(), kind = %descriptor.kind(), "Registered type");
        self.types.insert(descriptor.name().clone(), Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.get(canonicalize(name).as_str()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(canonicalize(name).as_str())
    }

    /// Looks up a descriptor, failing with suggestions when it is unknown.
    pub fn require(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.types.keys().map(TypeName::as_str).collect();
            TarkibError::UnknownType(UnknownTypeError {
                requested: TypeName::new(name),
                suggestions: suggest_similar(name, &known, 3),
            })
        })
    }

    /// Strict, transitive supertype test: `child` is not a subclass of itself.
    pub fn is_subclass_of(&self, child: &str, parent: &str) -> bool {
        let target = canonicalize(parent);
        let mut stack: Vec<TypeName> = match self.get(child) {
            Some(descriptor) => descriptor.parents().to_vec(),
            None => return false,
        };
        let mut seen: Vec<TypeName> = Vec::new();

        while let Some(current) = stack.pop() {
            if current.canonical() == target {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            if let Some(descriptor) = self.get(current.as_str()) {
                stack.extend(descriptor.parents().iter().cloned());
            }
            seen.push(current);
        }

        false
    }

    /// `class` is `target` or one of its subtypes.
    pub fn is_instance_of(&self, class: &str, target: &str) -> bool {
        canonicalize(class) == canonicalize(target) || self.is_subclass_of(class, target)
    }

    /// Returns `true` if `value` is an object whose class satisfies `target`.
    pub fn value_is_instance_of(&self, value: &Value, target: &str) -> bool {
        match value {
            Value::Object(instance) => self.is_instance_of(instance.class().as_str(), target),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Method {
        Method::new(|_, _| Ok(Value::Null))
    }

    fn table() -> TypeTable {
        let mut table = TypeTable::new();
        table.insert(TypeDescriptor::interface("Cache"));
        table.insert(TypeDescriptor::abstract_class("BaseCache").implements("Cache"));
        table.insert(TypeDescriptor::class("App\\RedisCache").extends("BaseCache"));
        table.insert(TypeDescriptor::class("Logger").method("Log", noop()));
        table
    }

    #[test]
    fn subclass_is_transitive_and_strict() {
        let table = table();
        assert!(table.is_subclass_of("App\\RedisCache", "BaseCache"));
        assert!(table.is_subclass_of("\\app\\rediscache", "cache"));
        assert!(!table.is_subclass_of("BaseCache", "BaseCache"));
        assert!(!table.is_subclass_of("Logger", "Cache"));
        assert!(!table.is_subclass_of("Unknown", "Cache"));
    }

    #[test]
    fn instance_of_includes_self() {
        let table = table();
        assert!(table.is_instance_of("Logger", "logger"));
        assert!(table.is_instance_of("App\\RedisCache", "Cache"));
    }

    #[test]
    fn cyclic_parents_terminate() {
        let mut table = TypeTable::new();
        table.insert(TypeDescriptor::class("A").extends("B"));
        table.insert(TypeDescriptor::class("B").extends("A"));
        assert!(table.is_subclass_of("A", "B"));
        assert!(!table.is_subclass_of("A", "C"));
    }

    #[test]
    fn methods_are_case_insensitive() {
        let table = table();
        let logger = table.get("LOGGER").unwrap();
        assert!(logger.get_method("log").is_some());
        assert!(logger.get_method("LOG").is_some());
        assert!(logger.get_method("flush").is_none());
    }

    #[test]
    fn require_unknown_suggests() {
        let table = table();
        match table.require("Loger") {
            Err(TarkibError::UnknownType(err)) => {
                assert_eq!(err.suggestions, vec!["Logger".to_string()]);
            }
            other => panic!("Expected UnknownType, got: {other:?}"),
        }
    }

    #[test]
    fn scalar_acceptance_has_no_coercion() {
        assert!(ScalarType::Int.accepts(&Value::Int(1)));
        assert!(!ScalarType::Float.accepts(&Value::Int(1)));
        assert!(!ScalarType::Str.accepts(&Value::Int(1)));
        assert!(ScalarType::Mixed.accepts(&Value::Null));
    }

    #[test]
    fn null_default_makes_nullable() {
        let param = Param::class("logger", "Logger").default_value(Value::Null);
        assert!(param.nullable);
        assert_eq!(param.class_type(), Some(&TypeName::new("Logger")));
    }
}
