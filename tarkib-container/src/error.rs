//! Error types for Tarkib container operations.
//!
//! Every failure is surfaced to the immediate caller of
//! [`Container::create`](crate::container::Container::create) or
//! [`Container::add_rule`](crate::container::Container::add_rule).
//! The container never retries and never rolls back partial state.

use std::fmt;

use tarkib_support::rendering::render_chain;

use crate::descriptor::TypeKind;
use crate::key::TypeName;

/// Boxed error returned by user-supplied constructor, method, factory and
/// callback bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Tarkib operations.
#[derive(Debug, thiserror::Error)]
pub enum TarkibError {
    /// Target is an interface or abstract type with no concrete mapping.
    #[error("Cannot instantiate {kind} {name}\n  Hint: add a rule with `instanceOf` pointing at a concrete type")]
    UnconstructableType { name: TypeName, kind: TypeKind },

    /// Malformed rule structure supplied to `add_rule`.
    #[error("Invalid rule for {name}: {reason}")]
    InvalidRule { name: String, reason: String },

    /// Non-shared types form a construction cycle.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// A typed parameter could not be resolved (strict mode only).
    #[error("Cannot resolve parameter ${param} of {owner}: {source}")]
    ArgumentResolution {
        owner: String,
        param: String,
        #[source]
        source: Box<TarkibError>,
    },

    /// The type name has no descriptor in the type table.
    #[error("{}", .0)]
    UnknownType(UnknownTypeError),

    /// A rule or marker referenced a method the type does not declare.
    #[error("Type {type_name} has no method {method}()")]
    UnknownMethod { type_name: TypeName, method: String },

    /// A `[receiver, method]` marker expanded to something other than an object.
    #[error("Cannot call {method}() on a non-object value ({found})")]
    NotAnObject { method: String, found: &'static str },

    /// A constructor, method, factory or callback body returned an error.
    #[error("Failed to invoke {target}: {source}")]
    InvocationFailed {
        target: String,
        #[source]
        source: BoxError,
    },
}

/// Error when a type name is missing from the type table.
///
/// Includes "did you mean?" suggestions drawn from the known types.
#[derive(Debug)]
pub struct UnknownTypeError {
    /// The type that was requested
    pub requested: TypeName,
    /// Known type names that look similar
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnknownTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown type: {}", self.requested)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register a TypeDescriptor for {} before calling create()",
            self.requested
        )
    }
}

/// Error when a construction cycle is detected.
///
/// Shows the full chain so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CyclicDependencyError {
    /// The chain of type names being constructed.
    /// Example: ["A", "B", "A"]
    pub chain: Vec<TypeName>,
    /// Set when the chain was cut by the depth limit rather than a repeat.
    pub depth_limit: Option<usize>,
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.chain.iter().map(TypeName::as_str).collect();
        match self.depth_limit {
            Some(limit) => write!(f, "Construction depth limit ({limit}) exceeded:\n  ")?,
            None => write!(f, "Cyclic dependency detected:\n  ")?,
        }
        write!(f, "{}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: mark one of these types as shared, or break the cycle with a method call"
        )
    }
}

impl TarkibError {
    pub(crate) fn invalid_rule(name: &str, reason: impl Into<String>) -> Self {
        TarkibError::InvalidRule {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invocation(target: impl Into<String>, source: BoxError) -> Self {
        TarkibError::InvocationFailed {
            target: target.into(),
            source,
        }
    }

    /// Returns `true` when the error means "this type cannot be built here",
    /// which the argument resolver treats as a skippable parameter.
    pub fn is_unconstructable(&self) -> bool {
        matches!(self, TarkibError::UnconstructableType { .. })
    }
}

/// Convenient Result type for Tarkib operations.
pub type Result<T> = std::result::Result<T, TarkibError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_error_display() {
        let err = TarkibError::UnknownType(UnknownTypeError {
            requested: TypeName::new("Loger"),
            suggestions: vec!["Logger".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Unknown type: Loger"));
        assert!(msg.contains("- Logger"));
    }

    #[test]
    fn cyclic_dependency_error_display() {
        let err = TarkibError::CyclicDependency(CyclicDependencyError {
            chain: vec![TypeName::new("A"), TypeName::new("B"), TypeName::new("A")],
            depth_limit: None,
        });

        let msg = format!("{err}");
        assert!(msg.contains("Cyclic"));
        assert!(msg.contains("A → B → A"));
    }

    #[test]
    fn depth_limit_display() {
        let err = CyclicDependencyError {
            chain: vec![TypeName::new("A")],
            depth_limit: Some(1),
        };
        assert!(format!("{err}").contains("depth limit (1)"));
    }

    #[test]
    fn unconstructable_display_and_predicate() {
        let err = TarkibError::UnconstructableType {
            name: TypeName::new("\\Cache"),
            kind: TypeKind::Interface,
        };
        assert!(err.is_unconstructable());
        assert!(format!("{err}").contains("Cannot instantiate interface Cache"));
    }
}
