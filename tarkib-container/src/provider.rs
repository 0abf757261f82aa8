//! Provider trait: a module of related type descriptors and rules.
//!
//! Providers group related registrations together, similar to
//! Laravel's ServiceProvider or DIshka's Provider class.
//!
//! # Examples
//! ```rust
//! use tarkib_container::prelude::*;
//!
//! struct CacheProvider;
//!
//! impl Provider for CacheProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) {
//!         registry.register_type(TypeDescriptor::interface("Cache"));
//!         registry.register_type(TypeDescriptor::class("ArrayCache").implements("Cache"));
//!         registry.register_rule("Cache", Rule::new().instance_of("ArrayCache").shared(true));
//!     }
//! }
//!
//! let container = Container::builder()
//!     .add_provider(&CacheProvider)
//!     .build()
//!     .expect("valid rules");
//!
//! let a = container.create("Cache").unwrap();
//! let b = container.create("Cache").unwrap();
//! assert!(a.ptr_eq(&b));
//! ```

use crate::descriptor::TypeDescriptor;
use crate::rule::Rule;

/// A module that registers related types and rules into a container.
///
/// Split registrations by domain instead of one giant block:
///
/// ```rust,ignore
/// Container::builder()
///     .add_provider(&DatabaseProvider)
///     .add_provider(&CacheProvider)
///     .build()?;
/// ```
pub trait Provider: Send + Sync {
    /// Register types and rules. Called once while building the container.
    fn register(&self, registry: &mut dyn ProviderRegistry);

    /// Optional: human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Interface that providers use to register types and rules.
///
/// This is a subset of ContainerBuilder's API, exposed to Provider
/// implementations so they can be tested against a recording registry.
pub trait ProviderRegistry {
    /// Add a type descriptor.
    fn register_type(&mut self, descriptor: TypeDescriptor);

    /// Add a rule. Rules are merged in registration order when the
    /// container is built.
    fn register_rule(&mut self, name: &str, rule: Rule);
}
