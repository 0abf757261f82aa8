//! # Tarkib: rule-driven dependency injection for Rust
//!
//! Objects are described in a type table (constructors, methods, declared
//! parameter types) and assembled by a [`Container`] from rules: aliasing,
//! shared instances, substitutions and post-construction calls.
//!
//! ```rust
//! use tarkib::prelude::*;
//!
//! let container = Container::builder()
//!     .register_type(TypeDescriptor::interface("Clock"))
//!     .register_type(TypeDescriptor::class("SystemClock").implements("Clock"))
//!     .rule("Clock", Rule::new().instance_of("SystemClock").shared(true))
//!     .build()
//!     .expect("valid rules");
//!
//! let clock = container.create("Clock").unwrap();
//! assert_eq!(clock.class().as_str(), "SystemClock");
//! ```

pub mod logging;

pub use tarkib_container::*;
pub use tarkib_support::*;
