//! Core container implementation for Tarkib DI.

pub mod container;
pub mod descriptor;
pub mod error;
mod graph;
pub mod key;
pub mod param;
pub mod provider;
mod recipe;
mod registry;
mod resolver;
pub mod rule;
pub mod settings;
pub mod value;

pub use container::{Container, ContainerBuilder, prelude};
pub use descriptor::{Method, Param, ParamType, ScalarType, TypeDescriptor, TypeKind, TypeRegistration, TypeTable};
pub use error::{Result, TarkibError};
pub use key::TypeName;
pub use param::ParamSpec;
pub use rule::{CallSpec, Rule};
pub use settings::ContainerSettings;
pub use value::{Instance, Value};

// Lets `inventory::submit!` be written against this crate alone.
#[doc(hidden)]
pub use inventory;
