//! Container settings.
//!
//! Settings deserialise from any serde source, so they can live in the
//! application's own configuration file:
//!
//! ```toml
//! [container]
//! strict_arguments = true
//! max_depth = 64
//! ```

use serde::Deserialize;

/// Default limit on nested `create` calls.
///
/// Each level costs several stack frames; this stays clear of a 2 MiB
/// thread stack.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Tunables for a [`Container`](crate::container::Container).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Report a typed parameter that could not be built as
    /// [`TarkibError::ArgumentResolution`](crate::error::TarkibError::ArgumentResolution)
    /// instead of leaving it out of the argument list.
    pub strict_arguments: bool,
    /// Maximum number of nested `create` calls.
    pub max_depth: usize,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            strict_arguments: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
