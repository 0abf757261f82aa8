//! Construction path tracking.
//!
//! Rules can only be evaluated while objects are being built, so cycles are
//! detected at `create` time: every non-cached `create` pushes its type onto
//! the current path and pops it when done. Meeting a type that is already
//! on the path means the non-shared types form a cycle.
//!
//! Shared types never reach this check on re-entry: they are registered in
//! the instance cache before their constructor runs, so a cycle through a
//! shared type is answered from the cache.

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{CyclicDependencyError, Result, TarkibError};
use crate::key::TypeName;

/// The chain of types currently under construction.
///
/// One path per container. Concurrent `create` calls from several threads
/// would interleave on it; the container does not support that.
#[derive(Debug, Default)]
pub(crate) struct ConstructionPath {
    path: Mutex<Vec<TypeName>>,
}

impl ConstructionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `name`, failing if it is already on the path or the path is
    /// already `max_depth` long.
    pub fn enter(&self, name: &TypeName, max_depth: usize) -> Result<PathGuard<'_>> {
        let mut path = self.path.lock();

        if let Some(start) = path.iter().position(|entry| entry == name) {
            let mut chain: Vec<TypeName> = path[start..].to_vec();
            chain.push(name.clone());

            warn!(cycle = ?chain, "Cyclic dependency detected");

            return Err(TarkibError::CyclicDependency(CyclicDependencyError {
                chain,
                depth_limit: None,
            }));
        }

        if path.len() >= max_depth {
            let mut chain = path.clone();
            chain.push(name.clone());

            warn!(depth = max_depth, "Construction depth limit exceeded");

            return Err(TarkibError::CyclicDependency(CyclicDependencyError {
                chain,
                depth_limit: Some(max_depth),
            }));
        }

        path.push(name.clone());
        Ok(PathGuard { owner: self })
    }

    /// Current depth.
    pub fn depth(&self) -> usize {
        self.path.lock().len()
    }
}

/// Pops its entry from the path when dropped, on success or error.
pub(crate) struct PathGuard<'a> {
    owner: &'a ConstructionPath,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.owner.path.lock().pop();
    }
}
