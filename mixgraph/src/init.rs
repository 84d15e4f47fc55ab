//! Process-wide library initialization.

use crate::errors::ConstructionError;
use crate::stages::{Stage, StageRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Returns true while at least one [`Library`] guard is alive.
#[must_use]
pub fn is_initialized() -> bool {
    INIT_COUNT.load(Ordering::SeqCst) > 0
}

/// Guard proving the library is initialized.
///
/// Stage construction and graph creation take a `&Library`. Clones share
/// the stage registry; the library stays initialized until the last guard
/// is dropped.
#[derive(Debug)]
pub struct Library {
    registry: Arc<StageRegistry>,
}

impl Library {
    /// Initializes the library with the built-in stage kinds.
    #[must_use]
    pub fn init() -> Self {
        Self::with_registry(StageRegistry::with_builtin())
    }

    /// Initializes the library with a custom registry.
    #[must_use]
    pub fn with_registry(registry: StageRegistry) -> Self {
        let previous = INIT_COUNT.fetch_add(1, Ordering::SeqCst);
        debug!(guards = previous + 1, "library initialized");
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Creates a stage through the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is unknown or the stage cannot acquire
    /// a resource it needs.
    pub fn create_stage(&self, kind: &str, name: &str) -> Result<Box<dyn Stage>, ConstructionError> {
        self.registry.create(kind, name)
    }
}

impl Clone for Library {
    fn clone(&self) -> Self {
        INIT_COUNT.fetch_add(1, Ordering::SeqCst);
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        let previous = INIT_COUNT.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            debug!("library deinitialized");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_keeps_library_initialized() {
        let lib = Library::init();
        assert!(is_initialized());
        let clone = lib.clone();
        drop(lib);
        assert!(is_initialized());
        let stage = clone.create_stage("format-converter", "convert").unwrap();
        assert_eq!(stage.name(), "convert");
    }

    #[test]
    fn test_custom_registry() {
        let lib = Library::with_registry(StageRegistry::new());
        assert!(matches!(
            lib.create_stage("compositor", "mixer"),
            Err(ConstructionError::UnknownKind { .. })
        ));
    }
}
