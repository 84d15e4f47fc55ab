//! Registry mapping stage kinds to constructors.

use super::{
    AlphaKey, Compositor, DisplaySink, DisplayTarget, FormatConverter, PatternSource, Stage,
    ALPHA_KEY, COMPOSITOR, DISPLAY_SINK, FORMAT_CONVERTER, PATTERN_SOURCE,
};
use crate::errors::ConstructionError;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Factory function type for creating stages. Receives the stage name.
pub type StageFactory =
    Box<dyn Fn(&str) -> Result<Box<dyn Stage>, ConstructionError> + Send + Sync>;

/// Registry of stage factories, keyed by kind identifier.
#[derive(Default)]
pub struct StageRegistry {
    factories: RwLock<HashMap<String, StageFactory>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the five built-in kinds.
    #[must_use]
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(PATTERN_SOURCE, Box::new(|name| Ok(Box::new(PatternSource::new(name)))));
        registry.register(ALPHA_KEY, Box::new(|name| Ok(Box::new(AlphaKey::new(name)))));
        registry.register(COMPOSITOR, Box::new(|name| Ok(Box::new(Compositor::new(name)))));
        registry.register(
            FORMAT_CONVERTER,
            Box::new(|name| Ok(Box::new(FormatConverter::new(name)))),
        );
        registry.register(DISPLAY_SINK, DisplaySink::factory(DisplayTarget::Auto));
        registry
    }

    /// Registers a factory, replacing any previous one for `kind`.
    pub fn register(&self, kind: impl Into<String>, factory: StageFactory) {
        let kind = kind.into();
        debug!(kind = %kind, "registering stage kind");
        self.factories.write().insert(kind, factory);
    }

    /// Returns true if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.read().contains_key(kind)
    }

    /// Lists registered kinds in sorted order.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Creates a stage of `kind` named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnknownKind`] if no factory is
    /// registered, or whatever the factory reports.
    pub fn create(&self, kind: &str, name: &str) -> Result<Box<dyn Stage>, ConstructionError> {
        let factories = self.factories.read();
        let factory = factories.get(kind).ok_or_else(|| ConstructionError::UnknownKind {
            kind: kind.to_string(),
        })?;
        factory(name)
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
