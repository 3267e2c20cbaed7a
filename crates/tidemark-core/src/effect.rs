//! Effect identity and the catalog seam.
//!
//! The real effect definitions live in plugin files owned by the loader,
//! which is a separate component. The engine only needs a stable identity
//! per effect — [`EffectRef`] — and a way to check, at project load time,
//! that every persisted reference still resolves to an installed effect.

use std::collections::HashMap;
use std::fmt;

/// Stable identity of an effect: the plugin that ships it and the effect's
/// name within that plugin. This pair is what gets persisted, so it must
/// survive process restarts and plugin reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectRef {
    pub plugin: String,
    pub name: String,
}

impl EffectRef {
    pub fn new(plugin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EffectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.plugin, self.name)
    }
}

/// Immutable descriptor supplied by the loader. The engine treats it as
/// opaque; only identity matters here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectDescriptor {
    pub reference: EffectRef,
    /// Human-facing one-liner from the plugin definition.
    pub summary: String,
}

/// Reason an effect reference cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("effect not recognized: {0} is not installed")]
    UnknownEffect(EffectRef),
}

/// The catalog of installed effects, as seen by the engine.
///
/// Resolution is only needed when reloading a persisted project: a save file
/// may reference an effect whose plugin has since been removed, and that must
/// surface as [`CatalogError::UnknownEffect`] rather than a half-loaded
/// timeline.
pub trait EffectCatalog {
    /// Resolve a persisted reference to its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownEffect`] if no installed effect matches.
    fn resolve(&self, effect: &EffectRef) -> Result<&EffectDescriptor, CatalogError>;
}

/// In-memory catalog backed by a map. Stands in for the plugin loader in
/// tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    effects: HashMap<EffectRef, EffectDescriptor>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: EffectDescriptor) {
        self.effects.insert(descriptor.reference.clone(), descriptor);
    }
}

impl EffectCatalog for MemoryCatalog {
    fn resolve(&self, effect: &EffectRef) -> Result<&EffectDescriptor, CatalogError> {
        self.effects
            .get(effect)
            .ok_or_else(|| CatalogError::UnknownEffect(effect.clone()))
    }
}
