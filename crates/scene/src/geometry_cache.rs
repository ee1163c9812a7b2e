//! Named, shared geometry.

use std::collections::HashMap;
use std::sync::Arc;

/// Owns the canonical handle for each named piece of geometry.
///
/// Entities hold clones of the `Arc`; removing an entry from the cache does
/// not free geometry that entities still reference.
#[derive(Debug)]
pub struct GeometryCache<G> {
    entries: HashMap<String, Arc<G>>,
}

impl<G> Default for GeometryCache<G> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<G> GeometryCache<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `geometry` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, geometry: G) -> Arc<G> {
        let name = name.into();
        let handle = Arc::new(geometry);
        if self.entries.insert(name.clone(), handle.clone()).is_some() {
            tracing::debug!("Replaced cached geometry '{}'", name);
        }
        handle
    }

    pub fn get(&self, name: &str) -> Option<Arc<G>> {
        self.entries.get(name).cloned()
    }

    /// Returns the cached handle, building and caching it on first use.
    pub fn get_or_insert_with<E>(
        &mut self,
        name: &str,
        build: impl FnOnce() -> Result<G, E>,
    ) -> Result<Arc<G>, E> {
        if let Some(handle) = self.entries.get(name) {
            return Ok(handle.clone());
        }
        let handle = Arc::new(build()?);
        self.entries.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<G>> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached handle.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
