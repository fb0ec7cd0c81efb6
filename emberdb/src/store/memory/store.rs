use super::InMemoryMap;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::store::DocumentMap;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Keeps the document maps of every collection opened through one engine.
///
/// Opening the same name twice yields the same map, so every handle on a
/// collection sees the same documents.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

#[derive(Default)]
struct InMemoryStoreInner {
    maps: DashMap<String, DocumentMap>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner::default()),
        }
    }

    pub fn open_map(&self, name: &str) -> EmberResult<DocumentMap> {
        if name.is_empty() {
            log::error!("Map name cannot be empty");
            return Err(EmberError::new(
                "Map name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }

        let map = self
            .inner
            .maps
            .entry(name.to_string())
            .or_insert_with(|| DocumentMap::new(InMemoryMap::new(name)))
            .clone();

        // a dropped map is replaced by a fresh one on the next open
        if map.is_dropped() {
            let fresh = DocumentMap::new(InMemoryMap::new(name));
            self.inner.maps.insert(name.to_string(), fresh.clone());
            return Ok(fresh);
        }
        Ok(map)
    }

    pub fn has_map(&self, name: &str) -> bool {
        self.inner
            .maps
            .get(name)
            .map(|map| !map.is_dropped())
            .unwrap_or(false)
    }

    pub fn remove_map(&self, name: &str) -> EmberResult<()> {
        if let Some((_, map)) = self.inner.maps.remove(name) {
            if !map.is_dropped() {
                map.drop_map()?;
            }
        }
        Ok(())
    }

    pub fn map_names(&self) -> HashSet<String> {
        self.inner
            .maps
            .iter()
            .filter(|entry| !entry.value().is_dropped())
            .map(|entry| entry.key().clone())
            .collect()
    }
}
