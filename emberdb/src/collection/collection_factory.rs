use super::DocumentCollection;
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::engine_config::EngineConfig;
use crate::errors::EmberResult;
use std::collections::HashMap;
use std::sync::Arc;

/// Hands out one live [DocumentCollection] per name, so every handle on a
/// collection shares its index states, lock and listeners.
#[derive(Clone, Default)]
pub(crate) struct CollectionFactory {
    inner: Arc<CollectionFactoryInner>,
}

struct CollectionFactoryInner {
    collections: Atomic<HashMap<String, DocumentCollection>>,
}

impl Default for CollectionFactoryInner {
    fn default() -> Self {
        CollectionFactoryInner {
            collections: atomic(HashMap::new()),
        }
    }
}

impl CollectionFactory {
    pub fn new() -> Self {
        CollectionFactory::default()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.collections.read_with(|it| it.contains_key(name))
    }

    /// The cached collection, or a fresh one if it was never opened or has
    /// been closed or dropped since.
    pub fn get_collection(&self, name: &str, config: EngineConfig) -> EmberResult<DocumentCollection> {
        self.inner.collections.write_with(|collections| {
            if let Some(collection) = collections.get(name) {
                if collection.is_open() {
                    return Ok(collection.clone());
                }
                log::debug!("Reopening collection {}", name);
            }

            let collection = DocumentCollection::create(name, config)?;
            collections.insert(name.to_string(), collection.clone());
            Ok(collection)
        })
    }

    /// Closes every open collection and forgets them all.
    pub fn clear(&self) -> EmberResult<()> {
        let collections: Vec<DocumentCollection> = self
            .inner
            .collections
            .write_with(|it| it.drain().map(|(_, collection)| collection).collect());
        for collection in collections {
            if collection.is_open() {
                collection.close()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_gives_same_collection() {
        let config = EngineConfig::new();
        let factory = CollectionFactory::new();
        let first = factory.get_collection("users", config.clone()).unwrap();
        let second = factory.get_collection("users", config).unwrap();
        assert!(first.same_as(&second));
        assert!(factory.has_collection("users"));
    }

    #[test]
    fn test_closed_collection_is_replaced() {
        let config = EngineConfig::new();
        let factory = CollectionFactory::new();
        let first = factory.get_collection("users", config.clone()).unwrap();
        first.close().unwrap();

        let second = factory.get_collection("users", config).unwrap();
        assert!(!first.same_as(&second));
        assert!(second.is_open());
    }

    #[test]
    fn test_clear_closes_collections() {
        let config = EngineConfig::new();
        let factory = CollectionFactory::new();
        let collection = factory.get_collection("users", config).unwrap();
        factory.clear().unwrap();
        assert!(!collection.is_open());
        assert!(!factory.has_collection("users"));
    }
}
