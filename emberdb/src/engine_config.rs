//! Engine wide configuration shared by every collection opened through it.

use crate::collection::operation::IndexStates;
use crate::collection::CollectionFactory;
use crate::common::{atomic, Atomic, LockRegistry, ReadExecutor, WorkerPool, WriteExecutor, WORKER_QUEUE_CAPACITY};
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::index::{
    ComparableIndexer, InMemoryIndexCatalog, IndexCatalog, IndexStore, IndexType, Indexer, TextIndexer,
};
use crate::store::InMemoryStore;
use crate::{get_cpu_count, FIELD_SEPARATOR};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// The collaborators of the collection engine.
///
/// A configuration holds the indexer registry, the index catalog, the index
/// storage, the document store, the worker pool used for asynchronous index
/// rebuilds and the per-collection locks. Cloning is cheap and every clone
/// shares the same state.
///
/// Settings can only be changed until the first collection is opened.
///
/// ```rust,ignore
/// let config = EngineConfig::new();
/// config.set_worker_threads(2)?;
/// let users = DocumentCollection::open("users", config.clone())?;
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    inner: Arc<EngineConfigInner>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// A configuration with the built-in unique, non-unique and full-text
    /// indexers and in-memory storage.
    pub fn new() -> Self {
        let inner = EngineConfigInner::new();
        inner.indexers.insert(IndexType::Unique, Indexer::new(ComparableIndexer::unique()));
        inner.indexers.insert(IndexType::NonUnique, Indexer::new(ComparableIndexer::non_unique()));
        inner.indexers.insert(IndexType::Fulltext, Indexer::new(TextIndexer::default()));
        EngineConfig { inner: Arc::new(inner) }
    }

    pub fn field_separator(&self) -> String {
        FIELD_SEPARATOR.read_with(|it| it.clone())
    }

    /// Sets the separator of embedded field names.
    pub fn set_field_separator(&self, separator: &str) -> EmberResult<()> {
        self.inner.ensure_not_configured("Field separator")?;
        if separator.is_empty() {
            log::error!("Field separator cannot be empty");
            return Err(EmberError::new(
                "Field separator cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }

        FIELD_SEPARATOR.write_with(|it| *it = separator.to_string());
        Ok(())
    }

    /// Registers `indexer` for its index type, replacing the previous one.
    pub fn register_indexer(&self, indexer: Indexer) -> EmberResult<()> {
        self.inner.ensure_not_configured("Indexer registry")?;
        self.inner.indexers.insert(indexer.index_type(), indexer);
        Ok(())
    }

    pub fn find_indexer(&self, index_type: IndexType) -> EmberResult<Indexer> {
        match self.inner.indexers.get(&index_type) {
            Some(indexer) => Ok(indexer.value().clone()),
            None => {
                log::error!("No indexer registered for index type {}", index_type);
                Err(EmberError::new(
                    &format!("No indexer registered for index type {}", index_type),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }

    pub fn has_indexer(&self, index_type: IndexType) -> bool {
        self.inner.indexers.contains_key(&index_type)
    }

    #[cfg(test)]
    pub(crate) fn unregister_indexer(&self, index_type: IndexType) {
        self.inner.indexers.remove(&index_type);
    }

    /// Replaces the in-memory index catalog.
    pub fn set_index_catalog(&self, catalog: IndexCatalog) -> EmberResult<()> {
        self.inner.ensure_not_configured("Index catalog")?;
        self.inner.catalog.write_with(|it| *it = catalog);
        Ok(())
    }

    pub fn index_catalog(&self) -> IndexCatalog {
        self.inner.catalog.read_with(|it| it.clone())
    }

    pub fn index_store(&self) -> IndexStore {
        self.inner.index_store.clone()
    }

    pub fn store(&self) -> InMemoryStore {
        self.inner.store.clone()
    }

    pub fn lock_registry(&self) -> LockRegistry {
        self.inner.lock_registry.clone()
    }

    /// The index states of `collection`, outliving any single handle so an
    /// in-flight rebuild stays visible after the collection is reopened.
    pub(crate) fn index_states(&self, collection: &str) -> IndexStates {
        self.inner
            .index_states
            .entry(collection.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub(crate) fn collection_factory(&self) -> CollectionFactory {
        self.inner.collection_factory.clone()
    }

    /// Number of rebuild workers; defaults to the available parallelism.
    pub fn set_worker_threads(&self, threads: usize) -> EmberResult<()> {
        self.inner.ensure_not_configured("Worker pool size")?;
        if threads == 0 {
            log::error!("Worker pool needs at least one thread");
            return Err(EmberError::new(
                "Worker pool needs at least one thread",
                ErrorKind::InvalidOperation,
            ));
        }
        self.inner.worker_threads.store(threads, Ordering::Relaxed);
        Ok(())
    }

    /// The shared rebuild pool, started on first use.
    pub fn worker_pool(&self) -> WorkerPool {
        self.inner
            .worker_pool
            .get_or_init(|| {
                let threads = self.inner.worker_threads.load(Ordering::Relaxed);
                log::debug!("Starting index worker pool with {} threads", threads);
                WorkerPool::new("ember-indexer", threads, WORKER_QUEUE_CAPACITY)
            })
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Freezes the settings. Called when a collection is opened.
    pub(crate) fn mark_configured(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }

    /// Closes every open collection and stops the worker pool once queued
    /// rebuilds have finished.
    pub fn close(&self) {
        if let Err(e) = self.inner.collection_factory.clear() {
            log::warn!("Failed to close collections: {}", e);
        }
        if let Some(pool) = self.inner.worker_pool.get() {
            pool.shutdown();
        }
    }
}

struct EngineConfigInner {
    configured: AtomicBool,
    indexers: DashMap<IndexType, Indexer>,
    catalog: Atomic<IndexCatalog>,
    index_store: IndexStore,
    store: InMemoryStore,
    lock_registry: LockRegistry,
    index_states: DashMap<String, IndexStates>,
    collection_factory: CollectionFactory,
    worker_threads: AtomicUsize,
    worker_pool: OnceLock<WorkerPool>,
}

impl EngineConfigInner {
    fn new() -> Self {
        EngineConfigInner {
            configured: AtomicBool::from(false),
            indexers: DashMap::new(),
            catalog: atomic(IndexCatalog::new(InMemoryIndexCatalog::new())),
            index_store: IndexStore::new(),
            store: InMemoryStore::new(),
            lock_registry: LockRegistry::new(),
            index_states: DashMap::new(),
            collection_factory: CollectionFactory::new(),
            worker_threads: AtomicUsize::new(get_cpu_count()),
            worker_pool: OnceLock::new(),
        }
    }

    fn ensure_not_configured(&self, setting: &str) -> EmberResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after a collection was opened", setting);
            return Err(EmberError::new(
                &format!("{} cannot be changed after a collection was opened", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
