use crate::collection::{CollectionEventInfo, CollectionEvents, Document, RecordId};
use crate::common::CollectionEventBus;
use crate::engine_config::EngineConfig;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::index::{IndexEntry, IndexLookup, IndexMap, IndexType};
use crate::store::DocumentMap;
use crate::Value;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Freshness of one field's index.
///
/// ```text
///            rebuild              success
///   Clean ------------> Rebuilding --------> Clean
///   Dirty ------------> Rebuilding --------> Dirty   (failure)
/// ```
///
/// Transitions happen under the entry lock of the state map, so at most one
/// rebuild per field can be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexState {
    Clean,
    /// The index diverged from the documents and must be rebuilt.
    Dirty,
    Rebuilding,
}

/// Index states of one collection, keyed by field. Every handle opened on
/// the collection shares the same map.
pub(crate) type IndexStates = Arc<DashMap<String, IndexState>>;

/// Index lifecycle of one collection: creation, rebuilds, drops and the
/// per-document maintenance run by the write pipeline.
#[derive(Clone)]
pub(crate) struct IndexOperations {
    inner: Arc<IndexOperationsInner>,
}

impl IndexOperations {
    pub fn new(
        collection_name: &str,
        config: EngineConfig,
        document_map: DocumentMap,
        event_bus: CollectionEventBus,
    ) -> Self {
        let index_states = config.index_states(collection_name);
        IndexOperations {
            inner: Arc::new(IndexOperationsInner {
                collection_name: collection_name.to_string(),
                config,
                document_map,
                event_bus,
                index_states,
            }),
        }
    }

    /// Creates the index entry of `field` and builds it.
    ///
    /// With `is_async` the build runs on the worker pool and this returns as
    /// soon as it is queued.
    pub fn create_index(&self, field: &str, index_type: IndexType, is_async: bool) -> EmberResult<()> {
        let catalog = self.inner.config.index_catalog();
        if catalog.has_index_entry(&self.inner.collection_name, field)? {
            log::error!("Index already exists on {} in {}", field, self.inner.collection_name);
            return Err(EmberError::new(
                &format!("Index already exists on {} in {}", field, self.inner.collection_name),
                ErrorKind::IndexingError,
            ));
        }

        // fail before touching the catalog if the type cannot be served
        self.inner.config.find_indexer(index_type)?;
        let entry = catalog.create_index_entry(&self.inner.collection_name, field, index_type)?;
        self.inner.index_states.insert(field.to_string(), IndexState::Dirty);
        self.rebuild_index(&entry, is_async)
    }

    /// Rebuilds the index of `entry` from the documents of the collection.
    ///
    /// Fails with an indexing error if a rebuild of the same field is already
    /// running.
    pub fn rebuild_index(&self, entry: &IndexEntry, is_async: bool) -> EmberResult<()> {
        let guard = self.acquire_rebuild(entry.field())?;

        if is_async {
            let operations = self.clone();
            let entry = entry.clone();
            self.inner.config.worker_pool().submit(move || {
                if let Err(e) = operations.run_rebuild(&entry, guard) {
                    log::error!("Background rebuild of {} failed: {}", entry, e);
                }
            })
        } else {
            self.run_rebuild(entry, guard)
        }
    }

    pub fn drop_index(&self, field: &str) -> EmberResult<()> {
        match self.inner.index_states.entry(field.to_string()) {
            Entry::Occupied(state) if *state.get() == IndexState::Rebuilding => {
                log::error!("Cannot drop index on {} while it is rebuilding", field);
                Err(EmberError::new(
                    &format!("Cannot drop index on {} while it is rebuilding", field),
                    ErrorKind::IndexingError,
                ))
            }
            state => {
                let entry = match self.find_index_entry(field)? {
                    Some(entry) => entry,
                    None => {
                        log::error!("{} is not indexed in {}", field, self.inner.collection_name);
                        return Err(EmberError::new(
                            &format!("{} is not indexed in {}", field, self.inner.collection_name),
                            ErrorKind::IndexingError,
                        ));
                    }
                };

                self.inner.drop_structures(&entry)?;
                if let Entry::Occupied(state) = state {
                    state.remove();
                }
                Ok(())
            }
        }
    }

    pub fn drop_all_indices(&self) -> EmberResult<()> {
        let rebuilding = self
            .inner
            .index_states
            .iter()
            .any(|state| *state.value() == IndexState::Rebuilding);
        if rebuilding {
            log::error!("Cannot drop the indices of {} while one is rebuilding", self.inner.collection_name);
            return Err(EmberError::new(
                &format!("Cannot drop the indices of {} while one is rebuilding", self.inner.collection_name),
                ErrorKind::IndexingError,
            ));
        }

        for entry in self.list_indexes()? {
            self.drop_index(entry.field())?;
        }
        Ok(())
    }

    pub fn find_index_entry(&self, field: &str) -> EmberResult<Option<IndexEntry>> {
        self.inner
            .config
            .index_catalog()
            .find_index_entry(&self.inner.collection_name, field)
    }

    pub fn has_index_entry(&self, field: &str) -> EmberResult<bool> {
        self.inner
            .config
            .index_catalog()
            .has_index_entry(&self.inner.collection_name, field)
    }

    pub fn list_indexes(&self) -> EmberResult<Vec<IndexEntry>> {
        self.inner
            .config
            .index_catalog()
            .list_index_entries(&self.inner.collection_name)
    }

    pub fn is_indexing(&self, field: &str) -> bool {
        self.state_of(field) == Some(IndexState::Rebuilding)
    }

    /// Whether the index of `field` can be trusted to answer queries.
    pub fn is_index_usable(&self, field: &str) -> EmberResult<bool> {
        match self.state_of(field) {
            Some(IndexState::Clean) | None => Ok(!self.inner.is_catalog_dirty(field)?),
            Some(_) => Ok(false),
        }
    }

    /// Asks the index of `entry` for the ids matching `lookup`, or `None` if
    /// its indexer cannot answer that kind of question.
    pub fn find_by_lookup(&self, entry: &IndexEntry, lookup: &IndexLookup) -> EmberResult<Option<BTreeSet<RecordId>>> {
        let indexer = self.inner.config.find_indexer(entry.index_type())?;
        if !indexer.supports(lookup) {
            return Ok(None);
        }
        let ids = indexer.find_by_filter(&self.inner.index_map(entry), entry.field(), lookup)?;
        Ok(Some(ids))
    }

    /// Adds the contribution of a freshly stored document to every index.
    pub fn write_index(&self, document: &Document, id: RecordId) -> EmberResult<()> {
        for entry in self.list_indexes()? {
            let field = entry.field();
            let value = document.get(field)?;
            if value.is_null() || self.schedule_rebuild_if_dirty(&entry)? {
                continue;
            }

            let indexer = self.inner.config.find_indexer(entry.index_type())?;
            indexer.write_index(&self.inner.index_map(&entry), id, field, &value)?;
        }
        Ok(())
    }

    /// Removes the contribution of a removed document from every index.
    pub fn remove_index(&self, document: &Document, id: RecordId) -> EmberResult<()> {
        for entry in self.list_indexes()? {
            let field = entry.field();
            let value = document.get(field)?;
            if value.is_null() || self.schedule_rebuild_if_dirty(&entry)? {
                continue;
            }

            let indexer = self.inner.config.find_indexer(entry.index_type())?;
            indexer.remove_index(&self.inner.index_map(&entry), id, field, &value)?;
        }
        Ok(())
    }

    /// Moves every index from the values of `old_document` to the values of
    /// `new_document`. Fields whose value did not change are left alone.
    pub fn update_index(&self, old_document: &Document, new_document: &Document, id: RecordId) -> EmberResult<()> {
        for entry in self.list_indexes()? {
            let field = entry.field();
            let new_value = new_document.get(field)?;
            let old_value = old_document.get(field)?;
            if new_value == old_value || self.schedule_rebuild_if_dirty(&entry)? {
                continue;
            }

            let indexer = self.inner.config.find_indexer(entry.index_type())?;
            let index_map = self.inner.index_map(&entry);
            if new_value.is_null() {
                indexer.remove_index(&index_map, id, field, &old_value)?;
            } else {
                indexer.update_index(&index_map, id, field, &new_value, &old_value)?;
            }
        }
        Ok(())
    }

    fn state_of(&self, field: &str) -> Option<IndexState> {
        self.inner.index_states.get(field).map(|state| *state.value())
    }

    /// An index that diverged and is not being rebuilt gets a background
    /// rebuild instead of incremental maintenance. Returns whether that
    /// happened.
    fn schedule_rebuild_if_dirty(&self, entry: &IndexEntry) -> EmberResult<bool> {
        let dirty = match self.state_of(entry.field()) {
            Some(IndexState::Rebuilding) => false,
            Some(IndexState::Dirty) => true,
            Some(IndexState::Clean) | None => self.inner.is_catalog_dirty(entry.field())?,
        };
        if !dirty {
            return Ok(false);
        }

        log::warn!("Index {} is dirty, scheduling a rebuild", entry);
        if let Err(e) = self.rebuild_index(entry, true) {
            log::warn!("Could not schedule rebuild of {}: {}", entry, e);
        }
        Ok(true)
    }

    fn acquire_rebuild(&self, field: &str) -> EmberResult<RebuildGuard> {
        match self.inner.index_states.entry(field.to_string()) {
            Entry::Occupied(mut state) => {
                if *state.get() == IndexState::Rebuilding {
                    log::error!("Index on {} is already rebuilding", field);
                    return Err(EmberError::new(
                        &format!("Index on {} is already rebuilding", field),
                        ErrorKind::IndexingError,
                    ));
                }
                state.insert(IndexState::Rebuilding);
            }
            Entry::Vacant(state) => {
                state.insert(IndexState::Rebuilding);
            }
        }

        Ok(RebuildGuard {
            inner: self.inner.clone(),
            field: field.to_string(),
            succeeded: false,
        })
    }

    fn run_rebuild(&self, entry: &IndexEntry, mut guard: RebuildGuard) -> EmberResult<()> {
        let field = entry.field();
        let collection = &self.inner.collection_name;
        log::debug!("Rebuilding index {}", entry);
        self.inner.alert(CollectionEvents::IndexStart, field);

        let catalog = self.inner.config.index_catalog();
        catalog.begin_indexing(collection, field)?;

        let indexer = self.inner.config.find_indexer(entry.index_type())?;
        let index_map = self.inner.index_map(entry);
        // stale contributions of a diverged index go away with the clear
        indexer.drop_index(&index_map, field)?;

        for item in self.inner.document_map.entries() {
            let (id, document) = item?;
            let value = document.get(field)?;
            if value.is_null() {
                continue;
            }
            indexer.write_index(&index_map, id, field, &value)?;
        }

        catalog.end_indexing(collection, field)?;
        guard.succeeded = true;
        log::debug!("Rebuilt index {} with {} keys", entry, index_map.len());
        Ok(())
    }
}

struct IndexOperationsInner {
    collection_name: String,
    config: EngineConfig,
    document_map: DocumentMap,
    event_bus: CollectionEventBus,
    index_states: IndexStates,
}

impl IndexOperationsInner {
    fn index_map(&self, entry: &IndexEntry) -> IndexMap {
        self.config.index_store().open_index_map(&entry.index_map_name())
    }

    fn is_catalog_dirty(&self, field: &str) -> EmberResult<bool> {
        self.config
            .index_catalog()
            .is_dirty_index(&self.collection_name, field)
    }

    fn drop_structures(&self, entry: &IndexEntry) -> EmberResult<()> {
        let indexer = self.config.find_indexer(entry.index_type())?;
        indexer.drop_index(&self.index_map(entry), entry.field())?;
        self.config.index_store().remove_index_map(&entry.index_map_name());
        self.config
            .index_catalog()
            .drop_index_entry(&self.collection_name, entry.field())
    }

    fn alert(&self, event_type: CollectionEvents, field: &str) {
        let event = CollectionEventInfo::new(Some(Value::from(field)), event_type, &self.collection_name);
        if let Err(e) = self.event_bus.publish(event) {
            log::error!("Failed to publish {:?} for {}: {}", event_type, field, e);
        }
    }
}

/// Releases the single-flight slot of a field when a rebuild ends, however
/// it ends, and reports the end of indexing.
struct RebuildGuard {
    inner: Arc<IndexOperationsInner>,
    field: String,
    succeeded: bool,
}

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        let next = if self.succeeded {
            IndexState::Clean
        } else {
            IndexState::Dirty
        };
        if let Some(mut state) = self.inner.index_states.get_mut(&self.field) {
            *state = next;
        }
        self.inner.alert(CollectionEvents::IndexEnd, &self.field);
    }
}
