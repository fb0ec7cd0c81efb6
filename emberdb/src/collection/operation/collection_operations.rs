use super::index_operations::IndexOperations;
use super::read_operations::ReadOperations;
use super::write_operations::WriteOperations;
use crate::collection::{CollectionEventListener, Document, FindOptions, RecordId, UpdateOptions, WriteResult};
use crate::common::{Attributes, CollectionEventBus, DocumentCursor, LockHandle, SubscriberRef};
use crate::engine_config::EngineConfig;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::filter::Filter;
use crate::index::{IndexEntry, IndexOptions};
use crate::store::DocumentMap;

/// Serializes the operations on one collection.
///
/// Reads share the collection lock, writes and index management hold it
/// exclusively. The lock covers preparing a query, not consuming the
/// returned cursor. Asynchronous rebuilds run outside of it.
pub(crate) struct CollectionOperations {
    collection_name: String,
    config: EngineConfig,
    lock_handle: LockHandle,
    document_map: DocumentMap,
    event_bus: CollectionEventBus,
    index_operations: IndexOperations,
    read_operations: ReadOperations,
    write_operations: WriteOperations,
}

impl CollectionOperations {
    pub fn new(collection_name: &str, config: EngineConfig) -> EmberResult<Self> {
        let document_map = config.store().open_map(collection_name)?;
        if document_map.attributes()?.is_none() {
            document_map.set_attributes(Attributes::new_for_collection(collection_name))?;
        }

        let lock_handle = config.lock_registry().get_lock(collection_name);
        let event_bus = CollectionEventBus::new();
        let index_operations =
            IndexOperations::new(collection_name, config.clone(), document_map.clone(), event_bus.clone());
        let read_operations = ReadOperations::new(collection_name, document_map.clone(), index_operations.clone());
        let write_operations = WriteOperations::new(
            collection_name,
            document_map.clone(),
            index_operations.clone(),
            read_operations.clone(),
            event_bus.clone(),
        );

        Ok(CollectionOperations {
            collection_name: collection_name.to_string(),
            config,
            lock_handle,
            document_map,
            event_bus,
            index_operations,
            read_operations,
            write_operations,
        })
    }

    pub fn subscribe(&self, listener: CollectionEventListener) -> EmberResult<Option<SubscriberRef>> {
        self.event_bus.register(listener)
    }

    pub fn unsubscribe(&self, subscriber: SubscriberRef) -> EmberResult<()> {
        self.event_bus.deregister(subscriber)
    }

    pub fn create_index(&self, field: &str, options: &IndexOptions) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        self.index_operations
            .create_index(field, options.index_type(), options.is_async())
    }

    /// Rebuilds the existing index of `field`.
    pub fn rebuild_index(&self, field: &str, is_async: bool) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        match self.index_operations.find_index_entry(field)? {
            Some(entry) => self.index_operations.rebuild_index(&entry, is_async),
            None => {
                log::error!("{} is not indexed in {}", field, self.collection_name);
                Err(EmberError::new(
                    &format!("{} is not indexed", field),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }

    pub fn find_index(&self, field: &str) -> EmberResult<Option<IndexEntry>> {
        let _guard = self.lock_handle.read();
        self.index_operations.find_index_entry(field)
    }

    pub fn list_indexes(&self) -> EmberResult<Vec<IndexEntry>> {
        let _guard = self.lock_handle.read();
        self.index_operations.list_indexes()
    }

    pub fn has_index(&self, field: &str) -> EmberResult<bool> {
        let _guard = self.lock_handle.read();
        self.index_operations.has_index_entry(field)
    }

    pub fn is_indexing(&self, field: &str) -> EmberResult<bool> {
        let _guard = self.lock_handle.read();
        Ok(self.index_operations.is_indexing(field))
    }

    pub fn drop_index(&self, field: &str) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        self.index_operations.drop_index(field)
    }

    pub fn drop_all_indices(&self) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        self.index_operations.drop_all_indices()
    }

    pub fn insert(&self, documents: Vec<Document>) -> EmberResult<WriteResult> {
        let _guard = self.lock_handle.write();
        self.write_operations.insert(documents)
    }

    pub fn update(&self, filter: Filter, update: &Document, options: &UpdateOptions) -> EmberResult<WriteResult> {
        let _guard = self.lock_handle.write();
        self.write_operations.update(filter, update, options)
    }

    pub fn remove(&self, filter: Filter, just_once: bool) -> EmberResult<WriteResult> {
        let _guard = self.lock_handle.write();
        self.write_operations.remove(filter, just_once)
    }

    pub fn remove_document(&self, document: &Document) -> EmberResult<WriteResult> {
        let _guard = self.lock_handle.write();
        self.write_operations.remove_document(document)
    }

    pub fn find(&self, filter: Option<Filter>) -> EmberResult<DocumentCursor> {
        let _guard = self.lock_handle.read();
        self.read_operations.find(filter)
    }

    pub fn find_with_options(&self, filter: Option<Filter>, options: &FindOptions) -> EmberResult<DocumentCursor> {
        let _guard = self.lock_handle.read();
        self.read_operations.find_with_options(filter, options)
    }

    pub fn get_by_id(&self, id: &RecordId) -> EmberResult<Option<Document>> {
        let _guard = self.lock_handle.read();
        self.read_operations.get_by_id(id)
    }

    pub fn size(&self) -> EmberResult<u64> {
        let _guard = self.lock_handle.read();
        self.document_map.size()
    }

    pub fn attributes(&self) -> EmberResult<Option<Attributes>> {
        let _guard = self.lock_handle.read();
        self.document_map.attributes()
    }

    pub fn set_attributes(&self, mut attributes: Attributes) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        attributes.touch();
        self.document_map.set_attributes(attributes)
    }

    /// Drops every index, then the documents themselves.
    pub fn drop_collection(&self) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        self.index_operations.drop_all_indices()?;
        self.config.store().remove_map(&self.collection_name)?;
        self.event_bus.close()?;
        log::debug!("Dropped collection {}", self.collection_name);
        Ok(())
    }

    /// Stops event delivery. Documents and indexes stay in place.
    pub fn close(&self) -> EmberResult<()> {
        let _guard = self.lock_handle.write();
        self.event_bus.close()
    }

    pub fn is_map_dropped(&self) -> bool {
        self.document_map.is_dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionEventInfo;
    use crate::common::{CREATED_TIME, LAST_MODIFIED_TIME, OWNER};
    use crate::doc;
    use crate::filter::field;
    use crate::index::{non_unique_index, unique_index};
    use crate::Value;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(name: &str) -> (EngineConfig, CollectionOperations) {
        let config = EngineConfig::new();
        let operations = CollectionOperations::new(name, config.clone()).unwrap();
        (config, operations)
    }

    #[test]
    fn test_new_collection_gets_attributes() {
        let (_, operations) = setup("ops_attributes");
        let attributes = operations.attributes().unwrap().unwrap();
        assert_eq!(attributes.get(OWNER), Some(&Value::from("ops_attributes")));
        assert!(attributes.has_key(CREATED_TIME));

        let mut updated = attributes.clone();
        updated.put("schema", Value::from(2));
        operations.set_attributes(updated).unwrap();
        let stored = operations.attributes().unwrap().unwrap();
        assert_eq!(stored.get("schema"), Some(&Value::from(2)));
        assert!(stored.has_key(LAST_MODIFIED_TIME));
    }

    #[test]
    fn test_index_management() {
        let (_, operations) = setup("ops_indexes");
        operations.insert(vec![doc! { a: 1, b: "x" }]).unwrap();
        operations.create_index("a", &unique_index()).unwrap();
        operations.create_index("b", &non_unique_index()).unwrap();

        assert!(operations.has_index("a").unwrap());
        assert_eq!(operations.list_indexes().unwrap().len(), 2);
        assert_eq!(operations.find_index("b").unwrap().unwrap().field(), "b");
        assert!(!operations.is_indexing("a").unwrap());

        operations.rebuild_index("a", false).unwrap();
        let err = operations.rebuild_index("c", false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexingError);

        operations.drop_index("a").unwrap();
        assert!(!operations.has_index("a").unwrap());
        operations.drop_all_indices().unwrap();
        assert!(operations.list_indexes().unwrap().is_empty());
    }

    #[test]
    fn test_reads_and_writes() {
        let (_, operations) = setup("ops_crud");
        let inserted = operations.insert(vec![doc! { n: 1 }, doc! { n: 2 }]).unwrap();
        assert_eq!(operations.size().unwrap(), 2);

        let id = inserted.affected_ids()[0];
        let document = operations.get_by_id(&id).unwrap().unwrap();
        assert_eq!(document.get("n").unwrap(), Value::from(1));

        operations
            .update(field("n").eq(2), &doc! { n: 3 }, &UpdateOptions::default())
            .unwrap();
        assert_eq!(operations.find(Some(field("n").eq(3))).unwrap().size(), 1);

        operations.remove_document(&document).unwrap();
        operations.remove(field("n").eq(3), false).unwrap();
        assert_eq!(operations.find(None).unwrap().size(), 0);
    }

    #[test]
    fn test_find_with_options() {
        let (_, operations) = setup("ops_find_options");
        operations
            .insert(vec![doc! { n: 3 }, doc! { n: 1 }, doc! { n: 2 }])
            .unwrap();
        let options = crate::collection::order_by("n", crate::SortOrder::Ascending).limit(2);
        let documents = operations.find_with_options(None, &options).unwrap().to_vec().unwrap();
        let values: Vec<Value> = documents.iter().map(|d| d.get("n").unwrap()).collect();
        assert_eq!(values, vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn test_drop_collection() {
        let (config, operations) = setup("ops_drop");
        operations.insert(vec![doc! { n: 1 }]).unwrap();
        operations.create_index("n", &unique_index()).unwrap();

        operations.drop_collection().unwrap();
        assert!(operations.is_map_dropped());
        assert!(!config.store().has_map("ops_drop"));
        assert!(config.index_catalog().list_index_entries("ops_drop").unwrap().is_empty());
    }

    #[test]
    fn test_subscription() {
        let (_, operations) = setup("ops_events");
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let subscriber = operations
            .subscribe(CollectionEventListener::new(move |event: CollectionEventInfo| {
                sink.lock().push(event.event_type());
                Ok(())
            }))
            .unwrap()
            .unwrap();

        operations.insert(vec![doc! { n: 1 }]).unwrap();
        awaitility::at_most(Duration::from_secs(2)).until(|| received.lock().len() == 1);

        operations.unsubscribe(subscriber).unwrap();
        operations.insert(vec![doc! { n: 2 }]).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(received.lock().len(), 1);
    }

    #[test]
    fn test_writers_exclude_each_other() {
        let (_, operations) = setup("ops_lock");
        let operations = Arc::new(operations);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let operations = operations.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        operations.insert(vec![doc! { t: t, i: i }]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(operations.size().unwrap(), 100);
    }
}
