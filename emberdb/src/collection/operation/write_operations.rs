use super::index_operations::IndexOperations;
use super::read_operations::ReadOperations;
use crate::collection::{
    CollectionEventInfo, CollectionEvents, Document, RecordId, UpdateOptions, WriteResult,
};
use crate::common::{current_time_millis, CollectionEventBus, DOC_ID, DOC_MODIFIED, DOC_REVISION, DOC_SOURCE, LOCAL_ORIGINATOR};
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::filter::Filter;
use crate::store::{DocumentMap, InsertOutcome};
use crate::Value;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct WriteOperations {
    inner: Arc<WriteOperationsInner>,
}

impl WriteOperations {
    pub fn new(
        collection_name: &str,
        document_map: DocumentMap,
        index_operations: IndexOperations,
        read_operations: ReadOperations,
        event_bus: CollectionEventBus,
    ) -> Self {
        WriteOperations {
            inner: Arc::new(WriteOperationsInner {
                collection_name: collection_name.to_string(),
                document_map,
                index_operations,
                read_operations,
                event_bus,
            }),
        }
    }

    /// Inserts every document in order. A failure stops the batch; documents
    /// inserted before it stay inserted.
    pub fn insert(&self, documents: Vec<Document>) -> EmberResult<WriteResult> {
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.inner.process_insert(document)?);
        }
        Ok(WriteResult::new(ids))
    }

    /// Merges `update` into every document matched by `filter`.
    pub fn update(&self, filter: Filter, update: &Document, options: &UpdateOptions) -> EmberResult<WriteResult> {
        let matches = self
            .inner
            .read_operations
            .find(Some(filter))?
            .iter_with_id()
            .collect::<EmberResult<Vec<_>>>()?;

        if matches.is_empty() {
            if options.is_insert_if_absent() {
                return self.insert(vec![update.clone()]);
            }
            return Ok(WriteResult::default());
        }

        if matches.len() > 1 && options.is_just_once() {
            log::error!("Update with just once matched {} documents", matches.len());
            return Err(EmberError::new(
                &format!("Update with just once matched {} documents", matches.len()),
                ErrorKind::InvalidOperation,
            ));
        }

        let source = update.source();
        let mut patch = update.clone();
        patch.remove(DOC_ID)?;
        patch.remove(DOC_SOURCE)?;
        if source.is_empty() {
            patch.remove(DOC_REVISION)?;
        }

        if patch.is_empty() {
            log::debug!("Update of {} carries no fields, nothing to write", self.inner.collection_name);
            self.inner.alert(None, CollectionEvents::Update, &source);
            return Ok(WriteResult::default());
        }

        let mut ids = Vec::with_capacity(matches.len());
        for (id, document) in matches {
            self.inner.process_update(id, document, &patch, &source)?;
            ids.push(id);
        }
        Ok(WriteResult::new(ids))
    }

    /// Removes the documents matched by `filter`, only the first one with
    /// `just_once`.
    pub fn remove(&self, filter: Filter, just_once: bool) -> EmberResult<WriteResult> {
        let limit = if just_once { 1 } else { usize::MAX };
        let matches = self
            .inner
            .read_operations
            .find(Some(filter))?
            .iter_with_id()
            .take(limit)
            .map(|item| item.map(|(id, _)| id))
            .collect::<EmberResult<Vec<_>>>()?;

        let mut ids = Vec::with_capacity(matches.len());
        for id in matches {
            if self.inner.process_remove(id, "")? {
                ids.push(id);
            }
        }
        Ok(WriteResult::new(ids))
    }

    /// Removes the stored document carrying the id of `document`.
    pub fn remove_document(&self, document: &Document) -> EmberResult<WriteResult> {
        let id = match document.record_id() {
            Some(id) => id,
            None => {
                log::error!("Document has no id, cannot remove {}", document);
                return Err(EmberError::new(
                    "Document has no id, it cannot be removed",
                    ErrorKind::NotIdentifiable,
                ));
            }
        };

        if self.inner.process_remove(id, &document.source())? {
            Ok(WriteResult::new(vec![id]))
        } else {
            Ok(WriteResult::default())
        }
    }
}

struct WriteOperationsInner {
    collection_name: String,
    document_map: DocumentMap,
    index_operations: IndexOperations,
    read_operations: ReadOperations,
    event_bus: CollectionEventBus,
}

impl WriteOperationsInner {
    fn process_insert(&self, document: Document) -> EmberResult<RecordId> {
        let mut new_doc = document;
        let id = new_doc.id()?;
        let source = new_doc.source();

        new_doc.remove(DOC_SOURCE)?;
        if source.is_empty() {
            new_doc.put(DOC_REVISION, 1i64)?;
            new_doc.put(DOC_MODIFIED, current_time_millis())?;
        }

        if let InsertOutcome::Conflict(_) = self.document_map.insert_if_absent(id, new_doc.clone())? {
            log::error!("Document already exists with id {} in {}", id, self.collection_name);
            return Err(EmberError::new(
                &format!("Document already exists with id {}", id),
                ErrorKind::UniqueConstraintViolation,
            ));
        }

        if let Err(e) = self.index_operations.write_index(&new_doc, id) {
            log::error!("Failed to index document {} in {}, rolling back: {}", id, self.collection_name, e);
            if let Err(remove_err) = self.document_map.remove(&id) {
                log::error!("Failed to roll back document {}: {}", id, remove_err);
            }
            if let Err(index_err) = self.index_operations.remove_index(&new_doc, id) {
                log::warn!("Failed to roll back index entries of {}: {}", id, index_err);
            }
            return Err(e);
        }

        self.alert(Some(Value::from(new_doc)), CollectionEvents::Insert, &source);
        Ok(id)
    }

    fn process_update(&self, id: RecordId, old_doc: Document, patch: &Document, source: &str) -> EmberResult<()> {
        let mut new_doc = old_doc.clone();
        new_doc.merge(patch)?;
        if source.is_empty() {
            new_doc.put(DOC_REVISION, old_doc.revision() + 1)?;
            new_doc.put(DOC_MODIFIED, current_time_millis())?;
        }

        self.document_map.put(id, new_doc.clone())?;

        if let Err(e) = self.index_operations.update_index(&old_doc, &new_doc, id) {
            log::error!("Failed to reindex document {} in {}, rolling back: {}", id, self.collection_name, e);
            self.document_map.put(id, old_doc.clone())?;
            if let Err(index_err) = self.index_operations.update_index(&new_doc, &old_doc, id) {
                log::warn!("Failed to roll back index entries of {}: {}", id, index_err);
            }
            return Err(e);
        }

        self.alert(Some(Value::from(new_doc)), CollectionEvents::Update, source);
        Ok(())
    }

    /// Returns whether a document was removed; one removed concurrently is
    /// not an error.
    fn process_remove(&self, id: RecordId, source: &str) -> EmberResult<bool> {
        let mut removed = match self.document_map.remove(&id)? {
            Some(document) => document,
            None => {
                log::debug!("Document {} already gone from {}", id, self.collection_name);
                return Ok(false);
            }
        };

        self.index_operations.remove_index(&removed, id)?;

        // listeners see the revision the removal produced
        removed.put(DOC_REVISION, removed.revision() + 1)?;
        removed.put(DOC_MODIFIED, current_time_millis())?;
        self.alert(Some(Value::from(removed)), CollectionEvents::Remove, source);
        Ok(true)
    }

    fn alert(&self, item: Option<Value>, event_type: CollectionEvents, source: &str) {
        let originator = if source.is_empty() { LOCAL_ORIGINATOR } else { source };
        let event = CollectionEventInfo::new(item, event_type, originator);
        if let Err(e) = self.event_bus.publish(event) {
            log::error!("Failed to publish {:?} event for {}: {}", event_type, self.collection_name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{insert_if_absent, just_once, CollectionEventListener};
    use crate::doc;
    use crate::engine_config::EngineConfig;
    use crate::filter::{all, field};
    use crate::index::{IndexLookup, IndexType};
    use parking_lot::Mutex;
    use std::collections::BTreeSet;
    use std::time::Duration;

    struct Fixture {
        map: DocumentMap,
        bus: CollectionEventBus,
        index_operations: IndexOperations,
        write_operations: WriteOperations,
    }

    fn setup(name: &str) -> Fixture {
        let config = EngineConfig::new();
        let map = config.store().open_map(name).unwrap();
        let bus = CollectionEventBus::new();
        let index_operations = IndexOperations::new(name, config, map.clone(), bus.clone());
        let read_operations = ReadOperations::new(name, map.clone(), index_operations.clone());
        let write_operations =
            WriteOperations::new(name, map.clone(), index_operations.clone(), read_operations, bus.clone());
        Fixture {
            map,
            bus,
            index_operations,
            write_operations,
        }
    }

    fn record(fixture: &Fixture) -> Arc<Mutex<Vec<CollectionEventInfo>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        fixture
            .bus
            .register(CollectionEventListener::new(move |event| {
                sink.lock().push(event);
                Ok(())
            }))
            .unwrap();
        received
    }

    fn stored(fixture: &Fixture, id: RecordId) -> Document {
        fixture.map.get(&id).unwrap().unwrap()
    }

    fn lookup(fixture: &Fixture, field: &str, value: Value) -> BTreeSet<RecordId> {
        let entry = fixture.index_operations.find_index_entry(field).unwrap().unwrap();
        fixture
            .index_operations
            .find_by_lookup(&entry, &IndexLookup::Eq(value))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_insert_stamps_metadata() {
        let fixture = setup("insert_stamps");
        let result = fixture
            .write_operations
            .insert(vec![doc! { name: "Alice", _source: "" }])
            .unwrap();
        assert_eq!(result.affected_count(), 1);

        let document = stored(&fixture, result.affected_ids()[0]);
        assert_eq!(document.revision(), 1);
        assert!(document.last_modified_since_epoch() > 0);
        assert!(!document.contains_key(DOC_SOURCE));
        assert_eq!(document.record_id(), Some(result.affected_ids()[0]));
    }

    #[test]
    fn test_replicated_insert_keeps_revision() {
        let fixture = setup("insert_replicated");
        let result = fixture
            .write_operations
            .insert(vec![doc! { name: "Bob", _revision: 7, _source: "peer-1" }])
            .unwrap();

        let document = stored(&fixture, result.affected_ids()[0]);
        assert_eq!(document.revision(), 7);
        assert!(!document.contains_key(DOC_SOURCE));
        assert!(!document.contains_key(DOC_MODIFIED));
    }

    #[test]
    fn test_duplicate_id_is_rejected_and_original_kept() {
        let fixture = setup("insert_duplicate");
        let mut first = doc! { name: "first" };
        let id = first.id().unwrap();
        fixture.write_operations.insert(vec![first]).unwrap();

        let mut second = doc! { name: "second" };
        second.put(DOC_ID, id).unwrap();
        let err = fixture.write_operations.insert(vec![second]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
        assert_eq!(stored(&fixture, id).get("name").unwrap(), Value::from("first"));
        assert_eq!(fixture.map.size().unwrap(), 1);
    }

    #[test]
    fn test_unique_index_violation_rolls_back_insert() {
        let fixture = setup("insert_unique_rollback");
        fixture.index_operations.create_index("tag", IndexType::NonUnique, false).unwrap();
        fixture.index_operations.create_index("email", IndexType::Unique, false).unwrap();
        let first = fixture
            .write_operations
            .insert(vec![doc! { email: "a@x.org", tag: "t" }])
            .unwrap();

        let mut second = doc! { email: "a@x.org", tag: "t" };
        let second_id = second.id().unwrap();
        let err = fixture.write_operations.insert(vec![second]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);

        assert!(fixture.map.get(&second_id).unwrap().is_none());
        assert_eq!(fixture.map.size().unwrap(), 1);
        assert_eq!(
            lookup(&fixture, "tag", Value::from("t")),
            BTreeSet::from([first.affected_ids()[0]])
        );
        assert_eq!(
            lookup(&fixture, "email", Value::from("a@x.org")),
            BTreeSet::from([first.affected_ids()[0]])
        );
    }

    #[test]
    fn test_batch_insert_is_not_atomic() {
        let fixture = setup("insert_batch");
        fixture.index_operations.create_index("n", IndexType::Unique, false).unwrap();
        let err = fixture
            .write_operations
            .insert(vec![doc! { n: 1 }, doc! { n: 2 }, doc! { n: 1 }, doc! { n: 3 }])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
        assert_eq!(fixture.map.size().unwrap(), 2);
    }

    #[test]
    fn test_update_merges_and_bumps_revision() {
        let fixture = setup("update_merge");
        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        let inserted = fixture
            .write_operations
            .insert(vec![doc! { name: "Alice", age: 30 }, doc! { name: "Bob", age: 25 }])
            .unwrap();
        let alice = inserted.affected_ids()[0];

        let result = fixture
            .write_operations
            .update(field("name").eq("Alice"), &doc! { age: 31, city: "Oslo" }, &UpdateOptions::default())
            .unwrap();
        assert_eq!(result.affected_ids(), &[alice]);

        let document = stored(&fixture, alice);
        assert_eq!(document.get("age").unwrap(), Value::from(31));
        assert_eq!(document.get("city").unwrap(), Value::from("Oslo"));
        assert_eq!(document.get("name").unwrap(), Value::from("Alice"));
        assert_eq!(document.revision(), 2);
        assert!(lookup(&fixture, "age", Value::from(30)).is_empty());
        assert_eq!(lookup(&fixture, "age", Value::from(31)), BTreeSet::from([alice]));
    }

    #[test]
    fn test_update_cannot_change_id_or_revision() {
        let fixture = setup("update_immutable");
        let inserted = fixture.write_operations.insert(vec![doc! { n: 1 }]).unwrap();
        let id = inserted.affected_ids()[0];

        let mut patch = doc! { n: 2, _revision: 40 };
        patch.put(DOC_ID, RecordId::create_id(7)).unwrap();
        fixture
            .write_operations
            .update(all(), &patch, &UpdateOptions::default())
            .unwrap();

        let document = stored(&fixture, id);
        assert_eq!(document.record_id(), Some(id));
        assert_eq!(document.revision(), 2);
        assert!(fixture.map.get(&RecordId::create_id(7)).unwrap().is_none());
    }

    #[test]
    fn test_replicated_update_keeps_incoming_revision() {
        let fixture = setup("update_replicated");
        let received = record(&fixture);
        let inserted = fixture.write_operations.insert(vec![doc! { n: 1 }]).unwrap();
        let id = inserted.affected_ids()[0];
        let modified = stored(&fixture, id).last_modified_since_epoch();
        std::thread::sleep(Duration::from_millis(5));

        fixture
            .write_operations
            .update(all(), &doc! { _source: "peer", _revision: 9, x: 1 }, &UpdateOptions::default())
            .unwrap();

        let document = stored(&fixture, id);
        assert_eq!(document.revision(), 9);
        assert_eq!(document.last_modified_since_epoch(), modified);
        assert_eq!(document.get("x").unwrap(), Value::from(1));
        assert!(!document.contains_key(DOC_SOURCE));

        awaitility::at_most(Duration::from_secs(2)).until(|| received.lock().len() == 2);
        let update = received.lock()[1].clone();
        assert_eq!(update.event_type(), CollectionEvents::Update);
        assert_eq!(update.originator(), "peer");
    }

    #[test]
    fn test_update_just_once_over_many_matches_fails() {
        let fixture = setup("update_just_once");
        fixture
            .write_operations
            .insert(vec![doc! { g: 1, v: 0 }, doc! { g: 1, v: 0 }, doc! { g: 1, v: 0 }])
            .unwrap();

        let err = fixture
            .write_operations
            .update(field("g").eq(1), &doc! { v: 1 }, &just_once())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        for item in fixture.map.entries() {
            let (_, document) = item.unwrap();
            assert_eq!(document.get("v").unwrap(), Value::from(0));
            assert_eq!(document.revision(), 1);
        }
    }

    #[test]
    fn test_update_just_once_single_match() {
        let fixture = setup("update_just_once_single");
        fixture.write_operations.insert(vec![doc! { g: 1 }, doc! { g: 2 }]).unwrap();
        let result = fixture
            .write_operations
            .update(field("g").eq(2), &doc! { seen: true }, &just_once())
            .unwrap();
        assert_eq!(result.affected_count(), 1);
    }

    #[test]
    fn test_update_insert_if_absent() {
        let fixture = setup("update_upsert");
        let result = fixture
            .write_operations
            .update(field("email").eq("x@y.z"), &doc! { email: "x@y.z" }, &insert_if_absent())
            .unwrap();
        assert_eq!(result.affected_count(), 1);
        assert_eq!(fixture.map.size().unwrap(), 1);

        let result = fixture
            .write_operations
            .update(field("email").eq("nobody"), &doc! { email: "nobody" }, &UpdateOptions::default())
            .unwrap();
        assert_eq!(result.affected_count(), 0);
        assert_eq!(fixture.map.size().unwrap(), 1);
    }

    #[test]
    fn test_empty_update_only_notifies() {
        let fixture = setup("update_empty");
        let received = record(&fixture);
        let inserted = fixture.write_operations.insert(vec![doc! { n: 1 }]).unwrap();
        let id = inserted.affected_ids()[0];

        let mut patch = Document::new();
        patch.put(DOC_ID, id).unwrap();
        let result = fixture
            .write_operations
            .update(all(), &patch, &UpdateOptions::default())
            .unwrap();
        assert_eq!(result.affected_count(), 0);
        assert_eq!(stored(&fixture, id).revision(), 1);

        awaitility::at_most(Duration::from_secs(2)).until(|| received.lock().len() == 2);
        let events = received.lock();
        assert_eq!(events[1].event_type(), CollectionEvents::Update);
        assert!(events[1].item().is_none());
    }

    #[test]
    fn test_update_unique_violation_restores_document() {
        let fixture = setup("update_unique_rollback");
        fixture.index_operations.create_index("email", IndexType::Unique, false).unwrap();
        let inserted = fixture
            .write_operations
            .insert(vec![doc! { email: "a@x.org" }, doc! { email: "b@x.org" }])
            .unwrap();
        let (a, b) = (inserted.affected_ids()[0], inserted.affected_ids()[1]);

        let err = fixture
            .write_operations
            .update(field("email").eq("b@x.org"), &doc! { email: "a@x.org" }, &UpdateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);

        let document = stored(&fixture, b);
        assert_eq!(document.get("email").unwrap(), Value::from("b@x.org"));
        assert_eq!(document.revision(), 1);
        assert_eq!(lookup(&fixture, "email", Value::from("a@x.org")), BTreeSet::from([a]));
        assert_eq!(lookup(&fixture, "email", Value::from("b@x.org")), BTreeSet::from([b]));
    }

    #[test]
    fn test_remove_by_filter() {
        let fixture = setup("remove_filter");
        fixture.index_operations.create_index("g", IndexType::NonUnique, false).unwrap();
        fixture
            .write_operations
            .insert(vec![doc! { g: 1 }, doc! { g: 1 }, doc! { g: 2 }])
            .unwrap();

        let result = fixture.write_operations.remove(field("g").eq(1), true).unwrap();
        assert_eq!(result.affected_count(), 1);
        assert_eq!(fixture.map.size().unwrap(), 2);

        let result = fixture.write_operations.remove(field("g").eq(1), false).unwrap();
        assert_eq!(result.affected_count(), 1);
        assert!(lookup(&fixture, "g", Value::from(1)).is_empty());
        assert_eq!(fixture.map.size().unwrap(), 1);
    }

    #[test]
    fn test_remove_document() {
        let fixture = setup("remove_document");
        let received = record(&fixture);
        let inserted = fixture.write_operations.insert(vec![doc! { n: 1 }]).unwrap();
        let id = inserted.affected_ids()[0];

        let err = fixture.write_operations.remove_document(&doc! { n: 1 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotIdentifiable);

        let mut document = stored(&fixture, id);
        document.put(DOC_SOURCE, "peer-2").unwrap();
        let result = fixture.write_operations.remove_document(&document).unwrap();
        assert_eq!(result.affected_ids(), &[id]);
        assert_eq!(fixture.map.size().unwrap(), 0);

        let result = fixture.write_operations.remove_document(&document).unwrap();
        assert_eq!(result.affected_count(), 0);

        awaitility::at_most(Duration::from_secs(2)).until(|| received.lock().len() == 2);
        let events = received.lock();
        let removed = events[1].item().unwrap().as_document().unwrap().clone();
        assert_eq!(events[1].event_type(), CollectionEvents::Remove);
        assert_eq!(events[1].originator(), "peer-2");
        assert_eq!(removed.revision(), 2);
    }

    #[test]
    fn test_events_carry_originator() {
        let fixture = setup("write_events");
        let received = record(&fixture);
        fixture.write_operations.insert(vec![doc! { n: 1 }]).unwrap();
        fixture
            .write_operations
            .insert(vec![doc! { n: 2, _source: "peer-3" }])
            .unwrap();
        fixture
            .write_operations
            .update(field("n").eq(1), &doc! { n: 10 }, &UpdateOptions::default())
            .unwrap();
        fixture.write_operations.remove(all(), false).unwrap();

        awaitility::at_most(Duration::from_secs(2)).until(|| received.lock().len() == 5);
        let summary: Vec<(CollectionEvents, String)> = received
            .lock()
            .iter()
            .map(|e| (e.event_type(), e.originator().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (CollectionEvents::Insert, "local".to_string()),
                (CollectionEvents::Insert, "peer-3".to_string()),
                (CollectionEvents::Update, "local".to_string()),
                (CollectionEvents::Remove, "local".to_string()),
                (CollectionEvents::Remove, "local".to_string()),
            ]
        );
    }
}
