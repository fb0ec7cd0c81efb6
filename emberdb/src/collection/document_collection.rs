use super::operation::CollectionOperations;
use super::{CollectionEventListener, Document, FindOptions, RecordId, UpdateOptions, WriteResult};
use crate::common::{Attributes, DocumentCursor, EventAware, SubscriberRef};
use crate::engine_config::EngineConfig;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::filter::{by_id, is_all_filter, Filter};
use crate::index::{IndexEntry, IndexOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named set of documents with secondary indexes.
///
/// Handles are cheap to clone. [DocumentCollection::open] returns the same
/// collection for the same name on one [EngineConfig] until it is closed or
/// dropped, after which any operation on an old handle fails with
/// [ErrorKind::InvalidOperation].
///
/// # Examples
///
/// ```rust,ignore
/// use emberdb::collection::DocumentCollection;
/// use emberdb::engine_config::EngineConfig;
/// use emberdb::filter::field;
/// use emberdb::index::non_unique_index;
/// use emberdb::doc;
///
/// let users = DocumentCollection::open("users", EngineConfig::default())?;
/// users.create_index("age", &non_unique_index())?;
/// users.insert(doc! { name: "Alice", age: 30 })?;
///
/// let adults = users.find(field("age").gte(18))?.to_vec()?;
/// ```
#[derive(Clone)]
pub struct DocumentCollection {
    inner: Arc<DocumentCollectionInner>,
}

struct DocumentCollectionInner {
    name: String,
    operations: CollectionOperations,
    closed: AtomicBool,
    dropped: AtomicBool,
}

impl DocumentCollection {
    /// Opens the collection `name`, creating it if needed. Freezes the
    /// settings of `config`.
    pub fn open(name: &str, config: EngineConfig) -> EmberResult<DocumentCollection> {
        config.mark_configured();
        config.collection_factory().get_collection(name, config.clone())
    }

    pub(crate) fn create(name: &str, config: EngineConfig) -> EmberResult<DocumentCollection> {
        let operations = CollectionOperations::new(name, config)?;
        log::debug!("Opened collection {}", name);
        Ok(DocumentCollection {
            inner: Arc::new(DocumentCollectionInner {
                name: name.to_string(),
                operations,
                closed: AtomicBool::new(false),
                dropped: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    pub fn insert(&self, document: Document) -> EmberResult<WriteResult> {
        self.insert_many(vec![document])
    }

    /// Inserts the documents in order. Documents inserted before a failing
    /// one are kept.
    pub fn insert_many(&self, documents: Vec<Document>) -> EmberResult<WriteResult> {
        self.ensure_opened()?;
        self.inner.operations.insert(documents)
    }

    pub fn update(&self, filter: Filter, update: &Document) -> EmberResult<WriteResult> {
        self.update_with_options(filter, update, &UpdateOptions::default())
    }

    pub fn update_with_options(
        &self,
        filter: Filter,
        update: &Document,
        options: &UpdateOptions,
    ) -> EmberResult<WriteResult> {
        self.ensure_opened()?;
        self.inner.operations.update(filter, update, options)
    }

    /// Updates the stored document carrying the id of `document`.
    ///
    /// With `insert_if_absent` a document without id or with an unknown id is
    /// inserted instead.
    pub fn update_one(&self, document: &Document, insert_if_absent: bool) -> EmberResult<WriteResult> {
        let mut document = document.clone();
        if !insert_if_absent && !document.has_id() {
            log::error!("Document has no id, cannot update {}", document);
            return Err(EmberError::new(
                "Document has no id, it cannot be updated",
                ErrorKind::NotIdentifiable,
            ));
        }

        let id = document.id()?;
        self.update_with_options(by_id(id), &document, &UpdateOptions::new(insert_if_absent, false))
    }

    /// Removes the documents matched by `filter`, only the first one with
    /// `just_once`.
    pub fn remove(&self, filter: Filter, just_once: bool) -> EmberResult<WriteResult> {
        if just_once && is_all_filter(&filter) {
            log::error!("Cannot remove all documents with just once");
            return Err(EmberError::new(
                "Cannot remove all documents with just once",
                ErrorKind::InvalidOperation,
            ));
        }

        self.ensure_opened()?;
        self.inner.operations.remove(filter, just_once)
    }

    pub fn remove_one(&self, document: &Document) -> EmberResult<WriteResult> {
        if !document.has_id() {
            log::error!("Document has no id, cannot remove {}", document);
            return Err(EmberError::new(
                "Document has no id, it cannot be removed",
                ErrorKind::NotIdentifiable,
            ));
        }

        self.ensure_opened()?;
        self.inner.operations.remove_document(document)
    }

    pub fn find(&self, filter: Filter) -> EmberResult<DocumentCursor> {
        self.ensure_opened()?;
        self.inner.operations.find(Some(filter))
    }

    pub fn find_all(&self) -> EmberResult<DocumentCursor> {
        self.ensure_opened()?;
        self.inner.operations.find(None)
    }

    pub fn find_with_options(&self, filter: Filter, options: &FindOptions) -> EmberResult<DocumentCursor> {
        self.ensure_opened()?;
        self.inner.operations.find_with_options(Some(filter), options)
    }

    pub fn get_by_id(&self, id: &RecordId) -> EmberResult<Option<Document>> {
        self.ensure_opened()?;
        self.inner.operations.get_by_id(id)
    }

    /// Indexes `field` and builds the index from the stored documents.
    pub fn create_index(&self, field: &str, options: &IndexOptions) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.create_index(field, options)
    }

    pub fn rebuild_index(&self, field: &str, is_async: bool) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.rebuild_index(field, is_async)
    }

    pub fn list_indexes(&self) -> EmberResult<Vec<IndexEntry>> {
        self.ensure_opened()?;
        self.inner.operations.list_indexes()
    }

    pub fn find_index(&self, field: &str) -> EmberResult<Option<IndexEntry>> {
        self.ensure_opened()?;
        self.inner.operations.find_index(field)
    }

    pub fn has_index(&self, field: &str) -> EmberResult<bool> {
        self.ensure_opened()?;
        self.inner.operations.has_index(field)
    }

    /// Whether the index of `field` is being rebuilt right now.
    pub fn is_indexing(&self, field: &str) -> EmberResult<bool> {
        self.ensure_opened()?;
        self.inner.operations.is_indexing(field)
    }

    pub fn drop_index(&self, field: &str) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.drop_index(field)
    }

    pub fn drop_all_indices(&self) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.drop_all_indices()
    }

    pub fn size(&self) -> EmberResult<u64> {
        self.ensure_opened()?;
        self.inner.operations.size()
    }

    pub fn attributes(&self) -> EmberResult<Option<Attributes>> {
        self.ensure_opened()?;
        self.inner.operations.attributes()
    }

    pub fn set_attributes(&self, attributes: Attributes) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.set_attributes(attributes)
    }

    /// Releases the handle. The documents and indexes stay in the store and
    /// the collection can be opened again.
    pub fn close(&self) -> EmberResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        log::debug!("Closing collection {}", self.inner.name);
        self.inner.operations.close()
    }

    /// Drops the collection with all its documents and indexes.
    pub fn dispose(&self) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.drop_collection()?;
        self.inner.dropped.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire) && !self.is_dropped()
    }

    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::Acquire) || self.inner.operations.is_map_dropped()
    }

    pub(crate) fn same_as(&self, other: &DocumentCollection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_opened(&self) -> EmberResult<()> {
        if self.is_dropped() {
            log::error!("Collection {} is dropped and cannot be accessed", self.inner.name);
            return Err(EmberError::new(
                &format!("Collection {} is dropped and cannot be accessed", self.inner.name),
                ErrorKind::InvalidOperation,
            ));
        }
        if self.inner.closed.load(Ordering::Acquire) {
            log::error!("Collection {} is closed", self.inner.name);
            return Err(EmberError::new(
                &format!("Collection {} is closed", self.inner.name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

impl EventAware for DocumentCollection {
    fn subscribe(&self, listener: CollectionEventListener) -> EmberResult<Option<SubscriberRef>> {
        self.ensure_opened()?;
        self.inner.operations.subscribe(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> EmberResult<()> {
        self.ensure_opened()?;
        self.inner.operations.unsubscribe(subscriber)
    }
}
