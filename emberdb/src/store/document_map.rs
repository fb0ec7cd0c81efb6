use crate::collection::{Document, RecordId};
use crate::common::Attributes;
use crate::errors::EmberResult;
use std::ops::Deref;
use std::sync::Arc;

/// Ordered key-value storage of a collection's documents.
///
/// Keys are [RecordId]s and iteration follows their order. Implementations
/// must be safe to share between threads; writers are serialized by the
/// collection lock, readers may run concurrently with an index rebuild.
pub trait DocumentMapProvider: Send + Sync {
    fn name(&self) -> String;

    fn contains_key(&self, id: &RecordId) -> EmberResult<bool>;

    fn get(&self, id: &RecordId) -> EmberResult<Option<Document>>;

    fn put(&self, id: RecordId, document: Document) -> EmberResult<()>;

    /// Stores `document` only if `id` is free; returns the current occupant
    /// otherwise.
    fn put_if_absent(&self, id: RecordId, document: Document) -> EmberResult<Option<Document>>;

    fn remove(&self, id: &RecordId) -> EmberResult<Option<Document>>;

    fn first_key(&self) -> EmberResult<Option<RecordId>>;

    /// The smallest key strictly greater than `id`.
    fn higher_key(&self, id: &RecordId) -> EmberResult<Option<RecordId>>;

    fn size(&self) -> EmberResult<u64>;

    fn clear(&self) -> EmberResult<()>;

    fn attributes(&self) -> EmberResult<Option<Attributes>>;

    fn set_attributes(&self, attributes: Attributes) -> EmberResult<()>;

    /// Removes every document and marks the map unusable.
    fn drop_map(&self) -> EmberResult<()>;

    fn is_dropped(&self) -> bool;
}

/// Result of [DocumentMap::insert_if_absent].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// The id was taken; carries the document that keeps occupying it.
    Conflict(Document),
}

#[derive(Clone)]
pub struct DocumentMap {
    inner: Arc<dyn DocumentMapProvider>,
}

impl DocumentMap {
    pub fn new<T: DocumentMapProvider + 'static>(inner: T) -> Self {
        DocumentMap { inner: Arc::new(inner) }
    }

    /// Inserts a document under a fresh id.
    ///
    /// On conflict the previous occupant is guaranteed to still be stored
    /// when this returns: if the backend replaced it anyway, it is put back
    /// before reporting the conflict.
    pub fn insert_if_absent(&self, id: RecordId, document: Document) -> EmberResult<InsertOutcome> {
        match self.inner.put_if_absent(id, document)? {
            None => Ok(InsertOutcome::Inserted),
            Some(existing) => {
                if self.inner.get(&id)?.as_ref() != Some(&existing) {
                    log::warn!("Restoring document {} in {} after a failed insert", id, self.inner.name());
                    self.inner.put(id, existing.clone())?;
                }
                Ok(InsertOutcome::Conflict(existing))
            }
        }
    }

    /// Lazily walks the keys in ascending order.
    ///
    /// Keys inserted or removed while iterating are observed if they lie
    /// ahead of the current position.
    pub fn keys(&self) -> KeyIterator {
        KeyIterator::new(self.clone())
    }

    /// Lazily walks `(id, document)` pairs in key order, skipping ids whose
    /// document vanished between the key lookup and the read.
    pub fn entries(&self) -> EntryIterator {
        EntryIterator {
            keys: self.keys(),
            map: self.clone(),
        }
    }
}

impl Deref for DocumentMap {
    type Target = Arc<dyn DocumentMapProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct KeyIterator {
    map: DocumentMap,
    current: Option<RecordId>,
    started: bool,
    finished: bool,
}

impl KeyIterator {
    fn new(map: DocumentMap) -> Self {
        KeyIterator {
            map,
            current: None,
            started: false,
            finished: false,
        }
    }
}

impl Iterator for KeyIterator {
    type Item = EmberResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let next = match (self.started, self.current) {
            (false, _) => self.map.first_key(),
            (true, Some(current)) => self.map.higher_key(&current),
            (true, None) => Ok(None),
        };
        self.started = true;

        match next {
            Ok(Some(id)) => {
                self.current = Some(id);
                Some(Ok(id))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

pub struct EntryIterator {
    keys: KeyIterator,
    map: DocumentMap,
}

impl Iterator for EntryIterator {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = match self.keys.next()? {
                Ok(id) => id,
                Err(e) => return Some(Err(e)),
            };
            match self.map.get(&id) {
                Ok(Some(document)) => return Some(Ok((id, document))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
