use crate::collection::{Document, RecordId};
use crate::common::{atomic, Atomic, Attributes, ReadExecutor, WriteExecutor};
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::store::DocumentMapProvider;
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A [DocumentMapProvider] over a lock-free skip list.
///
/// Reads never block. Mutations go through a small mutex so that
/// `put_if_absent` is a single atomic check-and-insert.
#[derive(Clone)]
pub struct InMemoryMap {
    inner: Arc<InMemoryMapInner>,
}

impl InMemoryMap {
    pub fn new(name: &str) -> Self {
        InMemoryMap {
            inner: Arc::new(InMemoryMapInner::new(name)),
        }
    }
}

impl DocumentMapProvider for InMemoryMap {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn contains_key(&self, id: &RecordId) -> EmberResult<bool> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.contains_key(id))
    }

    fn get(&self, id: &RecordId) -> EmberResult<Option<Document>> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.get(id).map(|entry| entry.value().clone()))
    }

    fn put(&self, id: RecordId, document: Document) -> EmberResult<()> {
        self.inner.put(id, document)
    }

    fn put_if_absent(&self, id: RecordId, document: Document) -> EmberResult<Option<Document>> {
        self.inner.put_if_absent(id, document)
    }

    fn remove(&self, id: &RecordId) -> EmberResult<Option<Document>> {
        self.inner.remove(id)
    }

    fn first_key(&self) -> EmberResult<Option<RecordId>> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.front().map(|entry| *entry.key()))
    }

    fn higher_key(&self, id: &RecordId) -> EmberResult<Option<RecordId>> {
        self.inner.check_opened()?;
        Ok(self
            .inner
            .backing_map
            .range((Excluded(id), Unbounded))
            .next()
            .map(|entry| *entry.key()))
    }

    fn size(&self) -> EmberResult<u64> {
        self.inner.check_opened()?;
        Ok(self.inner.backing_map.len() as u64)
    }

    fn clear(&self) -> EmberResult<()> {
        self.inner.check_opened()?;
        let _guard = self.inner.write_lock.lock();
        self.inner.backing_map.clear();
        Ok(())
    }

    fn attributes(&self) -> EmberResult<Option<Attributes>> {
        self.inner.check_opened()?;
        Ok(self.inner.attributes.read_with(|attributes| attributes.clone()))
    }

    fn set_attributes(&self, attributes: Attributes) -> EmberResult<()> {
        self.inner.check_opened()?;
        self.inner.attributes.write_with(|current| *current = Some(attributes));
        Ok(())
    }

    fn drop_map(&self) -> EmberResult<()> {
        self.inner.drop_map()
    }

    fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::Acquire)
    }
}

struct InMemoryMapInner {
    name: String,
    backing_map: SkipMap<RecordId, Document>,
    attributes: Atomic<Option<Attributes>>,
    write_lock: Mutex<()>,
    dropped: AtomicBool,
}

impl InMemoryMapInner {
    fn new(name: &str) -> Self {
        InMemoryMapInner {
            name: name.to_string(),
            backing_map: SkipMap::new(),
            attributes: atomic(None),
            write_lock: Mutex::new(()),
            dropped: AtomicBool::new(false),
        }
    }

    fn check_opened(&self) -> EmberResult<()> {
        if self.dropped.load(Ordering::Acquire) {
            log::error!("Map {} is dropped", self.name);
            return Err(EmberError::new(
                &format!("Map {} is dropped", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn put(&self, id: RecordId, document: Document) -> EmberResult<()> {
        self.check_opened()?;
        let _guard = self.write_lock.lock();
        self.backing_map.insert(id, document);
        Ok(())
    }

    fn put_if_absent(&self, id: RecordId, document: Document) -> EmberResult<Option<Document>> {
        self.check_opened()?;
        let _guard = self.write_lock.lock();
        if let Some(existing) = self.backing_map.get(&id) {
            return Ok(Some(existing.value().clone()));
        }
        self.backing_map.insert(id, document);
        Ok(None)
    }

    fn remove(&self, id: &RecordId) -> EmberResult<Option<Document>> {
        self.check_opened()?;
        let _guard = self.write_lock.lock();
        Ok(self.backing_map.remove(id).map(|entry| entry.value().clone()))
    }

    fn drop_map(&self) -> EmberResult<()> {
        self.check_opened()?;
        let _guard = self.write_lock.lock();
        self.backing_map.clear();
        self.attributes.write_with(|attributes| *attributes = None);
        self.dropped.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use std::thread;

    fn create_test_map() -> InMemoryMap {
        InMemoryMap::new("test_map")
    }

    #[test]
    fn test_put_and_get() {
        let map = create_test_map();
        let id = RecordId::create_id(1);
        map.put(id, doc! { a: 1 }).unwrap();

        assert!(map.contains_key(&id).unwrap());
        assert_eq!(map.get(&id).unwrap(), Some(doc! { a: 1 }));
        assert_eq!(map.size().unwrap(), 1);
    }

    #[test]
    fn test_put_if_absent_returns_existing() {
        let map = create_test_map();
        let id = RecordId::create_id(1);

        assert!(map.put_if_absent(id, doc! { a: 1 }).unwrap().is_none());
        let existing = map.put_if_absent(id, doc! { a: 2 }).unwrap();
        assert_eq!(existing, Some(doc! { a: 1 }));
        assert_eq!(map.get(&id).unwrap(), Some(doc! { a: 1 }));
    }

    #[test]
    fn test_put_if_absent_is_atomic() {
        let map = create_test_map();
        let id = RecordId::create_id(99);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let map = map.clone();
                thread::spawn(move || map.put_if_absent(id, doc! { writer: i }).unwrap().is_none())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_remove() {
        let map = create_test_map();
        let id = RecordId::create_id(1);
        map.put(id, doc! { a: 1 }).unwrap();

        assert_eq!(map.remove(&id).unwrap(), Some(doc! { a: 1 }));
        assert_eq!(map.remove(&id).unwrap(), None);
        assert_eq!(map.size().unwrap(), 0);
    }

    #[test]
    fn test_first_and_higher_key() {
        let map = create_test_map();
        for i in [5u64, 1, 3] {
            map.put(RecordId::create_id(i), doc! { v: i }).unwrap();
        }

        let first = map.first_key().unwrap().unwrap();
        assert_eq!(first.id_value(), 1);
        assert_eq!(map.higher_key(&first).unwrap().unwrap().id_value(), 3);
        assert_eq!(map.higher_key(&RecordId::create_id(3)).unwrap().unwrap().id_value(), 5);
        assert!(map.higher_key(&RecordId::create_id(5)).unwrap().is_none());
    }

    #[test]
    fn test_attributes() {
        let map = create_test_map();
        assert!(map.attributes().unwrap().is_none());

        map.set_attributes(Attributes::new_for_collection("test_map")).unwrap();
        assert!(map.attributes().unwrap().is_some());
    }

    #[test]
    fn test_drop_map() {
        let map = create_test_map();
        map.put(RecordId::create_id(1), doc! { a: 1 }).unwrap();
        map.drop_map().unwrap();

        assert!(map.is_dropped());
        let err = map.get(&RecordId::create_id(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_clear() {
        let map = create_test_map();
        map.put(RecordId::create_id(1), doc! { a: 1 }).unwrap();
        map.clear().unwrap();
        assert_eq!(map.size().unwrap(), 0);
    }
}
