use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::index::{IndexEntry, IndexType};
use dashmap::DashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Stores which fields of which collection are indexed, and whether each
/// index can currently be trusted.
///
/// An entry is dirty from [IndexCatalogProvider::begin_indexing] until the
/// matching [IndexCatalogProvider::end_indexing]. A dirty entry that is not
/// being rebuilt means the index diverged from the documents.
pub trait IndexCatalogProvider: Send + Sync {
    fn has_index_entry(&self, collection: &str, field: &str) -> EmberResult<bool>;

    fn find_index_entry(&self, collection: &str, field: &str) -> EmberResult<Option<IndexEntry>>;

    fn create_index_entry(
        &self,
        collection: &str,
        field: &str,
        index_type: IndexType,
    ) -> EmberResult<IndexEntry>;

    fn drop_index_entry(&self, collection: &str, field: &str) -> EmberResult<()>;

    fn list_index_entries(&self, collection: &str) -> EmberResult<Vec<IndexEntry>>;

    fn is_dirty_index(&self, collection: &str, field: &str) -> EmberResult<bool>;

    fn begin_indexing(&self, collection: &str, field: &str) -> EmberResult<()>;

    fn end_indexing(&self, collection: &str, field: &str) -> EmberResult<()>;
}

#[derive(Clone)]
pub struct IndexCatalog {
    inner: Arc<dyn IndexCatalogProvider>,
}

impl IndexCatalog {
    pub fn new<T: IndexCatalogProvider + 'static>(inner: T) -> Self {
        IndexCatalog { inner: Arc::new(inner) }
    }
}

impl Deref for IndexCatalog {
    type Target = Arc<dyn IndexCatalogProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

struct CatalogRecord {
    entry: IndexEntry,
    dirty: bool,
}

/// Catalog kept in process memory.
#[derive(Default)]
pub struct InMemoryIndexCatalog {
    records: DashMap<(String, String), CatalogRecord>,
}

impl InMemoryIndexCatalog {
    pub fn new() -> Self {
        InMemoryIndexCatalog {
            records: DashMap::new(),
        }
    }

    fn key(collection: &str, field: &str) -> (String, String) {
        (collection.to_string(), field.to_string())
    }

    fn set_dirty(&self, collection: &str, field: &str, dirty: bool) -> EmberResult<()> {
        match self.records.get_mut(&Self::key(collection, field)) {
            Some(mut record) => {
                record.dirty = dirty;
                Ok(())
            }
            None => {
                log::error!("{} is not indexed in {}", field, collection);
                Err(EmberError::new(
                    &format!("{} is not indexed in {}", field, collection),
                    ErrorKind::IndexingError,
                ))
            }
        }
    }
}

impl IndexCatalogProvider for InMemoryIndexCatalog {
    fn has_index_entry(&self, collection: &str, field: &str) -> EmberResult<bool> {
        Ok(self.records.contains_key(&Self::key(collection, field)))
    }

    fn find_index_entry(&self, collection: &str, field: &str) -> EmberResult<Option<IndexEntry>> {
        Ok(self
            .records
            .get(&Self::key(collection, field))
            .map(|record| record.entry.clone()))
    }

    fn create_index_entry(
        &self,
        collection: &str,
        field: &str,
        index_type: IndexType,
    ) -> EmberResult<IndexEntry> {
        let entry = IndexEntry::new(field, index_type, collection);
        match self.records.entry(Self::key(collection, field)) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                log::error!("Index already exists on {} in {}", field, collection);
                Err(EmberError::new(
                    &format!("Index already exists on {} in {}", field, collection),
                    ErrorKind::IndexingError,
                ))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(CatalogRecord {
                    entry: entry.clone(),
                    dirty: false,
                });
                Ok(entry)
            }
        }
    }

    fn drop_index_entry(&self, collection: &str, field: &str) -> EmberResult<()> {
        self.records.remove(&Self::key(collection, field));
        Ok(())
    }

    fn list_index_entries(&self, collection: &str) -> EmberResult<Vec<IndexEntry>> {
        let mut entries: Vec<IndexEntry> = self
            .records
            .iter()
            .filter(|record| record.key().0 == collection)
            .map(|record| record.entry.clone())
            .collect();
        entries.sort_by(|a, b| a.field().cmp(b.field()));
        Ok(entries)
    }

    fn is_dirty_index(&self, collection: &str, field: &str) -> EmberResult<bool> {
        Ok(self
            .records
            .get(&Self::key(collection, field))
            .map(|record| record.dirty)
            .unwrap_or(false))
    }

    fn begin_indexing(&self, collection: &str, field: &str) -> EmberResult<()> {
        self.set_dirty(collection, field, true)
    }

    fn end_indexing(&self, collection: &str, field: &str) -> EmberResult<()> {
        self.set_dirty(collection, field, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_catalog() -> IndexCatalog {
        IndexCatalog::new(InMemoryIndexCatalog::new())
    }

    #[test]
    fn test_create_and_find() {
        let catalog = setup_catalog();
        let entry = catalog.create_index_entry("users", "age", IndexType::NonUnique).unwrap();

        assert!(catalog.has_index_entry("users", "age").unwrap());
        assert_eq!(catalog.find_index_entry("users", "age").unwrap(), Some(entry));
        assert!(!catalog.has_index_entry("orders", "age").unwrap());
    }

    #[test]
    fn test_create_twice_fails() {
        let catalog = setup_catalog();
        catalog.create_index_entry("users", "age", IndexType::Unique).unwrap();
        let err = catalog.create_index_entry("users", "age", IndexType::NonUnique).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexingError);
    }

    #[test]
    fn test_list_is_scoped_and_sorted() {
        let catalog = setup_catalog();
        catalog.create_index_entry("users", "name", IndexType::Fulltext).unwrap();
        catalog.create_index_entry("users", "age", IndexType::Unique).unwrap();
        catalog.create_index_entry("orders", "total", IndexType::NonUnique).unwrap();

        let fields: Vec<String> = catalog
            .list_index_entries("users")
            .unwrap()
            .iter()
            .map(|e| e.field().to_string())
            .collect();
        assert_eq!(fields, vec!["age", "name"]);
    }

    #[test]
    fn test_dirty_marking() {
        let catalog = setup_catalog();
        catalog.create_index_entry("users", "age", IndexType::Unique).unwrap();
        assert!(!catalog.is_dirty_index("users", "age").unwrap());

        catalog.begin_indexing("users", "age").unwrap();
        assert!(catalog.is_dirty_index("users", "age").unwrap());

        catalog.end_indexing("users", "age").unwrap();
        assert!(!catalog.is_dirty_index("users", "age").unwrap());
    }

    #[test]
    fn test_begin_indexing_unknown_field_fails() {
        let catalog = setup_catalog();
        let err = catalog.begin_indexing("users", "missing").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexingError);
    }

    #[test]
    fn test_drop_entry() {
        let catalog = setup_catalog();
        catalog.create_index_entry("users", "age", IndexType::Unique).unwrap();
        catalog.drop_index_entry("users", "age").unwrap();
        assert!(catalog.find_index_entry("users", "age").unwrap().is_none());
        assert!(catalog.list_index_entries("users").unwrap().is_empty());
    }
}
