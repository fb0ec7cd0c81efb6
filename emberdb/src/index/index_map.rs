use crate::collection::RecordId;
use crate::common::{atomic, Atomic, ReadExecutor, Value, WriteExecutor};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

/// Ordered mapping from an indexed value to the ids of the documents that
/// carry it.
///
/// Empty buckets are never kept, so every key present has at least one id.
#[derive(Clone)]
pub struct IndexMap {
    inner: Arc<IndexMapInner>,
}

struct IndexMapInner {
    name: String,
    entries: Atomic<BTreeMap<Value, BTreeSet<RecordId>>>,
}

impl IndexMap {
    pub fn new(name: &str) -> Self {
        IndexMap {
            inner: Arc::new(IndexMapInner {
                name: name.to_string(),
                entries: atomic(BTreeMap::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn get(&self, key: &Value) -> Option<BTreeSet<RecordId>> {
        self.inner.entries.read_with(|entries| entries.get(key).cloned())
    }

    /// Adds `id` to the bucket of `key`, returning the ids that were already
    /// there.
    pub fn add(&self, key: Value, id: RecordId) -> BTreeSet<RecordId> {
        self.inner.entries.write_with(|entries| {
            let bucket = entries.entry(key).or_default();
            let existing = bucket.clone();
            bucket.insert(id);
            existing
        })
    }

    /// Removes `id` from the bucket of `key`. Returns whether it was present.
    pub fn remove(&self, key: &Value, id: &RecordId) -> bool {
        self.inner.entries.write_with(|entries| {
            let Some(bucket) = entries.get_mut(key) else {
                return false;
            };
            let removed = bucket.remove(id);
            if bucket.is_empty() {
                entries.remove(key);
            }
            removed
        })
    }

    /// Union of the buckets whose key lies in `range` and satisfies `accept`.
    pub fn ids_in_range<R>(&self, range: R, accept: impl Fn(&Value) -> bool) -> BTreeSet<RecordId>
    where
        R: RangeBounds<Value>,
    {
        let bounds: (Bound<&Value>, Bound<&Value>) = (range.start_bound(), range.end_bound());
        self.inner.entries.read_with(|entries| {
            entries
                .range::<Value, _>(bounds)
                .filter(|(key, _)| accept(key))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect()
        })
    }

    /// Union of the buckets whose key satisfies `accept`.
    pub fn ids_matching(&self, accept: impl Fn(&Value) -> bool) -> BTreeSet<RecordId> {
        self.inner.entries.read_with(|entries| {
            entries
                .iter()
                .filter(|(key, _)| accept(key))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect()
        })
    }

    pub fn keys(&self) -> Vec<Value> {
        self.inner.entries.read_with(|entries| entries.keys().cloned().collect())
    }

    pub fn clear(&self) {
        self.inner.entries.write_with(|entries| entries.clear());
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read_with(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for IndexMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner.entries.read_with(|entries| {
            f.debug_struct("IndexMap")
                .field("name", &self.inner.name)
                .field("entries", entries)
                .finish()
        })
    }
}

/// Holds every [IndexMap] of an engine, by name.
#[derive(Clone, Default)]
pub struct IndexStore {
    maps: Arc<DashMap<String, IndexMap>>,
}

impl IndexStore {
    pub fn new() -> Self {
        IndexStore {
            maps: Arc::new(DashMap::new()),
        }
    }

    pub fn open_index_map(&self, name: &str) -> IndexMap {
        self.maps
            .entry(name.to_string())
            .or_insert_with(|| IndexMap::new(name))
            .clone()
    }

    pub fn has_index_map(&self, name: &str) -> bool {
        self.maps.contains_key(name)
    }

    pub fn remove_index_map(&self, name: &str) {
        if let Some((_, map)) = self.maps.remove(name) {
            map.clear();
        }
    }
}
