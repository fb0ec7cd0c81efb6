use crate::collection::RecordId;
use crate::errors::EmberResult;
use crate::index::{IndexMap, IndexType};
use crate::Value;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// A question an index-aware filter asks an index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLookup {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    /// Full-text search term: a word, `prefix*`, `*suffix` or `*infix*`.
    Text(String),
}

impl Display for IndexLookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexLookup::Eq(v) => write!(f, "== {}", v),
            IndexLookup::Gt(v) => write!(f, "> {}", v),
            IndexLookup::Gte(v) => write!(f, ">= {}", v),
            IndexLookup::Lt(v) => write!(f, "< {}", v),
            IndexLookup::Lte(v) => write!(f, "<= {}", v),
            IndexLookup::In(values) => write!(f, "in {}", Value::Array(values.clone())),
            IndexLookup::Text(term) => write!(f, "text {}", term),
        }
    }
}

/// Maintains and queries one kind of index.
///
/// The engine resolves the [IndexMap] of an index entry and hands it to the
/// indexer together with the field name, so one indexer instance serves
/// every index of its type.
pub trait IndexerProvider: Send + Sync {
    fn index_type(&self) -> IndexType;

    /// Rejects values this kind of index cannot hold.
    fn validate_value(&self, field: &str, value: &Value) -> EmberResult<()>;

    fn write_index(&self, index_map: &IndexMap, id: RecordId, field: &str, value: &Value) -> EmberResult<()>;

    fn remove_index(&self, index_map: &IndexMap, id: RecordId, field: &str, value: &Value) -> EmberResult<()>;

    /// Replaces the contribution of `old_value` with `new_value`. A null
    /// `old_value` means the document did not carry the field before.
    fn update_index(
        &self,
        index_map: &IndexMap,
        id: RecordId,
        field: &str,
        new_value: &Value,
        old_value: &Value,
    ) -> EmberResult<()> {
        if !old_value.is_null() {
            self.remove_index(index_map, id, field, old_value)?;
        }
        self.write_index(index_map, id, field, new_value)
    }

    /// Empties the index structure of `field`.
    fn drop_index(&self, index_map: &IndexMap, field: &str) -> EmberResult<()>;

    /// Whether [IndexerProvider::find_by_filter] can answer `lookup`.
    fn supports(&self, lookup: &IndexLookup) -> bool;

    fn find_by_filter(
        &self,
        index_map: &IndexMap,
        field: &str,
        lookup: &IndexLookup,
    ) -> EmberResult<BTreeSet<RecordId>>;
}

#[derive(Clone)]
pub struct Indexer {
    inner: Arc<dyn IndexerProvider>,
}

impl Indexer {
    pub fn new<T: IndexerProvider + 'static>(inner: T) -> Self {
        Indexer { inner: Arc::new(inner) }
    }
}

impl Deref for Indexer {
    type Target = Arc<dyn IndexerProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
