use crate::collection::{Document, RecordId};
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor, DOC_ID};
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::index::IndexLookup;
use crate::Value;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::ops::Deref;
use std::sync::Arc;

use super::{AllFilter, AndFilter, EqualsFilter, NotFilter, OrFilter};

/// Field binding shared by every filter that targets a single field.
///
/// Besides the field name it carries the collection the filter was prepared
/// for and, when the field is indexed, the ids the index returned for the
/// filter. Both are replaced on every preparation so a filter can be reused
/// across queries and collections.
#[doc(hidden)]
pub struct FieldContext {
    field_name: String,
    collection_name: Atomic<Option<String>>,
    index_ids: Atomic<Option<BTreeSet<RecordId>>>,
}

impl FieldContext {
    pub(crate) fn new(field_name: String) -> Self {
        FieldContext {
            field_name,
            collection_name: atomic(None),
            index_ids: atomic(None),
        }
    }

    pub(crate) fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Membership in the index result, when the filter was answered by an index.
    pub(crate) fn indexed_match(&self, id: &RecordId) -> Option<bool> {
        self.index_ids.read_with(|ids| ids.as_ref().map(|ids| ids.contains(id)))
    }
}

/// A predicate over `(record id, document)` pairs.
///
/// Leaf filters that target one field expose a [FieldContext]; the default
/// methods of this trait build the field and index plumbing on top of it, so
/// a leaf only has to describe how it matches a value and which
/// [IndexLookup] answers it.
pub trait FilterProvider: Any + Send + Sync + Display {
    /// Whether the document stored under `id` matches.
    fn apply(&self, id: &RecordId, entry: &Document) -> EmberResult<bool>;

    #[doc(hidden)]
    fn field_context(&self) -> Option<&FieldContext> {
        None
    }

    fn get_collection_name(&self) -> EmberResult<String> {
        match self
            .field_context()
            .and_then(|ctx| ctx.collection_name.read_with(|name| name.clone()))
        {
            Some(name) => Ok(name),
            None => {
                log::error!("Filter {} does not have collection name", self);
                Err(EmberError::new(
                    "Filter does not have collection name",
                    ErrorKind::FilterError,
                ))
            }
        }
    }

    fn set_collection_name(&self, collection_name: String) -> EmberResult<()> {
        if let Some(ctx) = self.field_context() {
            ctx.collection_name.write_with(|name| *name = Some(collection_name));
        }
        Ok(())
    }

    #[inline]
    fn has_field(&self) -> bool {
        self.field_context().is_some()
    }

    fn get_field_name(&self) -> EmberResult<String> {
        match self.field_context() {
            Some(ctx) => Ok(ctx.field_name.clone()),
            None => {
                log::error!("Filter {} does not have field name", self);
                Err(EmberError::new(
                    "Filter does not have field name",
                    ErrorKind::FilterError,
                ))
            }
        }
    }

    /// The question this filter asks an index, if an index can answer it.
    fn index_lookup(&self) -> Option<IndexLookup> {
        None
    }

    /// Stores the ids an index returned for this filter, or clears them when
    /// the filter must be evaluated by scan.
    fn set_index_ids(&self, ids: Option<BTreeSet<RecordId>>) {
        if let Some(ctx) = self.field_context() {
            ctx.index_ids.write_with(|current| *current = ids);
        }
    }

    /// Whether the last preparation answered this filter from an index.
    fn is_field_indexed(&self) -> bool {
        self.field_context()
            .map(|ctx| ctx.index_ids.read_with(|ids| ids.is_some()))
            .unwrap_or(false)
    }

    fn cached_ids(&self) -> Option<BTreeSet<RecordId>> {
        self.field_context()
            .and_then(|ctx| ctx.index_ids.read_with(|ids| ids.clone()))
    }

    fn logical_filters(&self) -> EmberResult<Vec<Filter>> {
        Err(EmberError::new(
            "Filter is not a logical filter",
            ErrorKind::FilterError,
        ))
    }

    fn as_any(&self) -> &dyn Any;
}

/// A query filter for selecting documents from a collection.
///
/// Filters compose with [Filter::and], [Filter::or] and [Filter::not].
///
/// ```rust,ignore
/// use emberdb::filter::field;
///
/// let adults_in_paris = field("age").gte(18).and(field("address.city").eq("Paris"));
/// ```
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter { inner: Arc::new(inner) }
    }

    pub fn and(&self, filter: Filter) -> Self {
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    pub fn not(&self) -> Self {
        Filter::new(NotFilter::new(self.clone()))
    }
}

impl Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Matches every document.
pub fn all() -> Filter {
    Filter::new(AllFilter)
}

/// Matches the document with the given id.
pub fn by_id(id: RecordId) -> Filter {
    Filter::new(EqualsFilter::new(DOC_ID.to_string(), Value::RecordId(id)))
}

pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::new(AndFilter::new(filters))
}

pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::new(OrFilter::new(filters))
}

pub fn not(filter: Filter) -> Filter {
    Filter::new(NotFilter::new(filter))
}

pub(crate) fn is_all_filter(filter: &Filter) -> bool {
    filter.as_any().is::<AllFilter>()
}

pub(crate) fn is_logical_filter(filter: &Filter) -> bool {
    let any = filter.as_any();
    any.is::<AndFilter>() || any.is::<OrFilter>() || any.is::<NotFilter>()
}
