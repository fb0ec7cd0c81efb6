use crate::collection::RecordId;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::index::{IndexLookup, IndexMap, IndexType, IndexerProvider};
use crate::Value;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Included, Unbounded};

/// Indexes comparable scalar values, optionally enforcing uniqueness.
///
/// Array values are indexed element by element, so a document with
/// `tags: ["a", "b"]` is found under both `"a"` and `"b"`.
#[derive(Debug, Clone, Copy)]
pub struct ComparableIndexer {
    unique: bool,
}

impl ComparableIndexer {
    pub fn unique() -> Self {
        ComparableIndexer { unique: true }
    }

    pub fn non_unique() -> Self {
        ComparableIndexer { unique: false }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    fn index_keys(value: &Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().unique().collect(),
            other => vec![other.clone()],
        }
    }
}

impl IndexerProvider for ComparableIndexer {
    fn index_type(&self) -> IndexType {
        if self.unique {
            IndexType::Unique
        } else {
            IndexType::NonUnique
        }
    }

    fn validate_value(&self, field: &str, value: &Value) -> EmberResult<()> {
        match value {
            Value::Null => {
                log::error!("Cannot index null value of field {}", field);
                Err(EmberError::new(
                    &format!("Cannot index null value of field {}", field),
                    ErrorKind::ValidationError,
                ))
            }
            Value::Array(items) => {
                for item in items {
                    if item.is_array() || !item.is_comparable() {
                        log::error!("Field {} holds an array with a non comparable element {}", field, item);
                        return Err(EmberError::new(
                            &format!("Field {} holds an array with a non comparable element {}", field, item),
                            ErrorKind::ValidationError,
                        ));
                    }
                }
                Ok(())
            }
            other if !other.is_comparable() => {
                log::error!("Field {} holds a non comparable value {}", field, other);
                Err(EmberError::new(
                    &format!("Field {} holds a non comparable value {}", field, other),
                    ErrorKind::ValidationError,
                ))
            }
            _ => Ok(()),
        }
    }

    fn write_index(&self, index_map: &IndexMap, id: RecordId, field: &str, value: &Value) -> EmberResult<()> {
        self.validate_value(field, value)?;
        let keys = Self::index_keys(value);

        if self.unique {
            for key in keys.iter() {
                let taken = index_map
                    .get(key)
                    .map(|ids| ids.iter().any(|other| *other != id))
                    .unwrap_or(false);
                if taken {
                    log::error!("Unique constraint violated for {} = {} in {}", field, key, index_map.name());
                    return Err(EmberError::new(
                        &format!("Unique constraint violated for {} = {}", field, key),
                        ErrorKind::UniqueConstraintViolation,
                    ));
                }
            }
        }

        for key in keys {
            index_map.add(key, id);
        }
        Ok(())
    }

    fn remove_index(&self, index_map: &IndexMap, id: RecordId, field: &str, value: &Value) -> EmberResult<()> {
        self.validate_value(field, value)?;
        for key in Self::index_keys(value) {
            index_map.remove(&key, &id);
        }
        Ok(())
    }

    fn drop_index(&self, index_map: &IndexMap, _field: &str) -> EmberResult<()> {
        index_map.clear();
        Ok(())
    }

    fn supports(&self, lookup: &IndexLookup) -> bool {
        match lookup {
            IndexLookup::Eq(v)
            | IndexLookup::Gt(v)
            | IndexLookup::Gte(v)
            | IndexLookup::Lt(v)
            | IndexLookup::Lte(v) => !v.is_null() && v.is_comparable(),
            IndexLookup::In(values) => values.iter().all(|v| !v.is_null() && v.is_comparable()),
            IndexLookup::Text(_) => false,
        }
    }

    fn find_by_filter(
        &self,
        index_map: &IndexMap,
        field: &str,
        lookup: &IndexLookup,
    ) -> EmberResult<BTreeSet<RecordId>> {
        let ids = match lookup {
            IndexLookup::Eq(v) => index_map.get(v).unwrap_or_default(),
            IndexLookup::Gt(v) => index_map.ids_in_range((Excluded(v.clone()), Unbounded), |k| k.is_same_kind(v)),
            IndexLookup::Gte(v) => index_map.ids_in_range((Included(v.clone()), Unbounded), |k| k.is_same_kind(v)),
            IndexLookup::Lt(v) => index_map.ids_in_range((Unbounded, Excluded(v.clone())), |k| k.is_same_kind(v)),
            IndexLookup::Lte(v) => index_map.ids_in_range((Unbounded, Included(v.clone())), |k| k.is_same_kind(v)),
            IndexLookup::In(values) => values
                .iter()
                .filter_map(|v| index_map.get(v))
                .flatten()
                .collect(),
            IndexLookup::Text(_) => {
                log::error!("{} index on {} cannot answer a text search", self.index_type(), field);
                return Err(EmberError::new(
                    &format!("{} index on {} cannot answer a text search", self.index_type(), field),
                    ErrorKind::FilterError,
                ));
            }
        };
        Ok(ids)
    }
}
