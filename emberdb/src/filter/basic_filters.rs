use std::{any::Any, fmt::Display};

use crate::{
    collection::{Document, RecordId},
    errors::EmberResult,
    index::IndexLookup,
    Value,
};

use super::{FieldContext, FilterProvider};

/// Tests `value` and, for an array, each of its elements. An index on an
/// array field holds every element, so a scan has to see them too.
#[inline]
pub(crate) fn any_element(value: &Value, predicate: impl Fn(&Value) -> bool) -> bool {
    if predicate(value) {
        return true;
    }
    match value {
        Value::Array(items) => items.iter().any(predicate),
        _ => false,
    }
}

/// Matches every document.
pub(crate) struct AllFilter;

impl FilterProvider for AllFilter {
    fn apply(&self, _id: &RecordId, _entry: &Document) -> EmberResult<bool> {
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllFilter")
    }
}

/// Matches documents whose field equals a value. A null value matches
/// documents where the field is missing or null.
pub(crate) struct EqualsFilter {
    context: FieldContext,
    value: Value,
}

impl EqualsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, value: Value) -> Self {
        EqualsFilter {
            context: FieldContext::new(field_name),
            value,
        }
    }
}

impl Display for EqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.context.field_name(), self.value)
    }
}

impl FilterProvider for EqualsFilter {
    fn apply(&self, id: &RecordId, entry: &Document) -> EmberResult<bool> {
        if let Some(matched) = self.context.indexed_match(id) {
            return Ok(matched);
        }
        let value = entry.get(self.context.field_name())?;
        Ok(any_element(&value, |v| v == &self.value))
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn index_lookup(&self) -> Option<IndexLookup> {
        if self.value.is_null() {
            None
        } else {
            Some(IndexLookup::Eq(self.value.clone()))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches documents whose field differs from a value. Always evaluated by
/// scan.
pub(crate) struct NotEqualsFilter {
    context: FieldContext,
    value: Value,
}

impl NotEqualsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, value: Value) -> Self {
        NotEqualsFilter {
            context: FieldContext::new(field_name),
            value,
        }
    }
}

impl Display for NotEqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} != {})", self.context.field_name(), self.value)
    }
}

impl FilterProvider for NotEqualsFilter {
    fn apply(&self, _id: &RecordId, entry: &Document) -> EmberResult<bool> {
        let value = entry.get(self.context.field_name())?;
        Ok(!any_element(&value, |v| v == &self.value))
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches documents whose field holds one of the given values.
pub(crate) struct InFilter {
    context: FieldContext,
    values: Vec<Value>,
}

impl InFilter {
    #[inline]
    pub(crate) fn new(field_name: String, values: Vec<Value>) -> Self {
        InFilter {
            context: FieldContext::new(field_name),
            values,
        }
    }
}

impl Display for InFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} in {})", self.context.field_name(), Value::Array(self.values.clone()))
    }
}

impl FilterProvider for InFilter {
    fn apply(&self, id: &RecordId, entry: &Document) -> EmberResult<bool> {
        if let Some(matched) = self.context.indexed_match(id) {
            return Ok(matched);
        }
        let value = entry.get(self.context.field_name())?;
        Ok(any_element(&value, |v| self.values.contains(v)))
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn index_lookup(&self) -> Option<IndexLookup> {
        Some(IndexLookup::In(self.values.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches documents whose field holds none of the given values. Always
/// evaluated by scan, since documents without the field match as well.
pub(crate) struct NotInFilter {
    context: FieldContext,
    values: Vec<Value>,
}

impl NotInFilter {
    #[inline]
    pub(crate) fn new(field_name: String, values: Vec<Value>) -> Self {
        NotInFilter {
            context: FieldContext::new(field_name),
            values,
        }
    }
}

impl Display for NotInFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} not in {})", self.context.field_name(), Value::Array(self.values.clone()))
    }
}

impl FilterProvider for NotInFilter {
    fn apply(&self, _id: &RecordId, entry: &Document) -> EmberResult<bool> {
        let value = entry.get(self.context.field_name())?;
        Ok(!any_element(&value, |v| self.values.contains(v)))
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
