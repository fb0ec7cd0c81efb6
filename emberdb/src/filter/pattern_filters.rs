use regex::Regex;
use std::{any::Any, fmt::Display, sync::OnceLock};

use crate::{
    collection::{Document, RecordId},
    errors::{EmberError, EmberResult, ErrorKind},
    index::IndexLookup,
    Value,
};

use super::{FieldContext, FilterProvider};

/// Full-text search on a field.
///
/// A text filter is answered by the field's full-text index only; applying
/// it to a collection without such an index is a filter error.
pub(crate) struct TextFilter {
    context: FieldContext,
    term: String,
}

impl TextFilter {
    #[inline]
    pub(crate) fn new(field_name: String, term: String) -> Self {
        TextFilter {
            context: FieldContext::new(field_name),
            term,
        }
    }
}

impl Display for TextFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} like {})", self.context.field_name(), self.term)
    }
}

impl FilterProvider for TextFilter {
    fn apply(&self, id: &RecordId, _entry: &Document) -> EmberResult<bool> {
        match self.context.indexed_match(id) {
            Some(matched) => Ok(matched),
            None => {
                log::error!("{} is not full-text indexed", self.context.field_name());
                Err(EmberError::new(
                    &format!("{} is not full-text indexed", self.context.field_name()),
                    ErrorKind::FilterError,
                ))
            }
        }
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn index_lookup(&self) -> Option<IndexLookup> {
        Some(IndexLookup::Text(self.term.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches string fields (or string elements of array fields) against a
/// regular expression. Always evaluated by scan.
pub(crate) struct RegexFilter {
    context: FieldContext,
    source: String,
    pattern: OnceLock<Regex>,
}

impl RegexFilter {
    /// An invalid pattern is logged here and reported when the filter is applied.
    #[inline]
    pub(crate) fn new(field_name: String, source: String) -> Self {
        let pattern = OnceLock::new();
        match Regex::new(&source) {
            Ok(regex) => {
                let _ = pattern.set(regex);
            }
            Err(e) => {
                log::error!("Invalid regex pattern '{}': {}", source, e);
            }
        }

        RegexFilter {
            context: FieldContext::new(field_name),
            source,
            pattern,
        }
    }
}

impl Display for RegexFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} =~ {})", self.context.field_name(), self.source)
    }
}

impl FilterProvider for RegexFilter {
    fn apply(&self, _id: &RecordId, entry: &Document) -> EmberResult<bool> {
        let Some(pattern) = self.pattern.get() else {
            log::error!("Invalid regex pattern for filter {}", self);
            return Err(EmberError::new(
                &format!("Invalid regex pattern {}", self.source),
                ErrorKind::FilterError,
            ));
        };

        let matched = match entry.get(self.context.field_name())? {
            Value::String(text) => pattern.is_match(&text),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_string())
                .any(|text| pattern.is_match(text)),
            _ => false,
        };
        Ok(matched)
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
