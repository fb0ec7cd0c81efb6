use crate::{
    collection::{Document, RecordId},
    common::{DocumentCursor, RecordStream},
    errors::EmberResult,
    Value,
};
use std::collections::BTreeSet;

/// Describes a join between the documents of a cursor and the documents of
/// a foreign cursor.
///
/// A local document whose `local_field` deep-equals the `foreign_field` of
/// some foreign documents receives those documents, as an array without
/// duplicates, under `target_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub local_field: String,
    pub foreign_field: String,
    pub target_field: String,
}

impl Lookup {
    pub fn new(local_field: &str, foreign_field: &str, target_field: &str) -> Self {
        Lookup {
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            target_field: target_field.to_string(),
        }
    }
}

/// Nested-loop join: every local document rescans the whole foreign cursor.
pub(crate) struct JoinedStream {
    upstream: RecordStream,
    foreign: DocumentCursor,
    lookup: Lookup,
}

impl JoinedStream {
    pub fn new(upstream: RecordStream, foreign: DocumentCursor, lookup: Lookup) -> Self {
        JoinedStream {
            upstream,
            foreign,
            lookup,
        }
    }

    fn join(&mut self, mut local: Document) -> EmberResult<Document> {
        let local_value = local.get(&self.lookup.local_field)?;
        if local_value.is_null() {
            return Ok(local);
        }

        let mut matches = BTreeSet::new();
        self.foreign.reset();
        for foreign in self.foreign.by_ref() {
            let foreign = foreign?;
            let foreign_value = foreign.get(&self.lookup.foreign_field)?;
            if !foreign_value.is_null() && foreign_value == local_value {
                matches.insert(foreign);
            }
        }

        if !matches.is_empty() {
            let joined: Vec<Value> = matches.into_iter().map(Value::Document).collect();
            local.put(self.lookup.target_field.as_str(), Value::Array(joined))?;
        }
        Ok(local)
    }
}

impl Iterator for JoinedStream {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.upstream.next()?;
        Some(item.and_then(|(id, document)| self.join(document).map(|joined| (id, joined))))
    }
}
