use crate::{
    collection::{Document, RecordId},
    common::{NullOrder, RecordStream, SortOrder},
    errors::{EmberError, EmberResult, ErrorKind},
    Value,
};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use std::cmp::Ordering;

/// Builds the collator used for string keys of a sort.
pub fn build_collator(
    preferences: CollatorPreferences,
    options: CollatorOptions,
) -> EmberResult<CollatorBorrowed<'static>> {
    Collator::try_new(preferences, options).map_err(|e| {
        log::error!("Failed to create collator for sorting: {:?}", e);
        EmberError::new(
            "Failed to create collator for sorting - check collator preferences and options",
            ErrorKind::BackendError,
        )
    })
}

/// Fully ordered view of an upstream stream.
///
/// Sorting is the one stage that consumes its upstream eagerly. Documents
/// with equal keys keep their upstream order in both directions, and
/// documents whose field is null or missing form a separate group placed
/// according to the [NullOrder].
pub(crate) struct SortedStream {
    sorted: std::vec::IntoIter<(RecordId, Document)>,
}

impl SortedStream {
    pub fn new(
        upstream: RecordStream,
        field: &str,
        order: SortOrder,
        collator: Option<&CollatorBorrowed<'_>>,
        null_order: NullOrder,
    ) -> EmberResult<Self> {
        let mut keyed: Vec<(Value, (RecordId, Document))> = Vec::new();
        let mut nulls: Vec<(RecordId, Document)> = Vec::new();

        for item in upstream {
            let (id, document) = item?;
            let value = document.get(field)?;
            match value {
                Value::Null => nulls.push((id, document)),
                Value::Array(_) | Value::Document(_) => {
                    log::error!("Cannot sort on {} holding {} in document {}", field, value, id);
                    return Err(EmberError::new(
                        &format!("Cannot sort on field {} holding an array or a document", field),
                        ErrorKind::ValidationError,
                    ));
                }
                value => keyed.push((value, (id, document))),
            }
        }

        // stable, so ties keep their upstream order
        keyed.sort_by(|(a, _), (b, _)| {
            let ordering = compare_keys(a, b, collator);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        let ordered = keyed.into_iter().map(|(_, entry)| entry);
        let sorted: Vec<(RecordId, Document)> = if null_order.nulls_first(order) {
            nulls.into_iter().chain(ordered).collect()
        } else {
            ordered.chain(nulls).collect()
        };

        Ok(SortedStream {
            sorted: sorted.into_iter(),
        })
    }
}

fn compare_keys(a: &Value, b: &Value, collator: Option<&CollatorBorrowed<'_>>) -> Ordering {
    match (a, b, collator) {
        (Value::String(a), Value::String(b), Some(collator)) => collator.compare(a, b),
        _ => a.cmp(b),
    }
}

impl Iterator for SortedStream {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.sorted.next().map(Ok)
    }
}
