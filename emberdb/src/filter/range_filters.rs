use std::{any::Any, cmp::Ordering, fmt::Display};

use crate::{
    collection::{Document, RecordId},
    errors::EmberResult,
    index::IndexLookup,
    Value,
};

use super::{any_element, FieldContext, FilterProvider};

/// Relational operator of a [ComparisonFilter].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComparisonOp {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
}

impl ComparisonOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Greater => ordering == Ordering::Greater,
            ComparisonOp::GreaterEqual => ordering != Ordering::Less,
            ComparisonOp::Lesser => ordering == Ordering::Less,
            ComparisonOp::LesserEqual => ordering != Ordering::Greater,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::Lesser => "<",
            ComparisonOp::LesserEqual => "<=",
        }
    }
}

/// Matches documents whose field compares to a value under an operator.
///
/// Only values of the same kind are compared: `age > 10` never matches a
/// string `age`, and all numeric variants count as one kind.
pub(crate) struct ComparisonFilter {
    context: FieldContext,
    value: Value,
    op: ComparisonOp,
}

impl ComparisonFilter {
    #[inline]
    pub(crate) fn new(field_name: String, value: Value, op: ComparisonOp) -> Self {
        ComparisonFilter {
            context: FieldContext::new(field_name),
            value,
            op,
        }
    }
}

impl Display for ComparisonFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.context.field_name(), self.op.symbol(), self.value)
    }
}

impl FilterProvider for ComparisonFilter {
    fn apply(&self, id: &RecordId, entry: &Document) -> EmberResult<bool> {
        if let Some(matched) = self.context.indexed_match(id) {
            return Ok(matched);
        }
        let value = entry.get(self.context.field_name())?;
        Ok(any_element(&value, |v| {
            v.is_same_kind(&self.value) && self.op.accepts(v.cmp(&self.value))
        }))
    }

    fn field_context(&self) -> Option<&FieldContext> {
        Some(&self.context)
    }

    fn index_lookup(&self) -> Option<IndexLookup> {
        let value = self.value.clone();
        Some(match self.op {
            ComparisonOp::Greater => IndexLookup::Gt(value),
            ComparisonOp::GreaterEqual => IndexLookup::Gte(value),
            ComparisonOp::Lesser => IndexLookup::Lt(value),
            ComparisonOp::LesserEqual => IndexLookup::Lte(value),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
