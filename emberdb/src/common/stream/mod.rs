//! Lazy document streams composed into a [DocumentCursor].

use crate::collection::{Document, RecordId};
use crate::errors::EmberResult;

mod bounded_stream;
mod document_cursor;
mod filtered_stream;
mod indexed_stream;
mod joined_stream;
mod projected_stream;
mod sorted_stream;

pub(crate) use bounded_stream::*;
pub use document_cursor::*;
pub(crate) use filtered_stream::*;
pub(crate) use indexed_stream::*;
pub use joined_stream::Lookup;
pub(crate) use joined_stream::JoinedStream;
pub(crate) use projected_stream::*;
pub use sorted_stream::build_collator;
pub(crate) use sorted_stream::SortedStream;

/// A fallible stream of `(id, document)` pairs.
pub type RecordStream = Box<dyn Iterator<Item = EmberResult<(RecordId, Document)>> + Send>;
