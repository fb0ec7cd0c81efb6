use crate::collection::{Document, RecordId};
use crate::common::{
    BoundedStream, JoinedStream, Lookup, NullOrder, ProjectedStream, RecordStream, SortOrder, SortedStream,
};
use crate::errors::{EmberError, EmberResult, ErrorKind};
use icu_collator::CollatorBorrowed;

/// A lazy, re-iterable sequence of query results.
///
/// Documents are read from the collection only as the cursor advances.
/// Everything read so far is cached, so [DocumentCursor::reset] replays the
/// results without touching the collection again.
///
/// The pipeline methods ([sort](DocumentCursor::sort),
/// [skip_limit](DocumentCursor::skip_limit), [project](DocumentCursor::project)
/// and [join](DocumentCursor::join)) consume the cursor and always restart
/// from its first result.
///
/// ```rust,ignore
/// let page = collection
///     .find(field("age").gt(18))?
///     .sort("name", SortOrder::Ascending, None, NullOrder::Default)?
///     .skip_limit(20, 10)?
///     .to_vec()?;
/// ```
pub struct DocumentCursor {
    underlying: Option<RecordStream>,
    cache: Vec<EmberResult<(RecordId, Document)>>,
    current_index: usize,
}

impl DocumentCursor {
    pub(crate) fn new(stream: RecordStream) -> Self {
        DocumentCursor {
            underlying: Some(stream),
            cache: Vec::new(),
            current_index: 0,
        }
    }

    pub(crate) fn empty() -> Self {
        DocumentCursor::new(Box::new(std::iter::empty()))
    }

    /// Rewinds the cursor to its first result.
    pub fn reset(&mut self) {
        self.current_index = 0;
    }

    /// Number of results; consumes the underlying stream and rewinds.
    pub fn size(&mut self) -> usize {
        if self.underlying.is_some() {
            self.current_index = self.cache.len();
            for _ in self.by_ref() {}
        }
        self.reset();
        self.cache.len()
    }

    pub fn first(&mut self) -> Option<EmberResult<Document>> {
        self.reset();
        self.next()
    }

    /// Every result, failing on the first error.
    pub fn to_vec(&mut self) -> EmberResult<Vec<Document>> {
        self.reset();
        self.by_ref().collect()
    }

    pub fn iter_with_id(&mut self) -> DocumentCursorWithId<'_> {
        DocumentCursorWithId { cursor: self }
    }

    /// Cursors are read-only views.
    pub fn remove(&mut self) -> EmberResult<()> {
        log::error!("Remove on a cursor is not supported");
        Err(EmberError::new(
            "Remove on a cursor is not supported",
            ErrorKind::InvalidOperation,
        ))
    }

    /// Orders the results by `field`.
    ///
    /// String values compare with `collator` when given. Sorting reads the
    /// whole upstream before returning and fails with a validation error if
    /// `field` holds an array or a document in any result.
    pub fn sort(
        self,
        field: &str,
        order: SortOrder,
        collator: Option<&CollatorBorrowed<'_>>,
        null_order: NullOrder,
    ) -> EmberResult<DocumentCursor> {
        let sorted = SortedStream::new(self.into_stream(), field, order, collator, null_order)?;
        Ok(DocumentCursor::new(Box::new(sorted)))
    }

    /// Skips `skip` results and keeps at most `limit` of the rest. Negative
    /// values are a validation error.
    pub fn skip_limit(self, skip: i64, limit: i64) -> EmberResult<DocumentCursor> {
        let bounded = BoundedStream::new(self.into_stream(), skip, limit)?;
        Ok(DocumentCursor::new(Box::new(bounded)))
    }

    /// Keeps only the fields named in `projection`, see [ProjectedStream].
    pub fn project(self, projection: Document) -> EmberResult<DocumentCursor> {
        let projected = ProjectedStream::new(self.into_stream(), projection)?;
        Ok(DocumentCursor::new(Box::new(projected)))
    }

    /// Joins every result with the matching documents of `foreign`.
    pub fn join(self, foreign: DocumentCursor, lookup: Lookup) -> EmberResult<DocumentCursor> {
        let joined = JoinedStream::new(self.into_stream(), foreign, lookup);
        Ok(DocumentCursor::new(Box::new(joined)))
    }

    fn into_stream(self) -> RecordStream {
        Box::new(self.cache.into_iter().chain(self.underlying.into_iter().flatten()))
    }

    fn next_entry(&mut self) -> Option<EmberResult<(RecordId, Document)>> {
        if self.current_index < self.cache.len() {
            let entry = self.cache[self.current_index].clone();
            self.current_index += 1;
            return Some(entry);
        }

        if let Some(ref mut stream) = self.underlying {
            if let Some(entry) = stream.next() {
                self.cache.push(entry.clone());
                self.current_index += 1;
                return Some(entry);
            }
            self.underlying = None;
        }
        None
    }
}

impl Iterator for DocumentCursor {
    type Item = EmberResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().map(|entry| entry.map(|(_, document)| document))
    }
}

/// Iterates `(id, document)` pairs of a [DocumentCursor].
pub struct DocumentCursorWithId<'a> {
    cursor: &'a mut DocumentCursor,
}

impl Iterator for DocumentCursorWithId<'_> {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_entry()
    }
}
