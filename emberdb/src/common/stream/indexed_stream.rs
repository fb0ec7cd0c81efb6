use crate::{
    collection::{Document, RecordId},
    errors::EmberResult,
    store::DocumentMap,
};
use std::collections::{btree_set, BTreeSet};

/// Resolves a precomputed id set against the document map, in id order.
///
/// Ids whose document was removed after the set was computed are skipped.
pub(crate) struct IndexedStream {
    ids: btree_set::IntoIter<RecordId>,
    map: DocumentMap,
}

impl IndexedStream {
    pub fn new(ids: BTreeSet<RecordId>, map: DocumentMap) -> Self {
        IndexedStream {
            ids: ids.into_iter(),
            map,
        }
    }
}

impl Iterator for IndexedStream {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.ids.next()?;
            match self.map.get(&id) {
                Ok(Some(document)) => return Some(Ok((id, document))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
