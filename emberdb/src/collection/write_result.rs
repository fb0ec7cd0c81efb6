use crate::collection::RecordId;

/// Ids of the documents an insert, update or remove touched, in the order
/// they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    ids: Vec<RecordId>,
}

impl WriteResult {
    pub fn new(ids: Vec<RecordId>) -> Self {
        Self { ids }
    }

    pub fn affected_ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn affected_count(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn extend(&mut self, other: WriteResult) {
        self.ids.extend(other.ids);
    }
}

impl IntoIterator for WriteResult {
    type Item = RecordId;
    type IntoIter = std::vec::IntoIter<RecordId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}
