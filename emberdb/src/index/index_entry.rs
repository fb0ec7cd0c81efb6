use crate::common::{INDEX_PREFIX, INTERNAL_NAME_SEPARATOR};
use std::fmt::{Display, Formatter};

/// The kinds of secondary index a field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexType {
    /// At most one document per value.
    Unique,
    /// Any number of documents per value.
    NonUnique,
    /// Word index over string values.
    Fulltext,
}

impl Display for IndexType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::Unique => write!(f, "Unique"),
            IndexType::NonUnique => write!(f, "NonUnique"),
            IndexType::Fulltext => write!(f, "Fulltext"),
        }
    }
}

/// Catalog record of one indexed field of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    field: String,
    index_type: IndexType,
    collection_name: String,
}

impl IndexEntry {
    pub fn new(field: &str, index_type: IndexType, collection_name: &str) -> Self {
        IndexEntry {
            field: field.to_string(),
            index_type,
            collection_name: collection_name.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Name of the index map holding this entry's values.
    pub fn index_map_name(&self) -> String {
        let index_type = self.index_type.to_string();
        [
            INDEX_PREFIX,
            self.collection_name.as_str(),
            self.field.as_str(),
            index_type.as_str(),
        ]
        .join(INTERNAL_NAME_SEPARATOR)
    }
}

impl Display for IndexEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}) on {}", self.index_type, self.field, self.collection_name)
    }
}

/// How [crate::collection::DocumentCollection::create_index] builds an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    index_type: IndexType,
    is_async: bool,
}

impl IndexOptions {
    pub fn new(index_type: IndexType) -> Self {
        IndexOptions {
            index_type,
            is_async: false,
        }
    }

    /// Builds the index on the worker pool instead of the calling thread.
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions::new(IndexType::Unique)
    }
}

pub fn unique_index() -> IndexOptions {
    IndexOptions::new(IndexType::Unique)
}

pub fn non_unique_index() -> IndexOptions {
    IndexOptions::new(IndexType::NonUnique)
}

pub fn full_text_index() -> IndexOptions {
    IndexOptions::new(IndexType::Fulltext)
}
