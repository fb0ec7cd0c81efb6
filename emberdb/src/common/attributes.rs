use crate::collection::Document;
use crate::common::{current_time_millis, CREATED_TIME, LAST_MODIFIED_TIME, OWNER, UNIQUE_ID};
use crate::errors::EmberResult;
use crate::Value;
use indexmap::IndexMap;
use std::fmt::Display;
use uuid::Uuid;

/// Free-form metadata kept alongside a collection.
///
/// A fresh set carries the owning collection, the creation time and a random
/// unique id. Keys keep their insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes {
    attributes: IndexMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        let mut attributes = IndexMap::with_capacity(2);
        attributes.insert(CREATED_TIME.to_string(), Value::I64(current_time_millis()));
        attributes.insert(UNIQUE_ID.to_string(), Value::String(Uuid::new_v4().to_string()));
        Attributes { attributes }
    }

    pub fn new_for_collection(collection: &str) -> Self {
        let mut attributes = Attributes::new();
        attributes.put(OWNER, Value::String(collection.to_string()));
        attributes
    }

    pub fn from_document(document: &Document) -> Self {
        let attributes = document
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        Attributes { attributes }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    #[inline]
    pub fn put(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    #[inline]
    pub fn has_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Stamps the last modified time with the current wall clock.
    pub fn touch(&mut self) {
        self.put(LAST_MODIFIED_TIME, Value::I64(current_time_millis()));
    }

    pub fn to_document(&self) -> EmberResult<Document> {
        let mut document = Document::new();
        for (key, value) in self.attributes.iter() {
            document.put(key, value.clone())?;
        }
        Ok(document)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl Display for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, (key, value)) in self.attributes.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}
