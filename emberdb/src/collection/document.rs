use im::OrdMap;
use smallvec::SmallVec;

use crate::collection::record_id::RecordId;
use crate::common::{ReadExecutor, Value, DOC_ID, DOC_MODIFIED, DOC_REVISION, DOC_SOURCE, RESERVED_FIELDS};
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::FIELD_SEPARATOR;
use itertools::Itertools;
use std::borrow::Cow;
use std::fmt::{Debug, Display};

type FieldVec = SmallVec<[String; 8]>;

/// An ordered set of named [Value]s, the unit of storage of a collection.
///
/// Keys containing the field separator (`.`) address embedded documents, so
/// `doc.get("address.city")` reads `city` from the nested `address` document.
/// A numeric segment addresses an array element (`"tags.0"`), and a non
/// numeric segment applied to an array collects that field from every element.
///
/// The reserved fields are:
///
/// * `_id` - the [RecordId] of the document, assigned on insert when absent.
/// * `_revision` - starts at 1 on insert and grows on every update and remove.
/// * `_modified` - last modification time in milliseconds since the epoch.
/// * `_source` - marks a replicated write; such writes keep their revision.
///
/// The backing map is a persistent `im::OrdMap`, so cloning a document is cheap
/// and every clone is independent of the original.
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document { data: OrdMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Puts a value under `key`, creating embedded documents for dotted keys.
    ///
    /// `_id` only accepts a [RecordId].
    pub fn put<'a, T: Into<Value>>(&mut self, key: impl Into<Cow<'a, str>>, value: T) -> EmberResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(EmberError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let value = value.into();
        if key == DOC_ID && !value.is_record_id() {
            log::error!("Document id must be a record id, found {}", value);
            return Err(EmberError::new(
                &format!("Document id must be a record id, found {}", value),
                ErrorKind::InvalidId,
            ));
        }

        if self.is_embedded(&key) {
            let splits: Vec<String> = FIELD_SEPARATOR.read_with(|sep| key.split(sep.as_str()).map(String::from).collect());
            self.deep_put(&splits, value)
        } else {
            self.data = self.data.update(key.to_string(), value);
            Ok(())
        }
    }

    /// Reads the value under `key`; missing fields read as [Value::Null].
    pub fn get(&self, key: &str) -> EmberResult<Value> {
        match self.data.get(key) {
            Some(value) => Ok(value.clone()),
            None if self.is_embedded(key) => self.get_by_embedded_key(key),
            None => Ok(Value::Null),
        }
    }

    /// Returns the record id, assigning a fresh one when the document has none.
    pub fn id(&mut self) -> EmberResult<RecordId> {
        if let Some(Value::RecordId(id)) = self.data.get(DOC_ID) {
            return Ok(*id);
        }

        let id = RecordId::new();
        self.data = self.data.update(DOC_ID.to_string(), Value::RecordId(id));
        Ok(id)
    }

    pub fn has_id(&self) -> bool {
        matches!(self.data.get(DOC_ID), Some(Value::RecordId(_)))
    }

    /// The record id if one is present, without assigning one.
    pub fn record_id(&self) -> Option<RecordId> {
        self.data.get(DOC_ID).and_then(|v| v.as_record_id().copied())
    }

    /// Removes `key`; removing the last field of an embedded document removes
    /// the embedded document too.
    pub fn remove(&mut self, key: &str) -> EmberResult<()> {
        if self.is_embedded(key) {
            let splits: Vec<String> = FIELD_SEPARATOR.read_with(|sep| key.split(sep.as_str()).map(String::from).collect());
            self.deep_remove(&splits)
        } else {
            self.data = self.data.without(key);
            Ok(())
        }
    }

    /// Copies every field of `other` into this document. Embedded documents
    /// present on both sides are merged recursively.
    pub fn merge(&mut self, other: &Document) -> EmberResult<()> {
        for (key, value) in other.data.iter() {
            match (value, self.data.get(key).cloned()) {
                (Value::Document(patch), Some(Value::Document(mut existing))) => {
                    existing.merge(patch)?;
                    self.data = self.data.update(key.clone(), Value::Document(existing));
                }
                _ => {
                    self.data = self.data.update(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Like [Document::contains_key] but also sees embedded fields such as `a.b`.
    pub fn contains_field(&self, field: &str) -> bool {
        if self.contains_key(field) {
            return true;
        }
        self.fields().iter().any(|f| f == field)
    }

    /// All non reserved leaf fields, embedded ones in dotted form.
    pub fn fields(&self) -> FieldVec {
        self.collect_fields("")
    }

    pub fn revision(&self) -> i64 {
        self.data
            .get(DOC_REVISION)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    pub fn source(&self) -> String {
        match self.data.get(DOC_SOURCE) {
            Some(Value::String(source)) => source.clone(),
            _ => String::new(),
        }
    }

    pub fn last_modified_since_epoch(&self) -> i64 {
        self.data
            .get(DOC_MODIFIED)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    fn is_embedded(&self, key: &str) -> bool {
        FIELD_SEPARATOR.read_with(|sep| key.contains(sep.as_str()))
    }

    fn collect_fields(&self, prefix: &str) -> FieldVec {
        let mut fields = FieldVec::new();
        let separator = FIELD_SEPARATOR.read_with(|s| s.clone());

        for (key, value) in self.data.iter() {
            if key.is_empty() || RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }

            let field = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", prefix, separator, key)
            };

            match value {
                Value::Document(doc) => fields.extend(doc.collect_fields(&field)),
                _ => fields.push(field),
            }
        }
        fields
    }

    fn deep_put(&mut self, splits: &[String], value: Value) -> EmberResult<()> {
        let Some(key) = splits.first() else {
            log::error!("Empty embedded key");
            return Err(EmberError::new("Empty embedded key", ErrorKind::ValidationError));
        };

        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(EmberError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        if splits.len() == 1 {
            self.data = self.data.update(key.clone(), value);
            return Ok(());
        }

        let mut nested = match self.data.get(key) {
            Some(Value::Document(doc)) => doc.clone(),
            _ => Document::new(),
        };
        nested.deep_put(&splits[1..], value)?;
        self.data = self.data.update(key.clone(), Value::Document(nested));
        Ok(())
    }

    fn deep_remove(&mut self, splits: &[String]) -> EmberResult<()> {
        let Some(key) = splits.first() else {
            log::error!("Empty embedded key");
            return Err(EmberError::new("Empty embedded key", ErrorKind::ValidationError));
        };

        if splits.len() == 1 {
            self.data = self.data.without(key.as_str());
            return Ok(());
        }

        if let Some(Value::Document(doc)) = self.data.get(key) {
            let mut nested = doc.clone();
            nested.deep_remove(&splits[1..])?;
            if nested.is_empty() {
                self.data = self.data.without(key.as_str());
            } else {
                self.data = self.data.update(key.clone(), Value::Document(nested));
            }
        }
        Ok(())
    }

    fn get_by_embedded_key(&self, key: &str) -> EmberResult<Value> {
        let splits: Vec<String> = FIELD_SEPARATOR.read_with(|sep| key.split(sep.as_str()).map(String::from).collect());
        let Some(first) = splits.first() else {
            return Ok(Value::Null);
        };

        if first.is_empty() {
            log::error!("Document does not support empty key");
            return Err(EmberError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        Self::recursive_get(self.data.get(first), &splits[1..])
    }

    fn recursive_get(value: Option<&Value>, splits: &[String]) -> EmberResult<Value> {
        let Some(value) = value else {
            return Ok(Value::Null);
        };

        let Some(key) = splits.first() else {
            return Ok(value.clone());
        };

        match value {
            Value::Document(doc) => Self::recursive_get(doc.data.get(key), &splits[1..]),
            Value::Array(items) => match key.parse::<usize>() {
                Ok(index) => {
                    if index >= items.len() {
                        log::error!("Array index {} out of bound", index);
                        return Err(EmberError::new(
                            &format!("Array index {} out of bound", index),
                            ErrorKind::ValidationError,
                        ));
                    }
                    Self::recursive_get(Some(&items[index]), &splits[1..])
                }
                // a named segment over an array reads that field from every element
                Err(_) => {
                    let mut collected = Vec::with_capacity(items.len());
                    for item in items {
                        match Self::recursive_get(Some(item), splits)? {
                            Value::Array(nested) => collected.extend(nested),
                            Value::Null => {}
                            other => collected.push(other),
                        }
                    }
                    Ok(Value::Array(collected.into_iter().unique().collect()))
                }
            },
            _ => Ok(Value::Null),
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[doc(hidden)]
pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Builds a [Document] with a JSON like syntax.
///
/// ```rust,ignore
/// let doc = doc!{
///     name: "Alice",
///     age: (20 + 10),
///     address: { city: "Paris" },
///     tags: ["a", "b"]
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_up() -> Document {
        doc! {
            score: 1034,
            location: {
                state: "NY",
                address: {
                    line1: "40",
                    zip: 10001
                }
            },
            category: ["food", "produce"],
            items: [{ name: "a", qty: 1 }, { name: "b", qty: 2 }]
        }
    }

    #[test]
    fn test_get_top_level_and_embedded() {
        let doc = set_up();
        assert_eq!(doc.get("score").unwrap(), Value::from(1034));
        assert_eq!(doc.get("location.state").unwrap(), Value::from("NY"));
        assert_eq!(doc.get("location.address.zip").unwrap(), Value::from(10001));
        assert_eq!(doc.get("missing").unwrap(), Value::Null);
        assert_eq!(doc.get("location.missing.deep").unwrap(), Value::Null);
    }

    #[test]
    fn test_get_array_index_and_decompose() {
        let doc = set_up();
        assert_eq!(doc.get("category.1").unwrap(), Value::from("produce"));
        assert_eq!(
            doc.get("items.name").unwrap(),
            Value::from_vec(vec!["a", "b"])
        );
        let err = doc.get("category.5").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_put_embedded_creates_nested_documents() {
        let mut doc = Document::new();
        doc.put("a.b.c", 1).unwrap();
        assert!(doc.get("a").unwrap().is_document());
        assert_eq!(doc.get("a.b.c").unwrap(), Value::from(1));
    }

    #[test]
    fn test_put_rejects_empty_key_and_bad_id() {
        let mut doc = Document::new();
        assert_eq!(doc.put("", 1).unwrap_err().kind(), &ErrorKind::InvalidOperation);
        assert_eq!(doc.put(DOC_ID, "x").unwrap_err().kind(), &ErrorKind::InvalidId);
        assert!(doc.put(DOC_ID, RecordId::create_id(5)).is_ok());
        assert_eq!(doc.record_id(), Some(RecordId::create_id(5)));
    }

    #[test]
    fn test_id_is_assigned_lazily_once() {
        let mut doc = doc! { name: "x" };
        assert!(!doc.has_id());
        let first = doc.id().unwrap();
        let second = doc.id().unwrap();
        assert!(doc.has_id());
        assert_eq!(first, second);
    }

    #[test]
    fn test_remove_embedded_cleans_empty_parent() {
        let mut doc = doc! { a: { b: 1 }, c: 2 };
        doc.remove("a.b").unwrap();
        assert!(!doc.contains_key("a"));
        doc.remove("c").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_merge_is_recursive() {
        let mut doc = doc! { a: { b: 1, c: 2 }, d: 3 };
        let patch = doc! { a: { b: 10 }, e: 5 };
        doc.merge(&patch).unwrap();
        assert_eq!(doc.get("a.b").unwrap(), Value::from(10));
        assert_eq!(doc.get("a.c").unwrap(), Value::from(2));
        assert_eq!(doc.get("e").unwrap(), Value::from(5));
    }

    #[test]
    fn test_fields_skip_reserved() {
        let mut doc = doc! { a: { b: 1 }, c: 2 };
        doc.id().unwrap();
        doc.put(DOC_REVISION, 1).unwrap();
        let fields = doc.fields();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains(&"a.b".to_string()));
        assert!(doc.contains_field("a.b"));
        assert!(!doc.contains_field("a.x"));
    }

    #[test]
    fn test_metadata_accessors() {
        let mut doc = Document::new();
        assert_eq!(doc.revision(), 0);
        assert_eq!(doc.source(), "");
        doc.put(DOC_REVISION, 3).unwrap();
        doc.put(DOC_SOURCE, "replica").unwrap();
        doc.put(DOC_MODIFIED, 1000i64).unwrap();
        assert_eq!(doc.revision(), 3);
        assert_eq!(doc.source(), "replica");
        assert_eq!(doc.last_modified_since_epoch(), 1000);
    }

    #[test]
    fn test_equality_and_clone_independence() {
        let doc = set_up();
        let mut copy = doc.clone();
        assert_eq!(doc, copy);
        copy.put("score", 1).unwrap();
        assert_ne!(doc, copy);
        assert_eq!(doc.get("score").unwrap(), Value::from(1034));
    }

    #[test]
    fn test_display() {
        let doc = doc! { a: 1 };
        assert_eq!(doc.to_string(), "{\"a\": 1}");
    }
}
