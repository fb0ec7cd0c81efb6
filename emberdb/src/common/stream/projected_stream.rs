use crate::{
    collection::{Document, RecordId},
    common::RecordStream,
    errors::{EmberError, EmberResult, ErrorKind},
    Value,
};

/// Keeps only the fields named by a projection template.
///
/// Template values are either null, keeping the field as it is, or a
/// nested template applied to an embedded document. Fields missing from a
/// document are left out of its projection.
pub(crate) struct ProjectedStream {
    upstream: RecordStream,
    projection: Document,
}

impl ProjectedStream {
    pub fn new(upstream: RecordStream, projection: Document) -> EmberResult<Self> {
        validate_projection(&projection)?;
        Ok(ProjectedStream { upstream, projection })
    }
}

fn validate_projection(projection: &Document) -> EmberResult<()> {
    for (key, value) in projection.iter() {
        match value {
            Value::Null => {}
            Value::Document(nested) => validate_projection(nested)?,
            other => {
                log::error!("Projection value of {} must be null or a document, found {}", key, other);
                return Err(EmberError::new(
                    &format!("Projection value of {} must be null or a document, found {}", key, other),
                    ErrorKind::ValidationError,
                ));
            }
        }
    }
    Ok(())
}

fn project(original: &Document, projection: &Document) -> EmberResult<Document> {
    let mut projected = Document::new();
    for (key, template) in projection.iter() {
        if !original.contains_key(key) && !original.contains_field(key) {
            continue;
        }

        let value = original.get(key)?;
        match (template, value) {
            (Value::Document(nested), Value::Document(embedded)) if !nested.is_empty() => {
                projected.put(key.as_str(), project(&embedded, nested)?)?;
            }
            (_, value) => projected.put(key.as_str(), value)?,
        }
    }
    Ok(projected)
}

impl Iterator for ProjectedStream {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.upstream.next()?;
        Some(item.and_then(|(id, document)| {
            project(&document, &self.projection).map(|projected| (id, projected))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn stream_of(documents: Vec<Document>) -> RecordStream {
        let items: Vec<EmberResult<(RecordId, Document)>> = documents
            .into_iter()
            .enumerate()
            .map(|(i, d)| Ok((RecordId::create_id(i as u64), d)))
            .collect();
        Box::new(items.into_iter())
    }

    #[test]
    fn test_whitelists_fields() {
        let source = doc! { name: "Alice", age: 30, city: "Paris" };
        let projection = doc! { name: (), age: () };
        let projected: Vec<Document> = ProjectedStream::new(stream_of(vec![source]), projection)
            .unwrap()
            .map(|item| item.unwrap().1)
            .collect();
        assert_eq!(projected, vec![doc! { name: "Alice", age: 30 }]);
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let projection = doc! { name: (), missing: () };
        let projected = ProjectedStream::new(stream_of(vec![doc! { name: "Bob" }]), projection)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .1;
        assert_eq!(projected, doc! { name: "Bob" });
    }

    #[test]
    fn test_nested_template() {
        let source = doc! {
            name: "Alice",
            address: { city: "Paris", zip: "75001", street: "Rue" }
        };
        let projection = doc! { address: { city: (), zip: () } };
        let projected = ProjectedStream::new(stream_of(vec![source]), projection)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .1;
        assert_eq!(projected, doc! { address: { city: "Paris", zip: "75001" } });
    }

    #[test]
    fn test_dotted_template_key() {
        let source = doc! { address: { city: "Paris", zip: "75001" } };
        let mut projection = Document::new();
        projection.put("address.city", Value::Null).unwrap();
        let projected = ProjectedStream::new(stream_of(vec![source]), projection)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .1;
        assert_eq!(projected, doc! { address: { city: "Paris" } });
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let err = ProjectedStream::new(stream_of(vec![]), doc! { name: 1 }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = ProjectedStream::new(stream_of(vec![]), doc! { a: { b: "x" } }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
