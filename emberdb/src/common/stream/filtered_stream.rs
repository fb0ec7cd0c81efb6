use crate::{
    collection::{Document, RecordId},
    common::RecordStream,
    errors::EmberResult,
    filter::Filter,
};

/// Passes through the upstream entries the filter accepts.
pub(crate) struct FilteredStream {
    upstream: RecordStream,
    filter: Filter,
}

impl FilteredStream {
    pub fn new(upstream: RecordStream, filter: Filter) -> Self {
        FilteredStream { upstream, filter }
    }
}

impl Iterator for FilteredStream {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.upstream.next()? {
                Ok((id, document)) => match self.filter.apply(&id, &document) {
                    Ok(true) => return Some(Ok((id, document))),
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::{EmberError, ErrorKind};
    use crate::filter::field;

    fn entry(id: u64, value: &str) -> EmberResult<(RecordId, Document)> {
        Ok((RecordId::create_id(id), doc! { field1: value }))
    }

    #[test]
    fn test_only_matching_entries_pass() {
        let items = vec![entry(1, "value"), entry(2, "other"), entry(3, "value")];
        let stream = FilteredStream::new(Box::new(items.into_iter()), field("field1").eq("value"));
        let ids: Vec<u64> = stream.map(|item| item.unwrap().0.id_value()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_no_match() {
        let items = vec![entry(1, "other")];
        let mut stream = FilteredStream::new(Box::new(items.into_iter()), field("field1").eq("value"));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_upstream_error_is_forwarded() {
        let items = vec![
            Err(EmberError::new("broken", ErrorKind::BackendError)),
            entry(2, "value"),
        ];
        let mut stream = FilteredStream::new(Box::new(items.into_iter()), field("field1").eq("value"));
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().unwrap().is_ok());
    }

    #[test]
    fn test_filter_error_is_forwarded() {
        let items = vec![entry(1, "value")];
        let mut stream = FilteredStream::new(Box::new(items.into_iter()), field("field1").text("value"));
        let err = stream.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FilterError);
    }
}
