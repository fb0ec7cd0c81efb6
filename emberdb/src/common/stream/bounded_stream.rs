use crate::{
    collection::{Document, RecordId},
    common::RecordStream,
    errors::{EmberError, EmberResult, ErrorKind},
};

/// Skips `skip` upstream entries, then yields at most `limit` of the rest.
pub(crate) struct BoundedStream {
    upstream: RecordStream,
    to_skip: u64,
    remaining: u64,
}

impl BoundedStream {
    pub fn new(upstream: RecordStream, skip: i64, limit: i64) -> EmberResult<Self> {
        if skip < 0 {
            log::error!("Skip value {} cannot be negative", skip);
            return Err(EmberError::new(
                &format!("Skip value {} cannot be negative", skip),
                ErrorKind::ValidationError,
            ));
        }
        if limit < 0 {
            log::error!("Limit value {} cannot be negative", limit);
            return Err(EmberError::new(
                &format!("Limit value {} cannot be negative", limit),
                ErrorKind::ValidationError,
            ));
        }

        Ok(BoundedStream {
            upstream,
            to_skip: skip as u64,
            remaining: limit as u64,
        })
    }
}

impl Iterator for BoundedStream {
    type Item = EmberResult<(RecordId, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.to_skip > 0 {
            self.to_skip -= 1;
            if let Err(e) = self.upstream.next()? {
                return Some(Err(e));
            }
        }

        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.upstream.next()
    }
}
