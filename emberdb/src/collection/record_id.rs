use crate::common::current_time_millis;
use crate::ID_GENERATOR;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};

/// The primary key of a document inside a collection.
///
/// Ids are totally ordered. They are either taken from the `_id` field of a
/// document or drawn from a process-wide, monotonically increasing counter.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordId {
    id_value: u64,
}

impl RecordId {
    /// Draws the next id from the counter.
    pub fn new() -> Self {
        RecordId {
            id_value: ID_GENERATOR.next_id(),
        }
    }

    /// Wraps a caller supplied id value.
    pub fn create_id(id_value: u64) -> RecordId {
        RecordId { id_value }
    }

    pub fn id_value(&self) -> u64 {
        self.id_value
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::new()
    }
}

impl Debug for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.id_value)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.id_value)
    }
}

/// Monotonic id counter.
///
/// The counter starts at the current wall clock time in milliseconds shifted
/// left by 20 bits, so ids from a later process start above the ids of an
/// earlier one as long as fewer than a million ids were drawn per millisecond.
pub(crate) struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub(crate) fn new() -> Self {
        let seed = (current_time_millis().max(0) as u64) << 20;
        IdGenerator {
            counter: AtomicU64::new(seed),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}
