//! # emberdb
//!
//! The collection operation engine of an embedded document store.
//!
//! A collection is a named set of [Document]s keyed by a [RecordId]. The engine
//! keeps secondary indexes consistent with the document map while documents are
//! inserted, updated and removed, prepares filters so that queries can be
//! answered from an index, and exposes lazy cursors that sort, paginate,
//! project and join documents on demand.
//!
//! ```rust,ignore
//! use emberdb::collection::DocumentCollection;
//! use emberdb::engine_config::EngineConfig;
//! use emberdb::filter::field;
//! use emberdb::index::non_unique_index;
//! use emberdb::{doc, NullOrder, SortOrder};
//!
//! let collection = DocumentCollection::open("users", EngineConfig::default())?;
//! collection.insert(doc! { name: "Alice", age: 30 })?;
//! collection.create_index("age", &non_unique_index())?;
//!
//! let cursor = collection.find(field("age").gt(20))?;
//! for doc in cursor.sort("name", SortOrder::Ascending, None, NullOrder::Default)? {
//!     println!("{}", doc?);
//! }
//! ```

#![allow(dead_code, clippy::approx_constant)]

use crate::collection::IdGenerator;
use crate::common::*;
use std::sync::LazyLock;
use std::thread::available_parallelism;

pub mod collection;
pub mod common;
pub mod engine_config;
pub mod errors;
pub mod filter;
pub mod index;
pub mod store;

pub use crate::collection::{Document, RecordId};
pub use crate::common::{NullOrder, SortOrder, Value};

pub(crate) static FIELD_SEPARATOR: LazyLock<Atomic<String>> =
    LazyLock::new(|| atomic(".".to_string()));
pub(crate) static ID_GENERATOR: LazyLock<IdGenerator> = LazyLock::new(IdGenerator::new);

pub fn get_cpu_count() -> usize {
    available_parallelism()
        .map(|p| p.get())
        .unwrap_or_else(|err| {
            log::warn!("Failed to detect available parallelism: {}. Defaulting to single thread.", err);
            1
        })
}
