//! Secondary indexes of a collection.
//!
//! An index maps the values of one field to the ids of the documents carrying
//! them. The [IndexCatalog] records which fields are indexed and whether each
//! index is trustworthy, the [IndexStore] holds the index maps themselves, and
//! an [Indexer] of the matching [IndexType] maintains and queries them.
//!
//! # Index Types
//!
//! - **Unique**: at most one document per value
//! - **NonUnique**: any number of documents per value
//! - **Fulltext**: word index over string values, searched with `text` filters
//!
//! ```rust,ignore
//! use emberdb::index::{unique_index, full_text_index};
//!
//! collection.create_index("email", &unique_index())?;
//! collection.create_index("bio", &full_text_index().with_async(true))?;
//! ```

mod comparable_indexer;
mod index_catalog;
mod index_entry;
mod index_map;
mod indexer;
mod text_indexer;
mod tokenizer;

pub use comparable_indexer::*;
pub use index_catalog::*;
pub use index_entry::*;
pub use index_map::*;
pub use indexer::*;
pub use text_indexer::*;
pub use tokenizer::*;
