//! Storage of collection documents.
//!
//! The engine talks to storage through [DocumentMapProvider]. An in-memory
//! implementation backed by a skip list is provided in [memory].

mod document_map;
pub mod memory;

pub use document_map::*;
pub use memory::*;
