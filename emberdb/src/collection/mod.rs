//! Collections and the documents they hold.
//!
//! A [Document] is an ordered map from field names to [crate::Value]s.
//! Embedded documents are addressed with the field separator, `"."` by
//! default:
//!
//! ```rust,ignore
//! use emberdb::doc;
//!
//! let mut document = doc! { name: "Alice", address: { city: "Oslo" } };
//! assert_eq!(document.get("address.city")?, Value::from("Oslo"));
//! document.put("address.zip", "0150")?;
//! ```
//!
//! A [DocumentCollection] stores documents under their [RecordId] and keeps
//! its secondary indexes in step with every insert, update and remove.
//!
//! # Reserved fields
//!
//! - `_id` - the record id, assigned on insert when missing
//! - `_revision` - starts at 1 and grows with every update and remove
//! - `_modified` - last modification time in milliseconds since the epoch
//! - `_source` - marks a replicated write; such writes keep their revision

mod collection_factory;
mod document;
mod document_collection;
mod event;
mod find_options;
pub(crate) mod operation;
mod record_id;
mod update_options;
mod write_result;

pub(crate) use collection_factory::*;
pub use document::*;
pub use document_collection::*;
pub use event::*;
pub use find_options::*;
pub(crate) use record_id::IdGenerator;
pub use record_id::RecordId;
pub use update_options::*;
pub use write_result::*;
