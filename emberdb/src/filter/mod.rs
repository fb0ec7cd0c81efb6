//! Query filters.
//!
//! A [Filter] is a predicate tree over `(record id, document)` pairs. Leaf
//! filters target one field and may be answered by that field's index once
//! the collection prepared them; `and`, `or` and `not` combine filters.
//!
//! ```rust,ignore
//! use emberdb::filter::{all, and, field};
//!
//! let everything = all();
//! let filter = and(vec![field("age").gte(18), field("name").text_regex("^A")]);
//! let filter = field("status").eq("active").or(field("role").in_array(vec!["admin"]));
//! ```
//!
//! | builder | index lookup |
//! |---------|--------------|
//! | `eq`, `gt`, `gte`, `lt`, `lte`, `in_array` | unique and non-unique indexes |
//! | `text` | full-text indexes (required) |
//! | `ne`, `not_in`, `text_regex` | none, evaluated by scan |

mod filter;
mod fluent;

mod basic_filters;
mod logical_filters;
mod pattern_filters;
mod range_filters;

pub(crate) use basic_filters::*;
pub use filter::*;
pub use fluent::*;
pub(crate) use logical_filters::*;
pub(crate) use pattern_filters::*;
pub(crate) use range_filters::*;
