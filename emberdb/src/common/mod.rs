//! Shared building blocks: values, sort options, locks, events, attributes,
//! the lazy document streams behind cursors and small utilities.

mod attributes;
mod constants;
mod event_bus;
mod lock;
mod sort_order;
mod stream;
mod util;
mod value;

pub use attributes::*;
pub use constants::*;
pub use event_bus::*;
pub use lock::*;
pub use sort_order::*;
pub use stream::*;
pub use util::*;
pub use value::*;
