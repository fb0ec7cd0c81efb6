mod collection_operations;
mod index_operations;
mod read_operations;
mod write_operations;

pub(crate) use collection_operations::*;
pub(crate) use index_operations::IndexStates;
