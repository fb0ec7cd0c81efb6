// doc constants
pub const DOC_REVISION: &str = "_revision";
pub const DOC_MODIFIED: &str = "_modified";
pub const DOC_SOURCE: &str = "_source";
pub const DOC_ID: &str = "_id";
pub const RESERVED_FIELDS: [&str; 4] = [DOC_ID, DOC_REVISION, DOC_MODIFIED, DOC_SOURCE];

// attributes constants
pub const CREATED_TIME: &str = "created_at";
pub const LAST_MODIFIED_TIME: &str = "last_modified_at";
pub const OWNER: &str = "owner";
pub const UNIQUE_ID: &str = "uuid";

// event constants
pub const COLLECTION_EVENT: &str = "collection_event";
pub const LOCAL_ORIGINATOR: &str = "local";

// index map naming
pub const INDEX_PREFIX: &str = "$ember_index";
pub const INTERNAL_NAME_SEPARATOR: &str = "|";

// worker pool
pub const WORKER_QUEUE_CAPACITY: usize = 256;
