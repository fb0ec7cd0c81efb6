use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::{atomic, Atomic};

/// Error kinds raised by the collection engine.
///
/// Each kind names a category of failure so callers can react to it without
/// parsing messages.
///
/// ```rust,ignore
/// use emberdb::errors::{EmberError, ErrorKind, EmberResult};
///
/// fn example() -> EmberResult<()> {
///     Err(EmberError::new("name is not indexed", ErrorKind::IndexingError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Invalid input: negative skip/limit, unsortable values, bad index values.
    ValidationError,
    /// Index lifecycle failure: duplicate index, concurrent rebuild, missing indexer.
    IndexingError,
    /// A duplicate record id or a duplicate value on a unique index.
    UniqueConstraintViolation,
    /// The operation is not valid in the current state.
    InvalidOperation,
    /// The document carries no record id.
    NotIdentifiable,
    /// The provided id value is not a record id.
    InvalidId,
    /// A filter could not be constructed or evaluated.
    FilterError,
    /// Event dispatch failure.
    EventError,
    /// Failure reported by a storage backend.
    BackendError,
    /// Generic IO error.
    IOError,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::NotIdentifiable => write!(f, "Not identifiable"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The error type of the engine.
///
/// `EmberError` carries a message, an [ErrorKind], an optional cause and the
/// backtrace captured where it was created.
///
/// ```rust,ignore
/// let cause = EmberError::new("duplicate value 42 for field age", ErrorKind::UniqueConstraintViolation);
/// let err = EmberError::new_with_cause("failed to rebuild index age", ErrorKind::IndexingError, cause);
/// ```
#[derive(Clone)]
pub struct EmberError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<EmberError>>,
    backtrace: Atomic<Backtrace>,
}

impl EmberError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        EmberError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates an error that keeps `cause` as its source.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: EmberError) -> Self {
        EmberError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&EmberError> {
        self.cause.as_deref()
    }
}

impl Display for EmberError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for EmberError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for EmberError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, EmberError>`.
pub type EmberResult<T> = Result<T, EmberError>;

impl From<std::io::Error> for EmberError {
    fn from(err: std::io::Error) -> Self {
        EmberError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::fmt::Error> for EmberError {
    fn from(err: std::fmt::Error) -> Self {
        EmberError::new(&format!("Formatting error: {}", err), ErrorKind::InternalError)
    }
}

impl From<String> for EmberError {
    fn from(msg: String) -> Self {
        EmberError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for EmberError {
    fn from(msg: &str) -> Self {
        EmberError::new(msg, ErrorKind::InternalError)
    }
}
