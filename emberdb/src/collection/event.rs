use crate::common::current_time_millis;
use crate::errors::EmberResult;
use crate::Value;
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Kinds of change a collection reports to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionEvents {
    Insert,
    Update,
    Remove,
    IndexStart,
    IndexEnd,
}

/// A change record published by a collection.
///
/// For document events the item is the affected document; for index events it
/// is the indexed field name. An update that carried no fields is reported
/// with no item.
#[derive(Clone)]
pub struct CollectionEventInfo {
    inner: Arc<CollectionEventInner>,
}

struct CollectionEventInner {
    item: Option<Value>,
    event_type: CollectionEvents,
    timestamp: i64,
    originator: String,
}

impl CollectionEventInfo {
    pub fn new(item: Option<Value>, event_type: CollectionEvents, originator: &str) -> Self {
        CollectionEventInfo {
            inner: Arc::new(CollectionEventInner {
                item,
                event_type,
                timestamp: current_time_millis(),
                originator: originator.to_string(),
            }),
        }
    }

    pub fn event_type(&self) -> CollectionEvents {
        self.inner.event_type
    }

    pub fn item(&self) -> Option<&Value> {
        self.inner.item.as_ref()
    }

    pub fn originator(&self) -> &str {
        &self.inner.originator
    }

    /// Milliseconds since the epoch at which the change happened.
    pub fn timestamp(&self) -> i64 {
        self.inner.timestamp
    }
}

impl Debug for CollectionEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEventInfo")
            .field("item", &self.item())
            .field("event_type", &self.event_type())
            .field("timestamp", &self.timestamp())
            .field("originator", &self.originator())
            .finish()
    }
}

pub trait CollectionEventCallback: Send + Sync + Fn(CollectionEventInfo) -> EmberResult<()> {}

impl<F> CollectionEventCallback for F where F: Send + Sync + Fn(CollectionEventInfo) -> EmberResult<()> {}

/// A subscriber to collection events.
#[derive(Clone)]
pub struct CollectionEventListener {
    on_event: Arc<dyn CollectionEventCallback>,
}

impl CollectionEventListener {
    pub fn new(on_event: impl CollectionEventCallback + 'static) -> Self {
        CollectionEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<CollectionEventInfo> for CollectionEventListener {
    fn handle(&self, event: &Event<CollectionEventInfo>) -> Result<(), BasuError> {
        (self.on_event)(event.data.clone()).map_err(|e| BasuError::HandlerError(Error::from(e)))
    }
}

impl Debug for CollectionEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEventListener").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{EmberError, ErrorKind};

    #[test]
    fn test_event_info_accessors() {
        let event = CollectionEventInfo::new(
            Some(Value::from("age")),
            CollectionEvents::IndexStart,
            "local",
        );
        assert_eq!(event.event_type(), CollectionEvents::IndexStart);
        assert_eq!(event.item(), Some(&Value::from("age")));
        assert_eq!(event.originator(), "local");
        assert!(event.timestamp() > 0);
    }

    #[test]
    fn test_listener_handle_ok() {
        let listener = CollectionEventListener::new(|event: CollectionEventInfo| {
            assert_eq!(event.event_type(), CollectionEvents::Insert);
            Ok(())
        });
        let event = Event::new(CollectionEventInfo::new(None, CollectionEvents::Insert, "local"));
        assert!(listener.handle(&event).is_ok());
    }

    #[test]
    fn test_listener_error_becomes_handler_error() {
        let listener = CollectionEventListener::new(|_| {
            Err(EmberError::new("listener failed", ErrorKind::EventError))
        });
        let event = Event::new(CollectionEventInfo::new(None, CollectionEvents::Remove, "local"));
        assert!(matches!(listener.handle(&event), Err(BasuError::HandlerError(_))));
    }

    #[test]
    fn test_debug_output() {
        let event = CollectionEventInfo::new(None, CollectionEvents::Update, "local");
        assert!(format!("{:?}", event).contains("CollectionEventInfo"));
    }
}
