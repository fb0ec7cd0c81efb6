use crate::collection::{CollectionEventInfo, CollectionEventListener};
use crate::common::COLLECTION_EVENT;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, HandlerId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Something listeners can subscribe to.
pub trait EventAware {
    fn subscribe(&self, listener: CollectionEventListener) -> EmberResult<Option<SubscriberRef>>;

    fn unsubscribe(&self, subscriber: SubscriberRef) -> EmberResult<()>;
}

/// Ticket returned by a subscription, needed to unsubscribe.
#[derive(Debug)]
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

/// Delivers [CollectionEventInfo]s to registered listeners.
///
/// Publishing only enqueues the event; a dedicated dispatcher thread hands
/// events to the listeners in publish order. The dispatcher is started with
/// the first subscription, so a bus nobody listens to costs nothing and
/// publishing to it is a no-op.
#[derive(Clone)]
pub struct CollectionEventBus {
    inner: Arc<CollectionEventBusInner>,
}

impl Default for CollectionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionEventBus {
    pub fn new() -> Self {
        CollectionEventBus {
            inner: Arc::new(CollectionEventBusInner::new()),
        }
    }

    pub fn register(&self, listener: CollectionEventListener) -> EmberResult<Option<SubscriberRef>> {
        self.inner.register(listener)
    }

    pub fn deregister(&self, subscriber: SubscriberRef) -> EmberResult<()> {
        self.inner.deregister(subscriber)
    }

    /// Queues an event for delivery. Never blocks on listeners.
    pub fn publish(&self, event: CollectionEventInfo) -> EmberResult<()> {
        self.inner.publish(event)
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }

    /// Drops all listeners and stops the dispatcher once queued events are
    /// delivered.
    pub fn close(&self) -> EmberResult<()> {
        self.inner.close()
    }
}

struct CollectionEventBusInner {
    event_bus: Arc<EventBus<CollectionEventInfo>>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

struct Dispatcher {
    sender: Sender<CollectionEventInfo>,
    handle: JoinHandle<()>,
}

impl CollectionEventBusInner {
    fn new() -> Self {
        CollectionEventBusInner {
            event_bus: Arc::new(EventBus::new()),
            dispatcher: Mutex::new(None),
        }
    }

    fn register(&self, listener: CollectionEventListener) -> EmberResult<Option<SubscriberRef>> {
        self.ensure_dispatcher()?;
        match self.event_bus.subscribe(COLLECTION_EVENT, Box::new(listener)) {
            Ok(handler_id) => Ok(Some(SubscriberRef::new(handler_id))),
            Err(e) => Err(to_ember_error(e)),
        }
    }

    fn deregister(&self, subscriber: SubscriberRef) -> EmberResult<()> {
        self.event_bus
            .unsubscribe(COLLECTION_EVENT, &subscriber.inner)
            .map_err(to_ember_error)
    }

    fn publish(&self, event: CollectionEventInfo) -> EmberResult<()> {
        if !self.has_listeners() {
            return Ok(());
        }

        let guard = self.dispatcher.lock();
        match guard.as_ref() {
            Some(dispatcher) => dispatcher.sender.send(event).map_err(|_| {
                log::error!("Event dispatcher has stopped");
                EmberError::new("Event dispatcher has stopped", ErrorKind::EventError)
            }),
            None => Ok(()),
        }
    }

    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(COLLECTION_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to count event listeners: {}", e);
                false
            }
        }
    }

    fn close(&self) -> EmberResult<()> {
        let dispatcher = self.dispatcher.lock().take();
        if let Some(Dispatcher { sender, handle }) = dispatcher {
            // the dispatcher loop ends once the queue is drained
            drop(sender);
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                log::warn!("Event dispatcher terminated abnormally");
            }
        }
        self.event_bus.clear().map_err(to_ember_error)
    }

    fn ensure_dispatcher(&self) -> EmberResult<()> {
        let mut guard = self.dispatcher.lock();
        if guard.is_some() {
            return Ok(());
        }

        let (sender, receiver) = unbounded();
        let event_bus = self.event_bus.clone();
        let handle = std::thread::Builder::new()
            .name("ember-event-dispatcher".to_string())
            .spawn(move || dispatch(event_bus, receiver))
            .map_err(|e| {
                log::error!("Failed to start event dispatcher: {}", e);
                EmberError::new(
                    &format!("Failed to start event dispatcher: {}", e),
                    ErrorKind::EventError,
                )
            })?;

        *guard = Some(Dispatcher { sender, handle });
        Ok(())
    }
}

fn dispatch(event_bus: Arc<EventBus<CollectionEventInfo>>, receiver: Receiver<CollectionEventInfo>) {
    while let Ok(event) = receiver.recv() {
        let event_type = event.event_type();
        match event_bus.publish(COLLECTION_EVENT, &Event::new(event)) {
            Ok(_) | Err(BasuError::EventTypeNotFOUND) => {}
            Err(e) => log::error!("Failed to deliver {:?} event: {}", event_type, to_ember_error(e)),
        }
    }
}

fn to_ember_error(e: BasuError) -> EmberError {
    match e {
        BasuError::EventTypeNotFOUND => EmberError::new(
            "No listener is registered for collection events",
            ErrorKind::EventError,
        ),
        BasuError::MutexPoisoned => EmberError::new(
            "Event bus lock is poisoned",
            ErrorKind::EventError,
        ),
        BasuError::HandlerError(e) => EmberError::new(
            &format!("Event listener failed: {}", e),
            ErrorKind::EventError,
        ),
    }
}

impl Drop for CollectionEventBusInner {
    fn drop(&mut self) {
        if let Some(Dispatcher { sender, .. }) = self.dispatcher.lock().take() {
            drop(sender);
        }
    }
}
