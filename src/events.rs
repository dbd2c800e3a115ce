//! Notification channel for connection lifecycle events.
//!
//! The transport publishes [`TransportEvent`] values from its worker thread.
//! Observers are plain callbacks; [`EventHub::subscribe`] adapts the registry
//! into a crossbeam receiver for callers that prefer polling.

use std::{fmt, sync::Arc};

use crossbeam_channel::{Receiver, unbounded};
use log::{info, warn};
use parking_lot::RwLock;

/// Asynchronous notification emitted by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The encrypted stream is established.
    Connected { message: String },
    /// A network failure or buffering condition occurred.
    Error { description: String },
}

impl TransportEvent {
    pub fn connected(message: impl Into<String>) -> Self {
        Self::Connected {
            message: message.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self::Error {
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { message } => write!(f, "connect: {message}"),
            Self::Error { description } => write!(f, "error: {description}"),
        }
    }
}

/// Callback invoked for every published event.
pub type Observer = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// Registry of observers shared between the facade and the worker.
#[derive(Clone, Default)]
pub struct EventHub {
    observers: Arc<RwLock<Vec<Observer>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for all subsequent events.
    pub fn on_event<F>(&self, observer: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// Register a channel observer and return its receiving end.
    ///
    /// Events are dropped silently once the receiver goes away.
    pub fn subscribe(&self) -> Receiver<TransportEvent> {
        let (tx, rx) = unbounded();
        self.on_event(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Deliver `event` to every observer in registration order.
    pub fn emit(&self, event: TransportEvent) {
        match &event {
            TransportEvent::Connected { message } => info!("loggly transport {message}"),
            TransportEvent::Error { description } => warn!("loggly transport error: {description}"),
        }
        let observers = self.observers.read().clone();
        for observer in observers {
            observer(&event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emits_to_every_observer() {
        let hub = EventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            hub.on_event(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        hub.emit(TransportEvent::connected("connected to example:6514"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribe_receives_events_in_order() {
        let hub = EventHub::new();
        let rx = hub.subscribe();
        hub.emit(TransportEvent::error("refused"));
        hub.emit(TransportEvent::connected("connected to example:6514"));
        assert_eq!(rx.try_recv(), Ok(TransportEvent::error("refused")));
        assert_eq!(
            rx.try_recv(),
            Ok(TransportEvent::connected("connected to example:6514"))
        );
    }

    #[test]
    fn dropped_subscriber_does_not_break_emission() {
        let hub = EventHub::new();
        drop(hub.subscribe());
        hub.emit(TransportEvent::error("still fine"));
        assert_eq!(hub.observer_count(), 1);
    }
}
