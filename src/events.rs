//! Connection lifecycle notifications.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use spendlog_core::StoreError;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum StoreEvent {
    Connect,
    Disconnect,
    Error(Arc<StoreError>),
}

/// Anything that can be reported on the error path. Plain messages are
/// wrapped into a `StoreError` before they are emitted.
#[derive(Debug)]
pub enum ErrorValue {
    Error(StoreError),
    Message(String),
}

impl ErrorValue {
    pub fn into_error(self) -> StoreError {
        match self {
            ErrorValue::Error(e) => e,
            ErrorValue::Message(message) => StoreError::Other(message),
        }
    }
}

impl From<StoreError> for ErrorValue {
    fn from(value: StoreError) -> Self {
        ErrorValue::Error(value)
    }
}

impl From<String> for ErrorValue {
    fn from(value: String) -> Self {
        ErrorValue::Message(value)
    }
}

impl From<&str> for ErrorValue {
    fn from(value: &str) -> Self {
        ErrorValue::Message(value.to_string())
    }
}

/// Broadcast channel owned by a store.
///
/// The receiver created alongside the channel is handed to the first
/// subscriber, so events emitted before anyone subscribed (for example by a
/// connect during construction) are not lost. Later subscribers only see
/// events emitted after they subscribed.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<StoreEvent>,
    first: Arc<Mutex<Option<broadcast::Receiver<StoreEvent>>>>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        let (sender, receiver) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            first: Arc::new(Mutex::new(Some(receiver))),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        let first = self.first.lock().unwrap_or_else(PoisonError::into_inner).take();
        first.unwrap_or_else(|| self.sender.subscribe())
    }

    pub fn emit(&self, event: StoreEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn emit_error(&self, value: impl Into<ErrorValue>) {
        self.emit(StoreEvent::Error(Arc::new(value.into().into_error())));
    }
}
