use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    write::{NewRecord, RecordChanges},
    Record, RecordId, RecordKind, TimeRange,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not connected")]
    NotConnected,
    #[error("{0}")]
    Connection(String),
    #[error("invalid record id: {0}")]
    InvalidId(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("{0}")]
    Backend(String),
    #[error("{0}")]
    Other(String),
}

/// Driver-reported state of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
    Connecting = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Opens connection handles from a URI.
pub trait Driver: Send + Sync {
    /// Returns a handle in the `Connecting` state. Establishment is driven by
    /// [`Connection::ready`].
    fn open(&self, uri: &str) -> Arc<dyn Connection>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Resolves once the handle is usable, or with the reason it never will be.
    async fn ready(&self) -> Result<(), StoreError>;

    /// Starts closing the handle. Does not wait for the server to acknowledge.
    fn close(&self);

    /// Records with a timestamp inside `range`, newest first.
    async fn find(&self, kind: RecordKind, range: TimeRange) -> Result<Vec<Record>, StoreError>;
    async fn insert(&self, kind: RecordKind, record: NewRecord) -> Result<RecordId, StoreError>;
    async fn update(&self, kind: RecordKind, id: &RecordId, changes: &RecordChanges) -> Result<(), StoreError>;
    async fn remove(&self, kind: RecordKind, id: &RecordId) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_codes() {
        assert_eq!(ConnectionState::Connected.code(), 1);
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connected,
            ConnectionState::Connecting,
            ConnectionState::Disconnecting,
        ] {
            assert_eq!(ConnectionState::from_code(state.code()), state);
        }
        assert_eq!(ConnectionState::from_code(42), ConnectionState::Disconnected);
    }

    #[test]
    fn test_error_messages_are_preserved() {
        assert_eq!(StoreError::Connection("connection refused".to_string()).to_string(), "connection refused");
        assert_eq!(StoreError::InvalidId("xyz".to_string()).to_string(), "invalid record id: xyz");
    }
}
