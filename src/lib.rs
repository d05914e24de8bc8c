//! Expense and income records in a document database.

pub mod config;
pub mod events;
pub mod logging;
pub mod store;

pub use spendlog_core::{
    Connection, ConnectionState, Credentials, Driver, NewRecord, PublicRecord, Record,
    RecordChanges, RecordId, RecordKind, StoreError, TimeRange, DEFAULT_PORT,
};
pub use events::{ErrorValue, StoreEvent};
pub use store::{LedgerStore, StoreOptions};
