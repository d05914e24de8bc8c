//! Core types and traits for spendlog database drivers.
//!
//! This crate provides the `Driver` and `Connection` traits and the record
//! model they exchange, enabling pluggable drivers in separate crates.

pub mod credentials;
pub mod driver;
pub mod models;

// Re-export key types at crate root for convenience
pub use credentials::{Credentials, DEFAULT_PORT};
pub use driver::{Connection, ConnectionState, Driver, StoreError};
pub use models::{PublicRecord, Record, RecordId, RecordKind, TimeRange};
pub use models::write::{NewRecord, RecordChanges};
