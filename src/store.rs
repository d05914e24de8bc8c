use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use tokio::{runtime::Handle, sync::broadcast};

use spendlog_core::{
    Connection, ConnectionState, Credentials, Driver, NewRecord, Record, RecordChanges, RecordId,
    RecordKind, StoreError, TimeRange,
};
use spendlog_mongo::MongoDriver;

use crate::events::{EventEmitter, StoreEvent};

#[derive(Debug, Clone, Deserialize)]
pub struct StoreOptions {
    #[serde(default = "default_connect_on_init")]
    pub connect_on_init: bool,
}

fn default_connect_on_init() -> bool {
    true
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            connect_on_init: default_connect_on_init(),
        }
    }
}

/// Expense and income records behind a single database connection.
///
/// Lifecycle changes are reported through [`LedgerStore::subscribe`]:
/// `connect()` never fails directly, its outcome arrives as a `Connect` or
/// `Error` event. Record operations return their errors to the caller, except
/// `put_*` which does not report save failures at all.
pub struct LedgerStore {
    credentials: Credentials,
    driver: Arc<dyn Driver>,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    events: EventEmitter,
}

impl LedgerStore {
    /// A store backed by MongoDB.
    pub fn new(credentials: Credentials, options: StoreOptions) -> Self {
        Self::with_driver(credentials, options, Arc::new(MongoDriver::new()))
    }

    pub fn with_driver(credentials: Credentials, options: StoreOptions, driver: Arc<dyn Driver>) -> Self {
        let store = Self {
            credentials,
            driver,
            connection: RwLock::new(None),
            events: EventEmitter::new(),
        };
        if options.connect_on_init {
            store.connect();
        }
        store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn connect(&self) {
        let mut slot = self.connection.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = slot.as_ref() {
            if matches!(conn.state(), ConnectionState::Connected | ConnectionState::Connecting) {
                tracing::debug!("connect() ignored, connection already open");
                return;
            }
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.events.emit_error(format!("cannot connect outside an async runtime: {}", e));
                return;
            }
        };

        tracing::debug!(uri = %self.credentials.redacted_uri(), "Connecting");
        let conn = self.driver.open(&self.credentials.connection_uri());
        *slot = Some(conn.clone());
        drop(slot);

        let events = self.events.clone();
        runtime.spawn(async move {
            match conn.ready().await {
                Ok(()) => {
                    tracing::info!("Connected");
                    events.emit(StoreEvent::Connect);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Connection failed");
                    events.emit_error(e);
                }
            }
        });
    }

    /// Closes the connection and emits `Disconnect` without waiting for the
    /// close to be acknowledged.
    pub fn disconnect(&self) {
        let conn = {
            let mut slot = self.connection.write().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(conn) if conn.state() == ConnectionState::Connected => slot.take(),
                _ => None,
            }
        };
        if let Some(conn) = conn {
            conn.close();
            tracing::info!("Disconnected");
            self.events.emit(StoreEvent::Disconnect);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|conn| conn.state() == ConnectionState::Connected)
    }

    fn handle(&self) -> Result<Arc<dyn Connection>, StoreError> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    /// Saves `record` in the background, once a connection still being
    /// opened is ready. Save failures are logged and otherwise dropped; use
    /// [`LedgerStore::insert`] to observe them.
    pub fn put(&self, kind: RecordKind, record: NewRecord) {
        let conn = match self.handle() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(%kind, error = %e, "Record not saved");
                return;
            }
        };
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(%kind, error = %e, "Record not saved");
                return;
            }
        };
        runtime.spawn(async move {
            if let Err(e) = conn.insert(kind, record).await {
                tracing::warn!(%kind, error = %e, "Record not saved");
            }
        });
    }

    pub async fn insert(&self, kind: RecordKind, record: NewRecord) -> Result<RecordId, StoreError> {
        let id = self.handle()?.insert(kind, record).await?;
        tracing::debug!(%kind, %id, "Record saved");
        Ok(id)
    }

    /// Records with `start <= timestamp < end`, newest first.
    pub async fn get(&self, kind: RecordKind, start: i64, end: i64) -> Result<Vec<Record>, StoreError> {
        let records = self.handle()?.find(kind, TimeRange::new(start, end)).await?;
        tracing::debug!(%kind, start, end, count = records.len(), "Range query");
        Ok(records)
    }

    /// Succeeds whether or not a record with `id` existed.
    pub async fn remove(&self, kind: RecordKind, id: &RecordId) -> Result<(), StoreError> {
        self.handle()?.remove(kind, id).await?;
        tracing::debug!(%kind, %id, "Record removed");
        Ok(())
    }

    /// Succeeds whether or not a record with `id` existed.
    pub async fn edit(&self, kind: RecordKind, id: &RecordId, changes: &RecordChanges) -> Result<(), StoreError> {
        self.handle()?.update(kind, id, changes).await?;
        tracing::debug!(%kind, %id, "Record edited");
        Ok(())
    }

    pub fn put_expense(&self, expense: NewRecord) {
        self.put(RecordKind::Expense, expense)
    }

    pub fn put_income(&self, income: NewRecord) {
        self.put(RecordKind::Income, income)
    }

    pub async fn insert_expense(&self, expense: NewRecord) -> Result<RecordId, StoreError> {
        self.insert(RecordKind::Expense, expense).await
    }

    pub async fn insert_income(&self, income: NewRecord) -> Result<RecordId, StoreError> {
        self.insert(RecordKind::Income, income).await
    }

    pub async fn get_expenses(&self, start: i64, end: i64) -> Result<Vec<Record>, StoreError> {
        self.get(RecordKind::Expense, start, end).await
    }

    pub async fn get_income(&self, start: i64, end: i64) -> Result<Vec<Record>, StoreError> {
        self.get(RecordKind::Income, start, end).await
    }

    pub async fn remove_expense(&self, id: &str) -> Result<(), StoreError> {
        self.remove(RecordKind::Expense, &RecordId::from(id)).await
    }

    pub async fn remove_income(&self, id: &str) -> Result<(), StoreError> {
        self.remove(RecordKind::Income, &RecordId::from(id)).await
    }

    pub async fn edit_expense(&self, id: &str, changes: &RecordChanges) -> Result<(), StoreError> {
        self.edit(RecordKind::Expense, &RecordId::from(id), changes).await
    }

    pub async fn edit_income(&self, id: &str, changes: &RecordChanges) -> Result<(), StoreError> {
        self.edit(RecordKind::Income, &RecordId::from(id), changes).await
    }
}

impl Drop for LedgerStore {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            conn.close();
        }
    }
}
