//! In-memory driver for spendlog.
//!
//! Records live in process memory and are shared by every handle the driver
//! opens, so data survives a disconnect/connect cycle. Failure switches let
//! tests drive the error paths of the store. Like the MongoDB driver,
//! operations issued while a handle is still connecting wait for it to settle.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use spendlog_core::{
    Connection, ConnectionState, Driver, NewRecord, Record, RecordChanges, RecordId, RecordKind,
    StoreError, TimeRange,
};

type Collections = BTreeMap<RecordKind, BTreeMap<RecordId, Record>>;

#[derive(Debug, Default)]
struct Faults {
    connect: Option<String>,
    save: Option<String>,
    query: Option<String>,
}

#[derive(Default)]
pub struct InMemoryDriver {
    collections: Arc<RwLock<Collections>>,
    faults: Arc<RwLock<Faults>>,
    opened: Mutex<Vec<String>>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following connection attempt fail with `message`.
    pub fn fail_connections(&self, message: impl Into<String>) {
        write(&self.faults).connect = Some(message.into());
    }

    pub fn allow_connections(&self) {
        write(&self.faults).connect = None;
    }

    /// Makes inserts fail with `message` until cleared with `None`.
    pub fn fail_saves(&self, message: Option<String>) {
        write(&self.faults).save = message;
    }

    /// Makes finds, updates and removes fail with `message` until cleared with `None`.
    pub fn fail_queries(&self, message: Option<String>) {
        write(&self.faults).query = message;
    }

    /// URIs passed to `open`, in call order.
    pub fn opened_uris(&self) -> Vec<String> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn record_count(&self, kind: RecordKind) -> usize {
        read(&self.collections).get(&kind).map_or(0, |c| c.len())
    }

    pub fn get(&self, kind: RecordKind, id: &RecordId) -> Option<Record> {
        read(&self.collections).get(&kind).and_then(|c| c.get(id)).cloned()
    }
}

impl Driver for InMemoryDriver {
    fn open(&self, uri: &str) -> Arc<dyn Connection> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(uri.to_string());
        tracing::debug!(uri, "Opening in-memory connection");
        Arc::new(InMemoryConnection {
            state: watch::Sender::new(ConnectionState::Connecting),
            collections: self.collections.clone(),
            faults: self.faults.clone(),
        })
    }
}

pub struct InMemoryConnection {
    state: watch::Sender<ConnectionState>,
    collections: Arc<RwLock<Collections>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryConnection {
    /// Waits while the handle is connecting, then fails unless it connected.
    async fn ensure_open(&self) -> Result<(), StoreError> {
        let mut state = self.state.subscribe();
        let settled = *state
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map_err(|_| StoreError::NotConnected)?;
        match settled {
            ConnectionState::Connected => Ok(()),
            _ => Err(StoreError::NotConnected),
        }
    }

    async fn ensure_queryable(&self) -> Result<(), StoreError> {
        self.ensure_open().await?;
        match &read(&self.faults).query {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    async fn ready(&self) -> Result<(), StoreError> {
        let failure = read(&self.faults).connect.clone();
        let target = match failure {
            Some(_) => ConnectionState::Disconnected,
            None => ConnectionState::Connected,
        };
        let settled = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = target;
                true
            } else {
                false
            }
        });
        match (settled, failure) {
            (false, _) => Err(StoreError::Connection("connection closed before it was established".to_string())),
            (true, Some(message)) => Err(StoreError::Connection(message)),
            (true, None) => Ok(()),
        }
    }

    fn close(&self) {
        self.state.send_replace(ConnectionState::Disconnected);
    }

    async fn find(&self, kind: RecordKind, range: TimeRange) -> Result<Vec<Record>, StoreError> {
        self.ensure_queryable().await?;
        let collections = read(&self.collections);
        let mut records: Vec<Record> = collections
            .get(&kind)
            .map(|c| c.values().filter(|r| range.contains(r.timestamp)).cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn insert(&self, kind: RecordKind, record: NewRecord) -> Result<RecordId, StoreError> {
        self.ensure_open().await?;
        if let Some(message) = &read(&self.faults).save {
            return Err(StoreError::Backend(message.clone()));
        }
        let id = RecordId::new(Uuid::new_v4().simple().to_string());
        write(&self.collections)
            .entry(kind)
            .or_default()
            .insert(id.clone(), record.into_record(id.clone()));
        tracing::debug!(%kind, %id, "Record inserted");
        Ok(id)
    }

    async fn update(&self, kind: RecordKind, id: &RecordId, changes: &RecordChanges) -> Result<(), StoreError> {
        self.ensure_queryable().await?;
        if let Some(record) = write(&self.collections).get_mut(&kind).and_then(|c| c.get_mut(id)) {
            changes.apply_to(record);
        }
        Ok(())
    }

    async fn remove(&self, kind: RecordKind, id: &RecordId) -> Result<(), StoreError> {
        self.ensure_queryable().await?;
        if let Some(collection) = write(&self.collections).get_mut(&kind) {
            collection.remove(id);
        }
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
