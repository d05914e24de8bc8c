//! MongoDB driver for spendlog.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    Client, Collection, Database,
};
use tokio::sync::watch;

use spendlog_core::{
    Connection, ConnectionState, Driver, NewRecord, Record, RecordChanges, RecordId, RecordKind,
    StoreError, TimeRange,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct MongoDriver;

impl MongoDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for MongoDriver {
    fn open(&self, uri: &str) -> Arc<dyn Connection> {
        Arc::new(MongoConnection::new(uri))
    }
}

/// A single MongoDB client. Operations issued while the handshake is in
/// flight wait for it and then run, or fail if it never completes.
pub struct MongoConnection {
    uri: String,
    state: watch::Sender<ConnectionState>,
    handle: RwLock<Option<(Client, Database)>>,
}

impl MongoConnection {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            state: watch::Sender::new(ConnectionState::Connecting),
            handle: RwLock::new(None),
        }
    }

    async fn collection(&self, kind: RecordKind) -> Result<Collection<Document>, StoreError> {
        let mut state = self.state.subscribe();
        state
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map_err(|_| StoreError::NotConnected)?;
        let handle = self.handle.read().unwrap_or_else(PoisonError::into_inner);
        match handle.as_ref() {
            Some((_, db)) => Ok(db.collection::<Document>(kind.collection_name())),
            None => Err(StoreError::NotConnected),
        }
    }

    async fn establish(&self) -> Result<(Client, Database), StoreError> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let db = client
            .default_database()
            .ok_or_else(|| StoreError::Connection("connection URI names no database".to_string()))?;
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok((client, db))
    }

    /// Publishes an established client, unless `close()` got there first.
    fn finish_connecting(&self, client: Client, db: Database) -> Result<(), StoreError> {
        // The handle goes in before the state flips so that woken operations find it.
        *self.handle.write().unwrap_or_else(PoisonError::into_inner) = Some((client, db));
        let promoted = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
                true
            } else {
                false
            }
        });
        if promoted {
            return Ok(());
        }
        if let Some((client, _)) = self.handle.write().unwrap_or_else(PoisonError::into_inner).take() {
            shutdown(client);
        }
        Err(StoreError::Connection("connection closed before it was established".to_string()))
    }
}

fn shutdown(client: Client) {
    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        runtime.spawn(async move {
            client.shutdown().await;
            tracing::debug!("MongoDB client shut down");
        });
    }
}

#[async_trait]
impl Connection for MongoConnection {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    async fn ready(&self) -> Result<(), StoreError> {
        if self.state() != ConnectionState::Connecting {
            return Err(StoreError::Connection("connection closed before it was established".to_string()));
        }
        let (client, db) = match self.establish().await {
            Ok(handle) => handle,
            Err(e) => {
                self.state.send_if_modified(|state| {
                    let connecting = *state == ConnectionState::Connecting;
                    if connecting {
                        *state = ConnectionState::Disconnected;
                    }
                    connecting
                });
                return Err(e);
            }
        };
        self.finish_connecting(client, db)?;
        tracing::debug!("MongoDB connection established");
        Ok(())
    }

    fn close(&self) {
        self.state.send_replace(ConnectionState::Disconnecting);
        let handle = self.handle.write().unwrap_or_else(PoisonError::into_inner).take();
        self.state.send_replace(ConnectionState::Disconnected);
        if let Some((client, _)) = handle {
            shutdown(client);
        }
    }

    async fn find(&self, kind: RecordKind, range: TimeRange) -> Result<Vec<Record>, StoreError> {
        let collection = self.collection(kind).await?;
        let cursor = collection
            .find(range_filter(range))
            .sort(doc! { "timestamp": -1 })
            .projection(record_projection())
            .await
            .map_err(backend)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(backend)?;
        documents.iter().map(record_from_document).collect()
    }

    async fn insert(&self, kind: RecordKind, record: NewRecord) -> Result<RecordId, StoreError> {
        let collection = self.collection(kind).await?;
        let result = collection
            .insert_one(document_from_record(&record))
            .await
            .map_err(backend)?;
        result
            .inserted_id
            .as_object_id()
            .map(|oid| RecordId::new(oid.to_hex()))
            .ok_or_else(|| StoreError::Backend(format!("unexpected inserted id: {}", result.inserted_id)))
    }

    async fn update(&self, kind: RecordKind, id: &RecordId, changes: &RecordChanges) -> Result<(), StoreError> {
        let oid = parse_id(id)?;
        let collection = self.collection(kind).await?;
        // An empty $set is rejected by the server.
        if changes.is_empty() {
            return Ok(());
        }
        collection
            .update_one(doc! { "_id": oid }, doc! { "$set": changes_document(changes) })
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn remove(&self, kind: RecordKind, id: &RecordId) -> Result<(), StoreError> {
        let oid = parse_id(id)?;
        let collection = self.collection(kind).await?;
        collection
            .delete_one(doc! { "_id": oid })
            .await
            .map_err(backend)?;
        Ok(())
    }
}

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_id(id: &RecordId) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id.as_str()).map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn range_filter(range: TimeRange) -> Document {
    doc! { "timestamp": { "$gte": range.start, "$lt": range.end } }
}

fn record_projection() -> Document {
    doc! {
        "account": 1,
        "amount": 1,
        "currency": 1,
        "timestamp": 1,
        "description": 1,
        "availableCredit": 1,
        "category": 1,
    }
}

fn document_from_record(record: &NewRecord) -> Document {
    let mut document = doc! {
        "account": record.account.as_str(),
        "amount": record.amount,
        "currency": record.currency.as_str(),
        "timestamp": record.timestamp,
        "description": record.description.as_str(),
        "availableCredit": record.available_credit,
    };
    if let Some(category) = &record.category {
        document.insert("category", category.as_str());
    }
    document
}

fn changes_document(changes: &RecordChanges) -> Document {
    let mut set = Document::new();
    if let Some(description) = &changes.description {
        set.insert("description", description.as_str());
    }
    if let Some(timestamp) = changes.timestamp {
        set.insert("timestamp", timestamp);
    }
    if let Some(category) = &changes.category {
        set.insert("category", category.as_str());
    }
    set
}

fn record_from_document(document: &Document) -> Result<Record, StoreError> {
    let id = document
        .get_object_id("_id")
        .map_err(|_| StoreError::MalformedRecord("missing `_id`".to_string()))?;
    Ok(Record {
        id: RecordId::new(id.to_hex()),
        account: string_field(document, "account")?,
        amount: number_field(document, "amount")?,
        currency: string_field(document, "currency")?,
        timestamp: integer_field(document, "timestamp")?,
        description: string_field(document, "description")?,
        available_credit: number_field(document, "availableCredit")?,
        category: match document.get("category") {
            Some(Bson::String(s)) => Some(s.clone()),
            _ => None,
        },
    })
}

fn string_field(document: &Document, key: &str) -> Result<String, StoreError> {
    match document.get(key) {
        Some(Bson::String(s)) => Ok(s.clone()),
        _ => Err(StoreError::MalformedRecord(format!("missing or non-string `{}`", key))),
    }
}

fn number_field(document: &Document, key: &str) -> Result<f64, StoreError> {
    match document.get(key) {
        Some(Bson::Double(v)) => Ok(*v),
        Some(Bson::Int32(v)) => Ok(f64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v as f64),
        _ => Err(StoreError::MalformedRecord(format!("missing or non-numeric `{}`", key))),
    }
}

fn integer_field(document: &Document, key: &str) -> Result<i64, StoreError> {
    match document.get(key) {
        Some(Bson::Int32(v)) => Ok(i64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v),
        Some(Bson::Double(v)) if v.fract() == 0.0 => Ok(*v as i64),
        _ => Err(StoreError::MalformedRecord(format!("missing or non-integral `{}`", key))),
    }
}
