use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use prettytable::{row, Table};
use thiserror::Error;
use tokio::sync::broadcast;

use spendlog::config::{CliArgs, Command, Config};
use spendlog::{Driver, LedgerStore, NewRecord, Record, RecordChanges, RecordId, RecordKind, StoreError, StoreEvent};
use spendlog_memory::InMemoryDriver;
use spendlog_mongo::MongoDriver;

#[derive(Debug, Error)]
enum CliError {
    #[error("connection failed: {0}")]
    Connection(Arc<StoreError>),
    #[error("event stream closed before the connection settled")]
    EventsClosed,
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
    #[error("nothing to change, pass --description, --timestamp or --category")]
    NoChanges,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    spendlog::logging::init(&config.logging);

    let driver: Arc<dyn Driver> = if cli.memory {
        Arc::new(InMemoryDriver::new())
    } else {
        Arc::new(MongoDriver::new())
    };

    let store = LedgerStore::with_driver(config.database.clone(), config.store.clone(), driver);
    let mut events = store.subscribe();
    if !config.store.connect_on_init {
        store.connect();
    }

    let result = match wait_for_connection(&mut events).await {
        Ok(()) => run(&store, cli.command).await,
        Err(e) => Err(e),
    };
    store.disconnect();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn wait_for_connection(events: &mut broadcast::Receiver<StoreEvent>) -> Result<(), CliError> {
    loop {
        match events.recv().await {
            Ok(StoreEvent::Connect) => return Ok(()),
            Ok(StoreEvent::Error(e)) => return Err(CliError::Connection(e)),
            Ok(StoreEvent::Disconnect) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return Err(CliError::EventsClosed),
        }
    }
}

async fn run(store: &LedgerStore, command: Command) -> Result<(), CliError> {
    match command {
        Command::List { kind, from, to } => {
            let records = store.get(kind.into(), from, to).await?;
            println!("{}", records_table(&records));
        }
        Command::Add { kind, json } => {
            let record: NewRecord = serde_json::from_str(&json)?;
            let kind: RecordKind = kind.into();
            let id = store.insert(kind, record).await?;
            println!("{}", id);
        }
        Command::Edit { kind, id, description, timestamp, category } => {
            let changes = RecordChanges { description, timestamp, category };
            if changes.is_empty() {
                return Err(CliError::NoChanges);
            }
            store.edit(kind.into(), &RecordId::from(id), &changes).await?;
        }
        Command::Remove { kind, id } => {
            store.remove(kind.into(), &RecordId::from(id)).await?;
        }
    }
    Ok(())
}

fn records_table(records: &[Record]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Id", "Date", "Account", "Amount", "Currency", "Description", "Category", "Available credit"]);
    table.add_empty_row();

    for record in records {
        table.add_row(row![
            record.id,
            format_timestamp(record.timestamp),
            record.account,
            record.amount,
            record.currency,
            record.description,
            record.category.as_deref().unwrap_or(""),
            record.available_credit
        ]);
    }

    table
}

fn format_timestamp(timestamp: i64) -> String {
    match time::OffsetDateTime::from_unix_timestamp(timestamp) {
        Ok(dt) => dt.date().to_string(),
        Err(_) => timestamp.to_string(),
    }
}
