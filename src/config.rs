use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use spendlog_core::{Credentials, RecordKind};

use crate::store::StoreOptions;

#[derive(Parser, Debug)]
#[command(name = "spendlog", about = "spendlog - record expenses and income")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "spendlog.toml")]
    pub config: String,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Database host (overrides config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Use a throwaway in-memory database instead of MongoDB
    #[arg(long)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List records with `from <= timestamp < to`, newest first
    List {
        kind: KindArg,
        #[arg(long, default_value_t = 0)]
        from: i64,
        #[arg(long, default_value_t = i64::MAX)]
        to: i64,
    },
    /// Add a record given as a JSON object
    Add { kind: KindArg, json: String },
    /// Change the description, timestamp or category of a record
    Edit {
        kind: KindArg,
        id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        timestamp: Option<i64>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a record
    Remove { kind: KindArg, id: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Expense,
    Income,
}

impl From<KindArg> for RecordKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Expense => RecordKind::Expense,
            KindArg::Income => RecordKind::Income,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: Credentials,

    #[serde(default)]
    pub store: StoreOptions,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_database() -> Credentials {
    Credentials::new("localhost", "spendlog")
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: default_database(),
            store: StoreOptions::default(),
            logging: default_logging(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref host) = cli.host {
            config.database.host = host.clone();
        }

        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.database.connection_uri(), "mongodb://localhost:27017/spendlog");
        assert!(config.store.connect_on_init);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_full_file() {
        let config = Config::parse(
            r#"
            [database]
            host = "db.internal"
            database = "ledger"
            username = "app"
            password = "pw"
            auth_source = "admin"
            port = 27018

            [store]
            connect_on_init = false

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database.connection_uri(),
            "mongodb://app:pw@db.internal:27018/ledger?authSource=admin"
        );
        assert!(!config.store.connect_on_init);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliArgs::parse_from([
            "spendlog",
            "--config",
            "/nonexistent/spendlog.toml",
            "--log-level",
            "trace",
            "--host",
            "mongo",
            "list",
            "expense",
        ]);
        let config = Config::load(&cli);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.database.host, "mongo");
        assert!(matches!(
            cli.command,
            Command::List { kind: KindArg::Expense, from: 0, to: i64::MAX }
        ));
    }
}
