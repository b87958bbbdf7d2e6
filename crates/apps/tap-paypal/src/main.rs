//! tap-paypal - Incremental PayPal extraction
//!
//! Writes one JSON message per line to stdout: a `SCHEMA` message naming the
//! key properties as each entity starts, a `RECORD` message for each
//! extracted record and a final `STATE` message with the bookmarks.
//! Logs go to stderr.

use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info};
use paypal::sync::{RecordSink, SyncOptions, SyncRunner};
use paypal::{
    BookmarkStore, EntityDescriptor, JsonFileBookmarkStore, PaypalClient, Record, TapConfig,
    TokenManager, UreqTransport, catalog, find_entity,
};
use serde_json::json;

/// State filename in the tap config directory
const STATE_FILE: &str = "state.json";

#[derive(Debug, Parser)]
#[command(name = "tap-paypal")]
#[command(about = "Incremental extraction from the PayPal REST API", long_about = None)]
struct Args {
    /// Config file (defaults to the tap config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State file holding bookmarks
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Comma-separated entities to sync, in order
    #[arg(short, long, value_delimiter = ',')]
    entities: Option<Vec<String>>,
}

/// Resolve entity names against the catalog, keeping the given order
fn select_entities(names: Option<&[String]>) -> Result<Vec<&'static EntityDescriptor>> {
    match names {
        None => Ok(catalog()),
        Some(names) => names
            .iter()
            .map(|name| find_entity(name).with_context(|| format!("Unknown entity: {}", name)))
            .collect(),
    }
}

/// Writes records as JSON lines to stdout
struct StdoutSink {
    out: BufWriter<Stdout>,
}

impl StdoutSink {
    fn new() -> Self {
        Self {
            out: BufWriter::new(io::stdout()),
        }
    }

    fn write_message(&mut self, message: &serde_json::Value) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush stdout")
    }
}

impl RecordSink for StdoutSink {
    fn start_entity(&mut self, entity: &EntityDescriptor) -> Result<()> {
        self.write_message(&json!({
            "type": "SCHEMA",
            "stream": entity.name,
            "key_properties": entity.key_properties,
            "bookmark_properties": entity.replication_key().into_iter().collect::<Vec<_>>(),
        }))
    }

    fn write_record(
        &mut self,
        entity: &str,
        record: &Record,
        time_extracted: DateTime<Utc>,
    ) -> Result<()> {
        self.write_message(&json!({
            "type": "RECORD",
            "stream": entity,
            "record": record,
            "time_extracted": paypal::timestamp::format_timestamp(time_extracted),
        }))
    }
}

fn run(args: Args) -> Result<()> {
    let cfg = TapConfig::load(args.config.as_deref())?;
    let start_date = cfg.start_date_time()?;
    let entities = select_entities(args.entities.as_deref())?;

    let state_path = match args.state {
        Some(path) => path,
        None => config::ensure_config_dir()?.join(STATE_FILE),
    };
    let store = JsonFileBookmarkStore::open(&state_path)?;
    info!("Using state file {}", state_path.display());

    let transport = Arc::new(UreqTransport::new(cfg.request_timeout()));
    let tokens = TokenManager::new(
        transport.clone(),
        cfg.token_endpoint(),
        cfg.credentials(),
        cfg.user_agent.clone(),
    )
    .with_renewal_interval(cfg.token_renewal_interval());
    let client = PaypalClient::new(transport, tokens, cfg.api_base_url())?
        .with_user_agent(cfg.user_agent.clone());

    info!(
        "Connecting to {} ({})",
        cfg.api_base_url(),
        if cfg.sandbox { "sandbox" } else { "live" }
    );
    client.login()?;

    let options = SyncOptions {
        max_history_days: cfg.max_history_days,
        ..SyncOptions::new(start_date, cfg.lookback)
    };
    let mut sink = StdoutSink::new();
    let result = SyncRunner::new(&client, &store, options).run(&entities, &mut sink);
    client.tokens().cancel();
    result?;

    let state = store.state()?;
    sink.write_message(&json!({"type": "STATE", "value": state}))?;
    sink.flush()
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the record stream
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Sync failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let parsed = Args::try_parse_from([
            "tap-paypal",
            "--config",
            "cfg.json",
            "-e",
            "balances,transactions",
        ])
        .unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("cfg.json")));
        assert!(parsed.state.is_none());
        assert_eq!(
            parsed.entities,
            Some(vec!["balances".to_string(), "transactions".to_string()])
        );
    }

    #[test]
    fn test_parse_args_defaults() {
        let parsed = Args::try_parse_from(["tap-paypal"]).unwrap();
        assert!(parsed.config.is_none());
        assert!(parsed.state.is_none());
        assert!(parsed.entities.is_none());
    }

    #[test]
    fn test_parse_args_rejects_unknown_and_missing_values() {
        assert!(Args::try_parse_from(["tap-paypal", "--verbose"]).is_err());
        assert!(Args::try_parse_from(["tap-paypal", "--state"]).is_err());
    }

    #[test]
    fn test_select_entities() {
        let all = select_entities(None).unwrap();
        assert_eq!(all.len(), 2);

        let names = vec!["balances".to_string()];
        let picked = select_entities(Some(names.as_slice())).unwrap();
        assert_eq!(picked[0].name, "balances");

        let names = vec!["disputes".to_string()];
        assert!(select_entities(Some(names.as_slice())).is_err());
    }
}
