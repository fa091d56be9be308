use std::fs;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use docsink_kernel::adapters::memory::MemoryConnector;
use docsink_kernel::config::ConnectorConfig;
use docsink_kernel::document::Document;
use docsink_kernel::event::ChangeEvent;
use docsink_kernel::replicator::Replicator;
use docsink_kernel::store::Timestamp;
use docsink_kernel::target::ReplicationTarget;

/// Docsink replication dry run
#[derive(Parser, Debug)]
#[command(name = "docsink")]
#[command(about = "Replay change events into an in-memory key-value target", long_about = None)]
struct Cli {
    /// Path to change events JSON (array of insert/update/remove events)
    #[arg(long)]
    events: String,

    /// Path to connector config JSON
    #[arg(long)]
    config: Option<String>,

    /// Endpoint override: host, host:port, host:port/namespace or [ipv6]:port/namespace
    #[arg(long)]
    endpoint: Option<String>,

    /// Inclusive lower bound of the checkpoint range query
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// Exclusive upper bound of the checkpoint range query
    #[arg(long, default_value_t = u64::MAX)]
    to: u64,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    namespace: String,
    applied: usize,
    latest: Option<Document>,
    range: Vec<Document>,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    // ----------------------------
    // Load connector config
    // ----------------------------
    let mut config = if let Some(path) = &cli.config {
        let data = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        ConnectorConfig::from_json(&data)?
    } else {
        ConnectorConfig::default()
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    // ----------------------------
    // Load change events
    // ----------------------------
    let event_data =
        fs::read_to_string(&cli.events).with_context(|| format!("reading events {}", cli.events))?;
    let events: Vec<ChangeEvent> = serde_json::from_str(&event_data)?;

    // ----------------------------
    // Connect
    // ----------------------------
    let connector = MemoryConnector::new(&config);
    let replicator = Replicator::from_config(&connector, config)?;

    // ----------------------------
    // Replicate
    // ----------------------------
    let total = events.len();
    let mut applied = 0;
    for (position, event) in events.into_iter().enumerate() {
        let kind = event.kind();
        if let Err(err) = event.apply(&replicator) {
            bail!("event {position} ({kind}) failed after {applied} of {total} applied: {err}");
        }
        applied += 1;
    }
    replicator.flush()?;

    // ----------------------------
    // Checkpoint view
    // ----------------------------
    let latest = replicator.latest()?;
    let range = replicator
        .range_query(Timestamp(cli.from), Timestamp(cli.to))?
        .collect::<Result<Vec<_>, _>>()?;

    let output = CliOutput {
        namespace: replicator.namespace().to_string(),
        applied,
        latest,
        range,
    };

    replicator.shutdown()?;

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
