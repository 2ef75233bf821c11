//! icebox CLI: archives one batch of queued messages to object storage.
//!
//! Stands in for the hosting runtime: loads (or synthesizes) a batch,
//! builds the invocation context, archives every message concurrently,
//! and prints the batch-failure response the queue source would consume.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use icebox::error::{
    AddressParseSnafu, ArchiveStorageSnafu, ArchiverError, EventParseSnafu, EventReadSnafu,
    MetricsSnafu, SummarySerializeSnafu,
};
use icebox::event::InvocationContext;
use icebox::{Archiver, Config, QueueEvent, StorageProvider, metrics, run_batch, synthetic};

/// Queue batch to object storage archiver.
#[derive(Parser, Debug)]
#[command(name = "icebox")]
#[command(author, version, about, long_about = None)]
#[command(group(clap::ArgGroup::new("input").required(true).args(["event", "generate"])))]
struct Args {
    /// Path to a JSON file containing the batch event to process.
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Generate a synthetic batch of N messages instead of reading a file.
    #[arg(long, value_name = "N")]
    generate: Option<usize>,

    /// Target bucket name or storage URL (overrides ARCHIVE_BUCKET).
    #[arg(long)]
    bucket: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9090).
    #[arg(long)]
    metrics_address: Option<String>,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), ArchiverError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("icebox starting");

    // Initialize metrics if requested
    if let Some(address) = &args.metrics_address {
        let addr = address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!("Metrics endpoint listening on http://{}/metrics", address);
    }

    let config = Config::from_env();
    let bucket = args.bucket.clone().unwrap_or(config.bucket);

    let storage = Arc::new(
        StorageProvider::for_url(&bucket)
            .await
            .context(ArchiveStorageSnafu)?,
    );
    info!("Archiving to {}", storage.canonical_url());

    let event = load_event(&args)?;

    // The invocation context the hosting runtime would supply
    let context = InvocationContext {
        request_id: Uuid::new_v4().to_string(),
        processor_name: env!("CARGO_PKG_NAME").to_string(),
        processor_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let archiver = Arc::new(Archiver::new(storage, context));
    let response = run_batch(event, archiver).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context(SummarySerializeSnafu)?
    );

    Ok(())
}

/// Load the batch event from the configured source.
fn load_event(args: &Args) -> Result<QueueEvent, ArchiverError> {
    if let Some(count) = args.generate {
        info!("Generating synthetic batch of {} messages", count);
        return Ok(synthetic::generate_batch(count));
    }

    let path = args
        .event
        .as_ref()
        .expect("clap requires either --event or --generate");
    let raw = std::fs::read_to_string(path).context(EventReadSnafu)?;
    serde_json::from_str(&raw).context(EventParseSnafu)
}
