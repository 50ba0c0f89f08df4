//! Command-line access to the DICOM index store.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dicomidx_core::SchemaVersion;
use dicomidx_core::config::AppConfig;
use dicomidx_index::{ConnectionFactory, IndexDataStore, OperationTable, schema};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for pooled connections on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Inspect deleted-instance reclamation state of a DICOM index
#[derive(Parser, Debug)]
#[command(name = "dicomidx")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "DICOMIDX_CONFIG",
        default_value = "config/dicomidx.toml"
    )]
    config: PathBuf,

    /// Schema version of the deployment (overrides configuration)
    #[arg(long, global = true)]
    schema_version: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List deleted instances still eligible for cleanup
    Deleted {
        /// Maximum number of instances to return
        #[arg(long)]
        batch_size: Option<u32>,
        /// Skip instances that failed cleanup this many times
        #[arg(long)]
        max_retries: Option<u32>,
        /// Return identifiers only, without instance properties
        #[arg(long)]
        identity_only: bool,
    },
    /// Count deleted instances that exhausted their cleanup attempts
    Exhausted {
        /// Retry ceiling (defaults to reclamation.max_retries)
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Show the deletion date of the oldest deleted instance
    Oldest,
    /// Show the operation bindings in force for the schema version
    Capabilities,
    /// Create or upgrade the deleted-instance table for the schema version
    Bootstrap,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = config::load(&cli.config)?;
    if let Some(version) = cli.schema_version {
        config.schema.version = version;
    }
    let version = dicomidx_index::resolve_schema_version(&config.schema)
        .context("unsupported schema version")?;

    match cli.command {
        Commands::Capabilities => print_json(&capabilities(version)),
        Commands::Bootstrap => bootstrap(&config, version).await,
        command => {
            let store = dicomidx_index::from_config(&config.index, &config.schema)
                .await
                .context("failed to connect to index store")?;
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());
            run(command, &config, store.as_ref(), &cancel).await
        }
    }
}

/// Create or upgrade the deleted-instance table.
async fn bootstrap(config: &AppConfig, version: SchemaVersion) -> Result<()> {
    let connections = ConnectionFactory::from_config(&config.index)
        .await
        .context("failed to connect to index store")?;
    let result = schema::apply(&connections, version)
        .await
        .context("failed to apply schema");
    connections.close(CLOSE_TIMEOUT).await;
    result?;

    tracing::info!(version = %version, "Deleted-instance table ready");
    print_json(&json!({ "schema_version": version.as_i32() }))
}

/// Read-only subcommands served by the index store.
async fn run(
    command: Commands,
    config: &AppConfig,
    store: &dyn IndexDataStore,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Deleted {
            batch_size,
            max_retries,
            identity_only,
        } => {
            let batch_size = batch_size.unwrap_or(config.reclamation.batch_size);
            let max_retries = max_retries.unwrap_or(config.reclamation.max_retries);
            if identity_only {
                let instances = store
                    .retrieve_deleted_instances(batch_size, max_retries, cancel)
                    .await
                    .context("failed to retrieve deleted instances")?;
                print_json(&instances)
            } else {
                let instances = store
                    .retrieve_deleted_instances_with_properties(batch_size, max_retries, cancel)
                    .await
                    .context("failed to retrieve deleted instances")?;
                print_json(&instances)
            }
        }
        Commands::Exhausted { max_retries } => {
            let max_retries = max_retries.unwrap_or(config.reclamation.max_retries);
            let count = store
                .retrieve_num_exhausted_deleted_instance_attempts(max_retries, cancel)
                .await
                .context("failed to count exhausted deleted instances")?;
            print_json(&json!({ "max_retries": max_retries, "exhausted": count }))
        }
        Commands::Oldest => {
            let oldest = store
                .get_oldest_deleted(cancel)
                .await
                .context("failed to read oldest deleted instance")?;
            let oldest = oldest
                .map(|date| date.format(&Rfc3339))
                .transpose()
                .context("failed to format deletion date")?;
            print_json(&json!({ "oldest_deleted": oldest }))
        }
        Commands::Capabilities | Commands::Bootstrap => {
            anyhow::bail!("{command:?} does not read the index store")
        }
    }
}

/// Operation bindings for `version` as a JSON document.
fn capabilities(version: SchemaVersion) -> serde_json::Value {
    let table = OperationTable::for_version(version);
    let operations: Vec<_> = table
        .iter()
        .map(|(operation, bound)| match bound {
            Some(bound) => json!({
                "operation": operation.as_str(),
                "binding": bound.binding.as_str(),
                "since": bound.since.as_i32(),
            }),
            None => json!({
                "operation": operation.as_str(),
                "binding": null,
            }),
        })
        .collect();
    json!({ "schema_version": version.as_i32(), "operations": operations })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

/// Cancel in-flight index reads on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
        }
    });
}
