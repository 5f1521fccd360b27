// # custstored - Customer Datastore Daemon
//
// This is a thin integration layer. All merge and storage logic lives in
// custstore-core.
//
// The custstored daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering record sources
// 4. Ingesting the record source into the datastore (fail-fast)
// 5. Holding the datastore for the serving layer until shutdown
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `CUSTSTORE_DATA_SOURCE`: Path to the JSON-lines record file
//   (default: ./data/messages.1.data)
// - `CUSTSTORE_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `CUSTSTORE_EVENT_CHANNEL_CAPACITY`: Ingestion event channel capacity
// - `CUSTSTORE_PROGRESS_LOG_INTERVAL`: Log progress every N records (0 = off)
//
// ## Example
//
// ```bash
// export CUSTSTORE_DATA_SOURCE=/var/lib/custstore/messages.data
// export CUSTSTORE_LOG_LEVEL=debug
//
// custstored
// ```

use anyhow::{Context, Result};
use custstore_core::config::{DEFAULT_DATA_SOURCE, IngestConfig, SourceConfig, StoreConfig};
use custstore_core::{Datastore, IngestEvent, MemoryDatastore, PluginRegistry, Reconciler};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{Notify, oneshot};
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (including failed or cancelled ingestion)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    data_source: String,
    event_channel_capacity: Option<usize>,
    progress_log_interval: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            data_source: env::var("CUSTSTORE_DATA_SOURCE")
                .unwrap_or_else(|_| DEFAULT_DATA_SOURCE.to_string()),
            event_channel_capacity: parse_optional_var("CUSTSTORE_EVENT_CHANNEL_CAPACITY")?,
            progress_log_interval: parse_optional_var("CUSTSTORE_PROGRESS_LOG_INTERVAL")?,
            log_level: env::var("CUSTSTORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.data_source.trim().is_empty() {
            anyhow::bail!("CUSTSTORE_DATA_SOURCE cannot be empty");
        }

        let path = std::path::Path::new(&self.data_source);
        if !path.is_file() {
            anyhow::bail!(
                "CUSTSTORE_DATA_SOURCE does not point to a readable file: {}",
                path.display()
            );
        }

        if let Some(capacity) = self.event_channel_capacity
            && !(1..=1_000_000).contains(&capacity)
        {
            anyhow::bail!(
                "CUSTSTORE_EVENT_CHANNEL_CAPACITY must be between 1 and 1000000. Got: {}",
                capacity
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CUSTSTORE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.store_config()
            .validate()
            .context("invalid datastore configuration")?;

        Ok(())
    }

    /// Build the library configuration
    fn store_config(&self) -> StoreConfig {
        let defaults = IngestConfig::default();
        StoreConfig {
            source: SourceConfig::File {
                path: self.data_source.clone(),
            },
            ingest: IngestConfig {
                event_channel_capacity: self
                    .event_channel_capacity
                    .unwrap_or(defaults.event_channel_capacity),
                progress_log_interval: self
                    .progress_log_interval
                    .unwrap_or(defaults.progress_log_interval),
            },
        }
    }
}

/// Parse an optional numeric environment variable
fn parse_optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a number. Got: {}", name, value)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting custstored daemon");
    info!("Using data source file: {}", config.data_source);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let store_config = config.store_config();

    // Create plugin registry and register built-in sources
    let registry = PluginRegistry::new();

    #[cfg(feature = "file")]
    {
        info!("Registering file record source");
        custstore_source_file::register(&registry);
    }

    let mut source = registry
        .create_source(&store_config.source)
        .context("failed to create record source")?;

    // One listener for the whole process: the first signal cancels ingestion
    // if it is still running, and ends serving otherwise.
    let shutdown = Arc::new(Notify::new());
    let (cancel_tx, cancel_rx) = oneshot::channel();
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(signal) => {
                    info!("Received shutdown signal: {}", signal);
                    let _ = cancel_tx.send(());
                    shutdown.notify_one();
                }
                Err(e) => error!("Signal handling error: {:#}", e),
            }
        });
    }

    let (reconciler, mut event_rx) = Reconciler::new(&store_config.ingest)?;
    let event_logger = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                IngestEvent::RecordSkipped { record_id, reason } => {
                    debug!("Record {} skipped: {:?}", record_id, reason);
                }
                other => debug!("Ingest event: {:?}", other),
            }
        }
    });

    let ingested = reconciler
        .ingest(source.as_mut(), Some(cancel_rx))
        .await;

    // Closing the channel lets the logger drain and exit
    drop(reconciler);
    let _ = event_logger.await;

    let registry = ingested.context("failed to load datastore")?;
    let datastore: Arc<dyn Datastore> = Arc::new(MemoryDatastore::from_registry(registry));

    info!(
        "Datastore ready: {} customers",
        datastore.total_customers().await?
    );

    shutdown.notified().await;
    info!("Shutting down daemon");

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
