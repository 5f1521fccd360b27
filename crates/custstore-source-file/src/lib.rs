// # File Record Source
//
// This crate provides a JSON-lines file record source for the customer
// datastore.
//
// ## Format
//
// One JSON object per line, blank lines ignored:
//
// ```text
// {"id":"e1","type":"event","name":"open","user_id":"1","data":{},"timestamp":10}
// {"id":"a1","type":"attributes","user_id":"1","data":{"color":"red"},"timestamp":5}
// ```
//
// ## Architecture
//
// `records()` spawns a reader task that decodes the file line by line and
// sends records through a bounded channel, so a slow consumer applies
// backpressure to the reader instead of buffering the whole file.
//
// An unreadable file or a malformed line ends the stream with a
// `SourceFailure`; nothing after it is delivered.

use custstore_core::PluginRegistry;
use custstore_core::config::SourceConfig;
use custstore_core::traits::{Record, RecordSource, RecordSourceFactory, RecordStream};
use custstore_core::{Error, Result};

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default capacity of the reader → ingestion channel
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// JSON-lines file record source
pub struct FileRecordSource {
    /// Path to the data file
    path: PathBuf,

    /// Reader → ingestion channel capacity
    channel_capacity: usize,

    /// Set once the stream has been handed out
    consumed: bool,
}

impl FileRecordSource {
    /// Create a new file record source
    ///
    /// The file is opened when `records()` is called, not here.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_capacity(path, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create with a custom channel capacity
    pub fn with_capacity(path: impl AsRef<Path>, channel_capacity: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            channel_capacity: channel_capacity.max(1),
            consumed: false,
        }
    }

    /// Path this source reads from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for FileRecordSource {
    /// Spawn the reader task and return its stream
    ///
    /// Must be called from within a tokio runtime.
    fn records(&mut self) -> Result<RecordStream> {
        if self.consumed {
            return Err(Error::source_failure(format!(
                "file source {} already consumed",
                self.path.display()
            )));
        }
        self.consumed = true;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let path = self.path.clone();

        tokio::spawn(async move {
            tracing::info!("Reading records from {}", path.display());

            if let Err(e) = read_records(&path, &tx).await {
                tracing::error!("Record file {} failed: {}", path.display(), e);
                // Receiver may already be gone; nothing left to tell
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn source_name(&self) -> &'static str {
        "file"
    }
}

/// Decode the file into the channel until EOF, an error, or a dropped receiver
async fn read_records(path: &Path, tx: &mpsc::Sender<Result<Record>>) -> Result<()> {
    let file = File::open(path).await.map_err(|e| {
        Error::source_failure(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut lines = BufReader::new(file).lines();
    let mut line_number: u64 = 0;

    while let Some(line) = lines.next_line().await.map_err(|e| {
        Error::source_failure(format!("read error after line {}: {}", line_number, e))
    })? {
        line_number += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Record = serde_json::from_str(line).map_err(|e| {
            Error::source_failure(format!("malformed record on line {}: {}", line_number, e))
        })?;

        if tx.send(Ok(record)).await.is_err() {
            tracing::debug!("Record receiver dropped, stopping reader");
            return Ok(());
        }
    }

    tracing::debug!("Read {} lines from {}", line_number, path.display());
    Ok(())
}

/// Factory for creating file record sources
pub struct FileSourceFactory;

impl RecordSourceFactory for FileSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn RecordSource>> {
        match config {
            SourceConfig::File { path } => Ok(Box::new(FileRecordSource::new(path))),
            _ => Err(Error::config("Invalid config for file record source")),
        }
    }
}

/// Register the file record source with a registry
pub fn register(registry: &PluginRegistry) {
    registry.register_source("file", Box::new(FileSourceFactory));
}
