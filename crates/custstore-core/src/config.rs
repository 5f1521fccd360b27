//! Configuration types for the customer datastore
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Default data file, relative to the working directory
pub const DEFAULT_DATA_SOURCE: &str = "./data/messages.1.data";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Record source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Optional ingestion settings
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl StoreConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.source.validate()?;
        self.ingest.validate()?;
        Ok(())
    }
}

/// Record source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON-lines file, one record per line
    File {
        /// Path to the data file
        path: String,
    },

    /// Custom record source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::File { path } => {
                if path.trim().is_empty() {
                    return Err(crate::Error::config("File source path cannot be empty"));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name used for factory lookup
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::File { .. } => "file",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::File {
            path: DEFAULT_DATA_SOURCE.to_string(),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Capacity of the ingestion event channel
    ///
    /// When full, events are dropped (with a warning log) rather than
    /// stalling ingestion.
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Emit an `info` progress line every this many records
    ///
    /// Set to 0 to disable progress logging.
    #[serde(default = "default_progress_log_interval")]
    pub progress_log_interval: u64,
}

impl IngestConfig {
    /// Validate the ingestion configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            progress_log_interval: default_progress_log_interval(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_progress_log_interval() -> u64 {
    100_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::new();
        config.validate().unwrap();
        assert_eq!(config.source.type_name(), "file");
        assert_eq!(config.ingest.event_channel_capacity, 1000);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"source":{"type":"file","path":"/tmp/records.data"}}"#)
                .unwrap();
        assert!(matches!(
            config.source,
            SourceConfig::File { ref path } if path == "/tmp/records.data"
        ));
        assert_eq!(config.ingest.progress_log_interval, 100_000);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let source = SourceConfig::File {
            path: "  ".to_string(),
        };
        assert!(source.validate().is_err());

        let source = SourceConfig::Custom {
            factory: "kafka".to_string(),
            config: serde_json::Value::Null,
        };
        assert!(source.validate().is_err());

        let ingest = IngestConfig {
            event_channel_capacity: 0,
            ..IngestConfig::default()
        };
        assert!(ingest.validate().is_err());
    }
}
