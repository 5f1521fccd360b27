//! Plugin-based record source registry
//!
//! The registry allows record sources to be registered dynamically at
//! runtime, so the daemon builds its source from configuration without
//! knowing the concrete type.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use custstore_core::plugins::PluginRegistry;
//! use custstore_core::config::SourceConfig;
//!
//! let registry = PluginRegistry::new();
//! custstore_source_file::register(&registry);
//!
//! let config = SourceConfig::File { path: "records.data".into() };
//! let source = registry.create_source(&config)?;
//! ```

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::traits::{RecordSource, RecordSourceFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry for plugin-based record source creation
///
/// Maps source type names to factory objects.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered record source factories
    sources: RwLock<HashMap<String, Box<dyn RecordSourceFactory>>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "file")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn RecordSourceFactory>) {
        self.write().insert(name.into(), factory);
    }

    /// Create a record source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordSource>)`: Created source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn RecordSource>> {
        config.validate()?;

        let source_type = config.type_name();
        let sources = self.read();

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Box<dyn RecordSourceFactory>>> {
        // Factories are inserted whole; a poisoned map is still consistent
        self.sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Box<dyn RecordSourceFactory>>> {
        self.sources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
