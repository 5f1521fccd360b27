//! Error types for the customer datastore
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::traits::CustomerId;

/// Result type alias for datastore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the customer datastore
#[derive(Error, Debug)]
pub enum Error {
    /// No customer with the given id
    #[error("Customer not found: {0}")]
    NotFound(CustomerId),

    /// A customer with the given id already exists
    #[error("Customer already exists: {0}")]
    AlreadyExists(CustomerId),

    /// Invalid input (e.g. an unparseable user id on a record)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The record source terminated abnormally
    #[error("Record source failure: {0}")]
    SourceFailure(String),

    /// Ingestion was cancelled before the source was exhausted
    #[error("Ingestion cancelled")]
    Cancelled,

    /// The registry's internal bookkeeping is inconsistent
    #[error("Registry invariant violated: {0}")]
    Invariant(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a record source failure
    pub fn source_failure(msg: impl Into<String>) -> Self {
        Self::SourceFailure(msg.into())
    }

    /// Create a registry invariant error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error aborts an ingestion pass
    ///
    /// Everything except `InvalidInput` is fatal: a record with a bad user id
    /// is dropped and ingestion continues.
    pub fn is_fatal_for_ingestion(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}
