//! Error handling for the SatMesh engine
//!
//! This module defines the error type and Result alias used throughout the
//! crate. Stale worker reports are deliberately absent here: they are an
//! expected outcome of cancellation and are dropped silently by the
//! coordinator rather than surfaced as errors.

use thiserror::Error;

/// Main error type for SatMesh operations
#[derive(Error, Debug)]
pub enum SatMeshError {
    /// A dispatch was attempted while the current epoch still has results outstanding
    #[error("Round already in flight for epoch {epoch}")]
    RoundInFlight { epoch: u64 },

    /// A compute unit's channel is closed (its thread has exited)
    #[error("Compute unit {unit} is disconnected")]
    WorkerDisconnected { unit: usize },

    /// A compute unit thread could not be spawned
    #[error("Failed to spawn compute unit: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker pool size is not usable
    #[error("Invalid worker count: {0}")]
    InvalidWorkerCount(usize),

    /// Results were handed back against an entity list of a different length
    #[error("Entity set mismatch: round covered {expected} entities, caller passed {actual}")]
    EntitySetMismatch { expected: usize, actual: usize },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SatMeshError>,
    },
}

impl SatMeshError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SatMeshError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for SatMeshError {
    fn from(err: serde_json::Error) -> Self {
        SatMeshError::Serialization(err.to_string())
    }
}

/// Result type alias for SatMesh operations
pub type Result<T> = std::result::Result<T, SatMeshError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
