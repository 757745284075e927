//! Error types for the daycare billing engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure the engine can surface to its callers.

use thiserror::Error;

/// The main error type for the daycare billing engine.
///
/// All engine operations return this error type. The HTTP adapter maps each
/// variant onto a transport status; nothing in the engine swallows a
/// rejected precondition.
///
/// # Example
///
/// ```
/// use daycare_billing::error::EngineError;
///
/// let error = EngineError::Conflict {
///     message: "enrollment already has an open attendance record".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "Conflict: enrollment already has an open attendance record"
/// );
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Malformed or missing input.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// The input field that was rejected.
        field: String,
        /// Why the field was rejected.
        message: String,
    },

    /// A state-machine or uniqueness violation. Callers may refetch and retry.
    #[error("Conflict: {message}")]
    Conflict {
        /// A description of the conflicting state.
        message: String,
    },

    /// A referenced entity does not exist or has been tombstoned.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// No rate source resolves for an enrollment.
    #[error("Billing configuration error: {message}")]
    Configuration {
        /// A description of the missing configuration.
        message: String,
    },

    /// A single item failed inside a batch. Counted and logged by the batch.
    #[error("Failed to process {item}: {message}")]
    Aggregation {
        /// The item that failed.
        item: String,
        /// A description of the failure.
        message: String,
    },

    /// The backing store failed or timed out.
    #[error("Storage error during {operation}: {message}")]
    Storage {
        /// The store operation that failed.
        operation: String,
        /// A description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Returns true when the caller may refetch state and retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
