//! Error types for the rowframe engine.
//!
//! - [`EngineError`] - failures raised by table operations
//! - [`PipelineError`] - failures raised while parsing or running a step plan
//! - [`SourceError`] - failures of the file-backed collaborators in [`crate::io`]
//!
//! Conversion is automatic via `From`, so `?` works across the boundary.

use thiserror::Error;

use crate::validation::ValidationIssue;

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors raised by table operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced column name is absent from the relevant header.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Empty reducer set, unknown reducer/aggregation name, malformed rule, etc.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raised by `validate_or_fail` when the report holds at least one issue.
    #[error("Validation failed with {count} error(s)")]
    ValidationFailed {
        count: usize,
        errors: Vec<ValidationIssue>,
    },
}

impl EngineError {
    pub fn field_not_found(name: impl Into<String>) -> Self {
        Self::FieldNotFound(name.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Errors raised while loading or executing a [`crate::pipeline::PipelineSpec`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A step failed inside the engine.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The plan references a named table that was not supplied.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// The plan is structurally wrong (e.g. missing columns before execution).
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors raised while reading or writing JSON record files.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The file parsed but is not an array of JSON objects.
    #[error("Expected an array of records in {0}")]
    NotRecords(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
