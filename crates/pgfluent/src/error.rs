//! Error types for pgfluent

use thiserror::Error;

/// Result type alias for pgfluent operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Error types for statement building and execution.
///
/// Error messages carry the operation and table/column context, never
/// parameter values.
#[derive(Debug, Error)]
pub enum SqlError {
    /// Query execution error from the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Singleton query returned zero rows
    #[error("Not found: {0}")]
    NotFound(String),

    /// Singleton query returned more than one row
    #[error("Too many rows ({got}): {context}")]
    TooManyRows { got: usize, context: String },

    /// Save probe matched more than one row by unique key
    #[error("Ambiguous match: {0}")]
    AmbiguousMatch(String),

    /// Explicit-key save without a key value
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// Generated keys requested on a table that cannot report them
    #[error("Generated keys unsupported: {0}")]
    UnsupportedGeneration(String),

    /// Placeholder count diverged from bound parameter count
    #[error("Placeholder/parameter mismatch ({placeholders} placeholders, {parameters} parameters) in: {statement}")]
    ParameterMismatch {
        placeholders: usize,
        parameters: usize,
        statement: String,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Builder misuse detected before execution
    #[error("Validation error: {0}")]
    Validation(String),
}

impl SqlError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(got: usize, context: impl Into<String>) -> Self {
        Self::TooManyRows {
            got,
            context: context.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a too-many-rows error
    pub fn is_too_many_rows(&self) -> bool {
        matches!(self, Self::TooManyRows { .. })
    }

    /// Check if this is an ambiguous match error
    pub fn is_ambiguous_match(&self) -> bool {
        matches!(self, Self::AmbiguousMatch(_))
    }
}
