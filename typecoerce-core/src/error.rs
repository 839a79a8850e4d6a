//! Error types for registry loading and typed casting.
//!
//! The matcher itself never returns errors: a failed match is `false` and a
//! failed cast or copy is `None`. These errors surface at the boundaries that
//! sit around it.

use thiserror::Error;

/// Result type for coercion boundary operations.
pub type CoerceResult<T> = Result<T, CoerceError>;

/// Errors that can occur around the coercion engine.
#[derive(Debug, Error)]
pub enum CoerceError {
    /// A value did not satisfy the descriptor it was checked against.
    #[error("Type mismatch: expected {0}")]
    TypeMismatch(String),

    /// A type name is not present in the registry.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// An interface method has no argument declaration.
    #[error("Unknown method: {interface}.{method}")]
    UnknownMethod {
        /// Interface name.
        interface: String,
        /// Method name.
        method: String,
    },

    /// A descriptor node could not be compiled.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A JSON document could not be turned into a runtime value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Registry file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry or value JSON could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoerceError {
    /// Whether this error is the mismatch a shim reports to the calling application.
    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch(_))
    }
}
