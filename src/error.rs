//! Error types for the store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for the store.
///
/// Every variant describes a precondition violation of a single operation or of
/// construction. None of them leave the store in an inconsistent state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A negative TTL was supplied
    #[error("Invalid TTL: {0}ms (must be >= 0)")]
    InvalidTtl(i64),

    /// The key is not present (or has expired)
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The stored value cannot be addressed by path
    #[error("Value is not structured: {0}")]
    NotStructured(String),

    /// A path could not be parsed
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid construction options
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// == Result Type Alias ==
/// Convenience Result type for the store.
pub type Result<T> = std::result::Result<T, StoreError>;
