//! Error types for procmap drivers

use crate::ValueKind;
use thiserror::Error;

/// Errors surfaced by a database driver.
///
/// The procedure runtime never wraps or rewrites these; they reach the caller
/// exactly as the driver produced them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("{0}")]
    Other(String),
}

/// A [`Value`](crate::Value) could not be turned into the requested Rust type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("expected {expected} but found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} does not fit into {target}")]
    OutOfRange { value: String, target: ValueKind },

    #[error("cannot parse '{value}' as {target}: {message}")]
    Parse {
        value: String,
        target: ValueKind,
        message: String,
    },

    #[error("missing constructor argument '{0}'")]
    MissingArgument(&'static str),
}

impl ConversionError {
    pub fn mismatch(expected: &'static str, found: &crate::Value) -> Self {
        ConversionError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }
}

/// Result type alias for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;
