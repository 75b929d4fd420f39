//! Payload validation errors.

use thiserror::Error;

/// Result type for payload conversions.
pub type PayloadResult<T> = Result<T, PayloadError>;

/// Errors raised when a decoded payload cannot become a domain value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("undecodable reading: {0}")]
    UndecodableReading(String),

    #[error("non-finite reading value for reading {0}")]
    NonFiniteValue(String),
}
