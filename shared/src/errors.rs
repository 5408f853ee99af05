//! Shared error types for the launcher

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Report I/O failed on {path}: {message}")]
    ReportIo { path: String, message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
