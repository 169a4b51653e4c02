//! Error types for the common library.

use thiserror::Error;

/// Problems with the printer's response envelope
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatusError {
    #[error("Response has no 'result' object")]
    MissingResult,

    #[error("Response result has no 'status' object")]
    MissingStatus,

    #[error("Response status is not an object (found {0})")]
    StatusNotObject(&'static str),
}

/// Problems with the observation registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("Unknown observation: {0}")]
    Unknown(String),
}
