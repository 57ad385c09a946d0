//! Error types for the push channel and the control plane.

use thiserror::Error;

/// Errors that can occur while opening or using the push channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish the channel.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The endpoint URL is not usable.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors that can occur when talking to the control plane.
#[derive(Debug, Error)]
pub enum ControlError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The control plane refused the request.
    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The request was not sent because its parameters are out of range.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Reading a local file for upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ControlError::Timeout
        } else if err.is_connect() {
            ControlError::Connection(err.to_string())
        } else if err.is_decode() {
            ControlError::Parse(err.to_string())
        } else {
            ControlError::Http(err.to_string())
        }
    }
}
