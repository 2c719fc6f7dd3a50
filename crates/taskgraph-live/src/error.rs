//! Transport errors

use taskgraph_types::EventDecodeError;
use thiserror::Error;

/// Errors from the inbound event stream
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// One frame could not be decoded; the stream itself is still usable
    #[error("Undecodable event: {0}")]
    Decode(#[from] EventDecodeError),

    #[error("Event source unavailable: {0}")]
    Unavailable(String),
}

impl StreamError {
    /// True if the stream should be reopened rather than read further
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StreamError::Decode(_))
    }
}

/// Errors from sending an intent
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected '{op}' with {status}: {body}")]
    Rejected {
        op: &'static str,
        status: u16,
        body: String,
    },
}
