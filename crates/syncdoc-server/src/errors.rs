//! Session and transport error types.

use thiserror::Error;

/// Errors raised while opening a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Another live session already holds the requested name.
    #[error("session name already in use: {0}")]
    NameInUse(String),
}

/// Failures on a session's duplex channel. Each one ends that session only.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away or the channel was shut.
    #[error("transport closed")]
    Closed,
    /// Read or write failure reported by the underlying connection.
    #[error("transport i/o failed: {0}")]
    Io(String),
    /// An outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Io(_) => "io",
            Self::Encode(_) => "encode",
        }
    }
}
