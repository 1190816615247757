use std::io;

use thiserror::Error;

/// Central error type for the mazurka engine.
#[derive(Debug, Error)]
pub enum MazurkaError {
    /// Underlying I/O error from the OS or network.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The request bytes could not be parsed as HTTP/1.1.
    #[error("malformed request: {0}")]
    Parse(String),

    /// The peer went away before a complete request arrived.
    #[error("connection closed before a full request arrived")]
    ConnectionClosed,

    /// A route or mount registration was rejected.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The same `:name` appeared twice in one route pattern.
    #[error("duplicate parameter :{name} in pattern {pattern:?}")]
    DuplicateParam { pattern: String, name: String },

    /// A WebSocket frame could not be read or written.
    #[error("websocket frame error: {0}")]
    Frame(String),
}

pub type MazurkaResult<T> = Result<T, MazurkaError>;
