use std::io;
use thiserror::Error;

/// Custom error types for the TNC core
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// How the owner of a failing endpoint should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bytes did not decode. Drop and carry on.
    MalformedFrame,
    /// Socket or serial failure. Close the endpoint and let it reopen.
    TransientIo,
    /// A client broke the wire protocol. Close that client and clean up.
    ProtocolViolation,
    /// Out of memory or queue overflow. Fatal.
    ResourceExhausted,
}

impl Error {
    /// Creates a new malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new serial port error
    pub fn serial(msg: impl Into<String>) -> Self {
        Error::Serial(msg.into())
    }

    /// Creates a new resource exhaustion error
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Error::ResourceExhausted(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Classifies the error for the task that owns the endpoint.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedFrame(_) => ErrorKind::MalformedFrame,
            Error::Io(_) | Error::Network(_) | Error::Serial(_) => ErrorKind::TransientIo,
            Error::Protocol(_) | Error::Config(_) | Error::InvalidState(_) => {
                ErrorKind::ProtocolViolation
            }
            Error::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
        }
    }

    /// True when the process should stop rather than recover locally.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::ResourceExhausted
    }
}
