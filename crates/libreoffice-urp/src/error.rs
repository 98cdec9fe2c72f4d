//! Error types for the URP client.

use thiserror::Error;

/// Errors raised while talking URP to a remote UNO environment.
#[derive(Debug, Error)]
pub enum UrpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Marshaling error: {0}")]
    Marshal(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("UNO exception {type_name}: {message}")]
    RemoteException { type_name: String, message: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Unknown type class: {0}")]
    UnknownTypeClass(u8),

    #[error("Protocol negotiation failed: {0}")]
    NegotiationFailed(String),
}

impl UrpError {
    /// Whether the underlying socket is gone, as opposed to a call failing.
    pub fn is_disconnect(&self) -> bool {
        match self {
            UrpError::ConnectionClosed => true,
            UrpError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, UrpError>;
