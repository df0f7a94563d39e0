//! Error type shared by every fallible [`crate::connection::Connection`]
//! operation.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Everything that can go wrong while talking to a peer.
///
/// A peer closing its write side is deliberately absent: `receive` reports it
/// as an empty buffer plus a disconnected connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A caller-supplied argument was rejected before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Address lookup failed or produced no candidates.
    #[error("getaddrinfo failed: {0}")]
    Resolution(String),

    /// Every resolved candidate refused the connection; carries the last error.
    #[error("connect failed: {0}")]
    Connect(io::Error),

    #[error("send failed: {0}")]
    Send(io::Error),

    #[error("receive failed: {0}")]
    Receive(io::Error),

    /// I/O was attempted on a connection that is not established.
    #[error("socket is not connected")]
    NotConnected,

    /// The process-wide networking subsystem could not be started.
    #[error("networking subsystem initialisation failed: {0}")]
    PlatformInit(String),
}

impl From<ClientError> for io::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidArgument(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            ClientError::NotConnected => io::Error::new(io::ErrorKind::NotConnected, err),
            ClientError::Connect(ref e) | ClientError::Send(ref e) | ClientError::Receive(ref e) => {
                io::Error::new(e.kind(), err.to_string())
            }
            ClientError::Resolution(_) | ClientError::PlatformInit(_) => {
                io::Error::new(io::ErrorKind::Other, err)
            }
        }
    }
}
