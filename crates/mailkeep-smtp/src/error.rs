//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The server rejected a command.
    #[error("SMTP error {code}: {message}")]
    Server {
        /// Reply code (e.g. 550).
        code: u16,
        /// Reply text from the server.
        message: String,
    },

    /// Unexpected or malformed server response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Feature not advertised by the server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates a server rejection error from a reply code and message.
    #[must_use]
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Returns true for permanent server rejections (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Server { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true for transient server rejections (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Server { code, .. } if *code >= 400 && *code < 500)
    }
}
