//! Error types for the IMAP engine.
//!
//! The taxonomy separates failures that are local to one response
//! ([`Error::MalformedResponse`]), explicit server refusals
//! ([`Error::CommandFailed`], [`Error::Auth`]), session-fatal transport
//! failures ([`Error::ConnectionLost`]) and capability gating
//! ([`Error::CapabilityUnsupported`]).

use std::time::Duration;

use thiserror::Error;

use crate::types::{ResponseCode, Status};

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while establishing a connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server output could not be interpreted.
    ///
    /// Fails only the command the response belonged to.
    #[error("Malformed response at position {position}: {message}")]
    MalformedResponse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Server answered a command with NO or BAD.
    #[error("Command failed ({status:?}): {text}")]
    CommandFailed {
        /// NO or BAD.
        status: Status,
        /// Response code attached to the completion, if any.
        code: Option<ResponseCode>,
        /// Human-readable server text.
        text: String,
    },

    /// The connection dropped or was cancelled; the session is unusable.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Authentication was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The server does not advertise a capability the operation needs.
    #[error("Capability not supported: {0}")]
    CapabilityUnsupported(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The message with this UID does not exist in the selected folder.
    #[error("Message not found: UID {0}")]
    MessageNotFound(u32),

    /// Content transfer or charset decoding failed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Settings value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a malformed response error.
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            position,
            message: message.into(),
        }
    }

    /// Returns true if the session that produced this error is dead.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }

    /// Returns true if the caller should ask for new credentials.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns the response code of a failed command.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::CommandFailed { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display_carries_server_text() {
        let err = Error::CommandFailed {
            status: Status::No,
            code: Some(ResponseCode::TryCreate),
            text: "Mailbox doesn't exist".to_string(),
        };
        assert!(err.to_string().contains("Mailbox doesn't exist"));
        assert_eq!(err.response_code(), Some(&ResponseCode::TryCreate));
    }

    #[test]
    fn test_predicates() {
        assert!(Error::ConnectionLost("eof".into()).is_connection_lost());
        assert!(Error::Auth("bad password".into()).is_auth());
        assert!(!Error::malformed(3, "x").is_connection_lost());
    }
}
