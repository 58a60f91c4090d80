//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Connection parameters and account settings
//! - TCP connect and the TLS handshake
//! - Framed I/O for IMAP protocol

mod config;
mod framed;
mod stream;

pub use config::{
    AccountSettings, Credentials, Secret, Security, ServerParams, ServerParamsBuilder, Settings,
    SmtpSecurity, SmtpSettings,
};
pub use framed::{FramedStream, FramedWriter, MAX_LINE_LENGTH, MAX_LITERAL_SIZE, ResponseAccumulator};
pub use stream::{BoxedIo, ImapIo, connect_tcp, tls_handshake};
