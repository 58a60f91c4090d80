//! # webmail-imap
//!
//! The IMAP engine behind a webmail client: connection sessions with
//! pipelined commands, BODYSTRUCTURE and ENVELOPE parsing, capability
//! negotiation, capability-aware message listing and a per-account
//! session pool.
//!
//! ## Features
//!
//! - **Pipelined sessions**: every command gets a unique tag; a background
//!   reader routes tagged completions, command data and unsolicited updates
//! - **Typed MIME trees**: BODYSTRUCTURE becomes a [`MimePart`] tree whose
//!   part paths feed straight back into `BODY.PEEK[<path>]`
//! - **Message listing**: SORT or THREAD when the server has them, a
//!   client-side RFC 5256 sort otherwise, always paginated
//! - **TLS via rustls**: implicit TLS and STARTTLS without OpenSSL
//! - **Sans-I/O parser**: tokenizer, s-expressions and response parsing
//!   work on byte slices
//!
//! ## Quick Start
//!
//! ```ignore
//! use webmail_imap::{Credentials, ListRequest, ServerParams, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> webmail_imap::Result<()> {
//!     let server = ServerParams::new("imap.example.com");
//!     let credentials = Credentials::password("user@example.com", "password");
//!     let mut session = Session::open(&server, &credentials, SessionConfig::new()).await?;
//!
//!     for folder in session.list_folders().await? {
//!         println!("{} ({:?})", folder.display_name, folder.counts);
//!     }
//!
//!     let page = session
//!         .list_messages(&ListRequest::new("INBOX").per_page(Some(25)))
//!         .await?;
//!     for message in &page.messages {
//!         println!("{} {}", message.uid, message.subject());
//!     }
//!
//!     let structure = session.fetch_body_structure(page.messages[0].uid).await?;
//!     println!("{} parts", structure.iter().count());
//!
//!     session.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! State only changes when the corresponding command completes with OK.
//!
//! ```text
//! ┌──────────────┐  connect()   ┌──────────────┐
//! │ Disconnected │ ───────────→ │  Connected   │
//! └──────────────┘              └──────────────┘
//!        ↑                             │ authenticate() / PREAUTH
//!        │ logout() / connection lost  ▼
//!        │                      ┌──────────────┐
//!        ├───────────────────── │Authenticated │ ←─┐
//!        │                      └──────────────┘   │ close()
//!        │                             │ select() / examine()
//!        │                             ▼           │
//!        │                      ┌──────────────┐   │
//!        └───────────────────── │ Selected(f)  │ ──┘
//!                               └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`parser`]: tokenizer, s-expressions, BODYSTRUCTURE, ENVELOPE, THREAD
//! - [`session`]: the connection state machine and its commands
//! - [`strategy`]: message listing and pagination
//! - [`pool`]: sessions keyed by account
//! - [`folder`]: the folder tree
//! - [`connection`]: settings, TLS and framing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
pub mod decode;
mod error;
pub mod folder;
pub mod handler;
pub mod parser;
pub mod pool;
mod protocol;
pub mod session;
pub mod strategy;
pub mod types;

pub use command::{
    Command, FetchAttribute, SearchCriteria, SortKey, SortProgram, StoreAction, TagGenerator,
    ThreadAlgorithm,
};
pub use connection::{
    AccountSettings, Credentials, FramedStream, ImapIo, Secret, Security, ServerParams,
    Settings, SmtpSecurity, SmtpSettings,
};
pub use error::{Error, Result};
pub use folder::{Folder, FolderCounts, FolderKind};
pub use handler::{ChannelHandler, LoggingHandler, NoopHandler, ResponseHandler, UnsolicitedEvent};
pub use parser::{
    Address, Envelope, FetchItem, MimePart, PartPath, Response, ResponseParser, ThreadNode,
    UntaggedResponse,
};
pub use pool::{AccountId, PooledSession, SessionPool};
pub use protocol::CommandResult;
pub use session::{FlagOp, PartData, SelectedFolder, Session, SessionConfig, SessionState};
pub use strategy::{ListPath, ListRequest, MessageList, MessageSource, MessageSummary, Paginator};
pub use types::{
    Capability, CapabilitySet, Flag, Flags, ListResponse, Mailbox, MailboxAttribute,
    MailboxStatus, ResponseCode, SeqNum, Status, Tag, Uid, UidSet, UidValidity,
};
