//! Core IMAP types.
//!
//! This module defines the fundamental types used throughout the crate,
//! following RFC 3501 (`IMAP4rev1`) with the extensions a webmail client
//! relies on (SORT, THREAD, UIDPLUS, MOVE, LITERAL+).

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, CapabilitySet, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute, MailboxStatus, decode_utf7};
pub use response_code::ResponseCode;
pub use sequence::UidSet;
