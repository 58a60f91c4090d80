//! Response codes.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Bracketed response code carried by a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY response piggybacked on a status line.
    Capability(Vec<Capability>),
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// ALREADYEXISTS (RFC 5530): target mailbox is already there.
    AlreadyExists,
    /// NONEXISTENT (RFC 5530): target mailbox is not there.
    NonExistent,
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(UidValidity),
    /// UNSEEN: First unseen message sequence number.
    Unseen(SeqNum),
    /// APPENDUID: UID assigned to appended message.
    AppendUid {
        /// UIDVALIDITY of the mailbox.
        uidvalidity: UidValidity,
        /// UID of the appended message.
        uid: Uid,
    },
    /// COPYUID: UIDs of copied messages.
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uidvalidity: UidValidity,
        /// Source UIDs.
        source_uids: Vec<Uid>,
        /// Destination UIDs.
        dest_uids: Vec<Uid>,
    },
    /// Unknown response code.
    Unknown(String),
}

impl ResponseCode {
    /// Parses the atom of a code that carries no arguments.
    #[must_use]
    pub fn from_atom(atom: &str) -> Self {
        match atom.to_uppercase().as_str() {
            "ALERT" => Self::Alert,
            "PARSE" => Self::Parse,
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "TRYCREATE" => Self::TryCreate,
            "ALREADYEXISTS" => Self::AlreadyExists,
            "NONEXISTENT" => Self::NonExistent,
            "AUTHENTICATIONFAILED" => Self::AuthenticationFailed,
            _ => Self::Unknown(atom.to_string()),
        }
    }
}
