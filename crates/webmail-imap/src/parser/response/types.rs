//! Response data types.

use crate::parser::bodystructure::MimePart;
use crate::parser::envelope::Envelope;
use crate::parser::thread::ThreadNode;
use crate::types::{
    Capability, Flags, ListResponse, Mailbox, ResponseCode, SeqNum, Status, Uid, UidValidity,
};

/// FETCH response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Flags),
    /// Internal date, as sent (`17-Jul-1996 02:44:25 -0700`).
    InternalDate(String),
    /// RFC822 size.
    Rfc822Size(u32),
    /// Envelope.
    Envelope(Box<Envelope>),
    /// UID.
    Uid(Uid),
    /// BODY section. `RFC822`, `RFC822.HEADER` and `RFC822.TEXT` map here
    /// with sections `""`, `HEADER` and `TEXT`.
    Body {
        /// Section specifier without brackets; empty for the whole message.
        section: String,
        /// Origin octet of a partial fetch.
        origin: Option<u32>,
        /// Body data; `None` when the server sent NIL.
        data: Option<Vec<u8>>,
    },
    /// BODYSTRUCTURE (or the non-extensible BODY form).
    BodyStructure(Box<MimePart>),
}

/// STATUS response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// Number of messages.
    Messages(u32),
    /// Number of recent messages.
    Recent(u32),
    /// Next UID.
    UidNext(Uid),
    /// UIDVALIDITY value.
    UidValidity(UidValidity),
    /// Number of unseen messages.
    Unseen(u32),
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK response with optional code.
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// NO response.
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BAD response.
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// PREAUTH greeting.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BYE response.
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// LIST response.
    List(ListResponse),
    /// LSUB response.
    Lsub(ListResponse),
    /// FLAGS response.
    Flags(Flags),
    /// EXISTS response (message count).
    Exists(u32),
    /// RECENT response.
    Recent(u32),
    /// EXPUNGE response.
    Expunge(SeqNum),
    /// FETCH response.
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Attributes in server order.
        items: Vec<FetchItem>,
    },
    /// SEARCH response; UIDs for `UID SEARCH`.
    Search(Vec<u32>),
    /// SORT response, in sorted order.
    Sort(Vec<u32>),
    /// THREAD response.
    Thread(Vec<ThreadNode>),
    /// STATUS response.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items.
        items: Vec<StatusItem>,
    },
    /// Any other untagged data, kept so callers can log it.
    Other {
        /// Leading keyword, uppercased.
        keyword: String,
        /// Rest of the line.
        text: String,
    },
}

impl UntaggedResponse {
    /// Returns the status, code and text of a status response.
    #[must_use]
    pub fn as_status(&self) -> Option<(Status, Option<&ResponseCode>, &str)> {
        match self {
            Self::Ok { code, text } => Some((Status::Ok, code.as_ref(), text)),
            Self::No { code, text } => Some((Status::No, code.as_ref(), text)),
            Self::Bad { code, text } => Some((Status::Bad, code.as_ref(), text)),
            Self::PreAuth { code, text } => Some((Status::PreAuth, code.as_ref(), text)),
            Self::Bye { code, text } => Some((Status::Bye, code.as_ref(), text)),
            _ => None,
        }
    }

    /// Wire keyword of the response (`FETCH`, `EXISTS`, ...).
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Ok { .. } => "OK",
            Self::No { .. } => "NO",
            Self::Bad { .. } => "BAD",
            Self::PreAuth { .. } => "PREAUTH",
            Self::Bye { .. } => "BYE",
            Self::Capability(_) => "CAPABILITY",
            Self::List(_) => "LIST",
            Self::Lsub(_) => "LSUB",
            Self::Flags(_) => "FLAGS",
            Self::Exists(_) => "EXISTS",
            Self::Recent(_) => "RECENT",
            Self::Expunge(_) => "EXPUNGE",
            Self::Fetch { .. } => "FETCH",
            Self::Search(_) => "SEARCH",
            Self::Sort(_) => "SORT",
            Self::Thread(_) => "THREAD",
            Self::Status { .. } => "STATUS",
            Self::Other { keyword, .. } => keyword,
        }
    }

    /// Returns the FETCH items if this is a FETCH response.
    #[must_use]
    pub fn fetch_items(&self) -> Option<&[FetchItem]> {
        match self {
            Self::Fetch { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Builds a status response from its parts.
    #[must_use]
    pub fn status(status: Status, code: Option<ResponseCode>, text: String) -> Self {
        match status {
            Status::Ok => Self::Ok { code, text },
            Status::No => Self::No { code, text },
            Status::Bad => Self::Bad { code, text },
            Status::PreAuth => Self::PreAuth { code, text },
            Status::Bye => Self::Bye { code, text },
        }
    }
}
