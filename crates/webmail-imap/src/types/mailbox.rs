//! Mailbox names, LIST data and selected-folder metadata.

use std::borrow::Cow;

use base64::Engine;
use base64::alphabet::IMAP_MUTF7;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::{Flags, SeqNum, Uid, UidValidity};

const MUTF7: GeneralPurpose = GeneralPurpose::new(
    &IMAP_MUTF7,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Mailbox name as sent on the wire, in modified UTF-7 (RFC 3501 5.1.3).
///
/// Commands always carry the wire form; [`Mailbox::decoded`] is for display.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with modified UTF-7 decoded.
    ///
    /// Shifts that do not decode are kept verbatim.
    #[must_use]
    pub fn decoded(&self) -> Cow<'_, str> {
        decode_utf7(&self.0)
    }

    /// INBOX is case-insensitive.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decodes modified UTF-7: `&-` is a literal `&`, and `&...-` wraps
/// base64 (with `,` for `/`) of UTF-16BE code units.
#[must_use]
pub fn decode_utf7(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let shifted = &rest[start + 1..];
        let run = shifted
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b','))
            .count();
        let close = usize::from(shifted.as_bytes().get(run) == Some(&b'-'));
        let encoded = &shifted[..run];

        if encoded.is_empty() {
            out.push('&');
        } else if let Ok(bytes) = MUTF7.decode(encoded) {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            out.push_str(&String::from_utf16_lossy(&units));
        } else {
            out.push_str(&rest[start..start + 1 + run + close]);
        }
        rest = &shifted[run + close..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Metadata of the selected folder, replaced on every SELECT/EXAMINE and
/// kept current by unsolicited EXISTS/RECENT/EXPUNGE/FLAGS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message.
    pub unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined for the folder.
    pub flags: Flags,
    /// Flags that can be stored permanently.
    pub permanent_flags: Flags,
    /// Selected with EXAMINE or the server forced read-only.
    pub read_only: bool,
}

/// One LIST or LSUB line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Name attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter; `None` for flat namespaces.
    pub delimiter: Option<char>,
    /// Full mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true if the folder can be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }
}

/// Mailbox name attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NonExistent` (LIST-EXTENDED)
    NonExistent,
    /// `\Noinferiors`
    NoInferiors,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\Subscribed`
    Subscribed,
    /// `\All` (SPECIAL-USE)
    All,
    /// `\Archive` (SPECIAL-USE)
    Archive,
    /// `\Drafts` (SPECIAL-USE)
    Drafts,
    /// `\Flagged` (SPECIAL-USE)
    Flagged,
    /// `\Junk` (SPECIAL-USE)
    Junk,
    /// `\Sent` (SPECIAL-USE)
    Sent,
    /// `\Trash` (SPECIAL-USE)
    Trash,
    /// Anything else, verbatim.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses an attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\SUBSCRIBED" => Self::Subscribed,
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Wire form of the attribute.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoSelect => "\\Noselect",
            Self::NonExistent => "\\NonExistent",
            Self::NoInferiors => "\\Noinferiors",
            Self::HasNoChildren => "\\HasNoChildren",
            Self::HasChildren => "\\HasChildren",
            Self::Marked => "\\Marked",
            Self::Unmarked => "\\Unmarked",
            Self::Subscribed => "\\Subscribed",
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Flagged => "\\Flagged",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
            Self::Unknown(s) => s,
        }
    }
}
