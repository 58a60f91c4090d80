//! Command-related type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Flag, UidSet};
use crate::Error;

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusAttribute {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch range.
        partial: Option<(u32, u32)>,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[section]`.
    #[must_use]
    pub fn peek(section: impl Into<String>) -> Self {
        let section = section.into();
        Self::Body {
            section: (!section.is_empty()).then_some(section),
            peek: true,
            partial: None,
        }
    }

    /// Items needed to render a message list row.
    #[must_use]
    pub fn summary() -> Vec<Self> {
        vec![
            Self::Uid,
            Self::Flags,
            Self::Rfc822Size,
            Self::InternalDate,
            Self::Envelope,
            Self::peek("HEADER.FIELDS (REFERENCES)"),
        ]
    }
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with \Answered flag.
    Answered,
    /// Messages with \Deleted flag.
    Deleted,
    /// Messages with \Draft flag.
    Draft,
    /// Messages with \Flagged flag.
    Flagged,
    /// Messages with \Recent and without \Seen.
    New,
    /// Messages without \Deleted flag.
    Undeleted,
    /// Messages without \Seen flag.
    Unseen,
    /// Messages with \Seen flag.
    Seen,
    /// UID set.
    UidSet(UidSet),
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Body contains text.
    Body(String),
    /// Text in header or body.
    Text(String),
    /// Messages since date (`1-Feb-1994`).
    Since(String),
    /// Messages before date.
    Before(String),
    /// Messages on date.
    On(String),
    /// Larger than size.
    Larger(u32),
    /// Smaller than size.
    Smaller(u32),
    /// Header field contains value.
    Header(String, String),
    /// AND of criteria.
    And(Vec<Self>),
    /// OR of criteria.
    Or(Box<Self>, Box<Self>),
    /// NOT of criteria.
    Not(Box<Self>),
}

/// A SORT key (RFC 5256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortKey {
    /// Internal date.
    Arrival,
    /// First Cc mailbox.
    Cc,
    /// Date header, falling back to internal date.
    Date,
    /// First From mailbox.
    From,
    /// RFC822 size.
    Size,
    /// Base subject.
    Subject,
    /// First To mailbox.
    To,
}

impl SortKey {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Cc => "CC",
            Self::Date => "DATE",
            Self::From => "FROM",
            Self::Size => "SIZE",
            Self::Subject => "SUBJECT",
            Self::To => "TO",
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ARRIVAL" => Ok(Self::Arrival),
            "CC" => Ok(Self::Cc),
            "DATE" => Ok(Self::Date),
            "FROM" => Ok(Self::From),
            "SIZE" => Ok(Self::Size),
            "SUBJECT" => Ok(Self::Subject),
            "TO" => Ok(Self::To),
            _ => Err(Error::Config(format!("unknown sort key: {s}"))),
        }
    }
}

/// One term of a sort program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriterion {
    /// Key to compare.
    pub key: SortKey,
    /// Descending order.
    pub reverse: bool,
}

/// An ordered list of sort criteria, written `-DATE SUBJECT` in settings.
///
/// The default program is `-DATE` (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortProgram(Vec<SortCriterion>);

impl SortProgram {
    /// Creates a program from criteria; an empty list means the default.
    #[must_use]
    pub fn new(criteria: Vec<SortCriterion>) -> Self {
        if criteria.is_empty() {
            Self::default()
        } else {
            Self(criteria)
        }
    }

    /// A single ascending key.
    #[must_use]
    pub fn ascending(key: SortKey) -> Self {
        Self(vec![SortCriterion { key, reverse: false }])
    }

    /// A single descending key.
    #[must_use]
    pub fn descending(key: SortKey) -> Self {
        Self(vec![SortCriterion { key, reverse: true }])
    }

    /// The criteria, most significant first.
    #[must_use]
    pub fn criteria(&self) -> &[SortCriterion] {
        &self.0
    }

    /// Wire form: `(REVERSE DATE SUBJECT)`.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let terms: Vec<String> = self
            .0
            .iter()
            .map(|c| {
                if c.reverse {
                    format!("REVERSE {}", c.key.as_str())
                } else {
                    c.key.as_str().to_string()
                }
            })
            .collect();
        format!("({})", terms.join(" "))
    }
}

impl Default for SortProgram {
    fn default() -> Self {
        Self::descending(SortKey::Date)
    }
}

impl FromStr for SortProgram {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let criteria = s
            .split_whitespace()
            .map(|term| {
                let (reverse, name) = term
                    .strip_prefix('-')
                    .map_or((false, term), |rest| (true, rest));
                Ok(SortCriterion {
                    key: name.parse()?,
                    reverse,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self::new(criteria))
    }
}

impl fmt::Display for SortProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if c.reverse {
                f.write_str("-")?;
            }
            f.write_str(c.key.as_str())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for SortProgram {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SortProgram> for String {
    fn from(program: SortProgram) -> Self {
        program.to_string()
    }
}

/// A THREAD algorithm (RFC 5256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreadAlgorithm {
    /// Threads by References/In-Reply-To headers.
    References,
    /// Threads by base subject, ordered by date.
    OrderedSubject,
}

impl ThreadAlgorithm {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::References => "REFERENCES",
            Self::OrderedSubject => "ORDEREDSUBJECT",
        }
    }

    /// Picks the best advertised algorithm, preferring REFERENCES.
    #[must_use]
    pub fn preferred(advertised: &[String]) -> Option<Self> {
        [Self::References, Self::OrderedSubject]
            .into_iter()
            .find(|alg| advertised.iter().any(|a| a.eq_ignore_ascii_case(alg.as_str())))
    }
}
