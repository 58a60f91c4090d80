//! ENVELOPE interpretation.

use super::sexpr::SExpr;
use crate::{Error, Result};

/// Number of positional ENVELOPE fields.
const ENVELOPE_ARITY: usize = 10;

/// Parsed message envelope.
///
/// Absent string fields are empty strings and absent address lists are
/// empty vectors; NIL never leaks past the parser.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header, unparsed.
    pub date: String,
    /// Subject header, possibly RFC 2047 encoded.
    pub subject: String,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: String,
    /// Message-ID header.
    pub message_id: String,
}

/// One address from an envelope address list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name.
    pub name: String,
    /// Local part.
    pub mailbox: String,
    /// Domain part.
    pub host: String,
}

impl Envelope {
    /// Interprets the value following `ENVELOPE` in a FETCH response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the value is not a list of
    /// exactly ten fields or an address list is not well formed.
    pub fn parse(value: &SExpr) -> Result<Self> {
        let fields = value
            .as_list()
            .ok_or_else(|| Error::malformed(0, format!("ENVELOPE must be a list, got {}", value.kind())))?;

        if fields.len() != ENVELOPE_ARITY {
            return Err(Error::malformed(
                0,
                format!(
                    "ENVELOPE has {} fields, expected {ENVELOPE_ARITY}",
                    fields.len()
                ),
            ));
        }

        Ok(Self {
            date: text_field(&fields[0], "date")?,
            subject: text_field(&fields[1], "subject")?,
            from: address_list(&fields[2])?,
            sender: address_list(&fields[3])?,
            reply_to: address_list(&fields[4])?,
            to: address_list(&fields[5])?,
            cc: address_list(&fields[6])?,
            bcc: address_list(&fields[7])?,
            in_reply_to: text_field(&fields[8], "in-reply-to")?,
            message_id: text_field(&fields[9], "message-id")?,
        })
    }

    /// Subject with RFC 2047 encoded-words decoded.
    #[must_use]
    pub fn decoded_subject(&self) -> String {
        crate::decode::decode_header(&self.subject)
    }
}

impl Address {
    /// Returns `mailbox@host`, or just the mailbox when there is no host.
    #[must_use]
    pub fn email(&self) -> String {
        if self.host.is_empty() {
            self.mailbox.clone()
        } else {
            format!("{}@{}", self.mailbox, self.host)
        }
    }

    /// Returns the display name if present, otherwise the email.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.email()
        } else {
            crate::decode::decode_header(&self.name)
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email())
        } else {
            write!(f, "\"{}\" <{}>", self.name, self.email())
        }
    }
}

fn text_field(value: &SExpr, field: &str) -> Result<String> {
    match value {
        SExpr::Nil => Ok(String::new()),
        SExpr::List(_) => Err(Error::malformed(
            0,
            format!("ENVELOPE {field} must be a string, got list"),
        )),
        other => Ok(other.nstring().unwrap_or_default()),
    }
}

/// Parses an address list, dropping RFC 2822 group start/end markers.
fn address_list(value: &SExpr) -> Result<Vec<Address>> {
    let entries = match value {
        SExpr::Nil => return Ok(Vec::new()),
        SExpr::List(entries) => entries,
        other => {
            return Err(Error::malformed(
                0,
                format!("Address list must be a list or NIL, got {}", other.kind()),
            ));
        }
    };

    let mut addresses = Vec::with_capacity(entries.len());
    for entry in entries {
        let parts = match entry.as_list() {
            Some(parts) if parts.len() == 4 => parts,
            _ => {
                return Err(Error::malformed(0, "Address must be a 4-element list"));
            }
        };

        // Group syntax: (NIL NIL "group" NIL) opens, (NIL NIL NIL NIL) closes.
        if parts[3].is_nil() {
            continue;
        }

        addresses.push(Address {
            name: parts[0].nstring().unwrap_or_default(),
            mailbox: parts[2].nstring().unwrap_or_default(),
            host: parts[3].nstring().unwrap_or_default(),
        });
    }

    Ok(addresses)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Result<Envelope> {
        Envelope::parse(&SExpr::parse(input)?)
    }

    #[test]
    fn test_full_envelope() {
        let env = parse(
            b"(\"Wed, 17 Jul 1996 02:23:25 -0700\" \"IMAP4rev1 WG mtg summary\" \
              ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) \
              ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) \
              ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) \
              ((NIL NIL \"imap\" \"cac.washington.edu\")) \
              ((NIL NIL \"minutes\" \"CNRI.Reston.VA.US\") (\"John Klensin\" NIL \"KLENSIN\" \"MIT.EDU\")) \
              NIL NIL \"<B27397-0100000@cac.washington.edu>\")",
        )
        .unwrap();

        assert_eq!(env.subject, "IMAP4rev1 WG mtg summary");
        assert_eq!(env.from[0].name, "Terry Gray");
        assert_eq!(env.from[0].email(), "gray@cac.washington.edu");
        assert_eq!(env.cc.len(), 2);
        assert_eq!(env.cc[1].mailbox, "KLENSIN");
        assert!(env.bcc.is_empty());
        assert_eq!(env.in_reply_to, "");
        assert_eq!(env.message_id, "<B27397-0100000@cac.washington.edu>");
    }

    #[test]
    fn test_nil_subject_is_empty_string() {
        let env = parse(b"(NIL NIL NIL NIL NIL NIL NIL NIL NIL NIL)").unwrap();
        assert_eq!(env.subject, "");
        assert_eq!(env.date, "");
        assert!(env.from.is_empty());
        assert!(env.to.is_empty());
    }

    #[test]
    fn test_literal_subject() {
        let env = parse(b"(NIL {5}\r\nHi (x) NIL NIL NIL NIL NIL NIL NIL NIL)").unwrap();
        assert_eq!(env.subject, "Hi (x");
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let err = parse(b"(NIL NIL NIL)").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert!(err.to_string().contains("3 fields"));
    }

    #[test]
    fn test_bad_address_is_malformed() {
        assert!(parse(b"(NIL NIL ((\"a\" NIL)) NIL NIL NIL NIL NIL NIL NIL)").is_err());
    }

    #[test]
    fn test_group_markers_skipped() {
        let env = parse(
            b"(NIL NIL NIL NIL NIL ((NIL NIL \"undisclosed-recipients\" NIL)(NIL NIL NIL NIL)) NIL NIL NIL NIL)",
        )
        .unwrap();
        assert!(env.to.is_empty());
    }

    #[test]
    fn test_address_display() {
        let addr = Address {
            name: "Ann".into(),
            mailbox: "ann".into(),
            host: "example.org".into(),
        };
        assert_eq!(addr.to_string(), "\"Ann\" <ann@example.org>");
        assert_eq!(addr.display_name(), "Ann");
    }
}
