//! One row of a message list.

use chrono::{DateTime, FixedOffset};

use crate::parser::{Address, Envelope, FetchItem};
use crate::types::{Flags, Uid};

/// Everything a message list needs about one message.
///
/// Built from the items of [`crate::command::FetchAttribute::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Message UID.
    pub uid: Uid,
    /// Current flags.
    pub flags: Flags,
    /// RFC822.SIZE in octets.
    pub size: u32,
    /// INTERNALDATE as sent by the server.
    pub internal_date: Option<String>,
    /// Parsed ENVELOPE; empty fields when the server omitted it.
    pub envelope: Envelope,
    /// Message-IDs from the References header, oldest first.
    pub references: Vec<String>,
    /// Depth in the thread tree; 0 outside threaded listings.
    pub depth: u32,
    /// Parent message in the thread tree.
    pub parent: Option<Uid>,
}

impl MessageSummary {
    /// Builds a summary from one FETCH response; `None` without a UID.
    #[must_use]
    pub fn from_fetch(items: &[FetchItem]) -> Option<Self> {
        let mut summary = Self {
            uid: crate::session::uid_of(items)?,
            flags: Flags::default(),
            size: 0,
            internal_date: None,
            envelope: Envelope::default(),
            references: Vec::new(),
            depth: 0,
            parent: None,
        };

        for item in items {
            match item {
                FetchItem::Flags(flags) => summary.flags = flags.clone(),
                FetchItem::Rfc822Size(size) => summary.size = *size,
                FetchItem::InternalDate(date) => summary.internal_date = Some(date.clone()),
                FetchItem::Envelope(envelope) => summary.envelope = (**envelope).clone(),
                FetchItem::Body {
                    section,
                    data: Some(data),
                    ..
                } if is_header_fields(section) => {
                    summary.references = parse_references(data);
                }
                _ => {}
            }
        }
        Some(summary)
    }

    /// `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.is_seen()
    }

    /// `\Answered` is set.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.flags.is_answered()
    }

    /// `\Flagged` is set.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.flags.is_flagged()
    }

    /// `\Deleted` is set.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.flags.is_deleted()
    }

    /// `\Draft` is set.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.flags.is_draft()
    }

    /// `\Recent` is set.
    #[must_use]
    pub fn is_recent(&self) -> bool {
        self.flags.is_recent()
    }

    /// Subject with encoded-words decoded.
    #[must_use]
    pub fn subject(&self) -> String {
        self.envelope.decoded_subject()
    }

    /// First From address.
    #[must_use]
    pub fn from(&self) -> Option<&Address> {
        self.envelope.from.first()
    }

    /// INTERNALDATE as a timestamp.
    #[must_use]
    pub fn arrival(&self) -> Option<DateTime<FixedOffset>> {
        self.internal_date.as_deref().and_then(parse_internal_date)
    }

    /// The Date header, or the arrival time when it is missing or
    /// unparseable.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        parse_header_date(&self.envelope.date).or_else(|| self.arrival())
    }
}

/// Parses an INTERNALDATE such as ` 7-Feb-1994 21:52:25 -0800`.
pub(crate) fn parse_internal_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value.trim(), "%d-%b-%Y %H:%M:%S %z").ok()
}

/// Parses an RFC 5322 Date header.
pub(crate) fn parse_header_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| {
            // Trailing zone comments such as "(PST)".
            let stripped = value.split_once(" (").map_or(value, |(head, _)| head);
            DateTime::parse_from_rfc2822(stripped)
        })
        .ok()
}

fn is_header_fields(section: &str) -> bool {
    section
        .get(..13)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("HEADER.FIELDS"))
}

/// Extracts `<id>` tokens from a References header block.
pub(crate) fn parse_references(header: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(header);
    let mut value = String::new();
    let mut inside = false;
    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if inside {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, rest)) = line.split_once(':') {
            inside = name.trim().eq_ignore_ascii_case("references");
            if inside {
                value.push_str(rest.trim());
            }
        } else {
            inside = false;
        }
    }

    value
        .split('<')
        .skip(1)
        .filter_map(|chunk| chunk.split_once('>'))
        .map(|(id, _)| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| format!("<{id}>"))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{Response, ResponseParser, UntaggedResponse};

    fn fetch_items(line: &[u8]) -> Vec<FetchItem> {
        match ResponseParser::parse(line).unwrap() {
            Response::Untagged(UntaggedResponse::Fetch { items, .. }) => items,
            other => panic!("expected FETCH, got {other:?}"),
        }
    }

    #[test]
    fn test_summary_from_fetch() {
        let items = fetch_items(
            b"* 12 FETCH (UID 4827 FLAGS (\\Seen \\Flagged) RFC822.SIZE 4286 \
INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" \
ENVELOPE (\"Wed, 17 Jul 1996 02:23:25 -0700 (PDT)\" \"IMAP4rev1 WG mtg summary\" \
((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) NIL NIL \
((NIL NIL \"imap\" \"cac.washington.edu\")) NIL NIL NIL \"<B27397-0100000@cac.washington.edu>\") \
BODY[HEADER.FIELDS (REFERENCES)] {49}\r\n\
References: <a@example.com>\r\n <b@example.com>\r\n\r\n)\r\n",
        );

        let summary = MessageSummary::from_fetch(&items).unwrap();

        assert_eq!(summary.uid.get(), 4827);
        assert!(summary.is_seen() && summary.is_flagged());
        assert!(!summary.is_answered());
        assert_eq!(summary.size, 4286);
        assert_eq!(summary.subject(), "IMAP4rev1 WG mtg summary");
        assert_eq!(summary.from().unwrap().email(), "gray@cac.washington.edu");
        assert_eq!(summary.references, ["<a@example.com>", "<b@example.com>"]);
        assert_eq!(
            summary.date().unwrap().to_rfc3339(),
            "1996-07-17T02:23:25-07:00"
        );
        assert_eq!(
            summary.arrival().unwrap().to_rfc3339(),
            "1996-07-17T02:44:25-07:00"
        );
    }

    #[test]
    fn test_without_uid() {
        assert!(MessageSummary::from_fetch(&[FetchItem::Rfc822Size(10)]).is_none());
    }

    #[test]
    fn test_date_falls_back_to_arrival() {
        let mut summary = MessageSummary::from_fetch(&[
            FetchItem::Uid(Uid::new(1).unwrap()),
            FetchItem::InternalDate(" 7-Feb-1994 21:52:25 -0800".into()),
        ])
        .unwrap();
        summary.envelope.date = "not a date".into();

        assert_eq!(summary.date(), summary.arrival());
        assert!(summary.date().is_some());
    }

    #[test]
    fn test_references_ignore_other_headers() {
        let header = b"In-Reply-To: <x@y>\r\nReferences:\r\n\t<1@h> <2@h>\r\nX-Other: <3@h>\r\n";
        assert_eq!(parse_references(header), ["<1@h>", "<2@h>"]);
        assert!(parse_references(b"\r\n").is_empty());
    }
}
