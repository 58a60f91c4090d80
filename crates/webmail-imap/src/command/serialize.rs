//! Command serialization helpers.
//!
//! Strings that cannot travel inside a quoted string (CR, LF, NUL or 8-bit
//! bytes) are sent as literals. A synchronizing literal splits the command
//! into parts: each part after the first is sent only once the server has
//! answered the previous `{n}` with a `+` continuation request.

use std::ops::{Deref, DerefMut};

use crate::types::{Flag, Mailbox};

use super::types::{FetchAttribute, SearchCriteria, StoreAction};

/// Command bytes under construction, split at synchronizing literals.
#[derive(Debug, Default)]
pub struct Encoder {
    literal_plus: bool,
    parts: Vec<Vec<u8>>,
    line: Vec<u8>,
}

impl Encoder {
    /// Starts a command; `literal_plus` allows `{n+}` literals (RFC 7888).
    pub fn new(literal_plus: bool) -> Self {
        Self {
            literal_plus,
            ..Self::default()
        }
    }

    /// Writes `data` as a literal.
    pub fn literal(&mut self, data: &[u8]) {
        if self.literal_plus {
            self.line
                .extend_from_slice(format!("{{{}+}}\r\n", data.len()).as_bytes());
        } else {
            self.line
                .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
            self.parts.push(std::mem::take(&mut self.line));
        }
        self.line.extend_from_slice(data);
    }

    /// Ends the command with CRLF and returns its parts.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.line.extend_from_slice(b"\r\n");
        self.parts.push(self.line);
        self.parts
    }
}

impl Deref for Encoder {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.line
    }
}

impl DerefMut for Encoder {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.line
    }
}

/// Writes an astring: atom, quoted string or literal.
pub fn write_astring(buf: &mut Encoder, s: &str) {
    if s.bytes().any(needs_literal) {
        buf.literal(s.as_bytes());
    } else if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes a mailbox name.
pub fn write_mailbox(buf: &mut Encoder, mailbox: &Mailbox) {
    write_astring(buf, mailbox.as_str());
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}

/// Returns true if the byte is not allowed inside a quoted string.
const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\0' | b'\r' | b'\n') || b >= 0x80
}

/// Writes FETCH items; a single item goes without parentheses.
pub fn write_fetch_items(buf: &mut Encoder, items: &[FetchAttribute]) {
    if let [only] = items {
        write_fetch_attribute(buf, only);
        return;
    }
    buf.push(b'(');
    for (i, attr) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_fetch_attribute(buf, attr);
    }
    buf.push(b')');
}

/// Writes a single FETCH attribute.
pub fn write_fetch_attribute(buf: &mut Encoder, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Flags => buf.extend_from_slice(b"FLAGS"),
        FetchAttribute::InternalDate => buf.extend_from_slice(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.extend_from_slice(b"RFC822.SIZE"),
        FetchAttribute::Envelope => buf.extend_from_slice(b"ENVELOPE"),
        FetchAttribute::BodyStructure => buf.extend_from_slice(b"BODYSTRUCTURE"),
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Body {
            section,
            peek,
            partial,
        } => {
            if *peek {
                buf.extend_from_slice(b"BODY.PEEK[");
            } else {
                buf.extend_from_slice(b"BODY[");
            }
            if let Some(s) = section {
                buf.extend_from_slice(s.as_bytes());
            }
            buf.push(b']');
            if let Some((start, len)) = partial {
                buf.extend_from_slice(format!("<{start}.{len}>").as_bytes());
            }
        }
    }
}

/// Writes STORE action.
pub fn write_store_action(buf: &mut Encoder, action: &StoreAction, silent: bool) {
    let (prefix, flags) = match action {
        StoreAction::SetFlags(f) => ("FLAGS", f),
        StoreAction::AddFlags(f) => ("+FLAGS", f),
        StoreAction::RemoveFlags(f) => ("-FLAGS", f),
    };
    buf.extend_from_slice(prefix.as_bytes());
    if silent {
        buf.extend_from_slice(b".SILENT");
    }
    buf.extend_from_slice(b" ");
    write_flag_list(buf, flags);
}

/// Writes a parenthesized flag list.
pub fn write_flag_list(buf: &mut Encoder, flags: &[Flag]) {
    buf.push(b'(');
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(flag.as_str().as_bytes());
    }
    buf.push(b')');
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut Encoder, criteria: &SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Answered => buf.extend_from_slice(b"ANSWERED"),
        SearchCriteria::Deleted => buf.extend_from_slice(b"DELETED"),
        SearchCriteria::Draft => buf.extend_from_slice(b"DRAFT"),
        SearchCriteria::Flagged => buf.extend_from_slice(b"FLAGGED"),
        SearchCriteria::New => buf.extend_from_slice(b"NEW"),
        SearchCriteria::Undeleted => buf.extend_from_slice(b"UNDELETED"),
        SearchCriteria::Unseen => buf.extend_from_slice(b"UNSEEN"),
        SearchCriteria::Seen => buf.extend_from_slice(b"SEEN"),
        SearchCriteria::UidSet(set) => {
            buf.extend_from_slice(b"UID ");
            buf.extend_from_slice(set.to_string().as_bytes());
        }
        SearchCriteria::Subject(s) => {
            buf.extend_from_slice(b"SUBJECT ");
            write_astring(buf, s);
        }
        SearchCriteria::From(s) => {
            buf.extend_from_slice(b"FROM ");
            write_astring(buf, s);
        }
        SearchCriteria::To(s) => {
            buf.extend_from_slice(b"TO ");
            write_astring(buf, s);
        }
        SearchCriteria::Body(s) => {
            buf.extend_from_slice(b"BODY ");
            write_astring(buf, s);
        }
        SearchCriteria::Text(s) => {
            buf.extend_from_slice(b"TEXT ");
            write_astring(buf, s);
        }
        SearchCriteria::Since(date) => {
            buf.extend_from_slice(b"SINCE ");
            buf.extend_from_slice(date.as_bytes());
        }
        SearchCriteria::Before(date) => {
            buf.extend_from_slice(b"BEFORE ");
            buf.extend_from_slice(date.as_bytes());
        }
        SearchCriteria::On(date) => {
            buf.extend_from_slice(b"ON ");
            buf.extend_from_slice(date.as_bytes());
        }
        SearchCriteria::Larger(size) => {
            buf.extend_from_slice(format!("LARGER {size}").as_bytes());
        }
        SearchCriteria::Smaller(size) => {
            buf.extend_from_slice(format!("SMALLER {size}").as_bytes());
        }
        SearchCriteria::Header(name, value) => {
            buf.extend_from_slice(b"HEADER ");
            write_astring(buf, name);
            buf.push(b' ');
            write_astring(buf, value);
        }
        SearchCriteria::And(criteria) if criteria.is_empty() => buf.extend_from_slice(b"ALL"),
        SearchCriteria::And(criteria) => {
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_search_criteria(buf, c);
            }
        }
        SearchCriteria::Or(a, b) => {
            buf.extend_from_slice(b"OR ");
            write_search_operand(buf, a);
            buf.push(b' ');
            write_search_operand(buf, b);
        }
        SearchCriteria::Not(c) => {
            buf.extend_from_slice(b"NOT ");
            write_search_operand(buf, c);
        }
    }
}

/// Writes an operand of OR/NOT; conjunctions need parentheses there.
fn write_search_operand(buf: &mut Encoder, criteria: &SearchCriteria) {
    if matches!(criteria, SearchCriteria::And(c) if c.len() > 1) {
        buf.push(b'(');
        write_search_criteria(buf, criteria);
        buf.push(b')');
    } else {
        write_search_criteria(buf, criteria);
    }
}
