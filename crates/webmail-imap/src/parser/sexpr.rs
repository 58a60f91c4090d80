//! Generic nested-list values.
//!
//! Every structured piece of IMAP server data (FETCH attribute lists,
//! BODYSTRUCTURE, ENVELOPE, THREAD) is first read into an [`SExpr`] tree
//! and then interpreted by a typed parser. The tree is immutable once built.

use std::borrow::Cow;
use std::fmt::Write as _;

use super::lexer::{Lexer, Token};
use crate::{Error, Result};

/// Maximum list nesting accepted from the wire.
const MAX_DEPTH: usize = 128;

/// A parsed IMAP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    /// Bare atom. Section specifiers such as `BODY[1.2]<0>` are kept whole.
    Atom(String),
    /// Quoted string or literal payload.
    String(Vec<u8>),
    /// All-digit atom.
    Number(u64),
    /// NIL.
    Nil,
    /// Parenthesized list.
    List(Vec<SExpr>),
}

impl SExpr {
    /// Parses exactly one value from `input`; a trailing CRLF is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] on unbalanced parentheses,
    /// truncated literals or trailing data.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        lexer.skip_spaces();
        let value = Self::read(&mut lexer)?;
        lexer.skip_spaces();
        if !lexer.at_line_end() {
            return Err(lexer.error("Trailing data after value"));
        }
        Ok(value)
    }

    /// Parses a flat sequence of space-separated top-level values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if any item is malformed.
    pub fn parse_all(input: &[u8]) -> Result<Vec<Self>> {
        let mut lexer = Lexer::new(input);
        Self::read_sequence(&mut lexer)
    }

    /// Reads top-level values until the end of the line.
    pub(crate) fn read_sequence(lexer: &mut Lexer<'_>) -> Result<Vec<Self>> {
        let mut items = Vec::new();
        loop {
            lexer.skip_spaces();
            if lexer.at_line_end() {
                return Ok(items);
            }
            items.push(Self::read(lexer)?);
        }
    }

    /// Reads one value, descending into lists.
    pub(crate) fn read(lexer: &mut Lexer<'_>) -> Result<Self> {
        let mut stack: Vec<Vec<Self>> = Vec::new();

        loop {
            let value = match lexer.next_token()? {
                Token::LParen => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(lexer.error("List nesting too deep"));
                    }
                    stack.push(Vec::new());
                    continue;
                }
                Token::RParen => match stack.pop() {
                    Some(items) => Self::List(items),
                    None => return Err(lexer.error("Unbalanced ')'")),
                },
                Token::Space if !stack.is_empty() => continue,
                Token::Atom(atom) => Self::Atom(read_atom_tail(lexer, atom)?),
                Token::Number(n) => Self::Number(n),
                Token::QuotedString(s) => Self::String(s.into_bytes()),
                Token::Literal(data) => Self::String(data),
                Token::Nil => Self::Nil,
                Token::Crlf | Token::Eof if !stack.is_empty() => {
                    return Err(lexer.error("Unbalanced '(' at end of input"));
                }
                token => {
                    return Err(lexer.error(&format!("Unexpected {} in value", token.kind())));
                }
            };

            match stack.last_mut() {
                Some(list) => list.push(value),
                None => return Ok(value),
            }
        }
    }

    /// Returns the atom text.
    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the raw bytes of a string value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the textual form of a string, atom or number.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::String(b) => Some(String::from_utf8_lossy(b)),
            Self::Atom(s) => Some(Cow::Borrowed(s)),
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the number.
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the list items.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for NIL.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Text of an nstring: NIL maps to `None`.
    #[must_use]
    pub fn nstring(&self) -> Option<String> {
        self.as_text().map(Cow::into_owned)
    }

    /// Short name used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Nil => "NIL",
            Self::List(_) => "list",
        }
    }

    /// Serializes the value back to wire syntax.
    ///
    /// Strings that cannot be quoted (CR, LF, NUL or 8-bit bytes) are
    /// emitted as literals.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_wire(&mut out);
        out
    }

    fn write_wire(&self, out: &mut Vec<u8>) {
        match self {
            Self::Atom(s) => out.extend_from_slice(s.as_bytes()),
            Self::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
            Self::Nil => out.extend_from_slice(b"NIL"),
            Self::String(bytes) => {
                if bytes.iter().any(|&b| b == b'\r' || b == b'\n' || b == 0 || b > 0x7F) {
                    let mut prefix = String::new();
                    let _ = write!(prefix, "{{{}}}\r\n", bytes.len());
                    out.extend_from_slice(prefix.as_bytes());
                    out.extend_from_slice(bytes);
                } else {
                    out.push(b'"');
                    for &b in bytes {
                        if b == b'"' || b == b'\\' {
                            out.push(b'\\');
                        }
                        out.push(b);
                    }
                    out.push(b'"');
                }
            }
            Self::List(items) => {
                out.push(b'(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_wire(out);
                }
                out.push(b')');
            }
        }
    }
}

/// Glues a section specifier and partial origin onto an atom.
///
/// `BODY[HEADER.FIELDS (REFERENCES)]<0>` lexes as an atom followed by
/// bracketed tokens; it is one FETCH attribute name.
fn read_atom_tail(lexer: &mut Lexer<'_>, atom: &str) -> Result<String> {
    let mut name = atom.to_string();

    if lexer.peek() == Some(b'[') {
        let start = lexer.position();
        let mut depth = 0usize;
        loop {
            match lexer.advance() {
                Some(b'[') => depth += 1,
                Some(b']') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(b'\r' | b'\n') | None => {
                    return Err(lexer.error("Unterminated section specifier"));
                }
                Some(_) => {}
            }
        }
        name.push_str(&String::from_utf8_lossy(lexer.consumed_since(start)));

        if lexer.peek() == Some(b'<') {
            let start = lexer.position();
            while let Some(b) = lexer.advance() {
                if b == b'>' {
                    break;
                }
                if !b.is_ascii_digit() && b != b'<' && b != b'.' {
                    return Err(lexer.error("Invalid partial origin"));
                }
            }
            name.push_str(&String::from_utf8_lossy(lexer.consumed_since(start)));
        }
    }

    Ok(name)
}
