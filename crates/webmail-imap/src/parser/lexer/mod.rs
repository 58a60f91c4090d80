//! Tokenizer for IMAP server output.
//!
//! Breaks one complete response (as delivered by the framing layer, with
//! any `{n}` literal payloads already inlined) into [`Token`]s. Literal
//! payloads are taken verbatim by byte count, so embedded parentheses,
//! quotes or CRLFs never confuse the structure.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Returns the bytes between `start` and the current position.
    #[must_use]
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.input[start.min(self.pos)..self.pos]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Returns true if the rest of the input is only a line terminator.
    #[must_use]
    pub fn at_line_end(&self) -> bool {
        matches!(self.remaining(), [] | [b'\r', b'\n'] | [b'\n'])
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' => {
                if self.peek_at(1) == Some(b'\n') {
                    self.skip(2);
                    Ok(Token::Crlf)
                } else {
                    Err(self.error("Expected LF after CR"))
                }
            }
            // Some servers terminate lines with a bare LF.
            b'\n' => {
                self.advance();
                Ok(Token::Crlf)
            }
            b' ' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'*' => {
                self.advance();
                Ok(Token::Asterisk)
            }
            b'+' => {
                self.advance();
                Ok(Token::Plus)
            }
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string token.
    ///
    /// `\"` and `\\` are unescaped; any other backslash pair is kept as-is.
    /// Non-UTF-8 bytes are replaced rather than rejected, since servers
    /// routinely echo raw 8-bit header text.
    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();

        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    Some(c) => {
                        result.push(b'\\');
                        result.push(c);
                    }
                    None => return Err(self.error("Unexpected end of input in quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("Unterminated quoted string"));
                }
                Some(c) => result.push(c),
            }
        }

        Ok(Token::QuotedString(
            String::from_utf8_lossy(&result).into_owned(),
        ))
    }

    /// Reads a literal: `{n}` CRLF followed by exactly n bytes.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();

        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];
        if digits.is_empty() {
            return Err(self.error("Missing literal size"));
        }

        // LITERAL+ / LITERAL- marker
        if self.peek() == Some(b'+') || self.peek() == Some(b'-') {
            self.advance();
        }

        if self.advance() != Some(b'}') {
            return Err(self.error("Expected } after literal size"));
        }

        match (self.peek(), self.peek_at(1)) {
            (Some(b'\r'), Some(b'\n')) => self.skip(2),
            (Some(b'\n'), _) => self.skip(1),
            _ => return Err(self.error("Expected CRLF after literal size")),
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        if self.input.len() - self.pos < size {
            return Err(self.error(&format!(
                "Incomplete literal data: expected {size} bytes, got {}",
                self.input.len() - self.pos
            )));
        }

        let data = self.input[self.pos..self.pos + size].to_vec();
        self.skip(size);

        Ok(Token::Literal(data))
    }

    /// Reads a number or atom starting with a digit.
    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let mut all_digits = true;

        while let Some(b) = self.peek() {
            if is_atom_char(b) {
                if !b.is_ascii_digit() {
                    all_digits = false;
                }
                self.advance();
            } else {
                break;
            }
        }

        let s = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if all_digits {
            let n: u64 = s.parse().map_err(|_| self.error("Number too large"))?;
            Ok(Token::Number(n))
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Reads an atom token.
    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;

        // The `\*` flag in PERMANENTFLAGS is a single atom.
        if self.peek() == Some(b'\\') && self.peek_at(1) == Some(b'*') {
            self.skip(2);
        }

        while let Some(b) = self.peek() {
            if is_atom_char(b) {
                self.advance();
            } else {
                break;
            }
        }

        let s = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Creates a malformed response error at the current position.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::malformed(self.pos, message)
    }

    /// Expects and consumes a specific token.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!(
                "Expected {}, got {}",
                expected.kind(),
                token.kind()
            )))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an astring (atom, number, or string).
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            // A mailbox literally named "NIL" arrives unquoted.
            Token::Nil => Ok("NIL".to_string()),
            token => Err(self.error(&format!("Expected astring, got {}", token.kind()))),
        }
    }

    /// Reads a nstring (NIL or string).
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s)),
            Token::Literal(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            token => Err(self.error(&format!("Expected nstring, got {}", token.kind()))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {}", token.kind()))),
        }
    }

    /// Reads a number that must fit in 32 bits.
    pub fn read_u32(&mut self) -> Result<u32> {
        let n = self.read_number()?;
        u32::try_from(n).map_err(|_| self.error("Number out of 32-bit range"))
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {}", token.kind()))),
        }
    }

    /// Skips optional spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }
}

/// Returns true if the byte is a valid atom character.
///
/// `\` is accepted so that system flags like `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    // atom-specials = "(" / ")" / "{" / SP / CTL / "%" / "*" / DQUOTE / "]"
    matches!(b,
        0x21 |
        0x23..=0x24 |
        0x26..=0x27 |
        0x2B..=0x5A |
        0x5C |
        0x5E..=0x7A |
        0x7C |
        0x7E
    )
}
