//! IMAP response parser.
//!
//! Parses one complete server response (a line plus any literals it
//! announced) into a [`Response`].

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::match_same_arms)]

mod fetch;
mod helpers;
mod types;

pub use fetch::{parse_fetch_items, parse_flags};
pub use types::{FetchItem, StatusItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::parser::sexpr::SExpr;
use crate::parser::thread::parse_threads;
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::Result;

use helpers::{
    parse_capability_data, parse_list_response, parse_number_list, parse_response_code,
    parse_status_response, read_text_until_crlf,
};

pub(crate) use helpers::parse_flag_list;

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text/data.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(tag) => Self::parse_tagged(&mut lexer, &tag.to_string()),
            token => Err(lexer.error(&format!("Expected *, +, or tag, got {}", token.kind()))),
        }
    }

    /// Returns the tag of a line that looks tagged, without parsing it.
    ///
    /// Used to route a response that failed to parse to its command.
    #[must_use]
    pub fn peek_tag(input: &[u8]) -> Option<&str> {
        let end = input.iter().position(|&b| b == b' ')?;
        let tag = std::str::from_utf8(&input[..end]).ok()?;
        (!tag.is_empty() && tag != "*" && tag != "+").then_some(tag)
    }

    /// Returns the uppercased keyword of an untagged line without parsing
    /// it, skipping a leading message number (`* 3 FETCH ...` gives `FETCH`).
    #[must_use]
    pub fn peek_keyword(input: &[u8]) -> Option<String> {
        let rest = input.strip_prefix(b"* ")?;
        let mut words = rest
            .split(|&b| matches!(b, b' ' | b'\r' | b'\n' | b'(' | b'['))
            .filter(|w| !w.is_empty());
        let mut word = words.next()?;
        if word.iter().all(u8::is_ascii_digit) {
            word = words.next()?;
        }
        std::str::from_utf8(word).ok().map(str::to_ascii_uppercase)
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag_str: &str) -> Result<Response> {
        lexer.expect_space()?;

        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag_str),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(s) => {
                let upper = s.to_uppercase();
                match upper.as_str() {
                    "OK" | "NO" | "BAD" | "PREAUTH" | "BYE" => {
                        let status = status_from_keyword(&upper)
                            .ok_or_else(|| lexer.error("Invalid status"))?;
                        let (code, text) = Self::parse_resp_text(lexer)?;
                        UntaggedResponse::status(status, code, text)
                    }
                    "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
                    "FLAGS" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Flags(parse_flag_list(lexer)?)
                    }
                    "LIST" => {
                        lexer.expect_space()?;
                        UntaggedResponse::List(parse_list_response(lexer)?)
                    }
                    "LSUB" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Lsub(parse_list_response(lexer)?)
                    }
                    "SEARCH" => UntaggedResponse::Search(parse_number_list(lexer)?),
                    "SORT" => UntaggedResponse::Sort(parse_number_list(lexer)?),
                    "THREAD" => {
                        let threads = SExpr::read_sequence(lexer)?;
                        UntaggedResponse::Thread(parse_threads(&threads)?)
                    }
                    "STATUS" => {
                        lexer.expect_space()?;
                        let (mailbox, items) = parse_status_response(lexer)?;
                        UntaggedResponse::Status { mailbox, items }
                    }
                    _ => {
                        lexer.skip_spaces();
                        UntaggedResponse::Other {
                            keyword: upper,
                            text: read_text_until_crlf(lexer),
                        }
                    }
                }
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                let upper = keyword.to_uppercase();

                match upper.as_str() {
                    "EXISTS" => UntaggedResponse::Exists(
                        u32::try_from(n).map_err(|_| lexer.error("EXISTS out of range"))?,
                    ),
                    "RECENT" => UntaggedResponse::Recent(
                        u32::try_from(n).map_err(|_| lexer.error("RECENT out of range"))?,
                    ),
                    "EXPUNGE" => UntaggedResponse::Expunge(
                        SeqNum::from_wire(n)
                            .ok_or_else(|| lexer.error("Invalid sequence number 0"))?,
                    ),
                    "FETCH" => {
                        let seq = SeqNum::from_wire(n)
                            .ok_or_else(|| lexer.error("Invalid sequence number 0"))?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        UntaggedResponse::Fetch { seq, items }
                    }
                    _ => {
                        lexer.skip_spaces();
                        UntaggedResponse::Other {
                            keyword: upper,
                            text: read_text_until_crlf(lexer),
                        }
                    }
                }
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected {} in untagged response",
                    token.kind()
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let text = read_text_until_crlf(lexer);

        Response::Continuation {
            text: if text.is_empty() { None } else { Some(text) },
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        status_from_keyword(&s.to_uppercase())
            .ok_or_else(|| lexer.error(&format!("Invalid status: {s}")))
    }

    /// Parses `[SP] ["[" code "]" SP] text`; servers may omit the text.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };

        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let text = read_text_until_crlf(lexer);

        Ok((code, text))
    }
}

fn status_from_keyword(upper: &str) -> Option<Status> {
    match upper {
        "OK" => Some(Status::Ok),
        "NO" => Some(Status::No),
        "BAD" => Some(Status::Bad),
        "PREAUTH" => Some(Status::PreAuth),
        "BYE" => Some(Status::Bye),
        _ => None,
    }
}
