//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::parser::sexpr::SExpr;
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum, Uid,
    UidValidity,
};
use crate::{Error, Result};

use super::types::StatusItem;

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let upper = atom.to_uppercase();

    let code = match upper.as_str() {
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::from_wire(n).ok_or_else(|| lexer.error("Invalid UID 0"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidValidity(
                UidValidity::from_wire(n).ok_or_else(|| lexer.error("Invalid UIDVALIDITY"))?,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(
                SeqNum::from_wire(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))?,
            )
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.into_iter().collect())
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let validity = lexer.read_number()?;
            lexer.expect_space()?;
            let uid = lexer.read_number()?;
            ResponseCode::AppendUid {
                uidvalidity: UidValidity::from_wire(validity)
                    .ok_or_else(|| lexer.error("Invalid UIDVALIDITY"))?,
                uid: Uid::from_wire(uid).ok_or_else(|| lexer.error("Invalid UID 0"))?,
            }
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let validity = lexer.read_number()?;
            lexer.expect_space()?;
            let source = read_uid_set(lexer)?;
            lexer.expect_space()?;
            let dest = read_uid_set(lexer)?;
            ResponseCode::CopyUid {
                uidvalidity: UidValidity::from_wire(validity)
                    .ok_or_else(|| lexer.error("Invalid UIDVALIDITY"))?,
                source_uids: source,
                dest_uids: dest,
            }
        }
        _ => ResponseCode::from_atom(atom),
    };

    // Skip arguments of codes we don't interpret.
    while lexer.peek() != Some(b']') && !lexer.at_line_end() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

/// Reads a uid-set such as `4:6,9` and expands it.
fn read_uid_set(lexer: &mut Lexer<'_>) -> Result<Vec<Uid>> {
    let start = lexer.position();
    while lexer
        .peek()
        .is_some_and(|b| b.is_ascii_digit() || b == b':' || b == b',')
    {
        lexer.advance();
    }
    let text = String::from_utf8_lossy(lexer.consumed_since(start)).into_owned();

    let mut uids = Vec::new();
    for range in text.split(',') {
        let (lo, hi) = range.split_once(':').unwrap_or((range, range));
        let (lo, hi) = match (lo.parse::<u32>(), hi.parse::<u32>()) {
            (Ok(a), Ok(b)) => (a.min(b), a.max(b)),
            _ => return Err(Error::malformed(start, format!("Invalid uid-set: {text}"))),
        };
        uids.extend((lo..=hi).filter_map(Uid::new));
    }
    Ok(uids)
}

/// Parses capability data.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::parse(&n.to_string())),
            _ => {}
        }
    }

    Ok(caps)
}

/// Parses a flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected {} in flag list", token.kind())));
            }
        }
    }

    Ok(flags)
}

/// Parses a LIST or LSUB response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected {} in LIST attributes", token.kind())));
            }
        }
    }

    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => {
            return Err(lexer.error(&format!("Expected delimiter, got {}", token.kind())));
        }
    };

    lexer.expect_space()?;
    let mailbox_name = lexer.read_astring()?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(mailbox_name),
    })
}

/// Parses the numbers of a SEARCH or SORT response.
///
/// A trailing `(MODSEQ n)` group is tolerated and ignored.
pub fn parse_number_list(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();

    for value in SExpr::read_sequence(lexer)? {
        match value {
            SExpr::Number(n) => {
                nums.push(u32::try_from(n).map_err(|_| lexer.error("Message number out of range"))?);
            }
            SExpr::List(_) => {}
            other => {
                return Err(lexer.error(&format!("Expected number, got {}", other.kind())));
            }
        }
    }

    Ok(nums)
}

/// Parses a STATUS response.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let mailbox_name = lexer.read_astring()?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(name) => {
                lexer.expect_space()?;
                let value = lexer.read_number()?;
                let small = u32::try_from(value).unwrap_or(u32::MAX);

                let item = match name.to_uppercase().as_str() {
                    "MESSAGES" => Some(StatusItem::Messages(small)),
                    "RECENT" => Some(StatusItem::Recent(small)),
                    "UNSEEN" => Some(StatusItem::Unseen(small)),
                    "UIDNEXT" => Uid::from_wire(value).map(StatusItem::UidNext),
                    "UIDVALIDITY" => UidValidity::from_wire(value).map(StatusItem::UidValidity),
                    _ => None,
                };
                items.extend(item);
            }
            Token::Crlf | Token::Eof => {
                return Err(lexer.error("Unterminated STATUS item list"));
            }
            _ => {}
        }
    }

    Ok((Mailbox::new(mailbox_name), items))
}

/// Reads text until the end of the line.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();

    let end = remaining
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(remaining.len());

    lexer.skip(end);
    if lexer.peek() == Some(b'\r') {
        lexer.advance();
    }
    if lexer.peek() == Some(b'\n') {
        lexer.advance();
    }

    String::from_utf8_lossy(&remaining[..end]).into_owned()
}
