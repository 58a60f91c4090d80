//! FETCH response parsing.
//!
//! The attribute list is read as one [`SExpr`] and then interpreted pair by
//! pair, so literals anywhere in the list (bodies, subjects) need no special
//! casing here.

use crate::parser::bodystructure::MimePart;
use crate::parser::envelope::Envelope;
use crate::parser::lexer::Lexer;
use crate::parser::sexpr::SExpr;
use crate::types::{Flag, Flags, Uid};
use crate::{Error, Result};

use super::types::FetchItem;

/// Parses the parenthesized attribute list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    let start = lexer.position();
    let value = SExpr::read(lexer)?;
    let list = value
        .as_list()
        .ok_or_else(|| Error::malformed(start, "FETCH data must be a list"))?;
    parse_fetch_items(list).map_err(|e| match e {
        Error::MalformedResponse { position, message } => Error::MalformedResponse {
            position: start + position,
            message,
        },
        other => other,
    })
}

/// Interprets `name value` pairs of a FETCH attribute list.
///
/// Unknown attributes are skipped; a dangling name is malformed.
pub fn parse_fetch_items(list: &[SExpr]) -> Result<Vec<FetchItem>> {
    if list.len() % 2 != 0 {
        return Err(Error::malformed(0, "FETCH attribute without a value"));
    }

    let mut items = Vec::with_capacity(list.len() / 2);
    for pair in list.chunks_exact(2) {
        let (key, value) = (&pair[0], &pair[1]);
        let name = key.as_atom().ok_or_else(|| {
            Error::malformed(0, format!("FETCH attribute name is a {}", key.kind()))
        })?;
        let upper = name.to_uppercase();

        let item = match upper.as_str() {
            "FLAGS" => FetchItem::Flags(parse_flags(value)?),
            "UID" => {
                let uid = value
                    .as_number()
                    .and_then(Uid::from_wire)
                    .ok_or_else(|| Error::malformed(0, "invalid UID value (UID cannot be 0)"))?;
                FetchItem::Uid(uid)
            }
            "RFC822.SIZE" => {
                let size = value
                    .as_number()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| Error::malformed(0, "invalid RFC822.SIZE"))?;
                FetchItem::Rfc822Size(size)
            }
            "INTERNALDATE" => FetchItem::InternalDate(
                value
                    .as_text()
                    .ok_or_else(|| Error::malformed(0, "INTERNALDATE must be a string"))?
                    .into_owned(),
            ),
            "ENVELOPE" => FetchItem::Envelope(Box::new(Envelope::parse(value)?)),
            "BODYSTRUCTURE" => FetchItem::BodyStructure(Box::new(MimePart::parse(value)?)),
            "BODY" if value.as_list().is_some() => {
                FetchItem::BodyStructure(Box::new(MimePart::parse(value)?))
            }
            "RFC822" => body_item(String::new(), None, value),
            "RFC822.HEADER" => body_item("HEADER".to_string(), None, value),
            "RFC822.TEXT" => body_item("TEXT".to_string(), None, value),
            _ => match parse_section(&upper, name) {
                Some((section, origin)) => body_item(section, origin, value),
                None => {
                    tracing::trace!(attribute = name, "skipping unknown FETCH attribute");
                    continue;
                }
            },
        };
        items.push(item);
    }

    Ok(items)
}

fn body_item(section: String, origin: Option<u32>, value: &SExpr) -> FetchItem {
    FetchItem::Body {
        section,
        origin,
        data: value.as_bytes().map(<[u8]>::to_vec).or_else(|| {
            // Some servers answer an empty part with a bare atom or number.
            match value {
                SExpr::Atom(a) => Some(a.clone().into_bytes()),
                SExpr::Number(n) => Some(n.to_string().into_bytes()),
                _ => None,
            }
        }),
    }
}

/// Splits `BODY[1.MIME]<0>` into `("1.MIME", Some(0))`.
///
/// Section text keeps the server's case; `upper` is only used to match the
/// prefix.
fn parse_section(upper: &str, original: &str) -> Option<(String, Option<u32>)> {
    let prefix_len = if upper.starts_with("BODY[") {
        "BODY[".len()
    } else if upper.starts_with("BODY.PEEK[") {
        "BODY.PEEK[".len()
    } else if upper.starts_with("BINARY[") {
        "BINARY[".len()
    } else {
        return None;
    };

    let rest = &original[prefix_len..];
    let close = rest.rfind(']')?;
    let section = rest[..close].to_string();
    let tail = &rest[close + 1..];

    let origin = tail
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .and_then(|n| n.parse().ok());

    Some((section, origin))
}

/// Parses a parenthesized flag list value.
pub fn parse_flags(value: &SExpr) -> Result<Flags> {
    let list = value
        .as_list()
        .ok_or_else(|| Error::malformed(0, format!("flag list expected, got {}", value.kind())))?;
    list.iter()
        .map(|f| {
            f.as_atom()
                .map(Flag::parse)
                .ok_or_else(|| Error::malformed(0, format!("flag must be an atom, got {}", f.kind())))
        })
        .collect()
}
