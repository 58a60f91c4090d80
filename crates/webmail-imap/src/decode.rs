//! Content-Transfer-Encoding, charset and RFC 2047 header decoding.
//!
//! Decoding is lenient: mail in the wild routinely violates the encoding
//! rules, so malformed quoted-printable escapes are kept literally and
//! unknown charsets fall back to windows-1252.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::{Error, Result};

/// Content-Transfer-Encoding of a body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Binary data.
    Binary,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses the encoding name; unknown names are treated as 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
        })
    }
}

/// Undoes a Content-Transfer-Encoding.
///
/// # Errors
///
/// Returns [`Error::Decode`] if base64 data is invalid.
pub fn decode_transfer(data: &[u8], encoding: TransferEncoding) -> Result<Vec<u8>> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(data),
        TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(data)),
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            Ok(data.to_vec())
        }
    }
}

/// Decodes text in the named charset.
///
/// A missing charset is read as UTF-8; an unknown one as windows-1252,
/// the superset of ISO-8859-1 that mislabelled mail usually is.
/// Undecodable sequences become U+FFFD.
#[must_use]
pub fn decode_charset(data: &[u8], charset: Option<&str>) -> String {
    let encoding = match charset {
        Some(label) => Encoding::for_label(label.trim().as_bytes()).unwrap_or_else(|| {
            tracing::debug!(label, "unknown charset, using windows-1252");
            WINDOWS_1252
        }),
        None => UTF_8,
    };
    encoding.decode_with_bom_removal(data).0.into_owned()
}

/// Decodes RFC 2047 encoded-words in a header value.
///
/// Whitespace between adjacent encoded-words is dropped; everything else
/// is kept as is. Words that fail to decode are left verbatim.
#[must_use]
pub fn decode_header(value: &str) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut whitespace = "";
    let mut after_encoded = false;
    let mut rest = value;

    while !rest.is_empty() {
        let trimmed = rest.trim_start();
        if trimmed.len() < rest.len() {
            whitespace = &rest[..rest.len() - trimmed.len()];
            rest = trimmed;
            continue;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (word, tail) = rest.split_at(end);
        rest = tail;

        if let Some(decoded) = decode_encoded_word(word) {
            if !after_encoded {
                out.push_str(whitespace);
            }
            out.push_str(&decoded);
            after_encoded = true;
        } else {
            out.push_str(whitespace);
            out.push_str(word);
            after_encoded = false;
        }
        whitespace = "";
    }
    out.push_str(whitespace);
    out
}

/// Decodes one `=?charset?B|Q?text?=` word.
fn decode_encoded_word(word: &str) -> Option<String> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut fields = inner.splitn(3, '?');
    let charset = fields.next()?;
    let scheme = fields.next()?;
    let text = fields.next()?;

    // RFC 2231 language suffix: `utf-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label(charset.as_bytes())?;

    let bytes = match scheme {
        "B" | "b" => decode_base64(text.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(text.replace('_', " ").as_bytes()),
        _ => return None,
    };
    Some(encoding.decode_with_bom_removal(&bytes).0.into_owned())
}

fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let unpadded = match cleaned.iter().rposition(|&b| b != b'=') {
        Some(last) => &cleaned[..=last],
        None => &[],
    };
    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(unpadded))
        .map_err(|e| Error::Decode(format!("invalid base64: {e}")))
}

/// Quoted-printable decoding (RFC 2045 6.7). Invalid escapes are kept.
fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(&hi), Some(&lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
