//! BODYSTRUCTURE interpretation.
//!
//! Turns the generic [`SExpr`] that follows `BODYSTRUCTURE` (or the
//! non-extensible `BODY`) into a typed [`MimePart`] tree. Part numbers are
//! assigned during the same depth-first walk and follow IMAP's section
//! numbering, so [`MimePart::path`] can be fed straight back into a
//! `BODY[<path>]` fetch.
//!
//! Numbering rules:
//!
//! - a single-part message body is part `1`
//! - children of a multipart are numbered `1..=N` beneath the
//!   multipart's own prefix (the top-level multipart has an empty prefix)
//! - the body embedded in a `MESSAGE/RFC822` part at `P` is numbered
//!   beneath `P`: a single-part body is `P.1`, a multipart body lends the
//!   prefix `P` to its children `P.1..P.N`

use std::fmt;
use std::str::FromStr;

use super::envelope::Envelope;
use super::sexpr::SExpr;
use crate::{Error, Result};

/// A dotted IMAP part number such as `1.2.3`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartPath(Vec<u32>);

impl PartPath {
    /// The empty path (whole message).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Creates a path from 1-based indices.
    #[must_use]
    pub const fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    /// Returns the path of the `n`th child (1-based) beneath this one.
    #[must_use]
    pub fn child(&self, n: u32) -> Self {
        let mut indices = self.0.clone();
        indices.push(n);
        Self(indices)
    }

    /// Returns the indices.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Returns true for the empty path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Section specifier for this part, e.g. `1.2.MIME`.
    #[must_use]
    pub fn section(&self, suffix: &str) -> String {
        match (self.is_root(), suffix.is_empty()) {
            (true, _) => suffix.to_string(),
            (false, true) => self.to_string(),
            (false, false) => format!("{self}.{suffix}"),
        }
    }
}

impl fmt::Display for PartPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

/// Error returned when a part path string is not `n(.n)*` with n > 0.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid part path: {0:?}")]
pub struct InvalidPartPath(pub String);

impl FromStr for PartPath {
    type Err = InvalidPartPath;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|segment| match segment.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(InvalidPartPath(s.to_string())),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// MIME parameters (`charset`, `name`, `boundary`, ...) in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Creates a parameter list from name/value pairs.
    #[must_use]
    pub const fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Looks a parameter up by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterates name/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Content-Disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type, lowercased (`inline`, `attachment`).
    pub kind: String,
    /// Disposition parameters (`filename`, ...).
    pub params: Params,
}

/// Fields shared by leaf and message/rfc822 parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyFields {
    /// Major type, lowercased.
    pub media_type: String,
    /// Subtype, lowercased.
    pub subtype: String,
    /// Content-Type parameters.
    pub params: Params,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding, uppercased.
    pub encoding: String,
    /// Size of the encoded body in octets.
    pub size: u32,
}

/// Optional extension data of a single part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extension {
    /// Content-MD5.
    pub md5: Option<String>,
    /// Content-Disposition.
    pub disposition: Option<Disposition>,
    /// Content-Language tags.
    pub language: Vec<String>,
    /// Content-Location.
    pub location: Option<String>,
}

/// A non-container part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPart {
    /// Section number.
    pub path: PartPath,
    /// Content fields.
    pub fields: BodyFields,
    /// Line count, present for `text/*` only.
    pub lines: Option<u32>,
    /// Extension data.
    pub ext: Extension,
}

/// A multipart container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Section prefix of the children.
    pub path: PartPath,
    /// Subtype, lowercased (`mixed`, `alternative`, `related`, ...).
    pub subtype: String,
    /// Content-Type parameters.
    pub params: Params,
    /// Children in wire order.
    pub parts: Vec<MimePart>,
    /// Content-Disposition.
    pub disposition: Option<Disposition>,
    /// Content-Language tags.
    pub language: Vec<String>,
    /// Content-Location.
    pub location: Option<String>,
}

/// A `message/rfc822` part with its embedded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    /// Section number.
    pub path: PartPath,
    /// Content fields of the part itself.
    pub fields: BodyFields,
    /// Envelope of the embedded message.
    pub envelope: Box<Envelope>,
    /// Structure of the embedded message.
    pub body: Box<MimePart>,
    /// Line count of the encapsulated message.
    pub lines: u32,
    /// Extension data.
    pub ext: Extension,
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// Single part.
    Leaf(LeafPart),
    /// Multipart container.
    Multipart(MultipartPart),
    /// Encapsulated message.
    Message(MessagePart),
}

impl MimePart {
    /// Interprets a BODYSTRUCTURE value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if a required positional field
    /// (type, subtype, encoding, size) is missing or has the wrong kind.
    pub fn parse(value: &SExpr) -> Result<Self> {
        parse_body(value, &PartPath::root(), true)
    }

    /// Parses BODYSTRUCTURE wire text such as `("TEXT" "PLAIN" ...)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] on syntax or structure errors.
    pub fn from_wire(input: &[u8]) -> Result<Self> {
        Self::parse(&SExpr::parse(input)?)
    }

    /// Section number of this node.
    #[must_use]
    pub const fn path(&self) -> &PartPath {
        match self {
            Self::Leaf(p) => &p.path,
            Self::Multipart(p) => &p.path,
            Self::Message(p) => &p.path,
        }
    }

    /// Major media type, lowercased.
    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::Leaf(p) => &p.fields.media_type,
            Self::Multipart(_) => "multipart",
            Self::Message(p) => &p.fields.media_type,
        }
    }

    /// Subtype, lowercased.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::Leaf(p) => &p.fields.subtype,
            Self::Multipart(p) => &p.subtype,
            Self::Message(p) => &p.fields.subtype,
        }
    }

    /// `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type(), self.subtype())
    }

    /// Content fields for non-container parts.
    #[must_use]
    pub const fn fields(&self) -> Option<&BodyFields> {
        match self {
            Self::Leaf(p) => Some(&p.fields),
            Self::Message(p) => Some(&p.fields),
            Self::Multipart(_) => None,
        }
    }

    /// Content-Type parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        match self {
            Self::Leaf(p) => &p.fields.params,
            Self::Multipart(p) => &p.params,
            Self::Message(p) => &p.fields.params,
        }
    }

    /// Content-Disposition.
    #[must_use]
    pub const fn disposition(&self) -> Option<&Disposition> {
        match self {
            Self::Leaf(p) => p.ext.disposition.as_ref(),
            Self::Multipart(p) => p.disposition.as_ref(),
            Self::Message(p) => p.ext.disposition.as_ref(),
        }
    }

    /// Encoded size in octets; containers report zero.
    #[must_use]
    pub const fn size(&self) -> u32 {
        match self.fields() {
            Some(fields) => fields.size,
            None => 0,
        }
    }

    /// `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.params().get("charset")
    }

    /// Disposition `filename`, falling back to the Content-Type `name`.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.disposition()
            .and_then(|d| d.params.get("filename"))
            .or_else(|| self.params().get("name"))
    }

    /// True when the part is meant to be saved rather than displayed inline.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        match self.disposition() {
            Some(d) => d.kind == "attachment",
            None => matches!(self, Self::Message(_)) || self.params().get("name").is_some(),
        }
    }

    /// Direct children: multipart parts, or the body of an embedded message.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Leaf(_) => &[],
            Self::Multipart(p) => &p.parts,
            Self::Message(p) => std::slice::from_ref(&p.body),
        }
    }

    /// Depth-first, pre-order traversal including `self`.
    pub fn iter(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children().iter().rev());
            Some(node)
        })
    }

    /// Non-container parts in display order.
    pub fn leaves(&self) -> impl Iterator<Item = &Self> {
        self.iter().filter(|p| matches!(p, Self::Leaf(_)))
    }

    /// Finds the fetchable part with the given section number.
    ///
    /// Multipart prefixes are skipped so that the path of an embedded
    /// message resolves to the message part itself.
    #[must_use]
    pub fn find(&self, path: &PartPath) -> Option<&Self> {
        self.iter()
            .find(|p| p.path() == path && !matches!(p, Self::Multipart(_)))
            .or_else(|| self.iter().find(|p| p.path() == path))
    }

    /// Finds a part by Content-ID, ignoring surrounding angle brackets.
    #[must_use]
    pub fn find_by_content_id(&self, content_id: &str) -> Option<&Self> {
        let wanted = strip_angle(content_id);
        self.iter().find(|p| {
            p.fields()
                .and_then(|f| f.id.as_deref())
                .is_some_and(|id| strip_angle(id) == wanted)
        })
    }
}

fn strip_angle(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(s)
}

/// Parses one body node. `top` marks the outermost body of a message
/// (top level or embedded), whose single-part form is numbered `prefix.1`.
fn parse_body(value: &SExpr, prefix: &PartPath, top: bool) -> Result<MimePart> {
    let items = value
        .as_list()
        .ok_or_else(|| Error::malformed(0, format!("body must be a list, got {}", value.kind())))?;

    match items.first() {
        Some(SExpr::List(_)) => parse_multipart(items, prefix),
        Some(_) => {
            let path = if top { prefix.child(1) } else { prefix.clone() };
            parse_single(items, path)
        }
        None => Err(Error::malformed(0, "empty body structure")),
    }
}

fn parse_multipart(items: &[SExpr], path: &PartPath) -> Result<MimePart> {
    let mut parts = Vec::new();
    let mut rest = items;
    while let Some((first @ SExpr::List(_), tail)) = rest.split_first() {
        let n = u32::try_from(parts.len() + 1)
            .map_err(|_| Error::malformed(0, "too many body parts"))?;
        parts.push(parse_body(first, &path.child(n), false)?);
        rest = tail;
    }

    let subtype = rest
        .first()
        .and_then(SExpr::as_text)
        .ok_or_else(|| Error::malformed(0, "multipart subtype missing"))?
        .to_ascii_lowercase();

    let ext = &rest[1..];
    Ok(MimePart::Multipart(MultipartPart {
        path: path.clone(),
        subtype,
        params: ext.first().map(params).unwrap_or_default(),
        parts,
        disposition: ext.get(1).and_then(disposition),
        language: ext.get(2).map(language).unwrap_or_default(),
        location: ext.get(3).and_then(SExpr::nstring),
    }))
}

fn parse_single(items: &[SExpr], path: PartPath) -> Result<MimePart> {
    let media_type = required_text(items, 0, "type")?.to_ascii_lowercase();
    let subtype = required_text(items, 1, "subtype")?.to_ascii_lowercase();
    let encoding = required_text(items, 5, "encoding")?.to_ascii_uppercase();
    let size = required_number(items, 6, "size")?;

    let fields = BodyFields {
        params: items.get(2).map(params).unwrap_or_default(),
        id: items.get(3).and_then(SExpr::nstring),
        description: items.get(4).and_then(SExpr::nstring),
        media_type,
        subtype,
        encoding,
        size,
    };

    if fields.media_type == "message" && fields.subtype == "rfc822" {
        let envelope = Envelope::parse(
            items
                .get(7)
                .ok_or_else(|| Error::malformed(0, "message/rfc822 envelope missing"))?,
        )?;
        let body = parse_body(
            items
                .get(8)
                .ok_or_else(|| Error::malformed(0, "message/rfc822 body missing"))?,
            &path,
            true,
        )?;
        let lines = required_number(items, 9, "lines")?;
        return Ok(MimePart::Message(MessagePart {
            path,
            fields,
            envelope: Box::new(envelope),
            body: Box::new(body),
            lines,
            ext: extension(items.get(10..).unwrap_or_default()),
        }));
    }

    let (lines, ext_start) = if fields.media_type == "text" {
        (Some(required_number(items, 7, "lines")?), 8)
    } else {
        (None, 7)
    };

    Ok(MimePart::Leaf(LeafPart {
        path,
        fields,
        lines,
        ext: extension(items.get(ext_start..).unwrap_or_default()),
    }))
}

fn required_text(items: &[SExpr], index: usize, field: &str) -> Result<String> {
    match items.get(index) {
        Some(value @ (SExpr::String(_) | SExpr::Atom(_))) => {
            Ok(value.nstring().unwrap_or_default())
        }
        Some(other) => Err(Error::malformed(
            0,
            format!("body {field} must be a string, got {}", other.kind()),
        )),
        None => Err(Error::malformed(0, format!("body {field} missing"))),
    }
}

fn required_number(items: &[SExpr], index: usize, field: &str) -> Result<u32> {
    match items.get(index) {
        Some(SExpr::Number(n)) => {
            u32::try_from(*n).map_err(|_| Error::malformed(0, format!("body {field} too large")))
        }
        Some(other) => Err(Error::malformed(
            0,
            format!("body {field} must be a number, got {}", other.kind()),
        )),
        None => Err(Error::malformed(0, format!("body {field} missing"))),
    }
}

/// Extension fields of a single part; wrong kinds are ignored.
fn extension(items: &[SExpr]) -> Extension {
    Extension {
        md5: items.first().and_then(SExpr::nstring),
        disposition: items.get(1).and_then(disposition),
        language: items.get(2).map(language).unwrap_or_default(),
        location: items.get(3).and_then(SExpr::nstring),
    }
}

fn params(value: &SExpr) -> Params {
    let Some(items) = value.as_list() else {
        return Params::default();
    };
    Params(
        items
            .chunks_exact(2)
            .filter_map(|pair| {
                let key = pair[0].nstring()?;
                let value = pair[1].nstring().unwrap_or_default();
                Some((key, value))
            })
            .collect(),
    )
}

fn disposition(value: &SExpr) -> Option<Disposition> {
    let items = value.as_list()?;
    Some(Disposition {
        kind: items.first()?.nstring()?.to_ascii_lowercase(),
        params: items.get(1).map(params).unwrap_or_default(),
    })
}

fn language(value: &SExpr) -> Vec<String> {
    match value {
        SExpr::List(items) => items.iter().filter_map(SExpr::nstring).collect(),
        other => other.nstring().into_iter().collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn path(s: &str) -> PartPath {
        s.parse().unwrap()
    }

    const MIXED: &[u8] = b"((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 120 5) \
(\"APPLICATION\" \"PDF\" (\"NAME\" \"f.pdf\") NIL NIL \"BASE64\" 4096) \"MIXED\")";

    #[test]
    fn test_mixed_text_and_pdf() {
        let tree = MimePart::from_wire(MIXED).unwrap();

        let MimePart::Multipart(mp) = &tree else {
            panic!("expected multipart, got {tree:?}");
        };
        assert_eq!(mp.subtype, "mixed");
        assert!(mp.path.is_root());
        assert_eq!(mp.parts.len(), 2);

        let MimePart::Leaf(text) = &mp.parts[0] else {
            panic!("expected leaf");
        };
        assert_eq!(tree.children()[0].mime_type(), "text/plain");
        assert_eq!(text.path, path("1"));
        assert_eq!(text.fields.size, 120);
        assert_eq!(text.lines, Some(5));
        assert_eq!(tree.children()[0].charset(), Some("UTF-8"));

        let MimePart::Leaf(pdf) = &mp.parts[1] else {
            panic!("expected leaf");
        };
        assert_eq!(tree.children()[1].mime_type(), "application/pdf");
        assert_eq!(pdf.path, path("2"));
        assert_eq!(pdf.fields.encoding, "BASE64");
        assert_eq!(pdf.lines, None);
        assert_eq!(tree.children()[1].filename(), Some("f.pdf"));
        assert!(tree.children()[1].is_attachment());
    }

    #[test]
    fn test_single_part_is_part_one() {
        let tree =
            MimePart::from_wire(b"(\"TEXT\" \"HTML\" NIL NIL NIL \"QUOTED-PRINTABLE\" 300 9)")
                .unwrap();
        assert_eq!(tree.path(), &path("1"));
        assert_eq!(tree.mime_type(), "text/html");
        assert!(tree.params().is_empty());
    }

    #[test]
    fn test_alternative_inside_mixed_numbering() {
        let wire = b"(((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"us-ascii\") NIL NIL \"7BIT\" 10 1)\
(\"TEXT\" \"HTML\" (\"CHARSET\" \"us-ascii\") NIL NIL \"7BIT\" 20 1) \"ALTERNATIVE\")\
(\"IMAGE\" \"PNG\" NIL \"<img1@x>\" NIL \"BASE64\" 500) \"MIXED\")";
        let tree = MimePart::from_wire(wire).unwrap();

        let paths: Vec<String> = tree.iter().map(|p| p.path().to_string()).collect();
        assert_eq!(paths, vec!["", "1", "1.1", "1.2", "2"]);

        let html = tree.find(&path("1.2")).unwrap();
        assert_eq!(html.mime_type(), "text/html");
        assert_eq!(tree.find(&path("1")).unwrap().mime_type(), "multipart/alternative");
        assert_eq!(
            tree.find_by_content_id("img1@x").unwrap().path(),
            &path("2")
        );

        let leaves: Vec<String> = tree.leaves().map(|p| p.path().to_string()).collect();
        assert_eq!(leaves, vec!["1.1", "1.2", "2"]);
    }

    #[test]
    fn test_embedded_message_numbering() {
        let wire = b"((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 10 1)\
(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 900 \
(NIL \"inner\" NIL NIL NIL NIL NIL NIL NIL NIL) \
((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1)(\"TEXT\" \"HTML\" NIL NIL NIL \"7BIT\" 6 1) \"ALTERNATIVE\") 30) \
\"MIXED\")";
        let tree = MimePart::from_wire(wire).unwrap();

        let msg = tree.find(&path("2")).unwrap();
        let MimePart::Message(m) = msg else {
            panic!("expected message part, got {msg:?}");
        };
        assert_eq!(m.envelope.subject, "inner");
        assert_eq!(m.lines, 30);
        assert_eq!(tree.find(&path("2.1")).unwrap().mime_type(), "text/plain");
        assert_eq!(tree.find(&path("2.2")).unwrap().mime_type(), "text/html");
    }

    #[test]
    fn test_embedded_single_part_message() {
        let wire = b"(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 50 \
(NIL NIL NIL NIL NIL NIL NIL NIL NIL NIL) (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1) 4)";
        let tree = MimePart::from_wire(wire).unwrap();
        assert_eq!(tree.path(), &path("1"));
        assert_eq!(tree.children()[0].path(), &path("1.1"));
    }

    #[test]
    fn test_extension_fields() {
        let wire = b"((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 10 1 NIL NIL NIL NIL)\
(\"APPLICATION\" \"OCTET-STREAM\" NIL NIL NIL \"BASE64\" 8 \"md5sum\" \
(\"ATTACHMENT\" (\"FILENAME\" \"a.bin\")) (\"en\" \"de\") \"http://x/a\" \"future\" (1 2))\
\"MIXED\" (\"BOUNDARY\" \"xyz\") NIL \"fr\" NIL)";
        let tree = MimePart::from_wire(wire).unwrap();

        assert_eq!(tree.params().get("boundary"), Some("xyz"));
        let MimePart::Multipart(mp) = &tree else {
            panic!("expected multipart");
        };
        assert_eq!(mp.language, vec!["fr".to_string()]);

        let MimePart::Leaf(bin) = &mp.parts[1] else {
            panic!("expected leaf");
        };
        assert_eq!(bin.ext.md5.as_deref(), Some("md5sum"));
        assert_eq!(bin.ext.language, vec!["en", "de"]);
        assert_eq!(bin.ext.location.as_deref(), Some("http://x/a"));
        assert_eq!(mp.parts[1].filename(), Some("a.bin"));
        assert!(mp.parts[1].is_attachment());
    }

    #[test]
    fn test_missing_size_is_malformed() {
        let err = MimePart::from_wire(b"(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\")").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert!(err.to_string().contains("size"));
    }

    #[test]
    fn test_wrong_kind_encoding_is_malformed() {
        assert!(MimePart::from_wire(b"(\"TEXT\" \"PLAIN\" NIL NIL NIL NIL 1 1)").is_err());
        assert!(MimePart::from_wire(b"(\"IMAGE\" \"GIF\" NIL NIL NIL \"BASE64\" \"big\")").is_err());
    }

    #[test]
    fn test_missing_multipart_subtype_is_malformed() {
        assert!(MimePart::from_wire(b"((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 1 1))").is_err());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let value = SExpr::parse(MIXED).unwrap();
        assert_eq!(MimePart::parse(&value).unwrap(), MimePart::parse(&value).unwrap());
    }

    #[test]
    fn test_part_path_parse_and_display() {
        assert_eq!(path("1.2.3").indices(), &[1, 2, 3]);
        assert_eq!(path("1.2.3").to_string(), "1.2.3");
        assert!(path("").is_root());
        assert!("1.0".parse::<PartPath>().is_err());
        assert!("a".parse::<PartPath>().is_err());
        assert_eq!(path("2").section("MIME"), "2.MIME");
        assert_eq!(PartPath::root().section("HEADER"), "HEADER");
        assert_eq!(path("2.1").section(""), "2.1");
    }

    /// Shape of a generated tree, serialized by the test itself.
    #[derive(Debug, Clone)]
    enum Shape {
        Leaf { ty: String, sub: String, size: u32 },
        Multi { sub: String, children: Vec<Shape> },
        Message { size: u32, body: Box<Shape> },
    }

    fn shape_strategy() -> impl Strategy<Value = Shape> {
        let leaf = (
            prop::sample::select(vec!["TEXT", "IMAGE", "APPLICATION", "AUDIO"]),
            "[A-Z]{1,8}",
            0u32..100_000,
        )
            .prop_map(|(ty, sub, size)| Shape::Leaf {
                ty: ty.to_string(),
                sub,
                size,
            });
        leaf.prop_recursive(5, 64, 4, |inner| {
            prop_oneof![
                (
                    prop::sample::select(vec!["MIXED", "ALTERNATIVE", "RELATED"]),
                    prop::collection::vec(inner.clone(), 1..4)
                )
                    .prop_map(|(sub, children)| Shape::Multi {
                        sub: sub.to_string(),
                        children
                    }),
                (0u32..100_000, inner).prop_map(|(size, body)| Shape::Message {
                    size,
                    body: Box::new(body)
                }),
            ]
        })
    }

    fn s(text: &str) -> SExpr {
        SExpr::String(text.as_bytes().to_vec())
    }

    fn to_sexpr(shape: &Shape) -> SExpr {
        match shape {
            Shape::Leaf { ty, sub, size } => {
                let mut items = vec![
                    s(ty),
                    s(sub),
                    SExpr::List(vec![s("CHARSET"), s("UTF-8")]),
                    SExpr::Nil,
                    SExpr::Nil,
                    s("BASE64"),
                    SExpr::Number(u64::from(*size)),
                ];
                if ty == "TEXT" {
                    items.push(SExpr::Number(3));
                }
                SExpr::List(items)
            }
            Shape::Multi { sub, children } => {
                let mut items: Vec<SExpr> = children.iter().map(to_sexpr).collect();
                items.push(s(sub));
                SExpr::List(items)
            }
            Shape::Message { size, body } => SExpr::List(vec![
                s("MESSAGE"),
                s("RFC822"),
                SExpr::Nil,
                SExpr::Nil,
                SExpr::Nil,
                s("7BIT"),
                SExpr::Number(u64::from(*size)),
                SExpr::List(vec![SExpr::Nil; 10]),
                to_sexpr(body),
                SExpr::Number(12),
            ]),
        }
    }

    /// Expected (mime type, size, path) for every node, derived from the
    /// numbering rules independently of the parser.
    fn expected(shape: &Shape, prefix: &PartPath, top: bool, out: &mut Vec<(String, u32, String)>) {
        match shape {
            Shape::Leaf { ty, sub, size } => {
                let p = if top { prefix.child(1) } else { prefix.clone() };
                out.push((
                    format!("{}/{}", ty.to_lowercase(), sub.to_lowercase()),
                    *size,
                    p.to_string(),
                ));
            }
            Shape::Multi { sub, children } => {
                out.push((format!("multipart/{}", sub.to_lowercase()), 0, prefix.to_string()));
                for (i, child) in children.iter().enumerate() {
                    expected(child, &prefix.child(u32::try_from(i + 1).unwrap()), false, out);
                }
            }
            Shape::Message { size, body } => {
                let p = if top { prefix.child(1) } else { prefix.clone() };
                out.push(("message/rfc822".to_string(), *size, p.to_string()));
                expected(body, &p, true, out);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip_preserves_structure(shape in shape_strategy()) {
            let wire = to_sexpr(&shape).to_wire();
            let tree = MimePart::from_wire(&wire).unwrap();

            let mut want = Vec::new();
            expected(&shape, &PartPath::root(), true, &mut want);
            let got: Vec<(String, u32, String)> = tree
                .iter()
                .map(|p| (p.mime_type(), p.size(), p.path().to_string()))
                .collect();
            prop_assert_eq!(got, want);
        }

        #[test]
        fn prop_fetchable_paths_are_unique(shape in shape_strategy()) {
            let tree = MimePart::from_wire(&to_sexpr(&shape).to_wire()).unwrap();
            let mut seen = HashSet::new();
            for part in tree.iter().filter(|p| !matches!(p, MimePart::Multipart(_))) {
                prop_assert!(seen.insert(part.path().clone()), "duplicate path {}", part.path());
                prop_assert_eq!(tree.find(part.path()).map(MimePart::path), Some(part.path()));
            }
        }

        #[test]
        fn prop_part_path_display_parses_back(indices in prop::collection::vec(1u32..50, 0..6)) {
            let p = PartPath::new(indices);
            prop_assert_eq!(p.to_string().parse::<PartPath>().unwrap(), p);
        }
    }
}
