//! IMAP token types.

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters).
    Atom(&'a str),
    /// Quoted string.
    QuotedString(String),
    /// Literal payload announced by a `{n}` prefix, taken verbatim.
    Literal(Vec<u8>),
    /// All-digit atom.
    Number(u64),
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Opening bracket.
    LBracket,
    /// Closing bracket.
    RBracket,
    /// Space character.
    Space,
    /// Asterisk (untagged response prefix).
    Asterisk,
    /// Plus (continuation response prefix).
    Plus,
    /// NIL, matched case-insensitively.
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// Short name used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::QuotedString(_) => "quoted string",
            Self::Literal(_) => "literal",
            Self::Number(_) => "number",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Space => "space",
            Self::Asterisk => "'*'",
            Self::Plus => "'+'",
            Self::Nil => "NIL",
            Self::Crlf => "CRLF",
            Self::Eof => "end of input",
        }
    }
}
