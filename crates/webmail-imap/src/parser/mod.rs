//! IMAP protocol parser.
//!
//! This module provides a sans-I/O parser for IMAP server responses.
//!
//! # Architecture
//!
//! Parsing happens in three layers:
//!
//! - **Lexer**: Tokenizes raw bytes into IMAP tokens (atoms, strings, literals, numbers)
//! - **S-expressions**: Builds nested [`SExpr`] values from tokens
//! - **Typed parsers**: Interpret values as [`Envelope`], [`MimePart`],
//!   [`ThreadNode`] forests and whole [`Response`]s
//!
//! # Example
//!
//! ```
//! use webmail_imap::parser::{ResponseParser, Response, UntaggedResponse};
//!
//! let input = b"* OK IMAP4rev1 server ready\r\n";
//! let response = ResponseParser::parse(input).unwrap();
//!
//! match response {
//!     Response::Untagged(UntaggedResponse::Ok { text, .. }) => {
//!         assert!(text.contains("IMAP4rev1"));
//!     }
//!     _ => panic!("Expected untagged OK"),
//! }
//! ```

pub mod bodystructure;
pub mod envelope;
pub mod lexer;
pub mod response;
pub mod sexpr;
pub mod thread;

pub use bodystructure::{
    BodyFields, Disposition, Extension, InvalidPartPath, LeafPart, MessagePart, MimePart,
    MultipartPart, Params, PartPath,
};
pub use envelope::{Address, Envelope};
pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, StatusItem, UntaggedResponse};
pub use sexpr::SExpr;
pub use thread::{ThreadNode, parse_threads};
