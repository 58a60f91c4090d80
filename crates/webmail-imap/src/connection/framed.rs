//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines with support for literals.
//! This module provides buffered reading and writing with proper
//! handling of the IMAP framing. Once a session splits its transport, the
//! read half stays in a [`FramedStream`] and the write half moves into a
//! [`FramedWriter`].

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Framed connection for IMAP protocol.
///
/// Handles line-based reading with literal support and buffered writing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S: AsyncRead> FramedStream<S> {
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Returns true if bytes were read from the socket but not yet framed.
    pub fn has_buffered_input(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: AsyncRead + Unpin> FramedStream<S> {
    /// Reads a complete IMAP response, including embedded literals.
    ///
    /// IMAP responses can contain literals in the format `{n}\r\n<n bytes>`.
    /// A line or literal over the size limits is a malformed response; the
    /// caller must drop the connection since framing is lost.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            if let Some(literal_len) = parse_literal_length(&line) {
                if literal_len > MAX_LITERAL_SIZE {
                    return Err(Error::malformed(
                        response.len(),
                        format!("literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"),
                    ));
                }
                let start = response.len();
                response.resize(start + literal_len, 0);
                self.reader
                    .read_exact(&mut response[start..])
                    .await
                    .map_err(|e| Error::ConnectionLost(format!("literal truncated: {e}")))?;
            } else {
                break;
            }
        }

        Ok(response)
    }

    /// Reads a single line up to and including its LF.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::ConnectionLost("connection closed by server".to_string()));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::malformed(line.len(), "line too long"));
            }
        }

        Ok(line)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedStream<S> {
    /// Writes a command to the stream.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        write_flushed(self.reader.get_mut(), &mut self.write_buffer, data).await
    }
}

/// Write half of a split connection.
pub struct FramedWriter<S> {
    stream: S,
    write_buffer: BytesMut,
}

impl<S: AsyncWrite + Unpin> FramedWriter<S> {
    /// Wraps the write half of a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Writes one part of a command, or a continuation answer, as given.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        write_flushed(&mut self.stream, &mut self.write_buffer, data).await
    }

    /// Shuts down the write side.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

async fn write_flushed<S: AsyncWrite + Unpin>(
    stream: &mut S,
    buffer: &mut BytesMut,
    data: &[u8],
) -> Result<()> {
    buffer.clear();
    buffer.extend_from_slice(data);
    stream.write_all(&buffer[..]).await?;
    stream.flush().await?;
    Ok(())
}

/// Parses a literal length from the end of a line.
///
/// Matches `{123}`, `{123+}` and `{123-}` before CRLF (or a bare LF).
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\n")?;
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    // Find the opening brace
    let open = line.iter().rposition(|&b| b == b'{')?;

    if !line.ends_with(b"}") {
        return None;
    }

    let num_start = open + 1;
    let num_end = if line.ends_with(b"+}") || line.ends_with(b"-}") {
        line.len() - 2
    } else {
        line.len() - 1
    };
    if num_end <= num_start {
        return None;
    }

    let num_str = std::str::from_utf8(&line[num_start..num_end]).ok()?;
    num_str.parse().ok()
}

/// Collects responses until the completion line of one tag.
///
/// Only used while the connection is still exclusively owned (greeting,
/// STARTTLS); afterwards the session's reader task routes responses.
pub struct ResponseAccumulator {
    tag: String,
    responses: Vec<Vec<u8>>,
}

impl ResponseAccumulator {
    /// Creates a new response accumulator for the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            responses: Vec::new(),
        }
    }

    /// Reads responses until a tagged response matching our tag is found.
    pub async fn read_until_tagged<S>(
        &mut self,
        framed: &mut FramedStream<S>,
    ) -> Result<Vec<Vec<u8>>>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            let response = framed.read_response().await?;

            let is_tagged = response
                .get(..self.tag.len())
                .is_some_and(|prefix| prefix == self.tag.as_bytes())
                && response.get(self.tag.len()).is_some_and(|&b| b == b' ');

            self.responses.push(response);

            if is_tagged {
                break;
            }
        }

        Ok(std::mem::take(&mut self.responses))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"{999999}\r\n"), Some(999_999));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"APPEND {12-}\r\n"), Some(12));
        assert_eq!(parse_literal_length(b"bare {7}\n"), Some(7));
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
    }

    #[tokio::test]
    async fn test_framed_read_simple_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_framed_read_with_literal() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY {5}\r\n")
            .read(b"hello)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY {5}\r\nhello)\r\n");
    }

    #[tokio::test]
    async fn test_framed_write_command() {
        use tokio_test::io::Builder;

        let mock = Builder::new().write(b"A001 LOGIN user pass\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed
            .write_command(b"A001 LOGIN user pass\r\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_response_accumulator() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* CAPABILITY IMAP4rev1\r\n")
            .read(b"* OK IMAP ready\r\n")
            .read(b"A001 OK Success\r\n")
            .build();

        let mut framed = FramedStream::new(mock);
        let mut accumulator = ResponseAccumulator::new("A001");

        let responses = accumulator.read_until_tagged(&mut framed).await.unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], b"* CAPABILITY IMAP4rev1\r\n");
        assert_eq!(responses[1], b"* OK IMAP ready\r\n");
        assert_eq!(responses[2], b"A001 OK Success\r\n");
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        use tokio_test::io::Builder;

        // Test that excessively large literals are rejected
        let literal_size = MAX_LITERAL_SIZE + 1;
        let header = format!("* 1 FETCH (BODY {{{literal_size}}}\r\n");

        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_response().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("literal too large")
        );
    }

    #[tokio::test]
    async fn test_literal_max_size_allowed() {
        use tokio_test::io::Builder;

        // Test that the maximum allowed literal size works
        let literal_size = 1000; // Small literal for testing
        let header = format!("* 1 FETCH (BODY {{{literal_size}}}\r\n");
        let literal_data = vec![b'X'; literal_size];
        let trailer = b")\r\n";

        let mock = Builder::new()
            .read(header.as_bytes())
            .read(&literal_data)
            .read(trailer)
            .build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_response().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        use tokio_test::io::Builder;

        // Create a line longer than MAX_LINE_LENGTH
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_eof_is_connection_lost() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_writer_sends_parts_verbatim() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"A1 LOGIN {5}\r\n")
            .write(b"alice secret\r\n")
            .build();
        let mut writer = FramedWriter::new(mock);
        writer.write_command(b"A1 LOGIN {5}\r\n").await.unwrap();
        writer.write_command(b"alice secret\r\n").await.unwrap();
    }
}
