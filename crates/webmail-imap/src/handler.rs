//! Unsolicited response handling.
//!
//! IMAP servers may send EXISTS, EXPUNGE, FETCH and FLAGS updates at any
//! time, not only in answer to a command (RFC 2683). The session's reader
//! hands every such update to a [`ResponseHandler`] registered on the
//! session, independently of tagged command correlation.
//!
//! # Example
//!
//! ```
//! use webmail_imap::handler::{ChannelHandler, ResponseHandler, UnsolicitedEvent};
//!
//! let (mut handler, mut events) = ChannelHandler::new();
//! handler.on_exists(42);
//! assert_eq!(events.try_recv().ok(), Some(UnsolicitedEvent::Exists(42)));
//! ```

use tokio::sync::mpsc;

use crate::parser::FetchItem;
use crate::types::{Flags, SeqNum};

/// Handler for unsolicited server responses.
///
/// Every method has an empty default, so implementors only override the
/// events they care about. Methods run on the session's reader task and
/// must not block.
pub trait ResponseHandler: Send {
    /// Message count changed (EXISTS).
    fn on_exists(&mut self, count: u32) {
        let _ = count;
    }

    /// A message was removed (EXPUNGE).
    ///
    /// Sequence numbers above `seq` shift down by one.
    fn on_expunge(&mut self, seq: SeqNum) {
        let _ = seq;
    }

    /// Message metadata changed outside of a FETCH or STORE we issued.
    fn on_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        let _ = (seq, items);
    }

    /// The mailbox's defined flags changed.
    fn on_flags(&mut self, flags: &Flags) {
        let _ = flags;
    }

    /// Recent count changed.
    fn on_recent(&mut self, count: u32) {
        let _ = count;
    }

    /// The server is closing the connection.
    fn on_bye(&mut self, text: &str) {
        let _ = text;
    }

    /// `[ALERT]` text that must be shown to the user (RFC 3501 7.1).
    fn on_alert(&mut self, text: &str) {
        let _ = text;
    }
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ResponseHandler for NoopHandler {}

/// Logs unsolicited responses with `tracing`. Sessions start with this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ResponseHandler for LoggingHandler {
    fn on_exists(&mut self, count: u32) {
        tracing::debug!(count, "EXISTS");
    }

    fn on_expunge(&mut self, seq: SeqNum) {
        tracing::debug!(seq = seq.get(), "EXPUNGE");
    }

    fn on_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        tracing::debug!(seq = seq.get(), items = items.len(), "unsolicited FETCH");
    }

    fn on_flags(&mut self, flags: &Flags) {
        tracing::debug!(?flags, "FLAGS");
    }

    fn on_recent(&mut self, count: u32) {
        tracing::debug!(count, "RECENT");
    }

    fn on_bye(&mut self, text: &str) {
        tracing::info!(text, "BYE");
    }

    fn on_alert(&mut self, text: &str) {
        tracing::warn!(text, "ALERT");
    }
}

/// Forwards events over an unbounded tokio channel.
///
/// The channel is unbounded so a slow consumer never stalls the reader;
/// events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<UnsolicitedEvent>,
}

impl ChannelHandler {
    /// Creates a handler and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UnsolicitedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: UnsolicitedEvent) {
        let _ = self.tx.send(event);
    }
}

impl ResponseHandler for ChannelHandler {
    fn on_exists(&mut self, count: u32) {
        self.send(UnsolicitedEvent::Exists(count));
    }

    fn on_expunge(&mut self, seq: SeqNum) {
        self.send(UnsolicitedEvent::Expunge(seq));
    }

    fn on_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) {
        self.send(UnsolicitedEvent::Fetch(seq, items.to_vec()));
    }

    fn on_flags(&mut self, flags: &Flags) {
        self.send(UnsolicitedEvent::Flags(flags.clone()));
    }

    fn on_recent(&mut self, count: u32) {
        self.send(UnsolicitedEvent::Recent(count));
    }

    fn on_bye(&mut self, text: &str) {
        self.send(UnsolicitedEvent::Bye(text.to_string()));
    }

    fn on_alert(&mut self, text: &str) {
        self.send(UnsolicitedEvent::Alert(text.to_string()));
    }
}

/// An unsolicited event delivered by [`ChannelHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum UnsolicitedEvent {
    /// EXISTS response.
    Exists(u32),
    /// EXPUNGE response.
    Expunge(SeqNum),
    /// FETCH response with items.
    Fetch(SeqNum, Vec<FetchItem>),
    /// FLAGS response.
    Flags(Flags),
    /// RECENT response.
    Recent(u32),
    /// BYE response.
    Bye(String),
    /// ALERT response code.
    Alert(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_handler() {
        let mut handler = NoopHandler;
        handler.on_exists(100);
        handler.on_expunge(SeqNum::new(1).unwrap());
        handler.on_bye("goodbye");
        handler.on_alert("important!");
    }

    #[test]
    fn test_channel_handler_preserves_order() {
        let (mut handler, mut rx) = ChannelHandler::new();

        handler.on_exists(50);
        handler.on_recent(5);
        handler.on_alert("Test alert");

        assert_eq!(rx.try_recv().unwrap(), UnsolicitedEvent::Exists(50));
        assert_eq!(rx.try_recv().unwrap(), UnsolicitedEvent::Recent(5));
        assert_eq!(
            rx.try_recv().unwrap(),
            UnsolicitedEvent::Alert("Test alert".to_string())
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_handler_survives_dropped_receiver() {
        let (mut handler, rx) = ChannelHandler::new();
        drop(rx);
        handler.on_exists(1);
    }
}
