//! Sans-I/O command/response correlation.
//!
//! The [`Correlator`] owns the table of commands awaiting their tagged
//! completion. The session's reader task feeds it every framed response;
//! it never touches a socket itself, so routing can be tested by feeding
//! bytes directly.
//!
//! Every incoming response is classified as one of:
//!
//! - a tagged completion, which resolves the command with that tag;
//! - untagged data claimed by a pending command (FETCH results for a
//!   `UID FETCH`, EXISTS during a SELECT, ...), which is attached to the
//!   oldest pending command that claims it. A `UID FETCH` or `UID STORE`
//!   only claims FETCH data for UIDs inside its own set;
//! - an unsolicited update (EXISTS, EXPUNGE, FLAGS, BYE, `[ALERT]`), which
//!   goes to the registered [`ResponseHandler`].
//!
//! A response that fails to parse is logged and fails only the command it
//! belongs to.

use std::collections::VecDeque;

use tokio::sync::{mpsc, oneshot};

use crate::handler::ResponseHandler;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::session::uid_of;
use crate::types::{MailboxStatus, ResponseCode, Status, Tag, UidSet};
use crate::{Error, Result};

/// Result of a completed command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Completion status.
    pub status: Status,
    /// Optional response code.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
    /// Untagged data attached to this command, in arrival order.
    pub responses: Vec<UntaggedResponse>,
}

impl CommandResult {
    /// Returns true if the command succeeded (OK status).
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok | Status::PreAuth)
    }

    /// Turns NO and BAD into [`Error::CommandFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] with the server's text if the
    /// command did not succeed.
    pub fn check(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                status: self.status,
                code: self.code,
                text: self.text,
            })
        }
    }

    /// Like [`Self::check`], returning only the untagged data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the status is NO or BAD.
    pub fn into_result(self) -> Result<Vec<UntaggedResponse>> {
        self.check().map(|result| result.responses)
    }
}

/// Receives the outcome of one command.
pub type Reply = oneshot::Receiver<Result<CommandResult>>;

/// A pending command waiting for completion.
struct PendingCommand {
    tag: Tag,
    name: &'static str,
    scope: Option<UidSet>,
    responses: Vec<UntaggedResponse>,
    malformed: Option<Error>,
    reply: oneshot::Sender<Result<CommandResult>>,
}

impl PendingCommand {
    fn owns(&self, response: &UntaggedResponse) -> bool {
        match (&self.scope, response) {
            (Some(scope), UntaggedResponse::Fetch { items, .. }) => {
                uid_of(items).is_some_and(|uid| scope.contains(uid))
            }
            _ => true,
        }
    }
}

/// Command/response correlation table for one connection.
pub struct Correlator {
    pending: VecDeque<PendingCommand>,
    continuation: Option<mpsc::UnboundedSender<String>>,
    handler: Box<dyn ResponseHandler>,
    mailbox: Option<MailboxStatus>,
    closed: Option<String>,
    bye: Option<String>,
}

impl Correlator {
    /// Creates an empty table delivering unsolicited updates to `handler`.
    #[must_use]
    pub fn new(handler: Box<dyn ResponseHandler>) -> Self {
        Self {
            pending: VecDeque::new(),
            continuation: None,
            handler,
            mailbox: None,
            closed: None,
            bye: None,
        }
    }

    /// Replaces the unsolicited response handler.
    pub fn set_handler(&mut self, handler: Box<dyn ResponseHandler>) {
        self.handler = handler;
    }

    /// Registers a command about to be written.
    ///
    /// Must be called before the command's bytes go on the wire so that
    /// table order matches wire order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] once the connection has failed,
    /// or [`Error::InvalidState`] if `tag` is already pending.
    pub fn register(&mut self, tag: Tag, name: &'static str) -> Result<Reply> {
        self.register_scoped(tag, name, None)
    }

    /// Registers a UID-addressed command.
    ///
    /// FETCH data whose UID lies outside `scope` is not claimed by this
    /// command and reaches the handler as an unsolicited update.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`].
    pub fn register_scoped(
        &mut self,
        tag: Tag,
        name: &'static str,
        scope: Option<UidSet>,
    ) -> Result<Reply> {
        if let Some(reason) = &self.closed {
            return Err(Error::ConnectionLost(reason.clone()));
        }
        if self.pending.iter().any(|p| p.tag == tag) {
            return Err(Error::InvalidState(format!("tag {tag} is already pending")));
        }

        let (reply, rx) = oneshot::channel();
        self.pending.push_back(PendingCommand {
            tag,
            name,
            scope,
            responses: Vec::new(),
            malformed: None,
            reply,
        });
        Ok(rx)
    }

    /// Routes the next `+` continuations to the returned receiver.
    pub fn expect_continuation(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.continuation = Some(tx);
        rx
    }

    /// Stops routing continuations.
    pub fn clear_continuation(&mut self) {
        self.continuation = None;
    }

    /// Forgets a pending command whose caller gave up on it.
    ///
    /// A later completion for the tag is logged and dropped.
    pub fn cancel(&mut self, tag: &Tag) -> bool {
        let Some(position) = self.pending.iter().position(|p| &p.tag == tag) else {
            return false;
        };
        self.pending.remove(position);
        true
    }

    /// Number of commands awaiting completion.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Why the connection closed, once it has.
    #[must_use]
    pub fn closed_reason(&self) -> Option<&str> {
        self.closed.as_deref()
    }

    /// Returns true once [`Self::fail_all`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Live status of the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&MailboxStatus> {
        self.mailbox.as_ref()
    }

    /// Sets the tracked mailbox status after SELECT, or clears it.
    pub fn set_mailbox(&mut self, status: Option<MailboxStatus>) {
        self.mailbox = status;
    }

    /// Processes one complete framed response.
    pub fn handle_response(&mut self, raw: &[u8]) {
        match ResponseParser::parse(raw) {
            Ok(Response::Tagged {
                tag,
                status,
                code,
                text,
            }) => self.complete(&tag, status, code, text),
            Ok(Response::Untagged(response)) => self.handle_untagged(response),
            Ok(Response::Continuation { text }) => {
                let text = text.unwrap_or_default();
                match &self.continuation {
                    Some(tx) => {
                        let _ = tx.send(text);
                    }
                    None => tracing::warn!(%text, "unexpected continuation request"),
                }
            }
            Err(err) => self.handle_malformed(raw, err),
        }
    }

    /// Resolves every pending command with [`Error::ConnectionLost`].
    ///
    /// After this, [`Self::register`] refuses new commands.
    pub fn fail_all(&mut self, reason: &str) {
        self.fail_all_with(reason, |reason| Error::ConnectionLost(reason.to_string()));
    }

    /// Like [`Self::fail_all`], resolving each pending command with the
    /// error `error` builds from the closing reason.
    pub fn fail_all_with<F>(&mut self, reason: &str, error: F)
    where
        F: Fn(&str) -> Error,
    {
        let reason = match &self.bye {
            Some(bye) => format!("{reason} (server said BYE: {bye})"),
            None => reason.to_string(),
        };
        for pending in self.pending.drain(..) {
            tracing::debug!(tag = %pending.tag, command = pending.name, "failing pending command");
            let _ = pending.reply.send(Err(error(&reason)));
        }
        self.continuation = None;
        self.mailbox = None;
        self.closed.get_or_insert(reason);
    }

    fn complete(&mut self, tag: &Tag, status: Status, code: Option<ResponseCode>, text: String) {
        let Some(position) = self.pending.iter().position(|p| &p.tag == tag) else {
            tracing::debug!(%tag, "completion for unknown or cancelled tag");
            return;
        };
        let Some(pending) = self.pending.remove(position) else {
            return;
        };

        tracing::debug!(%tag, command = pending.name, status = %status, "command completed");

        let outcome = match pending.malformed {
            Some(err) => Err(err),
            None => Ok(CommandResult {
                status,
                code,
                text,
                responses: pending.responses,
            }),
        };
        let _ = pending.reply.send(outcome);
    }

    fn handle_untagged(&mut self, response: UntaggedResponse) {
        self.track_mailbox(&response);

        let claimant = self
            .pending
            .iter()
            .position(|p| claims(p.name, response.keyword()) && p.owns(&response));

        match &response {
            UntaggedResponse::Fetch { seq, items } if claimant.is_none() => {
                self.handler.on_fetch(*seq, items);
                return;
            }
            UntaggedResponse::Exists(n) if claimant.is_none() => self.handler.on_exists(*n),
            UntaggedResponse::Recent(n) if claimant.is_none() => self.handler.on_recent(*n),
            UntaggedResponse::Flags(flags) if claimant.is_none() => self.handler.on_flags(flags),
            UntaggedResponse::Expunge(seq) => self.handler.on_expunge(*seq),
            UntaggedResponse::Bye { text, .. } => {
                self.bye = Some(text.clone());
                self.handler.on_bye(text);
            }
            UntaggedResponse::Ok {
                code: Some(ResponseCode::Alert),
                text,
            }
            | UntaggedResponse::No {
                code: Some(ResponseCode::Alert),
                text,
            } => self.handler.on_alert(text),
            _ => {}
        }

        let target = claimant.or_else(|| self.pending.len().checked_sub(1));
        if let Some(pending) = target.and_then(|i| self.pending.get_mut(i)) {
            pending.responses.push(response);
        }
    }

    fn handle_malformed(&mut self, raw: &[u8], err: Error) {
        tracing::warn!(
            error = %err,
            raw = %String::from_utf8_lossy(raw).trim_end(),
            "malformed response"
        );

        if let Some(tag) = ResponseParser::peek_tag(raw) {
            let tag = Tag::new(tag);
            if let Some(position) = self.pending.iter().position(|p| p.tag == tag)
                && let Some(pending) = self.pending.remove(position)
            {
                let _ = pending.reply.send(Err(err));
            }
            return;
        }

        let keyword = ResponseParser::peek_keyword(raw);
        let target = keyword
            .as_deref()
            .and_then(|kw| self.pending.iter().position(|p| claims(p.name, kw)))
            .or_else(|| self.pending.iter().position(|p| expects_data(p.name)));

        match target.and_then(|i| self.pending.get_mut(i)) {
            Some(pending) => {
                pending.malformed.get_or_insert(err);
            }
            None => tracing::debug!("malformed response did not belong to any command"),
        }
    }

    fn track_mailbox(&mut self, response: &UntaggedResponse) {
        let Some(status) = &mut self.mailbox else {
            return;
        };
        match response {
            UntaggedResponse::Exists(n) => status.exists = *n,
            UntaggedResponse::Recent(n) => status.recent = *n,
            UntaggedResponse::Expunge(_) => status.exists = status.exists.saturating_sub(1),
            UntaggedResponse::Flags(flags) => status.flags = flags.clone(),
            _ => {}
        }
    }
}

/// Whether a command issued as `name` produces untagged `keyword` data.
fn claims(name: &str, keyword: &str) -> bool {
    match keyword {
        "FETCH" => matches!(name, "UID FETCH" | "UID STORE"),
        "SEARCH" => name == "UID SEARCH",
        "SORT" => name == "UID SORT",
        "THREAD" => name == "UID THREAD",
        "LIST" => name == "LIST",
        "LSUB" => name == "LSUB",
        "STATUS" => name == "STATUS",
        "CAPABILITY" => matches!(name, "CAPABILITY" | "LOGIN" | "AUTHENTICATE"),
        "EXISTS" | "RECENT" | "FLAGS" | "OK" => matches!(name, "SELECT" | "EXAMINE"),
        "EXPUNGE" => matches!(name, "EXPUNGE" | "UID EXPUNGE" | "UID MOVE"),
        _ => false,
    }
}

/// Commands whose result is carried by untagged data.
fn expects_data(name: &str) -> bool {
    matches!(
        name,
        "UID FETCH"
            | "UID STORE"
            | "UID SEARCH"
            | "UID SORT"
            | "UID THREAD"
            | "LIST"
            | "LSUB"
            | "STATUS"
            | "SELECT"
            | "EXAMINE"
            | "CAPABILITY"
    )
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending_count", &self.pending.len())
            .field("closed", &self.closed)
            .field("mailbox", &self.mailbox)
            .finish_non_exhaustive()
    }
}
