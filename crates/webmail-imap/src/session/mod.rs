//! Stateful IMAP session over one connection.
//!
//! A [`Session`] owns the socket of one account. A reader task frames
//! every response and hands it to the [`Correlator`], which resolves the
//! command waiting on that tag. Commands therefore only hold the write half
//! while their bytes go out, and several can be in flight at once:
//!
//! ```text
//!  execute() ──register tag──▶ Correlator ◀──handle_response── reader task
//!      │                           │                               ▲
//!      └──write_command──▶ write half        read half ─────────────┘
//!                                  │
//!                                  └──unsolicited──▶ ResponseHandler
//! ```
//!
//! A second task sends NOOP after `keepalive_interval` of silence. When the
//! connection drops, every pending command resolves with
//! [`Error::ConnectionLost`]; the next high-level call reconnects if
//! `auto_reconnect` is set.

mod config;
mod folders;
mod messages;
mod state;

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

pub use config::SessionConfig;
pub use messages::{FlagOp, PartData};
pub(crate) use messages::uid_of;
pub use state::{SelectedFolder, SessionState};

use crate::auth::{self, AuthMethod};
use crate::command::{Command, TagGenerator};
use crate::connection::{
    self, BoxedIo, Credentials, FramedStream, FramedWriter, ImapIo, ResponseAccumulator, Secret,
    Security, ServerParams,
};
use crate::handler::{ChannelHandler, LoggingHandler, ResponseHandler, UnsolicitedEvent};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::protocol::{CommandResult, Correlator};
use crate::types::{CapabilitySet, Mailbox, ResponseCode, Status, Tag, UidValidity};
use crate::{Error, Result};

/// Builds the unsolicited-response handler for each new connection.
type HandlerFactory = Arc<dyn Fn() -> Box<dyn ResponseHandler> + Send + Sync>;

/// State shared between the session and its background tasks.
struct Shared {
    correlator: Mutex<Correlator>,
    writer: tokio::sync::Mutex<Option<FramedWriter<WriteHalf<BoxedIo>>>>,
    tags: TagGenerator,
    last_activity: Mutex<Instant>,
    command_timeout: Duration,
    tasks: Mutex<Vec<AbortHandle>>,
}

/// How to answer `+` continuation requests while a command runs.
enum Responder {
    /// The command never expects a continuation.
    None,
    /// Parts of a command still waiting behind synchronizing literals.
    Literal(VecDeque<Vec<u8>>),
    /// SASL exchange; holds the initial response until the first `+`.
    Sasl(Option<String>),
}

impl Responder {
    const fn needs_continuation(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Bytes to write for one continuation request, CRLF included.
    fn answer(&mut self, challenge: &str) -> Option<Vec<u8>> {
        match self {
            Self::None => None,
            Self::Literal(parts) => parts.pop_front(),
            Self::Sasl(initial) => {
                let mut line = match initial.take() {
                    Some(response) => response.into_bytes(),
                    None => {
                        match auth::describe_challenge(challenge) {
                            Some(detail) => tracing::warn!(%detail, "server rejected the token"),
                            None => tracing::debug!("empty SASL challenge"),
                        }
                        Vec::new()
                    }
                };
                line.extend_from_slice(b"\r\n");
                Some(line)
            }
        }
    }
}

impl Shared {
    fn new(
        handler: Box<dyn ResponseHandler>,
        writer: FramedWriter<WriteHalf<BoxedIo>>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            correlator: Mutex::new(Correlator::new(handler)),
            writer: tokio::sync::Mutex::new(Some(writer)),
            tags: TagGenerator::default(),
            last_activity: Mutex::new(Instant::now()),
            command_timeout,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn correlator(&self) -> MutexGuard<'_, Correlator> {
        self.correlator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    fn is_closed(&self) -> bool {
        self.correlator().is_closed()
    }

    fn lost(&self) -> Error {
        let reason = self
            .correlator()
            .closed_reason()
            .unwrap_or("connection closed")
            .to_string();
        Error::ConnectionLost(reason)
    }

    /// Tears the connection down; pending commands fail with ConnectionLost.
    fn close(&self, reason: &str) {
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
        self.correlator().fail_all(reason);
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
    }

    async fn run(
        &self,
        command: &Command,
        literal_plus: bool,
        mut responder: Responder,
    ) -> Result<CommandResult> {
        let tag = self.tags.next();
        let exchange = self.exchange(&tag, command, literal_plus, &mut responder);

        if let Ok(outcome) = tokio::time::timeout(self.command_timeout, exchange).await {
            return outcome;
        }

        tracing::warn!(%tag, command = command.name(), "command timed out");
        let mut correlator = self.correlator();
        correlator.cancel(&tag);
        if responder.needs_continuation() {
            correlator.clear_continuation();
        }
        Err(Error::Timeout(self.command_timeout))
    }

    async fn exchange(
        &self,
        tag: &Tag,
        command: &Command,
        literal_plus: bool,
        responder: &mut Responder,
    ) -> Result<CommandResult> {
        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(self.lost());
        };

        let mut parts = VecDeque::from(command.serialize(tag.as_str(), literal_plus));
        let first = parts.pop_front().unwrap_or_default();
        if !parts.is_empty() {
            *responder = Responder::Literal(parts);
        }

        let (reply, continuation) = {
            let mut correlator = self.correlator();
            let reply = correlator.register_scoped(
                tag.clone(),
                command.name(),
                command.uid_scope().cloned(),
            )?;
            let continuation = responder
                .needs_continuation()
                .then(|| correlator.expect_continuation());
            (reply, continuation)
        };

        tracing::debug!(%tag, command = command.name(), "sending command");
        if let Err(err) = stream.write_command(&first).await {
            return Err(self.write_failed(&err));
        }
        self.touch();

        let Some(mut continuation) = continuation else {
            drop(writer);
            return reply.await.unwrap_or_else(|_| Err(self.lost()));
        };

        let mut reply = reply;
        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut reply => break outcome,
                Some(challenge) = continuation.recv() => {
                    let Some(answer) = responder.answer(&challenge) else {
                        tracing::warn!(%tag, "no answer for continuation request");
                        continue;
                    };
                    if let Err(err) = stream.write_command(&answer).await {
                        return Err(self.write_failed(&err));
                    }
                }
            }
        };
        self.correlator().clear_continuation();
        outcome.unwrap_or_else(|_| Err(self.lost()))
    }

    fn write_failed(&self, err: &Error) -> Error {
        let reason = format!("write failed: {err}");
        self.correlator().fail_all(&reason);
        Error::ConnectionLost(reason)
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: FramedStream<ReadHalf<BoxedIo>>) {
    let failure = loop {
        match reader.read_response().await {
            Ok(raw) => {
                shared.touch();
                shared.correlator().handle_response(&raw);
            }
            Err(err) => break err,
        }
    };

    // Framing is lost after an oversized line or literal, so the connection
    // still closes, but pending commands learn the actual cause.
    match failure {
        Error::ConnectionLost(reason) => {
            tracing::info!(%reason, "connection closed");
            shared.correlator().fail_all(&reason);
        }
        Error::MalformedResponse { position, message } => {
            tracing::warn!(%message, "unframeable response, closing connection");
            shared
                .correlator()
                .fail_all_with(&message, |_| Error::malformed(position, message.clone()));
        }
        other => {
            let reason = other.to_string();
            tracing::info!(%reason, "connection closed");
            shared.correlator().fail_all(&reason);
        }
    }
    shared.writer.lock().await.take();
}

async fn keepalive(shared: Arc<Shared>, interval: Duration) {
    loop {
        let idle = shared.idle_for();
        if idle < interval {
            tokio::time::sleep(interval - idle).await;
            continue;
        }
        if let Err(err) = shared.run(&Command::Noop, false, Responder::None).await {
            tracing::debug!(error = %err, "keep-alive failed, stopping");
            break;
        }
        tracing::trace!("keep-alive NOOP");
    }
}

/// Where a session was opened, kept for reconnects.
#[derive(Clone)]
struct Endpoint {
    params: ServerParams,
    credentials: Credentials,
}

/// One live IMAP connection and its protocol state.
///
/// Mutating operations take `&mut self`. [`Session::execute`] takes `&self`
/// so independent commands can be pipelined from one task.
pub struct Session {
    shared: Arc<Shared>,
    config: SessionConfig,
    state: SessionState,
    capabilities: Option<CapabilitySet>,
    selected: Option<SelectedFolder>,
    endpoint: Option<Endpoint>,
    validities: HashMap<Mailbox, UidValidity>,
    handler_factory: HandlerFactory,
}

impl Session {
    /// Connects, authenticates and returns a ready session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the credentials are rejected, or a
    /// transport error if the server cannot be reached.
    pub async fn open(
        params: &ServerParams,
        credentials: &Credentials,
        config: SessionConfig,
    ) -> Result<Self> {
        let endpoint = Endpoint {
            params: params.clone(),
            credentials: credentials.clone(),
        };
        Self::establish(endpoint, config, default_handler_factory()).await
    }

    /// Connects and reads the greeting without authenticating.
    ///
    /// For [`Security::StartTls`] the TLS upgrade happens before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting or STARTTLS fails.
    pub async fn connect(params: &ServerParams, config: SessionConfig) -> Result<Self> {
        Self::connect_with(params, config, default_handler_factory()).await
    }

    /// Starts a session over an already connected stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is missing, malformed or BYE.
    pub async fn from_stream<S: ImapIo>(stream: S, config: SessionConfig) -> Result<Self> {
        Self::start(Box::new(stream), config, default_handler_factory()).await
    }

    async fn establish(
        endpoint: Endpoint,
        config: SessionConfig,
        handler_factory: HandlerFactory,
    ) -> Result<Self> {
        let mut session = Self::connect_with(&endpoint.params, config, handler_factory).await?;
        if !session.state.is_authenticated() {
            session.authenticate(&endpoint.credentials).await?;
        }
        session.endpoint = Some(endpoint);
        Ok(session)
    }

    async fn connect_with(
        params: &ServerParams,
        config: SessionConfig,
        handler_factory: HandlerFactory,
    ) -> Result<Self> {
        tracing::info!(
            host = %params.host,
            port = params.port,
            security = ?params.security,
            "connecting"
        );
        let timeout = config.connect_timeout;
        let tcp = connection::connect_tcp(params, timeout).await?;

        match params.security {
            Security::Implicit => {
                let tls = tokio::time::timeout(timeout, connection::tls_handshake(tcp, &params.host))
                    .await
                    .map_err(|_| Error::Timeout(timeout))??;
                Self::start(Box::new(tls), config, handler_factory).await
            }
            Security::StartTls => {
                let host = params.host.clone();
                Self::start_tls(tcp, config, handler_factory, |plain| async move {
                    let tls = connection::tls_handshake(plain, &host).await?;
                    Ok(Box::new(tls) as BoxedIo)
                })
                .await
            }
            Security::None => {
                tracing::warn!(host = %params.host, "connecting without TLS");
                Self::start(Box::new(tcp), config, handler_factory).await
            }
        }
    }

    /// Runs STARTTLS on a plaintext stream, then starts the session on the
    /// stream `upgrade` returns.
    ///
    /// Capabilities seen before the upgrade are discarded; the session
    /// starts without any and queries them over the protected stream.
    async fn start_tls<S, U, F>(
        stream: S,
        config: SessionConfig,
        handler_factory: HandlerFactory,
        upgrade: U,
    ) -> Result<Self>
    where
        S: ImapIo,
        U: FnOnce(S) -> F,
        F: Future<Output = Result<BoxedIo>>,
    {
        let timeout = config.connect_timeout;
        let handshake = async {
            let mut framed = FramedStream::new(stream);
            request_starttls(&mut framed).await?;
            upgrade(framed.into_inner()).await
        };
        let io = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        tracing::debug!("STARTTLS upgrade complete");

        let (read, write) = tokio::io::split(io);
        Ok(Self::spawn(
            FramedStream::new(read),
            write,
            config,
            handler_factory,
            SessionState::Connected,
            None,
        ))
    }

    async fn start(io: BoxedIo, config: SessionConfig, handler_factory: HandlerFactory) -> Result<Self> {
        let (read, write) = tokio::io::split(io);
        let mut reader = FramedStream::new(read);

        let timeout = config.connect_timeout;
        let (state, capabilities) = tokio::time::timeout(timeout, read_greeting(&mut reader))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        Ok(Self::spawn(reader, write, config, handler_factory, state, capabilities))
    }

    fn spawn(
        reader: FramedStream<ReadHalf<BoxedIo>>,
        writer: WriteHalf<BoxedIo>,
        config: SessionConfig,
        handler_factory: HandlerFactory,
        state: SessionState,
        capabilities: Option<CapabilitySet>,
    ) -> Self {
        let shared = Arc::new(Shared::new(
            handler_factory(),
            FramedWriter::new(writer),
            config.command_timeout,
        ));

        let mut tasks = vec![tokio::spawn(read_loop(Arc::clone(&shared), reader)).abort_handle()];
        if let Some(interval) = config.keepalive_interval {
            tasks.push(tokio::spawn(keepalive(Arc::clone(&shared), interval)).abort_handle());
        }
        *shared.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;

        Self {
            shared,
            config,
            state,
            capabilities,
            selected: None,
            endpoint: None,
            validities: HashMap::new(),
            handler_factory,
        }
    }

    /// Current protocol state; `Disconnected` once the connection is gone.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.shared.is_closed() {
            SessionState::Disconnected
        } else {
            self.state.clone()
        }
    }

    /// Returns true while the connection is alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.shared.is_closed()
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of commands awaiting their tagged completion.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.shared.correlator().pending_count()
    }

    /// Installs the unsolicited-response handler for this and every
    /// reconnected connection.
    pub fn set_handler<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn ResponseHandler> + Send + Sync + 'static,
    {
        let factory: HandlerFactory = Arc::new(factory);
        self.shared.correlator().set_handler(factory());
        self.handler_factory = factory;
    }

    /// Routes unsolicited updates to a channel and returns its receiver.
    pub fn events(&mut self) -> mpsc::UnboundedReceiver<UnsolicitedEvent> {
        let (handler, rx) = ChannelHandler::new();
        self.set_handler(move || Box::new(handler.clone()) as Box<dyn ResponseHandler>);
        rx
    }

    /// Sends one command and waits for its tagged completion.
    ///
    /// NO and BAD are returned as a [`CommandResult`], not an error; use
    /// [`CommandResult::check`] to convert them. Takes `&self` so that
    /// several commands can be in flight at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the connection drops,
    /// [`Error::MalformedResponse`] if a response to this command cannot
    /// be parsed, or [`Error::Timeout`].
    pub async fn execute(&self, command: Command) -> Result<CommandResult> {
        self.run(&command, Responder::None).await
    }

    /// Sends `command`; strings that need literals use `{n+}` when the
    /// server advertises LITERAL+.
    async fn run(&self, command: &Command, responder: Responder) -> Result<CommandResult> {
        let literal_plus = self.supports("LITERAL+");
        match self.shared.run(command, literal_plus, responder).await {
            Err(Error::Timeout(after)) => {
                if self.shared.run(&Command::Noop, false, Responder::None).await.is_ok() {
                    return Err(Error::Timeout(after));
                }
                let reason = format!("{} timed out and the server stopped answering", command.name());
                self.shared.close(&reason);
                Err(Error::ConnectionLost(reason))
            }
            other => other,
        }
    }

    /// Drops the connection immediately.
    ///
    /// Pending commands resolve with [`Error::ConnectionLost`] and any
    /// partially read literal is discarded.
    pub fn close_connection(&self) {
        self.shared.close("connection closed by client");
    }

    /// Sends LOGOUT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection was already lost.
    pub async fn logout(&mut self) -> Result<()> {
        let outcome = self.run(&Command::Logout, Responder::None).await;
        if let Ok(mut writer) = self.shared.writer.try_lock()
            && let Some(stream) = writer.as_mut()
        {
            let _ = stream.shutdown().await;
        }
        self.shared.close("logged out");
        self.state = SessionState::Disconnected;
        self.selected = None;
        outcome.map(|_| ())
    }

    /// Reconnects with the parameters the session was opened with.
    ///
    /// Re-selects the previously selected folder and returns true if its
    /// UIDVALIDITY changed, in which case cached UIDs are void.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] immediately if the credentials are refused,
    /// or the last connection error once all attempts failed.
    pub async fn reconnect(&mut self) -> Result<bool> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Err(Error::InvalidState(
                "session was not opened from server parameters".into(),
            ));
        };
        self.shared.close("reconnecting");
        let previous = self.selected.take();

        let attempts = self.config.max_reconnect_attempts.max(1);
        let mut attempt = 0;
        let fresh = loop {
            attempt += 1;
            tracing::info!(attempt, host = %endpoint.params.host, "attempting to reconnect");

            let outcome = Self::establish(
                endpoint.clone(),
                self.config.clone(),
                Arc::clone(&self.handler_factory),
            )
            .await;
            match outcome {
                Ok(session) => break session,
                Err(err) if err.is_auth() || attempt >= attempts => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "reconnect attempt failed");
                    tokio::time::sleep(Duration::from_secs(u64::from(attempt) * 2)).await;
                }
            }
        };

        let validities = std::mem::take(&mut self.validities);
        *self = fresh;
        self.validities = validities;

        match previous {
            Some(folder) => {
                let reselected = self.open_folder(folder.name, folder.status.read_only).await?;
                Ok(reselected.uid_validity_changed)
            }
            None => Ok(false),
        }
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if !self.shared.is_closed() {
            return Ok(());
        }
        if self.config.auto_reconnect && self.endpoint.is_some() {
            self.reconnect().await.map(|_| ())
        } else {
            Err(self.shared.lost())
        }
    }

    async fn ensure_authenticated(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        if self.state.is_authenticated() {
            Ok(())
        } else {
            Err(Error::InvalidState("not authenticated".into()))
        }
    }

    async fn ensure_selected(&mut self) -> Result<Mailbox> {
        self.ensure_authenticated().await?;
        self.state
            .selected_mailbox()
            .cloned()
            .ok_or_else(|| Error::InvalidState("no folder selected".into()))
    }

    /// Authenticates with the best method the server offers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials and
    /// [`Error::CapabilityUnsupported`] if no usable mechanism is offered.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        if self.state.is_authenticated() {
            return Err(Error::InvalidState("already authenticated".into()));
        }
        let capabilities = self.ensure_capabilities().await?.clone();
        let method = auth::choose(credentials, &capabilities)?;

        let result = match method {
            AuthMethod::Login => {
                let (Secret::Password(password) | Secret::OAuth2Token(password)) =
                    &credentials.secret;
                let command = Command::Login {
                    username: credentials.username.clone(),
                    password: password.clone(),
                };
                self.run(&command, Responder::None).await?
            }
            AuthMethod::Sasl { mechanism, inline } => {
                let initial = mechanism.initial_response(credentials);
                let (initial_response, pending) = if inline {
                    (Some(initial), None)
                } else {
                    (None, Some(initial))
                };
                let command = Command::Authenticate {
                    mechanism: mechanism.name().to_string(),
                    initial_response,
                };
                self.run(&command, Responder::Sasl(pending)).await?
            }
        };

        if !result.is_ok() || matches!(result.code, Some(ResponseCode::AuthenticationFailed)) {
            tracing::warn!(user = %credentials.username, "authentication rejected");
            return Err(Error::Auth(result.text));
        }

        tracing::info!(user = %credentials.username, method = ?method, "authenticated");
        self.state = SessionState::Authenticated;
        self.capabilities = capabilities_from(&result);
        if self.capabilities.is_none() {
            self.negotiate().await?;
        }
        Ok(())
    }

    /// Issues CAPABILITY and caches the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or returns no capability data.
    pub async fn negotiate(&mut self) -> Result<&CapabilitySet> {
        let result = self.run(&Command::Capability, Responder::None).await?.check()?;
        let capabilities = capabilities_from(&result)
            .ok_or_else(|| Error::malformed(0, "CAPABILITY completed without data"))?;
        tracing::debug!(count = capabilities.len(), "capabilities negotiated");
        Ok(self.capabilities.insert(capabilities))
    }

    async fn ensure_capabilities(&mut self) -> Result<&CapabilitySet> {
        if self.capabilities.is_none() {
            self.negotiate().await?;
        }
        self.capabilities
            .as_ref()
            .ok_or_else(|| Error::InvalidState("capabilities unavailable".into()))
    }

    /// Cached capabilities, if negotiated.
    #[must_use]
    pub const fn capabilities(&self) -> Option<&CapabilitySet> {
        self.capabilities.as_ref()
    }

    /// Returns true if the cached capabilities include `feature`.
    #[must_use]
    pub fn supports(&self, feature: &str) -> bool {
        self.capabilities
            .as_ref()
            .is_some_and(|caps| caps.supports(feature))
    }

    /// Fails with [`Error::CapabilityUnsupported`] unless `feature` is
    /// advertised.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityUnsupported`] naming the feature.
    pub fn require(&self, feature: &str) -> Result<()> {
        if self.supports(feature) {
            Ok(())
        } else {
            Err(Error::CapabilityUnsupported(feature.to_string()))
        }
    }

    /// Selects a folder read-write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses; the previous
    /// selection stays in effect.
    pub async fn select(&mut self, mailbox: &str) -> Result<SelectedFolder> {
        self.ensure_authenticated().await?;
        self.open_folder(Mailbox::new(mailbox), false).await
    }

    /// Selects a folder read-only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses.
    pub async fn examine(&mut self, mailbox: &str) -> Result<SelectedFolder> {
        self.ensure_authenticated().await?;
        self.open_folder(Mailbox::new(mailbox), true).await
    }

    async fn open_folder(&mut self, name: Mailbox, examine: bool) -> Result<SelectedFolder> {
        let command = if examine {
            Command::Examine {
                mailbox: name.clone(),
            }
        } else {
            Command::Select {
                mailbox: name.clone(),
            }
        };
        let result = self.run(&command, Responder::None).await?.check()?;

        let mut folder = SelectedFolder::from_select(name, examine, &result);
        if let Some(validity) = folder.status.uid_validity {
            let previous = self.validities.insert(folder.name.clone(), validity);
            if previous.is_some_and(|old| old != validity) {
                tracing::info!(
                    mailbox = %folder.name,
                    uid_validity = validity.get(),
                    "UIDVALIDITY changed, cached UIDs are void"
                );
                folder.uid_validity_changed = true;
            }
        }

        tracing::debug!(mailbox = %folder.name, exists = folder.status.exists, "folder selected");
        self.shared.correlator().set_mailbox(Some(folder.status.clone()));
        self.state = SessionState::Selected(folder.name.clone());
        self.selected = Some(folder.clone());
        Ok(folder)
    }

    /// The selected folder with counts kept current by unsolicited updates.
    #[must_use]
    pub fn selected(&self) -> Option<SelectedFolder> {
        let mut folder = self.selected.clone()?;
        if let Some(status) = self.shared.correlator().mailbox() {
            folder.status = status.clone();
        }
        Some(folder)
    }

    /// Closes the selected folder, returning to the authenticated state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if no folder is selected.
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_selected().await?;
        self.run(&Command::Close, Responder::None).await?.check()?;
        self.shared.correlator().set_mailbox(None);
        self.state = SessionState::Authenticated;
        self.selected = None;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in self
            .shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("capabilities", &self.capabilities)
            .field("pending", &self.pending_commands())
            .finish_non_exhaustive()
    }
}

fn default_handler_factory() -> HandlerFactory {
    Arc::new(|| Box::new(LoggingHandler) as Box<dyn ResponseHandler>)
}

/// Capabilities from untagged CAPABILITY data or a `[CAPABILITY]` code.
fn capabilities_from(result: &CommandResult) -> Option<CapabilitySet> {
    result
        .responses
        .iter()
        .rev()
        .find_map(|response| match response {
            UntaggedResponse::Capability(caps) => Some(CapabilitySet::from_capabilities(caps)),
            UntaggedResponse::Ok {
                code: Some(ResponseCode::Capability(caps)),
                ..
            } => Some(CapabilitySet::from_capabilities(caps)),
            _ => None,
        })
        .or_else(|| match &result.code {
            Some(ResponseCode::Capability(caps)) => Some(CapabilitySet::from_capabilities(caps)),
            _ => None,
        })
}

/// Reads the server greeting; PREAUTH starts authenticated.
async fn read_greeting<S>(
    reader: &mut FramedStream<S>,
) -> Result<(SessionState, Option<CapabilitySet>)>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let raw = reader.read_response().await?;
    let capabilities = |code: &Option<ResponseCode>| match code {
        Some(ResponseCode::Capability(caps)) => Some(CapabilitySet::from_capabilities(caps)),
        _ => None,
    };

    match ResponseParser::parse(&raw)? {
        Response::Untagged(UntaggedResponse::Ok { code, .. }) => {
            Ok((SessionState::Connected, capabilities(&code)))
        }
        Response::Untagged(UntaggedResponse::PreAuth { code, .. }) => {
            tracing::debug!("server greeted with PREAUTH");
            Ok((SessionState::Authenticated, capabilities(&code)))
        }
        Response::Untagged(UntaggedResponse::Bye { text, .. }) => Err(Error::ConnectionLost(
            format!("server refused connection: {text}"),
        )),
        _ => Err(Error::malformed(0, "expected server greeting")),
    }
}

/// Runs one literal-free command on a connection that has no reader task
/// yet.
async fn exchange_unsplit<S: ImapIo>(
    framed: &mut FramedStream<S>,
    tag: &Tag,
    command: &Command,
) -> Result<CommandResult> {
    framed
        .write_command(&command.serialize(tag.as_str(), false).concat())
        .await?;
    let lines = ResponseAccumulator::new(tag.as_str())
        .read_until_tagged(framed)
        .await?;

    let mut responses = Vec::new();
    for raw in &lines {
        match ResponseParser::parse(raw)? {
            Response::Untagged(response) => responses.push(response),
            Response::Tagged {
                status, code, text, ..
            } => {
                return Ok(CommandResult {
                    status,
                    code,
                    text,
                    responses,
                });
            }
            Response::Continuation { .. } => {}
        }
    }
    Err(Error::malformed(0, format!("{} ended without completion", command.name())))
}

/// Greeting and STARTTLS on a fresh plaintext stream, up to the point
/// where the TLS handshake can begin.
async fn request_starttls<S: ImapIo>(framed: &mut FramedStream<S>) -> Result<()> {
    let (state, capabilities) = read_greeting(framed).await?;
    if state.is_authenticated() {
        return Err(Error::InvalidState(
            "server sent PREAUTH on a connection that must use STARTTLS".into(),
        ));
    }

    let tags = TagGenerator::new('S');
    let capabilities = match capabilities {
        Some(caps) => caps,
        None => {
            let result = exchange_unsplit(framed, &tags.next(), &Command::Capability)
                .await?
                .check()?;
            capabilities_from(&result).unwrap_or_default()
        }
    };
    if !capabilities.supports("STARTTLS") {
        return Err(Error::CapabilityUnsupported("STARTTLS".into()));
    }

    let result = exchange_unsplit(framed, &tags.next(), &Command::StartTls).await?;
    if result.status != Status::Ok {
        return Err(Error::CommandFailed {
            status: result.status,
            code: result.code,
            text: result.text,
        });
    }
    if framed.has_buffered_input() {
        return Err(Error::malformed(0, "unexpected data after STARTTLS"));
    }
    Ok(())
}
