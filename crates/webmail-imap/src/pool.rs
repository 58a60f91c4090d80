//! Sessions shared across requests, one set per account.
//!
//! The pool is the only shared mutable structure of the engine. Creating
//! and evicting sessions is serialized per account; once checked out, a
//! session is used without any pool lock held. A connection failure in
//! one account's session never touches another account.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::command::Command;
use crate::connection::AccountSettings;
use crate::session::{Session, SessionConfig};
use crate::{Error, Result};

/// Identifies one configured account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Session>> + Send>>;
type Connector = Arc<dyn Fn(AccountSettings, SessionConfig) -> ConnectFuture + Send + Sync>;

struct Account {
    settings: AccountSettings,
    create_lock: Arc<tokio::sync::Mutex<()>>,
}

struct Inner {
    default_config: SessionConfig,
    accounts: Mutex<HashMap<AccountId, Account>>,
    idle: Mutex<HashMap<AccountId, Vec<Session>>>,
    connector: Connector,
}

impl Inner {
    fn accounts(&self) -> MutexGuard<'_, HashMap<AccountId, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn idle(&self) -> MutexGuard<'_, HashMap<AccountId, Vec<Session>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keyed registry of authenticated sessions.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<Inner>,
}

impl SessionPool {
    /// Creates a pool that opens sessions with [`Session::open`].
    ///
    /// `default_config` applies to accounts without their own
    /// [`AccountSettings::session`].
    #[must_use]
    pub fn new(default_config: SessionConfig) -> Self {
        Self::with_connector(default_config, |settings: AccountSettings, config: SessionConfig| async move {
            Session::open(&settings.server, &settings.credentials, config).await
        })
    }

    /// Creates a pool with a custom way of opening sessions.
    #[must_use]
    pub fn with_connector<F, Fut>(default_config: SessionConfig, connect: F) -> Self
    where
        F: Fn(AccountSettings, SessionConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Session>> + Send + 'static,
    {
        let connector: Connector = Arc::new(move |settings: AccountSettings, config: SessionConfig| {
            Box::pin(connect(settings, config)) as ConnectFuture
        });
        Self {
            inner: Arc::new(Inner {
                default_config,
                accounts: Mutex::new(HashMap::new()),
                idle: Mutex::new(HashMap::new()),
                connector,
            }),
        }
    }

    /// Adds or replaces an account.
    ///
    /// Idle sessions opened with previous settings are closed.
    pub fn register(&self, id: AccountId, settings: AccountSettings) {
        let replaced = self
            .inner
            .accounts()
            .insert(
                id.clone(),
                Account {
                    settings,
                    create_lock: Arc::new(tokio::sync::Mutex::new(())),
                },
            )
            .is_some();
        if replaced {
            self.evict(&id);
        }
        tracing::debug!(account = %id, replaced, "account registered");
    }

    /// Registered account ids, sorted.
    #[must_use]
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.inner.accounts().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of idle sessions kept for `id`.
    #[must_use]
    pub fn idle_count(&self, id: &AccountId) -> usize {
        self.inner.idle().get(id).map_or(0, Vec::len)
    }

    /// Takes a live session for `id`, opening one if none is idle.
    ///
    /// Idle sessions are probed with NOOP first; one that fails the probe
    /// is closed and replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown account, or the error of
    /// opening a new session.
    pub async fn checkout(&self, id: &AccountId) -> Result<PooledSession> {
        let (settings, create_lock) = {
            let accounts = self.inner.accounts();
            let account = accounts
                .get(id)
                .ok_or_else(|| Error::Config(format!("unknown account: {id}")))?;
            (account.settings.clone(), Arc::clone(&account.create_lock))
        };
        let _creating = create_lock.lock().await;

        while let Some(session) = self.take_idle(id) {
            match probe(&session).await {
                Ok(()) => {
                    tracing::debug!(account = %id, "reusing pooled session");
                    return Ok(self.wrap(id, session));
                }
                Err(err) => {
                    tracing::warn!(account = %id, error = %err, "evicting stale pooled session");
                    session.close_connection();
                }
            }
        }

        let config = settings
            .session
            .clone()
            .unwrap_or_else(|| self.inner.default_config.clone());
        let session = (self.inner.connector)(settings, config).await?;
        tracing::info!(account = %id, "pooled session opened");
        Ok(self.wrap(id, session))
    }

    /// Runs `op` once per account, concurrently, and returns the results
    /// in the order of `ids`.
    ///
    /// A failure for one account does not affect the others.
    pub async fn fan_out<T, F, Fut>(&self, ids: &[AccountId], op: F) -> Vec<(AccountId, Result<T>)>
    where
        T: Send + 'static,
        F: Fn(PooledSession) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let op = Arc::new(op);
        let mut tasks = JoinSet::new();
        for (index, id) in ids.iter().enumerate() {
            let pool = self.clone();
            let op = Arc::clone(&op);
            let id = id.clone();
            tasks.spawn(async move {
                let result = match pool.checkout(&id).await {
                    Ok(session) => op(session).await,
                    Err(err) => Err(err),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<T>>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => tracing::warn!(error = %err, "fan-out task failed"),
            }
        }

        ids.iter()
            .cloned()
            .zip(results)
            .map(|(id, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(Error::ConnectionLost(format!("operation for {id} aborted")))
                });
                (id, result)
            })
            .collect()
    }

    /// Closes every idle session of `id`.
    pub fn evict(&self, id: &AccountId) {
        let sessions = self.inner.idle().remove(id).unwrap_or_default();
        if !sessions.is_empty() {
            tracing::info!(account = %id, count = sessions.len(), "evicting pooled sessions");
        }
        for session in sessions {
            session.close_connection();
        }
    }

    /// Logs out every idle session.
    pub async fn shutdown(&self) {
        let idle: Vec<(AccountId, Vec<Session>)> = self.inner.idle().drain().collect();
        for (id, sessions) in idle {
            for mut session in sessions {
                if let Err(err) = session.logout().await {
                    tracing::debug!(account = %id, error = %err, "logout during shutdown failed");
                }
            }
        }
        tracing::info!("session pool shut down");
    }

    fn take_idle(&self, id: &AccountId) -> Option<Session> {
        self.inner.idle().get_mut(id)?.pop()
    }

    fn wrap(&self, id: &AccountId, session: Session) -> PooledSession {
        PooledSession {
            session: Some(session),
            account: id.clone(),
            pool: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("accounts", &self.accounts())
            .finish_non_exhaustive()
    }
}

async fn probe(session: &Session) -> Result<()> {
    if !session.is_connected() {
        return Err(session_gone());
    }
    session.execute(Command::Noop).await?.check()?;
    Ok(())
}

fn session_gone() -> Error {
    Error::ConnectionLost("pooled session disconnected".into())
}

/// A checked-out session.
///
/// Dereferences to [`Session`]. On drop it goes back to the pool if it is
/// still connected and authenticated.
pub struct PooledSession {
    session: Option<Session>,
    account: AccountId,
    pool: Weak<Inner>,
}

impl PooledSession {
    /// The account this session belongs to.
    #[must_use]
    pub const fn account(&self) -> &AccountId {
        &self.account
    }

    /// Takes the session out of the pool's care.
    #[must_use]
    pub fn detach(mut self) -> Option<Session> {
        self.session.take()
    }
}

impl Deref for PooledSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        match &self.session {
            Some(session) => session,
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Session {
        match &mut self.session {
            Some(session) => session,
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(pool) = self.pool.upgrade() else {
            return;
        };
        if session.is_connected() && session.state().is_authenticated() {
            pool.idle().entry(self.account.clone()).or_default().push(session);
        } else {
            tracing::debug!(account = %self.account, "dropping disconnected session");
        }
    }
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("account", &self.account)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio_test::io::Builder;

    use super::*;
    use crate::connection::{Credentials, ServerParams};
    use crate::session::SessionState;

    const OPEN: Duration = Duration::from_secs(3600);

    fn quiet() -> SessionConfig {
        SessionConfig::new().keepalive_interval(None).auto_reconnect(false)
    }

    fn settings(host: &str) -> AccountSettings {
        AccountSettings {
            server: ServerParams::new(host),
            credentials: Credentials::password("user", "secret"),
            smtp: None,
            session: None,
        }
    }

    /// A pool whose n-th connection (from 0) follows `script(n)`.
    fn scripted_pool<F>(script: F) -> (SessionPool, Arc<AtomicUsize>)
    where
        F: Fn(usize) -> Builder + Send + Sync + 'static,
    {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let pool = SessionPool::with_connector(quiet(), move |_settings, config| {
            let mock = script(counter.fetch_add(1, Ordering::SeqCst)).build();
            async move { Session::from_stream(mock, config).await }
        });
        (pool, opened)
    }

    fn preauth() -> Builder {
        let mut builder = Builder::new();
        builder.read(b"* PREAUTH ready\r\n");
        builder
    }

    #[tokio::test]
    async fn test_checkout_reuses_idle_session() {
        let (pool, opened) = scripted_pool(|_| {
            let mut b = preauth();
            b.write(b"A0000 NOOP\r\n").read(b"A0000 OK\r\n").wait(OPEN);
            b
        });
        let id = AccountId::new("work");
        pool.register(id.clone(), settings("imap.work.example"));

        let session = pool.checkout(&id).await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        drop(session);
        assert_eq!(pool.idle_count(&id), 1);

        let session = pool.checkout(&id).await.unwrap();
        assert_eq!(pool.idle_count(&id), 0);
        assert_eq!(session.account(), &id);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_session_is_replaced() {
        let (pool, opened) = scripted_pool(|n| {
            let mut b = preauth();
            if n == 0 {
                b.write(b"A0000 NOOP\r\n").read(b"A0000 NO server going away\r\n");
            }
            b.wait(OPEN);
            b
        });
        let id = AccountId::new("home");
        pool.register(id.clone(), settings("imap.home.example"));

        drop(pool.checkout(&id).await.unwrap());
        let _fresh = pool.checkout(&id).await.unwrap();

        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(&id), 0);
    }

    #[tokio::test]
    async fn test_closed_session_is_not_returned() {
        let (pool, _) = scripted_pool(|_| {
            let mut b = preauth();
            b.wait(OPEN);
            b
        });
        let id = AccountId::new("a");
        pool.register(id.clone(), settings("imap.a.example"));

        let session = pool.checkout(&id).await.unwrap();
        session.close_connection();
        drop(session);

        assert_eq!(pool.idle_count(&id), 0);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (pool, _) = scripted_pool(|_| preauth());
        let err = pool.checkout(&AccountId::new("nobody")).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_fan_out_keeps_order_and_isolates_failures() {
        let (pool, _) = scripted_pool(|_| {
            let mut b = preauth();
            b.wait(OPEN);
            b
        });
        pool.register(AccountId::new("one"), settings("imap.one.example"));
        pool.register(AccountId::new("two"), settings("imap.two.example"));
        let ids = [AccountId::new("two"), AccountId::new("missing"), AccountId::new("one")];

        let results = pool
            .fan_out(&ids, |session| async move {
                Ok(session.account().as_str().to_uppercase())
            })
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.as_str(), "two");
        assert_eq!(results[0].1.as_ref().unwrap(), "TWO");
        assert!(matches!(results[1].1, Err(Error::Config(_))));
        assert_eq!(results[2].1.as_ref().unwrap(), "ONE");
        assert_eq!(pool.idle_count(&AccountId::new("one")), 1);
    }
}
