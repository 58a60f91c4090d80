//! Connection parameters handed in by the web layer.
//!
//! These are resolved, immutable values: the engine performs no file
//! lookups or precedence resolution of its own. [`AccountSettings`] can be
//! built from a flat [`Settings`] map (`imap.host`, `smtp.port`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;
use crate::{Error, Result};

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Where and how to reach one IMAP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerParams {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl ServerParams {
    /// Creates parameters for implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 993,
            security: Security::Implicit,
        }
    }

    /// Creates a parameters builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ServerParamsBuilder {
        ServerParamsBuilder::new(host)
    }
}

/// Builder for [`ServerParams`].
#[derive(Debug, Clone)]
pub struct ServerParamsBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
}

impl ServerParamsBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Builds the parameters; without a port the mode's default is used.
    #[must_use]
    pub fn build(self) -> ServerParams {
        ServerParams {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
        }
    }
}

/// A login secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Secret {
    /// Plain password (LOGIN or AUTHENTICATE PLAIN).
    Password(String),
    /// OAuth2 access token (XOAUTH2 or OAUTHBEARER).
    OAuth2Token(String),
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::OAuth2Token(_) => f.write_str("OAuth2Token(<redacted>)"),
        }
    }
}

/// The acting user's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password or token.
    pub secret: Secret,
}

impl Credentials {
    /// Password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::Password(password.into()),
        }
    }

    /// OAuth2 credentials.
    #[must_use]
    pub fn oauth2(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::OAuth2Token(token.into()),
        }
    }
}

/// SMTP transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// STARTTLS upgrade.
    #[default]
    Tls,
    /// Implicit TLS.
    Ssl,
    /// Plaintext.
    None,
}

impl FromStr for SmtpSecurity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tls" | "starttls" => Ok(Self::Tls),
            "ssl" => Ok(Self::Ssl),
            "none" | "" => Ok(Self::None),
            other => Err(Error::Config(format!("unknown smtp.security: {other}"))),
        }
    }
}

/// Per-identity SMTP settings. Carried for the web layer; the IMAP engine
/// never opens an SMTP connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport security.
    pub security: SmtpSecurity,
    /// Separate SMTP credentials, if any.
    pub credentials: Option<Credentials>,
    /// Reuse the IMAP credentials for SMTP AUTH.
    pub use_imap_auth: bool,
}

/// Everything needed to open sessions for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// IMAP server.
    pub server: ServerParams,
    /// IMAP credentials.
    pub credentials: Credentials,
    /// Outgoing mail settings.
    pub smtp: Option<SmtpSettings>,
    /// Session tuning; `None` uses the pool default.
    #[serde(default)]
    pub session: Option<SessionConfig>,
}

/// A flat, sectioned key/value map such as `imap.host = mail.example.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a value; keys are case-insensitive.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config(format!("missing setting {key}")))
    }

    fn port(&self, key: &str) -> Result<Option<u16>> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse()
                    .map_err(|_| Error::Config(format!("{key} is not a port: {v}")))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None | Some("" | "0" | "false" | "no" | "off") => Ok(false),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some(other) => Err(Error::Config(format!("{key} is not a boolean: {other}"))),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl AccountSettings {
    /// Builds account settings for `credentials` from a resolved map.
    ///
    /// Reads `imap.host`, `imap.port`, `imap.ssl`, `imap.starttls` and the
    /// optional `smtp.*` section. `imap.ssl` wins over `imap.starttls`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for missing hosts or unparseable values.
    pub fn from_settings(settings: &Settings, credentials: Credentials) -> Result<Self> {
        let security = if settings.flag("imap.ssl")? {
            Security::Implicit
        } else if settings.flag("imap.starttls")? {
            Security::StartTls
        } else {
            Security::None
        };
        let mut server = ServerParams::builder(settings.require("imap.host")?).security(security);
        if let Some(port) = settings.port("imap.port")? {
            server = server.port(port);
        }

        let smtp = match settings.get("smtp.host").filter(|h| !h.is_empty()) {
            None => None,
            Some(host) => {
                let security: SmtpSecurity = settings.get("smtp.security").unwrap_or("tls").parse()?;
                let port = settings.port("smtp.port")?.unwrap_or(match security {
                    SmtpSecurity::Tls => 587,
                    SmtpSecurity::Ssl => 465,
                    SmtpSecurity::None => 25,
                });
                let use_imap_auth = settings.flag("smtp.use_imap_auth")?;
                let credentials = match (settings.get("smtp.user"), settings.get("smtp.passwd")) {
                    (Some(user), Some(pass)) if !use_imap_auth && !user.is_empty() => {
                        Some(Credentials::password(user, pass))
                    }
                    _ => None,
                };
                Some(SmtpSettings {
                    host: host.to_string(),
                    port,
                    security,
                    credentials,
                    use_imap_auth,
                })
            }
        };

        Ok(Self {
            server: server.build(),
            credentials,
            smtp,
            session: None,
        })
    }
}
