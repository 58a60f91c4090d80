//! Authentication method selection and SASL initial responses.
//!
//! Implements:
//! - PLAIN (RFC 4616), used when the server sets `LOGINDISABLED`
//! - XOAUTH2 (Google/Microsoft)
//! - OAUTHBEARER (RFC 7628)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::connection::{Credentials, Secret};
use crate::types::CapabilitySet;
use crate::{Error, Result};

/// A SASL mechanism the engine can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// `AUTHENTICATE PLAIN`.
    Plain,
    /// `AUTHENTICATE XOAUTH2`.
    XOAuth2,
    /// `AUTHENTICATE OAUTHBEARER`.
    OAuthBearer,
}

impl Mechanism {
    /// Mechanism name as sent on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }

    /// Base64 initial client response for `credentials`.
    #[must_use]
    pub fn initial_response(self, credentials: &Credentials) -> String {
        let user = &credentials.username;
        let raw = match (self, &credentials.secret) {
            (Self::Plain, Secret::Password(password) | Secret::OAuth2Token(password)) => {
                format!("\0{user}\0{password}")
            }
            (Self::XOAuth2, Secret::Password(token) | Secret::OAuth2Token(token)) => {
                format!("user={user}\x01auth=Bearer {token}\x01\x01")
            }
            (Self::OAuthBearer, Secret::Password(token) | Secret::OAuth2Token(token)) => {
                format!("n,a={user},\x01auth=Bearer {token}\x01\x01")
            }
        };
        STANDARD.encode(raw.as_bytes())
    }
}

/// How to authenticate against a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Plain `LOGIN`.
    Login,
    /// `AUTHENTICATE` with a SASL mechanism.
    Sasl {
        /// Mechanism to use.
        mechanism: Mechanism,
        /// Send the initial response with the command (RFC 4959 SASL-IR).
        inline: bool,
    },
}

/// Picks the authentication method for `credentials` given the server's
/// capabilities.
///
/// # Errors
///
/// Returns [`Error::CapabilityUnsupported`] if the server offers no usable
/// mechanism.
pub fn choose(credentials: &Credentials, caps: &CapabilitySet) -> Result<AuthMethod> {
    let inline = caps.supports("SASL-IR");
    match credentials.secret {
        Secret::Password(_) if !caps.supports("LOGINDISABLED") => Ok(AuthMethod::Login),
        Secret::Password(_) if caps.supports("AUTH=PLAIN") => Ok(AuthMethod::Sasl {
            mechanism: Mechanism::Plain,
            inline,
        }),
        Secret::Password(_) => Err(Error::CapabilityUnsupported(
            "LOGIN is disabled and AUTH=PLAIN is not offered".into(),
        )),
        Secret::OAuth2Token(_) => [Mechanism::XOAuth2, Mechanism::OAuthBearer]
            .into_iter()
            .find(|m| caps.supports(&format!("AUTH={}", m.name())))
            .map(|mechanism| AuthMethod::Sasl { mechanism, inline })
            .ok_or_else(|| Error::CapabilityUnsupported("AUTH=XOAUTH2 or AUTH=OAUTHBEARER".into())),
    }
}

/// Decodes the error a server sends as an OAuth challenge.
///
/// XOAUTH2 and OAUTHBEARER servers answer a rejected token with a base64
/// JSON document such as `{"status":"401","schemes":"Bearer"}` and wait
/// for an empty client response before failing the command.
#[must_use]
pub fn describe_challenge(challenge: &str) -> Option<String> {
    let bytes = STANDARD.decode(challenge.trim()).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let status = value.get("status").and_then(serde_json::Value::as_str)?;
    Some(match value.get("scope").and_then(serde_json::Value::as_str) {
        Some(scope) => format!("status {status}, scope {scope}"),
        None => format!("status {status}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn caps(names: &[&str]) -> CapabilitySet {
        names.iter().collect()
    }

    #[test]
    fn test_plain_response() {
        let creds = Credentials::password("user", "pass");
        let decoded = STANDARD
            .decode(Mechanism::Plain.initial_response(&creds))
            .unwrap();
        assert_eq!(decoded, b"\0user\0pass");
    }

    #[test]
    fn test_xoauth2_response() {
        let creds = Credentials::oauth2("user@example.com", "ya29.token");
        let decoded = STANDARD
            .decode(Mechanism::XOAuth2.initial_response(&creds))
            .unwrap();
        assert_eq!(
            decoded,
            b"user=user@example.com\x01auth=Bearer ya29.token\x01\x01"
        );
    }

    #[test]
    fn test_oauthbearer_response() {
        let creds = Credentials::oauth2("user@example.com", "tok");
        let decoded = STANDARD
            .decode(Mechanism::OAuthBearer.initial_response(&creds))
            .unwrap();
        assert_eq!(decoded, b"n,a=user@example.com,\x01auth=Bearer tok\x01\x01");
    }

    #[test]
    fn test_password_uses_login_unless_disabled() {
        let creds = Credentials::password("u", "p");
        assert_eq!(
            choose(&creds, &caps(&["IMAP4rev1"])).unwrap(),
            AuthMethod::Login
        );
        assert_eq!(
            choose(&creds, &caps(&["IMAP4rev1", "LOGINDISABLED", "AUTH=PLAIN", "SASL-IR"])).unwrap(),
            AuthMethod::Sasl {
                mechanism: Mechanism::Plain,
                inline: true
            }
        );
        assert!(matches!(
            choose(&creds, &caps(&["LOGINDISABLED"])),
            Err(Error::CapabilityUnsupported(_))
        ));
    }

    #[test]
    fn test_oauth_prefers_xoauth2() {
        let creds = Credentials::oauth2("u", "t");
        assert_eq!(
            choose(&creds, &caps(&["AUTH=OAUTHBEARER", "AUTH=XOAUTH2"])).unwrap(),
            AuthMethod::Sasl {
                mechanism: Mechanism::XOAuth2,
                inline: false
            }
        );
        assert_eq!(
            choose(&creds, &caps(&["auth=oauthbearer"])).unwrap(),
            AuthMethod::Sasl {
                mechanism: Mechanism::OAuthBearer,
                inline: false
            }
        );
        assert!(choose(&creds, &caps(&["AUTH=PLAIN"])).is_err());
    }

    #[test]
    fn test_describe_challenge() {
        let challenge = STANDARD.encode(br#"{"status":"401","schemes":"Bearer","scope":"mail"}"#);
        assert_eq!(
            describe_challenge(&challenge).as_deref(),
            Some("status 401, scope mail")
        );
        assert_eq!(describe_challenge("not base64!"), None);
    }
}
