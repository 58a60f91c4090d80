//! Server capabilities and response status.

use std::collections::BTreeSet;

/// Response status from a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Wire keyword for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// IDLE command support (RFC 2177)
    Idle,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// MOVE extension (RFC 6851)
    Move,
    /// LITERAL+ extension (RFC 7888)
    LiteralPlus,
    /// LITERAL- extension (RFC 7888)
    LiteralMinus,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled
    LoginDisabled,
    /// SASL initial response (RFC 4959)
    SaslIr,
    /// SORT extension (RFC 5256)
    Sort,
    /// THREAD algorithm (RFC 5256)
    Thread(String),
    /// AUTH mechanism
    Auth(String),
    /// SPECIAL-USE mailboxes (RFC 6154)
    SpecialUse,
    /// Unknown capability
    Unknown(String),
}

impl Capability {
    /// Parses a capability string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "IDLE" => Self::Idle,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "LITERAL+" => Self::LiteralPlus,
            "LITERAL-" => Self::LiteralMinus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SASL-IR" => Self::SaslIr,
            "SORT" => Self::Sort,
            "SPECIAL-USE" => Self::SpecialUse,
            _ if upper.starts_with("AUTH=") => Self::Auth(upper[5..].to_string()),
            _ if upper.starts_with("THREAD=") => Self::Thread(upper[7..].to_string()),
            _ => Self::Unknown(s.to_string()),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => write!(f, "IMAP4rev1"),
            Self::Imap4Rev2 => write!(f, "IMAP4rev2"),
            Self::Idle => write!(f, "IDLE"),
            Self::UidPlus => write!(f, "UIDPLUS"),
            Self::Move => write!(f, "MOVE"),
            Self::LiteralPlus => write!(f, "LITERAL+"),
            Self::LiteralMinus => write!(f, "LITERAL-"),
            Self::StartTls => write!(f, "STARTTLS"),
            Self::LoginDisabled => write!(f, "LOGINDISABLED"),
            Self::SaslIr => write!(f, "SASL-IR"),
            Self::Sort => write!(f, "SORT"),
            Self::Thread(alg) => write!(f, "THREAD={alg}"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::SpecialUse => write!(f, "SPECIAL-USE"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Uppercased snapshot of what a server advertised.
///
/// A feature is supported when it is present verbatim (`SORT`), or when it
/// names a family present with a parameter (`THREAD` matches
/// `THREAD=REFERENCES`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    names: BTreeSet<String>,
}

impl CapabilitySet {
    /// Builds a snapshot from parsed capabilities.
    #[must_use]
    pub fn from_capabilities(caps: &[Capability]) -> Self {
        caps.iter().map(ToString::to_string).collect()
    }

    /// Checks for a capability, ignoring case.
    #[must_use]
    pub fn supports(&self, feature: &str) -> bool {
        let wanted = feature.to_uppercase();
        if self.names.contains(&wanted) {
            return true;
        }
        let prefix = format!("{wanted}=");
        self.names
            .range(prefix.clone()..)
            .next()
            .is_some_and(|name| name.starts_with(&prefix))
    }

    /// Parameters of `FAMILY=param` entries, e.g. `AUTH` mechanisms.
    #[must_use]
    pub fn parameters(&self, family: &str) -> Vec<String> {
        let prefix = format!("{}=", family.to_uppercase());
        self.names
            .iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Advertised SASL mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<String> {
        self.parameters("AUTH")
    }

    /// Advertised THREAD algorithms.
    #[must_use]
    pub fn thread_algorithms(&self) -> Vec<String> {
        self.parameters("THREAD")
    }

    /// Iterates over the uppercased names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of advertised capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|s| s.as_ref().to_uppercase())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bad.is_ok());
        assert!(!Status::Bye.is_ok());
    }

    #[test]
    fn parse_known_capabilities() {
        assert_eq!(Capability::parse("imap4rev1"), Capability::Imap4Rev1);
        assert_eq!(Capability::parse("SORT"), Capability::Sort);
        assert_eq!(Capability::parse("sasl-ir"), Capability::SaslIr);
        assert_eq!(
            Capability::parse("thread=references"),
            Capability::Thread("REFERENCES".to_string())
        );
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("X-CUSTOM"),
            Capability::Unknown("X-CUSTOM".to_string())
        );
    }

    #[test]
    fn set_is_case_insensitive() {
        let set: CapabilitySet = ["imap4rev1", "Sort", "THREAD=REFERENCES"]
            .into_iter()
            .collect();
        assert!(set.supports("SORT"));
        assert!(set.supports("sort"));
        assert!(set.supports("IMAP4REV1"));
        assert!(!set.supports("MOVE"));
    }

    #[test]
    fn family_prefix_matches_parameterised_entries() {
        let set: CapabilitySet = ["THREAD=ORDEREDSUBJECT", "AUTH=PLAIN", "AUTH=XOAUTH2"]
            .into_iter()
            .collect();
        assert!(set.supports("THREAD"));
        assert!(set.supports("thread=orderedsubject"));
        assert!(!set.supports("THREAD=REFERENCES"));
        assert!(!set.supports("THR"));
        assert_eq!(set.auth_mechanisms(), vec!["PLAIN", "XOAUTH2"]);
        assert_eq!(set.thread_algorithms(), vec!["ORDEREDSUBJECT"]);
    }

    #[test]
    fn from_capabilities_uppercases_display_form() {
        let set = CapabilitySet::from_capabilities(&[
            Capability::Imap4Rev1,
            Capability::LiteralPlus,
        ]);
        assert!(set.supports("IMAP4REV1"));
        assert!(set.supports("LITERAL+"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_set_supports_nothing() {
        let set = CapabilitySet::default();
        assert!(set.is_empty());
        assert!(!set.supports("IMAP4REV1"));
    }
}
