//! Message flags.

use serde::{Deserialize, Serialize};

/// Message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent` (server-managed, cannot be stored).
    Recent,
    /// `\*` in PERMANENTFLAGS: new keywords may be created.
    MayCreate,
    /// Keyword or unknown system flag, kept verbatim.
    Keyword(String),
}

impl Flag {
    /// Parses a flag atom, case-insensitively for system flags.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let system = [
            ("\\Seen", Self::Seen),
            ("\\Answered", Self::Answered),
            ("\\Flagged", Self::Flagged),
            ("\\Deleted", Self::Deleted),
            ("\\Draft", Self::Draft),
            ("\\Recent", Self::Recent),
            ("\\*", Self::MayCreate),
        ];
        system
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map_or_else(|| Self::Keyword(s.to_string()), |(_, flag)| flag)
    }

    /// Wire form of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::MayCreate => "\\*",
            Self::Keyword(s) => s,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of flags in wire order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags(Vec<Flag>);

impl Flags {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a flag unless already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.0.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// `\Answered` is set.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.contains(&Flag::Answered)
    }

    /// `\Flagged` is set.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.contains(&Flag::Flagged)
    }

    /// `\Deleted` is set.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// `\Draft` is set.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.contains(&Flag::Draft)
    }

    /// `\Recent` is set.
    #[must_use]
    pub fn is_recent(&self) -> bool {
        self.contains(&Flag::Recent)
    }

    /// Iterates the flags.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    /// Number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Flags {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
