//! Tags and message identifiers.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Command tag correlating a command with its completion line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Returns `None` for zero.
            #[must_use]
            pub fn new(n: u32) -> Option<Self> {
                NonZeroU32::new(n).map(Self)
            }

            /// Returns `None` for zero or values above `u32::MAX`.
            #[must_use]
            pub fn from_wire(n: u64) -> Option<Self> {
                u32::try_from(n).ok().and_then(Self::new)
            }

            /// Returns the underlying value.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// Message sequence number; shifts when messages are expunged.
    SeqNum
);

nonzero_id!(
    /// Folder-scoped persistent message identifier.
    Uid
);

nonzero_id!(
    /// Generation counter of a folder's UIDs. A change invalidates every
    /// cached UID for that folder.
    UidValidity
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rejected() {
        assert!(Uid::new(0).is_none());
        assert!(SeqNum::from_wire(0).is_none());
        assert!(UidValidity::from_wire(u64::from(u32::MAX) + 1).is_none());
        assert_eq!(Uid::from_wire(42).unwrap().get(), 42);
    }

    #[test]
    fn test_uid_ordering_and_display() {
        let a = Uid::new(3).unwrap();
        let b = Uid::new(10).unwrap();
        assert!(a < b);
        assert_eq!(b.to_string(), "10");
    }

    #[test]
    fn test_uid_serde_is_transparent() {
        let uid = Uid::new(77).unwrap();
        assert_eq!(serde_json::to_string(&uid).unwrap(), "77");
        assert_eq!(serde_json::from_str::<Uid>("77").unwrap(), uid);
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag::new("A0001").to_string(), "A0001");
    }
}
