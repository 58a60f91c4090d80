//! UID sets for UID-prefixed commands.

use super::Uid;

/// A set of UIDs as written in `UID FETCH`, `UID STORE`, `UID COPY`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// Single UID.
    Single(Uid),
    /// Inclusive range.
    Range(Uid, Uid),
    /// From a UID to the highest one (`n:*`).
    RangeFrom(Uid),
    /// Every message (`1:*`).
    All,
    /// Union of sets.
    Set(Vec<Self>),
}

impl UidSet {
    /// Creates a set with a single UID.
    #[must_use]
    pub const fn single(uid: Uid) -> Self {
        Self::Single(uid)
    }

    /// Creates a range; bounds may be given in either order.
    #[must_use]
    pub fn range(start: Uid, end: Uid) -> Self {
        if start == end {
            Self::Single(start)
        } else {
            Self::Range(start.min(end), start.max(end))
        }
    }

    /// Builds the most compact set covering exactly `uids`.
    ///
    /// Returns `None` for an empty slice, which has no wire form.
    #[must_use]
    pub fn from_uids(uids: &[Uid]) -> Option<Self> {
        let mut sorted = uids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut runs: Vec<Self> = Vec::new();
        let mut iter = sorted.into_iter();
        let first = iter.next()?;
        let (mut start, mut end) = (first, first);
        for uid in iter {
            if uid.get() == end.get() + 1 {
                end = uid;
            } else {
                runs.push(Self::range(start, end));
                (start, end) = (uid, uid);
            }
        }
        runs.push(Self::range(start, end));

        Some(if runs.len() == 1 {
            runs.swap_remove(0)
        } else {
            Self::Set(runs)
        })
    }

    /// Returns true if `uid` falls inside the set.
    #[must_use]
    pub fn contains(&self, uid: Uid) -> bool {
        match self {
            Self::Single(only) => *only == uid,
            Self::Range(start, end) => (*start..=*end).contains(&uid),
            Self::RangeFrom(start) => uid >= *start,
            Self::All => true,
            Self::Set(items) => items.iter().any(|item| item.contains(uid)),
        }
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(uid) => write!(f, "{uid}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::All => f.write_str("1:*"),
            Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}
