//! THREAD response interpretation (RFC 5256).

use super::sexpr::SExpr;
use crate::{Error, Result};

/// A message in a thread tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    /// Message number (UID for `UID THREAD`).
    pub id: u32,
    /// Replies, in server order.
    pub children: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Creates a node without children.
    #[must_use]
    pub const fn leaf(id: u32) -> Self {
        Self {
            id,
            children: Vec::new(),
        }
    }
}

/// Parses the thread lists of a `* THREAD` response into a forest.
///
/// `(3 6 (4 23)(44 7 96))` is the chain 3 → 6 whose children are the
/// chains 4 → 23 and 44 → 7 → 96. A list that starts with nested lists
/// has a missing parent; its branches become siblings.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] for non-list threads, zero or
/// out-of-range ids, or numbers after a nested list.
pub fn parse_threads(items: &[SExpr]) -> Result<Vec<ThreadNode>> {
    let mut forest = Vec::new();
    for item in items {
        let list = item
            .as_list()
            .ok_or_else(|| Error::malformed(0, format!("thread must be a list, got {}", item.kind())))?;
        forest.extend(build(list)?);
    }
    Ok(forest)
}

fn build(items: &[SExpr]) -> Result<Vec<ThreadNode>> {
    let split = items
        .iter()
        .position(|i| !matches!(i, SExpr::Number(_)))
        .unwrap_or(items.len());
    let (numbers, nested) = items.split_at(split);

    let mut children = Vec::new();
    for branch in nested {
        let list = branch
            .as_list()
            .ok_or_else(|| Error::malformed(0, "thread members must precede nested threads"))?;
        children.extend(build(list)?);
    }

    for n in numbers.iter().rev() {
        let id = n
            .as_number()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| Error::malformed(0, "invalid thread member"))?;
        children = vec![ThreadNode { id, children }];
    }

    Ok(children)
}
