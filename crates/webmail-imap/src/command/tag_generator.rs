//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::Tag;

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format "A001", "A002", etc.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    ///
    /// The counter wraps after `u32::MAX`; a tag is only reused once every
    /// earlier command on the connection has long completed.
    #[must_use]
    pub fn next(&self) -> Tag {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Tag::new(format!("{}{:04}", self.prefix, n))
    }

    /// Returns the current counter value without incrementing.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Resets the counter to zero.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

impl Clone for TagGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU32::new(self.counter.load(Ordering::Relaxed)),
            prefix: self.prefix,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next().as_str(), "A0000");
        assert_eq!(generator.next().as_str(), "A0001");
        assert_eq!(generator.next().as_str(), "A0002");
    }

    #[test]
    fn test_custom_prefix() {
        let generator = TagGenerator::new('T');
        assert_eq!(generator.next().as_str(), "T0000");
    }

    #[test]
    fn test_reset_and_current() {
        let generator = TagGenerator::default();
        let _ = generator.next();
        let _ = generator.next();
        assert_eq!(generator.current(), 2);
        generator.reset();
        assert_eq!(generator.next().as_str(), "A0000");
    }

    #[test]
    fn test_uniqueness() {
        let generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10000 {
            assert!(seen.insert(generator.next()), "duplicate tag generated");
        }
    }

    #[test]
    fn test_wraps_instead_of_panicking() {
        let generator = TagGenerator::default();
        generator.counter.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(generator.next().as_str(), "A4294967295");
        assert_eq!(generator.next().as_str(), "A0000");
    }
}
