//! Page arithmetic over a sorted result set.

use std::ops::Range;

/// Messages per page unless configured otherwise.
pub const DEFAULT_PER_PAGE: usize = 50;

/// Splits `total` items into pages of `per_page`.
///
/// Pages are numbered from 1. `per_page == None` disables paging: there is
/// exactly one page holding everything. The current page is always clamped
/// to `1..=max_page`, and an empty result still has one (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    total: usize,
    per_page: Option<usize>,
    page: usize,
}

impl Paginator {
    /// Creates a paginator positioned on `page`, clamped into range.
    #[must_use]
    pub fn new(total: usize, per_page: Option<usize>, page: usize) -> Self {
        let mut paginator = Self {
            total,
            per_page: per_page.filter(|&n| n > 0),
            page: 1,
        };
        paginator.set_page(page);
        paginator
    }

    /// Moves to `page`, clamped into `1..=max_page`.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.max_page());
    }

    /// Current page.
    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    /// Number of items over all pages.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Items per page, `None` when paging is disabled.
    #[must_use]
    pub const fn per_page(&self) -> Option<usize> {
        self.per_page
    }

    /// Last page number; at least 1.
    #[must_use]
    pub fn max_page(&self) -> usize {
        match self.per_page {
            Some(per_page) => self.total.div_ceil(per_page).max(1),
            None => 1,
        }
    }

    /// True unless on the last page.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.max_page()
    }

    /// True unless on the first page.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// The following page, wrapping from the last page to the first.
    #[must_use]
    pub fn next_page(&self) -> usize {
        if self.has_next() { self.page + 1 } else { 1 }
    }

    /// The preceding page, wrapping from the first page to the last.
    #[must_use]
    pub fn previous_page(&self) -> usize {
        if self.has_previous() {
            self.page - 1
        } else {
            self.max_page()
        }
    }

    /// True on page 1.
    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.page == 1
    }

    /// True on the last page.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.page == self.max_page()
    }

    /// Index range of the current page within the full result.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        match self.per_page {
            Some(per_page) => {
                let start = ((self.page - 1) * per_page).min(self.total);
                start..(start + per_page).min(self.total)
            }
            None => 0..self.total,
        }
    }

    /// The current page of `items`.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.range();
        let end = range.end.min(items.len());
        &items[range.start.min(end)..end]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_page_is_clamped() {
        assert_eq!(Paginator::new(120, Some(50), 0).page(), 1);
        assert_eq!(Paginator::new(120, Some(50), 9).page(), 3);
        assert_eq!(Paginator::new(0, Some(50), 4).page(), 1);
    }

    #[test]
    fn test_last_page_is_short() {
        let paginator = Paginator::new(120, Some(50), 3);
        assert_eq!(paginator.range(), 100..120);
        assert!(paginator.is_last());
        assert!(!paginator.has_next());
        assert_eq!(paginator.next_page(), 1);
    }

    #[test]
    fn test_previous_wraps_to_last() {
        let paginator = Paginator::new(101, Some(50), 1);
        assert!(paginator.is_first());
        assert_eq!(paginator.max_page(), 3);
        assert_eq!(paginator.previous_page(), 3);
        assert_eq!(paginator.next_page(), 2);
    }

    #[test]
    fn test_paging_disabled() {
        let paginator = Paginator::new(731, None, 5);
        assert_eq!(paginator.page(), 1);
        assert_eq!(paginator.max_page(), 1);
        assert_eq!(paginator.range(), 0..731);
        assert!(paginator.is_first() && paginator.is_last());
    }

    #[test]
    fn test_slice() {
        let items: Vec<u32> = (1..=7).collect();
        let paginator = Paginator::new(items.len(), Some(3), 3);
        assert_eq!(paginator.slice(&items), &[7]);
    }

    proptest! {
        #[test]
        fn prop_pages_tile_the_result(total in 0usize..500, per_page in 1usize..60) {
            let max_page = Paginator::new(total, Some(per_page), 1).max_page();
            let mut covered = 0;
            for page in 1..=max_page {
                let range = Paginator::new(total, Some(per_page), page).range();
                prop_assert_eq!(range.start, covered);
                prop_assert!(range.len() <= per_page);
                covered = range.end;
            }
            prop_assert_eq!(covered, total);
        }
    }
}
