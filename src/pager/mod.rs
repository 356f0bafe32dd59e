//! Windowing over the graph store.
//!
//! The pager holds a 1-based start index `s` and a page size `n` and selects
//! `store[s-1 .. min(s-1+n, len)]`. Whenever the store shrinks, `s` is pulled
//! back into `[1, max(1, len - n + 1)]` so a page is never empty while rows
//! remain. Changing `n` always returns to the first page.

use std::ops::Range;

use serde::Serialize;

/// Page size used when no preference is stored.
pub const DEFAULT_PER_PAGE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    start: usize,
    per_page: usize,
}

/// What the page header shows: `first`–`last` of `total`, and whether the
/// adjacent-page controls are live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub first: usize,
    pub last: usize,
    pub total: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl Pager {
    /// A pager on the first page. A page size of zero is treated as one.
    pub fn new(per_page: usize) -> Self {
        Self {
            start: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Largest valid start index for a store of `len` rows.
    pub fn max_start(&self, len: usize) -> usize {
        (len + 1).saturating_sub(self.per_page).max(1)
    }

    /// Pull `start` back into range for a store of `len` rows.
    pub fn clamp(&mut self, len: usize) {
        self.start = self.start.clamp(1, self.max_start(len));
    }

    /// Zero-based index range of the visible rows.
    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let start = self.start.clamp(1, self.max_start(len)) - 1;
        let end = (start + self.per_page).min(len);
        start.min(end)..end
    }

    pub fn has_prev(&self) -> bool {
        self.start > 1
    }

    pub fn has_next(&self, len: usize) -> bool {
        self.start + self.per_page <= len
    }

    /// Advance one page. No-op (returns `false`) at the last page.
    pub fn next(&mut self, len: usize) -> bool {
        if !self.has_next(len) {
            return false;
        }
        self.start += self.per_page;
        self.clamp(len);
        true
    }

    /// Go back one page. No-op (returns `false`) at the first page.
    pub fn prev(&mut self, len: usize) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.start = self.start.saturating_sub(self.per_page).max(1);
        self.clamp(len);
        true
    }

    /// Jump to an arbitrary 1-based start index, clamped.
    pub fn go_to(&mut self, start: usize, len: usize) {
        self.start = start;
        self.clamp(len);
    }

    /// Change the page size and return to the first page.
    pub fn set_per_page(&mut self, per_page: usize) {
        self.per_page = per_page.max(1);
        self.start = 1;
    }

    pub fn reset(&mut self) {
        self.start = 1;
    }

    pub fn info(&self, len: usize) -> PageInfo {
        let range = self.visible_range(len);
        PageInfo {
            first: if range.is_empty() { 0 } else { range.start + 1 },
            last: range.end,
            total: len,
            has_prev: self.has_prev(),
            has_next: self.has_next(len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_short_store() {
        let pager = Pager::new(25);
        assert_eq!(pager.visible_range(20), 0..20);
        assert!(!pager.has_prev());
        assert!(!pager.has_next(20));
    }

    #[test]
    fn next_and_prev_walk_pages() {
        let mut pager = Pager::new(10);
        assert!(pager.next(35));
        assert_eq!(pager.visible_range(35), 10..20);
        assert!(pager.next(35));
        assert!(pager.next(35));
        // s = 31 would overshoot; clamped to len - n + 1 = 26.
        assert_eq!(pager.start(), 26);
        assert_eq!(pager.visible_range(35), 25..35);
        assert!(!pager.next(35));
        assert!(pager.prev(35));
        assert_eq!(pager.start(), 16);
    }

    #[test]
    fn clamp_after_shrink_keeps_page_non_empty() {
        let mut pager = Pager::new(25);
        pager.go_to(26, 100);
        assert_eq!(pager.start(), 26);
        pager.clamp(20);
        assert_eq!(pager.start(), 1);
        assert_eq!(pager.visible_range(20), 0..20);
    }

    #[test]
    fn set_per_page_resets_to_first_page() {
        let mut pager = Pager::new(5);
        pager.go_to(11, 50);
        pager.set_per_page(20);
        assert_eq!(pager.start(), 1);
        assert_eq!(pager.per_page(), 20);
    }

    #[test]
    fn zero_page_size_is_one() {
        let pager = Pager::new(0);
        assert_eq!(pager.per_page(), 1);
        assert_eq!(pager.visible_range(3), 0..1);
    }

    #[test]
    fn empty_store_has_empty_range() {
        let pager = Pager::new(10);
        assert_eq!(pager.visible_range(0), 0..0);
        let info = pager.info(0);
        assert_eq!(info.first, 0);
        assert_eq!(info.last, 0);
        assert!(!info.has_next);
    }

    #[test]
    fn info_reports_bounds() {
        let mut pager = Pager::new(10);
        pager.next(25);
        let info = pager.info(25);
        assert_eq!((info.first, info.last, info.total), (11, 20, 25));
        assert!(info.has_prev);
        assert!(info.has_next);
    }

    #[test]
    fn slice_properties_hold_for_all_sizes() {
        for len in 0..40 {
            for n in 1..12 {
                for s in 0..45 {
                    let mut pager = Pager::new(n);
                    pager.go_to(s, len);
                    let range = pager.visible_range(len);
                    assert!(range.len() <= n);
                    assert!(pager.start() >= 1);
                    assert!(pager.start() <= (len + 1).saturating_sub(n).max(1));
                    if len > 0 {
                        assert!(!range.is_empty(), "len={len} n={n} s={s}");
                    }
                }
            }
        }
    }
}
