//! The graph set: ordered descriptors, the identity map, and derived counts.
//!
//! Every mutation goes through [`GraphStore`] so that three things hold at
//! all times:
//!
//! - slugs are unique, and the slug → position map matches the sequence;
//! - a descriptor whose window moves is no longer considered drawn;
//! - the per-state counts reflect the current contents.

pub mod descriptor;
pub mod payload;
pub mod slug;
pub mod sort;

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use serde::Serialize;

pub use descriptor::{DescriptorRecord, GraphDescriptor, RowHandle, ServiceState};
pub use payload::{ChartData, RenderPayload, Series};
pub use sort::SortKey;

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Totals per monitoring state, recomputed after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub total: usize,
    pub ok: usize,
    pub warning: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl StateCounts {
    pub fn of(&self, state: ServiceState) -> usize {
        match state {
            ServiceState::Ok => self.ok,
            ServiceState::Warning => self.warning,
            ServiceState::Critical => self.critical,
            ServiceState::Unknown => self.unknown,
        }
    }

    /// Rows hidden by a state filter that shows only `shown`.
    pub fn hidden(&self, shown: &[ServiceState]) -> usize {
        ServiceState::ALL
            .into_iter()
            .filter(|s| !shown.contains(s))
            .map(|s| self.of(s))
            .sum()
    }

    fn tally<'a>(descriptors: impl Iterator<Item = &'a GraphDescriptor>) -> Self {
        let mut counts = Self::default();
        for d in descriptors {
            counts.total += 1;
            match d.state {
                ServiceState::Ok => counts.ok += 1,
                ServiceState::Warning => counts.warning += 1,
                ServiceState::Critical => counts.critical += 1,
                ServiceState::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Ordered collection of graph descriptors with an explicit identity map.
#[derive(Debug, Default)]
pub struct GraphStore {
    descriptors: Vec<GraphDescriptor>,
    index: HashMap<String, usize>,
    counts: StateCounts,
    /// Last request token issued. Shared by every descriptor the store has
    /// ever held, so a re-added slug never reuses an old token.
    request_seq: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Queries --

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphDescriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, slug: &str) -> Option<&GraphDescriptor> {
        self.index.get(slug).map(|&i| &self.descriptors[i])
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.index.contains_key(slug)
    }

    pub fn position(&self, slug: &str) -> Option<usize> {
        self.index.get(slug).copied()
    }

    /// Descriptors in `range` of display order, clamped to the store.
    pub fn slice(&self, range: std::ops::Range<usize>) -> &[GraphDescriptor] {
        let end = range.end.min(self.descriptors.len());
        let start = range.start.min(end);
        &self.descriptors[start..end]
    }

    pub fn counts(&self) -> StateCounts {
        self.counts
    }

    pub fn slugs(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.slug().to_string()).collect()
    }

    // -- Mutation --

    /// Discard the current contents and install `descriptors`.
    ///
    /// Rows that share a host/service with an earlier row are given the next
    /// free `uniq` so every slug stays distinct. Returns the replaced
    /// descriptors so their row handles can be released.
    pub fn replace_all(&mut self, descriptors: Vec<GraphDescriptor>) -> Vec<GraphDescriptor> {
        let previous = std::mem::take(&mut self.descriptors);
        let mut taken = HashSet::new();
        for mut descriptor in descriptors {
            if taken.contains(descriptor.slug()) {
                let mut uniq = descriptor.uniq().map_or(1, |u| u + 1);
                loop {
                    descriptor.set_uniq(Some(uniq));
                    if !taken.contains(descriptor.slug()) {
                        break;
                    }
                    uniq += 1;
                }
            }
            taken.insert(descriptor.slug().to_string());
            self.descriptors.push(descriptor);
        }
        self.reindex();
        previous
    }

    /// Append descriptors whose identity is not already present.
    ///
    /// Duplicates (same slug, including duplicates within `descriptors`) are
    /// skipped; the existing row keeps its data and series toggles. Returns
    /// the slugs actually added.
    pub fn append(&mut self, descriptors: Vec<GraphDescriptor>) -> Vec<String> {
        let mut added = Vec::new();
        for descriptor in descriptors {
            if self.index.contains_key(descriptor.slug()) {
                continue;
            }
            let slug = descriptor.slug().to_string();
            self.index.insert(slug.clone(), self.descriptors.len());
            self.descriptors.push(descriptor);
            added.push(slug);
        }
        self.reindex();
        added
    }

    /// Remove every descriptor matching `predicate`, returning them in order.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<GraphDescriptor>
    where
        F: FnMut(&GraphDescriptor) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.descriptors)
            .into_iter()
            .partition(|d| predicate(d));
        self.descriptors = kept;
        self.reindex();
        removed
    }

    /// Remove everything.
    pub fn clear(&mut self) -> Vec<GraphDescriptor> {
        self.remove_where(|_| true)
    }

    /// Move a descriptor's time window.
    ///
    /// Always clears `is_graphed` (even when the window is unchanged) and
    /// abandons any outstanding request. Returns `false` for an unknown slug
    /// or an empty/inverted window.
    pub fn mark_window(&mut self, slug: &str, start: i64, end: i64) -> bool {
        if start >= end {
            return false;
        }
        match self.get_mut(slug) {
            Some(d) => {
                d.set_window(start, end);
                true
            }
            None => false,
        }
    }

    /// Drop fetched data on every descriptor (e.g. after a preference change).
    pub fn invalidate_all(&mut self) {
        for d in &mut self.descriptors {
            d.invalidate();
        }
    }

    /// Reorder by `key`. Stable, so ties keep their previous relative order.
    pub fn sort_by(&mut self, key: SortKey, reversed: bool) {
        self.descriptors.sort_by(|a, b| key.compare(a, b, reversed));
        self.reindex();
    }

    pub fn set_state(&mut self, slug: &str, state: ServiceState) -> bool {
        let changed = match self.get_mut(slug) {
            Some(d) => {
                d.state = state;
                true
            }
            None => false,
        };
        if changed {
            self.recount();
        }
        changed
    }

    pub fn set_checked(&mut self, slug: &str, checked: bool) -> bool {
        match self.get_mut(slug) {
            Some(d) => {
                d.checked = checked;
                true
            }
            None => false,
        }
    }

    /// Set the checkbox on every descriptor matching `predicate`.
    pub fn check_where<F>(&mut self, predicate: F, checked: bool)
    where
        F: Fn(&GraphDescriptor) -> bool,
    {
        for d in &mut self.descriptors {
            if predicate(d) {
                d.checked = checked;
            }
        }
    }

    pub fn set_live(&mut self, slug: &str, live: bool) -> bool {
        match self.get_mut(slug) {
            Some(d) => {
                d.live = live;
                true
            }
            None => false,
        }
    }

    /// Open a request on `slug` with a fresh store-wide token.
    pub(crate) fn begin_request(&mut self, slug: &str) -> Option<u64> {
        let i = *self.index.get(slug)?;
        let descriptor = self.descriptors.get_mut(i)?;
        self.request_seq += 1;
        descriptor.begin_request(self.request_seq);
        Some(self.request_seq)
    }

    pub(crate) fn get_mut(&mut self, slug: &str) -> Option<&mut GraphDescriptor> {
        let i = *self.index.get(slug)?;
        self.descriptors.get_mut(i)
    }

    pub(crate) fn recount(&mut self) {
        self.counts = StateCounts::tally(self.descriptors.iter());
    }

    fn reindex(&mut self) {
        self.index = self
            .descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.slug().to_string(), i))
            .collect();
        self.recount();
    }

    // -- Snapshots --

    /// Serializable view of the store without fetched data or row handles.
    pub fn snapshot(&self) -> Vec<DescriptorRecord> {
        self.descriptors.iter().map(GraphDescriptor::to_record).collect()
    }

    pub fn snapshot_json(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot()).context("failed to serialize graph snapshot")
    }

    /// Parse an embedded snapshot (page load or permalink) into descriptors.
    pub fn descriptors_from_json(json: &str) -> Result<Vec<GraphDescriptor>> {
        let json = json.trim();
        if json.is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<DescriptorRecord> =
            serde_json::from_str(json).context("failed to parse graph snapshot")?;
        Ok(records.into_iter().map(GraphDescriptor::from_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(host: &str, service: &str) -> GraphDescriptor {
        GraphDescriptor::new(host, service, 0, 100)
    }

    #[test]
    fn replace_all_installs_and_counts() {
        let mut store = GraphStore::new();
        store.replace_all(vec![
            d("h1", "cpu"),
            d("h2", "cpu").with_state(ServiceState::Critical),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.counts().total, 2);
        assert_eq!(store.counts().critical, 1);
        assert_eq!(store.position("h2-cpu"), Some(1));
    }

    #[test]
    fn replace_all_with_empty_input_leaves_empty_store() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("h1", "cpu")]);
        let old = store.replace_all(Vec::new());
        assert_eq!(old.len(), 1);
        assert!(store.is_empty());
        assert_eq!(store.counts(), StateCounts::default());
    }

    #[test]
    fn replace_all_disambiguates_duplicate_rows() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("h1", "cpu"), d("h1", "cpu"), d("h1", "cpu")]);
        assert_eq!(store.slugs(), vec!["h1-cpu", "h1-cpu-1", "h1-cpu-2"]);
    }

    #[test]
    fn append_skips_existing_identities() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("h1", "cpu")]);
        let added = store.append(vec![d("h1", "cpu"), d("h2", "cpu"), d("h2", "cpu")]);
        assert_eq!(added, vec!["h2-cpu"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_where_keeps_index_consistent() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("a", "x"), d("b", "x"), d("c", "x")]);
        let removed = store.remove_where(|g| g.host == "b");
        assert_eq!(removed.len(), 1);
        assert!(!store.contains("b-x"));
        assert_eq!(store.position("c-x"), Some(1));
        assert_eq!(store.counts().total, 2);
    }

    #[test]
    fn mark_window_rejects_inverted_range_and_unknown_slug() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("h1", "cpu")]);
        assert!(!store.mark_window("h1-cpu", 10, 10));
        assert!(!store.mark_window("nope", 0, 10));
        assert!(store.mark_window("h1-cpu", 10, 20));
        assert_eq!(store.get("h1-cpu").map(|g| g.window()), Some((10, 20)));
    }

    #[test]
    fn sort_reorders_and_reindexes() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("b", "x"), d("a", "x"), d("c", "x")]);
        store.sort_by(SortKey::Host, false);
        assert_eq!(store.slugs(), vec!["a-x", "b-x", "c-x"]);
        store.sort_by(SortKey::Host, true);
        assert_eq!(store.position("c-x"), Some(0));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("h1", "cpu").live(true), d("h1", "cpu")]);
        let json = store.snapshot_json().unwrap();
        assert!(!json.contains("chart"));

        let restored = GraphStore::descriptors_from_json(&json).unwrap();
        let mut other = GraphStore::new();
        other.replace_all(restored);
        assert_eq!(other.slugs(), store.slugs());
        assert!(other.get("h1-cpu").unwrap().live);
    }

    #[test]
    fn descriptors_from_blank_json_is_empty() {
        assert!(GraphStore::descriptors_from_json("  ").unwrap().is_empty());
        assert!(GraphStore::descriptors_from_json("{bad").is_err());
    }

    #[test]
    fn set_state_recounts() {
        let mut store = GraphStore::new();
        store.replace_all(vec![d("h1", "cpu")]);
        store.set_state("h1-cpu", ServiceState::Warning);
        assert_eq!(store.counts().warning, 1);
        assert_eq!(store.counts().ok, 0);
    }

    #[test]
    fn hidden_counts_states_outside_the_filter() {
        let mut store = GraphStore::new();
        store.replace_all(vec![
            d("a", "x"),
            d("b", "x").with_state(ServiceState::Critical),
            d("c", "x").with_state(ServiceState::Unknown),
        ]);
        let counts = store.counts();
        assert_eq!(counts.hidden(&ServiceState::ALL), 0);
        assert_eq!(counts.hidden(&[ServiceState::Critical]), 2);
    }
}
