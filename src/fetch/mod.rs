//! Batched graph-data fetching with request tokens.
//!
//! A fetch runs in two halves so the store can change while a request is on
//! the wire:
//!
//! 1. [`plan`] picks every candidate that still needs data, opens a request
//!    on each with a token unique across the store's lifetime, and returns a
//!    [`FetchBatch`] describing the single network request to make.
//! 2. [`apply`] (or [`fail`]) takes the batch back together with the response.
//!    Entries are matched by carried identity, never by position. A response
//!    whose descriptor has been removed, or whose token is no longer the
//!    descriptor's latest, is ignored.
//!
//! [`fetch_missing`] runs both halves back to back against a [`Backend`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityKind, ActivityLog};
use crate::client::Backend;
use crate::reconcile;
use crate::store::{ChartData, GraphStore, RenderPayload, ServiceState};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One element of the batch request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRequest {
    pub host: String,
    pub service: String,
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniq: Option<u32>,
}

/// One element of the batch response. An entry without `data` means the
/// backend had nothing to plot for that graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniq: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ServiceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChartData>,
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A descriptor's share of an outstanding batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGraph {
    pub slug: String,
    pub base_slug: String,
    pub uniq: Option<u32>,
    pub token: u64,
    pub request: GraphRequest,
}

/// Everything needed to send one batched request and match its response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchBatch {
    pending: Vec<PendingGraph>,
}

impl FetchBatch {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &[PendingGraph] {
        &self.pending
    }

    pub fn slugs(&self) -> Vec<String> {
        self.pending.iter().map(|p| p.slug.clone()).collect()
    }

    /// The request body elements, in planning order.
    pub fn requests(&self) -> Vec<GraphRequest> {
        self.pending.iter().map(|p| p.request.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to each graph of a completed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// New data installed; ready to draw.
    pub applied: Vec<String>,
    /// Backend answered without data.
    pub no_data: Vec<String>,
    /// Superseded by a later request or a window change.
    pub stale: Vec<String>,
    /// Descriptor removed while the request was outstanding.
    pub orphaned: Vec<String>,
    /// Requested but absent from the response.
    pub missing: Vec<String>,
    /// Response entries that match nothing in the batch.
    pub unexpected: Vec<String>,
}

/// Why a graph shows an error marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Network or server failure for the whole batch.
    Transport(String),
    /// The backend returned nothing to plot.
    NoData,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "error: {msg}"),
            Self::NoData => write!(f, "no data"),
        }
    }
}

/// Result of [`fetch_missing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing needed data; no request was made.
    Idle,
    Completed(FetchReport),
    Failed { slugs: Vec<String>, error: String },
}

impl FetchOutcome {
    /// Slugs whose new data is ready to draw.
    pub fn applied(&self) -> &[String] {
        match self {
            Self::Completed(report) => &report.applied,
            _ => &[],
        }
    }

    /// `(slug, failure)` pairs that should carry an error marker.
    pub fn failures(&self) -> Vec<(String, FetchFailure)> {
        match self {
            Self::Idle => Vec::new(),
            Self::Completed(report) => report
                .no_data
                .iter()
                .map(|s| (s.clone(), FetchFailure::NoData))
                .collect(),
            Self::Failed { slugs, error } => slugs
                .iter()
                .map(|s| (s.clone(), FetchFailure::Transport(error.clone())))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Select the candidates that need data and open a request on each.
///
/// A candidate is skipped when it is unknown, not graphable, already drawn
/// for its window, or already has a request outstanding for its window.
pub fn plan<'a, I>(store: &mut GraphStore, candidates: I) -> FetchBatch
where
    I: IntoIterator<Item = &'a str>,
{
    let mut pending = Vec::new();
    for slug in candidates {
        let Some(descriptor) = store.get(slug) else {
            continue;
        };
        if !descriptor.needs_data() || descriptor.is_busy() {
            continue;
        }
        if pending.iter().any(|p: &PendingGraph| p.slug == slug) {
            continue;
        }
        let Some(token) = store.begin_request(slug) else {
            continue;
        };
        let Some(descriptor) = store.get(slug) else {
            continue;
        };
        pending.push(PendingGraph {
            slug: descriptor.slug().to_string(),
            base_slug: descriptor.base_slug(),
            uniq: descriptor.uniq(),
            token,
            request: GraphRequest {
                host: descriptor.host.clone(),
                service: descriptor.service.clone(),
                start: descriptor.start(),
                end: descriptor.end(),
                uniq: descriptor.uniq(),
            },
        });
    }
    FetchBatch { pending }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Apply a batch response to the store.
///
/// New data is reconciled against any data the descriptor already holds, so
/// series the user switched off stay off. Applied descriptors are left
/// undrawn; the caller draws them.
pub fn apply(store: &mut GraphStore, batch: &FetchBatch, entries: Vec<GraphEntry>) -> FetchReport {
    let mut report = FetchReport::default();
    let mut answered: HashSet<&str> = HashSet::new();

    for entry in entries {
        let matched = batch
            .pending
            .iter()
            .find(|p| p.base_slug == entry.slug && p.uniq == entry.uniq);
        let Some(pending) = matched else {
            report.unexpected.push(entry.slug);
            continue;
        };
        answered.insert(pending.slug.as_str());

        let Some(descriptor) = store.get_mut(&pending.slug) else {
            report.orphaned.push(pending.slug.clone());
            continue;
        };
        if !descriptor.finish_request(pending.token) {
            report.stale.push(pending.slug.clone());
            continue;
        }

        let Some(chart) = entry.data else {
            report.no_data.push(pending.slug.clone());
            continue;
        };

        let mut payload = RenderPayload {
            host: entry.host.unwrap_or_else(|| descriptor.host.clone()),
            service: entry.service.unwrap_or_else(|| descriptor.service.clone()),
            start: pending.request.start,
            end: pending.request.end,
            current_time: entry.current_time,
            chart,
        };
        if let Some(old) = descriptor.data() {
            reconcile::reconcile(old, &mut payload);
        }
        descriptor.install_data(payload);
        if let Some(state) = entry.state {
            descriptor.state = state;
        }
        report.applied.push(pending.slug.clone());
    }

    for pending in &batch.pending {
        if answered.contains(pending.slug.as_str()) {
            continue;
        }
        if let Some(descriptor) = store.get_mut(&pending.slug) {
            descriptor.finish_request(pending.token);
        }
        report.missing.push(pending.slug.clone());
    }

    store.recount();
    report
}

/// Close out a batch whose request failed. The store keeps its data; tokens
/// that are still current are released so the next refresh retries.
pub fn fail(store: &mut GraphStore, batch: &FetchBatch) -> Vec<String> {
    let mut affected = Vec::new();
    for pending in &batch.pending {
        if let Some(descriptor) = store.get_mut(&pending.slug)
            && descriptor.finish_request(pending.token)
        {
            affected.push(pending.slug.clone());
        }
    }
    affected
}

// ---------------------------------------------------------------------------
// Plan + send + apply
// ---------------------------------------------------------------------------

/// Fetch data for every candidate that needs it, in one request.
///
/// Returns [`FetchOutcome::Idle`] without touching the backend when nothing
/// is pending.
pub fn fetch_missing<'a, B, I>(
    store: &mut GraphStore,
    backend: &B,
    candidates: I,
    journal: &ActivityLog,
) -> FetchOutcome
where
    B: Backend + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let batch = plan(store, candidates);
    if batch.is_empty() {
        return FetchOutcome::Idle;
    }
    journal.record(ActivityKind::FetchIssued, &batch.slugs(), None);

    match backend.fetch_graphs(&batch.requests()) {
        Ok(entries) => {
            let report = apply(store, &batch, entries);
            record_report(journal, &report);
            FetchOutcome::Completed(report)
        }
        Err(e) => {
            let slugs = fail(store, &batch);
            let error = format!("{e:#}");
            journal.record(ActivityKind::FetchFailed, &slugs, Some(&error));
            FetchOutcome::Failed { slugs, error }
        }
    }
}

fn record_report(journal: &ActivityLog, report: &FetchReport) {
    if !report.applied.is_empty() {
        journal.record(ActivityKind::FetchApplied, &report.applied, None);
    }
    if !report.no_data.is_empty() {
        journal.record(ActivityKind::NoData, &report.no_data, None);
    }
    if !report.stale.is_empty() {
        journal.record(ActivityKind::StaleResponse, &report.stale, None);
    }
    if !report.orphaned.is_empty() {
        journal.record(ActivityKind::OrphanResponse, &report.orphaned, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GraphDescriptor, Series};

    fn store_with(descriptors: Vec<GraphDescriptor>) -> GraphStore {
        let mut store = GraphStore::new();
        store.replace_all(descriptors);
        store
    }

    fn entry(slug: &str, uniq: Option<u32>, series: Vec<Series>) -> GraphEntry {
        GraphEntry {
            slug: slug.to_string(),
            uniq,
            host: None,
            service: None,
            state: None,
            current_time: None,
            data: Some(ChartData {
                series,
                ..ChartData::default()
            }),
        }
    }

    #[test]
    fn plan_skips_ungraphable_and_unknown() {
        let mut store = store_with(vec![
            GraphDescriptor::new("h1", "cpu", 0, 100),
            GraphDescriptor::new("h2", "ping", 0, 100).graphable(false),
        ]);
        let batch = plan(&mut store, ["h1-cpu", "h2-ping", "missing"]);
        assert_eq!(batch.slugs(), vec!["h1-cpu"]);
        assert_eq!(
            batch.requests(),
            vec![GraphRequest {
                host: "h1".to_string(),
                service: "cpu".to_string(),
                start: 0,
                end: 100,
                uniq: None,
            }]
        );
    }

    #[test]
    fn plan_does_not_reissue_outstanding_request() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        assert_eq!(plan(&mut store, ["h1-cpu"]).len(), 1);
        assert!(plan(&mut store, ["h1-cpu"]).is_empty());
    }

    #[test]
    fn plan_deduplicates_candidates() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu", "h1-cpu"]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn apply_matches_by_identity_not_position() {
        let mut store = store_with(vec![
            GraphDescriptor::new("h1", "cpu", 0, 100),
            GraphDescriptor::new("h2", "cpu", 0, 100),
        ]);
        let batch = plan(&mut store, ["h1-cpu", "h2-cpu"]);
        let report = apply(
            &mut store,
            &batch,
            vec![
                entry("h2-cpu", None, vec![Series::labelled("two", true)]),
                entry("h1-cpu", None, vec![Series::labelled("one", true)]),
            ],
        );
        assert_eq!(report.applied, vec!["h2-cpu", "h1-cpu"]);
        let h1 = store.get("h1-cpu").unwrap().data().unwrap();
        assert_eq!(h1.chart.series[0].label.as_deref(), Some("one"));
        assert_eq!((h1.start, h1.end), (0, 100));
    }

    #[test]
    fn apply_uses_uniq_to_tell_duplicates_apart() {
        let mut store = store_with(vec![
            GraphDescriptor::new("h1", "cpu", 0, 100),
            GraphDescriptor::new("h1", "cpu", 0, 100),
        ]);
        let batch = plan(&mut store, ["h1-cpu", "h1-cpu-1"]);
        let report = apply(
            &mut store,
            &batch,
            vec![entry("h1-cpu", Some(1), vec![Series::labelled("dup", true)])],
        );
        assert_eq!(report.applied, vec!["h1-cpu-1"]);
        assert_eq!(report.missing, vec!["h1-cpu"]);
        assert!(store.get("h1-cpu").unwrap().data().is_none());
        assert!(!store.get("h1-cpu").unwrap().is_busy());
    }

    #[test]
    fn apply_ignores_removed_descriptor() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu"]);
        store.remove_where(|_| true);

        let report = apply(&mut store, &batch, vec![entry("h1-cpu", None, vec![])]);
        assert_eq!(report.orphaned, vec!["h1-cpu"]);
        assert!(store.is_empty());
    }

    #[test]
    fn response_for_removed_then_readded_descriptor_is_stale() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let old = plan(&mut store, ["h1-cpu"]);
        store.remove_where(|_| true);
        store.append(vec![GraphDescriptor::new("h1", "cpu", 200, 300)]);
        let new = plan(&mut store, ["h1-cpu"]);
        assert_ne!(old.pending()[0].token, new.pending()[0].token);

        let report = apply(
            &mut store,
            &old,
            vec![entry("h1-cpu", None, vec![Series::labelled("old", true)])],
        );
        assert!(report.applied.is_empty());
        assert_eq!(report.stale, vec!["h1-cpu"]);
        assert!(store.get("h1-cpu").unwrap().data().is_none());

        let report = apply(
            &mut store,
            &new,
            vec![entry("h1-cpu", None, vec![Series::labelled("new", true)])],
        );
        assert_eq!(report.applied, vec!["h1-cpu"]);
        let data = store.get("h1-cpu").unwrap().data().unwrap();
        assert_eq!((data.start, data.end), (200, 300));
        assert_eq!(data.chart.series[0].label.as_deref(), Some("new"));
    }

    #[test]
    fn replacing_the_store_keeps_tokens_unique() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let old = plan(&mut store, ["h1-cpu"]);
        store.replace_all(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let new = plan(&mut store, ["h1-cpu"]);
        assert!(new.pending()[0].token > old.pending()[0].token);

        let report = apply(&mut store, &old, vec![entry("h1-cpu", None, vec![])]);
        assert_eq!(report.stale, vec!["h1-cpu"]);
        assert!(store.get("h1-cpu").unwrap().is_busy());
    }

    #[test]
    fn stale_token_is_discarded() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let first = plan(&mut store, ["h1-cpu"]);
        store.mark_window("h1-cpu", 50, 150);
        let second = plan(&mut store, ["h1-cpu"]);

        // Second answer lands first, then the first straggles in.
        let report = apply(
            &mut store,
            &second,
            vec![entry("h1-cpu", None, vec![Series::labelled("new", true)])],
        );
        assert_eq!(report.applied, vec!["h1-cpu"]);
        let report = apply(
            &mut store,
            &first,
            vec![entry("h1-cpu", None, vec![Series::labelled("old", true)])],
        );
        assert_eq!(report.stale, vec!["h1-cpu"]);

        let data = store.get("h1-cpu").unwrap().data().unwrap();
        assert_eq!((data.start, data.end), (50, 150));
        assert_eq!(data.chart.series[0].label.as_deref(), Some("new"));
    }

    #[test]
    fn entry_without_data_is_no_data() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu"]);
        let mut empty = entry("h1-cpu", None, vec![]);
        empty.data = None;
        let report = apply(&mut store, &batch, vec![empty]);
        assert_eq!(report.no_data, vec!["h1-cpu"]);
        assert!(store.get("h1-cpu").unwrap().data().is_none());
    }

    #[test]
    fn apply_reconciles_with_previous_data() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu"]);
        apply(
            &mut store,
            &batch,
            vec![entry("h1-cpu", None, vec![Series::labelled("A", false)])],
        );

        store.mark_window("h1-cpu", 0, 200);
        let batch = plan(&mut store, ["h1-cpu"]);
        apply(
            &mut store,
            &batch,
            vec![entry(
                "h1-cpu",
                None,
                vec![Series::labelled("A", true), Series::labelled("B", true)],
            )],
        );
        let data = store.get("h1-cpu").unwrap().data().unwrap();
        assert!(!data.chart.series[0].lines.show);
        assert!(data.chart.series[1].lines.show);
    }

    #[test]
    fn apply_updates_state_and_counts() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu"]);
        let mut answer = entry("h1-cpu", None, vec![]);
        answer.state = Some(ServiceState::Critical);
        apply(&mut store, &batch, vec![answer]);
        assert_eq!(store.counts().critical, 1);
    }

    #[test]
    fn fail_releases_current_tokens() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu"]);
        assert_eq!(fail(&mut store, &batch), vec!["h1-cpu"]);
        assert!(!store.get("h1-cpu").unwrap().is_busy());
        assert_eq!(plan(&mut store, ["h1-cpu"]).len(), 1);
    }

    #[test]
    fn unexpected_entries_are_reported() {
        let mut store = store_with(vec![GraphDescriptor::new("h1", "cpu", 0, 100)]);
        let batch = plan(&mut store, ["h1-cpu"]);
        let report = apply(
            &mut store,
            &batch,
            vec![entry("h9-disk", None, vec![]), entry("h1-cpu", None, vec![])],
        );
        assert_eq!(report.unexpected, vec!["h9-disk"]);
        assert_eq!(report.applied, vec!["h1-cpu"]);
    }

    #[test]
    fn graph_entry_parses_backend_json() {
        let json = r#"{
            "slug": "h1-cpu",
            "state": 1,
            "current_time": "12:00:00",
            "data": {
                "series": [{"label": "load", "data": [[0, 1.0], [60, null]]}],
                "options": {"yaxis": {}},
                "base": 1024
            }
        }"#;
        let parsed: GraphEntry = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.state, Some(ServiceState::Warning));
        let data = parsed.data.unwrap();
        assert_eq!(data.base, 1024.0);
        assert_eq!(data.series[0].data[1], (60.0, None));
    }
}
