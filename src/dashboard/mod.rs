//! The dashboard controller.
//!
//! Every user action enters here. Each one mutates the store (and through it
//! descriptor windows), re-applies the pager, fetches whatever the visible
//! page is missing, reconciles series visibility and draws. Fetch failures
//! never escape: they become per-graph error markers that clear themselves
//! after a few seconds.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use crate::activity::{ActivityKind, ActivityLog};
use crate::client::{Backend, FilterQuery};
use crate::config::RailroadConfig;
use crate::downtime::{self, DowntimeRequest, DowntimeScope};
use crate::fetch::{self, FetchFailure, FetchOutcome};
use crate::pager::{PageInfo, Pager};
use crate::render::{self, ChartSurface, PreparedChart, RangePreset};
use crate::store::{GraphDescriptor, GraphStore, ServiceState, SortKey, StateCounts};

// ---------------------------------------------------------------------------
// Settings and markers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    pub per_page: usize,
    pub chart_height: u32,
    pub sync: bool,
    pub error_dismiss_secs: u64,
    /// Author of scheduled downtimes.
    pub user: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self::from_config(&RailroadConfig::default())
    }
}

impl DashboardSettings {
    pub fn from_config(config: &RailroadConfig) -> Self {
        Self {
            per_page: config.display.per_page.max(1),
            chart_height: config.display.chart_height,
            sync: config.display.sync,
            error_dismiss_secs: config.display.error_dismiss_secs,
            user: config.backend.effective_user(),
        }
    }
}

/// A transient error shown on one graph (or on the downtime form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMarker {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub struct Dashboard<B: Backend, S: ChartSurface> {
    store: GraphStore,
    pager: Pager,
    backend: B,
    surface: S,
    settings: DashboardSettings,
    markers: HashMap<String, ErrorMarker>,
    downtime_error: Option<ErrorMarker>,
    journal: ActivityLog,
}

impl<B: Backend, S: ChartSurface> Dashboard<B, S> {
    pub fn new(backend: B, surface: S, settings: DashboardSettings, journal: ActivityLog) -> Self {
        Self {
            store: GraphStore::new(),
            pager: Pager::new(settings.per_page),
            backend,
            surface,
            settings,
            markers: HashMap::new(),
            downtime_error: None,
            journal,
        }
    }

    // -- Accessors --

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn counts(&self) -> StateCounts {
        self.store.counts()
    }

    pub fn page_info(&self) -> PageInfo {
        self.pager.info(self.store.len())
    }

    /// Descriptors on the current page, in display order.
    pub fn visible(&self) -> &[GraphDescriptor] {
        self.store.slice(self.pager.visible_range(self.store.len()))
    }

    pub fn visible_slugs(&self) -> Vec<String> {
        self.visible().iter().map(|d| d.slug().to_string()).collect()
    }

    pub fn marker(&self, slug: &str) -> Option<&ErrorMarker> {
        self.markers.get(slug)
    }

    pub fn downtime_error(&self) -> Option<&ErrorMarker> {
        self.downtime_error.as_ref()
    }

    pub fn set_sync(&mut self, sync: bool) {
        self.settings.sync = sync;
    }

    // -- Populating the store --

    /// Replace the graph set with the results of a filter query.
    pub fn load_filter(&mut self, query: &FilterQuery) -> Result<FetchOutcome> {
        let records = self
            .backend
            .fetch_meta(query)
            .context("failed to load graphs for filter")?;
        let descriptors = records.into_iter().map(GraphDescriptor::from_record).collect();
        Ok(self.replace_all(descriptors))
    }

    /// Add the results of a filter query to the current graph set.
    pub fn add_filter(&mut self, query: &FilterQuery) -> Result<Vec<String>> {
        let records = self
            .backend
            .fetch_meta(query)
            .context("failed to load graphs for filter")?;
        let descriptors = records.into_iter().map(GraphDescriptor::from_record).collect();
        Ok(self.append(descriptors))
    }

    /// Seed the graph set from an embedded snapshot (page load, permalink).
    pub fn seed_from_json(&mut self, json: &str) -> Result<FetchOutcome> {
        let descriptors = GraphStore::descriptors_from_json(json)?;
        Ok(self.replace_all(descriptors))
    }

    pub fn replace_all(&mut self, descriptors: Vec<GraphDescriptor>) -> FetchOutcome {
        self.install(descriptors);
        self.select_page()
    }

    /// Replace the graph set and show the page starting at `start`
    /// (1-based, clamped). Only that page is fetched.
    pub fn replace_all_at(
        &mut self,
        descriptors: Vec<GraphDescriptor>,
        start: usize,
    ) -> FetchOutcome {
        self.install(descriptors);
        self.pager.go_to(start, self.store.len());
        self.select_page()
    }

    /// Replace the graph set without creating rows or fetching data, for
    /// actions that only need descriptors (permalinks, downtime).
    pub fn install(&mut self, descriptors: Vec<GraphDescriptor>) {
        let previous = self.store.replace_all(descriptors);
        self.release(previous);
        self.markers.clear();
        self.pager.reset();
        self.journal
            .record(ActivityKind::StoreReplaced, &self.store.slugs(), None);
    }

    /// Append descriptors not already shown. Returns the slugs added.
    pub fn append(&mut self, descriptors: Vec<GraphDescriptor>) -> Vec<String> {
        let added = self.store.append(descriptors);
        if !added.is_empty() {
            self.journal.record(ActivityKind::StoreAppended, &added, None);
        }
        self.select_page();
        added
    }

    // -- Paging --

    /// Show the current page: hide rows that left it, create or show rows on
    /// it, then draw what is ready and fetch what is missing.
    pub fn select_page(&mut self) -> FetchOutcome {
        let len = self.store.len();
        self.pager.clamp(len);
        let range = self.pager.visible_range(len);

        let slugs = self.store.slugs();
        for (i, slug) in slugs.iter().enumerate() {
            let on_page = range.contains(&i);
            let Some(descriptor) = self.store.get_mut(slug) else {
                continue;
            };
            match descriptor.handle() {
                Some(handle) if on_page => self.surface.show_row(handle),
                Some(handle) => self.surface.hide_row(handle),
                None if on_page => {
                    let handle = self.surface.create_row(descriptor);
                    descriptor.set_handle(handle);
                    self.surface.show_row(handle);
                }
                None => {}
            }
        }

        let outcome = self.draw_visible();
        self.push_summary();
        outcome
    }

    fn push_summary(&mut self) {
        let info = self.pager.info(self.store.len());
        self.surface.update_summary(&self.store.counts(), &info);
    }

    pub fn next_page(&mut self) -> Option<FetchOutcome> {
        if !self.pager.next(self.store.len()) {
            return None;
        }
        Some(self.select_page())
    }

    pub fn prev_page(&mut self) -> Option<FetchOutcome> {
        if !self.pager.prev(self.store.len()) {
            return None;
        }
        Some(self.select_page())
    }

    /// Jump to a 1-based start index (clamped).
    pub fn go_to(&mut self, start: usize) -> FetchOutcome {
        self.pager.go_to(start, self.store.len());
        self.select_page()
    }

    /// Change the page size. Always returns to the first page.
    pub fn set_per_page(&mut self, per_page: usize) -> FetchOutcome {
        self.settings.per_page = per_page.max(1);
        self.pager.set_per_page(per_page);
        self.select_page()
    }

    pub fn sort(&mut self, key: SortKey, reversed: bool) -> FetchOutcome {
        self.store.sort_by(key, reversed);
        self.select_page()
    }

    // -- Drawing --

    /// Draw visible graphs whose data is ready, then fetch the rest in one
    /// batch and draw what comes back.
    pub fn draw_visible(&mut self) -> FetchOutcome {
        let visible = self.visible_slugs();
        for slug in &visible {
            let ready = self.store.get(slug).is_some_and(|d| {
                !d.is_graphed()
                    && !d.is_busy()
                    && d.data().is_some_and(|p| p.covers(d.start(), d.end()))
            });
            if ready {
                self.draw(slug);
            }
        }
        self.fetch_and_draw(&visible)
    }

    fn fetch_and_draw(&mut self, candidates: &[String]) -> FetchOutcome {
        let outcome = fetch::fetch_missing(
            &mut self.store,
            &self.backend,
            candidates.iter().map(String::as_str),
            &self.journal,
        );
        let visible = self.visible_slugs();
        for slug in outcome.applied() {
            self.clear_marker(slug);
            if visible.contains(slug) {
                self.draw(slug);
            }
        }
        for (slug, failure) in outcome.failures() {
            self.set_marker(&slug, &failure);
        }
        // Applied entries may carry new states.
        if !outcome.applied().is_empty() {
            self.push_summary();
        }
        outcome
    }

    /// Draw one graph from its stored data and mark it drawn.
    fn draw(&mut self, slug: &str) -> bool {
        let height = self.settings.chart_height;
        let Some(descriptor) = self.store.get_mut(slug) else {
            return false;
        };
        let (Some(handle), Some(payload)) = (descriptor.handle(), descriptor.data()) else {
            return false;
        };
        let chart = PreparedChart::prepare(payload, height).with_state(descriptor.state);
        self.surface.draw(handle, &chart);
        descriptor.mark_graphed()
    }

    // -- Zoom and ranges --

    /// Apply a chart selection (milliseconds) on `slug`.
    ///
    /// In sync mode every graphable descriptor takes the new window. Live
    /// auto-update is switched off for the affected graphs and only those on
    /// the current page are fetched now.
    pub fn zoom_selected(&mut self, slug: &str, from_ms: f64, to_ms: f64) -> FetchOutcome {
        match render::selection_window(from_ms, to_ms) {
            Some((start, end)) => self.set_window(slug, start, end, false),
            None => FetchOutcome::Idle,
        }
    }

    /// Apply a range preset on `slug`, ending at `now`.
    pub fn apply_range(&mut self, slug: &str, preset: RangePreset, now: i64) -> FetchOutcome {
        let (start, end) = preset.window(now);
        self.set_window(slug, start, end, preset.keeps_live())
    }

    fn set_window(&mut self, slug: &str, start: i64, end: i64, live: bool) -> FetchOutcome {
        let targets = render::zoom_targets(&self.store, slug, self.settings.sync);
        let mut moved = Vec::new();
        for target in targets {
            if self.store.mark_window(&target, start, end) {
                self.store.set_live(&target, live);
                moved.push(target);
            }
        }
        if moved.is_empty() {
            return FetchOutcome::Idle;
        }
        self.journal
            .record(ActivityKind::Zoom, &moved, Some(&format!("{start}..{end}")));

        let visible = self.visible_slugs();
        let affected: Vec<String> = moved.into_iter().filter(|s| visible.contains(s)).collect();
        self.fetch_and_draw(&affected)
    }

    /// Slide every live graph's window to end at `now`, keeping its length,
    /// and refetch the ones on the current page.
    pub fn refresh_at(&mut self, now: i64) -> FetchOutcome {
        let live: Vec<(String, i64)> = self
            .store
            .iter()
            .filter(|d| d.live && d.is_graphable)
            .map(|d| (d.slug().to_string(), d.end() - d.start()))
            .collect();
        let mut moved = Vec::new();
        for (slug, duration) in live {
            let duration = if duration > 0 { duration } else { render::DAY_SECS };
            if self.store.mark_window(&slug, now - duration, now) {
                moved.push(slug);
            }
        }
        if moved.is_empty() {
            return FetchOutcome::Idle;
        }
        self.journal.record(ActivityKind::Refresh, &moved, None);

        let visible = self.visible_slugs();
        let affected: Vec<String> = moved.into_iter().filter(|s| visible.contains(s)).collect();
        self.fetch_and_draw(&affected)
    }

    pub fn refresh(&mut self) -> FetchOutcome {
        self.refresh_at(Utc::now().timestamp())
    }

    /// Preferences were saved: drop all fetched data and redraw the page,
    /// applying a new page size when it changed.
    pub fn preferences_changed(&mut self, per_page: Option<usize>) -> FetchOutcome {
        self.store.invalidate_all();
        if let Some(n) = per_page.filter(|&n| n.max(1) != self.pager.per_page()) {
            self.settings.per_page = n.max(1);
            self.pager.set_per_page(n);
        }
        self.select_page()
    }

    // -- Series --

    /// Flip one series on one graph and redraw it. Survives later refetches.
    pub fn toggle_series(&mut self, slug: &str, label: &str) -> bool {
        let toggled = self
            .store
            .get_mut(slug)
            .and_then(|d| d.data_mut())
            .is_some_and(|payload| payload.chart.toggle(label));
        if toggled {
            self.draw(slug);
        }
        toggled
    }

    // -- Removal and selection --

    pub fn remove(&mut self, slug: &str) -> bool {
        self.remove_where(|d| d.slug() == slug) > 0
    }

    pub fn remove_checked(&mut self) -> usize {
        self.remove_where(|d| d.checked)
    }

    pub fn clear_all(&mut self) -> usize {
        self.remove_where(|_| true)
    }

    fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: FnMut(&GraphDescriptor) -> bool,
    {
        let removed = self.store.remove_where(predicate);
        let count = removed.len();
        if count > 0 {
            let slugs: Vec<String> = removed.iter().map(|d| d.slug().to_string()).collect();
            self.journal.record(ActivityKind::Removed, &slugs, None);
            self.release(removed);
            self.select_page();
        }
        count
    }

    fn release(&mut self, descriptors: Vec<GraphDescriptor>) {
        for mut descriptor in descriptors {
            self.markers.remove(descriptor.slug());
            if let Some(handle) = descriptor.take_handle() {
                self.surface.release_row(handle);
            }
        }
    }

    pub fn check(&mut self, slug: &str, checked: bool) -> bool {
        self.store.set_checked(slug, checked)
    }

    pub fn check_all(&mut self, checked: bool) {
        self.store.check_where(|_| true, checked);
    }

    /// Check every row in `state` (other rows keep their checkbox).
    pub fn check_state(&mut self, state: ServiceState) {
        self.store.check_where(|d| d.state == state, true);
    }

    // -- Error markers --

    fn set_marker(&mut self, slug: &str, failure: &FetchFailure) {
        let marker = ErrorMarker {
            message: failure.to_string(),
            expires_at: self.dismiss_deadline(),
        };
        if let Some(handle) = self.store.get(slug).and_then(|d| d.handle()) {
            self.surface.show_error(handle, &marker.message);
        }
        self.markers.insert(slug.to_string(), marker);
    }

    fn clear_marker(&mut self, slug: &str) {
        if self.markers.remove(slug).is_some()
            && let Some(handle) = self.store.get(slug).and_then(|d| d.handle())
        {
            self.surface.clear_error(handle);
        }
    }

    fn dismiss_deadline(&self) -> DateTime<Utc> {
        // Capped at a day; longer markers are indistinguishable from sticky.
        let secs = self.settings.error_dismiss_secs.min(86_400) as i64;
        Utc::now() + Duration::milliseconds(secs * 1000)
    }

    /// Clear markers whose time is up. Returns the graphs that were cleared.
    pub fn expire_markers_at(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .markers
            .iter()
            .filter(|(_, m)| m.expires_at <= now)
            .map(|(slug, _)| slug.clone())
            .collect();
        for slug in &expired {
            self.clear_marker(slug);
        }
        if self.downtime_error.as_ref().is_some_and(|m| m.expires_at <= now) {
            self.downtime_error = None;
        }
        expired
    }

    pub fn expire_markers(&mut self) -> Vec<String> {
        self.expire_markers_at(Utc::now())
    }

    // -- Permalink --

    /// Store the current graph set server-side and return its token.
    pub fn generate_permalink(&mut self, description: Option<&str>) -> Result<String> {
        let snapshot = self.store.snapshot();
        let token = self
            .backend
            .generate_permalink(&snapshot, description)
            .context("failed to generate permalink")?;
        self.journal
            .record(ActivityKind::Permalink, &self.store.slugs(), Some(&token));
        Ok(token)
    }

    // -- Downtime --

    /// Schedule downtime for the checked rows, or every row when none are
    /// checked. Returns the cancellation code.
    ///
    /// Invalid input is rejected before anything is sent. Failures are also
    /// kept as a transient downtime error.
    pub fn schedule_downtime(
        &mut self,
        scope: DowntimeScope,
        from: Option<i64>,
        to: Option<i64>,
        comment: &str,
    ) -> Result<String> {
        let checked: Vec<&GraphDescriptor> = self.store.iter().filter(|d| d.checked).collect();
        let targets = if checked.is_empty() {
            self.store.iter().collect()
        } else {
            checked
        };
        let slugs: Vec<String> = targets.iter().map(|d| d.slug().to_string()).collect();
        let expression = downtime::expression_for(&targets, scope);

        let result = DowntimeRequest::new(expression, from, to, self.settings.user.clone(), comment)
            .and_then(|request| self.backend.schedule_downtime(&request));
        match result {
            Ok(code) => {
                self.downtime_error = None;
                self.journal
                    .record(ActivityKind::DowntimeScheduled, &slugs, Some(&code));
                Ok(code)
            }
            Err(e) => {
                let message = format!("{e:#}");
                self.journal
                    .record(ActivityKind::DowntimeFailed, &slugs, Some(&message));
                self.downtime_error = Some(ErrorMarker {
                    message,
                    expires_at: self.dismiss_deadline(),
                });
                Err(e)
            }
        }
    }

    /// Cancel a downtime by code. Returns whether anything was cancelled.
    pub fn cancel_downtime(&mut self, code: &str) -> Result<bool> {
        match self.backend.cancel_downtime(code) {
            Ok(count) => {
                self.journal.record(
                    ActivityKind::DowntimeCancelled,
                    &[],
                    Some(&format!("{code}: {count}")),
                );
                Ok(count > 0)
            }
            Err(e) => {
                let message = format!("{e:#}");
                self.journal
                    .record(ActivityKind::DowntimeFailed, &[], Some(&message));
                self.downtime_error = Some(ErrorMarker {
                    message,
                    expires_at: self.dismiss_deadline(),
                });
                Err(e)
            }
        }
    }
}
