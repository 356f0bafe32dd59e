//! Drawing graphs and turning chart gestures back into time windows.
//!
//! The store owns all graph state; a [`ChartSurface`] only holds rows it was
//! asked to create, identified by [`RowHandle`]. Drawing goes through
//! [`PreparedChart`], which bundles the series, the Y-axis plan and legend
//! lines for one payload.

pub mod axis;
pub mod format;
pub mod terminal;
pub mod ticks;

use std::fmt;

use crate::pager::PageInfo;
use crate::store::{
    GraphDescriptor, GraphStore, RenderPayload, RowHandle, Series, ServiceState, StateCounts,
};

pub use axis::{AxisPlan, plan_axis};
pub use terminal::TerminalSurface;

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// Where rows and charts end up.
pub trait ChartSurface {
    /// Create the row for a descriptor the first time it lands on a page.
    fn create_row(&mut self, descriptor: &GraphDescriptor) -> RowHandle;
    fn show_row(&mut self, handle: RowHandle);
    fn hide_row(&mut self, handle: RowHandle);
    /// The descriptor is gone; the row will not be used again.
    fn release_row(&mut self, handle: RowHandle);
    fn draw(&mut self, handle: RowHandle, chart: &PreparedChart);
    fn show_error(&mut self, handle: RowHandle, message: &str);
    fn clear_error(&mut self, handle: RowHandle);
    fn update_summary(&mut self, counts: &StateCounts, page: &PageInfo);
}

/// Everything needed to draw one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChart {
    pub host: String,
    pub service: String,
    pub start: i64,
    pub end: i64,
    pub current_time: Option<String>,
    pub y_label: Option<String>,
    /// Service state at draw time, when the caller knows it.
    pub state: Option<ServiceState>,
    pub series: Vec<Series>,
    pub axis: AxisPlan,
    pub legend: Vec<String>,
}

impl PreparedChart {
    pub fn prepare(payload: &RenderPayload, height: u32) -> Self {
        Self {
            host: payload.host.clone(),
            service: payload.service.clone(),
            start: payload.start,
            end: payload.end,
            current_time: payload.current_time.clone(),
            y_label: payload.chart.y_label().map(str::to_string),
            state: None,
            series: payload.chart.series.clone(),
            axis: plan_axis(&payload.chart, height),
            legend: payload
                .chart
                .series
                .iter()
                .map(format::legend_label)
                .collect(),
        }
    }

    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn visible_series(&self) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(|s| s.is_visible())
    }
}

// ---------------------------------------------------------------------------
// Range presets and zoom
// ---------------------------------------------------------------------------

pub const DAY_SECS: i64 = 86_400;

/// The range buttons under each graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    Day,
    Week,
    Month,
    Year,
    /// Back to a day and live auto-update on.
    Reset,
}

impl RangePreset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }

    pub fn duration_secs(self) -> i64 {
        match self {
            Self::Day | Self::Reset => DAY_SECS,
            Self::Week => DAY_SECS * 7,
            Self::Month => DAY_SECS * 30,
            Self::Year => DAY_SECS * 365,
        }
    }

    /// Window ending at `now`.
    pub fn window(self, now: i64) -> (i64, i64) {
        (now - self.duration_secs(), now)
    }

    /// Whether graphs keep auto-updating after the preset is applied.
    pub fn keeps_live(self) -> bool {
        self == Self::Reset
    }
}

impl fmt::Display for RangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Descriptors a zoom or range gesture on `slug` applies to.
///
/// In sync mode that is every graphable descriptor; otherwise just `slug`,
/// when it exists and is graphable.
pub fn zoom_targets(store: &GraphStore, slug: &str, sync: bool) -> Vec<String> {
    if sync {
        return store
            .iter()
            .filter(|d| d.is_graphable)
            .map(|d| d.slug().to_string())
            .collect();
    }
    match store.get(slug) {
        Some(d) if d.is_graphable => vec![d.slug().to_string()],
        _ => Vec::new(),
    }
}

/// Convert a chart selection in milliseconds to a window in whole seconds.
/// Both ends are truncated, so a selection inside one second is empty.
pub fn selection_window(from_ms: f64, to_ms: f64) -> Option<(i64, i64)> {
    if !from_ms.is_finite() || !to_ms.is_finite() {
        return None;
    }
    let (from, to) = if from_ms <= to_ms {
        (from_ms, to_ms)
    } else {
        (to_ms, from_ms)
    };
    let start = (from / 1000.0).trunc() as i64;
    let end = (to / 1000.0).trunc() as i64;
    (start < end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChartData;

    #[test]
    fn presets_have_fixed_lengths() {
        assert_eq!(RangePreset::Day.window(100_000), (100_000 - 86_400, 100_000));
        assert_eq!(RangePreset::Week.duration_secs(), 604_800);
        assert_eq!(RangePreset::Month.duration_secs(), 2_592_000);
        assert_eq!(RangePreset::Year.duration_secs(), 31_536_000);
        assert!(RangePreset::Reset.keeps_live());
        assert!(!RangePreset::Week.keeps_live());
        assert_eq!(RangePreset::from_name("MONTH"), Some(RangePreset::Month));
    }

    #[test]
    fn zoom_targets_follow_sync_mode() {
        let mut store = GraphStore::new();
        store.replace_all(vec![
            GraphDescriptor::new("h1", "cpu", 0, 10),
            GraphDescriptor::new("h2", "cpu", 0, 10),
            GraphDescriptor::new("h3", "ping", 0, 10).graphable(false),
        ]);
        assert_eq!(zoom_targets(&store, "h2-cpu", false), vec!["h2-cpu"]);
        assert_eq!(zoom_targets(&store, "h2-cpu", true), vec!["h1-cpu", "h2-cpu"]);
        assert!(zoom_targets(&store, "h3-ping", false).is_empty());
        assert!(zoom_targets(&store, "gone", false).is_empty());
    }

    #[test]
    fn selection_converts_to_seconds() {
        assert_eq!(selection_window(1_000_500.0, 2_000_000.0), Some((1000, 2000)));
        assert_eq!(selection_window(2_000_000.0, 1_000_000.0), Some((1000, 2000)));
        assert_eq!(selection_window(1_000_000.0, 2_000_900.0), Some((1000, 2000)));
        assert_eq!(selection_window(1_000_100.0, 1_000_900.0), None);
        assert_eq!(selection_window(1_000.0, 1_000.0), None);
        assert_eq!(selection_window(f64::NAN, 1.0), None);
    }

    #[test]
    fn prepared_chart_carries_legend_and_axis() {
        let payload = RenderPayload {
            host: "h1".to_string(),
            service: "cpu".to_string(),
            start: 0,
            end: 100,
            current_time: Some("12:00".to_string()),
            chart: ChartData {
                series: vec![
                    Series::labelled("user", true).with_points(vec![(0.0, Some(40.0))]),
                    Series::labelled("sys", false).with_points(vec![(0.0, Some(90.0))]),
                ],
                ..ChartData::default()
            },
        };
        let chart = PreparedChart::prepare(&payload, 200);
        assert_eq!(chart.legend, vec!["[x] user", "[ ] sys"]);
        assert_eq!(chart.axis.max, Some(48.0));
        assert_eq!(chart.visible_series().count(), 1);
    }
}
