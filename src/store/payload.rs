//! Render payloads: the series data and chart options fetched for one graph.
//!
//! The wire shape follows the batch graph-data endpoint:
//!
//! ```json
//! { "series": [ { "label": "load", "data": [[1000, 1.5], [1060, null]],
//!                 "lines": { "show": true }, "statistics": { "max": 1.5 } } ],
//!   "options": { "yaxis": { "label": "load" } },
//!   "base": 1000 }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Axis scaling base used when the backend does not send one.
pub const DEFAULT_BASE: f64 = 1000.0;

fn default_true() -> bool {
    true
}

fn default_base() -> f64 {
    DEFAULT_BASE
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Line drawing options for one series.
///
/// Only `show` is interpreted here; any other keys the backend sends are
/// carried through untouched so the chart gets them back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOptions {
    #[serde(default = "default_true")]
    pub show: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            show: true,
            extra: Map::new(),
        }
    }
}

/// Summary statistics the backend computes per series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    #[serde(default)]
    pub cur: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
}

/// One plotted line: `(x, y)` points where `y` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub data: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    pub lines: LineOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SeriesStatistics>,
}

impl Series {
    /// Build a labelled series with the given visibility.
    pub fn labelled(label: impl Into<String>, visible: bool) -> Self {
        Self {
            label: Some(label.into()),
            lines: LineOptions {
                show: visible,
                extra: Map::new(),
            },
            ..Self::default()
        }
    }

    pub fn with_points(mut self, points: Vec<(f64, Option<f64>)>) -> Self {
        self.data = points;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.lines.show
    }

    /// Largest non-null `y` value, if any.
    pub fn max_value(&self) -> Option<f64> {
        self.data
            .iter()
            .filter_map(|&(_, y)| y)
            .filter(|y| y.is_finite())
            .fold(None, |acc, y| match acc {
                Some(m) if m >= y => Some(m),
                _ => Some(y),
            })
    }
}

// ---------------------------------------------------------------------------
// Chart data
// ---------------------------------------------------------------------------

/// The `data` object of a batch response entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub options: Value,
    #[serde(default = "default_base")]
    pub base: f64,
}

impl Default for ChartData {
    fn default() -> Self {
        Self {
            series: Vec::new(),
            options: Value::Null,
            base: DEFAULT_BASE,
        }
    }
}

impl ChartData {
    /// Flip the visibility of every series carrying `label`.
    ///
    /// Returns `false` when no series matched.
    pub fn toggle(&mut self, label: &str) -> bool {
        let mut found = false;
        for series in &mut self.series {
            if series.label.as_deref() == Some(label) {
                series.lines.show = !series.lines.show;
                found = true;
            }
        }
        found
    }

    /// The y-axis label from `options.yaxis.label`, when present.
    pub fn y_label(&self) -> Option<&str> {
        self.options
            .get("yaxis")
            .and_then(|axis| axis.get("label"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Render payload
// ---------------------------------------------------------------------------

/// Fetched data attached to a descriptor, stamped with the window it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPayload {
    pub host: String,
    pub service: String,
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    pub chart: ChartData,
}

impl RenderPayload {
    pub fn covers(&self, start: i64, end: i64) -> bool {
        self.start == start && self.end == end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_deserializes_null_points_and_defaults() {
        let json = r#"{"label": "cpu", "data": [[1, 2.0], [2, null]]}"#;
        let series: Series = serde_json::from_str(json).unwrap();
        assert_eq!(series.data, vec![(1.0, Some(2.0)), (2.0, None)]);
        assert!(series.is_visible());
        assert!(series.statistics.is_none());
    }

    #[test]
    fn line_options_keep_unknown_keys() {
        let json = r#"{"show": false, "fill": true, "lineWidth": 2}"#;
        let lines: LineOptions = serde_json::from_str(json).unwrap();
        assert!(!lines.show);
        assert_eq!(lines.extra.get("fill"), Some(&Value::Bool(true)));

        let back = serde_json::to_value(&lines).unwrap();
        assert_eq!(back["lineWidth"], 2);
    }

    #[test]
    fn max_value_skips_nulls() {
        let series = Series::labelled("a", true).with_points(vec![
            (0.0, None),
            (1.0, Some(3.0)),
            (2.0, Some(7.5)),
            (3.0, None),
        ]);
        assert_eq!(series.max_value(), Some(7.5));
        assert_eq!(Series::labelled("b", true).max_value(), None);
    }

    #[test]
    fn toggle_flips_matching_label_only() {
        let mut chart = ChartData {
            series: vec![Series::labelled("a", true), Series::labelled("b", true)],
            ..ChartData::default()
        };
        assert!(chart.toggle("a"));
        assert!(!chart.series[0].is_visible());
        assert!(chart.series[1].is_visible());
        assert!(!chart.toggle("missing"));
    }

    #[test]
    fn chart_data_defaults_base() {
        let chart: ChartData = serde_json::from_str(r#"{"series": []}"#).unwrap();
        assert_eq!(chart.base, DEFAULT_BASE);
        assert!(chart.y_label().is_none());
    }

    #[test]
    fn y_label_reads_options() {
        let chart: ChartData =
            serde_json::from_str(r#"{"options": {"yaxis": {"label": "bytes"}}}"#).unwrap();
        assert_eq!(chart.y_label(), Some("bytes"));
    }
}
