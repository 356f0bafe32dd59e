//! Y-axis plan for a chart: range, ticks and tick labels.

use serde_json::Value;

use super::ticks;
use crate::store::ChartData;

/// Headroom above the largest visible value.
pub const HEADROOM: f64 = 1.2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisPlan {
    pub min: f64,
    /// `HEADROOM` times the largest visible value; `None` when nothing
    /// visible has a value.
    pub max: Option<f64>,
    pub ticks: Vec<f64>,
    pub labels: Vec<String>,
}

impl AxisPlan {
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Largest value over the visible series only.
pub fn visible_max(chart: &ChartData) -> Option<f64> {
    chart
        .series
        .iter()
        .filter(|s| s.is_visible())
        .filter_map(|s| s.max_value())
        .reduce(f64::max)
}

fn visible_min(chart: &ChartData) -> Option<f64> {
    chart
        .series
        .iter()
        .filter(|s| s.is_visible())
        .flat_map(|s| s.data.iter().filter_map(|&(_, y)| y))
        .filter(|y| y.is_finite())
        .reduce(f64::min)
}

/// Lower bound: `options.yaxis.min` when the backend set one, else zero (or
/// the smallest visible value when that is negative).
fn axis_min(chart: &ChartData) -> f64 {
    let configured = chart
        .options
        .get("yaxis")
        .and_then(|axis| axis.get("min"))
        .and_then(Value::as_f64);
    configured.unwrap_or_else(|| visible_min(chart).map_or(0.0, |m| m.min(0.0)))
}

/// Plan the Y axis of `chart` for a plot `height` pixels tall.
///
/// With no visible value, or a visible maximum of zero, the plan has no
/// ticks.
pub fn plan_axis(chart: &ChartData, height: u32) -> AxisPlan {
    let min = axis_min(chart);
    let Some(max) = visible_max(chart) else {
        return AxisPlan {
            min,
            ..AxisPlan::default()
        };
    };
    let axis_max = max * HEADROOM;
    if max == 0.0 {
        return AxisPlan {
            min,
            max: Some(axis_max),
            ..AxisPlan::default()
        };
    }
    let ticks = ticks::tick_generator(min, axis_max, chart.base, height);
    let labels = ticks::format_ticks(&ticks, axis_max, chart.base);
    AxisPlan {
        min,
        max: Some(axis_max),
        ticks,
        labels,
    }
}
