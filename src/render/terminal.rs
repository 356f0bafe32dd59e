//! Colored terminal rendering of graph rows.
//!
//! The surface keeps what was last drawn into each row (header, Y-axis tick
//! labels, one sparkline per visible series, legend, error marker) and
//! prints the current page on request, in the order the caller gives.
//! An optional state filter hides rows from the printout; the summary line
//! then reports how many were hidden.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};
use colored::Colorize;

use super::{ChartSurface, PreparedChart};
use crate::pager::PageInfo;
use crate::store::{GraphDescriptor, RowHandle, ServiceState, StateCounts};

const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Default sparkline width in characters.
pub const DEFAULT_WIDTH: usize = 60;

#[derive(Debug, Clone)]
struct Row {
    title: String,
    state: ServiceState,
    visible: bool,
    body: Vec<String>,
    error: Option<String>,
}

/// A [`ChartSurface`] that renders into memory and writes pages to any
/// `Write` (stdout by default).
pub struct TerminalSurface<W: Write> {
    out: W,
    rows: HashMap<RowHandle, Row>,
    next_handle: u64,
    width: usize,
    shown_states: Vec<ServiceState>,
    summary: Option<(StateCounts, PageInfo)>,
    localtime: bool,
}

impl TerminalSurface<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows: HashMap::new(),
            next_handle: 0,
            width: DEFAULT_WIDTH,
            shown_states: ServiceState::ALL.to_vec(),
            summary: None,
            localtime: false,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Only print rows in these states. An empty list shows everything.
    pub fn with_states(mut self, states: Vec<ServiceState>) -> Self {
        self.shown_states = if states.is_empty() {
            ServiceState::ALL.to_vec()
        } else {
            states
        };
        self
    }

    /// Print window times in the local timezone (with its offset) instead
    /// of UTC.
    pub fn with_localtime(mut self, localtime: bool) -> Self {
        self.localtime = localtime;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Number of rows currently shown.
    pub fn visible_rows(&self) -> usize {
        self.rows.values().filter(|r| r.visible).count()
    }

    /// Error currently displayed on a row.
    pub fn row_error(&self, handle: RowHandle) -> Option<&str> {
        self.rows.get(&handle)?.error.as_deref()
    }

    /// Write the given rows (skipping hidden or filtered ones) followed by
    /// the summary line.
    pub fn write_page(&mut self, order: &[RowHandle]) -> io::Result<()> {
        let mut text = Vec::new();
        for handle in order {
            let Some(row) = self.rows.get(handle) else {
                continue;
            };
            if !row.visible || !self.shown_states.contains(&row.state) {
                continue;
            }
            text.push(format!("{} {}", state_badge(row.state), row.title.bold()));
            if row.body.is_empty() && row.error.is_none() {
                text.push(format!("  {}", "(loading)".dimmed()));
            }
            text.extend(row.body.iter().cloned());
            if let Some(error) = &row.error {
                text.push(format!("  {}", error.red()));
            }
            text.push(String::new());
        }
        if let Some((counts, page)) = &self.summary {
            text.push(summary_line(counts, page, &self.shown_states));
        }
        writeln!(self.out, "{}", text.join("\n"))?;
        self.out.flush()
    }

    fn render(&self, chart: &PreparedChart) -> Vec<String> {
        let window = format!(
            "{} .. {}",
            format_epoch(chart.start, self.localtime),
            format_epoch(chart.end, self.localtime)
        );
        let mut lines = vec![format!("  {}", window.dimmed())];
        if let Some(label) = &chart.y_label {
            lines.push(format!("  {}", label.italic()));
        }
        if chart.axis.is_empty() {
            lines.push(format!("  {}", "(no values)".dimmed()));
        } else {
            lines.push(format!("  axis: {}", chart.axis.labels.join(" ")));
            let top = chart.axis.max.unwrap_or(0.0);
            for series in chart.visible_series() {
                let values: Vec<Option<f64>> = series.data.iter().map(|&(_, y)| y).collect();
                let spark = sparkline(&values, chart.axis.min, top, self.width);
                lines.push(format!("  {}", spark.cyan()));
            }
        }
        for entry in &chart.legend {
            lines.push(format!("  {entry}"));
        }
        if let Some(time) = &chart.current_time {
            lines.push(format!("  {}", format!("as of {time}").dimmed()));
        }
        lines
    }
}

impl<W: Write> ChartSurface for TerminalSurface<W> {
    fn create_row(&mut self, descriptor: &GraphDescriptor) -> RowHandle {
        self.next_handle += 1;
        let handle = RowHandle(self.next_handle);
        self.rows.insert(
            handle,
            Row {
                title: format!("{} / {}", descriptor.host, descriptor.service),
                state: descriptor.state,
                visible: false,
                body: Vec::new(),
                error: None,
            },
        );
        handle
    }

    fn show_row(&mut self, handle: RowHandle) {
        if let Some(row) = self.rows.get_mut(&handle) {
            row.visible = true;
        }
    }

    fn hide_row(&mut self, handle: RowHandle) {
        if let Some(row) = self.rows.get_mut(&handle) {
            row.visible = false;
        }
    }

    fn release_row(&mut self, handle: RowHandle) {
        self.rows.remove(&handle);
    }

    fn draw(&mut self, handle: RowHandle, chart: &PreparedChart) {
        let body = self.render(chart);
        if let Some(row) = self.rows.get_mut(&handle) {
            row.body = body;
            if let Some(state) = chart.state {
                row.state = state;
            }
        }
    }

    fn show_error(&mut self, handle: RowHandle, message: &str) {
        if let Some(row) = self.rows.get_mut(&handle) {
            row.error = Some(message.to_string());
        }
    }

    fn clear_error(&mut self, handle: RowHandle) {
        if let Some(row) = self.rows.get_mut(&handle) {
            row.error = None;
        }
    }

    fn update_summary(&mut self, counts: &StateCounts, page: &PageInfo) {
        self.summary = Some((*counts, *page));
    }
}

fn summary_line(counts: &StateCounts, page: &PageInfo, shown: &[ServiceState]) -> String {
    let mut line = format!(
        "{} {}-{} of {}  {} ok  {} warning  {} critical  {} unknown",
        "Graphs".bold(),
        page.first,
        page.last,
        page.total,
        counts.ok.to_string().green(),
        counts.warning.to_string().yellow(),
        counts.critical.to_string().red(),
        counts.unknown.to_string().magenta(),
    );
    let hidden = counts.hidden(shown);
    if hidden > 0 {
        line.push_str(&format!("  {}", format!("({hidden} hidden)").dimmed()));
    }
    line
}

fn state_badge(state: ServiceState) -> colored::ColoredString {
    let text = format!("[{}]", state.to_string().to_uppercase());
    match state {
        ServiceState::Ok => text.green(),
        ServiceState::Warning => text.yellow(),
        ServiceState::Critical => text.red().bold(),
        ServiceState::Unknown => text.magenta(),
    }
}

/// `YYYY-MM-DD HH:MM` in UTC, or in local time followed by the offset.
fn format_epoch(secs: i64, local: bool) -> String {
    let Some(t) = DateTime::<Utc>::from_timestamp(secs, 0) else {
        return secs.to_string();
    };
    if local {
        t.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M %:z")
            .to_string()
    } else {
        t.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Resample `values` to `width` buckets (bucket max) and map each onto a
/// block glyph between `min` and `max`. Empty buckets print as a space.
pub fn sparkline(values: &[Option<f64>], min: f64, max: f64, width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }
    let width = width.min(values.len());
    let span = max - min;
    (0..width)
        .map(|i| {
            let lo = i * values.len() / width;
            let hi = ((i + 1) * values.len() / width).max(lo + 1);
            let bucket = values[lo..hi]
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .reduce(f64::max);
            match bucket {
                None => ' ',
                Some(_) if span <= 0.0 => SPARKS[0],
                Some(v) => {
                    let ratio = ((v - min) / span).clamp(0.0, 1.0);
                    SPARKS[((ratio * (SPARKS.len() - 1) as f64).round()) as usize]
                }
            }
        })
        .collect()
}
