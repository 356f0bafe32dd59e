//! CLI command implementations for railroad.
//!
//! Provides subcommand handlers for:
//! - `railroad show`: load a graph set and print one page of it
//! - `railroad watch`: the same, refreshing live graphs on an interval
//! - `railroad permalink`: store the graph set server-side and print its link
//! - `railroad downtime schedule|cancel`: downtime for the selected services
//! - `railroad prefs show|get|set|delete|clear`: client-local state
//! - `railroad config show|init|set|reset`: configuration management
//! - `railroad history`: recent activity journal entries

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::activity::{ActivityEntry, ActivityKind, ActivityLog};
use crate::client::{Backend, FilterQuery, RailroadClient};
use crate::config::{self, RailroadConfig};
use crate::dashboard::{Dashboard, DashboardSettings};
use crate::downtime::DowntimeScope;
use crate::fetch::FetchOutcome;
use crate::pager::PageInfo;
use crate::persist::{self, LocalState};
use crate::render::{ChartSurface, RangePreset, TerminalSurface};
use crate::store::payload::SeriesStatistics;
use crate::store::{DescriptorRecord, GraphDescriptor, ServiceState, SortKey, StateCounts};

type TerminalDashboard<W> = Dashboard<RailroadClient, TerminalSurface<W>>;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Which graphs a command works on, and their initial window and order.
#[derive(Debug, Clone, Default)]
pub struct GraphSelection {
    pub query: FilterQuery,
    /// A saved snapshot (JSON array of descriptor records) instead of a query.
    pub snapshot: Option<PathBuf>,
    pub sort: Option<SortKey>,
    pub reverse: bool,
    pub range: Option<RangePreset>,
}

/// How the loaded graphs are paged and displayed.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// 1-based page number.
    pub page: usize,
    pub per_page: Option<usize>,
    pub sync: bool,
    /// Only print rows in these states; empty shows all.
    pub states: Vec<ServiceState>,
}

// ---------------------------------------------------------------------------
// Dashboard setup
// ---------------------------------------------------------------------------

/// Page size: explicit flag, then the saved preference, then config.
fn open_dashboard<W: Write>(
    config: &RailroadConfig,
    surface: TerminalSurface<W>,
    view: &ViewOptions,
) -> TerminalDashboard<W> {
    let prefs = LocalState::open_default();
    let mut settings = DashboardSettings::from_config(config);
    settings.per_page = view
        .per_page
        .unwrap_or_else(|| prefs.per_page_or(config.display.per_page))
        .max(1);
    settings.sync = settings.sync || view.sync;
    Dashboard::new(
        RailroadClient::from_config(config),
        surface,
        settings,
        ActivityLog::from_config(config),
    )
}

/// Resolve a selection into descriptors, with the initial range and sort
/// order already applied.
fn load_descriptors<B: Backend>(
    backend: &B,
    selection: &GraphSelection,
    now: i64,
) -> Result<Vec<GraphDescriptor>> {
    let mut records: Vec<DescriptorRecord> = match &selection.snapshot {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read snapshot {}", path.display()))?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("failed to parse snapshot {}", path.display()))?
            }
        }
        None if selection.query.is_empty() => {
            bail!("no graphs selected: pass --host, --service, --group, --search or --snapshot")
        }
        None => backend
            .fetch_meta(&selection.query)
            .context("failed to load graphs for filter")?,
    };

    if let Some(preset) = selection.range {
        let (start, end) = preset.window(now);
        for record in &mut records {
            record.start = start;
            record.end = end;
            record.live = preset.keeps_live();
        }
    }

    let mut descriptors: Vec<GraphDescriptor> =
        records.into_iter().map(GraphDescriptor::from_record).collect();
    if let Some(key) = selection.sort {
        descriptors.sort_by(|a, b| key.compare(a, b, selection.reverse));
    }
    Ok(descriptors)
}

fn load<W: Write>(
    dashboard: &mut TerminalDashboard<W>,
    selection: &GraphSelection,
    page: usize,
) -> Result<()> {
    let descriptors = load_descriptors(dashboard.backend(), selection, Utc::now().timestamp())?;
    let start = page_start(page, dashboard.pager().per_page());
    dashboard.replace_all_at(descriptors, start);
    Ok(())
}

/// Load the selection into the store only. Nothing is drawn or fetched.
fn load_store<W: Write>(
    dashboard: &mut TerminalDashboard<W>,
    selection: &GraphSelection,
) -> Result<()> {
    let descriptors = load_descriptors(dashboard.backend(), selection, Utc::now().timestamp())?;
    dashboard.install(descriptors);
    Ok(())
}

/// First row of 1-based `page`.
fn page_start(page: usize, per_page: usize) -> usize {
    page.saturating_sub(1).saturating_mul(per_page).saturating_add(1)
}

fn print_page<W: Write>(dashboard: &mut TerminalDashboard<W>) -> Result<()> {
    let order: Vec<_> = dashboard.visible().iter().filter_map(|d| d.handle()).collect();
    dashboard
        .surface_mut()
        .write_page(&order)
        .context("failed to write page")
}

// ---------------------------------------------------------------------------
// railroad show
// ---------------------------------------------------------------------------

/// Load a graph set and print one page of it.
pub fn run_show(selection: &GraphSelection, view: &ViewOptions, format: OutputFormat) -> Result<()> {
    let config = config::load();

    if format == OutputFormat::Table {
        let surface = TerminalSurface::stdout()
            .with_states(view.states.clone())
            .with_localtime(config.display.localtime);
        let mut dashboard = open_dashboard(&config, surface, view);
        load(&mut dashboard, selection, view.page)?;
        if dashboard.store().is_empty() {
            println!("{}", "No graphs matched.".yellow());
            return Ok(());
        }
        return print_page(&mut dashboard);
    }

    let mut dashboard = open_dashboard(&config, TerminalSurface::new(io::sink()), view);
    load(&mut dashboard, selection, view.page)?;
    let page = page_view(&dashboard, &view.states);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
        _ => print_page_csv(&page),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct PageView {
    page: PageInfo,
    counts: StateCounts,
    hidden: usize,
    graphs: Vec<GraphView>,
}

#[derive(Debug, Serialize)]
struct GraphView {
    slug: String,
    host: String,
    service: String,
    state: String,
    start: i64,
    end: i64,
    live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    series: Vec<SeriesView>,
}

#[derive(Debug, Serialize)]
struct SeriesView {
    label: Option<String>,
    visible: bool,
    statistics: Option<SeriesStatistics>,
}

fn page_view<B: Backend, S: ChartSurface>(
    dashboard: &Dashboard<B, S>,
    states: &[ServiceState],
) -> PageView {
    let shown: Vec<ServiceState> = if states.is_empty() {
        ServiceState::ALL.to_vec()
    } else {
        states.to_vec()
    };
    let counts = dashboard.counts();
    let graphs = dashboard
        .visible()
        .iter()
        .filter(|d| shown.contains(&d.state))
        .map(|d| GraphView {
            slug: d.slug().to_string(),
            host: d.host.clone(),
            service: d.service.clone(),
            state: d.state.to_string(),
            start: d.start(),
            end: d.end(),
            live: d.live,
            error: dashboard.marker(d.slug()).map(|m| m.message.clone()),
            series: d
                .data()
                .map(|payload| {
                    payload
                        .chart
                        .series
                        .iter()
                        .map(|s| SeriesView {
                            label: s.label.clone(),
                            visible: s.is_visible(),
                            statistics: s.statistics.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();
    PageView {
        page: dashboard.page_info(),
        counts,
        hidden: counts.hidden(&shown),
        graphs,
    }
}

fn print_page_csv(page: &PageView) {
    println!("slug,host,service,state,start,end,live,error");
    for g in &page.graphs {
        println!(
            "{},{},{},{},{},{},{},{}",
            csv_field(&g.slug),
            csv_field(&g.host),
            csv_field(&g.service),
            g.state,
            g.start,
            g.end,
            g.live,
            csv_field(g.error.as_deref().unwrap_or("")),
        );
    }
}

// ---------------------------------------------------------------------------
// railroad watch
// ---------------------------------------------------------------------------

/// Print a page, then refresh live graphs every interval and print again.
///
/// Stops after `rounds` refreshes when given, otherwise runs until killed.
pub fn run_watch(
    selection: &GraphSelection,
    view: &ViewOptions,
    interval_secs: Option<u64>,
    rounds: Option<usize>,
) -> Result<()> {
    let config = config::load();
    let surface = TerminalSurface::stdout()
        .with_states(view.states.clone())
        .with_localtime(config.display.localtime);
    let mut dashboard = open_dashboard(&config, surface, view);
    load(&mut dashboard, selection, view.page)?;
    if dashboard.store().is_empty() {
        println!("{}", "No graphs matched.".yellow());
        return Ok(());
    }
    print_page(&mut dashboard)?;

    if !config.refresh.enabled && interval_secs.is_none() {
        println!(
            "{}",
            "Auto-refresh is off ([refresh] enabled = false); pass --interval to override."
                .yellow()
        );
        return Ok(());
    }
    let every = Duration::from_secs(interval_secs.unwrap_or(config.refresh.interval_secs).max(1));

    let mut done = 0;
    while rounds.is_none_or(|max| done < max) {
        thread::sleep(every);
        dashboard.expire_markers();
        let outcome = dashboard.refresh();
        done += 1;
        println!(
            "{}",
            format!(
                "-- refreshed at {} ({}) --",
                clock(config.display.localtime),
                describe_outcome(&outcome)
            )
            .dimmed()
        );
        print_page(&mut dashboard)?;
    }
    Ok(())
}

fn clock(local: bool) -> String {
    if local {
        Local::now().format("%H:%M:%S").to_string()
    } else {
        Utc::now().format("%H:%M:%S UTC").to_string()
    }
}

fn describe_outcome(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Idle => "nothing to fetch".to_string(),
        FetchOutcome::Completed(report) => format!(
            "{} updated, {} without data",
            report.applied.len(),
            report.no_data.len()
        ),
        FetchOutcome::Failed { slugs, error } => {
            format!("{} graphs failed: {error}", slugs.len())
        }
    }
}

// ---------------------------------------------------------------------------
// railroad permalink
// ---------------------------------------------------------------------------

/// Store the selected graph set server-side and print its link.
pub fn run_permalink(selection: &GraphSelection, description: Option<&str>) -> Result<()> {
    let config = config::load();
    let mut dashboard = open_dashboard(
        &config,
        TerminalSurface::new(io::sink()),
        &ViewOptions::default(),
    );
    load_store(&mut dashboard, selection)?;
    if dashboard.store().is_empty() {
        bail!("no graphs matched; nothing to link");
    }
    let token = dashboard.generate_permalink(description)?;
    println!(
        "{} {}",
        "✓".green().bold(),
        dashboard.backend().permalink_url(&token)
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// railroad downtime schedule | cancel
// ---------------------------------------------------------------------------

/// Schedule downtime for the selection.
///
/// With `states`, only rows in those states are targeted; otherwise every
/// selected row is.
pub fn run_downtime_schedule(
    selection: &GraphSelection,
    states: &[ServiceState],
    scope: DowntimeScope,
    from: Option<&str>,
    to: Option<&str>,
    comment: &str,
) -> Result<()> {
    let from = from.map(parse_time).transpose()?;
    let to = to.map(parse_time).transpose()?;

    let config = config::load();
    let mut dashboard = open_dashboard(
        &config,
        TerminalSurface::new(io::sink()),
        &ViewOptions::default(),
    );
    load_store(&mut dashboard, selection)?;
    for state in states {
        dashboard.check_state(*state);
    }
    if !states.is_empty() && !dashboard.store().iter().any(|d| d.checked) {
        bail!("no selected graphs are in the requested states");
    }

    let code = dashboard.schedule_downtime(scope, from, to, comment)?;
    println!(
        "{} Downtime scheduled. Cancel with: {}",
        "✓".green().bold(),
        format!("railroad downtime cancel {code}").bold()
    );
    Ok(())
}

/// Cancel a downtime by its code.
pub fn run_downtime_cancel(code: &str) -> Result<()> {
    let config = config::load();
    let mut dashboard = open_dashboard(
        &config,
        TerminalSurface::new(io::sink()),
        &ViewOptions::default(),
    );
    if dashboard.cancel_downtime(code)? {
        println!("{} Downtime {} cancelled", "✓".green().bold(), code.bold());
    } else {
        println!("{}", format!("No downtime matched code {code}.").yellow());
    }
    Ok(())
}

/// Accept epoch seconds, RFC 3339, or `YYYY-MM-DD HH:MM[:SS]` in UTC.
pub fn parse_time(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(t.and_utc().timestamp());
        }
    }
    bail!("unrecognized time '{raw}': use epoch seconds, RFC 3339 or YYYY-MM-DD HH:MM")
}

// ---------------------------------------------------------------------------
// railroad prefs
// ---------------------------------------------------------------------------

/// Print every saved local value.
pub fn run_prefs_show() -> Result<()> {
    let state = LocalState::open_default();
    println!("{}", "Local State".bold().cyan());
    println!("{}", "=".repeat(50));
    if let Some(path) = state.path() {
        println!("  {}", path.display().to_string().dimmed());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
    Ok(())
}

pub fn run_prefs_get(key: &str) -> Result<()> {
    let state = LocalState::open_default();
    match state.lookup(key) {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{}", format!("{key} is not set.").yellow()),
    }
    Ok(())
}

/// Set a value. `form.field` keys address one field of a saved form, e.g.
/// `preference_panel.graphsPerPage`.
pub fn run_prefs_set(key: &str, raw: &str) -> Result<()> {
    let mut state = LocalState::open_default();
    state.assign(key, persist::parse_value(raw))?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), raw);
    Ok(())
}

pub fn run_prefs_delete(key: &str) -> Result<()> {
    let mut state = LocalState::open_default();
    if state.unassign(key)? {
        println!("{} Removed {}", "✓".green().bold(), key.bold());
    } else {
        println!("{}", format!("{key} was not set.").yellow());
    }
    Ok(())
}

pub fn run_prefs_clear() -> Result<()> {
    let mut state = LocalState::open_default();
    state.clear()?;
    println!("{} Local state cleared", "✓".green().bold());
    Ok(())
}

// ---------------------------------------------------------------------------
// railroad config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective Railroad Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.railroad/config.toml", global_exists);
    print_source(".railroad.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "RAILROAD_* environment variables".dimmed()
    );
    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Write a default config file at `~/.railroad/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Point [backend] url at your monitoring server.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// railroad history
// ---------------------------------------------------------------------------

/// Show the last `limit` activity journal entries.
pub fn run_history(limit: usize, format: OutputFormat) -> Result<()> {
    let config = config::load();
    let journal = ActivityLog::from_config(&config);
    let entries = journal.tail(limit);

    if entries.is_empty() {
        println!("{}", "No activity recorded yet.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Csv => print_history_csv(&entries),
        OutputFormat::Table => print_history_table(&entries),
    }
    Ok(())
}

fn print_history_table(entries: &[ActivityEntry]) {
    println!("{}", "Railroad Activity".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {:<19} {:<20} {:<32} Detail", "Time", "Event", "Graphs");
    println!("  {}", "-".repeat(78));
    for entry in entries {
        let time: String = entry.timestamp.chars().take(19).collect();
        let kind = format!("{:<20}", entry.kind.to_string());
        println!(
            "  {:<19} {} {:<32} {}",
            time,
            colorize_kind(entry.kind, &kind),
            truncate(&entry.slugs.join(" "), 32),
            entry.detail.as_deref().unwrap_or("").dimmed(),
        );
    }
}

fn print_history_csv(entries: &[ActivityEntry]) {
    println!("timestamp,kind,graphs,detail");
    for entry in entries {
        println!(
            "{},{},{},{}",
            entry.timestamp,
            entry.kind,
            csv_field(&entry.slugs.join(" ")),
            csv_field(entry.detail.as_deref().unwrap_or("")),
        );
    }
}

fn colorize_kind(kind: ActivityKind, text: &str) -> colored::ColoredString {
    match kind {
        ActivityKind::FetchFailed | ActivityKind::DowntimeFailed | ActivityKind::NoData => {
            text.red()
        }
        ActivityKind::StaleResponse | ActivityKind::OrphanResponse => text.yellow(),
        ActivityKind::Permalink
        | ActivityKind::DowntimeScheduled
        | ActivityKind::DowntimeCancelled => text.green(),
        _ => text.normal(),
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Truncate to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Quote a CSV field when it needs it.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
