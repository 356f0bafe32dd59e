//! Activity journal: one JSON line per notable graph-state event.
//!
//! Records fetches issued and applied, responses discarded as stale or
//! orphaned, fetch failures, permalink generation and downtime actions. The
//! journal lives at `~/.railroad/activity.jsonl` by default and is read back
//! by `railroad history`.
//!
//! Writing is best-effort: an unwritable journal never fails the caller.

use std::fmt;
use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{self, RailroadConfig};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FetchIssued,
    FetchApplied,
    FetchFailed,
    NoData,
    StaleResponse,
    OrphanResponse,
    StoreReplaced,
    StoreAppended,
    Removed,
    Zoom,
    Refresh,
    Permalink,
    DowntimeScheduled,
    DowntimeCancelled,
    DowntimeFailed,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchIssued => "fetch_issued",
            Self::FetchApplied => "fetch_applied",
            Self::FetchFailed => "fetch_failed",
            Self::NoData => "no_data",
            Self::StaleResponse => "stale_response",
            Self::OrphanResponse => "orphan_response",
            Self::StoreReplaced => "store_replaced",
            Self::StoreAppended => "store_appended",
            Self::Removed => "removed",
            Self::Zoom => "zoom",
            Self::Refresh => "refresh",
            Self::Permalink => "permalink",
            Self::DowntimeScheduled => "downtime_scheduled",
            Self::DowntimeCancelled => "downtime_cancelled",
            Self::DowntimeFailed => "downtime_failed",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slugs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Handle to the JSONL journal. A disabled journal drops every record.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    /// Journal at the configured location, or disabled when logging is off.
    pub fn from_config(config: &RailroadConfig) -> Self {
        if !config.logging.enabled {
            return Self::disabled();
        }
        let path = if config.logging.path.trim().is_empty() {
            default_journal_path()
        } else {
            config::expand_home(config.logging.path.trim())
        };
        Self { path }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one entry. Failures are swallowed.
    pub fn record(&self, kind: ActivityKind, slugs: &[String], detail: Option<&str>) {
        let Some(path) = &self.path else {
            return;
        };
        let entry = ActivityEntry {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            slugs: slugs.to_vec(),
            detail: detail.map(str::to_string),
        };
        let _ = append_entry(path, &entry);
    }

    /// Read every well-formed entry; malformed lines are skipped.
    pub fn read_all(&self) -> Vec<ActivityEntry> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<ActivityEntry>(&line).ok())
            .collect()
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<ActivityEntry> {
        let mut entries = self.read_all();
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
        entries
    }
}

fn append_entry(path: &Path, entry: &ActivityEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{json}")?;
    Ok(())
}

/// `~/.railroad/activity.jsonl`.
pub fn default_journal_path() -> Option<PathBuf> {
    config::railroad_home().map(|dir| dir.join("activity.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_journal(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "railroad-activity-{}-{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir.join("activity.jsonl")
    }

    #[test]
    fn disabled_journal_records_nothing() {
        let log = ActivityLog::disabled();
        log.record(ActivityKind::FetchIssued, &["a".to_string()], None);
        assert!(log.read_all().is_empty());
        assert!(log.path().is_none());
    }

    #[test]
    fn records_are_read_back_in_order() {
        let path = temp_journal("order");
        let log = ActivityLog::at(&path);
        log.record(ActivityKind::FetchIssued, &["h1-cpu".to_string()], None);
        log.record(ActivityKind::FetchFailed, &[], Some("timeout"));

        let entries = log.read_all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ActivityKind::FetchIssued);
        assert_eq!(entries[0].slugs, vec!["h1-cpu"]);
        assert_eq!(entries[1].detail.as_deref(), Some("timeout"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn malformed_lines_are_skipped_and_tail_limits() {
        let path = temp_journal("tail");
        let log = ActivityLog::at(&path);
        log.record(ActivityKind::Zoom, &[], None);
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "not json").unwrap();
        }
        log.record(ActivityKind::Refresh, &[], None);
        log.record(ActivityKind::Permalink, &[], Some("abc123"));

        assert_eq!(log.read_all().len(), 3);
        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].kind, ActivityKind::Permalink);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn kind_display_matches_serde_name() {
        let json = serde_json::to_string(&ActivityKind::StaleResponse).unwrap();
        assert_eq!(json, format!("\"{}\"", ActivityKind::StaleResponse));
    }
}
