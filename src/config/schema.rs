/// Configuration schema and defaults for railroad.
///
/// Defines the TOML-serializable configuration structure with the sections
/// `[backend]`, `[display]`, `[refresh]`, and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values they
/// want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level railroad configuration.
///
/// Maps directly to the `~/.railroad/config.toml` and `.railroad.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RailroadConfig {
    pub backend: BackendConfig,
    pub display: DisplayConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the railroad server lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the railroad server, without a trailing slash.
    pub url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User name attached to scheduled downtimes. Empty means `$USER`.
    pub user: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
            user: String::new(),
        }
    }
}

impl BackendConfig {
    /// The downtime user: the configured name, else `$USER`, else `railroad`.
    pub fn effective_user(&self) -> String {
        if !self.user.trim().is_empty() {
            return self.user.trim().to_string();
        }
        std::env::var("USER")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "railroad".to_string())
    }
}

// ---------------------------------------------------------------------------
// [display]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Graphs per page when no local preference is stored.
    pub per_page: usize,
    /// Chart height in pixels; drives the number of Y-axis ticks.
    pub chart_height: u32,
    /// Apply zoom and range presets to every graph instead of one.
    pub sync: bool,
    /// Seconds before a transient error marker clears itself.
    pub error_dismiss_secs: u64,
    /// Print times in the local timezone instead of UTC.
    pub localtime: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            per_page: 25,
            chart_height: 200,
            sync: false,
            error_dismiss_secs: 5,
            localtime: false,
        }
    }
}

// ---------------------------------------------------------------------------
// [refresh]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether `railroad watch` refetches live graphs periodically.
    pub enabled: bool,
    /// Seconds between refreshes.
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Activity journal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the activity journal is written.
    pub enabled: bool,
    /// Path to the journal file. `~` is expanded to the home directory; empty
    /// means the default location.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.railroad/activity.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

impl RailroadConfig {
    /// Pull out-of-range values back to something usable.
    ///
    /// A zero page size or refresh interval would stall the dashboard, and a
    /// trailing slash on the URL would double up in endpoint paths.
    pub fn normalize(&mut self) {
        self.display.per_page = self.display.per_page.max(1);
        self.display.chart_height = self.display.chart_height.max(1);
        self.refresh.interval_secs = self.refresh.interval_secs.max(1);
        while self.backend.url.ends_with('/') {
            self.backend.url.pop();
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl RailroadConfig {
    /// Annotated default config file content, written by `railroad config init`.
    pub fn default_toml() -> String {
        r#"# railroad Configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (RAILROAD_*)
#   2. Project config (.railroad.toml in current directory)
#   3. User global config (~/.railroad/config.toml)
#   4. Built-in defaults

[backend]
url = "http://localhost:8000"
timeout_ms = 10000
user = ""                             # Downtime author; empty uses $USER

[display]
per_page = 25                         # Overridden by the stored graphsPerPage preference
chart_height = 200
sync = false                          # Zoom/range applies to every graph
error_dismiss_secs = 5
localtime = false                     # Print times in the local timezone instead of UTC

[refresh]
enabled = true
interval_secs = 600

[logging]
enabled = true
path = "~/.railroad/activity.jsonl"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = RailroadConfig::default();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_ms, 10_000);
        assert_eq!(config.display.per_page, 25);
        assert_eq!(config.display.chart_height, 200);
        assert!(!config.display.sync);
        assert_eq!(config.display.error_dismiss_secs, 5);
        assert!(config.refresh.enabled);
        assert_eq!(config.refresh.interval_secs, 600);
        assert!(config.logging.enabled);
    }

    #[test]
    fn deserialize_minimal_toml() {
        let toml_str = r#"
[backend]
url = "http://railroad.example:9000"
"#;
        let config: RailroadConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "http://railroad.example:9000");
        assert_eq!(config.backend.timeout_ms, 10_000);
        assert_eq!(config.display.per_page, 25);
    }

    #[test]
    fn default_toml_parses_to_defaults() {
        let config: RailroadConfig = toml::from_str(&RailroadConfig::default_toml()).unwrap();
        assert_eq!(config, RailroadConfig::default());
    }

    #[test]
    fn normalize_fixes_degenerate_values() {
        let mut config = RailroadConfig::default();
        config.display.per_page = 0;
        config.refresh.interval_secs = 0;
        config.backend.url = "http://x/".to_string();
        config.normalize();
        assert_eq!(config.display.per_page, 1);
        assert_eq!(config.refresh.interval_secs, 1);
        assert_eq!(config.backend.url, "http://x");
    }

    #[test]
    fn configured_user_wins() {
        let backend = BackendConfig {
            user: " ops ".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(backend.effective_user(), "ops");
    }
}
