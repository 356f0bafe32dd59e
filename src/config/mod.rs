/// Configuration system for railroad.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::RailroadConfig::default()`]
/// 2. **User global config**: `~/.railroad/config.toml`
/// 3. **Project local config**: `.railroad.toml` in the current working directory
/// 4. **Environment variables**: `RAILROAD_*` overrides (highest precedence)
///
/// Files are merged key by key, so a project file that only sets
/// `display.sync` keeps every other value from the global file.
///
/// # Usage
///
/// ```rust,ignore
/// use railroad::config;
///
/// let cfg = config::load();
/// let client = RailroadClient::from_config(&cfg);
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::RailroadConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved railroad configuration.
pub fn load() -> RailroadConfig {
    let mut config = load_layers(&[global_config_path(), project_config_path()]);
    apply_env_overrides(&mut config);
    config.normalize();
    config
}

/// Merge the given TOML files over the defaults, in order.
///
/// Missing or malformed files are skipped; a bad project file never stops
/// the dashboard from starting.
fn load_layers(paths: &[Option<PathBuf>]) -> RailroadConfig {
    let Ok(mut merged) = toml::Value::try_from(RailroadConfig::default()) else {
        return RailroadConfig::default();
    };
    for path in paths.iter().flatten() {
        if let Some(layer) = load_toml_file(path) {
            merge_values(&mut merged, layer);
        }
    }
    merged.try_into().unwrap_or_default()
}

fn load_toml_file(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Overlay `overlay` onto `base`: tables merge recursively, everything else
/// is replaced.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn global_config_path() -> Option<PathBuf> {
    railroad_home().map(|dir| dir.join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".railroad.toml"))
}

/// `~/.railroad`, home of the global config, local state and journal.
pub fn railroad_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".railroad"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir()?;
            Some(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `RAILROAD_URL`: backend base URL
/// - `RAILROAD_TIMEOUT_MS`: request timeout
/// - `RAILROAD_USER`: downtime author
/// - `RAILROAD_PER_PAGE`: default page size
/// - `RAILROAD_SYNC`: synchronized zoom (`1`/`true`/`yes`/`on`)
/// - `RAILROAD_LOCALTIME`: print times in the local timezone
/// - `RAILROAD_REFRESH`: periodic refresh enabled
/// - `RAILROAD_REFRESH_SECS`: refresh interval
/// - `RAILROAD_LOGGING`: activity journal enabled
fn apply_env_overrides(config: &mut RailroadConfig) {
    if let Ok(val) = std::env::var("RAILROAD_URL")
        && !val.is_empty()
    {
        config.backend.url = val;
    }
    if let Ok(val) = std::env::var("RAILROAD_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("RAILROAD_USER")
        && !val.is_empty()
    {
        config.backend.user = val;
    }

    if let Ok(val) = std::env::var("RAILROAD_PER_PAGE")
        && let Ok(n) = val.parse::<usize>()
    {
        config.display.per_page = n;
    }
    if let Ok(val) = std::env::var("RAILROAD_SYNC") {
        config.display.sync = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("RAILROAD_LOCALTIME") {
        config.display.localtime = is_truthy(&val);
    }

    if let Ok(val) = std::env::var("RAILROAD_REFRESH") {
        config.refresh.enabled = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("RAILROAD_REFRESH_SECS")
        && let Ok(secs) = val.parse::<u64>()
    {
        config.refresh.interval_secs = secs;
    }

    if let Ok(val) = std::env::var("RAILROAD_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
pub(crate) fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.railroad/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.railroad/ directory")?;
    }

    fs::write(&path, RailroadConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key in the global config file.
///
/// Supports dotted keys like `display.sync`. The key must exist in the
/// schema; its current type decides how `value` is parsed.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_at(&path, key, value)
}

fn set_config_value_at(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut table = toml::Value::try_from(RailroadConfig::default())
        .context("failed to serialize default config")?;
    if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        let current: toml::Value =
            toml::from_str(&content).context("failed to parse config as TOML value")?;
        merge_values(&mut table, current);
    }

    set_toml_value(&mut table, key, value)?;

    let output = toml::to_string_pretty(&table).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;
    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let Some((section_path, leaf)) = key.rsplit_once('.') else {
        anyhow::bail!("config key must be 'section.key', got '{key}'");
    };

    let mut current = root;
    for part in section_path.split('.') {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table at '{section_path}'"))?;

    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::String(_)) => toml::Value::String(raw_value.to_string()),
        Some(_) => anyhow::bail!("'{key}' cannot be set from the command line"),
        None => anyhow::bail!("unknown config key '{key}'"),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("railroad-config-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("YES"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn layers_merge_key_by_key() {
        let dir = temp_dir("layers");
        let global = dir.join("global.toml");
        let project = dir.join("project.toml");
        fs::write(&global, "[backend]\nurl = \"http://global\"\ntimeout_ms = 500\n").unwrap();
        fs::write(&project, "[backend]\ntimeout_ms = 900\n[display]\nsync = true\n").unwrap();

        let config = load_layers(&[Some(global), Some(project)]);
        assert_eq!(config.backend.url, "http://global");
        assert_eq!(config.backend.timeout_ms, 900);
        assert!(config.display.sync);
        assert_eq!(config.display.per_page, 25);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_layer_is_ignored() {
        let dir = temp_dir("malformed");
        let bad = dir.join("bad.toml");
        fs::write(&bad, "[backend\nurl = ").unwrap();
        let config = load_layers(&[Some(bad), None]);
        assert_eq!(config, RailroadConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn set_toml_value_updates_typed_values() {
        let mut root = toml::Value::try_from(RailroadConfig::default()).unwrap();
        set_toml_value(&mut root, "display.sync", "yes").unwrap();
        set_toml_value(&mut root, "display.per_page", "50").unwrap();
        set_toml_value(&mut root, "backend.url", "http://other").unwrap();

        let config: RailroadConfig = root.try_into().unwrap();
        assert!(config.display.sync);
        assert_eq!(config.display.per_page, 50);
        assert_eq!(config.backend.url, "http://other");
    }

    #[test]
    fn set_toml_value_rejects_bad_input() {
        let mut root = toml::Value::try_from(RailroadConfig::default()).unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "v").is_err());
        assert!(set_toml_value(&mut root, "display.nope", "v").is_err());
        assert!(set_toml_value(&mut root, "display.per_page", "many").is_err());
        assert!(set_toml_value(&mut root, "sync", "true").is_err());
    }

    #[test]
    fn set_value_creates_file_from_defaults() {
        let dir = temp_dir("set");
        let path = dir.join("config.toml");
        set_config_value_at(&path, "refresh.interval_secs", "60").unwrap();
        set_config_value_at(&path, "display.sync", "true").unwrap();

        let config = load_layers(&[Some(path)]);
        assert_eq!(config.refresh.interval_secs, 60);
        assert!(config.display.sync);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn expand_home_handles_tilde_and_plain_paths() {
        assert_eq!(expand_home("/tmp/x"), Some(PathBuf::from("/tmp/x")));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/a/b"), Some(home.join("a/b")));
        }
    }

    #[test]
    fn show_effective_config_returns_toml() {
        let toml_str = show_effective_config().unwrap();
        let _: RailroadConfig = toml::from_str(&toml_str).unwrap();
    }
}
