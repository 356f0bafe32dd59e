/// Integration tests for layered configuration.
///
/// # Safety
///
/// `std::env::set_var` / `remove_var` are `unsafe` in Rust 2024 edition. All
/// environment manipulation lives in a single `#[test]` so no other test in
/// this binary reads the variables concurrently.
use railroad::activity::ActivityLog;
use railroad::config;
use railroad::dashboard::DashboardSettings;

const VARS: [&str; 9] = [
    "RAILROAD_URL",
    "RAILROAD_TIMEOUT_MS",
    "RAILROAD_USER",
    "RAILROAD_PER_PAGE",
    "RAILROAD_SYNC",
    "RAILROAD_LOCALTIME",
    "RAILROAD_REFRESH",
    "RAILROAD_REFRESH_SECS",
    "RAILROAD_LOGGING",
];

/// Helper: set an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) }
}

/// Helper: remove an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) }
}

#[test]
fn environment_overrides_every_layer() {
    unsafe {
        set_env("RAILROAD_URL", "http://nagios.example:8000//");
        set_env("RAILROAD_TIMEOUT_MS", "2500");
        set_env("RAILROAD_USER", "oncall");
        set_env("RAILROAD_PER_PAGE", "0");
        set_env("RAILROAD_SYNC", "yes");
        set_env("RAILROAD_LOCALTIME", "on");
        set_env("RAILROAD_REFRESH", "off");
        set_env("RAILROAD_REFRESH_SECS", "30");
        set_env("RAILROAD_LOGGING", "false");
    }

    let config = config::load();
    assert_eq!(config.backend.url, "http://nagios.example:8000");
    assert_eq!(config.backend.timeout_ms, 2500);
    assert_eq!(config.backend.effective_user(), "oncall");
    // Zero is pulled back to a usable page size.
    assert_eq!(config.display.per_page, 1);
    assert!(config.display.sync);
    assert!(config.display.localtime);
    assert!(!config.refresh.enabled);
    assert_eq!(config.refresh.interval_secs, 30);
    assert!(!config.logging.enabled);
    assert!(ActivityLog::from_config(&config).path().is_none());

    let settings = DashboardSettings::from_config(&config);
    assert_eq!(settings.per_page, 1);
    assert!(settings.sync);
    assert_eq!(settings.user, "oncall");

    unsafe {
        set_env("RAILROAD_PER_PAGE", "not-a-number");
        set_env("RAILROAD_LOGGING", "1");
    }
    let config = config::load();
    assert_ne!(config.display.per_page, 0);
    assert!(config.logging.enabled);

    unsafe {
        for var in VARS {
            remove_env(var);
        }
    }
}
