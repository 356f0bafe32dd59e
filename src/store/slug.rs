//! Stable graph identities derived from host and service names.
//!
//! A slug is the lowercase, hyphen-joined form of `"<host> <service>"` with
//! punctuation dropped (`"web01"` + `"HTTP Latency"` → `web01-http-latency`).
//! When one page holds several rows for the same host/service, the numeric
//! disambiguator `uniq` is appended (`web01-http-latency-1`).

use regex::Regex;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Compiled regexes
// ---------------------------------------------------------------------------

/// Anything that is not a word character, whitespace, or hyphen.
static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug strip regex must compile"));

/// Runs of whitespace and hyphens.
static JOIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("slug join regex must compile"));

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Slugify an arbitrary string.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = STRIP_RE.replace_all(&lowered, "");
    let joined = JOIN_RE.replace_all(stripped.trim(), "-");
    joined.trim_matches('-').to_string()
}

/// Base slug for a host/service pair, without any disambiguator.
pub fn base_slug(host: &str, service: &str) -> String {
    slugify(&format!("{host} {service}"))
}

/// Full identity: the base slug plus `-<uniq>` when a disambiguator is set.
pub fn compose(base: &str, uniq: Option<u32>) -> String {
    match uniq {
        Some(n) => format!("{base}-{n}"),
        None => base.to_string(),
    }
}

/// Full identity for a host/service pair.
pub fn graph_slug(host: &str, service: &str, uniq: Option<u32>) -> String {
    compose(&base_slug(host, service), uniq)
}
