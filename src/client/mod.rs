/// HTTP client for the railroad backend.
///
/// The dashboard core talks to the backend only through the [`Backend`]
/// trait, which covers the four server calls it needs:
///
/// - **Graph data**: one batched request for every graph missing data.
/// - **Filter/meta**: descriptor records for a host/service/group query.
/// - **Permalink**: store a snapshot server-side, get a short token back.
/// - **Downtime**: schedule and cancel via the xmlrpc bridge.
///
/// [`RailroadClient`] implements it over synchronous `ureq`, posting form
/// bodies exactly as the web UI does.
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RailroadConfig;
use crate::downtime::{self, DowntimeRequest};
use crate::fetch::{GraphEntry, GraphRequest};
use crate::store::DescriptorRecord;

/// Permalink tokens are six characters of URL-safe base64.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{6}$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Filter form fields for the meta endpoint. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub search: String,
}

impl FilterQuery {
    pub fn is_empty(&self) -> bool {
        self.form_fields().is_empty()
    }

    fn form_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("host", self.host.trim()),
            ("service", self.service.trim()),
            ("group", self.group.trim()),
            ("search", self.search.trim()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}

/// Everything the dashboard needs from the server.
pub trait Backend {
    /// Fetch data for a batch of graphs in one request.
    fn fetch_graphs(&self, requests: &[GraphRequest]) -> Result<Vec<GraphEntry>>;

    /// Descriptor records matching a filter, in display order.
    fn fetch_meta(&self, query: &FilterQuery) -> Result<Vec<DescriptorRecord>>;

    /// Store a snapshot and return its link token.
    fn generate_permalink(
        &self,
        snapshot: &[DescriptorRecord],
        description: Option<&str>,
    ) -> Result<String>;

    /// Schedule a downtime and return its cancellation code.
    fn schedule_downtime(&self, request: &DowntimeRequest) -> Result<String>;

    /// Cancel a downtime by code and return how many were cancelled.
    fn cancel_downtime(&self, code: &str) -> Result<u32>;
}

// ---------------------------------------------------------------------------
// ureq client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RailroadClient {
    base_url: String,
    timeout: Duration,
}

impl RailroadClient {
    pub fn from_config(config: &RailroadConfig) -> Self {
        Self::new(&config.backend.url, Duration::from_millis(config.backend.timeout_ms))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute link for a permalink token.
    pub fn permalink_url(&self, token: &str) -> String {
        format!("{}/permalink/{token}", self.base_url)
    }

    fn url(&self, path: &str) -> String {
        let url = format!("{}{path}", self.base_url);
        // "localhost" may resolve to ::1 first and stall when the server only
        // binds IPv4.
        url.replace("://localhost", "://127.0.0.1")
    }

    /// POST a form body. Non-2xx responses become errors carrying the
    /// server's message when it sent one.
    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<ureq::Response> {
        let url = self.url(path);
        match ureq::post(&url).timeout(self.timeout).send_form(fields) {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                let message = body.trim();
                if message.is_empty() {
                    bail!("{path} returned HTTP {code}");
                }
                bail!("{path} returned HTTP {code}: {message}");
            }
            Err(e) => Err(e).with_context(|| format!("request to {path} failed")),
        }
    }

    fn xmlrpc(&self, command: &str, args_json: &str) -> Result<String> {
        let resp = self.post_form("/ajax/xmlrpc", &[("command", command), ("args", args_json)])?;
        let body = resp
            .into_string()
            .with_context(|| format!("failed to read {command} response"))?;
        Ok(body.trim().to_string())
    }
}

impl Backend for RailroadClient {
    fn fetch_graphs(&self, requests: &[GraphRequest]) -> Result<Vec<GraphEntry>> {
        let graphs = serde_json::to_string(requests).context("failed to encode graph batch")?;
        let resp = self.post_form("/graphs", &[("graphs", graphs.as_str())])?;
        resp.into_json().context("failed to parse graph data response")
    }

    fn fetch_meta(&self, query: &FilterQuery) -> Result<Vec<DescriptorRecord>> {
        let resp = self.post_form("/configurator/meta", &query.form_fields())?;
        resp.into_json().context("failed to parse meta response")
    }

    fn generate_permalink(
        &self,
        snapshot: &[DescriptorRecord],
        description: Option<&str>,
    ) -> Result<String> {
        let services = serde_json::to_string(snapshot).context("failed to encode snapshot")?;
        let mut fields = vec![("services", services.as_str())];
        if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
            fields.push(("description", description));
        }
        let resp = self.post_form("/permalink/generate/", &fields)?;
        let body = resp
            .into_string()
            .context("failed to read permalink response")?;
        parse_token(&body)
    }

    fn schedule_downtime(&self, request: &DowntimeRequest) -> Result<String> {
        let code = self.xmlrpc("scheduleDowntime", &request.args_json())?;
        if code.is_empty() {
            bail!("server returned no cancellation code");
        }
        Ok(code)
    }

    fn cancel_downtime(&self, code: &str) -> Result<u32> {
        let body = self.xmlrpc("cancelDowntime", &downtime::cancel_args_json(code))?;
        parse_count(&body)
    }
}

/// Validate a permalink token from a response body.
pub fn parse_token(body: &str) -> Result<String> {
    let token = body.trim().trim_matches('"');
    if !TOKEN_RE.is_match(token) {
        bail!("unexpected permalink token: {token:?}");
    }
    Ok(token.to_string())
}

/// Parse the cancelled-downtime count from an xmlrpc response body.
fn parse_count(body: &str) -> Result<u32> {
    let body = body.trim();
    body.parse::<u32>()
        .or_else(|_| body.parse::<f64>().map(|f| f.max(0.0) as u32))
        .with_context(|| format!("unexpected cancelDowntime response: {body:?}"))
}
