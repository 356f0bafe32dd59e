//! Graph descriptors: one record per monitored host + service row.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::payload::RenderPayload;
use super::slug;

// ---------------------------------------------------------------------------
// Service state
// ---------------------------------------------------------------------------

/// Last known monitoring status, serialized as its ordinal (`0`..=`3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ServiceState {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    pub const ALL: [ServiceState; 4] = [
        ServiceState::Ok,
        ServiceState::Warning,
        ServiceState::Critical,
        ServiceState::Unknown,
    ];

    pub fn ordinal(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }

    /// Parse a state name as used by the CLI (`ok`, `warning`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "warning" | "warn" => Some(Self::Warning),
            "critical" | "crit" => Some(Self::Critical),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl TryFrom<i64> for ServiceState {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Unknown),
            other => Err(format!("invalid service state ordinal: {other}")),
        }
    }
}

impl From<ServiceState> for i64 {
    fn from(state: ServiceState) -> Self {
        state.ordinal()
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Row handle
// ---------------------------------------------------------------------------

/// Opaque reference to the on-screen row drawn for a descriptor.
///
/// Allocated by the chart surface the first time a descriptor lands on a
/// page and reused on every later page visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle(pub u64);

// ---------------------------------------------------------------------------
// Descriptor record (wire / snapshot form)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Serializable descriptor fields: what the filter endpoint returns and what
/// a permalink snapshot stores. Never carries fetched data or row handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub host: String,
    pub service: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub state: ServiceState,
    #[serde(default)]
    pub duration: i64,
    #[serde(default = "default_true", alias = "isGraphable")]
    pub is_graphable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniq: Option<u32>,
    #[serde(default)]
    pub live: bool,
}

// ---------------------------------------------------------------------------
// Graph descriptor
// ---------------------------------------------------------------------------

/// One monitored host + service row and its graph state.
///
/// The time window, fetched data, and drawn flag are private: they only
/// change through the store and fetcher so that `is_graphed` can never
/// outlive the window it was drawn for.
#[derive(Debug, Clone)]
pub struct GraphDescriptor {
    slug: String,
    pub host: String,
    pub service: String,
    uniq: Option<u32>,
    start: i64,
    end: i64,
    pub state: ServiceState,
    pub duration: i64,
    pub is_graphable: bool,
    /// Included in periodic auto-refresh.
    pub live: bool,
    /// Row checkbox, used by bulk actions.
    pub checked: bool,
    data: Option<RenderPayload>,
    is_graphed: bool,
    handle: Option<RowHandle>,
    in_flight: Option<u64>,
}

impl GraphDescriptor {
    pub fn new(host: impl Into<String>, service: impl Into<String>, start: i64, end: i64) -> Self {
        let host = host.into();
        let service = service.into();
        Self {
            slug: slug::graph_slug(&host, &service, None),
            host,
            service,
            uniq: None,
            start,
            end,
            state: ServiceState::Ok,
            duration: 0,
            is_graphable: true,
            live: false,
            checked: false,
            data: None,
            is_graphed: false,
            handle: None,
            in_flight: None,
        }
    }

    pub fn from_record(record: DescriptorRecord) -> Self {
        let mut descriptor = Self::new(record.host, record.service, record.start, record.end);
        descriptor.state = record.state;
        descriptor.duration = record.duration;
        descriptor.is_graphable = record.is_graphable;
        descriptor.live = record.live;
        descriptor.set_uniq(record.uniq);
        descriptor
    }

    pub fn to_record(&self) -> DescriptorRecord {
        DescriptorRecord {
            host: self.host.clone(),
            service: self.service.clone(),
            start: self.start,
            end: self.end,
            state: self.state,
            duration: self.duration,
            is_graphable: self.is_graphable,
            uniq: self.uniq,
            live: self.live,
        }
    }

    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_uniq(mut self, uniq: Option<u32>) -> Self {
        self.set_uniq(uniq);
        self
    }

    pub fn graphable(mut self, graphable: bool) -> Self {
        self.is_graphable = graphable;
        self
    }

    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    // -- Accessors --

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Slug without the disambiguator, as the backend reports it.
    pub fn base_slug(&self) -> String {
        slug::base_slug(&self.host, &self.service)
    }

    pub fn uniq(&self) -> Option<u32> {
        self.uniq
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn window(&self) -> (i64, i64) {
        (self.start, self.end)
    }

    pub fn data(&self) -> Option<&RenderPayload> {
        self.data.as_ref()
    }

    pub fn is_graphed(&self) -> bool {
        self.is_graphed
    }

    pub fn handle(&self) -> Option<RowHandle> {
        self.handle
    }

    /// Whether a request for the current window is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Graphable, and either never fetched or not yet drawn for this window.
    pub fn needs_data(&self) -> bool {
        self.is_graphable && (self.data.is_none() || !self.is_graphed)
    }

    // -- Crate-internal mutation --

    pub(crate) fn set_uniq(&mut self, uniq: Option<u32>) {
        self.uniq = uniq;
        self.slug = slug::graph_slug(&self.host, &self.service, uniq);
    }

    /// Move the window. Drawn state and any outstanding request are dropped;
    /// data for the old window is kept (for series reconciliation) but is
    /// stale until a fetch for the new window lands.
    pub(crate) fn set_window(&mut self, start: i64, end: i64) {
        self.start = start;
        self.end = end;
        self.is_graphed = false;
        self.in_flight = None;
    }

    /// Forget fetched data entirely.
    pub(crate) fn invalidate(&mut self) {
        self.data = None;
        self.is_graphed = false;
        self.in_flight = None;
    }

    pub(crate) fn set_handle(&mut self, handle: RowHandle) {
        self.handle = Some(handle);
    }

    pub(crate) fn take_handle(&mut self) -> Option<RowHandle> {
        self.handle.take()
    }

    /// Mark request `token` as the one outstanding. Tokens come from
    /// [`GraphStore`](super::GraphStore), which keeps them unique across
    /// descriptors.
    pub(crate) fn begin_request(&mut self, token: u64) {
        self.in_flight = Some(token);
    }

    /// Whether `token` is the latest request and still outstanding.
    pub(crate) fn accepts(&self, token: u64) -> bool {
        self.in_flight == Some(token)
    }

    /// Close out request `token` without applying data. No-op for stale tokens.
    pub(crate) fn finish_request(&mut self, token: u64) -> bool {
        if self.accepts(token) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Install freshly fetched data. Must be drawn before `is_graphed` holds.
    pub(crate) fn install_data(&mut self, payload: RenderPayload) {
        self.data = Some(payload);
        self.is_graphed = false;
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut RenderPayload> {
        self.data.as_mut()
    }

    /// Record that the current data was drawn. Refused when the data does not
    /// cover the current window.
    pub(crate) fn mark_graphed(&mut self) -> bool {
        match &self.data {
            Some(payload) if payload.covers(self.start, self.end) => {
                self.is_graphed = true;
                true
            }
            _ => false,
        }
    }
}
