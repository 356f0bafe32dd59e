//! Downtime requests: selection expression, local validation, wire args.
//!
//! A downtime covers the currently selected rows. In host mode the whole host
//! goes down (`host:web1 or host:web2`); otherwise each row contributes a
//! host/service pair (`host:"web1" and service:"http"`). Duplicates collapse
//! to their first occurrence.

use anyhow::{Result, bail};
use serde_json::json;

use crate::store::GraphDescriptor;

/// What a downtime expression should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DowntimeScope {
    /// Every service on each selected host.
    Host,
    /// Exactly the selected host/service pairs.
    #[default]
    Service,
}

/// Build the backend's boolean selection expression for `targets`.
pub fn build_expression<'a, I>(targets: I, scope: DowntimeScope) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut terms: Vec<String> = Vec::new();
    for (host, service) in targets {
        let host = host.trim();
        let term = match scope {
            DowntimeScope::Host => format!("host:{host}"),
            DowntimeScope::Service => {
                format!("host:\"{host}\" and service:\"{}\"", service.trim())
            }
        };
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms.join(" or ")
}

/// Expression over a set of descriptors.
pub fn expression_for(descriptors: &[&GraphDescriptor], scope: DowntimeScope) -> String {
    build_expression(
        descriptors
            .iter()
            .map(|d| (d.host.as_str(), d.service.as_str())),
        scope,
    )
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A validated `scheduleDowntime` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowntimeRequest {
    pub expression: String,
    pub from: i64,
    pub to: i64,
    pub user: String,
    pub comment: String,
}

impl DowntimeRequest {
    /// Validate the pieces of a downtime before anything is sent.
    ///
    /// Rejects an empty selection, a missing bound, `from >= to`, and a blank
    /// comment.
    pub fn new(
        expression: impl Into<String>,
        from: Option<i64>,
        to: Option<i64>,
        user: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self> {
        let expression = expression.into();
        let comment = comment.into();
        if expression.trim().is_empty() {
            bail!("no graphs selected for downtime");
        }
        let (Some(from), Some(to)) = (from, to) else {
            bail!("downtime needs both a start and an end time");
        };
        if from >= to {
            bail!("downtime must end after it starts");
        }
        if comment.trim().is_empty() {
            bail!("downtime needs a comment");
        }
        Ok(Self {
            expression,
            from,
            to,
            user: user.into(),
            comment,
        })
    }

    /// The JSON `args` array: `[expr, from, to, user, comment]`.
    pub fn args_json(&self) -> String {
        json!([self.expression, self.from, self.to, self.user, self.comment]).to_string()
    }
}

/// The JSON `args` array for `cancelDowntime`.
pub fn cancel_args_json(code: &str) -> String {
    json!([code]).to_string()
}
