//! Series visibility reconciliation.
//!
//! A user may switch individual series of a graph off. When the same graph is
//! fetched again (zoom, range change, periodic refresh) the backend sends its
//! own default visibility for every series; those defaults must not undo the
//! user's choices. [`reconcile`] copies the old per-label flags onto the new
//! payload before it is drawn.

use crate::store::RenderPayload;

/// Carry visibility flags from `old` onto `new`, keyed by series label.
///
/// Only applies when both payloads describe the same host and service. For
/// each labelled series in `new`, every old series with the same label is
/// visited and the last one's flag wins. Labels that are new keep the
/// backend's default. Returns the number of new series whose flag came from
/// `old`.
pub fn reconcile(old: &RenderPayload, new: &mut RenderPayload) -> usize {
    if old.host != new.host || old.service != new.service {
        return 0;
    }

    let mut carried = 0;
    for series in &mut new.chart.series {
        let Some(label) = series.label.as_deref() else {
            continue;
        };
        let previous = old
            .chart
            .series
            .iter()
            .rfind(|s| s.label.as_deref() == Some(label));
        if let Some(previous) = previous {
            series.lines.show = previous.lines.show;
            carried += 1;
        }
    }
    carried
}
