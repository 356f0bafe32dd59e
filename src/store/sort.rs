//! Display-order comparators for the graph store.

use std::cmp::Ordering;
use std::fmt;

use super::descriptor::GraphDescriptor;

/// Sort keys offered by the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Service,
    Host,
    /// Worst state first.
    Status,
    Duration,
}

impl SortKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "service" => Some(Self::Service),
            "host" => Some(Self::Host),
            "status" | "state" => Some(Self::Status),
            "duration" => Some(Self::Duration),
            _ => None,
        }
    }

    /// Compare two descriptors under this key, optionally reversed.
    pub fn compare(self, a: &GraphDescriptor, b: &GraphDescriptor, reversed: bool) -> Ordering {
        let ordering = match self {
            Self::Service => normalized(&a.service).cmp(&normalized(&b.service)),
            Self::Host => normalized(&a.host).cmp(&normalized(&b.host)),
            Self::Status => b.state.cmp(&a.state),
            Self::Duration => a.duration.cmp(&b.duration),
        };
        if reversed { ordering.reverse() } else { ordering }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Host => write!(f, "host"),
            Self::Status => write!(f, "status"),
            Self::Duration => write!(f, "duration"),
        }
    }
}

fn normalized(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::descriptor::ServiceState;

    #[test]
    fn from_name_accepts_aliases() {
        assert_eq!(SortKey::from_name("Status"), Some(SortKey::Status));
        assert_eq!(SortKey::from_name("state"), Some(SortKey::Status));
        assert_eq!(SortKey::from_name("nope"), None);
    }

    #[test]
    fn host_compare_ignores_case_and_padding() {
        let a = GraphDescriptor::new(" Alpha", "x", 0, 1);
        let b = GraphDescriptor::new("beta", "x", 0, 1);
        assert_eq!(SortKey::Host.compare(&a, &b, false), Ordering::Less);
        assert_eq!(SortKey::Host.compare(&a, &b, true), Ordering::Greater);
    }

    #[test]
    fn status_puts_worst_first() {
        let ok = GraphDescriptor::new("h", "a", 0, 1);
        let crit = GraphDescriptor::new("h", "b", 0, 1).with_state(ServiceState::Critical);
        assert_eq!(SortKey::Status.compare(&crit, &ok, false), Ordering::Less);
    }
}
