//! Events emitted by store changes.

use crate::apis::ResourceKind;

/// Events emitted when records change.
///
/// Dispatched via a broadcast channel to every subscriber, after the change
/// is visible to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A record was added, or its metadata or spec changed.
    Applied { kind: ResourceKind, key: String },
    /// Only the status of a record changed.
    StatusUpdated { kind: ResourceKind, key: String },
    /// A record was removed.
    Deleted { kind: ResourceKind, key: String },
}

impl Event {
    /// Get the resource kind for this event.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Event::Applied { kind, .. }
            | Event::StatusUpdated { kind, .. }
            | Event::Deleted { kind, .. } => *kind,
        }
    }

    /// Get the record key for this event.
    pub fn key(&self) -> &str {
        match self {
            Event::Applied { key, .. }
            | Event::StatusUpdated { key, .. }
            | Event::Deleted { key, .. } => key,
        }
    }

    /// Whether the event changes desired state and so needs a reconcile.
    pub fn is_desired_state_change(&self) -> bool {
        !matches!(self, Event::StatusUpdated { .. })
    }
}
