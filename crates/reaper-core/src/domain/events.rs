//! Events - progress of a batch, as the operator sees it.

use std::fmt;

use super::resource::{ResourceKind, ResourceRef};

/// Something that happened during a batch.
///
/// `Display` renders the human progress line for stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapEvent {
    Listed { kind: ResourceKind, count: usize },
    Retained { id: ResourceRef, reason: String },
    Skipped { id: ResourceRef, reason: String },
    WouldDelete { id: ResourceRef },
    Deleting { id: ResourceRef },
    Deleted { id: ResourceRef },
    DeleteFailed { id: ResourceRef, reason: String },
    Cancelled { id: ResourceRef },
}

impl ReapEvent {
    /// The resource this event is about, if any.
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            ReapEvent::Listed { .. } => None,
            ReapEvent::Retained { id, .. }
            | ReapEvent::Skipped { id, .. }
            | ReapEvent::WouldDelete { id }
            | ReapEvent::Deleting { id }
            | ReapEvent::Deleted { id }
            | ReapEvent::DeleteFailed { id, .. }
            | ReapEvent::Cancelled { id } => Some(id),
        }
    }
}

impl fmt::Display for ReapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReapEvent::Listed { kind, count } => write!(f, "found {count} {kind} candidate(s)"),
            ReapEvent::Retained { id, reason } => write!(f, "{id} is in use ({reason})"),
            ReapEvent::Skipped { id, reason } => write!(f, "skipping {id}: {reason}"),
            ReapEvent::WouldDelete { id } => write!(f, "would delete {id}"),
            ReapEvent::Deleting { id } => write!(f, "deleting {id}..."),
            ReapEvent::Deleted { id } => write!(f, "done deleting {id}"),
            ReapEvent::DeleteFailed { id, reason } => write!(f, "failed deleting {id}: {reason}"),
            ReapEvent::Cancelled { id } => write!(f, "not deleting {id}: batch cancelled"),
        }
    }
}
