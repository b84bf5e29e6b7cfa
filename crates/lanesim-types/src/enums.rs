//! Enumeration types for the lanesim queueing simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority class of a request.
///
/// The derived `Ord` is load-bearing: `High < Normal`, so sorting queue
/// entries by `(priority, sequence)` places high-priority requests first
/// while preserving arrival order within a class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Priority {
    /// Served before all normal-priority requests.
    High,
    /// The default class for ordinary traffic.
    #[default]
    Normal,
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a request.
///
/// Legal transitions:
///
/// ```text
/// Spawned -> TravelingToQueue | TravelingToServer | Dropped
/// TravelingToQueue -> Queued | TravelingToServer | Dropped
/// Queued -> TravelingToServer | Dropped
/// TravelingToServer -> Serving | Dropped
/// Serving -> Completed
/// ```
///
/// `Completed` and `Dropped` are terminal; the request is discarded on
/// entering either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    /// Created by a client, not yet routed.
    Spawned,
    /// En route to a queue; the admission decision was already made at
    /// routing time.
    TravelingToQueue,
    /// Physically arrived in a queue slot.
    Queued,
    /// En route to a server (directly, via bypass, or after dispatch).
    TravelingToServer,
    /// Occupying the server's single slot.
    Serving,
    /// Processing finished; terminal.
    Completed,
    /// Refused or evicted somewhere along the way; terminal.
    Dropped,
}

impl RequestState {
    /// Whether this state is terminal (no further transitions occur).
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Dropped)
    }
}

// ---------------------------------------------------------------------------
// Drop reasons
// ---------------------------------------------------------------------------

/// Why a request was dropped.
///
/// Drops are normal expected outcomes of the admission protocol, not
/// faults; the reason is carried on the drop notification so observers can
/// break statistics down by cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// The target queue was full when the routing decision was made. The
    /// drop fires at the queue boundary even if capacity freed up during
    /// travel -- admission is decided once, at routing time.
    QueueFull,
    /// The target server was occupied by a different request when this one
    /// reached its boundary.
    ServerBusy,
    /// The topology contained no queue and no server at routing time.
    NoRoute,
    /// The request's target lane was removed from the topology while the
    /// request was queued or in flight.
    LaneRemoved,
}

impl core::fmt::Display for DropReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::QueueFull => "queue full",
            Self::ServerBusy => "server busy",
            Self::NoRoute => "no route",
            Self::LaneRemoved => "lane removed",
        };
        write!(f, "{text}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_sorts_first() {
        assert!(Priority::High < Priority::Normal);
        let mut priorities = vec![Priority::Normal, Priority::High, Priority::Normal];
        priorities.sort();
        assert_eq!(priorities.first(), Some(&Priority::High));
    }

    #[test]
    fn terminal_states() {
        assert!(RequestState::Completed.is_terminal());
        assert!(RequestState::Dropped.is_terminal());
        assert!(!RequestState::Spawned.is_terminal());
        assert!(!RequestState::Queued.is_terminal());
        assert!(!RequestState::Serving.is_terminal());
    }

    #[test]
    fn drop_reason_serde_roundtrip() {
        let json = serde_json::to_string(&DropReason::ServerBusy).unwrap();
        let restored: DropReason = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, DropReason::ServerBusy);
    }
}
