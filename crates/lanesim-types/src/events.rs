//! Lifecycle event payloads delivered to simulation observers.
//!
//! The core emits exactly one event per corresponding lifecycle transition:
//! a drop, a slot shift inside a queue, a server assignment, or a
//! completion. Observers (the presentation layer, the stats collector,
//! tests) receive these payloads; the core itself keeps no counters.

use serde::{Deserialize, Serialize};

use crate::enums::{DropReason, Priority};
use crate::ids::{QueueId, RequestId, ServerId};
use crate::time::SimTime;

/// A request reached a terminal `Dropped` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDropped {
    /// The dropped request.
    pub request: RequestId,
    /// The request's priority class.
    pub priority: Priority,
    /// Why the request was dropped.
    pub reason: DropReason,
    /// Virtual time of the drop.
    pub at: SimTime,
}

/// A queued request moved to a different slot.
///
/// Emitted once per affected entry: insertion ahead of an entry shifts it
/// one slot back, dispatch of the front entry shifts the remainder one
/// slot forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotShifted {
    /// The request whose slot changed.
    pub request: RequestId,
    /// The queue it sits in.
    pub queue: QueueId,
    /// The new 1-based slot position.
    pub new_position: usize,
    /// Virtual time of the shift.
    pub at: SimTime,
}

/// A request was assigned to a server's single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAssigned {
    /// The request now occupying the server.
    pub request: RequestId,
    /// The server it occupies.
    pub server: ServerId,
    /// Virtual time of the assignment.
    pub at: SimTime,
}

/// A request finished processing and reached `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCompleted {
    /// The completed request.
    pub request: RequestId,
    /// The request's priority class.
    pub priority: Priority,
    /// The server that processed it.
    pub server: ServerId,
    /// Virtual time of completion.
    pub at: SimTime,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dropped_event_serde_roundtrip() {
        let event = RequestDropped {
            request: RequestId(3),
            priority: Priority::Normal,
            reason: DropReason::QueueFull,
            at: SimTime(1_000),
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: RequestDropped = serde_json::from_str(&json).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn slot_shift_carries_one_based_position() {
        let event = SlotShifted {
            request: RequestId(1),
            queue: QueueId::new(),
            new_position: 2,
            at: SimTime::ZERO,
        };
        assert_eq!(event.new_position, 2);
    }
}
