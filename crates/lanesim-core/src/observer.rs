//! Observer seam for lifecycle notifications.
//!
//! The presentation layer (animation, statistics, tests) watches the
//! simulation through this trait. The core emits each notification exactly
//! once per corresponding transition and keeps no counters of its own.

use lanesim_types::{RequestCompleted, RequestDropped, ServerAssigned, SlotShifted};

/// Receiver of lifecycle notifications.
///
/// All methods default to no-ops so observers implement only what they
/// care about.
pub trait SimObserver {
    /// A request reached `Dropped`.
    fn on_dropped(&mut self, event: &RequestDropped) {
        let _ = event;
    }

    /// A queued request moved to a different slot.
    fn on_slot_shift(&mut self, event: &SlotShifted) {
        let _ = event;
    }

    /// A request was assigned to a server.
    fn on_server_assigned(&mut self, event: &ServerAssigned) {
        let _ = event;
    }

    /// A request finished processing.
    fn on_completed(&mut self, event: &RequestCompleted) {
        let _ = event;
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SimObserver for NullObserver {}

/// Observer that records every notification in order, for tests and
/// offline analysis.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    /// Drop notifications, in emission order.
    pub dropped: Vec<RequestDropped>,
    /// Slot-shift notifications, in emission order.
    pub shifts: Vec<SlotShifted>,
    /// Server-assignment notifications, in emission order.
    pub assigned: Vec<ServerAssigned>,
    /// Completion notifications, in emission order.
    pub completed: Vec<RequestCompleted>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimObserver for RecordingObserver {
    fn on_dropped(&mut self, event: &RequestDropped) {
        self.dropped.push(*event);
    }

    fn on_slot_shift(&mut self, event: &SlotShifted) {
        self.shifts.push(*event);
    }

    fn on_server_assigned(&mut self, event: &ServerAssigned) {
        self.assigned.push(*event);
    }

    fn on_completed(&mut self, event: &RequestCompleted) {
        self.completed.push(*event);
    }
}
