//! Run statistics collected from simulation notifications.
//!
//! The core keeps no counters; drop totals and rates are a presentation
//! concern. [`StatsObserver`] subscribes to the observer seam and counts,
//! and [`RunReport`] is the serializable summary the driver logs and
//! optionally writes as JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lanesim_core::observer::SimObserver;
use lanesim_types::{
    DropReason, RequestCompleted, RequestDropped, ServerAssigned, SimTime, SlotShifted,
};
use serde::Serialize;

/// Observer that tallies lifecycle notifications for the run summary.
#[derive(Debug, Clone, Default)]
pub struct StatsObserver {
    completed: u64,
    dropped: u64,
    dropped_by_reason: BTreeMap<DropReason, u64>,
    assignments: u64,
    slot_shifts: u64,
    last_event_at: SimTime,
}

impl StatsObserver {
    /// Create a zeroed collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total completed requests.
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Total dropped requests.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drop counts broken down by reason.
    pub const fn dropped_by_reason(&self) -> &BTreeMap<DropReason, u64> {
        &self.dropped_by_reason
    }

    /// Virtual time of the latest notification seen.
    pub const fn last_event_at(&self) -> SimTime {
        self.last_event_at
    }

    /// Build the final run report.
    ///
    /// `sent` is supplied by the driver (the observer never sees routing
    /// calls, only their outcomes); `ran_for` is the total virtual time
    /// the run covered.
    pub fn report(&self, sent: u64, ran_for: SimTime) -> RunReport {
        RunReport {
            generated_at: Utc::now(),
            sent,
            completed: self.completed,
            dropped: self.dropped,
            dropped_by_reason: self.dropped_by_reason.clone(),
            assignments: self.assignments,
            slot_shifts: self.slot_shifts,
            virtual_duration_micros: ran_for.as_micros(),
            drop_rate_hundredths_per_sec: drop_rate_hundredths(self.dropped, ran_for),
        }
    }

    fn bump_clock(&mut self, at: SimTime) {
        if at > self.last_event_at {
            self.last_event_at = at;
        }
    }
}

impl SimObserver for StatsObserver {
    fn on_dropped(&mut self, event: &RequestDropped) {
        self.dropped = self.dropped.saturating_add(1);
        let slot = self.dropped_by_reason.entry(event.reason).or_insert(0);
        *slot = slot.saturating_add(1);
        self.bump_clock(event.at);
    }

    fn on_slot_shift(&mut self, event: &SlotShifted) {
        self.slot_shifts = self.slot_shifts.saturating_add(1);
        self.bump_clock(event.at);
    }

    fn on_server_assigned(&mut self, event: &ServerAssigned) {
        self.assignments = self.assignments.saturating_add(1);
        self.bump_clock(event.at);
    }

    fn on_completed(&mut self, event: &RequestCompleted) {
        self.completed = self.completed.saturating_add(1);
        self.bump_clock(event.at);
    }
}

/// Serializable summary of one driver run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Wall-clock time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Requests sent by the workload.
    pub sent: u64,
    /// Requests that completed processing.
    pub completed: u64,
    /// Requests dropped anywhere along the protocol.
    pub dropped: u64,
    /// Drop counts by reason.
    pub dropped_by_reason: BTreeMap<DropReason, u64>,
    /// Server assignments (completions plus any in-flight at shutdown).
    pub assignments: u64,
    /// Slot-shift notifications emitted by queues.
    pub slot_shifts: u64,
    /// Total virtual time covered by the run, in microseconds.
    pub virtual_duration_micros: u64,
    /// Drop rate in hundredths of a drop per virtual second (integer to
    /// keep the report exact; divide by 100 for display).
    pub drop_rate_hundredths_per_sec: u64,
}

impl RunReport {
    /// Human-readable drop rate, e.g. `"0.25"` drops per second.
    pub fn drop_rate_display(&self) -> String {
        let whole = self.drop_rate_hundredths_per_sec.checked_div(100).unwrap_or(0);
        let fraction = self.drop_rate_hundredths_per_sec.checked_rem(100).unwrap_or(0);
        format!("{whole}.{fraction:02}")
    }
}

/// Drops per virtual second, in hundredths, computed with integer math.
fn drop_rate_hundredths(dropped: u64, ran_for: SimTime) -> u64 {
    let micros = ran_for.as_micros();
    if micros == 0 {
        return 0;
    }
    // hundredths/sec = dropped * 100 * 1_000_000 / micros
    dropped
        .saturating_mul(100_000_000)
        .checked_div(micros)
        .unwrap_or(0)
}
