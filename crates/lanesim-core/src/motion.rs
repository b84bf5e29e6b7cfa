//! Motion capability: timed boundary events over a virtual clock.
//!
//! The core never inspects interpolated positions. Travel is modeled as a
//! single timer per leg: the Motion capability converts a (distance,
//! speed) pair into a duration and fires a [`BoundaryEvent`] when the
//! traveller crosses the boundary. Processing windows are scheduled the
//! same way from an explicit duration.
//!
//! [`VirtualMotion`] is the provided implementation: a deterministic
//! virtual-time scheduler. A presentation layer animating real movement
//! would supply its own implementation and feed boundary crossings back
//! on its own clock; the simulation only sees the trait.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use lanesim_types::{RequestId, SimDuration, SimTime};

use crate::error::SimError;

/// A significant position crossing in a request's simulated travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BoundaryEvent {
    /// The request reached its target queue's boundary.
    ReachedQueue {
        /// The traveling request.
        request: RequestId,
    },
    /// The request reached its bound server's boundary.
    ReachedServer {
        /// The traveling request.
        request: RequestId,
    },
    /// The request reached the server's center; processing begins.
    ReachedServerCenter {
        /// The serving request.
        request: RequestId,
    },
    /// The fixed processing window elapsed.
    ProcessingComplete {
        /// The serving request.
        request: RequestId,
    },
}

impl BoundaryEvent {
    /// The request this event belongs to.
    pub const fn request(self) -> RequestId {
        match self {
            Self::ReachedQueue { request }
            | Self::ReachedServer { request }
            | Self::ReachedServerCenter { request }
            | Self::ProcessingComplete { request } => request,
        }
    }
}

/// Handle to a pending timer, usable to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// The capability the core uses to schedule timed transition callbacks.
pub trait Motion {
    /// Schedule `event` to fire after a travel leg of `distance` units at
    /// `speed` units per second (`duration = distance / speed`).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimeOverflow`] if the speed is zero or the due
    /// time does not fit the virtual clock.
    fn schedule_arrival(
        &mut self,
        event: BoundaryEvent,
        distance: u64,
        speed: u64,
    ) -> Result<TimerId, SimError>;

    /// Schedule `event` to fire after an explicit delay (processing
    /// windows).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimeOverflow`] if the due time does not fit
    /// the virtual clock.
    fn schedule_after(
        &mut self,
        event: BoundaryEvent,
        delay: SimDuration,
    ) -> Result<TimerId, SimError>;

    /// Revoke a pending timer. Unknown or already-fired timers are
    /// ignored.
    fn cancel(&mut self, timer: TimerId);

    /// The current virtual time.
    fn now(&self) -> SimTime;

    /// The due time of the earliest pending timer, if any.
    fn next_due(&self) -> Option<SimTime>;

    /// Fire the earliest pending timer: advance the clock to its due time
    /// and return the event. Returns `None` when nothing is pending.
    fn advance_next(&mut self) -> Option<(SimTime, BoundaryEvent)>;

    /// Advance the clock to `instant` without firing anything. Callers
    /// must first drain timers due at or before `instant`; moving the
    /// clock never travels backwards.
    fn advance_to(&mut self, instant: SimTime);
}

/// One pending timer in the virtual scheduler.
///
/// Ordered by `(due, sequence)`: timers due at the same instant fire in
/// scheduling order, which keeps runs deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Pending {
    due: SimTime,
    sequence: u64,
    timer: TimerId,
    event: BoundaryEvent,
}

/// Deterministic virtual-time scheduler.
#[derive(Debug, Default)]
pub struct VirtualMotion {
    now: SimTime,
    next_timer: u64,
    next_sequence: u64,
    heap: BinaryHeap<Reverse<Pending>>,
    cancelled: BTreeSet<TimerId>,
}

impl VirtualMotion {
    /// Create a scheduler at virtual time zero with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending (non-cancelled) timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.heap
            .iter()
            .filter(|entry| !self.cancelled.contains(&entry.0.timer))
            .count()
    }

    fn push(&mut self, event: BoundaryEvent, delay: SimDuration) -> Result<TimerId, SimError> {
        let due = self
            .now
            .checked_add(delay)
            .ok_or_else(|| SimError::TimeOverflow {
                context: format!("timer for {event:?}"),
            })?;
        let timer = TimerId(self.next_timer);
        self.next_timer = self.next_timer.wrapping_add(1);
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.heap.push(Reverse(Pending {
            due,
            sequence,
            timer,
            event,
        }));
        Ok(timer)
    }
}

impl Motion for VirtualMotion {
    fn schedule_arrival(
        &mut self,
        event: BoundaryEvent,
        distance: u64,
        speed: u64,
    ) -> Result<TimerId, SimError> {
        let delay =
            SimDuration::for_travel(distance, speed).ok_or_else(|| SimError::TimeOverflow {
                context: format!("travel of {distance} units at {speed} units/sec"),
            })?;
        self.push(event, delay)
    }

    fn schedule_after(
        &mut self,
        event: BoundaryEvent,
        delay: SimDuration,
    ) -> Result<TimerId, SimError> {
        self.push(event, delay)
    }

    fn cancel(&mut self, timer: TimerId) {
        self.cancelled.insert(timer);
    }

    fn now(&self) -> SimTime {
        self.now
    }

    fn next_due(&self) -> Option<SimTime> {
        self.heap
            .iter()
            .filter(|entry| !self.cancelled.contains(&entry.0.timer))
            .map(|entry| entry.0.due)
            .min()
    }

    fn advance_next(&mut self) -> Option<(SimTime, BoundaryEvent)> {
        while let Some(Reverse(pending)) = self.heap.pop() {
            if self.cancelled.remove(&pending.timer) {
                continue;
            }
            self.now = pending.due;
            return Some((pending.due, pending.event));
        }
        None
    }

    fn advance_to(&mut self, instant: SimTime) {
        if instant > self.now {
            self.now = instant;
        }
    }
}
