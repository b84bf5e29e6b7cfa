//! Single-slot server resource.
//!
//! A server holds at most one request at a time. Deliberately, `accept`
//! enforces no exclusivity of its own: the boundary-event handler checks
//! `is_idle` and drops the loser of an arrival race, while internal
//! dispatch calls `accept` under protocol-guaranteed idleness. Pushing the
//! check into `accept` would break the second caller's contract.

use lanesim_types::{QueueId, RequestId, ServerId};

/// A single-slot processing resource, optionally paired with a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Server {
    id: ServerId,
    current_request: Option<RequestId>,
    paired_queue: Option<QueueId>,
    retired: bool,
}

impl Server {
    /// Create an idle server.
    pub const fn new(id: ServerId, paired_queue: Option<QueueId>) -> Self {
        Self {
            id,
            current_request: None,
            paired_queue,
            retired: false,
        }
    }

    /// The server's identifier.
    pub const fn id(&self) -> ServerId {
        self.id
    }

    /// The request currently occupying the slot, if any.
    pub const fn current_request(&self) -> Option<RequestId> {
        self.current_request
    }

    /// The paired queue, if any.
    pub const fn paired_queue(&self) -> Option<QueueId> {
        self.paired_queue
    }

    /// True iff no request occupies the slot.
    pub const fn is_idle(&self) -> bool {
        self.current_request.is_none()
    }

    /// Assign a request to the slot, unconditionally.
    ///
    /// Callers MUST check [`is_idle`](Self::is_idle) first and drop the
    /// request instead if the slot is taken; see the module docs for why
    /// the check lives at the call site.
    pub const fn accept(&mut self, request: RequestId) {
        self.current_request = Some(request);
    }

    /// Clear the slot, returning the request that held it.
    ///
    /// This is the state half of the release operation; the simulation
    /// completes it by asking the paired queue to dispatch its next entry.
    pub const fn clear(&mut self) -> Option<RequestId> {
        self.current_request.take()
    }

    /// Whether this server's lane was removed while it was busy. A retired
    /// server finishes its current request and is then discarded.
    pub const fn is_retired(&self) -> bool {
        self.retired
    }

    /// Mark the server as retired (its lane was removed mid-service).
    pub const fn retire(&mut self) {
        self.retired = true;
    }
}
