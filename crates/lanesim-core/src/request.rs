//! Request entity and lifecycle state machine.
//!
//! A request is born `Spawned`, is routed exactly once (to a queue or to a
//! server), travels, and ends in one of two terminal states: `Completed`
//! or `Dropped`. The state machine validates every transition -- an illegal
//! transition is a protocol bug in the caller and is returned as a typed
//! error, never silently applied.
//!
//! Admission asymmetry, by design:
//!
//! - Queue membership is decided at **routing time**. A request refused by
//!   a full queue still travels to the queue boundary and is dropped
//!   there, even if capacity has since freed up.
//! - Server occupancy is re-checked at **arrival time**, because two
//!   independently-routed requests may race for the same idle server; the
//!   second to arrive must be dropped.

use lanesim_types::{Priority, QueueId, RequestId, RequestState, ServerId};

use crate::error::SimError;

/// The destination a request was routed to, fixed at routing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Routed into a queue's admission buffer.
    Queue(QueueId),
    /// Routed directly to a server (no queue, or bypass).
    Server(ServerId),
}

/// A request flowing through the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    id: RequestId,
    priority: Priority,
    state: RequestState,
    /// Set exactly once, at routing time; never reassigned mid-flight.
    routed_to: Option<RouteTarget>,
    /// The server this request is currently bound for or held by. For
    /// direct/bypass sends this is fixed at routing time; for queued
    /// requests it is set when the queue dispatches them.
    bound_server: Option<ServerId>,
}

impl Request {
    /// Create a freshly spawned, unrouted request.
    pub const fn new(id: RequestId, priority: Priority) -> Self {
        Self {
            id,
            priority,
            state: RequestState::Spawned,
            routed_to: None,
            bound_server: None,
        }
    }

    /// The request's identifier (also its FIFO sequence key).
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// The request's priority class.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// The request's current lifecycle state.
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// The routing target fixed at routing time, if routed.
    pub const fn routed_to(&self) -> Option<RouteTarget> {
        self.routed_to
    }

    /// The server the request is currently bound for or held by.
    pub const fn bound_server(&self) -> Option<ServerId> {
        self.bound_server
    }

    /// Route this request to a queue. Legal only from `Spawned`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] if the request is not in
    /// `Spawned`, or [`SimError::ProtocolViolation`] if it was already
    /// routed.
    pub fn route_to_queue(&mut self, queue: QueueId) -> Result<(), SimError> {
        self.ensure_unrouted()?;
        self.set_state(RequestState::TravelingToQueue)?;
        self.routed_to = Some(RouteTarget::Queue(queue));
        Ok(())
    }

    /// Route this request straight to a server (direct send or bypass).
    /// Legal only from `Spawned`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] if the request is not in
    /// `Spawned`, or [`SimError::ProtocolViolation`] if it was already
    /// routed.
    pub fn route_to_server(&mut self, server: ServerId) -> Result<(), SimError> {
        self.ensure_unrouted()?;
        self.set_state(RequestState::TravelingToServer)?;
        self.routed_to = Some(RouteTarget::Server(server));
        self.bound_server = Some(server);
        Ok(())
    }

    /// Record physical arrival in the queue's slot. Legal only from
    /// `TravelingToQueue`, and only for a request whose admission decision
    /// was positive (the caller checks membership).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] on an illegal state.
    pub fn enter_queue(&mut self) -> Result<(), SimError> {
        self.set_state(RequestState::Queued)
    }

    /// Begin travel toward `server` after being dispatched by the owning
    /// queue. Legal from `Queued`, and from `TravelingToQueue` when
    /// dispatch overtakes a still-traveling entry.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] on an illegal state.
    pub fn dispatch_to_server(&mut self, server: ServerId) -> Result<(), SimError> {
        match self.state {
            RequestState::Queued | RequestState::TravelingToQueue => {
                self.state = RequestState::TravelingToServer;
                self.bound_server = Some(server);
                Ok(())
            }
            from => Err(SimError::InvalidTransition {
                request: self.id,
                from,
                to: RequestState::TravelingToServer,
            }),
        }
    }

    /// Enter the server's slot. Legal only from `TravelingToServer`; the
    /// caller must have verified the server was idle first.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] on an illegal state.
    pub fn begin_serving(&mut self) -> Result<(), SimError> {
        self.set_state(RequestState::Serving)
    }

    /// Finish processing. Legal only from `Serving`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] on an illegal state.
    pub fn complete(&mut self) -> Result<(), SimError> {
        self.set_state(RequestState::Completed)
    }

    /// Drop the request. Legal from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTransition`] if the request already
    /// reached a terminal state.
    pub fn drop_out(&mut self) -> Result<(), SimError> {
        self.set_state(RequestState::Dropped)
    }

    fn ensure_unrouted(&self) -> Result<(), SimError> {
        if self.routed_to.is_some() {
            return Err(SimError::ProtocolViolation {
                context: format!("request {} was already routed", self.id),
            });
        }
        Ok(())
    }

    fn set_state(&mut self, to: RequestState) -> Result<(), SimError> {
        if !transition_allowed(self.state, to) {
            return Err(SimError::InvalidTransition {
                request: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

/// The lifecycle transition table.
///
/// Each row is (from, to). Anything absent is illegal; terminal states
/// have no outgoing rows at all.
const fn transition_allowed(from: RequestState, to: RequestState) -> bool {
    use RequestState::{
        Completed, Dropped, Queued, Serving, Spawned, TravelingToQueue, TravelingToServer,
    };
    matches!(
        (from, to),
        (Spawned, TravelingToQueue | TravelingToServer | Dropped)
            | (TravelingToQueue, Queued | TravelingToServer | Dropped)
            | (Queued, TravelingToServer | Dropped)
            | (TravelingToServer, Serving | Dropped)
            | (Serving, Completed)
    )
}

/// Allocator for strictly increasing request sequence numbers.
///
/// The sequence is the FIFO tie-break key: for any two requests created in
/// order A then B, A's id is strictly smaller than B's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSequence {
    next: u64,
}

impl RequestSequence {
    /// Create a sequence starting at 0.
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate the next request id.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SequenceOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn allocate(&mut self) -> Result<RequestId, SimError> {
        let id = RequestId(self.next);
        self.next = self.next.checked_add(1).ok_or(SimError::SequenceOverflow)?;
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spawned(seq: u64) -> Request {
        Request::new(RequestId(seq), Priority::Normal)
    }

    #[test]
    fn new_request_is_spawned_and_unrouted() {
        let request = spawned(0);
        assert_eq!(request.state(), RequestState::Spawned);
        assert!(request.routed_to().is_none());
        assert!(request.bound_server().is_none());
    }

    #[test]
    fn queue_route_fixes_target() {
        let queue = QueueId::new();
        let mut request = spawned(0);
        request.route_to_queue(queue).unwrap();
        assert_eq!(request.state(), RequestState::TravelingToQueue);
        assert_eq!(request.routed_to(), Some(RouteTarget::Queue(queue)));
        // Not yet bound to any server.
        assert!(request.bound_server().is_none());
    }

    #[test]
    fn server_route_binds_server_immediately() {
        let server = ServerId::new();
        let mut request = spawned(0);
        request.route_to_server(server).unwrap();
        assert_eq!(request.state(), RequestState::TravelingToServer);
        assert_eq!(request.bound_server(), Some(server));
    }

    #[test]
    fn double_routing_is_a_protocol_violation() {
        let mut request = spawned(0);
        request.route_to_queue(QueueId::new()).unwrap();
        let result = request.dispatch_to_server(ServerId::new());
        assert!(result.is_ok()); // dispatch overtake is legal...
        let again = request.route_to_server(ServerId::new());
        // ...but a second *routing* call is not.
        assert!(matches!(again, Err(SimError::ProtocolViolation { .. })));
    }

    #[test]
    fn full_queue_lifecycle() {
        let queue = QueueId::new();
        let server = ServerId::new();
        let mut request = spawned(0);

        request.route_to_queue(queue).unwrap();
        request.enter_queue().unwrap();
        request.dispatch_to_server(server).unwrap();
        request.begin_serving().unwrap();
        request.complete().unwrap();

        assert_eq!(request.state(), RequestState::Completed);
        // The routing target is still the queue it was routed to.
        assert_eq!(request.routed_to(), Some(RouteTarget::Queue(queue)));
        assert_eq!(request.bound_server(), Some(server));
    }

    #[test]
    fn dispatch_overtakes_traveling_request() {
        let mut request = spawned(0);
        request.route_to_queue(QueueId::new()).unwrap();
        // Dispatched before physically arriving.
        request.dispatch_to_server(ServerId::new()).unwrap();
        assert_eq!(request.state(), RequestState::TravelingToServer);
    }

    #[test]
    fn drop_is_legal_from_every_nonterminal_state() {
        let mut at_spawn = spawned(0);
        assert!(at_spawn.drop_out().is_ok());

        let mut traveling = spawned(1);
        traveling.route_to_queue(QueueId::new()).unwrap();
        assert!(traveling.drop_out().is_ok());

        let mut queued = spawned(2);
        queued.route_to_queue(QueueId::new()).unwrap();
        queued.enter_queue().unwrap();
        assert!(queued.drop_out().is_ok());
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        let mut completed = spawned(0);
        completed.route_to_server(ServerId::new()).unwrap();
        completed.begin_serving().unwrap();
        completed.complete().unwrap();
        assert!(matches!(
            completed.drop_out(),
            Err(SimError::InvalidTransition { .. })
        ));

        let mut dropped = spawned(1);
        dropped.drop_out().unwrap();
        assert!(matches!(
            dropped.begin_serving(),
            Err(SimError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn serving_cannot_be_dropped() {
        // Once a request occupies the server slot it always completes;
        // there is no eviction path.
        let mut request = spawned(0);
        request.route_to_server(ServerId::new()).unwrap();
        request.begin_serving().unwrap();
        assert!(matches!(
            request.drop_out(),
            Err(SimError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn skipping_states_is_illegal() {
        let mut request = spawned(0);
        assert!(matches!(
            request.begin_serving(),
            Err(SimError::InvalidTransition { .. })
        ));
        assert!(matches!(
            request.enter_queue(),
            Err(SimError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn sequence_allocates_strictly_increasing_ids() {
        let mut sequence = RequestSequence::new();
        let first = sequence.allocate().unwrap();
        let second = sequence.allocate().unwrap();
        let third = sequence.allocate().unwrap();
        assert!(first < second && second < third);
        assert_eq!(first, RequestId(0));
        assert_eq!(third, RequestId(2));
    }
}
