//! The simulation orchestrator.
//!
//! [`Simulation`] owns every live entity (requests, queues, servers,
//! clients), the request-sequence allocator, the Motion capability, and
//! the observer. It executes the single-threaded event loop: a routing
//! call, a boundary-event callback, or a server release runs to completion
//! before the next scheduled event fires, so queue and server state is
//! never mutated reentrantly.
//!
//! Topology changes (lane add/remove, client registration) also live
//! here: the simulation state holder doubles as the [`Topology`] view the
//! routing policy consults, exposing lanes in registration order.

use std::collections::BTreeMap;

use lanesim_types::{
    ClientId, DropReason, Priority, QueueId, RequestCompleted, RequestDropped, RequestId,
    RequestState, ServerAssigned, ServerId, SimDuration, SimTime, SlotShifted,
};
use tracing::{debug, info, warn};

use crate::client::{Client, RouteDecision};
use crate::config::{MotionConfig, SimConfig};
use crate::error::SimError;
use crate::motion::{BoundaryEvent, Motion, TimerId};
use crate::observer::SimObserver;
use crate::queue::RequestQueue;
use crate::request::{Request, RequestSequence, RouteTarget};
use crate::server::Server;
use crate::topology::Topology;

/// The single-flow queueing network simulation.
///
/// Generic over the Motion capability and the observer so tests, the
/// headless driver, and a real presentation layer can each supply their
/// own implementations.
#[derive(Debug)]
pub struct Simulation<M, O> {
    queue_capacity: usize,
    motion_config: MotionConfig,
    processing: SimDuration,
    max_lanes: usize,
    min_lanes: usize,

    motion: M,
    observer: O,

    sequence: RequestSequence,
    requests: BTreeMap<RequestId, Request>,
    queues: BTreeMap<QueueId, RequestQueue>,
    servers: BTreeMap<ServerId, Server>,
    clients: BTreeMap<ClientId, Client>,

    /// Queues in registration order: the declared topology enumeration.
    queue_order: Vec<QueueId>,
    /// Servers in registration order.
    server_order: Vec<ServerId>,
    /// Queue/server pairs in registration order; `remove_lane` pops the
    /// most recent.
    lanes: Vec<(QueueId, ServerId)>,

    /// Pending travel/processing timer per in-flight request.
    timers: BTreeMap<RequestId, TimerId>,
}

impl<M: Motion, O: SimObserver> Simulation<M, O> {
    /// Create an empty simulation from configuration. The topology starts
    /// bare; the caller registers lanes and clients.
    pub fn new(config: &SimConfig, motion: M, observer: O) -> Self {
        Self {
            queue_capacity: config.queue.capacity,
            motion_config: config.motion.clone(),
            processing: SimDuration::from_micros(config.processing.duration_micros),
            max_lanes: config.topology.max_lanes,
            min_lanes: config.topology.min_lanes,
            motion,
            observer,
            sequence: RequestSequence::new(),
            requests: BTreeMap::new(),
            queues: BTreeMap::new(),
            servers: BTreeMap::new(),
            clients: BTreeMap::new(),
            queue_order: Vec::new(),
            server_order: Vec::new(),
            lanes: Vec::new(),
            timers: BTreeMap::new(),
        }
    }

    // -----------------------------------------------------------------
    // Topology management
    // -----------------------------------------------------------------

    /// Register a client whose requests all carry `priority`.
    pub fn add_client(&mut self, priority: Priority) -> ClientId {
        let id = ClientId::new();
        self.clients.insert(id, Client::new(id, priority));
        info!(client = %id, ?priority, "client registered");
        id
    }

    /// Register a bare server with no paired queue. Requests reach it
    /// only via direct sends when no queues exist.
    pub fn add_server(&mut self) -> ServerId {
        let id = ServerId::new();
        self.servers.insert(id, Server::new(id, None));
        self.server_order.push(id);
        info!(server = %id, "server registered");
        id
    }

    /// Register a new lane: a queue and its paired server.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TopologyBound`] if the configured maximum lane
    /// count is already registered.
    pub fn add_lane(&mut self) -> Result<(QueueId, ServerId), SimError> {
        if self.lanes.len() >= self.max_lanes {
            return Err(SimError::TopologyBound {
                context: format!("max_lanes {} already registered", self.max_lanes),
            });
        }
        let queue_id = QueueId::new();
        let server_id = ServerId::new();
        self.servers
            .insert(server_id, Server::new(server_id, Some(queue_id)));
        self.queues.insert(
            queue_id,
            RequestQueue::new(queue_id, self.queue_capacity, Some(server_id)),
        );
        self.queue_order.push(queue_id);
        self.server_order.push(server_id);
        self.lanes.push((queue_id, server_id));
        info!(queue = %queue_id, server = %server_id, lanes = self.lanes.len(), "lane registered");
        Ok((queue_id, server_id))
    }

    /// Unregister the most recently added lane.
    ///
    /// Queued and in-flight requests bound for the lane are dropped with
    /// [`DropReason::LaneRemoved`]; their pending timers are cancelled. A
    /// server caught mid-service finishes its current request and is then
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TopologyBound`] if removing would go below the
    /// configured minimum lane count.
    pub fn remove_lane(&mut self) -> Result<(), SimError> {
        if self.lanes.len() <= self.min_lanes {
            return Err(SimError::TopologyBound {
                context: format!("min_lanes {} reached", self.min_lanes),
            });
        }
        let (queue_id, server_id) = self.lanes.pop().ok_or_else(|| SimError::TopologyBound {
            context: "no lanes registered".to_owned(),
        })?;
        self.queue_order.retain(|&queue| queue != queue_id);
        self.server_order.retain(|&server| server != server_id);

        let at = self.motion.now();
        let mut queue = self
            .queues
            .remove(&queue_id)
            .ok_or(SimError::QueueNotFound(queue_id))?;

        // Everything bound for this lane is doomed: admitted entries
        // (queued or still traveling), refused travelers, and requests in
        // flight to the server (bypass, direct, or dispatched).
        let mut doomed: Vec<RequestId> =
            queue.take_entries().into_iter().map(|e| e.request).collect();
        for (&id, request) in &self.requests {
            let to_this_queue = request.state() == RequestState::TravelingToQueue
                && matches!(request.routed_to(), Some(RouteTarget::Queue(q)) if q == queue_id);
            let to_this_server = request.state() == RequestState::TravelingToServer
                && request.bound_server() == Some(server_id);
            if (to_this_queue || to_this_server) && !doomed.contains(&id) {
                doomed.push(id);
            }
        }
        for request_id in doomed {
            self.drop_request(request_id, DropReason::LaneRemoved, at)?;
        }

        let serving = {
            let server = self
                .servers
                .get_mut(&server_id)
                .ok_or(SimError::ServerNotFound(server_id))?;
            if server.is_idle() {
                false
            } else {
                server.retire();
                true
            }
        };
        if !serving {
            self.servers.remove(&server_id);
        }
        info!(queue = %queue_id, server = %server_id, draining = serving, "lane removed");
        Ok(())
    }

    /// Number of registered lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    // -----------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------

    /// Create a request on behalf of `client` and route it.
    ///
    /// Routing runs synchronously: the admission decision (queue slot or
    /// bypass) is made here, at routing time. The returned id identifies
    /// the request in subsequent notifications even if it was dropped
    /// immediately for lack of a route.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ClientNotFound`] for an unknown client, or any
    /// scheduling/protocol error.
    pub fn send_request(&mut self, client: ClientId) -> Result<RequestId, SimError> {
        let sender = self
            .clients
            .get(&client)
            .copied()
            .ok_or(SimError::ClientNotFound(client))?;
        let decision = sender.decide(&*self);
        let request_id = self.sequence.allocate()?;
        let priority = sender.priority();
        let at = self.motion.now();
        let mut request = Request::new(request_id, priority);

        match decision {
            RouteDecision::NoRoute => {
                warn!(request = %request_id, "no queue or server in topology, dropping");
                request.drop_out()?;
                self.observer.on_dropped(&RequestDropped {
                    request: request_id,
                    priority,
                    reason: DropReason::NoRoute,
                    at,
                });
            }
            RouteDecision::Direct(server) => {
                request.route_to_server(server)?;
                self.requests.insert(request_id, request);
                debug!(request = %request_id, server = %server, "routed directly to server");
                self.schedule_travel(
                    request_id,
                    BoundaryEvent::ReachedServer {
                        request: request_id,
                    },
                    self.motion_config.spawn_to_server,
                )?;
            }
            RouteDecision::Bypass { queue, server } => {
                request.route_to_server(server)?;
                self.queues
                    .get_mut(&queue)
                    .ok_or(SimError::QueueNotFound(queue))?
                    .disable_bypass();
                self.requests.insert(request_id, request);
                debug!(request = %request_id, queue = %queue, server = %server, "bypassing queue");
                self.schedule_travel(
                    request_id,
                    BoundaryEvent::ReachedServer {
                        request: request_id,
                    },
                    self.motion_config.spawn_to_server,
                )?;
            }
            RouteDecision::Enqueue(queue) => {
                request.route_to_queue(queue)?;
                self.requests.insert(request_id, request);
                let (position, capacity) = {
                    let target = self
                        .queues
                        .get_mut(&queue)
                        .ok_or(SimError::QueueNotFound(queue))?;
                    (target.accept(priority, request_id), target.capacity())
                };
                if position <= capacity {
                    debug!(request = %request_id, queue = %queue, position, "admitted at routing time");
                    // Entries behind the insertion point shifted one slot
                    // back; 0-based index of the first one equals the
                    // inserted entry's 1-based position.
                    self.emit_shifts(queue, position, at)?;
                } else {
                    debug!(request = %request_id, queue = %queue, "queue full, will drop at boundary");
                }
                self.schedule_travel(
                    request_id,
                    BoundaryEvent::ReachedQueue {
                        request: request_id,
                    },
                    self.motion_config.spawn_to_queue,
                )?;
            }
        }
        Ok(request_id)
    }

    /// Dispatch the front entry of `queue` toward its paired server; on an
    /// empty queue this raises the bypass flag instead.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::QueueNotFound`] for an unknown queue, or a
    /// protocol error if the queue has entries but no paired server.
    pub fn dispatch_next(&mut self, queue: QueueId) -> Result<(), SimError> {
        let at = self.motion.now();
        self.dispatch_queue(queue, at)
    }

    /// Release `server`: clear its slot and ask its paired queue to
    /// dispatch the next entry. This is the sole path by which a queued
    /// request resumes travel.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ServerNotFound`] for an unknown server.
    pub fn release_server(&mut self, server: ServerId) -> Result<(), SimError> {
        let at = self.motion.now();
        self.release_server_at(server, at)
    }

    // -----------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------

    /// Fire the next due boundary event. Returns `false` when nothing is
    /// pending.
    ///
    /// # Errors
    ///
    /// Propagates any protocol error from the event handler.
    pub fn step(&mut self) -> Result<bool, SimError> {
        match self.motion.advance_next() {
            Some((at, event)) => {
                self.handle_boundary(at, event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run the event loop until no timers remain.
    ///
    /// # Errors
    ///
    /// Propagates the first handler error.
    pub fn run_until_idle(&mut self) -> Result<(), SimError> {
        while self.step()? {}
        Ok(())
    }

    /// Run all events due at or before `instant`, then advance the clock
    /// to exactly `instant`.
    ///
    /// # Errors
    ///
    /// Propagates the first handler error.
    pub fn run_until(&mut self, instant: SimTime) -> Result<(), SimError> {
        while let Some(due) = self.motion.next_due() {
            if due > instant {
                break;
            }
            self.step()?;
        }
        self.motion.advance_to(instant);
        Ok(())
    }

    /// The current virtual time.
    pub fn now(&self) -> SimTime {
        self.motion.now()
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    /// The lifecycle state of `request`, or `None` once it has been
    /// discarded (terminal states are not retained).
    pub fn request_state(&self, request: RequestId) -> Option<RequestState> {
        self.requests.get(&request).map(Request::state)
    }

    /// Read access to a queue.
    pub fn queue(&self, queue: QueueId) -> Option<&RequestQueue> {
        self.queues.get(&queue)
    }

    /// Read access to a server.
    pub fn server(&self, server: ServerId) -> Option<&Server> {
        self.servers.get(&server)
    }

    /// Number of live (non-terminal) requests.
    pub fn live_requests(&self) -> usize {
        self.requests.len()
    }

    /// Read access to the observer (e.g. to collect statistics).
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Consume the simulation and return the observer.
    pub fn into_observer(self) -> O {
        self.observer
    }

    // -----------------------------------------------------------------
    // Boundary-event handlers
    // -----------------------------------------------------------------

    fn handle_boundary(&mut self, at: SimTime, event: BoundaryEvent) -> Result<(), SimError> {
        match event {
            BoundaryEvent::ReachedQueue { request } => self.on_reached_queue(request, at),
            BoundaryEvent::ReachedServer { request } => self.on_reached_server(request, at),
            BoundaryEvent::ReachedServerCenter { request } => {
                self.on_reached_server_center(request, at)
            }
            BoundaryEvent::ProcessingComplete { request } => {
                self.on_processing_complete(request, at)
            }
        }
    }

    /// The request reached the queue boundary. Membership was decided at
    /// routing time: an admitted request takes its slot, a refused one is
    /// dropped here -- even if capacity has since freed up.
    fn on_reached_queue(&mut self, request_id: RequestId, at: SimTime) -> Result<(), SimError> {
        self.timers.remove(&request_id);
        let queue_id = {
            let request = self
                .requests
                .get(&request_id)
                .ok_or(SimError::RequestNotFound(request_id))?;
            match request.routed_to() {
                Some(RouteTarget::Queue(queue)) => queue,
                _ => {
                    return Err(SimError::ProtocolViolation {
                        context: format!("{request_id} reached a queue it was never routed to"),
                    });
                }
            }
        };
        let admitted = self
            .queues
            .get(&queue_id)
            .ok_or(SimError::QueueNotFound(queue_id))?
            .contains(request_id);
        if admitted {
            self.requests
                .get_mut(&request_id)
                .ok_or(SimError::RequestNotFound(request_id))?
                .enter_queue()?;
            debug!(request = %request_id, queue = %queue_id, "entered queue slot");
            Ok(())
        } else {
            warn!(request = %request_id, queue = %queue_id, "refused at routing time, dropping at boundary");
            self.drop_request(request_id, DropReason::QueueFull, at)
        }
    }

    /// The request reached the server boundary. Unlike queue admission,
    /// occupancy is re-checked here: two independently-routed requests may
    /// race for the same idle server, and the loser is dropped.
    fn on_reached_server(&mut self, request_id: RequestId, at: SimTime) -> Result<(), SimError> {
        self.timers.remove(&request_id);
        let server_id = {
            let request = self
                .requests
                .get(&request_id)
                .ok_or(SimError::RequestNotFound(request_id))?;
            request
                .bound_server()
                .ok_or_else(|| SimError::ProtocolViolation {
                    context: format!("{request_id} reached a server it was never bound to"),
                })?
        };
        let occupant = self
            .servers
            .get(&server_id)
            .ok_or(SimError::ServerNotFound(server_id))?
            .current_request();
        match occupant {
            None => {
                // Idleness verified; `accept` itself is unconditional by
                // contract and the check stays at this call site.
                self.servers
                    .get_mut(&server_id)
                    .ok_or(SimError::ServerNotFound(server_id))?
                    .accept(request_id);
                self.requests
                    .get_mut(&request_id)
                    .ok_or(SimError::RequestNotFound(request_id))?
                    .begin_serving()?;
                debug!(request = %request_id, server = %server_id, "assigned to server");
                self.observer.on_server_assigned(&ServerAssigned {
                    request: request_id,
                    server: server_id,
                    at,
                });
                self.schedule_travel(
                    request_id,
                    BoundaryEvent::ReachedServerCenter {
                        request: request_id,
                    },
                    self.motion_config.server_edge_to_center,
                )
            }
            Some(existing) if existing == request_id => Err(SimError::ProtocolViolation {
                context: format!("{request_id} arrived at a server it already occupies"),
            }),
            Some(existing) => {
                warn!(request = %request_id, server = %server_id, occupant = %existing, "server occupied, dropping");
                self.drop_request(request_id, DropReason::ServerBusy, at)
            }
        }
    }

    /// The request reached the server's center: start the fixed
    /// processing window.
    fn on_reached_server_center(
        &mut self,
        request_id: RequestId,
        _at: SimTime,
    ) -> Result<(), SimError> {
        self.timers.remove(&request_id);
        let state = self
            .requests
            .get(&request_id)
            .ok_or(SimError::RequestNotFound(request_id))?
            .state();
        if state != RequestState::Serving {
            return Err(SimError::ProtocolViolation {
                context: format!("{request_id} reached server center while {state:?}"),
            });
        }
        let timer = self.motion.schedule_after(
            BoundaryEvent::ProcessingComplete {
                request: request_id,
            },
            self.processing,
        )?;
        self.timers.insert(request_id, timer);
        Ok(())
    }

    /// Processing finished: complete the request, release the server, and
    /// let the paired queue dispatch its next entry.
    fn on_processing_complete(
        &mut self,
        request_id: RequestId,
        at: SimTime,
    ) -> Result<(), SimError> {
        self.timers.remove(&request_id);
        let (priority, server_id) = {
            let request = self
                .requests
                .get_mut(&request_id)
                .ok_or(SimError::RequestNotFound(request_id))?;
            request.complete()?;
            let server = request
                .bound_server()
                .ok_or_else(|| SimError::ProtocolViolation {
                    context: format!("{request_id} completed without a bound server"),
                })?;
            (request.priority(), server)
        };
        self.requests.remove(&request_id);
        debug!(request = %request_id, server = %server_id, "completed");
        self.observer.on_completed(&RequestCompleted {
            request: request_id,
            priority,
            server: server_id,
            at,
        });
        self.release_server_at(server_id, at)
    }

    // -----------------------------------------------------------------
    // Internal protocol steps
    // -----------------------------------------------------------------

    fn release_server_at(&mut self, server_id: ServerId, at: SimTime) -> Result<(), SimError> {
        let (paired_queue, retired) = {
            let server = self
                .servers
                .get_mut(&server_id)
                .ok_or(SimError::ServerNotFound(server_id))?;
            server.clear();
            (server.paired_queue(), server.is_retired())
        };
        if retired {
            // The lane was removed mid-service; the server leaves with
            // its last request.
            self.servers.remove(&server_id);
            return Ok(());
        }
        if let Some(queue_id) = paired_queue
            && self.queues.contains_key(&queue_id)
        {
            self.dispatch_queue(queue_id, at)?;
        }
        Ok(())
    }

    fn dispatch_queue(&mut self, queue_id: QueueId, at: SimTime) -> Result<(), SimError> {
        let (entry, server_id) = {
            let queue = self
                .queues
                .get_mut(&queue_id)
                .ok_or(SimError::QueueNotFound(queue_id))?;
            if queue.is_empty() {
                // No-op dispatch: the next arrival may bypass.
                queue.dispatch_next();
                debug!(queue = %queue_id, "empty dispatch, bypass enabled");
                return Ok(());
            }
            let server_id =
                queue
                    .paired_server()
                    .ok_or_else(|| SimError::ProtocolViolation {
                        context: format!("queue {queue_id} dispatched with no paired server"),
                    })?;
            let entry = queue
                .dispatch_next()
                .ok_or_else(|| SimError::ProtocolViolation {
                    context: format!("queue {queue_id} emptied during dispatch"),
                })?;
            (entry, server_id)
        };

        // Remaining entries all moved one slot forward.
        self.emit_shifts(queue_id, 0, at)?;

        // Dispatch may overtake a request still traveling to the queue;
        // its queue-boundary timer must not fire afterwards.
        let overtaken = self
            .requests
            .get(&entry.request)
            .ok_or(SimError::RequestNotFound(entry.request))?
            .state()
            == RequestState::TravelingToQueue;
        if overtaken && let Some(timer) = self.timers.remove(&entry.request) {
            self.motion.cancel(timer);
        }

        self.requests
            .get_mut(&entry.request)
            .ok_or(SimError::RequestNotFound(entry.request))?
            .dispatch_to_server(server_id)?;
        debug!(request = %entry.request, queue = %queue_id, server = %server_id, overtaken, "dispatched");
        self.schedule_travel(
            entry.request,
            BoundaryEvent::ReachedServer {
                request: entry.request,
            },
            self.motion_config.queue_to_server,
        )
    }

    /// Drop a request: terminal transition, exactly one notification,
    /// removal from the registry, and cancellation of any pending timer.
    fn drop_request(
        &mut self,
        request_id: RequestId,
        reason: DropReason,
        at: SimTime,
    ) -> Result<(), SimError> {
        let priority = {
            let request = self
                .requests
                .get_mut(&request_id)
                .ok_or(SimError::RequestNotFound(request_id))?;
            request.drop_out()?;
            request.priority()
        };
        self.requests.remove(&request_id);
        if let Some(timer) = self.timers.remove(&request_id) {
            self.motion.cancel(timer);
        }
        self.observer.on_dropped(&RequestDropped {
            request: request_id,
            priority,
            reason,
            at,
        });
        Ok(())
    }

    /// Notify every entry of `queue` from 0-based index `from` onward of
    /// its current 1-based position.
    fn emit_shifts(&mut self, queue_id: QueueId, from: usize, at: SimTime) -> Result<(), SimError> {
        let shifts: Vec<(RequestId, usize)> = {
            let queue = self
                .queues
                .get(&queue_id)
                .ok_or(SimError::QueueNotFound(queue_id))?;
            queue
                .entries()
                .iter()
                .enumerate()
                .skip(from)
                .map(|(index, entry)| (entry.request, index.saturating_add(1)))
                .collect()
        };
        for (request, new_position) in shifts {
            self.observer.on_slot_shift(&SlotShifted {
                request,
                queue: queue_id,
                new_position,
                at,
            });
        }
        Ok(())
    }

    fn schedule_travel(
        &mut self,
        request_id: RequestId,
        event: BoundaryEvent,
        distance: u64,
    ) -> Result<(), SimError> {
        let timer = self
            .motion
            .schedule_arrival(event, distance, self.motion_config.speed)?;
        self.timers.insert(request_id, timer);
        Ok(())
    }
}

impl<M: Motion, O: SimObserver> Topology for Simulation<M, O> {
    fn queues(&self) -> &[QueueId] {
        &self.queue_order
    }

    fn servers(&self) -> &[ServerId] {
        &self.server_order
    }

    fn queue_depth(&self, queue: QueueId) -> Option<usize> {
        self.queues.get(&queue).map(RequestQueue::len)
    }

    fn can_bypass(&self, queue: QueueId) -> Option<bool> {
        self.queues.get(&queue).map(RequestQueue::can_bypass)
    }

    fn paired_server(&self, queue: QueueId) -> Option<ServerId> {
        self.queues.get(&queue).and_then(RequestQueue::paired_server)
    }
}
