//! Client routing policy.
//!
//! A client stamps every request it spawns with its own fixed priority,
//! then picks a destination by consulting the topology:
//!
//! 1. No queues registered -> the first server, directly; no servers
//!    either -> no route (the request is dropped immediately).
//! 2. Otherwise, the first bypassable queue wins: the request goes
//!    straight to that queue's paired server.
//! 3. Otherwise, the queue with the fewest entries wins, ties broken by
//!    registration order.
//!
//! The policy is a pure function over the topology view; applying the
//! decision (including the bypass-flag side effect) is the simulation's
//! job, so the policy itself is trivially testable against fixture
//! topologies.

use lanesim_types::{ClientId, Priority, QueueId, ServerId};

use crate::topology::Topology;

/// A request generator with a fixed priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Client {
    id: ClientId,
    priority: Priority,
}

impl Client {
    /// Create a client. Every request it sends carries `priority`.
    pub const fn new(id: ClientId, priority: Priority) -> Self {
        Self { id, priority }
    }

    /// The client's identifier.
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// The priority applied to every request this client spawns.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Choose a destination for the next request.
    pub fn decide<T: Topology + ?Sized>(&self, topology: &T) -> RouteDecision {
        let queues = topology.queues();

        if queues.is_empty() {
            // No queues: send directly to a server if one exists.
            return topology
                .servers()
                .first()
                .copied()
                .map_or(RouteDecision::NoRoute, RouteDecision::Direct);
        }

        // First preference: a bypassable queue's paired server. Bypass
        // outranks least-busy even when another queue is empty. A
        // bypassable queue without a paired server cannot be bypassed
        // and is skipped.
        for &queue in queues {
            if topology.can_bypass(queue) == Some(true)
                && let Some(server) = topology.paired_server(queue)
            {
                return RouteDecision::Bypass { queue, server };
            }
        }

        // Second preference: the least-busy queue. Strict comparison
        // keeps the earliest-registered queue on ties, making the
        // enumeration order the declared tie-break.
        let mut best: Option<(QueueId, usize)> = None;
        for &queue in queues {
            let Some(depth) = topology.queue_depth(queue) else {
                continue;
            };
            match best {
                Some((_, best_depth)) if depth >= best_depth => {}
                _ => best = Some((queue, depth)),
            }
        }

        best.map_or(RouteDecision::NoRoute, |(queue, _)| {
            RouteDecision::Enqueue(queue)
        })
    }
}

/// The outcome of the routing policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Join this queue's admission buffer (travel to the queue).
    Enqueue(QueueId),
    /// Skip the queue and travel straight to its paired server. The
    /// simulation lowers the queue's bypass flag when applying this.
    Bypass {
        /// The queue being skipped.
        queue: QueueId,
        /// Its paired server, the travel destination.
        server: ServerId,
    },
    /// No queues exist; travel straight to this server.
    Direct(ServerId),
    /// Neither a queue nor a server exists; the request is dropped.
    NoRoute,
}
