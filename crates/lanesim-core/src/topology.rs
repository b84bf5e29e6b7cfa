//! The topology query interface consulted during routing.
//!
//! The original design had clients scan a shared scene graph for queues
//! and servers, which made enumeration order an accident of scene
//! iteration. Here the topology is an explicit interface: implementations
//! expose queues and servers in **registration order**, and that order is
//! a declared contract -- it is the deterministic tie-break for the
//! least-busy queue selection. The view must be stable across a single
//! routing call.

use lanesim_types::{QueueId, ServerId};

/// Read-only view of the live queues and servers, as consulted by the
/// routing policy.
pub trait Topology {
    /// The registered queues, in registration order.
    fn queues(&self) -> &[QueueId];

    /// The registered servers, in registration order.
    fn servers(&self) -> &[ServerId];

    /// Number of admitted entries in `queue`, or `None` if the queue is
    /// not registered.
    fn queue_depth(&self, queue: QueueId) -> Option<usize>;

    /// Whether `queue` currently allows bypass, or `None` if the queue is
    /// not registered.
    fn can_bypass(&self, queue: QueueId) -> Option<bool>;

    /// The server paired with `queue`, or `None` if the queue is not
    /// registered or has no paired server.
    fn paired_server(&self, queue: QueueId) -> Option<ServerId>;
}
