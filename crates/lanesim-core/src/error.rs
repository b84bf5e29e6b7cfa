//! Error types for the lanesim-core crate.
//!
//! All operations that can fail return typed errors rather than panicking.
//! Drops and refusals are *not* errors -- they are modeled as explicit
//! outcomes of the admission protocol. Errors here mean a caller broke the
//! protocol, a referenced entity does not exist, or an ambient computation
//! (time arithmetic, configuration) failed.

use lanesim_types::{ClientId, QueueId, RequestId, ServerId};

/// Errors that can occur during simulation operations.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Request with the given ID was not found in the simulation.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// Queue with the given ID was not found in the topology.
    #[error("queue not found: {0}")]
    QueueNotFound(QueueId),

    /// Server with the given ID was not found in the topology.
    #[error("server not found: {0}")]
    ServerNotFound(ServerId),

    /// Client with the given ID was not found in the simulation.
    #[error("client not found: {0}")]
    ClientNotFound(ClientId),

    /// A caller violated the admission/dispatch protocol. This is a bug in
    /// the caller, not a recoverable runtime condition; it is surfaced
    /// loudly as an error instead of being silently absorbed.
    #[error("protocol violation: {context}")]
    ProtocolViolation {
        /// Description of the broken precondition.
        context: String,
    },

    /// A lifecycle transition was requested that the state machine does
    /// not permit.
    #[error("request {request} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The request whose transition was rejected.
        request: RequestId,
        /// The state it is currently in.
        from: lanesim_types::RequestState,
        /// The state the caller asked for.
        to: lanesim_types::RequestState,
    },

    /// The request sequence counter would overflow.
    #[error("request sequence overflow: cannot allocate beyond u64::MAX")]
    SequenceOverflow,

    /// Virtual-time arithmetic overflowed while scheduling a timer.
    #[error("virtual clock overflow while scheduling: {context}")]
    TimeOverflow {
        /// Description of what was being scheduled.
        context: String,
    },

    /// A lane operation hit a configured topology bound.
    #[error("topology bound reached: {context}")]
    TopologyBound {
        /// Which bound was hit.
        context: String,
    },
}
