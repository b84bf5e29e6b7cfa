//! Type-safe identifier wrappers for simulation entities.
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. Lane-level entities
//! (queues, servers, clients) use UUID v7 (time-ordered) so log lines and
//! reports sort naturally by creation time.
//!
//! Requests are different: their identifier doubles as the FIFO tie-break
//! key inside a queue, so it must be *strictly* monotonically increasing in
//! creation order. UUID v7 only orders by millisecond timestamp, so
//! [`RequestId`] wraps a plain `u64` sequence number allocated by the core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a request queue.
    QueueId
}

define_id! {
    /// Unique identifier for a server.
    ServerId
}

define_id! {
    /// Unique identifier for a client (request generator).
    ClientId
}

/// Unique identifier for a request.
///
/// Allocated as a strictly increasing sequence number by the simulation.
/// Because allocation order is creation order, the raw value is also the
/// secondary sort key that gives FIFO ordering within a priority class --
/// an earlier request always has a strictly smaller `RequestId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Return the inner sequence number.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(seq: u64) -> Self {
        Self(seq)
    }
}
