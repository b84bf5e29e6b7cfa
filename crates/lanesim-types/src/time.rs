//! Virtual simulation time.
//!
//! The core runs on a deterministic virtual clock, not the wall clock: a
//! boundary event is due at an absolute [`SimTime`], and travel legs and
//! processing windows are [`SimDuration`]s. Both are microsecond counts.
//! All arithmetic is checked -- overflow is reported to the caller rather
//! than wrapping silently.

use serde::{Deserialize, Serialize};

/// An absolute instant on the virtual clock, in microseconds since the
/// start of the simulation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SimTime(pub u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: Self = Self(0);

    /// Return the instant `duration` after this one, or `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, duration: SimDuration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(micros) => Some(Self(micros)),
            None => None,
        }
    }

    /// Return the raw microsecond count.
    pub const fn as_micros(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for SimTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "t+{}us", self.0)
    }
}

/// A span of virtual time, in microseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SimDuration(pub u64);

impl SimDuration {
    /// A zero-length span.
    pub const ZERO: Self = Self(0);

    /// Construct a span from whole milliseconds.
    ///
    /// Saturates at `u64::MAX` microseconds; configuration values are far
    /// below that range.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    /// Construct a span from raw microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Compute the time a traveller needs to cover `distance` units at
    /// `speed` units per second, rounded up to the next microsecond.
    ///
    /// Returns `None` if `speed` is zero or the intermediate product
    /// overflows.
    #[must_use]
    pub const fn for_travel(distance: u64, speed: u64) -> Option<Self> {
        if speed == 0 {
            return None;
        }
        // micros = ceil(distance * 1_000_000 / speed)
        let scaled = match distance.checked_mul(1_000_000) {
            Some(value) => value,
            None => return None,
        };
        let micros = scaled.div_ceil(speed);
        Some(Self(micros))
    }

    /// Return the raw microsecond count.
    pub const fn as_micros(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for SimDuration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}us", self.0)
    }
}
