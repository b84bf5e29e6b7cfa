//! Seeded workload generation.
//!
//! The driver replaces the original interactive controls (a send button
//! and an auto-send timer) with a precomputed, reproducible send plan:
//! given a [`WorkloadConfig`], the same seed always produces the same
//! send instants and the same priority mix.

use lanesim_core::config::WorkloadConfig;
use lanesim_types::{Priority, SimDuration, SimTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One planned send: when, and with which priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSend {
    /// Virtual instant of the send.
    pub at: SimTime,
    /// Priority class of the sending client.
    pub priority: Priority,
}

/// Build the full send plan for a run.
///
/// Sends are spaced `interval_millis` apart plus a uniform random jitter
/// of up to `jitter_millis`; a `high_priority_percent` share is drawn
/// from the high-priority client. The plan is sorted by send time by
/// construction.
pub fn build_plan(config: &WorkloadConfig) -> Vec<PlannedSend> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut plan = Vec::with_capacity(usize::try_from(config.request_count).unwrap_or(0));
    let mut cursor = SimTime::ZERO;

    for _ in 0..config.request_count {
        let jitter = if config.jitter_millis == 0 {
            0
        } else {
            rng.random_range(0..=config.jitter_millis)
        };
        let gap = SimDuration::from_millis(config.interval_millis.saturating_add(jitter));
        cursor = cursor.checked_add(gap).unwrap_or(cursor);

        let priority = if rng.random_range(0..100u8) < config.high_priority_percent {
            Priority::High
        } else {
            Priority::Normal
        };
        plan.push(PlannedSend {
            at: cursor,
            priority,
        });
    }
    plan
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn workload(seed: u64) -> WorkloadConfig {
        WorkloadConfig {
            interval_millis: 100,
            jitter_millis: 50,
            request_count: 25,
            high_priority_percent: 40,
            seed,
        }
    }

    #[test]
    fn same_seed_same_plan() {
        let config = workload(7);
        assert_eq!(build_plan(&config), build_plan(&config));
    }

    #[test]
    fn different_seeds_diverge() {
        assert_ne!(build_plan(&workload(1)), build_plan(&workload(2)));
    }

    #[test]
    fn sends_are_time_ordered_and_spaced() {
        let plan = build_plan(&workload(3));
        assert_eq!(plan.len(), 25);
        let minimum_gap = SimDuration::from_millis(100);
        let mut previous = SimTime::ZERO;
        for send in plan {
            let gap = send.at.as_micros().saturating_sub(previous.as_micros());
            assert!(gap >= minimum_gap.as_micros());
            previous = send.at;
        }
    }

    #[test]
    fn zero_percent_is_all_normal_priority() {
        let mut config = workload(9);
        config.high_priority_percent = 0;
        assert!(build_plan(&config)
            .iter()
            .all(|send| send.priority == Priority::Normal));
    }

    #[test]
    fn hundred_percent_is_all_high_priority() {
        let mut config = workload(9);
        config.high_priority_percent = 100;
        assert!(build_plan(&config)
            .iter()
            .all(|send| send.priority == Priority::High));
    }

    #[test]
    fn no_jitter_means_fixed_cadence() {
        let mut config = workload(5);
        config.jitter_millis = 0;
        let plan = build_plan(&config);
        assert_eq!(plan.first().map(|s| s.at), Some(SimTime(100_000)));
        assert_eq!(plan.get(1).map(|s| s.at), Some(SimTime(200_000)));
    }
}
