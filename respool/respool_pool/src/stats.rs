//! Pool statistics and the telemetry hook.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// The pool operation that produced a telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolEvent {
    /// An acquisition finished, successfully or not
    Acquire,

    /// A handle was returned with its resource
    Release,

    /// A handle was retired
    Discard,

    /// Every borrowed handle was returned
    ReclaimAll,

    /// Every borrowed handle was retired
    DiscardAll,
}

/// Callback invoked after pool operations with a fresh snapshot.
///
/// Runs on the calling thread, outside the pool lock.
pub type TelemetryHook = Arc<dyn Fn(PoolEvent, &PoolStats) + Send + Sync>;

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool name
    pub name: String,

    /// Fixed capacity
    pub capacity: usize,

    /// Idle slots, constructed or not
    pub idle: usize,

    /// Idle slots holding a constructed resource
    pub ready: usize,

    /// Handles currently checked out
    pub borrowed: usize,

    /// Slots reserved by constructions in progress
    pub pending: usize,

    /// Successful factory calls
    pub created: u64,

    /// Successful acquisitions
    pub acquired: u64,

    /// Handles returned with their resource
    pub released: u64,

    /// Handles retired
    pub discarded: u64,

    /// Acquisitions that found no free slot in time
    pub exhausted: u64,

    /// Acquisitions that gave up after repeated factory failures
    pub connection_failures: u64,
}

impl PoolStats {
    /// Constructed resources currently alive, idle or borrowed.
    pub fn live(&self) -> usize {
        self.ready + self.borrowed
    }

    /// Fraction of capacity checked out, from 0.0 to 1.0.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.borrowed as f64 / self.capacity as f64
    }
}

/// Monotonic counters, readable without the pool lock.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) created: AtomicU64,
    pub(crate) acquired: AtomicU64,
    pub(crate) released: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) exhausted: AtomicU64,
    pub(crate) connection_failures: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.created = self.created.load(Ordering::Relaxed);
        stats.acquired = self.acquired.load(Ordering::Relaxed);
        stats.released = self.released.load(Ordering::Relaxed);
        stats.discarded = self.discarded.load(Ordering::Relaxed);
        stats.exhausted = self.exhausted.load(Ordering::Relaxed);
        stats.connection_failures = self.connection_failures.load(Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ready: usize, borrowed: usize) -> PoolStats {
        PoolStats {
            name: "db".into(),
            capacity: 4,
            idle: 4 - borrowed,
            ready,
            borrowed,
            pending: 0,
            created: 0,
            acquired: 0,
            released: 0,
            discarded: 0,
            exhausted: 0,
            connection_failures: 0,
        }
    }

    #[test]
    fn test_live_and_utilization() {
        let stats = snapshot(1, 2);
        assert_eq!(stats.live(), 3);
        assert!((stats.utilization() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counters_fill() {
        let counters = PoolCounters::default();
        PoolCounters::bump(&counters.created, 2);
        PoolCounters::bump(&counters.exhausted, 1);

        let mut stats = snapshot(0, 0);
        counters.fill(&mut stats);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.acquired, 0);
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let json = serde_json::to_string(&PoolEvent::ReclaimAll).unwrap();
        assert_eq!(json, "\"reclaim_all\"");
    }
}
