//! Node Counters
//!
//! Lock-free aggregate counters, one set per node instance. The executing
//! engine is the single writer (batch-local counts flushed once per batch);
//! observability tooling reads concurrently through [`NodeCounters::snapshot`].
//! Counters only ever grow; reset happens by rebuilding the node.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Per-node aggregate counters
pub struct NodeCounters {
    processed: AtomicU64,
    dropped: AtomicU64,
    bad_route: AtomicU64,
    per_route: Box<[AtomicU64]>,
}

impl NodeCounters {
    /// Counters for `n_routes` real routes plus the drop sink
    pub fn new(n_routes: usize) -> Self {
        let per_route = (0..=n_routes).map(|_| AtomicU64::new(0)).collect();
        Self {
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            bad_route: AtomicU64::new(0),
            per_route,
        }
    }

    /// Packets that reached a real route
    #[inline(always)]
    pub fn add_processed(&self, delta: u64) {
        self.processed.fetch_add(delta, Ordering::Relaxed);
    }

    /// Packets sent to the drop sink
    #[inline(always)]
    pub fn add_dropped(&self, delta: u64) {
        self.dropped.fetch_add(delta, Ordering::Relaxed);
    }

    /// Decisions naming a route the fan-out table does not have
    #[inline(always)]
    pub fn add_bad_route(&self, delta: u64) {
        self.bad_route.fetch_add(delta, Ordering::Relaxed);
    }

    /// Packets enqueued to queue `slot` (the drop sink is the last slot)
    #[inline(always)]
    pub fn add_route(&self, slot: usize, delta: u64) {
        self.per_route[slot].fetch_add(delta, Ordering::Relaxed);
    }

    /// Point-in-time copy for observability readers
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            bad_route: self.bad_route.load(Ordering::Relaxed),
            per_route: self
                .per_route
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
        }
    }
}

/// Counters snapshot (non-atomic)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountersSnapshot {
    /// Packets that reached a real route
    pub processed: u64,
    /// Packets sent to the drop sink
    pub dropped: u64,
    /// Out-of-range route decisions degraded to drop
    pub bad_route: u64,
    /// Per-queue enqueue counts, drop sink last
    pub per_route: Vec<u64>,
}

impl CountersSnapshot {
    /// Every packet submitted ends up processed or dropped
    pub fn total(&self) -> u64 {
        self.processed + self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = NodeCounters::new(2);
        counters.add_processed(4);
        counters.add_dropped(1);
        counters.add_route(0, 3);
        counters.add_route(1, 1);
        counters.add_route(2, 1);

        let snap = counters.snapshot();
        assert_eq!(snap.processed, 4);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.total(), 5);
        assert_eq!(snap.per_route, vec![3, 1, 1]);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;

        let counters = Arc::new(NodeCounters::new(1));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let c = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.add_processed(1);
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(counters.snapshot().processed, 4000);
    }
}
