//! OpenVPE Steering - Worker-queue steering ahead of the dispatch graph
//!
//! Assigns incoming packets to hardware worker queues before they ever reach
//! a dispatch node, so each node invocation only sees packets already bound
//! to one worker context. This runs in a different execution context than
//! the dataplane engine and deliberately shares nothing with it beyond the
//! [`RouteDecision`] vocabulary: pick a candidate queue pseudo-randomly from
//! a bounded range, check it against the table of live queues, and either
//! redirect or fall back.

#![warn(missing_docs)]

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use vpe_common::{RouteDecision, VpeError, VpeResult};

/// Slot count of the default steering table
pub const DEFAULT_QUEUE_SLOTS: usize = 64;

/// What to do when the picked target is the packet's own queue.
///
/// The observed behavior in the field was to drop such packets, which reads
/// as a driver workaround rather than intent; the policy is therefore an
/// explicit construction choice until product guidance settles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfSteer {
    /// Leave the packet on the queue it already occupies
    KeepLocal,
    /// Drop the packet (reproduces the observed behavior)
    Drop,
}

/// Fixed-size table of live worker queues
pub struct SteeringTable {
    slots: Vec<bool>,
}

impl SteeringTable {
    /// Table with `capacity` queue slots, all absent
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![false; capacity],
        }
    }

    /// Mark queue `id` as live
    pub fn register(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = true;
        }
    }

    /// Mark queue `id` as gone
    pub fn deregister(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = false;
        }
    }

    /// True while queue `id` is live
    #[inline(always)]
    pub fn contains(&self, id: u32) -> bool {
        self.slots.get(id as usize).copied().unwrap_or(false)
    }

    /// Slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Pseudo-random queue steerer with a live-queue existence check
pub struct QueueSteerer {
    table: SteeringTable,
    range: u32,
    policy: SelfSteer,
    rng: SmallRng,
    misses: u64,
}

impl QueueSteerer {
    /// Steerer picking targets in `0..range` against a default-sized table
    pub fn new(range: u32, policy: SelfSteer) -> VpeResult<Self> {
        Self::with_table(SteeringTable::new(DEFAULT_QUEUE_SLOTS), range, policy)
    }

    /// Steerer over a caller-built table
    pub fn with_table(table: SteeringTable, range: u32, policy: SelfSteer) -> VpeResult<Self> {
        if range == 0 {
            return Err(VpeError::Config("steering range must be non-zero".into()));
        }
        if range as usize > table.capacity() {
            return Err(VpeError::SteeringRange {
                range,
                capacity: table.capacity(),
            });
        }
        Ok(Self {
            table,
            range,
            policy,
            rng: SmallRng::from_entropy(),
            misses: 0,
        })
    }

    /// Deterministic RNG for reproducible tests
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Live-queue table
    pub fn table_mut(&mut self) -> &mut SteeringTable {
        &mut self.table
    }

    /// Steer one packet currently sitting on `own_queue`.
    ///
    /// A registered target redirects; an unregistered one drops (membership
    /// in the known queue set is the contract, not best-effort delivery).
    /// A target equal to `own_queue` resolves per the construction policy.
    pub fn steer(&mut self, own_queue: u32) -> RouteDecision {
        let target = self.rng.gen_range(0..self.range);

        if target == own_queue {
            return match self.policy {
                SelfSteer::KeepLocal => RouteDecision::Route(own_queue),
                SelfSteer::Drop => RouteDecision::Drop,
            };
        }

        if self.table.contains(target) {
            RouteDecision::Route(target)
        } else {
            self.misses += 1;
            tracing::trace!(target, own_queue, "steering target not registered");
            RouteDecision::Drop
        }
    }

    /// Picks that landed on an unregistered queue
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steerer_with_all_registered(range: u32) -> QueueSteerer {
        let mut table = SteeringTable::new(DEFAULT_QUEUE_SLOTS);
        for id in 0..range {
            table.register(id);
        }
        QueueSteerer::with_table(table, range, SelfSteer::KeepLocal)
            .unwrap()
            .seed(7)
    }

    #[test]
    fn test_targets_stay_in_range() {
        let mut steerer = steerer_with_all_registered(39);
        for _ in 0..1000 {
            match steerer.steer(u32::MAX) {
                RouteDecision::Route(id) => assert!(id < 39),
                RouteDecision::Drop => panic!("all queues registered"),
            }
        }
        assert_eq!(steerer.misses(), 0);
    }

    #[test]
    fn test_unregistered_target_drops() {
        let table = SteeringTable::new(8);
        let mut steerer = QueueSteerer::with_table(table, 8, SelfSteer::KeepLocal)
            .unwrap()
            .seed(7);

        // nothing registered: every off-queue pick misses
        let mut drops = 0;
        for _ in 0..100 {
            if steerer.steer(u32::MAX).is_drop() {
                drops += 1;
            }
        }
        assert_eq!(drops, 100);
        assert_eq!(steerer.misses(), 100);
    }

    #[test]
    fn test_self_steer_keep_local() {
        // range 1 forces every pick onto the packet's own queue
        let mut steerer = QueueSteerer::new(1, SelfSteer::KeepLocal).unwrap().seed(7);
        assert_eq!(steerer.steer(0), RouteDecision::Route(0));
        assert_eq!(steerer.misses(), 0);
    }

    #[test]
    fn test_self_steer_drop() {
        let mut steerer = QueueSteerer::new(1, SelfSteer::Drop).unwrap().seed(7);
        assert_eq!(steerer.steer(0), RouteDecision::Drop);
        // a self-target drop is a policy outcome, not a table miss
        assert_eq!(steerer.misses(), 0);
    }

    #[test]
    fn test_register_deregister() {
        let mut table = SteeringTable::new(4);
        table.register(2);
        assert!(table.contains(2));
        table.deregister(2);
        assert!(!table.contains(2));
        // out-of-table ids never register
        table.register(17);
        assert!(!table.contains(17));
    }

    #[test]
    fn test_construction_validation() {
        assert!(matches!(
            QueueSteerer::new(0, SelfSteer::KeepLocal),
            Err(VpeError::Config(_))
        ));
        assert!(matches!(
            QueueSteerer::new(DEFAULT_QUEUE_SLOTS as u32 + 1, SelfSteer::KeepLocal),
            Err(VpeError::SteeringRange { .. })
        ));
    }
}
