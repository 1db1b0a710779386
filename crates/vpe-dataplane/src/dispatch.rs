//! Batch Dispatch Engine
//!
//! Drains one batch of packet handles per invocation, classifies each packet
//! with the injected policy, and fans handles out to the downstream queues
//! through the speculative-enqueue protocol.
//!
//! The hot loop keeps a single destination segment open (the queue the
//! previous packet went to) and writes each handle into it before the route
//! is known. When the classifier agrees (the common case for bursty
//! traffic), the write already sits in the right place; when it disagrees,
//! the reconcile step rewinds the speculative slot and re-enqueues without
//! ever dropping, duplicating, or reordering packets within a route.

use std::sync::Arc;

use thiserror::Error;

use vpe_common::RouteDecision;

use crate::buffer::{BufferArena, Handle};
use crate::classify::Classifier;
use crate::queue::QueueFanout;
use crate::stats::NodeCounters;
use crate::trace::{TraceRecord, TraceRing};
use crate::{DEFAULT_FRAME_SIZE, MAX_HEADER_PREFIX};

/// Node configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Real downstream routes (the drop sink is always added)
    pub n_routes: usize,
    /// Slots granted per downstream frame
    pub frame_size: usize,
    /// Node-wide trace switch; individual packets still need their sample
    /// flag set
    pub tracing: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            n_routes: 1,
            frame_size: DEFAULT_FRAME_SIZE,
            tracing: false,
        }
    }
}

/// Construction-time misconfiguration. Steady-state dispatch never fails;
/// every per-packet problem degrades to the drop sink instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A node needs at least one real route
    #[error("node requires at least one route")]
    NoRoutes,

    /// Frames must hold at least one slot
    #[error("frame size must be non-zero")]
    ZeroFrameSize,

    /// The classifier wants more header bytes than buffers can hold
    #[error("classifier requires {required} header bytes, buffer prefix holds {max}")]
    PrefixTooLong {
        /// Bytes the classifier asked for
        required: usize,
        /// Largest supported prefix
        max: usize,
    },
}

/// Destination segment currently accepting speculative writes.
/// `cursor` slots of the reservation hold validated-or-pending handles;
/// `room` slots remain.
#[derive(Clone, Copy)]
struct Segment {
    route: usize,
    cursor: usize,
    room: usize,
}

/// One dispatch node: engine + classifier + fan-out + counters
pub struct DispatchNode<C> {
    classifier: C,
    config: NodeConfig,
    fanout: QueueFanout,
    counters: Arc<NodeCounters>,
    /// Speculation hint: the route the last batch ended on
    cached_route: usize,
    /// Batch-local per-queue counts, flushed to `counters` once per batch
    route_counts: Vec<u64>,
}

impl<C: Classifier> DispatchNode<C> {
    /// Build a node, validating the configuration against the classifier
    pub fn new(config: NodeConfig, classifier: C) -> Result<Self, DispatchError> {
        if config.n_routes == 0 {
            return Err(DispatchError::NoRoutes);
        }
        if config.frame_size == 0 {
            return Err(DispatchError::ZeroFrameSize);
        }
        let required = classifier.required_prefix();
        if required > MAX_HEADER_PREFIX {
            return Err(DispatchError::PrefixTooLong {
                required,
                max: MAX_HEADER_PREFIX,
            });
        }

        tracing::debug!(
            classifier = classifier.name(),
            n_routes = config.n_routes,
            frame_size = config.frame_size,
            "dispatch node created"
        );

        Ok(Self {
            fanout: QueueFanout::new(config.n_routes, config.frame_size),
            counters: Arc::new(NodeCounters::new(config.n_routes)),
            cached_route: 0,
            route_counts: vec![0; config.n_routes + 1],
            classifier,
            config,
        })
    }

    /// Drain `batch`, enqueueing every handle to exactly one downstream
    /// queue. Returns the number of handles consumed, always equal to
    /// `batch.len()`.
    pub fn dispatch(
        &mut self,
        arena: &BufferArena,
        batch: &[Handle],
        trace: &mut TraceRing,
    ) -> usize {
        let n_total = batch.len();
        let required = self.classifier.required_prefix();
        let mut from = 0usize;

        let mut n_processed = 0u64;
        let mut n_dropped = 0u64;
        let mut n_bad_route = 0u64;
        for c in self.route_counts.iter_mut() {
            *c = 0;
        }

        while from < n_total {
            let mut seg = self.open_segment(self.cached_route, n_total - from);

            // Quad-step path: prefetch two packets ahead, process two per
            // iteration.
            while n_total - from >= 4 && seg.room >= 2 {
                arena.prefetch_header(batch[from + 2]);
                arena.prefetch_header(batch[from + 3]);

                let h0 = batch[from];
                let h1 = batch[from + 1];

                // speculatively enqueue h0 and h1 to the open segment
                self.put(&mut seg, h0);
                self.put(&mut seg, h1);
                from += 2;

                let s0 = self.decide(arena, h0, required, &mut n_bad_route);
                let s1 = self.decide(arena, h1, required, &mut n_bad_route);

                // verify speculative enqueues, maybe switch the segment
                let code = (s0 != seg.route) as u8 + 2 * (s1 != seg.route) as u8;
                match code {
                    0 => {}
                    1 => {
                        // pattern A B A: h1 slides into h0's slot
                        self.rewrite(&seg, seg.cursor - 2, h1);
                        self.unput(&mut seg, 1);
                        self.enqueue_lone(s0, h0);
                    }
                    2 => {
                        // pattern A A B
                        self.unput(&mut seg, 1);
                        self.enqueue_lone(s1, h1);
                    }
                    _ => {
                        // neither matched the open segment
                        self.unput(&mut seg, 2);
                        self.enqueue_lone(s0, h0);
                        self.enqueue_lone(s1, h1);
                        if s0 == s1 {
                            self.flush(&seg);
                            seg = self.open_segment(s0, n_total - from);
                        }
                    }
                }

                self.count(s0, &mut n_processed, &mut n_dropped);
                self.count(s1, &mut n_processed, &mut n_dropped);

                if self.config.tracing {
                    self.maybe_trace(arena, h0, s0, trace);
                    self.maybe_trace(arena, h1, s1, trace);
                }
            }

            // Single-step tail path
            while from < n_total && seg.room >= 1 {
                let h0 = batch[from];

                // speculatively enqueue h0 to the open segment
                self.put(&mut seg, h0);
                from += 1;

                let s0 = self.decide(arena, h0, required, &mut n_bad_route);

                // verify the speculative enqueue, maybe switch the segment
                if s0 != seg.route {
                    self.unput(&mut seg, 1);
                    self.flush(&seg);
                    seg = self.open_segment(s0, n_total - from + 1);
                    self.put(&mut seg, h0);
                }

                self.count(s0, &mut n_processed, &mut n_dropped);

                if self.config.tracing {
                    self.maybe_trace(arena, h0, s0, trace);
                }
            }

            self.flush(&seg);
        }

        self.counters.add_processed(n_processed);
        self.counters.add_dropped(n_dropped);
        if n_bad_route > 0 {
            self.counters.add_bad_route(n_bad_route);
        }
        for slot in 0..self.route_counts.len() {
            if self.route_counts[slot] > 0 {
                self.counters.add_route(slot, self.route_counts[slot]);
            }
        }

        n_total
    }

    /// Classify one packet down to a queue slot, applying the length gate
    /// before the classifier sees the packet.
    #[inline(always)]
    fn decide(
        &mut self,
        arena: &BufferArena,
        handle: Handle,
        required: usize,
        n_bad_route: &mut u64,
    ) -> usize {
        let pkt = arena.get(handle);
        let decision = if pkt.current_length() < required {
            RouteDecision::Drop
        } else {
            self.classifier.classify(pkt)
        };
        if let Some(id) = decision.route() {
            if id as usize >= self.fanout.n_routes() {
                *n_bad_route += 1;
            }
        }
        self.fanout.resolve(decision)
    }

    #[inline(always)]
    fn open_segment(&mut self, route: usize, want: usize) -> Segment {
        self.cached_route = route;
        let room = self.fanout.queue_mut(route).reserve(want);
        Segment {
            route,
            cursor: 0,
            room,
        }
    }

    #[inline(always)]
    fn put(&mut self, seg: &mut Segment, handle: Handle) {
        self.fanout.queue_mut(seg.route).write(seg.cursor, handle);
        seg.cursor += 1;
        seg.room -= 1;
    }

    #[inline(always)]
    fn unput(&mut self, seg: &mut Segment, n: usize) {
        seg.cursor -= n;
        seg.room += n;
    }

    #[inline(always)]
    fn rewrite(&mut self, seg: &Segment, slot: usize, handle: Handle) {
        self.fanout.queue_mut(seg.route).write(slot, handle);
    }

    #[inline(always)]
    fn flush(&mut self, seg: &Segment) {
        self.fanout.queue_mut(seg.route).commit(seg.cursor);
    }

    /// Enqueue one handle onto an arbitrary queue without disturbing the
    /// open segment (which never stages handles for that queue).
    #[inline]
    fn enqueue_lone(&mut self, slot: usize, handle: Handle) {
        let queue = self.fanout.queue_mut(slot);
        queue.reserve(1);
        queue.write(0, handle);
        queue.commit(1);
    }

    #[inline(always)]
    fn count(&mut self, slot: usize, n_processed: &mut u64, n_dropped: &mut u64) {
        self.route_counts[slot] += 1;
        if slot == self.fanout.drop_slot() {
            *n_dropped += 1;
        } else {
            *n_processed += 1;
        }
    }

    #[inline(always)]
    fn maybe_trace(&self, arena: &BufferArena, handle: Handle, slot: usize, trace: &mut TraceRing) {
        let pkt = arena.get(handle);
        if pkt.is_traced() {
            trace.push(TraceRecord::capture(pkt, slot as u32));
        }
    }

    /// Shared counter handle for observability readers
    pub fn counters(&self) -> Arc<NodeCounters> {
        self.counters.clone()
    }

    /// Downstream queue table
    pub fn fanout(&self) -> &QueueFanout {
        &self.fanout
    }

    /// Hand one queue's enqueued handles to the downstream consumer
    pub fn drain_route(&mut self, slot: usize) -> Vec<Handle> {
        self.fanout.queue_mut(slot).drain()
    }

    /// The injected policy (scratch-buffer inspection)
    pub fn classifier(&self) -> &C {
        &self.classifier
    }
}
