//! OpenVPE Dataplane - Vector Packet-dispatch Engine
//!
//! A single graph-node stage: accepts a batch of in-flight packet handles,
//! derives a classification key per packet, and fans each packet out to one
//! of a fixed set of downstream queues at wire rate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      DISPATCH NODE                           │
//! │                                                              │
//! │  batch ─▶ ┌───────────────────────────────┐                  │
//! │  [h0..hn] │  quad loop: prefetch +2/+3,   │   ┌───────────┐  │
//! │           │  speculative dual enqueue,    ├──▶│ route 0   │  │
//! │           │  classify, validate/reconcile │   ├───────────┤  │
//! │           ├───────────────────────────────┤   │ route 1   │  │
//! │           │  single-step tail             ├──▶│   ...     │  │
//! │           └──────────────┬────────────────┘   ├───────────┤  │
//! │                          │                    │ drop sink │  │
//! │              ┌───────────▼───────────┐        └───────────┘  │
//! │              │ counters + trace ring │                       │
//! │              └───────────────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Optimizations
//!
//! 1. **Run-to-Completion**: one invocation drains one batch, no yielding
//! 2. **Quad-Step Loop**: headers of packets 2 and 3 ahead are prefetched
//!    while the current pair is processed, hiding memory latency
//! 3. **Speculative Enqueue**: handles are written into the currently open
//!    destination segment before the route is known, then validated; the
//!    common case (same route as the previous packet) costs nothing
//! 4. **Pluggable Classification**: the routing policy is a [`Classifier`]
//!    injected at construction; the unroll/prefetch/trace scaffolding is
//!    shared by every node variant

#![warn(missing_docs)]

pub mod buffer;
pub mod classify;
pub mod dispatch;
pub mod queue;
pub mod stats;
pub mod trace;

pub use buffer::{BufferArena, Handle, PacketBuffer};
pub use classify::{ByteSum, Classifier, FieldSwitch, Passthrough, RollingHash};
pub use dispatch::{DispatchError, DispatchNode, NodeConfig};
pub use queue::{FrameQueue, QueueFanout};
pub use stats::{CountersSnapshot, NodeCounters};
pub use trace::{TraceRecord, TraceRing};

pub use vpe_common::RouteDecision;

/// Slots granted per frame of a downstream queue
pub const DEFAULT_FRAME_SIZE: usize = 64;

/// Largest header prefix a classifier may require
pub const MAX_HEADER_PREFIX: usize = buffer::BUFFER_SIZE;
