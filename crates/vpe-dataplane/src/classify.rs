//! Classifier Policies
//!
//! The routing decision is the only thing that differs between node
//! variants, so it is factored out behind the [`Classifier`] trait and
//! injected into the dispatch engine at construction. Policies must be pure
//! with respect to visible I/O: identical header bytes and length always
//! yield the same decision. The one allowed side effect is a policy-private
//! scratch buffer that retains computed values so simulated work is not
//! optimized away.

use std::hash::Hasher;

use twox_hash::XxHash64;
use vpe_common::RouteDecision;

use crate::buffer::PacketBuffer;

/// Per-packet routing policy
pub trait Classifier {
    /// Header bytes this policy reads. Packets shorter than this are
    /// dropped by the engine before `classify` is called.
    fn required_prefix(&self) -> usize;

    /// Map one packet's header view to a destination
    fn classify(&mut self, pkt: &PacketBuffer) -> RouteDecision;

    /// Policy name, for construction-time logging
    fn name(&self) -> &'static str;
}

// ============================================================================
// Field-switch: one fixed-offset byte selects the route
// ============================================================================

/// Dispatches on a single header byte: values `1..=fanout` map to routes
/// `0..fanout`, anything else drops. The classic protocol demultiplexer
/// (offset 12 is the first byte of an IPv4 source address).
pub struct FieldSwitch {
    offset: usize,
    fanout: u32,
}

impl FieldSwitch {
    /// Switch on the byte at `offset`, spreading across `fanout` routes
    pub fn new(offset: usize, fanout: u32) -> Self {
        Self { offset, fanout }
    }
}

impl Classifier for FieldSwitch {
    #[inline(always)]
    fn required_prefix(&self) -> usize {
        self.offset + 1
    }

    #[inline(always)]
    fn classify(&mut self, pkt: &PacketBuffer) -> RouteDecision {
        let key = pkt.data()[self.offset] as u32;
        if key >= 1 && key <= self.fanout {
            RouteDecision::Route(key - 1)
        } else {
            RouteDecision::Drop
        }
    }

    fn name(&self) -> &'static str {
        "field-switch"
    }
}

// ============================================================================
// Rolling hash: xxHash64 over a fixed window of 8-byte words
// ============================================================================

/// Default hash window, in 8-byte words
pub const DEFAULT_HASH_WORDS: usize = 150;

/// Hashes each of `words` consecutive 8-byte words from the start of the
/// header prefix with xxHash64, retaining every result in the scratch
/// buffer. Routing is fixed to the single continue route; short packets are
/// dropped by the engine's length gate.
pub struct RollingHash {
    words: usize,
    scratch: Vec<u64>,
}

impl RollingHash {
    /// Hash `words` consecutive 8-byte words per packet
    pub fn new(words: usize) -> Self {
        Self {
            words,
            scratch: vec![0; words],
        }
    }

    /// Retained hash results, one per word
    pub fn scratch(&self) -> &[u64] {
        &self.scratch
    }
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_WORDS)
    }
}

impl Classifier for RollingHash {
    #[inline(always)]
    fn required_prefix(&self) -> usize {
        self.words * 8
    }

    #[inline]
    fn classify(&mut self, pkt: &PacketBuffer) -> RouteDecision {
        let data = pkt.data();
        for i in 0..self.words {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(&data[i * 8..i * 8 + 8]);
            self.scratch[i] = hasher.finish();
        }
        RouteDecision::Route(0)
    }

    fn name(&self) -> &'static str {
        "rolling-hash"
    }
}

// ============================================================================
// Byte-sum: models downstream CPU cost, routing fixed
// ============================================================================

/// Trailer bytes excluded from the byte-sum window
pub const DEFAULT_SUM_TRAILER: usize = 16;

/// Sums every 8-byte word in `data[..current_length - trailer]` into the
/// scratch slot. Pure work simulation: the sum is retained but routing is
/// always the single continue route, whatever the packet holds.
pub struct ByteSum {
    trailer: usize,
    scratch: u64,
}

impl ByteSum {
    /// Sum all words up to `current_length - trailer`
    pub fn new(trailer: usize) -> Self {
        Self { trailer, scratch: 0 }
    }

    /// Last retained sum
    pub fn scratch(&self) -> u64 {
        self.scratch
    }
}

impl Default for ByteSum {
    fn default() -> Self {
        Self::new(DEFAULT_SUM_TRAILER)
    }
}

impl Classifier for ByteSum {
    #[inline(always)]
    fn required_prefix(&self) -> usize {
        0
    }

    #[inline]
    fn classify(&mut self, pkt: &PacketBuffer) -> RouteDecision {
        let data = pkt.data();
        let bound = data.len().saturating_sub(self.trailer);
        let mut sum = 0u64;
        let mut off = 0;
        while off + 8 <= bound {
            let mut word = [0u8; 8];
            word.copy_from_slice(&data[off..off + 8]);
            sum = sum.wrapping_add(u64::from_ne_bytes(word));
            off += 8;
        }
        self.scratch = sum;
        RouteDecision::Route(0)
    }

    fn name(&self) -> &'static str {
        "byte-sum"
    }
}

// ============================================================================
// Passthrough: fixed-edge chain stage
// ============================================================================

/// Forwards everything to the single next stage; models one hop of a
/// multi-stage pipeline of otherwise-identical nodes.
pub struct Passthrough;

impl Classifier for Passthrough {
    #[inline(always)]
    fn required_prefix(&self) -> usize {
        0
    }

    #[inline(always)]
    fn classify(&mut self, _pkt: &PacketBuffer) -> RouteDecision {
        RouteDecision::Route(0)
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferArena;

    #[test]
    fn test_field_switch_mapping() {
        let mut arena = BufferArena::with_capacity(1);
        let mut cls = FieldSwitch::new(0, 4);

        for (byte, expected) in [
            (1u8, RouteDecision::Route(0)),
            (2, RouteDecision::Route(1)),
            (3, RouteDecision::Route(2)),
            (4, RouteDecision::Route(3)),
            (0, RouteDecision::Drop),
            (9, RouteDecision::Drop),
            (255, RouteDecision::Drop),
        ] {
            arena.get_mut(0).fill(&[byte, 0xEE]);
            assert_eq!(cls.classify(arena.get(0)), expected, "byte {byte}");
        }
    }

    #[test]
    fn test_field_switch_offset() {
        let mut arena = BufferArena::with_capacity(1);
        // first byte of the source address in an IPv4 header
        let mut cls = FieldSwitch::new(12, 4);
        assert_eq!(cls.required_prefix(), 13);

        let mut hdr = [0u8; 20];
        hdr[12] = 3;
        arena.get_mut(0).fill(&hdr);
        assert_eq!(cls.classify(arena.get(0)), RouteDecision::Route(2));
    }

    #[test]
    fn test_rolling_hash_deterministic() {
        let mut arena = BufferArena::with_capacity(1);
        let mut cls = RollingHash::new(4);
        assert_eq!(cls.required_prefix(), 32);

        let payload: Vec<u8> = (0..64).collect();
        arena.get_mut(0).fill(&payload);

        assert_eq!(cls.classify(arena.get(0)), RouteDecision::Route(0));
        let first: Vec<u64> = cls.scratch().to_vec();
        assert_eq!(first.len(), 4);
        // distinct words hash to distinct values
        assert_ne!(first[0], first[1]);

        // identical input, identical retained hashes
        assert_eq!(cls.classify(arena.get(0)), RouteDecision::Route(0));
        assert_eq!(cls.scratch(), &first[..]);
    }

    #[test]
    fn test_byte_sum_value() {
        let mut arena = BufferArena::with_capacity(1);
        let mut cls = ByteSum::new(16);

        // 40 bytes: 24-byte window = 3 words
        let mut payload = [0u8; 40];
        payload[..8].copy_from_slice(&1u64.to_ne_bytes());
        payload[8..16].copy_from_slice(&2u64.to_ne_bytes());
        payload[16..24].copy_from_slice(&3u64.to_ne_bytes());
        arena.get_mut(0).fill(&payload);

        assert_eq!(cls.classify(arena.get(0)), RouteDecision::Route(0));
        assert_eq!(cls.scratch(), 6);
    }

    #[test]
    fn test_byte_sum_short_packet() {
        let mut arena = BufferArena::with_capacity(1);
        let mut cls = ByteSum::new(16);

        // shorter than the trailer: zero words summed, still continues
        arena.get_mut(0).fill(&[0xFF; 8]);
        assert_eq!(cls.classify(arena.get(0)), RouteDecision::Route(0));
        assert_eq!(cls.scratch(), 0);
    }

    #[test]
    fn test_passthrough() {
        let mut arena = BufferArena::with_capacity(1);
        arena.get_mut(0).fill(&[0xDE, 0xAD]);
        assert_eq!(Passthrough.classify(arena.get(0)), RouteDecision::Route(0));
        assert_eq!(Passthrough.required_prefix(), 0);
    }
}
