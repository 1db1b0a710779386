//! Queue Fan-out
//!
//! Downstream queues speak a three-phase speculative-write protocol:
//! `reserve` a window of slots in the queue's current frame, `write` handles
//! into the window, `commit` however many of them turned out to belong
//! there. Room is granted one frame at a time; once a frame is committed
//! full, the next `reserve` opens a fresh frame, so a producer under
//! back-pressure finalizes and advances instead of blocking.

use vpe_common::RouteDecision;

use crate::buffer::Handle;

/// One downstream queue
pub struct FrameQueue {
    frame_size: usize,
    /// Committed handles, in arrival order
    handles: Vec<Handle>,
    /// Slots of the currently reserved window
    staged: Vec<Handle>,
}

impl FrameQueue {
    /// Queue granting `frame_size` slots per frame
    pub fn new(frame_size: usize) -> Self {
        debug_assert!(frame_size > 0);
        Self {
            frame_size,
            handles: Vec::new(),
            staged: Vec::with_capacity(frame_size),
        }
    }

    /// Open a write window. Returns the slot count available, bounded by
    /// both `want` and the slack left in the current frame. Any previous
    /// window must have been committed first.
    #[inline]
    pub fn reserve(&mut self, want: usize) -> usize {
        debug_assert!(self.staged.is_empty(), "reserve with an open window");
        let slack = self.frame_size - self.handles.len() % self.frame_size;
        let room = slack.min(want);
        self.staged.resize(room, 0);
        room
    }

    /// Write `handle` into `slot` of the open window
    #[inline(always)]
    pub fn write(&mut self, slot: usize, handle: Handle) {
        self.staged[slot] = handle;
    }

    /// Close the window, appending its first `count` slots in order
    #[inline]
    pub fn commit(&mut self, count: usize) {
        debug_assert!(count <= self.staged.len());
        self.handles.extend_from_slice(&self.staged[..count]);
        self.staged.clear();
    }

    /// Handles enqueued so far, in arrival order
    pub fn committed(&self) -> &[Handle] {
        &self.handles
    }

    /// Committed handle count
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True before the first commit
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Hand the committed handles to the downstream consumer
    pub fn drain(&mut self) -> Vec<Handle> {
        std::mem::take(&mut self.handles)
    }
}

/// Fixed table of downstream queues indexed by route id, with one reserved
/// drop sink at index `n_routes`
pub struct QueueFanout {
    queues: Vec<FrameQueue>,
    n_routes: usize,
}

impl QueueFanout {
    /// `n_routes` real routes plus the drop sink, each granting
    /// `frame_size` slots per frame
    pub fn new(n_routes: usize, frame_size: usize) -> Self {
        debug_assert!(n_routes > 0);
        let queues = (0..=n_routes).map(|_| FrameQueue::new(frame_size)).collect();
        Self { queues, n_routes }
    }

    /// Queue slot of the drop sink
    #[inline(always)]
    pub fn drop_slot(&self) -> usize {
        self.n_routes
    }

    /// Real route count (excluding the drop sink)
    pub fn n_routes(&self) -> usize {
        self.n_routes
    }

    /// Map a decision to a queue slot. Route ids beyond the table degrade
    /// to the drop sink; the caller accounts for them.
    #[inline(always)]
    pub fn resolve(&self, decision: RouteDecision) -> usize {
        match decision {
            RouteDecision::Route(id) if (id as usize) < self.n_routes => id as usize,
            _ => self.n_routes,
        }
    }

    /// Queue behind `slot` (a real route or the drop sink)
    #[inline(always)]
    pub fn queue_mut(&mut self, slot: usize) -> &mut FrameQueue {
        &mut self.queues[slot]
    }

    /// Read-only view of the queue behind `slot`
    #[inline(always)]
    pub fn queue(&self, slot: usize) -> &FrameQueue {
        &self.queues[slot]
    }
}
