//! Route decisions
//!
//! A node classifies each packet to exactly one destination among a fixed
//! set of downstream routes, with one reserved drop sink. The same decision
//! type is shared by the dispatch engine and the worker-queue steering
//! component so both sides speak the same vocabulary.

use serde::{Deserialize, Serialize};

/// Destination verdict for one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteDecision {
    /// Forward to the downstream route with this id
    Route(u32),
    /// Send to the reserved drop sink
    Drop,
}

impl RouteDecision {
    /// Route id, if this decision forwards anywhere
    #[inline(always)]
    pub fn route(self) -> Option<u32> {
        match self {
            RouteDecision::Route(id) => Some(id),
            RouteDecision::Drop => None,
        }
    }

    /// True for the drop sink
    #[inline(always)]
    pub fn is_drop(self) -> bool {
        matches!(self, RouteDecision::Drop)
    }
}
