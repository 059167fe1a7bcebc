//! Bridge Protocol Data Units and their superiority order.

use crate::types::BridgeId;
use serde::{Deserialize, Serialize};

/// A bridge's statement of what it currently believes about the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bpdu {
    /// Bridge that produced this BPDU.
    pub sender_id: BridgeId,
    /// Root bridge the sender believes in.
    pub root_id: BridgeId,
    /// Sender's hop count to that root.
    pub cost: u32,
}

impl Bpdu {
    /// Creates a BPDU.
    pub fn new(sender_id: BridgeId, root_id: BridgeId, cost: u32) -> Self {
        Self {
            sender_id,
            root_id,
            cost,
        }
    }

    /// The candidate this BPDU offers once it has crossed one more link.
    pub fn one_hop_further(&self) -> Self {
        Self {
            sender_id: self.sender_id.clone(),
            root_id: self.root_id.clone(),
            cost: self.cost.saturating_add(1),
        }
    }

    fn priority(&self) -> (&BridgeId, u32, &BridgeId) {
        (&self.root_id, self.cost, &self.sender_id)
    }

    /// Returns true if `self` is strictly better than `other`.
    pub fn is_superior_to(&self, other: &Bpdu) -> bool {
        self.priority() < other.priority()
    }
}

/// Ranks two candidate BPDUs.
///
/// Lower root id wins, then lower cost, then lower sender id. A missing
/// `b` always loses.
pub fn superior(a: &Bpdu, b: Option<&Bpdu>) -> bool {
    match b {
        None => true,
        Some(b) => a.is_superior_to(b),
    }
}
