//! Error types for MSTP operations.

use crate::types::{BridgeId, PortId, VlanId};
use thiserror::Error;

/// Result type alias for MSTP operations.
pub type Result<T> = std::result::Result<T, MstpError>;

/// Errors raised by the MSTP engine and node orchestrator.
#[derive(Debug, Clone, Error)]
pub enum MstpError {
    /// A BPDU arrived on a port that is not a member of the VLAN.
    #[error("Port {port} is not a member of VLAN {vlan_id}")]
    UnknownPort { vlan_id: VlanId, port: PortId },

    /// The next hop of a relay is not a neighbor of this node.
    #[error("Node {0} is not a neighbor")]
    UnknownNeighbor(BridgeId),

    /// The hop index does not address a node of the path.
    #[error("Invalid hop {hops} for path of length {path_len}")]
    InvalidHop { hops: usize, path_len: usize },

    /// Static topology is inconsistent.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// A call through the transport failed or timed out.
    #[error("Transport error towards {peer}: {message}")]
    Transport { peer: BridgeId, message: String },
}

impl MstpError {
    /// Creates a transport error.
    pub fn transport(peer: &BridgeId, message: impl Into<String>) -> Self {
        MstpError::Transport {
            peer: peer.clone(),
            message: message.into(),
        }
    }

    /// Returns true if the caller violated the API contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            MstpError::UnknownPort { .. } | MstpError::InvalidHop { .. }
        )
    }
}
