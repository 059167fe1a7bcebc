//! Transport seam between nodes.

use crate::bpdu::Bpdu;
use crate::error::Result;
use crate::transfer::TransferHop;
use crate::types::{BridgeId, TransferId, VlanId};
use async_trait::async_trait;

/// Delivers BPDUs and transfer messages to other nodes.
///
/// Implementations own addressing and timeouts. A timeout or connection
/// failure is reported as [`crate::MstpError::Transport`], the same as an
/// explicit remote error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `bpdu` for `vlan_id` to `to`, arriving on the port named `from`.
    async fn send_bpdu(&self, to: &BridgeId, from: &BridgeId, vlan_id: VlanId, bpdu: Bpdu)
        -> Result<()>;

    /// Hands a transfer hop to the next node of its path.
    async fn relay_hop(&self, to: &BridgeId, hop: TransferHop) -> Result<()>;

    /// Tells the source node its transfer reached the destination.
    async fn notify_complete(&self, to: &BridgeId, transfer_id: TransferId) -> Result<()>;

    /// Tells the source node its transfer failed on the way.
    async fn notify_failed(&self, to: &BridgeId, transfer_id: TransferId) -> Result<()>;
}
