//! Simulated transfer records and relay messages.

use crate::types::{BridgeId, TransferId, VlanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a transfer as seen by the node holding the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Source is relaying the first hop.
    Transferring,
    /// Intermediate node passed the transfer on.
    Forwarded,
    /// Destination confirmed the download.
    Done,
    /// A relay hop failed.
    Failed,
    /// No usable path to the destination.
    NoPath,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transferring => "transferring",
            Self::Forwarded => "forwarded",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::NoPath => "no_path",
        }
    }

    /// Returns true if no further status change is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::NoPath)
    }
}

/// A node's local view of one transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transfer_id: TransferId,
    pub status: TransferStatus,
    /// Full path, empty when none was found.
    pub path: Vec<BridgeId>,
    /// Index of the hop that last reached this node.
    pub hops: usize,
    pub vlan_id: VlanId,
    /// 0-100.
    pub progress: u8,
    pub src: BridgeId,
    pub dst: BridgeId,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Record created by the source when no path exists.
    pub fn no_path(transfer_id: TransferId, src: BridgeId, dst: BridgeId, vlan_id: VlanId) -> Self {
        Self {
            transfer_id,
            status: TransferStatus::NoPath,
            path: Vec::new(),
            hops: 0,
            vlan_id,
            progress: 0,
            src,
            dst,
            updated_at: Utc::now(),
        }
    }

    /// Record created by the source when a path was found.
    pub fn transferring(transfer_id: TransferId, path: Vec<BridgeId>, vlan_id: VlanId) -> Self {
        let src = path.first().cloned().unwrap_or_else(|| BridgeId::new(""));
        let dst = path.last().cloned().unwrap_or_else(|| BridgeId::new(""));
        Self {
            transfer_id,
            status: TransferStatus::Transferring,
            path,
            hops: 0,
            vlan_id,
            progress: 0,
            src,
            dst,
            updated_at: Utc::now(),
        }
    }

    /// Transient record held by an intermediate node.
    pub fn forwarded(hop: &TransferHop) -> Self {
        Self {
            transfer_id: hop.transfer_id,
            status: TransferStatus::Forwarded,
            path: hop.path.clone(),
            hops: hop.hops,
            vlan_id: hop.vlan_id,
            progress: hop.progress(),
            src: hop.src.clone(),
            dst: hop.dst.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Marks the record done. Returns false if it already was.
    pub fn mark_done(&mut self) -> bool {
        if self.status == TransferStatus::Done {
            return false;
        }
        self.status = TransferStatus::Done;
        self.progress = 100;
        self.updated_at = Utc::now();
        true
    }

    /// Marks the record failed unless it already succeeded.
    pub fn mark_failed(&mut self) -> bool {
        if self.status == TransferStatus::Done {
            return false;
        }
        self.status = TransferStatus::Failed;
        self.updated_at = Utc::now();
        true
    }
}

/// One relay step of a transfer, as sent from node to node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferHop {
    pub transfer_id: TransferId,
    pub src: BridgeId,
    pub dst: BridgeId,
    pub payload: String,
    pub file_size_mb: f64,
    pub vlan_id: VlanId,
    /// Index into `path` of the node receiving this hop.
    pub hops: usize,
    pub path: Vec<BridgeId>,
}

impl TransferHop {
    /// Percentage of the path covered once this hop has arrived.
    pub fn progress(&self) -> u8 {
        let segments = self.path.len().saturating_sub(1);
        if segments == 0 {
            return 100;
        }
        let percent = self.hops.min(segments) * 100 / segments;
        percent as u8
    }

    /// Node this hop should be forwarded to next.
    pub fn next_node(&self) -> Option<&BridgeId> {
        if self.hops + 1 >= self.path.len() {
            return None;
        }
        self.path.get(self.hops + 1)
    }

    /// The same transfer, advanced by one hop.
    pub fn advanced(&self) -> Self {
        Self {
            hops: self.hops + 1,
            ..self.clone()
        }
    }
}
