//! Node orchestrator: VLAN instances, advertisement loop and transfer relay.

use crate::bpdu::Bpdu;
use crate::error::{MstpError, Result};
use crate::path;
use crate::topology::Topology;
use crate::transfer::{TransferHop, TransferRecord};
use crate::transport::Transport;
use crate::types::{BridgeId, GlobalPortStates, PortId, PortRoles, TransferId, VlanId};
use crate::vlan::VlanInstance;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Node timing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Settling delay before the first advertisement round.
    pub initial_delay: Duration,
    /// Period between advertisement rounds.
    pub hello_interval: Duration,
    /// How long a transfer record survives after its last write.
    pub cleanup_delay: Duration,
    /// Simulated download rate in MB per second.
    pub transfer_rate_mbps: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(4),
            hello_interval: Duration::from_secs(2),
            cleanup_delay: Duration::from_secs(15),
            transfer_rate_mbps: 5.0,
        }
    }
}

impl NodeConfig {
    /// Simulated time to download `file_size_mb`.
    ///
    /// Sizes too large to represent saturate at [`Duration::MAX`]. Negative
    /// and NaN sizes take no time.
    pub fn download_delay(&self, file_size_mb: f64) -> Duration {
        let secs = file_size_mb / self.transfer_rate_mbps;
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay,
            Err(_) if secs > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }
}

/// Node counters.
#[derive(Debug, Default)]
pub struct NodeStats {
    bpdus_received: AtomicU64,
    bpdus_ignored: AtomicU64,
    bpdus_sent: AtomicU64,
    bpdu_send_failures: AtomicU64,
    transfers_initiated: AtomicU64,
    transfers_forwarded: AtomicU64,
    transfers_completed: AtomicU64,
    transfers_failed: AtomicU64,
    transfers_no_path: AtomicU64,
    records_expired: AtomicU64,
}

/// Point-in-time copy of [`NodeStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatsSnapshot {
    pub bpdus_received: u64,
    pub bpdus_ignored: u64,
    pub bpdus_sent: u64,
    pub bpdu_send_failures: u64,
    pub transfers_initiated: u64,
    pub transfers_forwarded: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_no_path: u64,
    pub records_expired: u64,
}

impl NodeStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NodeStatsSnapshot {
        NodeStatsSnapshot {
            bpdus_received: self.bpdus_received.load(Ordering::Relaxed),
            bpdus_ignored: self.bpdus_ignored.load(Ordering::Relaxed),
            bpdus_sent: self.bpdus_sent.load(Ordering::Relaxed),
            bpdu_send_failures: self.bpdu_send_failures.load(Ordering::Relaxed),
            transfers_initiated: self.transfers_initiated.load(Ordering::Relaxed),
            transfers_forwarded: self.transfers_forwarded.load(Ordering::Relaxed),
            transfers_completed: self.transfers_completed.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            transfers_no_path: self.transfers_no_path.load(Ordering::Relaxed),
            records_expired: self.records_expired.load(Ordering::Relaxed),
        }
    }
}

/// Everything a node reports through the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: BridgeId,
    pub vlans: BTreeMap<VlanId, PortRoles>,
    pub transfers: BTreeMap<TransferId, TransferRecord>,
    #[serde(default)]
    pub stats: NodeStatsSnapshot,
}

/// Registry entry. The revision changes on every write so a pending
/// cleanup can tell whether the record was touched after it was scheduled.
#[derive(Debug)]
struct TrackedRecord {
    record: TransferRecord,
    revision: u64,
}

/// A simulated bridge.
///
/// Owns one [`VlanInstance`] per configured VLAN and the local transfer
/// registry. Background work (advertisement loop, relays, cleanups) runs on
/// spawned tokio tasks that hold an `Arc` to the node, so most operations
/// take `self: &Arc<Self>`.
pub struct MstpNode {
    node_id: BridgeId,
    neighbors: Vec<BridgeId>,
    vlans: BTreeMap<VlanId, VlanInstance>,
    transfers: Mutex<HashMap<TransferId, TrackedRecord>>,
    revision: AtomicU64,
    transport: Arc<dyn Transport>,
    config: NodeConfig,
    stopped: AtomicBool,
    stats: NodeStats,
}

impl std::fmt::Debug for MstpNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MstpNode")
            .field("node_id", &self.node_id)
            .field("neighbors", &self.neighbors)
            .field("vlans", &self.vlans.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MstpNode {
    /// Creates the node `node_id` of `topology`, with one VLAN instance per
    /// configured VLAN scoped to the links of that VLAN touching this node.
    pub fn new(
        node_id: BridgeId,
        topology: &Topology,
        config: NodeConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>> {
        if !topology.contains_node(&node_id) {
            return Err(MstpError::InvalidTopology(format!(
                "node {} is not part of the topology",
                node_id
            )));
        }

        let neighbors = topology.neighbors_of(&node_id);
        let vlans = topology
            .vlan_ids()
            .into_iter()
            .map(|vlan_id| {
                let ports = topology.vlan_neighbors(&node_id, vlan_id);
                (vlan_id, VlanInstance::new(vlan_id, node_id.clone(), ports))
            })
            .collect::<BTreeMap<_, _>>();

        info!(
            "Node {} created with neighbors {:?} and VLANs {:?}",
            node_id,
            neighbors,
            vlans.keys().collect::<Vec<_>>()
        );

        Ok(Arc::new(Self {
            node_id,
            neighbors,
            vlans,
            transfers: Mutex::new(HashMap::new()),
            revision: AtomicU64::new(0),
            transport,
            config,
            stopped: AtomicBool::new(false),
            stats: NodeStats::default(),
        }))
    }

    pub fn node_id(&self) -> &BridgeId {
        &self.node_id
    }

    pub fn neighbors(&self) -> &[BridgeId] {
        &self.neighbors
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn vlan_ids(&self) -> Vec<VlanId> {
        self.vlans.keys().copied().collect()
    }

    pub fn vlan(&self, vlan_id: VlanId) -> Option<&VlanInstance> {
        self.vlans.get(&vlan_id)
    }

    // ---- Control plane ----

    /// Spawns the periodic advertisement task.
    ///
    /// The first round runs after `initial_delay`, then one round every
    /// `hello_interval` until [`MstpNode::stop`] is called.
    pub fn start_advertisement_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(node.config.initial_delay).await;
            while !node.is_stopped() {
                node.advertise_once().await;
                tokio::time::sleep(node.config.hello_interval).await;
            }
            info!("Advertisement loop of {} stopped", node.node_id);
        })
    }

    /// Sends every VLAN's current advertisement to the VLAN's member
    /// neighbors. Failures are counted and dropped.
    ///
    /// Returns the number of BPDUs delivered.
    pub async fn advertise_once(&self) -> usize {
        let mut delivered = 0;

        for (vlan_id, vlan) in &self.vlans {
            let bpdu = vlan.advertisement();
            for port in vlan.ports() {
                match self
                    .transport
                    .send_bpdu(port, &self.node_id, *vlan_id, bpdu.clone())
                    .await
                {
                    Ok(()) => {
                        NodeStats::bump(&self.stats.bpdus_sent);
                        delivered += 1;
                    }
                    Err(e) => {
                        NodeStats::bump(&self.stats.bpdu_send_failures);
                        debug!("BPDU for VLAN {} to {} dropped: {}", vlan_id, port, e);
                    }
                }
            }
        }

        delivered
    }

    /// Stops the advertisement loop after its current round.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Routes a received BPDU to its VLAN instance.
    ///
    /// BPDUs for VLANs this node does not carry are ignored. A BPDU on a
    /// port outside the VLAN is rejected.
    pub fn on_bpdu(&self, vlan_id: VlanId, port: &PortId, bpdu: Bpdu) -> Result<()> {
        let Some(vlan) = self.vlans.get(&vlan_id) else {
            debug!("Ignoring BPDU from {} for unknown VLAN {}", port, vlan_id);
            NodeStats::bump(&self.stats.bpdus_ignored);
            return Ok(());
        };

        vlan.on_bpdu(port, bpdu)?;
        NodeStats::bump(&self.stats.bpdus_received);
        Ok(())
    }

    pub fn port_roles(&self, vlan_id: VlanId) -> Option<PortRoles> {
        self.vlans.get(&vlan_id).map(VlanInstance::port_roles)
    }

    /// Port roles of every local VLAN.
    pub fn all_port_roles(&self) -> BTreeMap<VlanId, PortRoles> {
        self.vlans
            .iter()
            .map(|(vlan_id, vlan)| (*vlan_id, vlan.port_roles()))
            .collect()
    }

    // ---- Data plane ----

    /// Shortest path from this node to `dst` over `snapshot`.
    pub fn find_path(
        &self,
        dst: &BridgeId,
        vlan_id: VlanId,
        snapshot: &GlobalPortStates,
    ) -> Option<Vec<BridgeId>> {
        path::find_path(&self.node_id, dst, vlan_id, snapshot)
    }

    /// Starts a transfer to `dst` and returns its id.
    ///
    /// The outcome is only visible through the transfer registry: the
    /// record is `no_path` when no path of at least two nodes exists,
    /// otherwise `transferring` until the first hop is sent or fails.
    #[instrument(skip(self, payload, snapshot), fields(src = %self.node_id))]
    pub fn initiate_transfer(
        self: &Arc<Self>,
        dst: BridgeId,
        payload: String,
        file_size_mb: f64,
        vlan_id: VlanId,
        snapshot: &GlobalPortStates,
    ) -> TransferId {
        let transfer_id = TransferId::new_v4();

        let path = self
            .find_path(&dst, vlan_id, snapshot)
            .filter(|path| path.len() >= 2);
        let Some(path) = path else {
            info!("Transfer {} to {} on VLAN {}: no path", transfer_id, dst, vlan_id);
            NodeStats::bump(&self.stats.transfers_no_path);
            let revision = self.insert_record(TransferRecord::no_path(
                transfer_id,
                self.node_id.clone(),
                dst,
                vlan_id,
            ));
            self.schedule_cleanup(transfer_id, revision);
            return transfer_id;
        };

        info!("Transfer {} to {} via {:?}", transfer_id, dst, path);
        NodeStats::bump(&self.stats.transfers_initiated);
        self.insert_record(TransferRecord::transferring(
            transfer_id,
            path.clone(),
            vlan_id,
        ));

        let hop = TransferHop {
            transfer_id,
            src: self.node_id.clone(),
            dst,
            payload,
            file_size_mb,
            vlan_id,
            hops: 1,
            path,
        };

        let node = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = node.send_first_hop(hop).await {
                warn!("Transfer {} failed at source: {}", transfer_id, e);
                node.mark_failed(transfer_id);
            }
        });

        transfer_id
    }

    async fn send_first_hop(&self, hop: TransferHop) -> Result<()> {
        let next = hop
            .path
            .get(hop.hops)
            .cloned()
            .ok_or_else(|| MstpError::InvalidHop {
                hops: hop.hops,
                path_len: hop.path.len(),
            })?;
        if !self.neighbors.contains(&next) {
            return Err(MstpError::UnknownNeighbor(next));
        }
        self.transport.relay_hop(&next, hop).await
    }

    /// Handles a relay hop arriving at this node.
    ///
    /// The destination simulates the download and then notifies the
    /// source. An intermediate node records `forwarded` and passes the hop
    /// on, failing locally when the next hop is unusable and notifying the
    /// source when the forward itself fails.
    #[instrument(skip(self, hop), fields(node = %self.node_id, transfer_id = %hop.transfer_id, hops = hop.hops))]
    pub fn on_transfer_hop(self: &Arc<Self>, hop: TransferHop) {
        if hop.dst == self.node_id {
            let delay = self.config.download_delay(hop.file_size_mb);
            debug!("Destination reached, simulating {:?} download", delay);
            let node = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                node.notify_source_complete(&hop).await;
            });
            return;
        }

        NodeStats::bump(&self.stats.transfers_forwarded);
        let revision = self.insert_record(TransferRecord::forwarded(&hop));
        self.schedule_cleanup(hop.transfer_id, revision);

        let next = match hop.next_node() {
            None => Err(MstpError::InvalidHop {
                hops: hop.hops,
                path_len: hop.path.len(),
            }),
            Some(next) if !self.neighbors.contains(next) => {
                Err(MstpError::UnknownNeighbor(next.clone()))
            }
            Some(next) => Ok(next.clone()),
        };

        let next = match next {
            Ok(next) => next,
            Err(e) => {
                warn!("Cannot forward: {}", e);
                self.mark_failed(hop.transfer_id);
                return;
            }
        };

        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.forward_hop(next, hop).await;
        });
    }

    async fn forward_hop(self: Arc<Self>, next: BridgeId, hop: TransferHop) {
        let transfer_id = hop.transfer_id;
        let src = hop.src.clone();

        if let Err(e) = self.transport.relay_hop(&next, hop.advanced()).await {
            warn!("Forward of {} to {} failed: {}", transfer_id, next, e);
            self.mark_failed(transfer_id);
            if let Err(e) = self.transport.notify_failed(&src, transfer_id).await {
                warn!("Could not report failure of {} to {}: {}", transfer_id, src, e);
            }
        }
    }

    async fn notify_source_complete(&self, hop: &TransferHop) {
        info!("Transfer {} delivered at {}", hop.transfer_id, self.node_id);
        if let Err(e) = self
            .transport
            .notify_complete(&hop.src, hop.transfer_id)
            .await
        {
            warn!(
                "Could not report completion of {} to {}: {}",
                hop.transfer_id, hop.src, e
            );
        }
    }

    /// Marks a local transfer done. Returns false if it is unknown or
    /// already done.
    pub fn complete_transfer(self: &Arc<Self>, transfer_id: TransferId) -> bool {
        let changed = self.update_record(transfer_id, TransferRecord::mark_done);
        if changed {
            info!("Transfer {} completed", transfer_id);
            NodeStats::bump(&self.stats.transfers_completed);
        } else {
            debug!("Completion of {} ignored", transfer_id);
        }
        changed
    }

    /// Marks a local transfer failed. A transfer already done stays done.
    pub fn fail_transfer(self: &Arc<Self>, transfer_id: TransferId) -> bool {
        let changed = self.mark_failed(transfer_id);
        if !changed {
            debug!("Failure of {} ignored", transfer_id);
        }
        changed
    }

    fn mark_failed(self: &Arc<Self>, transfer_id: TransferId) -> bool {
        let changed = self.update_record(transfer_id, TransferRecord::mark_failed);
        if changed {
            NodeStats::bump(&self.stats.transfers_failed);
        }
        changed
    }

    pub fn transfer(&self, transfer_id: TransferId) -> Option<TransferRecord> {
        self.transfers
            .lock()
            .get(&transfer_id)
            .map(|tracked| tracked.record.clone())
    }

    /// Copy of the local transfer registry.
    pub fn snapshot_transfers(&self) -> BTreeMap<TransferId, TransferRecord> {
        self.transfers
            .lock()
            .iter()
            .map(|(id, tracked)| (*id, tracked.record.clone()))
            .collect()
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.node_id.clone(),
            vlans: self.all_port_roles(),
            transfers: self.snapshot_transfers(),
            stats: self.stats.snapshot(),
        }
    }

    // ---- Registry ----

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed)
    }

    /// Stores `record` without scheduling its removal. An in-flight
    /// `transferring` record lives until it turns terminal.
    fn insert_record(&self, record: TransferRecord) -> u64 {
        let transfer_id = record.transfer_id;
        let revision = self.next_revision();
        self.transfers
            .lock()
            .insert(transfer_id, TrackedRecord { record, revision });
        revision
    }

    fn update_record(
        self: &Arc<Self>,
        transfer_id: TransferId,
        update: impl FnOnce(&mut TransferRecord) -> bool,
    ) -> bool {
        let revision = {
            let mut transfers = self.transfers.lock();
            let Some(tracked) = transfers.get_mut(&transfer_id) else {
                return false;
            };
            if !update(&mut tracked.record) {
                return false;
            }
            tracked.revision = self.next_revision();
            tracked.revision
        };
        self.schedule_cleanup(transfer_id, revision);
        true
    }

    /// Removes the record `cleanup_delay` from now unless it is written
    /// again in the meantime.
    fn schedule_cleanup(self: &Arc<Self>, transfer_id: TransferId, revision: u64) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(node.config.cleanup_delay).await;
            let mut transfers = node.transfers.lock();
            if transfers
                .get(&transfer_id)
                .is_some_and(|tracked| tracked.revision == revision)
            {
                transfers.remove(&transfer_id);
                NodeStats::bump(&node.stats.records_expired);
                debug!("Transfer record {} expired", transfer_id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferStatus;
    use crate::types::PortRole;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Bpdu {
            to: BridgeId,
            vlan_id: VlanId,
            bpdu: Bpdu,
        },
        Hop {
            to: BridgeId,
            hop: TransferHop,
        },
        Complete {
            to: BridgeId,
            transfer_id: TransferId,
        },
        Failed {
            to: BridgeId,
            transfer_id: TransferId,
        },
    }

    /// Records every outbound call. Calls of the failing kinds are
    /// recorded too, then answered with an error.
    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<Sent>>,
        fail_bpdus: bool,
        fail_relays: bool,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn record(&self, sent: Sent, fail: bool, to: &BridgeId) -> Result<()> {
            self.sent.lock().unwrap().push(sent);
            if fail {
                Err(MstpError::transport(to, "connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_bpdu(
            &self,
            to: &BridgeId,
            _from: &BridgeId,
            vlan_id: VlanId,
            bpdu: Bpdu,
        ) -> Result<()> {
            let sent = Sent::Bpdu {
                to: to.clone(),
                vlan_id,
                bpdu,
            };
            self.record(sent, self.fail_bpdus, to)
        }

        async fn relay_hop(&self, to: &BridgeId, hop: TransferHop) -> Result<()> {
            let sent = Sent::Hop { to: to.clone(), hop };
            self.record(sent, self.fail_relays, to)
        }

        async fn notify_complete(&self, to: &BridgeId, transfer_id: TransferId) -> Result<()> {
            let sent = Sent::Complete {
                to: to.clone(),
                transfer_id,
            };
            self.record(sent, false, to)
        }

        async fn notify_failed(&self, to: &BridgeId, transfer_id: TransferId) -> Result<()> {
            let sent = Sent::Failed {
                to: to.clone(),
                transfer_id,
            };
            self.record(sent, false, to)
        }
    }

    fn id(s: &str) -> BridgeId {
        BridgeId::from(s)
    }

    fn node_with(name: &str, transport: RecordingTransport) -> (Arc<MstpNode>, Arc<RecordingTransport>) {
        let transport = Arc::new(transport);
        let node = MstpNode::new(
            id(name),
            &Topology::triangle(),
            NodeConfig::default(),
            transport.clone(),
        )
        .unwrap();
        (node, transport)
    }

    fn node(name: &str) -> (Arc<MstpNode>, Arc<RecordingTransport>) {
        node_with(name, RecordingTransport::default())
    }

    /// Triangle on VLAN 10 with the A-C link blocked at both ends.
    fn ring_snapshot() -> GlobalPortStates {
        use PortRole::*;
        let entries: [(&str, [(&str, PortRole); 2]); 3] = [
            ("A", [("B", Designated), ("C", Blocked)]),
            ("B", [("A", Root), ("C", Designated)]),
            ("C", [("B", Root), ("A", Blocked)]),
        ];
        entries
            .into_iter()
            .map(|(node, roles)| {
                let roles = roles.into_iter().map(|(p, r)| (id(p), r)).collect();
                (id(node), BTreeMap::from([(10, roles)]))
            })
            .collect()
    }

    fn hop(hops: usize, path: &[&str], file_size_mb: f64) -> TransferHop {
        TransferHop {
            transfer_id: TransferId::new_v4(),
            src: id(path[0]),
            dst: id(path[path.len() - 1]),
            payload: "data".to_string(),
            file_size_mb,
            vlan_id: 10,
            hops,
            path: path.iter().map(|s| id(s)).collect(),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_download_delay() {
        let config = NodeConfig::default();
        assert_eq!(config.download_delay(10.0), Duration::from_secs(2));
        assert_eq!(config.download_delay(0.0), Duration::ZERO);
        assert_eq!(config.download_delay(-1.0), Duration::ZERO);
        assert_eq!(config.download_delay(f64::NAN), Duration::ZERO);
        assert_eq!(config.download_delay(1e300), Duration::MAX);
    }

    #[tokio::test]
    async fn test_rejects_node_outside_topology() {
        let result = MstpNode::new(
            id("Z"),
            &Topology::triangle(),
            NodeConfig::default(),
            Arc::new(RecordingTransport::default()),
        );
        assert!(matches!(result, Err(MstpError::InvalidTopology(_))));
    }

    #[tokio::test]
    async fn test_builds_one_instance_per_vlan() {
        let (node, _) = node("B");
        assert_eq!(node.vlan_ids(), vec![10, 20]);
        assert_eq!(node.vlan(10).unwrap().ports(), &[id("A"), id("C")]);
        assert_eq!(node.port_roles(99), None);
    }

    #[tokio::test]
    async fn test_unknown_vlan_bpdu_is_ignored() {
        let (node, _) = node("B");
        let before = node.all_port_roles();
        node.on_bpdu(99, &id("A"), Bpdu::new(id("A"), id("A"), 0))
            .unwrap();
        assert_eq!(node.all_port_roles(), before);
        let stats = node.stats().snapshot();
        assert_eq!(stats.bpdus_received, 0);
        assert_eq!(stats.bpdus_ignored, 1);
    }

    #[tokio::test]
    async fn test_bpdu_routed_to_vlan_only() {
        let (node, _) = node("B");
        node.on_bpdu(10, &id("A"), Bpdu::new(id("A"), id("A"), 0))
            .unwrap();

        assert_eq!(node.port_roles(10).unwrap()[&id("A")], PortRole::Root);
        assert_eq!(node.port_roles(20).unwrap()[&id("A")], PortRole::Designated);
    }

    #[tokio::test]
    async fn test_bpdu_on_non_member_port_rejected() {
        let (node, _) = node("B");
        let err = node
            .on_bpdu(10, &id("Z"), Bpdu::new(id("Z"), id("A"), 0))
            .unwrap_err();
        assert!(matches!(err, MstpError::UnknownPort { vlan_id: 10, .. }));
        assert_eq!(node.stats().snapshot().bpdus_received, 0);
    }

    #[tokio::test]
    async fn test_advertise_once_reaches_vlan_members() {
        let (node, transport) = node("A");
        assert_eq!(node.advertise_once().await, 4);

        let sent = transport.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent.contains(&Sent::Bpdu {
            to: id("C"),
            vlan_id: 20,
            bpdu: Bpdu::new(id("A"), id("A"), 0),
        }));
        assert_eq!(node.stats().snapshot().bpdus_sent, 4);
    }

    #[tokio::test]
    async fn test_advertise_failures_are_swallowed() {
        let (node, transport) = node_with(
            "A",
            RecordingTransport {
                fail_bpdus: true,
                ..Default::default()
            },
        );
        assert_eq!(node.advertise_once().await, 0);
        assert_eq!(transport.sent().len(), 4);
        assert_eq!(node.stats().snapshot().bpdu_send_failures, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_advertisement_loop_timing_and_stop() {
        let (node, transport) = node("A");
        let handle = node.start_advertisement_loop();

        tokio::time::sleep(Duration::from_millis(3900)).await;
        assert!(transport.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.sent().len(), 4);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.sent().len(), 8);

        node.stop();
        handle.await.unwrap();
        assert_eq!(transport.sent().len(), 8);
    }

    #[test]
    fn test_find_path_from_self() {
        let (node, _) = node("A");
        assert_eq!(
            node.find_path(&id("C"), 10, &ring_snapshot()),
            Some(vec![id("A"), id("B"), id("C")])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_transfer_is_no_path_and_expires() {
        let (node, transport) = node("A");
        let transfer_id = node.initiate_transfer(id("A"), "x".into(), 1.0, 10, &ring_snapshot());

        let record = node.transfer(transfer_id).unwrap();
        assert_eq!(record.status, TransferStatus::NoPath);
        assert!(record.path.is_empty());

        tokio::time::sleep(Duration::from_millis(14_900)).await;
        assert!(node.transfer(transfer_id).is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(node.transfer(transfer_id).is_none());
        assert!(transport.sent().is_empty());
        assert_eq!(node.stats().snapshot().records_expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_snapshot_is_no_path() {
        let (node, _) = node("A");
        let transfer_id =
            node.initiate_transfer(id("C"), "x".into(), 1.0, 10, &GlobalPortStates::new());
        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::NoPath
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initiate_sends_first_hop() {
        let (node, transport) = node("A");
        let transfer_id =
            node.initiate_transfer(id("C"), "payload".into(), 10.0, 10, &ring_snapshot());

        let record = node.transfer(transfer_id).unwrap();
        assert_eq!(record.status, TransferStatus::Transferring);
        assert_eq!(record.hops, 0);
        assert_eq!(record.path, vec![id("A"), id("B"), id("C")]);

        settle().await;
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Hop { to, hop } = &sent[0] else {
            panic!("expected a relay hop, got {:?}", sent[0]);
        };
        assert_eq!(to, &id("B"));
        assert_eq!(hop.hops, 1);
        assert_eq!(hop.src, id("A"));
        assert_eq!(hop.file_size_mb, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_hop_failure_marks_failed() {
        let (node, _) = node_with(
            "A",
            RecordingTransport {
                fail_relays: true,
                ..Default::default()
            },
        );
        let transfer_id = node.initiate_transfer(id("C"), "x".into(), 1.0, 10, &ring_snapshot());

        settle().await;
        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_destination_waits_for_download_then_notifies_source() {
        let (node, transport) = node("C");
        let hop = hop(2, &["A", "B", "C"], 10.0);
        let transfer_id = hop.transfer_id;
        node.on_transfer_hop(hop);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(transport.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            transport.sent(),
            vec![Sent::Complete {
                to: id("A"),
                transfer_id
            }]
        );
        assert!(node.transfer(transfer_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermediate_records_progress_and_forwards() {
        let (node, transport) = node("B");
        let hop = hop(1, &["A", "B", "C"], 1.0);
        let transfer_id = hop.transfer_id;
        node.on_transfer_hop(hop);

        let record = node.transfer(transfer_id).unwrap();
        assert_eq!(record.status, TransferStatus::Forwarded);
        assert_eq!(record.hops, 1);
        assert_eq!(record.progress, 50);

        settle().await;
        let sent = transport.sent();
        let Sent::Hop { to, hop } = &sent[0] else {
            panic!("expected a relay hop, got {:?}", sent[0]);
        };
        assert_eq!(to, &id("C"));
        assert_eq!(hop.hops, 2);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(node.transfer(transfer_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermediate_fails_on_non_neighbor_next_hop() {
        let (node, transport) = node("B");
        let hop = hop(1, &["A", "B", "D"], 1.0);
        let transfer_id = hop.transfer_id;
        node.on_transfer_hop(hop);

        settle().await;
        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::Failed
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermediate_fails_on_out_of_range_hop() {
        let (node, _) = node("B");
        let mut hop = hop(2, &["A", "C", "B", "D"], 1.0);
        hop.hops = 3;
        hop.dst = id("D");
        let transfer_id = hop.transfer_id;
        node.on_transfer_hop(hop);

        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_failure_notifies_source() {
        let (node, transport) = node_with(
            "B",
            RecordingTransport {
                fail_relays: true,
                ..Default::default()
            },
        );
        let hop = hop(1, &["A", "B", "C"], 1.0);
        let transfer_id = hop.transfer_id;
        node.on_transfer_hop(hop);

        settle().await;
        assert_eq!(
            transport.sent().last(),
            Some(&Sent::Failed {
                to: id("A"),
                transfer_id
            })
        );
        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_sticky() {
        let (node, _) = node("A");
        let transfer_id = node.initiate_transfer(id("C"), "x".into(), 1.0, 10, &ring_snapshot());
        settle().await;

        assert!(node.complete_transfer(transfer_id));
        assert!(!node.complete_transfer(transfer_id));
        assert!(!node.fail_transfer(transfer_id));

        let record = node.transfer(transfer_id).unwrap();
        assert_eq!(record.status, TransferStatus::Done);
        assert_eq!(record.progress, 100);
        assert_eq!(node.stats().snapshot().transfers_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires_after_last_write() {
        let (node, _) = node("A");
        let transfer_id = node.initiate_transfer(id("C"), "x".into(), 1.0, 10, &ring_snapshot());

        tokio::time::sleep(Duration::from_secs(10)).await;
        node.fail_transfer(transfer_id);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::Failed
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(node.transfer(transfer_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_record_outlives_cleanup_delay() {
        let (node, _) = node("A");
        let transfer_id =
            node.initiate_transfer(id("C"), "x".into(), 100.0, 10, &ring_snapshot());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            node.transfer(transfer_id).unwrap().status,
            TransferStatus::Transferring
        );

        assert!(node.complete_transfer(transfer_id));
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(node.transfer(transfer_id).is_none());
    }

    #[tokio::test]
    async fn test_unknown_transfer_notifications_are_ignored() {
        let (node, _) = node("A");
        let transfer_id = TransferId::new_v4();
        assert!(!node.complete_transfer(transfer_id));
        assert!(!node.fail_transfer(transfer_id));
        assert!(node.snapshot_transfers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_everything() {
        let (node, _) = node("A");
        let transfer_id = node.initiate_transfer(id("A"), "x".into(), 1.0, 10, &ring_snapshot());

        let status = node.status();
        assert_eq!(status.node_id, id("A"));
        assert_eq!(status.vlans.len(), 2);
        assert!(status.transfers.contains_key(&transfer_id));
        assert_eq!(status.stats.transfers_no_path, 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["vlans"]["10"]["B"], "designated");
        assert_eq!(json["transfers"][transfer_id.to_string()]["status"], "no_path");
    }
}
