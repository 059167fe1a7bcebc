//! VLAN instance: one spanning-tree engine scoped to the VLAN's ports.

use crate::bpdu::Bpdu;
use crate::engine::SpanningTree;
use crate::error::Result;
use crate::types::{BridgeId, PortId, PortRoles, VlanId};
use parking_lot::RwLock;

/// Binds a [`SpanningTree`] to the subset of a node's ports carrying a VLAN.
///
/// BPDUs may arrive concurrently from the transport, so the engine sits
/// behind a per-VLAN lock; instances of different VLANs never interact.
#[derive(Debug)]
pub struct VlanInstance {
    vlan_id: VlanId,
    ports: Vec<PortId>,
    engine: RwLock<SpanningTree>,
}

impl VlanInstance {
    /// Creates a VLAN instance for `bridge_id` over the member `ports`.
    pub fn new(vlan_id: VlanId, bridge_id: BridgeId, ports: Vec<PortId>) -> Self {
        Self {
            vlan_id,
            engine: RwLock::new(SpanningTree::new(vlan_id, bridge_id, ports.clone())),
            ports,
        }
    }

    pub fn vlan_id(&self) -> VlanId {
        self.vlan_id
    }

    /// Member ports (neighbor ids) of this VLAN.
    pub fn ports(&self) -> &[PortId] {
        &self.ports
    }

    /// Returns true if `port` is a member of this VLAN.
    pub fn has_port(&self, port: &PortId) -> bool {
        self.ports.contains(port)
    }

    pub fn on_bpdu(&self, port: &PortId, bpdu: Bpdu) -> Result<bool> {
        self.engine.write().on_bpdu(port, bpdu)
    }

    pub fn advertisement(&self) -> Bpdu {
        self.engine.read().advertisement()
    }

    pub fn port_roles(&self) -> PortRoles {
        self.engine.read().port_roles()
    }

    /// Copy of the engine state, for inspection.
    pub fn engine_snapshot(&self) -> SpanningTree {
        self.engine.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortRole;

    #[test]
    fn test_forwards_to_engine() {
        let vlan = VlanInstance::new(20, "B".into(), vec!["A".into(), "C".into()]);
        assert_eq!(vlan.vlan_id(), 20);
        assert!(vlan.has_port(&"A".into()));
        assert!(!vlan.has_port(&"D".into()));

        vlan.on_bpdu(&"A".into(), Bpdu::new("A".into(), "A".into(), 0))
            .unwrap();

        assert_eq!(vlan.advertisement(), Bpdu::new("B".into(), "A".into(), 1));
        assert_eq!(vlan.port_roles()[&BridgeId::from("A")], PortRole::Root);
        assert_eq!(vlan.engine_snapshot().cost_to_root(), 1);
    }

    #[test]
    fn test_rejects_non_member_port() {
        let vlan = VlanInstance::new(20, "B".into(), vec!["A".into()]);
        let result = vlan.on_bpdu(&"C".into(), Bpdu::new("C".into(), "A".into(), 1));
        assert!(result.is_err());
        assert_eq!(vlan.port_roles().len(), 1);
    }
}
