//! Spanning-tree engine for one VLAN on one bridge.
//!
//! The engine keeps the latest BPDU seen on every port and, on each new
//! BPDU, re-derives root, cost and port roles from that cache alone. There
//! is no listening/learning timer state: roles change purely by BPDU
//! superiority, and cached BPDUs never age out.

use crate::bpdu::{superior, Bpdu};
use crate::error::{MstpError, Result};
use crate::types::{BridgeId, PortId, PortRole, PortRoles, VlanId};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Root election and port role state of one bridge in one VLAN.
#[derive(Debug, Clone)]
pub struct SpanningTree {
    vlan_id: VlanId,
    bridge_id: BridgeId,
    ports: Vec<PortId>,
    root_id: BridgeId,
    cost_to_root: u32,
    root_port: Option<PortId>,
    port_states: PortRoles,
    received_bpdus: BTreeMap<PortId, Bpdu>,
}

impl SpanningTree {
    /// Creates an engine that believes itself to be root, with every port
    /// designated.
    pub fn new(vlan_id: VlanId, bridge_id: BridgeId, ports: Vec<PortId>) -> Self {
        let port_states = ports
            .iter()
            .map(|port| (port.clone(), PortRole::Designated))
            .collect();

        Self {
            vlan_id,
            root_id: bridge_id.clone(),
            bridge_id,
            ports,
            cost_to_root: 0,
            root_port: None,
            port_states,
            received_bpdus: BTreeMap::new(),
        }
    }

    /// The BPDU this bridge currently advertises.
    pub fn advertisement(&self) -> Bpdu {
        Bpdu::new(
            self.bridge_id.clone(),
            self.root_id.clone(),
            self.cost_to_root,
        )
    }

    /// Records `bpdu` as the latest for `port` and recomputes all roles.
    ///
    /// Returns true if root, cost, root port or any port role changed.
    pub fn on_bpdu(&mut self, port: &PortId, bpdu: Bpdu) -> Result<bool> {
        if !self.ports.contains(port) {
            return Err(MstpError::UnknownPort {
                vlan_id: self.vlan_id,
                port: port.clone(),
            });
        }

        debug!(
            vlan = self.vlan_id,
            port = %port,
            sender = %bpdu.sender_id,
            root = %bpdu.root_id,
            cost = bpdu.cost,
            "BPDU received"
        );
        self.received_bpdus.insert(port.clone(), bpdu);

        Ok(self.recompute())
    }

    /// Re-derives root, cost and port roles from the cached BPDUs.
    ///
    /// Deterministic and idempotent for a given cache.
    fn recompute(&mut self) -> bool {
        let previous = (
            self.root_id.clone(),
            self.cost_to_root,
            self.root_port.clone(),
            self.port_states.clone(),
        );

        let mut best = Bpdu::new(self.bridge_id.clone(), self.bridge_id.clone(), 0);
        let mut best_port: Option<&PortId> = None;

        for (port, cached) in &self.received_bpdus {
            let prospective = cached.one_hop_further();
            if superior(&prospective, Some(&best)) {
                best = prospective;
                best_port = Some(port);
            }
        }

        self.root_id = best.root_id;
        self.cost_to_root = best.cost;
        self.root_port = best_port.cloned();

        let own = self.advertisement();
        let is_root = self.is_root();
        let mut port_states = PortRoles::new();
        for port in &self.ports {
            let role = if is_root {
                PortRole::Designated
            } else if self.root_port.as_ref() == Some(port) {
                PortRole::Root
            } else if superior(&own, self.received_bpdus.get(port)) {
                PortRole::Designated
            } else {
                PortRole::Blocked
            };
            port_states.insert(port.clone(), role);
        }
        self.port_states = port_states;

        let changed = previous
            != (
                self.root_id.clone(),
                self.cost_to_root,
                self.root_port.clone(),
                self.port_states.clone(),
            );

        if changed {
            info!(
                vlan = self.vlan_id,
                bridge = %self.bridge_id,
                root = %self.root_id,
                cost = self.cost_to_root,
                root_port = ?self.root_port.as_ref().map(BridgeId::as_str),
                "Spanning tree changed"
            );
        }

        changed
    }

    /// Snapshot of every port's role.
    pub fn port_roles(&self) -> PortRoles {
        self.port_states.clone()
    }

    /// Role of a single port.
    pub fn port_role(&self, port: &PortId) -> Option<PortRole> {
        self.port_states.get(port).copied()
    }

    /// Returns true if this bridge believes it is the root.
    pub fn is_root(&self) -> bool {
        self.root_id == self.bridge_id
    }

    pub fn vlan_id(&self) -> VlanId {
        self.vlan_id
    }

    pub fn bridge_id(&self) -> &BridgeId {
        &self.bridge_id
    }

    pub fn root_id(&self) -> &BridgeId {
        &self.root_id
    }

    pub fn cost_to_root(&self) -> u32 {
        self.cost_to_root
    }

    pub fn root_port(&self) -> Option<&PortId> {
        self.root_port.as_ref()
    }

    /// Ports this engine covers.
    pub fn ports(&self) -> &[PortId] {
        &self.ports
    }

    /// Latest BPDU seen on `port`.
    pub fn received_bpdu(&self, port: &PortId) -> Option<&Bpdu> {
        self.received_bpdus.get(port)
    }
}
