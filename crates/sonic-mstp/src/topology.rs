//! Static topology: node addresses, links and VLAN membership.
//!
//! The node orchestrator consumes only derived views of this data: the
//! neighbor list of a node and the "is this link a member of VLAN X" test.

use crate::error::{MstpError, Result};
use crate::types::{BridgeId, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Where a node listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Undirected link between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub a: BridgeId,
    pub b: BridgeId,
}

impl Link {
    pub fn new(a: impl Into<BridgeId>, b: impl Into<BridgeId>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    /// Returns true if this link joins `x` and `y`, in either direction.
    pub fn connects(&self, x: &BridgeId, y: &BridgeId) -> bool {
        (&self.a == x && &self.b == y) || (&self.a == y && &self.b == x)
    }

    /// The far end of this link seen from `node`.
    pub fn other_end(&self, node: &BridgeId) -> Option<&BridgeId> {
        if &self.a == node {
            Some(&self.b)
        } else if &self.b == node {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Parses a link written as `"A:B"`.
pub fn parse_link(s: &str) -> Result<Link> {
    let (a, b) = s
        .split_once(':')
        .ok_or_else(|| MstpError::InvalidTopology(format!("link '{}' is not NODE:NODE", s)))?;
    let (a, b) = (a.trim(), b.trim());

    if a.is_empty() || b.is_empty() || b.contains(':') {
        return Err(MstpError::InvalidTopology(format!(
            "link '{}' is not NODE:NODE",
            s
        )));
    }
    if a == b {
        return Err(MstpError::InvalidTopology(format!(
            "link '{}' is a self-loop",
            s
        )));
    }

    Ok(Link::new(a, b))
}

/// Member links of one VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanLinks {
    pub vlan_id: VlanId,
    pub links: Vec<Link>,
}

/// Static topology shared by every node of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    nodes: BTreeMap<BridgeId, NodeAddress>,
    links: Vec<Link>,
    vlans: BTreeMap<VlanId, Vec<Link>>,
}

impl Topology {
    /// Builds and validates a topology.
    pub fn new(
        nodes: BTreeMap<BridgeId, NodeAddress>,
        links: Vec<Link>,
        vlans: Vec<VlanLinks>,
    ) -> Result<Self> {
        for link in &links {
            for end in [&link.a, &link.b] {
                if !nodes.contains_key(end) {
                    return Err(MstpError::InvalidTopology(format!(
                        "link {}:{} references unknown node {}",
                        link.a, link.b, end
                    )));
                }
            }
        }

        let mut vlan_map = BTreeMap::new();
        for vlan in vlans {
            for link in &vlan.links {
                if !links.iter().any(|l| l.connects(&link.a, &link.b)) {
                    return Err(MstpError::InvalidTopology(format!(
                        "VLAN {} uses undeclared link {}:{}",
                        vlan.vlan_id, link.a, link.b
                    )));
                }
            }
            if vlan_map.insert(vlan.vlan_id, vlan.links).is_some() {
                return Err(MstpError::InvalidTopology(format!(
                    "VLAN {} declared twice",
                    vlan.vlan_id
                )));
            }
        }

        Ok(Self {
            nodes,
            links,
            vlans: vlan_map,
        })
    }

    /// Three nodes on 127.0.0.1:5000-5002 wired as a full triangle, with
    /// VLANs 10 and 20 both spanning every link.
    pub fn triangle() -> Self {
        let nodes = [("A", 5000), ("B", 5001), ("C", 5002)]
            .into_iter()
            .map(|(id, port)| (BridgeId::from(id), NodeAddress::new("127.0.0.1", port)))
            .collect();
        let links = vec![Link::new("A", "B"), Link::new("B", "C"), Link::new("C", "A")];
        let vlans = [10, 20]
            .into_iter()
            .map(|vlan_id| (vlan_id, links.clone()))
            .collect();

        Self {
            nodes,
            links,
            vlans,
        }
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = &BridgeId> {
        self.nodes.keys()
    }

    pub fn contains_node(&self, node: &BridgeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn address_of(&self, node: &BridgeId) -> Option<&NodeAddress> {
        self.nodes.get(node)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Configured VLAN ids in ascending order.
    pub fn vlan_ids(&self) -> Vec<VlanId> {
        self.vlans.keys().copied().collect()
    }

    /// Nodes directly linked to `node`, in declaration order.
    pub fn neighbors_of(&self, node: &BridgeId) -> Vec<BridgeId> {
        let mut seen = BTreeSet::new();
        self.links
            .iter()
            .filter_map(|link| link.other_end(node))
            .filter(|neighbor| seen.insert((*neighbor).clone()))
            .cloned()
            .collect()
    }

    /// Returns true if the link between `a` and `b` carries `vlan_id`.
    pub fn is_link_in_vlan(&self, vlan_id: VlanId, a: &BridgeId, b: &BridgeId) -> bool {
        self.vlans
            .get(&vlan_id)
            .is_some_and(|links| links.iter().any(|link| link.connects(a, b)))
    }

    /// Neighbors of `node` reached over links that carry `vlan_id`.
    pub fn vlan_neighbors(&self, node: &BridgeId, vlan_id: VlanId) -> Vec<BridgeId> {
        self.neighbors_of(node)
            .into_iter()
            .filter(|neighbor| self.is_link_in_vlan(vlan_id, node, neighbor))
            .collect()
    }
}
