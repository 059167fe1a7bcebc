//! Identifier and port role types shared across the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// VLAN identifier.
pub type VlanId = u16;

/// Unique identifier of a simulated transfer.
pub type TransferId = uuid::Uuid;

/// Bridge identifier.
///
/// Bridge ids are the node ids from the topology and are compared
/// lexically; the smallest id wins the root election.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeId(String);

impl BridgeId {
    /// Creates a bridge id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BridgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BridgeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A port is named after the neighbor it faces.
pub type PortId = BridgeId;

/// Role of a port in one VLAN's active topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// Best path toward the root bridge.
    Root,
    /// This bridge forwards for the attached link.
    Designated,
    /// Disabled to break a loop.
    Blocked,
}

impl PortRole {
    /// Parses a port role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "root" => Some(Self::Root),
            "designated" => Some(Self::Designated),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Designated => "designated",
            Self::Blocked => "blocked",
        }
    }

    /// Returns true if traffic may cross this port.
    pub fn is_forwarding(&self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port roles of one VLAN instance: port → role.
pub type PortRoles = BTreeMap<PortId, PortRole>;

/// Every known node's port roles: node → VLAN → port → role.
///
/// Aggregated outside the node (see the status poller) and handed to the
/// path finder as-is.
pub type GlobalPortStates = BTreeMap<BridgeId, BTreeMap<VlanId, PortRoles>>;
