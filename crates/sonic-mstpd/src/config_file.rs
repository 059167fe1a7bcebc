//! Configuration file support for mstpd
//!
//! Loads and validates the simulated network (nodes, links, VLAN
//! membership) and the daemon timers from a TOML file. Without a file the
//! built-in three-node triangle is used.

use crate::error::{MstpdError, Result};
use serde::{Deserialize, Serialize};
use sonic_mstp::{
    parse_link, BridgeId, NodeAddress, NodeConfig, Topology, VlanId, VlanLinks,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// One simulated node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Node id, also its bridge id
    pub id: String,

    /// Listen address
    #[serde(default = "default_address")]
    pub address: String,

    /// Listen port
    pub port: u16,
}

/// Member links of one VLAN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlanEntry {
    /// VLAN id
    pub id: VlanId,

    /// Links written as "A:B"
    #[serde(default)]
    pub links: Vec<String>,
}

/// Protocol and transfer timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimersConfig {
    /// Delay before the first advertisement round
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Period between advertisement rounds
    #[serde(default = "default_hello_interval")]
    pub hello_interval_ms: u64,

    /// Lifetime of a transfer record after its last update
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay_ms: u64,

    /// Simulated download rate (MB/s)
    #[serde(default = "default_transfer_rate")]
    pub transfer_rate_mbps: f64,
}

/// Per-call timeouts of the HTTP transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// BPDU gossip
    #[serde(default = "default_bpdu_timeout")]
    pub bpdu_timeout_ms: u64,

    /// Transfer hop relay
    #[serde(default = "default_hop_timeout")]
    pub hop_timeout_ms: u64,

    /// Completion and failure notifications
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_ms: u64,

    /// Status polling
    #[serde(default = "default_status_timeout")]
    pub status_timeout_ms: u64,
}

/// Complete mstpd configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MstpdConfig {
    /// Undirected links written as "A:B"
    #[serde(default = "default_links")]
    pub links: Vec<String>,

    /// Nodes of the network
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeEntry>,

    /// VLAN membership
    #[serde(default = "default_vlans")]
    pub vlans: Vec<VlanEntry>,

    /// Timers
    #[serde(default)]
    pub timers: TimersConfig,

    /// Transport timeouts
    #[serde(default)]
    pub transport: TransportConfig,
}

// Default functions
fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_nodes() -> Vec<NodeEntry> {
    [("A", 5000), ("B", 5001), ("C", 5002)]
        .into_iter()
        .map(|(id, port)| NodeEntry {
            id: id.to_string(),
            address: default_address(),
            port,
        })
        .collect()
}

fn default_links() -> Vec<String> {
    vec!["A:B".to_string(), "B:C".to_string(), "C:A".to_string()]
}

fn default_vlans() -> Vec<VlanEntry> {
    [10, 20]
        .into_iter()
        .map(|id| VlanEntry {
            id,
            links: default_links(),
        })
        .collect()
}

fn default_initial_delay() -> u64 {
    4000
}

fn default_hello_interval() -> u64 {
    2000
}

fn default_cleanup_delay() -> u64 {
    15000
}

fn default_transfer_rate() -> f64 {
    5.0
}

fn default_bpdu_timeout() -> u64 {
    1500
}

fn default_hop_timeout() -> u64 {
    10000
}

fn default_notify_timeout() -> u64 {
    5000
}

fn default_status_timeout() -> u64 {
    2000
}

// Default implementations
impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            hello_interval_ms: default_hello_interval(),
            cleanup_delay_ms: default_cleanup_delay(),
            transfer_rate_mbps: default_transfer_rate(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bpdu_timeout_ms: default_bpdu_timeout(),
            hop_timeout_ms: default_hop_timeout(),
            notify_timeout_ms: default_notify_timeout(),
            status_timeout_ms: default_status_timeout(),
        }
    }
}

impl Default for MstpdConfig {
    fn default() -> Self {
        Self {
            links: default_links(),
            nodes: default_nodes(),
            vlans: default_vlans(),
            timers: TimersConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn bpdu_timeout(&self) -> Duration {
        Duration::from_millis(self.bpdu_timeout_ms)
    }

    pub fn hop_timeout(&self) -> Duration {
        Duration::from_millis(self.hop_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }
}

impl MstpdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| {
                MstpdError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using the built-in triangle",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(MstpdError::Io(e)),
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MstpdError::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MstpdError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MstpdError::Config("at least one node is required".to_string()));
        }

        let mut ids = BTreeSet::new();
        for node in &self.nodes {
            if node.id.is_empty() || node.id.contains(':') {
                return Err(MstpdError::Config(format!(
                    "invalid node id '{}'",
                    node.id
                )));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(MstpdError::Config(format!(
                    "node {} declared twice",
                    node.id
                )));
            }
            if node.port == 0 {
                return Err(MstpdError::Config(format!(
                    "node {} port must be > 0",
                    node.id
                )));
            }
        }

        if self.timers.hello_interval_ms == 0 {
            return Err(MstpdError::Config(
                "hello_interval_ms must be > 0".to_string(),
            ));
        }

        if !self.timers.transfer_rate_mbps.is_finite() || self.timers.transfer_rate_mbps <= 0.0 {
            return Err(MstpdError::Config(
                "transfer_rate_mbps must be a positive number".to_string(),
            ));
        }

        self.to_topology().map(|_| ())
    }

    /// Builds the static topology described by this configuration
    pub fn to_topology(&self) -> Result<Topology> {
        let nodes: BTreeMap<BridgeId, NodeAddress> = self
            .nodes
            .iter()
            .map(|node| {
                (
                    BridgeId::from(node.id.as_str()),
                    NodeAddress::new(node.address.clone(), node.port),
                )
            })
            .collect();

        let links = self
            .links
            .iter()
            .map(|link| parse_link(link))
            .collect::<sonic_mstp::Result<Vec<_>>>()
            .map_err(|e| MstpdError::Config(e.to_string()))?;

        let vlans = self
            .vlans
            .iter()
            .map(|vlan| {
                let links = vlan
                    .links
                    .iter()
                    .map(|link| parse_link(link))
                    .collect::<sonic_mstp::Result<Vec<_>>>()?;
                Ok(VlanLinks {
                    vlan_id: vlan.id,
                    links,
                })
            })
            .collect::<sonic_mstp::Result<Vec<_>>>()
            .map_err(|e| MstpdError::Config(e.to_string()))?;

        Topology::new(nodes, links, vlans).map_err(|e| MstpdError::Config(e.to_string()))
    }

    /// Timers handed to every node
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            initial_delay: Duration::from_millis(self.timers.initial_delay_ms),
            hello_interval: Duration::from_millis(self.timers.hello_interval_ms),
            cleanup_delay: Duration::from_millis(self.timers.cleanup_delay_ms),
            transfer_rate_mbps: self.timers.transfer_rate_mbps,
        }
    }
}
