//! Simplified Multiple Spanning Tree Protocol for simulated bridge nodes.
//!
//! This crate provides the control and data plane of a teaching-scale MSTP
//! network:
//!
//! - [`Bpdu`]: the advertisement a bridge sends, plus the superiority order
//! - [`SpanningTree`]: per-VLAN root election and port role assignment
//! - [`VlanInstance`]: binds one engine to the ports that carry a VLAN
//! - [`MstpNode`]: owns every VLAN instance of a node, runs the periodic
//!   advertisement loop and relays simulated file transfers hop by hop
//! - [`find_path`]: shortest path over the non-blocked topology
//! - [`Transport`]: the seam through which nodes reach each other
//!
//! # Architecture
//!
//! 1. A timer inside [`MstpNode`] asks each VLAN instance for its current
//!    BPDU and pushes it to every neighbor that is a member of that VLAN
//! 2. An inbound BPDU is routed to the matching VLAN instance, whose engine
//!    fully re-derives root, cost and port roles from its cached BPDUs
//! 3. A transfer is started with a global snapshot of every node's port
//!    roles; the source computes a path and the relay moves forward through
//!    the [`Transport`] until the destination notifies the source
//!
//! # Example
//!
//! ```ignore
//! use sonic_mstp::{MstpNode, NodeConfig, Topology};
//!
//! let topology = Topology::triangle();
//! let node = MstpNode::new("A".into(), &topology, NodeConfig::default(), transport)?;
//! node.start_advertisement_loop();
//! ```

mod bpdu;
mod engine;
mod error;
mod node;
mod path;
mod topology;
mod transfer;
mod transport;
mod types;
mod vlan;

pub use bpdu::{superior, Bpdu};
pub use engine::SpanningTree;
pub use error::{MstpError, Result};
pub use node::{MstpNode, NodeConfig, NodeStats, NodeStatsSnapshot, NodeStatus};
pub use path::find_path;
pub use topology::{parse_link, Link, NodeAddress, Topology, VlanLinks};
pub use transfer::{TransferHop, TransferRecord, TransferStatus};
pub use transport::Transport;
pub use types::{BridgeId, GlobalPortStates, PortId, PortRole, PortRoles, TransferId, VlanId};
pub use vlan::VlanInstance;
