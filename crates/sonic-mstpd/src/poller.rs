//! Status polling across the simulated network.
//!
//! Nodes cannot see each other's port roles, so the global snapshot that
//! path finding needs is assembled here from every node's `/status`.

use crate::http_transport::HttpTransport;
use sonic_mstp::{BridgeId, GlobalPortStates, NodeStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Status of every configured node; `None` when a node did not answer.
pub type NetworkStatus = BTreeMap<BridgeId, Option<NodeStatus>>;

/// Polls every node known to the transport.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    transport: Arc<HttpTransport>,
}

impl StatusPoller {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    /// Fetches every node's status. Unreachable nodes are reported as
    /// `None` rather than failing the whole poll.
    pub async fn poll(&self) -> NetworkStatus {
        let mut statuses = NetworkStatus::new();
        for node in self.transport.peers() {
            let status = match self.transport.status(node).await {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("Status of {} unavailable: {}", node, e);
                    None
                }
            };
            statuses.insert(node.clone(), status);
        }
        statuses
    }

    /// Polls and aggregates the global port-state snapshot.
    pub async fn global_port_states(&self) -> GlobalPortStates {
        aggregate(&self.poll().await)
    }
}

/// Node → VLAN → port → role, for every node that answered.
pub fn aggregate(statuses: &NetworkStatus) -> GlobalPortStates {
    statuses
        .iter()
        .filter_map(|(node, status)| {
            status
                .as_ref()
                .map(|status| (node.clone(), status.vlans.clone()))
        })
        .collect()
}

/// Nodes that did not answer the last poll.
pub fn unreachable(statuses: &NetworkStatus) -> Vec<&BridgeId> {
    statuses
        .iter()
        .filter(|(_, status)| status.is_none())
        .map(|(node, _)| node)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_mstp::{NodeStatsSnapshot, PortRole, PortRoles};

    fn status(node: &str, roles: &[(&str, PortRole)]) -> NodeStatus {
        let roles: PortRoles = roles.iter().map(|(p, r)| (BridgeId::from(*p), *r)).collect();
        NodeStatus {
            node_id: node.into(),
            vlans: BTreeMap::from([(10, roles)]),
            transfers: BTreeMap::new(),
            stats: NodeStatsSnapshot::default(),
        }
    }

    #[test]
    fn test_aggregate_skips_silent_nodes() {
        let statuses = NetworkStatus::from([
            (
                BridgeId::from("A"),
                Some(status("A", &[("B", PortRole::Designated)])),
            ),
            (BridgeId::from("B"), None),
        ]);

        let states = aggregate(&statuses);
        assert_eq!(states.len(), 1);
        assert_eq!(
            states[&BridgeId::from("A")][&10][&BridgeId::from("B")],
            PortRole::Designated
        );
        assert_eq!(unreachable(&statuses), vec![&BridgeId::from("B")]);
    }

    #[tokio::test]
    async fn test_poll_reports_unreachable_nodes() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let peers = BTreeMap::from([(BridgeId::from("A"), format!("http://127.0.0.1:{}", port))]);
        let transport = HttpTransport::with_peers(peers, Default::default()).unwrap();
        let poller = StatusPoller::new(Arc::new(transport));

        let statuses = poller.poll().await;
        assert_eq!(statuses.get(&BridgeId::from("A")), Some(&None));
        assert!(poller.global_port_states().await.is_empty());
    }
}
