//! HTTP implementation of the node transport.
//!
//! Every node is reached at `http://{address}:{port}` from the static
//! configuration. Each call carries its own timeout; connection errors,
//! timeouts and non-2xx answers all become [`MstpError::Transport`].

use crate::config_file::{MstpdConfig, TransportConfig};
use crate::error::Result;
use crate::rest_api::{BpduRequest, InitiateTransferRequest, StatusResponse, TransferIdRequest};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sonic_mstp::{
    Bpdu, BridgeId, MstpError, NodeAddress, NodeStatus, TransferHop, TransferId, Transport, VlanId,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Base URL of a node.
pub fn base_url(address: &NodeAddress) -> String {
    format!("http://{}:{}", address.host, address.port)
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    peers: BTreeMap<BridgeId, String>,
    timeouts: TransportConfig,
}

impl HttpTransport {
    /// Creates a transport that can reach every node of `config`.
    pub fn new(config: &MstpdConfig) -> Result<Self> {
        let topology = config.to_topology()?;
        let peers = topology
            .node_ids()
            .filter_map(|id| topology.address_of(id).map(|addr| (id.clone(), base_url(addr))))
            .collect();
        Self::with_peers(peers, config.transport.clone())
    }

    /// Creates a transport over an explicit node → base URL table.
    pub fn with_peers(peers: BTreeMap<BridgeId, String>, timeouts: TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            peers,
            timeouts,
        })
    }

    /// Known node ids.
    pub fn peers(&self) -> impl Iterator<Item = &BridgeId> {
        self.peers.keys()
    }

    fn url(&self, to: &BridgeId, path: &str) -> sonic_mstp::Result<String> {
        self.peers
            .get(to)
            .map(|base| format!("{}{}", base, path))
            .ok_or_else(|| MstpError::transport(to, "no address configured"))
    }

    async fn post<B, R>(
        &self,
        to: &BridgeId,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> sonic_mstp::Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(to, path)?;
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| MstpError::transport(to, e.to_string()))?;
        Self::decode(to, path, response).await
    }

    async fn decode<R: DeserializeOwned>(
        to: &BridgeId,
        path: &str,
        response: reqwest::Response,
    ) -> sonic_mstp::Result<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MstpError::transport(
                to,
                format!("{} answered {}: {}", path, status, body),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| MstpError::transport(to, format!("invalid {} response: {}", path, e)))
    }

    /// Fetches the status of one node.
    pub async fn status(&self, node: &BridgeId) -> sonic_mstp::Result<NodeStatus> {
        let url = self.url(node, "/status")?;
        let response = self
            .client
            .get(&url)
            .timeout(self.timeouts.status_timeout())
            .send()
            .await
            .map_err(|e| MstpError::transport(node, e.to_string()))?;
        Self::decode(node, "/status", response).await
    }

    /// Asks `src` to start a transfer.
    pub async fn initiate_transfer(
        &self,
        src: &BridgeId,
        request: &InitiateTransferRequest,
    ) -> sonic_mstp::Result<StatusResponse> {
        self.post(src, "/initiate-transfer", request, self.timeouts.hop_timeout())
            .await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_bpdu(
        &self,
        to: &BridgeId,
        from: &BridgeId,
        vlan_id: VlanId,
        bpdu: Bpdu,
    ) -> sonic_mstp::Result<()> {
        let request = BpduRequest {
            vlan_id,
            from: from.clone(),
            bpdu,
        };
        let _: StatusResponse = self
            .post(to, "/bpdu", &request, self.timeouts.bpdu_timeout())
            .await?;
        Ok(())
    }

    async fn relay_hop(&self, to: &BridgeId, hop: TransferHop) -> sonic_mstp::Result<()> {
        debug!("Relaying {} hop {} to {}", hop.transfer_id, hop.hops, to);
        let _: StatusResponse = self
            .post(to, "/transfer", &hop, self.timeouts.hop_timeout())
            .await?;
        Ok(())
    }

    async fn notify_complete(
        &self,
        to: &BridgeId,
        transfer_id: TransferId,
    ) -> sonic_mstp::Result<()> {
        let _: StatusResponse = self
            .post(
                to,
                "/complete-transfer",
                &TransferIdRequest { transfer_id },
                self.timeouts.notify_timeout(),
            )
            .await?;
        Ok(())
    }

    async fn notify_failed(&self, to: &BridgeId, transfer_id: TransferId) -> sonic_mstp::Result<()> {
        let _: StatusResponse = self
            .post(
                to,
                "/fail-transfer",
                &TransferIdRequest { transfer_id },
                self.timeouts.notify_timeout(),
            )
            .await?;
        Ok(())
    }
}
