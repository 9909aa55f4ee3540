//! Access to node panels.
//!
//! [`NodeGateway`] is the seam between the broker and the remote panels: the
//! aggregator and provisioner only ever talk to nodes through it. The
//! production implementation is [`PanelGateway`], which drives the real panel
//! HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use hyperbridge_panel::{
    build_http_client, ClientSpec, Inbound, InboundId, PanelClient, PanelError, SessionToken,
};

use crate::registry::NodeDescriptor;

/// Operations the broker needs from a node's panel.
#[async_trait]
pub trait NodeGateway: Send + Sync {
    /// Log in with the node's stored credentials.
    async fn authenticate(&self, node: &NodeDescriptor) -> Result<SessionToken, PanelError>;

    /// Enumerate the node's inbounds in panel order.
    async fn list_inbounds(
        &self,
        node: &NodeDescriptor,
        session: &SessionToken,
    ) -> Result<Vec<Inbound>, PanelError>;

    /// Attach a client to an inbound on the node.
    async fn add_client(
        &self,
        node: &NodeDescriptor,
        session: &SessionToken,
        inbound_id: InboundId,
        client: &ClientSpec,
    ) -> Result<(), PanelError>;
}

/// Gateway backed by the panel HTTP API.
///
/// One `reqwest::Client` (and its connection pool) is shared by every node.
#[derive(Debug, Clone)]
pub struct PanelGateway {
    http: reqwest::Client,
}

impl PanelGateway {
    /// Create a gateway whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, PanelError> {
        Ok(Self {
            http: build_http_client(timeout)?,
        })
    }

    fn panel(&self, node: &NodeDescriptor) -> Result<PanelClient, PanelError> {
        PanelClient::new(self.http.clone(), &node.api_url, &node.web_base_path)
    }
}

#[async_trait]
impl NodeGateway for PanelGateway {
    async fn authenticate(&self, node: &NodeDescriptor) -> Result<SessionToken, PanelError> {
        self.panel(node)?
            .login(&node.username, &node.password)
            .await
    }

    async fn list_inbounds(
        &self,
        node: &NodeDescriptor,
        session: &SessionToken,
    ) -> Result<Vec<Inbound>, PanelError> {
        self.panel(node)?.list_inbounds(session).await
    }

    async fn add_client(
        &self,
        node: &NodeDescriptor,
        session: &SessionToken,
        inbound_id: InboundId,
        client: &ClientSpec,
    ) -> Result<(), PanelError> {
        self.panel(node)?
            .add_client(session, inbound_id, client)
            .await
    }
}
