//! Credential provisioning on a chosen node.
//!
//! The sequence is authenticate → add client → hand back the connection
//! descriptor. Each step can fail independently; none is retried, and a
//! failure is never redirected to another node.

mod expiry;
mod link;

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hyperbridge_panel::{ClientSpec, InboundId, PanelError};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::gateway::NodeGateway;
use crate::registry::NodeDescriptor;

pub use expiry::{expires_at, GRACE_PERIOD};
pub use link::{build_vless_link, ConnectionDescriptor, LinkBuildError, DEFAULT_PUBLIC_PORT};

/// Errors from a provisioning attempt.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("authentication failed: {0}")]
    AuthFailed(#[source] PanelError),

    #[error("node {node_id} has no inbound to attach credentials to")]
    NoInbound { node_id: String },

    #[error("a validity of {months} months is out of range")]
    ValidityOutOfRange { months: u32 },

    #[error("add client failed: {0}")]
    AddFailed(#[source] PanelError),

    #[error("link build failed: {0}")]
    LinkBuildFailed(#[from] LinkBuildError),
}

impl ProvisionError {
    /// Short machine-readable name of the failed step.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthFailed(_) => "auth_failed",
            Self::NoInbound { .. } => "no_inbound",
            Self::ValidityOutOfRange { .. } => "validity_out_of_range",
            Self::AddFailed(_) => "add_failed",
            Self::LinkBuildFailed(_) => "link_build_failed",
        }
    }
}

/// What to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Panel-side label (`email`) of the credential; unique per issuance.
    pub client_label: String,
    pub validity_months: NonZeroU32,
    pub inbound_id: InboundId,
}

impl CredentialRequest {
    /// Request with a freshly generated label.
    pub fn fresh(validity_months: NonZeroU32, inbound_id: InboundId) -> Self {
        Self {
            client_label: Uuid::new_v4().to_string(),
            validity_months,
            inbound_id,
        }
    }
}

/// A credential that now exists on a node.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub node_id: String,
    pub credential_id: Uuid,
    pub client_label: String,
    pub expires_at: DateTime<Utc>,
    pub descriptor: ConnectionDescriptor,
}

/// Runs the provisioning sequence against a node.
pub struct CredentialProvisioner {
    gateway: Arc<dyn NodeGateway>,
    brand: String,
}

impl CredentialProvisioner {
    /// Create a provisioner labelling descriptors `{brand}-{node_id}`.
    pub fn new(gateway: Arc<dyn NodeGateway>, brand: impl Into<String>) -> Self {
        Self {
            gateway,
            brand: brand.into(),
        }
    }

    /// Issue a credential on `node`.
    pub async fn provision(
        &self,
        node: &NodeDescriptor,
        request: &CredentialRequest,
    ) -> Result<IssuedCredential, ProvisionError> {
        self.provision_at(node, request, Utc::now()).await
    }

    /// Issue a credential on `node`, computing expiry from `now`.
    #[instrument(skip_all, fields(node_id = %node.id, inbound_id = request.inbound_id))]
    pub async fn provision_at(
        &self,
        node: &NodeDescriptor,
        request: &CredentialRequest,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredential, ProvisionError> {
        let session = self.gateway.authenticate(node).await.map_err(|e| {
            warn!(error = %e, "Provisioning login failed");
            ProvisionError::AuthFailed(e)
        })?;

        let credential_id = Uuid::new_v4();
        let months = request.validity_months;
        let expires_at = expires_at(now, months).ok_or(ProvisionError::ValidityOutOfRange {
            months: months.get(),
        })?;

        // The descriptor is local and deterministic; building it before the
        // remote call keeps a misconfigured node from accumulating orphaned
        // clients.
        let descriptor = build_vless_link(node, &credential_id, &self.brand)?;

        let client = ClientSpec::unlimited(
            credential_id.to_string(),
            request.client_label.clone(),
            expires_at.timestamp_millis(),
        );
        self.gateway
            .add_client(node, &session, request.inbound_id, &client)
            .await
            .map_err(|e| {
                warn!(error = %e, "Panel refused new client");
                ProvisionError::AddFailed(e)
            })?;

        info!(
            credential_id = %credential_id,
            client_label = %request.client_label,
            expires_at = %expires_at,
            "Credential issued"
        );

        Ok(IssuedCredential {
            node_id: node.id.clone(),
            credential_id,
            client_label: request.client_label.clone(),
            expires_at,
            descriptor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::node;
    use crate::testing::{inbound, FakeGateway, FakeNode};
    use chrono::TimeZone;

    fn one_month() -> NonZeroU32 {
        NonZeroU32::new(1).unwrap()
    }

    fn healthy() -> FakeNode {
        FakeNode::Healthy(vec![inbound(7, "main", Some(1))])
    }

    #[tokio::test]
    async fn test_provision_adds_client_and_builds_link() {
        let gateway = Arc::new(FakeGateway::new().with_node("a", healthy()));
        let provisioner = CredentialProvisioner::new(gateway.clone(), "HyperVPN");
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let request = CredentialRequest::fresh(one_month(), 7);

        let issued = provisioner
            .provision_at(&node("a"), &request, now)
            .await
            .unwrap();

        let added = gateway.added_clients();
        assert_eq!(added.len(), 1);
        let (node_id, inbound_id, client) = &added[0];
        assert_eq!(node_id, "a");
        assert_eq!(*inbound_id, 7);
        assert_eq!(client.id, issued.credential_id.to_string());
        assert_eq!(client.email, request.client_label);
        assert_eq!(client.flow, "");
        assert_eq!(client.total_gb, 0);
        assert!(client.enable);
        assert_eq!(client.expiry_time, 1_708_079_400_000);

        assert_eq!(issued.node_id, "a");
        assert!(issued
            .descriptor
            .as_str()
            .starts_with(&format!("vless://{}@a.vpn.example:443?", issued.credential_id)));
        assert!(issued.descriptor.as_str().ends_with("#HyperVPN-a"));
    }

    #[tokio::test]
    async fn test_each_issuance_gets_a_new_credential() {
        let gateway = Arc::new(FakeGateway::new().with_node("a", healthy()));
        let provisioner = CredentialProvisioner::new(gateway.clone(), "HyperVPN");

        let first = provisioner
            .provision(&node("a"), &CredentialRequest::fresh(one_month(), 7))
            .await
            .unwrap();
        let second = provisioner
            .provision(&node("a"), &CredentialRequest::fresh(one_month(), 7))
            .await
            .unwrap();

        assert_ne!(first.credential_id, second.credential_id);
        assert_ne!(first.client_label, second.client_label);
    }

    #[tokio::test]
    async fn test_auth_failure_aborts() {
        let gateway = Arc::new(FakeGateway::new().with_node("a", FakeNode::LoginFails));
        let provisioner = CredentialProvisioner::new(gateway.clone(), "HyperVPN");

        let err = provisioner
            .provision(&node("a"), &CredentialRequest::fresh(one_month(), 7))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::AuthFailed(_)));
        assert_eq!(err.kind(), "auth_failed");
        assert!(gateway.added_clients().is_empty());
    }

    #[tokio::test]
    async fn test_add_failure_aborts() {
        let gateway = Arc::new(FakeGateway::new().with_node("a", FakeNode::AddFails(vec![])));
        let provisioner = CredentialProvisioner::new(gateway, "HyperVPN");

        let err = provisioner
            .provision(&node("a"), &CredentialRequest::fresh(one_month(), 7))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::AddFailed(_)));
    }

    #[tokio::test]
    async fn test_link_failure_leaves_no_client_behind() {
        let gateway = Arc::new(FakeGateway::new().with_node("a", healthy()));
        let provisioner = CredentialProvisioner::new(gateway.clone(), "HyperVPN");
        let mut descriptor = node("a");
        descriptor.security = None;

        let err = provisioner
            .provision(&descriptor, &CredentialRequest::fresh(one_month(), 7))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::LinkBuildFailed(_)));
        assert!(gateway.added_clients().is_empty());
    }
}
