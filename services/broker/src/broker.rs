//! The credential broker: registry → aggregation → selection → provisioning.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::gateway::NodeGateway;
use crate::history::{LoadHistory, LoadRecord};
use crate::provisioner::{CredentialProvisioner, CredentialRequest, IssuedCredential, ProvisionError};
use crate::registry::{NodeDescriptor, NodeRegistry, RegistryError};
use crate::scheduler::{select_node, AggregateLoad, LoadAggregator, SelectionMode};

/// Errors issuing a credential.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No node answered the load query (or the registry is empty).
    #[error("no available nodes")]
    NoAvailableNodes,

    #[error("provisioning on node {node_id} failed: {source}")]
    Provision {
        node_id: String,
        #[source]
        source: ProvisionError,
    },
}

/// Broker tunables.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Deadline for one node's login + inbound enumeration.
    pub node_timeout: Duration,
    /// Brand label in connection descriptors.
    pub brand: String,
}

/// Entry point for the HTTP layer.
pub struct Broker {
    registry: NodeRegistry,
    history: LoadHistory,
    aggregator: LoadAggregator,
    provisioner: CredentialProvisioner,
}

impl Broker {
    pub fn new(
        registry: NodeRegistry,
        history: LoadHistory,
        gateway: Arc<dyn NodeGateway>,
        settings: BrokerSettings,
    ) -> Self {
        Self {
            registry,
            history,
            aggregator: LoadAggregator::new(Arc::clone(&gateway), settings.node_timeout),
            provisioner: CredentialProvisioner::new(gateway, settings.brand),
        }
    }

    /// Enabled nodes, in registry order.
    pub async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError> {
        self.registry.list_enabled_nodes().await
    }

    /// Issue a credential valid for `months` on the best node.
    ///
    /// Selection and provisioning use the same aggregation pass. A failed
    /// provisioning step is reported as is; no other node is tried.
    #[instrument(skip(self))]
    pub async fn issue_credential(&self, months: NonZeroU32) -> Result<IssuedCredential, IssueError> {
        let nodes = self.registry.list_enabled_nodes().await?;
        let report = self.aggregator.collect(&nodes).await;
        let candidates = report.available();

        let selection = select_node(&candidates).ok_or(IssueError::NoAvailableNodes)?;
        let chosen = selection.node;

        match selection.mode {
            SelectionMode::WithinCapacity => info!(
                node_id = %chosen.node_id,
                current_users = chosen.current_users,
                users_limit = chosen.users_limit,
                "Selected node"
            ),
            SelectionMode::Overloaded => warn!(
                node_id = %chosen.node_id,
                current_users = chosen.current_users,
                users_limit = chosen.users_limit,
                "All nodes at capacity, selected least loaded"
            ),
        }

        let node = nodes
            .iter()
            .find(|n| n.id == chosen.node_id)
            .ok_or(IssueError::NoAvailableNodes)?;

        let provision_failed = |source: ProvisionError| IssueError::Provision {
            node_id: node.id.clone(),
            source,
        };

        let inbound_id = chosen.first_inbound_id.ok_or_else(|| {
            provision_failed(ProvisionError::NoInbound {
                node_id: node.id.clone(),
            })
        })?;

        let request = CredentialRequest::fresh(months, inbound_id);
        self.provisioner
            .provision(node, &request)
            .await
            .map_err(provision_failed)
    }

    /// Client counts per inbound for every reachable node.
    ///
    /// The result is also written to the load history; a failed write is
    /// logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn aggregate_load(&self) -> Result<AggregateLoad, RegistryError> {
        let nodes = self.registry.list_enabled_nodes().await?;
        let loads = self.aggregator.collect(&nodes).await.aggregate_load();

        if let Err(e) = self.history.record(loads.clone(), Utc::now()).await {
            warn!(error = %e, "Failed to record load history");
        }

        Ok(loads)
    }

    /// Last recorded aggregate load.
    pub async fn load_history(&self) -> LoadRecord {
        self.history.load().await
    }
}
