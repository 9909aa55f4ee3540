//! Load aggregation across the node pool.
//!
//! Every node is queried concurrently (login, then inbound enumeration) and
//! the aggregator waits for all of them to settle before returning. A node
//! that fails or exceeds the per-node deadline is recorded as unavailable;
//! it never aborts the pass for the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use hyperbridge_panel::{Inbound, InboundId, PanelError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::gateway::NodeGateway;
use crate::registry::NodeDescriptor;

/// Client counts per inbound label, per node id.
pub type AggregateLoad = BTreeMap<String, BTreeMap<String, usize>>;

/// Load of one node, valid for a single selection decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSnapshot {
    pub node_id: String,
    pub current_users: u64,
    pub users_limit: u64,
    pub first_inbound_id: Option<InboundId>,
}

impl LoadSnapshot {
    /// True while the node is below its nominal capacity.
    pub fn has_capacity(&self) -> bool {
        self.current_users < self.users_limit
    }
}

/// Reduction of a node's inbound enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundSummary {
    /// Sum of client counts over inbounds reporting client stats.
    pub current_users: u64,
    /// First inbound in panel order.
    pub first_inbound_id: Option<InboundId>,
    /// Client count per inbound label, for inbounds with at least one client.
    pub by_label: BTreeMap<String, usize>,
}

/// Reduce an inbound enumeration to the figures the selector needs.
///
/// Inbounds without `clientStats` contribute nothing to the user count.
pub fn summarize_inbounds(inbounds: &[Inbound]) -> InboundSummary {
    let mut summary = InboundSummary {
        first_inbound_id: inbounds.first().map(|i| i.id),
        ..InboundSummary::default()
    };

    for inbound in inbounds {
        let count = inbound.client_count();
        summary.current_users += count as u64;
        if count > 0 {
            *summary.by_label.entry(inbound.label()).or_default() += count;
        }
    }

    summary
}

/// Why a node was left out of a pass.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("authentication failed: {0}")]
    Auth(#[source] PanelError),

    #[error("inbound enumeration failed: {0}")]
    Read(#[source] PanelError),

    #[error("no answer within {0:?}")]
    TimedOut(Duration),
}

/// A node that answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLoad {
    pub snapshot: LoadSnapshot,
    pub inbounds: BTreeMap<String, usize>,
}

/// Outcome of querying one node.
#[derive(Debug)]
pub enum NodeStatus {
    Available(NodeLoad),
    Unavailable(NodeError),
}

impl NodeStatus {
    pub fn load(&self) -> Option<&NodeLoad> {
        match self {
            Self::Available(load) => Some(load),
            Self::Unavailable(_) => None,
        }
    }
}

/// Result of one aggregation pass, in registry order.
#[derive(Debug, Default)]
pub struct LoadReport {
    nodes: Vec<(String, NodeStatus)>,
}

impl LoadReport {
    /// Status of every node, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeStatus)> {
        self.nodes.iter().map(|(id, status)| (id.as_str(), status))
    }

    /// Status of one node.
    pub fn get(&self, node_id: &str) -> Option<&NodeStatus> {
        self.iter()
            .find(|(id, _)| *id == node_id)
            .map(|(_, status)| status)
    }

    /// Snapshots of the nodes that answered, in registry order.
    pub fn available(&self) -> Vec<LoadSnapshot> {
        self.nodes
            .iter()
            .filter_map(|(_, status)| status.load())
            .map(|load| load.snapshot.clone())
            .collect()
    }

    pub fn unavailable_count(&self) -> usize {
        self.nodes.len() - self.available_count()
    }

    pub fn available_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|(_, status)| status.load().is_some())
            .count()
    }

    /// Per-inbound client counts of the nodes that answered.
    pub fn aggregate_load(&self) -> AggregateLoad {
        self.nodes
            .iter()
            .filter_map(|(id, status)| status.load().map(|load| (id.clone(), load.inbounds.clone())))
            .collect()
    }
}

/// Fans load queries out over the node pool.
pub struct LoadAggregator {
    gateway: Arc<dyn NodeGateway>,
    node_timeout: Duration,
}

impl LoadAggregator {
    /// Create an aggregator that gives each node `node_timeout` to answer.
    pub fn new(gateway: Arc<dyn NodeGateway>, node_timeout: Duration) -> Self {
        Self {
            gateway,
            node_timeout,
        }
    }

    /// Query every node and wait for all of them to settle.
    #[instrument(skip_all, fields(node_count = nodes.len()))]
    pub async fn collect(&self, nodes: &[NodeDescriptor]) -> LoadReport {
        let probes = nodes.iter().map(|node| async move {
            let status = match self.read_node(node).await {
                Ok(load) => {
                    debug!(
                        node_id = %node.id,
                        current_users = load.snapshot.current_users,
                        users_limit = load.snapshot.users_limit,
                        "Node load read"
                    );
                    NodeStatus::Available(load)
                }
                Err(e) => {
                    warn!(node_id = %node.id, error = %e, "Node unavailable");
                    NodeStatus::Unavailable(e)
                }
            };
            (node.id.clone(), status)
        });

        // join_all yields results in input order, which is registry order.
        let report = LoadReport {
            nodes: join_all(probes).await,
        };

        info!(
            available = report.available_count(),
            unavailable = report.unavailable_count(),
            "Load aggregation complete"
        );

        report
    }

    /// Authenticate against one node and read its load, bounded by the node deadline.
    pub async fn read_node(&self, node: &NodeDescriptor) -> Result<NodeLoad, NodeError> {
        match tokio::time::timeout(self.node_timeout, self.query_node(node)).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::TimedOut(self.node_timeout)),
        }
    }

    /// A panel request that ran out of time is a timed-out node, whichever step it hit.
    fn node_error(&self, e: PanelError, step: fn(PanelError) -> NodeError) -> NodeError {
        if e.is_timeout() {
            NodeError::TimedOut(self.node_timeout)
        } else {
            step(e)
        }
    }

    async fn query_node(&self, node: &NodeDescriptor) -> Result<NodeLoad, NodeError> {
        let session = self
            .gateway
            .authenticate(node)
            .await
            .map_err(|e| self.node_error(e, NodeError::Auth))?;

        let inbounds = self
            .gateway
            .list_inbounds(node, &session)
            .await
            .map_err(|e| self.node_error(e, NodeError::Read))?;

        let summary = summarize_inbounds(&inbounds);

        Ok(NodeLoad {
            snapshot: LoadSnapshot {
                node_id: node.id.clone(),
                current_users: summary.current_users,
                users_limit: node.users_limit,
                first_inbound_id: summary.first_inbound_id,
            },
            inbounds: summary.by_label,
        })
    }
}
