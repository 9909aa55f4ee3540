//! In-memory gateway used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hyperbridge_panel::{ClientSpec, ClientStat, Inbound, InboundId, PanelError, SessionToken};
use reqwest::StatusCode;

use crate::gateway::NodeGateway;
use crate::registry::NodeDescriptor;

/// How a fake node behaves.
#[derive(Debug, Clone)]
pub(crate) enum FakeNode {
    Healthy(Vec<Inbound>),
    LoginFails,
    ListFails,
    AddFails(Vec<Inbound>),
    Hangs,
}

pub(crate) fn inbound(id: InboundId, remark: &str, clients: Option<usize>) -> Inbound {
    Inbound {
        id,
        remark: Some(remark.to_string()),
        client_stats: clients.map(|n| vec![ClientStat::default(); n]),
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    nodes: HashMap<String, FakeNode>,
    logins: AtomicUsize,
    added: Mutex<Vec<(String, InboundId, ClientSpec)>>,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_node(mut self, id: &str, behaviour: FakeNode) -> Self {
        self.nodes.insert(id.to_string(), behaviour);
        self
    }

    pub(crate) fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn added_clients(&self) -> Vec<(String, InboundId, ClientSpec)> {
        self.added.lock().unwrap().clone()
    }

    fn behaviour(&self, node: &NodeDescriptor) -> FakeNode {
        self.nodes.get(&node.id).cloned().unwrap_or(FakeNode::LoginFails)
    }
}

#[async_trait]
impl NodeGateway for FakeGateway {
    async fn authenticate(&self, node: &NodeDescriptor) -> Result<SessionToken, PanelError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        match self.behaviour(node) {
            FakeNode::LoginFails => Err(PanelError::MissingSessionCookie),
            FakeNode::Hangs => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(PanelError::MissingSessionCookie)
            }
            _ => Ok(SessionToken::new(
                format!("session={}", node.id),
                node.api_url.clone(),
            )),
        }
    }

    async fn list_inbounds(
        &self,
        node: &NodeDescriptor,
        _session: &SessionToken,
    ) -> Result<Vec<Inbound>, PanelError> {
        match self.behaviour(node) {
            FakeNode::Healthy(inbounds) | FakeNode::AddFails(inbounds) => Ok(inbounds),
            _ => Err(PanelError::Rejected {
                operation: "list inbounds",
                message: "unavailable".to_string(),
            }),
        }
    }

    async fn add_client(
        &self,
        node: &NodeDescriptor,
        _session: &SessionToken,
        inbound_id: InboundId,
        client: &ClientSpec,
    ) -> Result<(), PanelError> {
        match self.behaviour(node) {
            FakeNode::Healthy(_) => {
                self.added
                    .lock()
                    .unwrap()
                    .push((node.id.clone(), inbound_id, client.clone()));
                Ok(())
            }
            _ => Err(PanelError::UnexpectedStatus {
                operation: "add client",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            }),
        }
    }
}
