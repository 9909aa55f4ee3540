//! Wire types for the panel API.

use serde::{Deserialize, Serialize};

/// Inbound identifier as assigned by the panel.
pub type InboundId = i64;

/// Envelope the panel wraps every JSON reply in.
#[derive(Debug, Deserialize)]
pub(crate) struct PanelReply<T> {
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Option::default")]
    pub obj: Option<T>,
}

/// One inbound from `GET /panel/api/inbounds/list`.
///
/// Only the fields the broker reads are decoded; everything else the panel
/// sends is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub id: InboundId,
    #[serde(default)]
    pub remark: Option<String>,
    /// Per-client traffic records. Absent or `null` on inbounds that have
    /// never had clients.
    #[serde(default)]
    pub client_stats: Option<Vec<ClientStat>>,
}

impl Inbound {
    /// Number of clients attached to this inbound (zero without stats).
    pub fn client_count(&self) -> usize {
        self.client_stats.as_ref().map_or(0, Vec::len)
    }

    /// Display label: the remark, or `inbound-{id}` when the remark is blank.
    pub fn label(&self) -> String {
        match self.remark.as_deref().map(str::trim) {
            Some(remark) if !remark.is_empty() => remark.to_string(),
            _ => format!("inbound-{}", self.id),
        }
    }
}

/// Traffic record for a single client of an inbound.
///
/// Clients are only counted, so the record's contents are not decoded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientStat {}

/// Client object submitted to `addClient`.
///
/// Field order matters: it is serialized in declaration order and panels have
/// been seen to compare settings textually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSpec {
    pub id: String,
    pub email: String,
    pub flow: String,
    #[serde(rename = "totalGB")]
    pub total_gb: u64,
    /// Hard expiry in epoch milliseconds.
    pub expiry_time: i64,
    pub enable: bool,
}

impl ClientSpec {
    /// An enabled client with no data cap and an empty flow.
    pub fn unlimited(id: impl Into<String>, email: impl Into<String>, expiry_time: i64) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            flow: String::new(),
            total_gb: 0,
            expiry_time,
            enable: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ClientSettings<'a> {
    pub clients: &'a [ClientSpec],
}

#[derive(Debug, Serialize)]
pub(crate) struct AddClientRequest {
    pub id: InboundId,
    /// JSON-encoded [`ClientSettings`]; the panel expects a string here.
    pub settings: String,
}
