//! Node registry reader.
//!
//! The registry is a JSON file (`servers.json`) maintained by operators:
//!
//! ```json
//! { "servers": [ { "id": "fi-1", "apiUrl": "https://...", ... } ] }
//! ```
//!
//! It is re-read on every request and handed to the pipeline by value, so an
//! edit takes effect on the next request without a restart.

use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, warn};

/// Result type for registry reads.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors reading the node registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One backend node as described in the registry.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub id: String,
    pub api_url: String,
    #[serde(default)]
    pub web_base_path: String,
    pub username: String,
    pub password: String,
    pub users_limit: u64,

    pub public_host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub public_port: Option<u16>,
    pub security: Option<String>,
    pub pbk: Option<String>,
    pub fp: Option<String>,
    pub sni: Option<String>,
    pub sid: Option<String>,
    pub spx: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Ports show up both as numbers and as strings in hand-edited registries.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match Option::<RawPort>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawPort::Number(port)) => Ok(Some(port)),
        Some(RawPort::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port {text:?}"))),
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("api_url", &self.api_url)
            .field("web_base_path", &self.web_base_path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("users_limit", &self.users_limit)
            .field("public_host", &self.public_host)
            .field("public_port", &self.public_port)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    servers: Option<Vec<serde_json::Value>>,
}

/// Parse registry file contents into the enabled nodes, in file order.
///
/// Entries that fail to parse, and entries repeating an earlier id, are
/// skipped with a warning rather than taking the whole registry down.
pub fn parse_registry(content: &str) -> Result<Vec<NodeDescriptor>, serde_json::Error> {
    let file: RegistryFile = serde_json::from_str(content)?;

    let mut seen = HashSet::new();
    let mut nodes = Vec::new();

    for (index, raw) in file.servers.unwrap_or_default().into_iter().enumerate() {
        let node: NodeDescriptor = match serde_json::from_value(raw) {
            Ok(node) => node,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed registry entry");
                continue;
            }
        };

        if !node.enabled {
            continue;
        }

        if !seen.insert(node.id.clone()) {
            warn!(node_id = %node.id, "Skipping duplicate registry entry");
            continue;
        }

        nodes.push(node);
    }

    Ok(nodes)
}

/// File-backed node registry.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    path: PathBuf,
}

impl NodeRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the registry and return every enabled node.
    ///
    /// A missing file is an empty registry.
    pub async fn list_enabled_nodes(&self) -> RegistryResult<Vec<NodeDescriptor>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No registry file, no nodes");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        parse_registry(&content).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}
