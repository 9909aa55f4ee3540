//! VLESS connection descriptor construction.
//!
//! The descriptor format is parsed by existing client applications and must
//! not drift:
//!
//! ```text
//! vless://{uuid}@{host}:{port}?type=tcp&encryption=none&security=..&pbk=..&fp=..&sni=..&sid=..&spx=..%2F#{brand}-{node_id}
//! ```
//!
//! Query values are form-urlencoded. The trailing `%2F` after the query is
//! part of the format.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::registry::NodeDescriptor;

/// Port used when a node does not set `publicPort`.
pub const DEFAULT_PUBLIC_PORT: u16 = 443;

/// Errors building a connection descriptor.
#[derive(Debug, Error)]
pub enum LinkBuildError {
    #[error("node {node_id} is missing required link parameter `{field}`")]
    MissingParameter {
        node_id: String,
        field: &'static str,
    },

    #[error("failed to encode link parameters: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
}

/// Connection URI handed to the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor(String);

impl ConnectionDescriptor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn required<'a>(
    node: &'a NodeDescriptor,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, LinkBuildError> {
    value.as_deref().ok_or_else(|| LinkBuildError::MissingParameter {
        node_id: node.id.clone(),
        field,
    })
}

/// Build the descriptor for `credential_id` on `node`.
///
/// Purely local and deterministic. `publicHost` must be non-empty; the reality
/// parameters must be present but may be empty strings (an empty short id is
/// a valid reality configuration).
pub fn build_vless_link(
    node: &NodeDescriptor,
    credential_id: &Uuid,
    brand: &str,
) -> Result<ConnectionDescriptor, LinkBuildError> {
    let host = required(node, "publicHost", &node.public_host)?.trim();
    if host.is_empty() {
        return Err(LinkBuildError::MissingParameter {
            node_id: node.id.clone(),
            field: "publicHost",
        });
    }
    let port = node.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);

    let params = [
        ("type", "tcp"),
        ("encryption", "none"),
        ("security", required(node, "security", &node.security)?),
        ("pbk", required(node, "pbk", &node.pbk)?),
        ("fp", required(node, "fp", &node.fp)?),
        ("sni", required(node, "sni", &node.sni)?),
        ("sid", required(node, "sid", &node.sid)?),
        ("spx", required(node, "spx", &node.spx)?),
    ];
    let query = serde_urlencoded::to_string(params.as_slice())?;

    Ok(ConnectionDescriptor(format!(
        "vless://{credential_id}@{host}:{port}?{query}%2F#{brand}-{node_id}",
        node_id = node.id,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::node;
    use reqwest::Url;

    const CREDENTIAL: &str = "6f1c2a7e-8b3d-4e5f-9a0b-1c2d3e4f5a6b";

    fn credential() -> Uuid {
        CREDENTIAL.parse().unwrap()
    }

    #[test]
    fn test_exact_format() {
        let link = build_vless_link(&node("fi-1"), &credential(), "HyperVPN").unwrap();
        assert_eq!(
            link.as_str(),
            "vless://6f1c2a7e-8b3d-4e5f-9a0b-1c2d3e4f5a6b@fi-1.vpn.example:443\
             ?type=tcp&encryption=none&security=reality&pbk=pubkey&fp=chrome\
             &sni=www.example.com&sid=ab12&spx=%2F%2F#HyperVPN-fi-1"
        );
    }

    #[test]
    fn test_is_deterministic() {
        let a = build_vless_link(&node("a"), &credential(), "HyperVPN").unwrap();
        let b = build_vless_link(&node("a"), &credential(), "HyperVPN").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parses_back_to_host_port_and_credential() {
        let mut descriptor = node("de-2");
        descriptor.public_port = Some(8443);
        let link = build_vless_link(&descriptor, &credential(), "HyperVPN").unwrap();

        let url = Url::parse(link.as_str()).unwrap();
        assert_eq!(url.scheme(), "vless");
        assert_eq!(url.username(), CREDENTIAL);
        assert_eq!(url.host_str(), Some("de-2.vpn.example"));
        assert_eq!(url.port(), Some(8443));
        assert_eq!(url.fragment(), Some("HyperVPN-de-2"));

        let params: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(params[0], ("type".to_string(), "tcp".to_string()));
        assert_eq!(params[1], ("encryption".to_string(), "none".to_string()));
    }

    #[test]
    fn test_default_port() {
        let mut descriptor = node("a");
        descriptor.public_port = None;
        let link = build_vless_link(&descriptor, &credential(), "HyperVPN").unwrap();
        assert!(link.as_str().contains("@a.vpn.example:443?"));
    }

    #[test]
    fn test_values_are_form_encoded() {
        let mut descriptor = node("a");
        descriptor.pbk = Some("a+b/c=".to_string());
        descriptor.sni = Some("my host".to_string());
        let link = build_vless_link(&descriptor, &credential(), "HyperVPN").unwrap();

        assert!(link.as_str().contains("pbk=a%2Bb%2Fc%3D"));
        assert!(link.as_str().contains("sni=my+host"));
    }

    #[test]
    fn test_empty_short_id_allowed() {
        let mut descriptor = node("a");
        descriptor.sid = Some(String::new());
        let link = build_vless_link(&descriptor, &credential(), "HyperVPN").unwrap();
        assert!(link.as_str().contains("&sid=&spx="));
    }

    #[test]
    fn test_missing_parameters() {
        let mut no_host = node("a");
        no_host.public_host = Some("  ".to_string());
        assert!(matches!(
            build_vless_link(&no_host, &credential(), "HyperVPN"),
            Err(LinkBuildError::MissingParameter { field: "publicHost", .. })
        ));

        let mut no_pbk = node("a");
        no_pbk.pbk = None;
        assert!(matches!(
            build_vless_link(&no_pbk, &credential(), "HyperVPN"),
            Err(LinkBuildError::MissingParameter { field: "pbk", .. })
        ));
    }
}
