//! HTTP client for a single node's panel.

use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::{redirect, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{PanelError, PanelResult};
use crate::session::{session_cookie, SessionToken};
use crate::types::{AddClientRequest, ClientSettings, ClientSpec, Inbound, InboundId, PanelReply};

const LOGIN_PATH: &str = "login";
const LIST_INBOUNDS_PATH: &str = "panel/api/inbounds/list";
const ADD_CLIENT_PATH: &str = "panel/api/inbounds/addClient";

/// Build the shared HTTP client used for panel calls.
///
/// Redirects are not followed: a successful login may answer with a redirect
/// and the session cookie rides on that response.
pub fn build_http_client(timeout: Duration) -> PanelResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Panel API client bound to one node.
#[derive(Debug, Clone)]
pub struct PanelClient {
    http: reqwest::Client,
    base: Url,
}

impl PanelClient {
    /// Create a client for the panel at `api_url` served under `web_base_path`.
    ///
    /// The base path is joined as an absolute path, so any path already present
    /// on `api_url` is replaced.
    pub fn new(http: reqwest::Client, api_url: &str, web_base_path: &str) -> PanelResult<Self> {
        let invalid = |reason: String| PanelError::InvalidUrl {
            url: api_url.to_string(),
            reason,
        };

        let api_url = Url::parse(api_url).map_err(|e| invalid(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(invalid("url cannot be used as a base".to_string()));
        }

        let trimmed = web_base_path.trim_matches('/');
        let base_path = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        };
        let base = api_url
            .join(&base_path)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self { http, base })
    }

    /// Base URL every panel path is resolved against (always ends in `/`).
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> PanelResult<Url> {
        self.base.join(path).map_err(|e| PanelError::InvalidUrl {
            url: self.base.to_string(),
            reason: e.to_string(),
        })
    }

    fn check_session(&self, session: &SessionToken) -> PanelResult<()> {
        if session.issued_by() != self.base.as_str() {
            return Err(PanelError::ForeignSession {
                issued_by: session.issued_by().to_string(),
                target: self.base.to_string(),
            });
        }
        Ok(())
    }

    /// Log in and return the session cookie.
    pub async fn login(&self, username: &str, password: &str) -> PanelResult<SessionToken> {
        let url = self.endpoint(LOGIN_PATH)?;
        debug!(url = %url, "Logging in to panel");

        let response = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        let cookie = session_cookie(response.headers());

        if !status.is_success() && !status.is_redirection() {
            warn!(base = %self.base, status = %status, "Panel login rejected");
            return Err(PanelError::LoginRejected { status });
        }

        let cookie = cookie.ok_or(PanelError::MissingSessionCookie)?;
        Ok(SessionToken::new(cookie, self.base.to_string()))
    }

    /// Fetch every inbound on the node, in the panel's own order.
    pub async fn list_inbounds(&self, session: &SessionToken) -> PanelResult<Vec<Inbound>> {
        const OPERATION: &str = "list inbounds";

        self.check_session(session)?;
        let url = self.endpoint(LIST_INBOUNDS_PATH)?;
        debug!(url = %url, "Listing panel inbounds");

        let response = self
            .http
            .get(url)
            .header(COOKIE, session.cookie_header())
            .send()
            .await?;

        let reply: PanelReply<Vec<Inbound>> = decode_reply(OPERATION, response).await?;
        if !reply.success {
            return Err(PanelError::Rejected {
                operation: OPERATION,
                message: reply.msg,
            });
        }

        let inbounds = reply.obj.unwrap_or_default();
        debug!(inbound_count = inbounds.len(), "Listed panel inbounds");
        Ok(inbounds)
    }

    /// Attach a new client to `inbound_id`.
    pub async fn add_client(
        &self,
        session: &SessionToken,
        inbound_id: InboundId,
        client: &ClientSpec,
    ) -> PanelResult<()> {
        const OPERATION: &str = "add client";

        self.check_session(session)?;
        let url = self.endpoint(ADD_CLIENT_PATH)?;

        let settings = serde_json::to_string(&ClientSettings {
            clients: std::slice::from_ref(client),
        })?;
        let body = AddClientRequest {
            id: inbound_id,
            settings,
        };

        debug!(url = %url, inbound_id, email = %client.email, "Adding panel client");

        let response = self
            .http
            .post(url)
            .header(COOKIE, session.cookie_header())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PanelError::UnexpectedStatus {
                operation: OPERATION,
                status,
                body: text,
            });
        }

        // Older panels answer with an empty body; only an explicit
        // `"success": false` counts as a rejection.
        if let Ok(reply) = serde_json::from_str::<PanelReply<serde_json::Value>>(&text) {
            if !reply.success {
                return Err(PanelError::Rejected {
                    operation: OPERATION,
                    message: reply.msg,
                });
            }
        }

        Ok(())
    }
}

async fn decode_reply<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> PanelResult<PanelReply<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PanelError::UnexpectedStatus {
            operation,
            status,
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| PanelError::Decode {
        operation,
        reason: e.to_string(),
    })
}
