use reqwest::StatusCode;
use thiserror::Error;

/// Result type for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;

/// Errors returned by the panel client.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The node's `apiUrl`/`webBasePath` do not form a usable base URL.
    #[error("invalid panel url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection, TLS or timeout failure.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Login answered with a status that is neither success nor redirect.
    #[error("login rejected with status {status}")]
    LoginRejected { status: StatusCode },

    /// Login answered without any `Set-Cookie` header.
    #[error("login response carried no session cookie")]
    MissingSessionCookie,

    #[error("{operation} failed (status={status}): {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The panel replied 2xx but reported `"success": false`.
    #[error("{operation} rejected by panel: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned an unexpected body: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("session issued by {issued_by} cannot be used against {target}")]
    ForeignSession { issued_by: String, target: String },

    #[error("failed to encode client settings: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PanelError {
    /// Returns true if the failure was the HTTP client's timeout firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}
