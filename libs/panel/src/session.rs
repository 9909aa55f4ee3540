//! Panel session tokens.

use std::fmt;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Session obtained from one panel's login endpoint.
///
/// The token remembers the base URL of the panel that issued it; the client
/// refuses to present it to any other panel.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    cookie: String,
    issued_by: String,
}

impl SessionToken {
    /// Wrap a cookie value issued by the panel at `issued_by`.
    pub fn new(cookie: String, issued_by: String) -> Self {
        Self { cookie, issued_by }
    }

    /// Value to send in the `Cookie` request header.
    pub fn cookie_header(&self) -> &str {
        &self.cookie
    }

    /// Base URL of the panel that issued this session.
    pub fn issued_by(&self) -> &str {
        &self.issued_by
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("cookie", &"<redacted>")
            .field("issued_by", &self.issued_by)
            .finish()
    }
}

/// Collapse every `Set-Cookie` header into a single `Cookie` header value.
///
/// Attributes (`Path`, `HttpOnly`, `Max-Age`, ...) are dropped; only the
/// `name=value` pairs are kept, in the order the server sent them.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
