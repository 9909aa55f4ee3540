//! Client for the remote x-ui panel API.
//!
//! Every hyperbridge node runs an x-ui panel. The broker only needs three calls
//! from it, and their wire format is a third-party contract that must be
//! reproduced exactly:
//!
//! - `POST {base}/login` (form-encoded credentials, session returned as a cookie)
//! - `GET {base}/panel/api/inbounds/list`
//! - `POST {base}/panel/api/inbounds/addClient`
//!
//! Nothing in this crate panics on a misbehaving panel; every failure is a
//! [`PanelError`] so callers can degrade per node.

mod client;
mod error;
mod session;
mod types;

pub use client::{build_http_client, PanelClient};
pub use error::{PanelError, PanelResult};
pub use session::SessionToken;
pub use types::{ClientSpec, ClientStat, Inbound, InboundId};
