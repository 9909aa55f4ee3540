//! Credential issuance endpoint.

use std::num::NonZeroU32;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::broker::IssueError;
use crate::state::AppState;

/// Longest validity a single key may be issued for.
pub const MAX_PERIOD_MONTHS: u32 = 120;

pub fn routes() -> Router<AppState> {
    Router::new().route("/get-key", get(get_key))
}

#[derive(Debug, Deserialize)]
pub struct GetKeyQuery {
    /// Validity in months, as sent by the client (may be empty).
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct GetKeyResponse {
    pub vless: String,
}

/// Validity requested by `period`; absent or blank means one month.
pub fn parse_period(period: Option<&str>) -> Result<NonZeroU32, String> {
    let raw = match period.map(str::trim) {
        None | Some("") => return Ok(NonZeroU32::MIN),
        Some(raw) => raw,
    };

    raw.parse::<u32>()
        .ok()
        .filter(|months| *months <= MAX_PERIOD_MONTHS)
        .and_then(NonZeroU32::new)
        .ok_or_else(|| {
            format!("period must be a whole number of months between 1 and {MAX_PERIOD_MONTHS}")
        })
}

/// Issue a credential on the least-loaded node.
///
/// GET /get-key?period={months}
async fn get_key(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<GetKeyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    let months = parse_period(query.period.as_deref()).map_err(|detail| {
        ApiError::bad_request("invalid-period", detail).with_request_id(request_id.clone())
    })?;

    let issued = state
        .broker()
        .issue_credential(months)
        .await
        .map_err(|e| issue_error(e, &request_id))?;

    info!(
        request_id = %request_id,
        node_id = %issued.node_id,
        months = months.get(),
        "Key issued"
    );

    Ok(Json(GetKeyResponse {
        vless: issued.descriptor.into_string(),
    }))
}

fn issue_error(err: IssueError, request_id: &str) -> ApiError {
    match err {
        IssueError::NoAvailableNodes => {
            warn!(request_id = %request_id, "No panel answered the load query");
            ApiError::service_unavailable("no-available-nodes", "No node is available right now")
        }
        IssueError::Provision { node_id, source } => {
            error!(
                request_id = %request_id,
                node_id = %node_id,
                step = source.kind(),
                error = %source,
                "Failed to provision key"
            );
            ApiError::service_unavailable(
                "provisioning-failed",
                format!("Failed to create a key on node {node_id}"),
            )
        }
        IssueError::Registry(e) => {
            error!(request_id = %request_id, error = %e, "Failed to read node registry");
            ApiError::internal("registry-unavailable", "Failed to read node registry")
        }
    }
    .with_request_id(request_id)
}
