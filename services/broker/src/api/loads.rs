//! Pool inspection endpoints.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::registry::RegistryError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_servers))
        .route("/loads", get(get_loads))
        .route("/loads/history", get(get_load_history))
}

#[derive(Debug, Serialize)]
pub struct ServerSummary {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ListServersResponse {
    pub servers: Vec<ServerSummary>,
}

fn registry_error(e: RegistryError, request_id: &str) -> ApiError {
    tracing::error!(error = %e, request_id = %request_id, "Failed to read node registry");
    ApiError::internal("registry-unavailable", "Failed to read node registry")
        .with_request_id(request_id)
}

/// Enabled node ids. Credentials and panel URLs are never exposed.
///
/// GET /servers
async fn list_servers(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = state
        .broker()
        .list_nodes()
        .await
        .map_err(|e| registry_error(e, &ctx.request_id))?;

    let servers = nodes
        .into_iter()
        .map(|n| ServerSummary { id: n.id })
        .collect();

    Ok(Json(ListServersResponse { servers }))
}

/// Client count per inbound label for each reachable node.
///
/// GET /loads
async fn get_loads(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let loads = state
        .broker()
        .aggregate_load()
        .await
        .map_err(|e| registry_error(e, &ctx.request_id))?;

    Ok(Json(loads))
}

/// Last recorded aggregate load.
///
/// GET /loads/history
async fn get_load_history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.broker().load_history().await)
}
