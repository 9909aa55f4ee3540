//! HTTP API handlers and routing.

pub mod error;
mod health;
mod keys;
mod loads;
pub mod request_context;

use axum::{
    http::{header, HeaderName, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

pub use keys::{parse_period, MAX_PERIOD_MONTHS};

/// Create the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(request_context::REQUEST_ID_HEADER);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .merge(health::routes())
        .merge(keys::routes())
        .merge(loads::routes())
        // Layers run bottom-up: the id is set before tracing sees the request.
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}
