use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

use crate::error::handle_panic;
use crate::handlers::{ask, health_check, root, verify};
use crate::state::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ask", post(ask))
        .route("/verify", post(verify))
}

/// Routes plus the middleware stack, ready to serve.
pub fn build_app(state: AppState) -> Router {
    create_routes()
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
