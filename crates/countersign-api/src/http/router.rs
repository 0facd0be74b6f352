//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Orders (read side)
        .route("/orders", get(handlers::order::list_orders))
        .route("/orders/{id}", get(handlers::order::get_order))
        .route(
            "/orders/by-number/{po_number}",
            get(handlers::order::get_order_by_number),
        )
        // Signing
        .route(
            "/orders/{id}/signatures",
            post(handlers::order::request_signature),
        )
        // Amendment proposals
        .route(
            "/orders/{id}/proposals",
            post(handlers::proposal::create_proposal),
        )
        .route(
            "/orders/by-number/{po_number}/decision",
            post(handlers::proposal::decide_by_po_number),
        )
        .route(
            "/proposals/{id}/decision",
            post(handlers::proposal::decide),
        )
        // Supplier decision link (token-authenticated)
        .route(
            "/proposals/decision",
            post(handlers::proposal::decide_with_token),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
