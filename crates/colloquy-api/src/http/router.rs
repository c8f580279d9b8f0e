//! Axum router configuration with middleware.
//!
//! Chat routes are under `/v1/` and require a bearer token.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use colloquy_types::config::CorsConfig;
use colloquy_types::error::ServiceError;

use crate::http::error::AppError;
use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let api_routes = Router::new()
        .route(
            "/chats",
            get(handlers::chat::list_chats)
                .post(handlers::chat::create_chat)
                .fallback(method_not_allowed),
        )
        .route(
            "/chats/{chat_id}/messages",
            get(handlers::message::list_messages)
                .post(handlers::message::append_message)
                .fallback(method_not_allowed),
        );

    Router::new()
        .nest("/v1", api_routes)
        .route("/health", get(health_check).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy from configuration. `"*"` anywhere in the list allows any origin.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> AppError {
    AppError(ServiceError::not_found(""))
}

/// Known path, unsupported method. Reported as a missing resource.
async fn method_not_allowed(method: Method) -> AppError {
    AppError(ServiceError::not_found("").with_detail("method", method.as_str()))
}
