//! Real-time collaboration gateway.
//!
//! Clients connect over a WebSocket at `/ws`, join document rooms, and
//! exchange edits, cursors, selections, comments and presence with everyone
//! else in the room. State is held in memory by one [`ws::CollabHub`] per
//! server process; delivery is best-effort with no acknowledgements.

pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod websocket;
pub mod ws;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::docs::ApiDoc;
use crate::routes::create_api_routes;
use crate::websocket::handler::websocket_handler;
use crate::ws::CollabHub;

/// State shared by every handler for the lifetime of the server
pub struct AppState {
    pub hub: Arc<CollabHub>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let hub = CollabHub::new(config.evict_empty_sessions, config.outbound_queue_capacity);
        Self {
            hub: Arc::new(hub),
            config,
        }
    }
}

/// Build the full application router
pub fn create_app(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        // Mount API routes
        .nest("/api", create_api_routes())
        // Collaboration socket
        .route("/ws", get(websocket_handler))
        .with_state(app_state)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match config.allowed_origins() {
        Some(origins) => {
            let values: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin '{}'", origin);
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
        None => layer.allow_origin(Any),
    }
}
