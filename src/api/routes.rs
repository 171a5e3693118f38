//! Router assembly

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState, ImageState};
use crate::config::ServerConfig;

/// Text pipeline, reset, landing page and operational endpoints
fn build_text_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/reset", post(handlers::reset))
        .route("/nb", post(handlers::diagnose))
        .route("/nb/detail", post(handlers::diagnose_detail))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

/// Image pipeline endpoints
pub fn build_image_routes(state: ImageState) -> Router {
    Router::new()
        .route(
            "/cnn",
            get(handlers::image_status).post(handlers::classify_image),
        )
        .with_state(state)
}

/// Build the full application router.
///
/// The image routes are mounted only when the application state carries a
/// triage router.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let image_routes = state
        .triage
        .clone()
        .map(|router| build_image_routes(ImageState { router }));

    let mut app = build_text_routes(state);
    if let Some(image_routes) = image_routes {
        app = app.merge(image_routes);
    }

    // Oversized bodies surface as extractor rejections, which the handlers
    // turn into JSON errors
    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(server.max_body_bytes)),
    )
}
