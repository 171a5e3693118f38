//! HTTP boundary
//!
//! - GET  /          landing page
//! - POST /reset     clear the conversation
//! - POST /nb        submit a symptom message
//! - POST /nb/detail submit a symptom message, full outcome
//! - POST /cnn       classify an image
//! - GET  /cnn       image model readiness
//! - GET  /health
//! - GET  /metrics

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::{AppState, ImageState};
pub use routes::{build_image_routes, build_router};
