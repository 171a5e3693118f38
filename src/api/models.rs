//! Request/response bodies for the HTTP API

use serde::{Deserialize, Serialize};

pub const RESET_MESSAGE: &str = "All messages have been cleared.";
pub const MODEL_LOADED_MESSAGE: &str = "Model is loaded.";

/// `{"message": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Liveness plus image model readiness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub image_pipeline_enabled: bool,
    /// Lock-free readiness flag of the image model
    pub image_model_ready: bool,
}
