//! HTTP handlers for the text and image pipelines

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::models::{HealthResponse, MessageBody, MODEL_LOADED_MESSAGE, RESET_MESSAGE};
use crate::conversation::{ConversationAccumulator, OutcomeEnvelope};
use crate::error::{AppError, Result};
use crate::metrics::METRICS;
use crate::vision::{ImagePayload, ImageTriageRouter};

const LANDING_PAGE: &str = include_str!("../../static/index.html");

/// State shared by the text routes
#[derive(Clone)]
pub struct AppState {
    pub conversation: Arc<ConversationAccumulator>,
    /// Absent in text-only deployments
    pub triage: Option<Arc<ImageTriageRouter>>,
}

/// State for the image routes, which are only mounted when the image
/// pipeline is enabled
#[derive(Clone)]
pub struct ImageState {
    pub router: Arc<ImageTriageRouter>,
}

fn utterance_from(payload: std::result::Result<Json<String>, JsonRejection>) -> Result<String> {
    let Json(utterance) = payload?;
    if utterance.trim().is_empty() {
        return Err(AppError::BadRequest("message cannot be empty".to_string()));
    }
    Ok(utterance)
}

async fn submit_timed(state: &AppState, utterance: &str, endpoint: &str) -> Result<OutcomeEnvelope> {
    let start = Instant::now();
    let outcome = state.conversation.submit(utterance).await;
    METRICS.observe_duration(endpoint, start.elapsed().as_secs_f64());
    Ok(outcome?)
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// POST /reset
pub async fn reset(State(state): State<AppState>) -> Json<MessageBody> {
    state.conversation.reset().await;
    Json(MessageBody::new(RESET_MESSAGE))
}

/// POST /nb
///
/// Body is a JSON string with one symptom message. The reply is a JSON
/// string: the ranked sentence, or the message itself when it was rejected.
pub async fn diagnose(
    State(state): State<AppState>,
    payload: std::result::Result<Json<String>, JsonRejection>,
) -> Result<Json<String>> {
    let utterance = utterance_from(payload)?;
    let outcome = submit_timed(&state, &utterance, "nb").await?;
    Ok(Json(outcome.message))
}

/// POST /nb/detail
///
/// Same as `/nb` but returns the full outcome, ranking included.
pub async fn diagnose_detail(
    State(state): State<AppState>,
    payload: std::result::Result<Json<String>, JsonRejection>,
) -> Result<Json<OutcomeEnvelope>> {
    let utterance = utterance_from(payload)?;
    let outcome = submit_timed(&state, &utterance, "nb_detail").await?;
    Ok(Json(outcome))
}

/// POST /cnn
///
/// Body is the raw image. Replies with the top diagnostic label and score
/// as a tuple-like JSON string.
pub async fn classify_image(
    State(state): State<ImageState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<String>> {
    let start = Instant::now();
    let result = match body {
        Ok(body) => route_image(&state, &body).await,
        Err(rejection) => Err(rejection.into()),
    };
    METRICS.observe_duration("cnn", start.elapsed().as_secs_f64());

    match &result {
        Ok(_) => METRICS.record_image_request("success"),
        Err(AppError::NotReady) => {
            warn!("Image request rejected: model not loaded yet");
            METRICS.record_image_request("not_ready");
        }
        Err(AppError::DecodeFailure(reason)) => {
            warn!("Image request rejected: {}", reason);
            METRICS.record_image_request("decode_failure");
        }
        Err(AppError::PayloadTooLarge(_)) => {
            warn!("Image request rejected: body over the size limit");
            METRICS.record_image_request("too_large");
        }
        Err(_) => METRICS.record_image_request("error"),
    }

    result.map(|classification| Json(classification.tuple_repr()))
}

async fn route_image(state: &ImageState, body: &[u8]) -> Result<crate::vision::FinalClassification> {
    // Fail fast before spending time on decoding
    if !state.router.model_slot().is_ready_hint() {
        return Err(AppError::NotReady);
    }
    info!("Image request: {} bytes", body.len());
    let image = ImagePayload::decode(body)?;
    state.router.route(&image).await
}

/// GET /cnn
pub async fn image_status(State(state): State<ImageState>) -> Result<Json<MessageBody>> {
    if state.router.is_ready().await {
        Ok(Json(MessageBody::new(MODEL_LOADED_MESSAGE)))
    } else {
        Err(AppError::NotReady)
    }
}

/// GET /health
///
/// Image readiness comes from the lock-free flag, so a health check never
/// waits behind an image being classified. `GET /cnn` checks under the
/// model lock instead.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let image_model_ready = match &state.triage {
        Some(router) => router.model_slot().is_ready_hint(),
        None => false,
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        image_pipeline_enabled: state.triage.is_some(),
        image_model_ready,
    })
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}
