//! HTTP-level tests for the diagnostic service
//!
//! The router is driven in-process with stub collaborators: a keyword
//! text classifier and a scripted zero-shot image model.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use symptom_triage::api::{build_router, AppState};
use symptom_triage::classifier::{ClassifierError, LabelScore, Prediction, TextClassifier};
use symptom_triage::config::{ServerConfig, TextModelConfig};
use symptom_triage::conversation::{ConversationAccumulator, GatePolicy, ReplyConfig};
use symptom_triage::vision::{
    BackgroundRemover, ImageClassifier, ImageModelSlot, ImagePayload, ImageTriageRouter,
    TriageVocabulary,
};

const CLASSES: [&str; 6] = [
    "Eczema",
    "Psoriasis",
    "Arthritis",
    "Migraine",
    "Common Cold",
    "Strep Throat",
];

/// Each keyword adds one vote to its class on top of a uniform prior of one
/// vote per class. Text without keywords is uniform (1/6).
struct KeywordClassifier;

impl KeywordClassifier {
    fn class_of(word: &str) -> Option<usize> {
        match word {
            "itchy" => Some(0),
            "red" | "patches" => Some(1),
            "joint" | "pain" => Some(2),
            "headache" => Some(3),
            "cough" => Some(4),
            "sore" | "throat" => Some(5),
            _ => None,
        }
    }
}

impl TextClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Prediction, ClassifierError> {
        // Exactly on the cut point
        if text == "mild tiredness" {
            let mut pairs = vec![(CLASSES[0], 0.20)];
            pairs.extend(CLASSES[1..].iter().map(|c| (*c, 0.16)));
            return Ok(Prediction::from_pairs(pairs));
        }

        let mut votes = [1.0_f64; 6];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if let Some(idx) = Self::class_of(&word.to_lowercase()) {
                votes[idx] += 1.0;
            }
        }
        let total: f64 = votes.iter().sum();
        Ok(Prediction::from_pairs(
            CLASSES.iter().zip(votes.iter()).map(|(c, v)| (*c, v / total)),
        ))
    }
}

/// Triage pass answers with a fixed region, diagnostic pass with a fixed
/// condition.
struct ScriptedImageModel {
    region: &'static str,
}

#[async_trait]
impl ImageClassifier for ScriptedImageModel {
    async fn classify(
        &self,
        _image: &ImagePayload,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        let winner = if labels.iter().any(|l| l == self.region) {
            self.region
        } else if labels.iter().any(|l| l == "throat") {
            // Triage pass for a region not in the vocabulary
            "throat"
        } else if self.region == "throat" {
            "strep throat"
        } else {
            "eczema"
        };
        let mut scores = vec![LabelScore::new(winner, 0.8731)];
        scores.extend(
            labels
                .iter()
                .filter(|l| l.as_str() != winner)
                .map(|l| LabelScore::new(l.clone(), 0.01)),
        );
        Ok(scores)
    }
}

/// Scores only labels that were never offered as candidates
struct OffVocabularyModel;

#[async_trait]
impl ImageClassifier for OffVocabularyModel {
    async fn classify(
        &self,
        _image: &ImagePayload,
        _labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        Ok(vec![
            LabelScore::new("a dog", 0.9),
            LabelScore::new("not-a-diagnosis", 0.9),
        ])
    }
}

#[derive(Default)]
struct CountingRemover {
    calls: AtomicUsize,
}

#[async_trait]
impl BackgroundRemover for CountingRemover {
    async fn isolate_subject(&self, image: &ImagePayload) -> Result<ImagePayload, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ImagePayload::from_png(image.png_bytes().clone())
    }
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn vocabulary() -> TriageVocabulary {
    TriageVocabulary::new(
        labels(&["throat", "skin", "lips", "eyes"]),
        labels(&["throat", "lips", "eyes"]),
        labels(&["acne", "eczema", "psoriasis", "strep throat", "tonsillitis"]),
    )
    .unwrap()
}

fn conversation() -> Arc<ConversationAccumulator> {
    Arc::new(ConversationAccumulator::new(
        Arc::new(KeywordClassifier),
        GatePolicy::three_way(),
        ReplyConfig::default(),
    ))
}

struct Harness {
    app: Router,
    slot: Arc<ImageModelSlot>,
    remover: Arc<CountingRemover>,
}

fn harness(slot: ImageModelSlot) -> Harness {
    harness_with_server(slot, ServerConfig::default())
}

fn harness_with_server(slot: ImageModelSlot, server: ServerConfig) -> Harness {
    let slot = Arc::new(slot);
    let remover = Arc::new(CountingRemover::default());
    let triage = Arc::new(ImageTriageRouter::new(
        slot.clone(),
        remover.clone(),
        vocabulary(),
    ));
    let state = AppState {
        conversation: conversation(),
        triage: Some(triage),
    };
    Harness {
        app: build_router(state, &server),
        slot,
        remover,
    }
}

fn text_only_app() -> Router {
    let state = AppState {
        conversation: conversation(),
        triage: None,
    };
    build_router(state, &ServerConfig::default())
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([180, 90, 90]),
    ));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_message(path: &str, message: &str) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(message).unwrap()))
        .unwrap()
}

async fn say(app: &Router, message: &str) -> String {
    let (status, body) = send_json(app, post_message("/nb", message)).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    body.as_str().unwrap().to_string()
}

fn post_reset() -> Request<Body> {
    Request::post("/reset").body(Body::empty()).unwrap()
}

fn post_image(bytes: Vec<u8>) -> Request<Body> {
    Request::post("/cnn").body(Body::from(bytes)).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_reset_reply() {
    let app = text_only_app();
    let (status, body) = send_json(&app, post_reset()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"message": "All messages have been cleared."}));

    // Second reset on an empty session is the same
    let (status, body) = send_json(&app, post_reset()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "All messages have been cleared.");
}

#[tokio::test]
async fn test_conversation_accumulates_until_reset() {
    let app = text_only_app();

    let first = say(&app, "itchy red patches").await;
    assert_eq!(
        first,
        "I have been diagnosed with ['Psoriasis', 'Eczema', 'Arthritis']"
    );

    // Scored alone this would rank Arthritis, Eczema, Psoriasis
    let second = say(&app, "joint pain in every joint").await;
    assert_eq!(
        second,
        "I have been diagnosed with ['Arthritis', 'Psoriasis', 'Eczema']"
    );

    send_json(&app, post_reset()).await;

    let third = say(&app, "sore throat").await;
    assert_eq!(
        third,
        "I have been diagnosed with ['Strep Throat', 'Eczema', 'Psoriasis']"
    );
}

#[tokio::test]
async fn test_low_confidence_message_gets_advisory() {
    let app = text_only_app();
    let advisory = TextModelConfig::default().advisory_message;

    let reply = say(&app, "hello there").await;
    assert_eq!(reply, format!("hello there {}", advisory));

    // The rejected message did not join the session
    let reply = say(&app, "joint pain in every joint").await;
    assert_eq!(
        reply,
        "I have been diagnosed with ['Arthritis', 'Eczema', 'Psoriasis']"
    );
}

#[tokio::test]
async fn test_message_on_cut_point_is_echoed() {
    let app = text_only_app();
    assert_eq!(say(&app, "mild tiredness").await, "mild tiredness");
}

#[tokio::test]
async fn test_detail_endpoint_carries_ranking() {
    let app = text_only_app();

    let (status, raw) = send(&app, post_message("/nb/detail", "itchy red patches")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(body["outcome"], "accept");
    let ranking = body["ranking"].as_object().unwrap();
    assert_eq!(ranking.len(), 3);
    let psoriasis = ranking["Psoriasis"].as_f64().unwrap();
    assert!((psoriasis - 3.0 / 9.0).abs() < 1e-9);

    // Ranking keys are serialized most probable first
    let text = String::from_utf8(raw).unwrap();
    let position = |label: &str| text.find(&format!("\"{}\":", label)).unwrap();
    assert!(position("Psoriasis") < position("Eczema"));
    assert!(position("Eczema") < position("Arthritis"));

    let (status, body) = send_json(&app, post_message("/nb/detail", "hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "advisory");
    assert!(body.get("ranking").is_none());
}

#[tokio::test]
async fn test_non_string_body_is_rejected() {
    let app = text_only_app();
    let request = Request::post("/nb")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text": "sore throat"}"#))
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let app = text_only_app();
    let (status, _) = send(&app, post_message("/nb", "   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_routes_absent_when_disabled() {
    let app = text_only_app();
    let (status, _) = send(&app, get("/cnn")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, post_image(png(2, 2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_requests_fail_fast_while_loading() {
    let h = harness(ImageModelSlot::empty());

    let (status, body) = send_json(&h.app, get("/cnn")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, serde_json::json!({"error": "Model not loaded yet"}));

    let (status, body) = send_json(&h.app, post_image(png(2, 2))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, serde_json::json!({"error": "Model not loaded yet"}));
    assert_eq!(h.remover.calls.load(Ordering::SeqCst), 0);

    // Text pipeline is unaffected
    let reply = say(&h.app, "sore throat").await;
    assert!(reply.starts_with("I have been diagnosed with"));
}

#[tokio::test]
async fn test_image_becomes_available_after_install() {
    let h = harness(ImageModelSlot::empty());
    h.slot
        .install(Box::new(ScriptedImageModel { region: "throat" }))
        .await;

    let (status, body) = send_json(&h.app, get("/cnn")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"message": "Model is loaded."}));

    let (status, body) = send_json(&h.app, post_image(png(3, 3))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "('strep throat', 0.8731)");
    assert_eq!(h.remover.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skin_image_goes_through_background_removal() {
    let h = harness(ImageModelSlot::loaded(Box::new(ScriptedImageModel {
        region: "skin",
    })));

    let (status, body) = send_json(&h.app, post_image(png(4, 4))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "('eczema', 0.8731)");
    assert_eq!(h.remover.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undecodable_image_is_rejected() {
    let h = harness(ImageModelSlot::loaded(Box::new(ScriptedImageModel {
        region: "skin",
    })));

    let (status, body) = send_json(&h.app, post_image(b"not an image".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("decode"));

    let (status, _) = send(&h.app, post_image(Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.remover.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health_reports_image_readiness() {
    let h = harness(ImageModelSlot::empty());
    let (status, body) = send_json(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["image_pipeline_enabled"], true);
    assert_eq!(body["image_model_ready"], false);

    h.slot
        .install(Box::new(ScriptedImageModel { region: "skin" }))
        .await;
    let (_, body) = send_json(&h.app, get("/health")).await;
    assert_eq!(body["image_model_ready"], true);

    let (_, body) = send_json(&text_only_app(), get("/health")).await;
    assert_eq!(body["image_pipeline_enabled"], false);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = text_only_app();
    say(&app, "itchy red patches").await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("symptom_submissions_total"));
}

#[tokio::test]
async fn test_landing_page() {
    let app = text_only_app();
    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("<html"));
}

#[tokio::test]
async fn test_image_labels_outside_vocabulary_are_not_returned() {
    let h = harness(ImageModelSlot::loaded(Box::new(OffVocabularyModel)));

    let (status, body) = send_json(&h.app, post_image(png(4, 4))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    assert_eq!(h.remover.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_bodies_get_json_413() {
    let server = ServerConfig {
        max_body_bytes: 16,
        ..ServerConfig::default()
    };
    let h = harness_with_server(
        ImageModelSlot::loaded(Box::new(ScriptedImageModel { region: "skin" })),
        server,
    );

    let (status, body) = send_json(&h.app, post_image(png(8, 8))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("too large"));
    assert_eq!(h.remover.calls.load(Ordering::SeqCst), 0);

    let message = "itchy red patches all over both arms";
    let (status, body) = send_json(&h.app, post_message("/nb", message)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());

    // Small bodies still pass
    let (status, _) = send(&h.app, post_message("/nb", "sore")).await;
    assert_eq!(status, StatusCode::OK);
}
