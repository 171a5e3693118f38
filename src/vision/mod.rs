//! Image pipeline: zero-shot classification with background-removal triage
//!
//! - `ImageClassifier` ranks an image against a caller-supplied label set
//! - `BackgroundRemover` isolates the photographed subject
//! - `ImageTriageRouter` decides per image whether to remove the background
//!   before the final diagnostic classification

pub mod client;
pub mod payload;
pub mod readiness;
pub mod triage;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::classifier::{ClassifierError, LabelScore};

pub use client::{BackgroundRemovalClient, SidecarConfig, ZeroShotClient, ZeroShotLoader};
pub use payload::ImagePayload;
pub use readiness::ModelSlot;
pub use triage::{FinalClassification, ImageTriageRouter, TriageVocabulary};

/// Zero-shot classifier: `classify_image(image, labels) -> [(label, score)]`,
/// sorted by descending score
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(
        &self,
        image: &ImagePayload,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassifierError>;
}

/// `isolate_subject(image) -> image` with non-subject pixels removed
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn isolate_subject(&self, image: &ImagePayload) -> Result<ImagePayload, ClassifierError>;
}

/// Fetches and loads the image model once at start-up
#[async_trait]
pub trait ImageModelLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn ImageClassifier>, ClassifierError>;
}

/// Shared slot for the image model
pub type ImageModelSlot = ModelSlot<dyn ImageClassifier>;

/// Load the image model on a background task and install it when done.
///
/// A failed load is logged and leaves the slot not ready; requests keep
/// getting `NotReady`.
pub fn spawn_model_loader(
    slot: Arc<ImageModelSlot>,
    loader: Arc<dyn ImageModelLoader>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Loading image model in the background");
        match loader.load().await {
            Ok(model) => slot.install(model).await,
            Err(e) => error!("Image model failed to load: {}", e),
        }
    })
}
