//! Image triage: pick the preprocessing path, then classify
//!
//! A coarse first pass over anatomical regions decides whether the image is
//! classified as-is (throat, lips, eyes) or only after background removal
//! (anything else, e.g. skin).

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::payload::ImagePayload;
use super::{BackgroundRemover, ImageClassifier, ImageModelSlot};
use crate::classifier::{sort_descending, ClassifierError, LabelScore};
use crate::config::ImageConfig;
use crate::conversation::models::python_str_repr;
use crate::error::{AppError, Result};
use crate::metrics::METRICS;

/// Label sets used by the router
#[derive(Debug, Clone)]
pub struct TriageVocabulary {
    /// First-pass labels
    pub triage_labels: Vec<String>,
    /// Triage labels whose images skip background removal
    pub raw_image_labels: Vec<String>,
    /// Final diagnostic labels
    pub diagnostic_labels: Vec<String>,
}

impl TriageVocabulary {
    pub fn new(
        triage_labels: Vec<String>,
        raw_image_labels: Vec<String>,
        diagnostic_labels: Vec<String>,
    ) -> Result<Self> {
        if triage_labels.is_empty() {
            return Err(AppError::Config("triage vocabulary is empty".to_string()));
        }
        if diagnostic_labels.is_empty() {
            return Err(AppError::Config("diagnostic vocabulary is empty".to_string()));
        }
        Ok(Self {
            triage_labels,
            raw_image_labels,
            diagnostic_labels,
        })
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self> {
        Self::new(
            config.triage_labels.clone(),
            config.raw_image_labels.clone(),
            config.diagnostic_labels.clone(),
        )
    }

    pub fn skips_preprocessing(&self, triage_label: &str) -> bool {
        self.raw_image_labels.iter().any(|l| l == triage_label)
    }
}

/// Final answer for one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalClassification {
    pub label: String,
    pub score: f64,
    pub triage_label: String,
    pub background_removed: bool,
}

impl FinalClassification {
    /// `('eczema', 0.8731)`, the tuple form clients display
    pub fn tuple_repr(&self) -> String {
        let score = if self.score.is_finite() && self.score.fract() == 0.0 {
            format!("{:.1}", self.score)
        } else {
            format!("{}", self.score)
        };
        format!("({}, {})", python_str_repr(&self.label), score)
    }
}

/// Routes each image through the shared zero-shot model
pub struct ImageTriageRouter {
    model: Arc<ImageModelSlot>,
    remover: Arc<dyn BackgroundRemover>,
    vocabulary: TriageVocabulary,
}

impl ImageTriageRouter {
    pub fn new(
        model: Arc<ImageModelSlot>,
        remover: Arc<dyn BackgroundRemover>,
        vocabulary: TriageVocabulary,
    ) -> Self {
        Self {
            model,
            remover,
            vocabulary,
        }
    }

    pub fn model_slot(&self) -> &Arc<ImageModelSlot> {
        &self.model
    }

    /// Whether the image model is loaded. Takes the model lock.
    pub async fn is_ready(&self) -> bool {
        self.model.is_loaded().await
    }

    /// Classify one image.
    ///
    /// Fails with `NotReady` without waiting when the model is still
    /// loading. The model lock is held for the whole route, so image
    /// requests are served one at a time.
    pub async fn route(&self, image: &ImagePayload) -> Result<FinalClassification> {
        let guard = self.model.acquire().await?;
        let model: &dyn ImageClassifier = guard.as_deref().ok_or(AppError::NotReady)?;

        let triage = top_label(model, image, &self.vocabulary.triage_labels).await?;
        METRICS
            .triage_labels
            .with_label_values(&[triage.label.as_str()])
            .inc();

        let background_removed = !self.vocabulary.skips_preprocessing(&triage.label);
        debug!(
            "Triage label '{}' ({:.4}), background removal: {}",
            triage.label, triage.score, background_removed
        );

        let isolated;
        let chosen = if background_removed {
            isolated = self.remover.isolate_subject(image).await?;
            METRICS.background_removals.inc();
            &isolated
        } else {
            image
        };

        let diagnosis = top_label(model, chosen, &self.vocabulary.diagnostic_labels).await?;
        info!(
            "Image classified as '{}' ({:.4}) after triage '{}'",
            diagnosis.label, diagnosis.score, triage.label
        );

        Ok(FinalClassification {
            label: diagnosis.label,
            score: diagnosis.score,
            triage_label: triage.label,
            background_removed,
        })
    }
}

/// Best score among the candidate labels. Scores for labels the caller did
/// not ask about are discarded.
async fn top_label(
    model: &dyn ImageClassifier,
    image: &ImagePayload,
    labels: &[String],
) -> std::result::Result<LabelScore, ClassifierError> {
    let mut scores: Vec<LabelScore> = model
        .classify(image, labels)
        .await?
        .into_iter()
        .filter(|s| labels.contains(&s.label))
        .collect();
    sort_descending(&mut scores);
    scores.into_iter().next().ok_or_else(|| {
        ClassifierError::InvalidResponse("no scores for the candidate labels".to_string())
    })
}
