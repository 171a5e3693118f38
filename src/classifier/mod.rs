//! Text classification over fitted model artifacts
//!
//! The text pipeline treats the classifier as an opaque function from a
//! string to a probability per condition label. The shipped implementation
//! is a TF-IDF vectorizer feeding a multinomial naive Bayes model, both
//! exported from a training run as JSON artifacts.

pub mod naive_bayes;
pub mod tfidf;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

pub use naive_bayes::{MultinomialNb, NaiveBayesTextClassifier};
pub use tfidf::TfidfVectorizer;

/// Errors raised by any classifier collaborator (text or image)
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load model artifact {path}: {reason}")]
    Artifact { path: String, reason: String },

    #[error("model shape mismatch: {0}")]
    Shape(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("image encoding failed: {0}")]
    Encoding(String),
}

/// One label with its probability or score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Sort scores descending. The sort is stable, so equal scores keep the
/// order the classifier produced them in.
pub fn sort_descending(scores: &mut [LabelScore]) {
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Probability distribution over the classifier's label vocabulary, in the
/// classifier's internal class order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    scores: Vec<LabelScore>,
}

impl Prediction {
    pub fn new(scores: Vec<LabelScore>) -> Self {
        Self { scores }
    }

    /// Build a prediction from `(label, probability)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            scores: pairs
                .into_iter()
                .map(|(label, score)| LabelScore::new(label, score))
                .collect(),
        }
    }

    /// Maximum probability in the distribution, 0.0 when empty
    pub fn peak(&self) -> f64 {
        self.scores
            .iter()
            .map(|s| s.score)
            .fold(0.0_f64, f64::max)
    }

    /// The `k` most probable labels, descending
    pub fn top_k(&self, k: usize) -> Vec<LabelScore> {
        let mut sorted = self.scores.clone();
        sort_descending(&mut sorted);
        sorted.truncate(k);
        sorted
    }

    pub fn scores(&self) -> &[LabelScore] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Opaque text classifier: `classify_text(text) -> {label: probability}`.
///
/// Implementations are read-only after construction and shared across
/// request handlers without locking.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Prediction, ClassifierError>;
}
