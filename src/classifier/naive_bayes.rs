//! Multinomial naive Bayes over TF-IDF features

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::tfidf::{SparseRow, TfidfVectorizer};
use super::{ClassifierError, Prediction, TextClassifier};

/// On-disk layout of a fitted multinomial naive Bayes model
#[derive(Debug, Clone, Deserialize)]
pub struct NaiveBayesArtifact {
    pub classes: Vec<String>,
    pub class_log_prior: Vec<f64>,
    /// `classes × features` log probabilities
    pub feature_log_prob: Vec<Vec<f64>>,
}

/// Fitted multinomial naive Bayes model
#[derive(Debug, Clone)]
pub struct MultinomialNb {
    classes: Vec<String>,
    class_log_prior: Vec<f64>,
    feature_log_prob: Vec<Vec<f64>>,
    n_features: usize,
}

impl MultinomialNb {
    pub fn from_artifact(artifact: NaiveBayesArtifact) -> Result<Self, ClassifierError> {
        let n_classes = artifact.classes.len();
        if n_classes == 0 {
            return Err(ClassifierError::Shape("model has no classes".to_string()));
        }
        if artifact.class_log_prior.len() != n_classes {
            return Err(ClassifierError::Shape(format!(
                "{} class priors for {} classes",
                artifact.class_log_prior.len(),
                n_classes
            )));
        }
        if artifact.feature_log_prob.len() != n_classes {
            return Err(ClassifierError::Shape(format!(
                "{} feature rows for {} classes",
                artifact.feature_log_prob.len(),
                n_classes
            )));
        }

        let n_features = artifact.feature_log_prob[0].len();
        if artifact
            .feature_log_prob
            .iter()
            .any(|row| row.len() != n_features)
        {
            return Err(ClassifierError::Shape(
                "feature_log_prob rows differ in length".to_string(),
            ));
        }

        Ok(Self {
            classes: artifact.classes,
            class_log_prior: artifact.class_log_prior,
            feature_log_prob: artifact.feature_log_prob,
            n_features,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ClassifierError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let artifact: NaiveBayesArtifact =
            serde_json::from_str(&raw).map_err(|e| ClassifierError::Artifact {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            "Loaded naive Bayes model from {}: {} classes",
            path.display(),
            artifact.classes.len()
        );
        Self::from_artifact(artifact)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Posterior class probabilities for one sparse row
    pub fn predict_proba(&self, row: &SparseRow) -> Vec<f64> {
        let joint: Vec<f64> = self
            .class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, log_probs)| {
                prior
                    + row
                        .iter()
                        .map(|&(column, weight)| weight * log_probs[column])
                        .sum::<f64>()
            })
            .collect();

        // log-sum-exp keeps the normalisation stable for long inputs
        let max = joint.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let log_norm = max + joint.iter().map(|j| (j - max).exp()).sum::<f64>().ln();
        joint.iter().map(|j| (j - log_norm).exp()).collect()
    }
}

/// Vectorizer + model pair, loaded once at start-up
#[derive(Debug, Clone)]
pub struct NaiveBayesTextClassifier {
    vectorizer: TfidfVectorizer,
    model: MultinomialNb,
}

impl NaiveBayesTextClassifier {
    pub fn new(vectorizer: TfidfVectorizer, model: MultinomialNb) -> Result<Self, ClassifierError> {
        if vectorizer.n_features() != model.n_features() {
            return Err(ClassifierError::Shape(format!(
                "vectorizer produces {} features but model expects {}",
                vectorizer.n_features(),
                model.n_features()
            )));
        }
        Ok(Self { vectorizer, model })
    }

    /// Load both artifacts from disk
    pub fn load(
        model_path: impl AsRef<Path>,
        vectorizer_path: impl AsRef<Path>,
    ) -> Result<Self, ClassifierError> {
        let vectorizer = TfidfVectorizer::load(vectorizer_path)?;
        let model = MultinomialNb::load(model_path)?;
        let classifier = Self::new(vectorizer, model)?;
        info!(
            "Text classifier ready: {} conditions, {} features",
            classifier.model.classes().len(),
            classifier.model.n_features()
        );
        Ok(classifier)
    }

    pub fn classes(&self) -> &[String] {
        self.model.classes()
    }
}

impl TextClassifier for NaiveBayesTextClassifier {
    fn classify(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let row = self.vectorizer.transform(text);
        let probabilities = self.model.predict_proba(&row);
        Ok(Prediction::from_pairs(
            self.model
                .classes()
                .iter()
                .cloned()
                .zip(probabilities),
        ))
    }
}
