//! TF-IDF vectorizer loaded from a fitted artifact

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use super::ClassifierError;

/// Standard word token pattern: runs of two or more word characters
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

/// Normalisation applied to each transformed row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// On-disk layout of a fitted vectorizer
#[derive(Debug, Clone, Deserialize)]
pub struct VectorizerArtifact {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
}

fn default_lowercase() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Sparse row: `(column, weight)` pairs sorted by column
pub type SparseRow = Vec<(usize, f64)>;

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    lowercase: bool,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    norm: Option<Norm>,
}

impl TfidfVectorizer {
    /// Build a vectorizer from a parsed artifact, validating its shape
    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self, ClassifierError> {
        if artifact.idf.len() != artifact.vocabulary.len() {
            return Err(ClassifierError::Shape(format!(
                "idf has {} entries but vocabulary has {} terms",
                artifact.idf.len(),
                artifact.vocabulary.len()
            )));
        }

        if let Some((term, &column)) = artifact
            .vocabulary
            .iter()
            .find(|(_, &column)| column >= artifact.idf.len())
        {
            return Err(ClassifierError::Shape(format!(
                "term '{}' maps to column {} outside of {} features",
                term,
                column,
                artifact.idf.len()
            )));
        }

        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ClassifierError::Shape(format!(
                "invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }

        Ok(Self {
            vocabulary: artifact.vocabulary,
            idf: artifact.idf,
            lowercase: artifact.lowercase,
            ngram_range: artifact.ngram_range,
            sublinear_tf: artifact.sublinear_tf,
            norm: artifact.norm,
        })
    }

    /// Load a vectorizer artifact from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ClassifierError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let artifact: VectorizerArtifact =
            serde_json::from_str(&raw).map_err(|e| ClassifierError::Artifact {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            "Loaded vectorizer from {}: {} features",
            path.display(),
            artifact.idf.len()
        );
        Self::from_artifact(artifact)
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Split text into word n-grams
    fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(&text)
            .map(|m| m.as_str())
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut grams = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                grams.push(window.join(" "));
            }
        }
        grams
    }

    /// Transform one document into a normalised sparse TF-IDF row.
    /// Terms outside the fitted vocabulary are ignored.
    pub fn transform(&self, text: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for gram in self.analyze(text) {
            if let Some(&column) = self.vocabulary.get(&gram) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(column, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (column, tf * self.idf[column])
            })
            .collect();

        let length = match self.norm {
            Some(Norm::L2) => row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            Some(Norm::L1) => row.iter().map(|(_, w)| w.abs()).sum::<f64>(),
            None => 0.0,
        };
        if length > 0.0 {
            for (_, weight) in row.iter_mut() {
                *weight /= length;
            }
        }

        row
    }
}
