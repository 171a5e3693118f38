//! Multi-turn symptom accumulation
//!
//! Each submitted utterance is scored on its own first. Confident ones are
//! appended to the session, and the whole session (space-joined, in
//! submission order) is scored again to produce the ranked reply.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::gate::{GateDecision, GatePolicy};
use super::models::{python_list_repr, OutcomeEnvelope, RankedPrediction};
use crate::classifier::{ClassifierError, TextClassifier};
use crate::config::TextModelConfig;
use crate::error::Result;
use crate::metrics::METRICS;

/// Wording and size of accumulator replies
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    pub top_k: usize,
    pub diagnosis_prefix: String,
    pub advisory_message: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        let text = TextModelConfig::default();
        Self {
            top_k: text.top_k,
            diagnosis_prefix: text.diagnosis_prefix,
            advisory_message: text.advisory_message,
        }
    }
}

impl From<&TextModelConfig> for ReplyConfig {
    fn from(config: &TextModelConfig) -> Self {
        Self {
            top_k: config.top_k,
            diagnosis_prefix: config.diagnosis_prefix.clone(),
            advisory_message: config.advisory_message.clone(),
        }
    }
}

/// Utterances accepted so far in the current session
#[derive(Debug, Default)]
struct Session {
    accepted: Vec<String>,
}

impl Session {
    fn combined_text(&self) -> String {
        self.accepted.join(" ")
    }
}

/// Process-wide conversation state plus the policy applied to it
pub struct ConversationAccumulator {
    classifier: Arc<dyn TextClassifier>,
    gate: GatePolicy,
    reply: ReplyConfig,
    session: Mutex<Session>,
}

impl ConversationAccumulator {
    pub fn new(classifier: Arc<dyn TextClassifier>, gate: GatePolicy, reply: ReplyConfig) -> Self {
        Self {
            classifier,
            gate,
            reply,
            session: Mutex::new(Session::default()),
        }
    }

    /// Build from the text section of the service configuration
    pub fn from_config(classifier: Arc<dyn TextClassifier>, config: &TextModelConfig) -> Result<Self> {
        let gate = GatePolicy::new(config.accept_above, config.advise_below)?;
        Ok(Self::new(classifier, gate, ReplyConfig::from(config)))
    }

    pub fn gate(&self) -> &GatePolicy {
        &self.gate
    }

    /// Gate one utterance and, if accepted, rank the accumulated session.
    ///
    /// The session lock is held for the whole call so concurrent
    /// submissions cannot interleave between the append and the ranking.
    pub async fn submit(&self, utterance: &str) -> std::result::Result<OutcomeEnvelope, ClassifierError> {
        debug!("Received message: {}", utterance);

        let mut session = self.session.lock().await;

        let single = self.classifier.classify(utterance)?;
        let peak = single.peak();
        debug!(
            "Single-message top {}: {:?} (peak {:.4})",
            self.reply.top_k,
            single.top_k(self.reply.top_k),
            peak
        );

        let decision = self.gate.decide(peak);
        METRICS.record_submission(decision);

        match decision {
            GateDecision::Echo => return Ok(OutcomeEnvelope::echo(utterance.to_string())),
            GateDecision::Advisory => {
                let message = format!("{} {}", utterance, self.reply.advisory_message);
                return Ok(OutcomeEnvelope::advisory(message));
            }
            GateDecision::Accept => {}
        }

        session.accepted.push(utterance.to_string());
        let combined = session.combined_text();

        let prediction = match self.classifier.classify(&combined) {
            Ok(prediction) => prediction,
            Err(e) => {
                // Keep the session consistent with what the caller saw
                session.accepted.pop();
                return Err(e);
            }
        };

        let ranking = RankedPrediction::from_sorted(prediction.top_k(self.reply.top_k));
        info!(
            "Session of {} message(s) ranked: {:?}",
            session.accepted.len(),
            ranking
        );

        let message = format!(
            "{} {}",
            self.reply.diagnosis_prefix,
            python_list_repr(&ranking.labels())
        );
        Ok(OutcomeEnvelope::accepted(message, ranking))
    }

    /// Clear the session. Idempotent.
    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        let cleared = session.accepted.len();
        session.accepted.clear();
        METRICS.resets.inc();
        info!("Conversation reset, {} message(s) cleared", cleared);
    }

    /// Snapshot of the accepted utterances in submission order
    pub async fn accepted(&self) -> Vec<String> {
        self.session.lock().await.accepted.clone()
    }
}
