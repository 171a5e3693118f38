//! Outcome types returned by the conversation accumulator

use indexmap::IndexMap;
use serde::Serialize;

use super::gate::GateDecision;
use crate::classifier::LabelScore;

/// Top-ranked conditions, ordered by descending probability
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RankedPrediction(IndexMap<String, f64>);

impl RankedPrediction {
    /// Build from scores already sorted descending
    pub fn from_sorted(scores: Vec<LabelScore>) -> Self {
        Self(scores.into_iter().map(|s| (s.label, s.score)).collect())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

/// What the accumulator decided for one submitted utterance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeEnvelope {
    pub outcome: GateDecision,
    /// Human-readable reply: ranked sentence, annotated or raw utterance
    pub message: String,
    /// Present only for accepted utterances
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<RankedPrediction>,
}

impl OutcomeEnvelope {
    pub fn accepted(message: String, ranking: RankedPrediction) -> Self {
        Self {
            outcome: GateDecision::Accept,
            message,
            ranking: Some(ranking),
        }
    }

    pub fn advisory(message: String) -> Self {
        Self {
            outcome: GateDecision::Advisory,
            message,
            ranking: None,
        }
    }

    pub fn echo(utterance: String) -> Self {
        Self {
            outcome: GateDecision::Echo,
            message: utterance,
            ranking: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == GateDecision::Accept
    }
}

/// Render labels the way a Python list of strings prints:
/// `['Psoriasis', 'Eczema']`
pub fn python_list_repr<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| python_str_repr(s.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}

/// Quote a string the way Python's `repr` does for plain text
pub fn python_str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
