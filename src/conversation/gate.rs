//! Confidence gate deciding whether an utterance joins the session

use serde::Serialize;

use crate::error::{AppError, Result};

/// Result of gating one utterance on its peak probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateDecision {
    /// Append to the session and rank the combined text
    Accept,
    /// Reject and ask the user for more symptoms
    Advisory,
    /// Reject and echo the utterance unchanged
    Echo,
}

/// Two ordered cut points splitting `[0, 1]` into three bands:
///
/// ```text
/// 0 ─── advisory ─── advise_below ─── echo ─── accept_above ─── accept ─── 1
///                    (inclusive)               (inclusive)
/// ```
///
/// `advise_below <= accept_above` is enforced at construction, so every
/// peak falls in exactly one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatePolicy {
    accept_above: f64,
    advise_below: f64,
}

impl GatePolicy {
    pub fn new(accept_above: f64, advise_below: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&accept_above) || !(0.0..=1.0).contains(&advise_below) {
            return Err(AppError::Config(format!(
                "gate thresholds must be within [0, 1], got accept_above={} advise_below={}",
                accept_above, advise_below
            )));
        }
        if advise_below > accept_above {
            return Err(AppError::Config(format!(
                "advise_below ({}) must not exceed accept_above ({})",
                advise_below, accept_above
            )));
        }
        Ok(Self {
            accept_above,
            advise_below,
        })
    }

    /// Single cut point, no advisory band: accept above `threshold`,
    /// echo everything else.
    pub fn simple(threshold: f64) -> Result<Self> {
        Self::new(threshold, 0.0)
    }

    /// Accept above 0.20, advise below 0.20, echo at exactly 0.20
    pub fn three_way() -> Self {
        Self {
            accept_above: 0.20,
            advise_below: 0.20,
        }
    }

    pub fn accept_above(&self) -> f64 {
        self.accept_above
    }

    pub fn advise_below(&self) -> f64 {
        self.advise_below
    }

    pub fn decide(&self, peak: f64) -> GateDecision {
        if peak > self.accept_above {
            GateDecision::Accept
        } else if peak < self.advise_below {
            GateDecision::Advisory
        } else {
            GateDecision::Echo
        }
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::three_way()
    }
}
