//! SLA classification for workflow state dwell times.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fraction of the threshold at which a state flips from Ok to Warn.
const WARN_RATIO: f64 = 0.8;

/// Derived label comparing elapsed state duration against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlaStatus {
    Ok,
    Warn,
    Breach,
}

impl SlaStatus {
    /// Classify how long an entity has dwelt in a state against the
    /// configured SLA threshold for its outgoing transition.
    pub fn classify(elapsed: Duration, threshold: Duration) -> Self {
        if threshold.is_zero() {
            return SlaStatus::Ok; // no SLA configured
        }
        if elapsed >= threshold {
            SlaStatus::Breach
        } else if elapsed.as_secs_f64() >= threshold.as_secs_f64() * WARN_RATIO {
            SlaStatus::Warn
        } else {
            SlaStatus::Ok
        }
    }
}
