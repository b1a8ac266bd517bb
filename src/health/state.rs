use crate::domain::processor::HealthState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FREEZE_RESISTANCE: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub warning_risk: f64,
    pub freeze_risk: f64,
    pub staleness_secs: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            warning_risk: 30.0,
            freeze_risk: 90.0,
            staleness_secs: 30,
        }
    }
}

/// One health reading. Scores are on a 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSample {
    pub risk_score: f64,
    pub freeze_resistance: f64,
    pub issues: Vec<String>,
    pub observed_at: DateTime<Utc>,
}

impl HealthSample {
    pub fn new(risk_score: f64, freeze_resistance: f64) -> Self {
        Self {
            risk_score: risk_score.clamp(0.0, 100.0),
            freeze_resistance: freeze_resistance.clamp(0.0, 100.0),
            issues: Vec::new(),
            observed_at: Utc::now(),
        }
    }

    /// A reading with a NaN score cannot be classified.
    pub fn is_finite(&self) -> bool {
        self.risk_score.is_finite() && self.freeze_resistance.is_finite()
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub processor_id: String,
    pub state: HealthState,
    pub risk_score: f64,
    pub freeze_resistance: f64,
    pub issues: Vec<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthTransition {
    pub processor_id: String,
    pub from: HealthState,
    pub to: HealthState,
    pub at: DateTime<Utc>,
}
