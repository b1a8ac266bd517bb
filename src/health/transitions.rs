use crate::domain::processor::HealthState;
use crate::health::state::{HealthSample, HealthThresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub fn derive_state(risk_score: f64, thresholds: &HealthThresholds) -> HealthState {
    if risk_score >= thresholds.freeze_risk {
        HealthState::Frozen
    } else if risk_score >= thresholds.warning_risk {
        HealthState::Warning
    } else {
        HealthState::Healthy
    }
}

pub fn is_stale(sample: &HealthSample, thresholds: &HealthThresholds, now: DateTime<Utc>) -> bool {
    let window = chrono::Duration::seconds(thresholds.staleness_secs.min(i64::MAX as u64) as i64);
    now - sample.observed_at > window
}

/// State a processor is in right now. Explicit freezes win over readings,
/// missing, stale or unreadable (NaN) readings mean unavailable.
pub fn effective_state(
    latest: Option<&HealthSample>,
    manual_freeze: bool,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> HealthState {
    if manual_freeze {
        return HealthState::Frozen;
    }
    match latest {
        Some(sample) if sample.is_finite() && !is_stale(sample, thresholds, now) => {
            derive_state(sample.risk_score, thresholds)
        }
        _ => HealthState::Unavailable,
    }
}

/// Account-level activity for one processor. Rates are fractions (0.01 = 1%),
/// `volume_spike` is a multiple of the baseline daily volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OperationalMetrics {
    pub chargeback_rate: f64,
    pub refund_rate: f64,
    pub volume_spike: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationalPolicy {
    pub chargeback_freeze: f64,
    pub chargeback_warning: f64,
    pub refund_freeze: f64,
    pub refund_warning: f64,
    pub volume_freeze: f64,
    pub volume_warning: f64,
    pub baseline_risk: f64,
}

impl Default for OperationalPolicy {
    fn default() -> Self {
        Self {
            chargeback_freeze: 0.01,
            chargeback_warning: 0.005,
            refund_freeze: 0.10,
            refund_warning: 0.05,
            volume_freeze: 20.0,
            volume_warning: 10.0,
            baseline_risk: 15.0,
        }
    }
}

/// Risk score (0-100) and issue list for a processor's recent activity.
///
/// Chargebacks alone can push risk past the default freeze threshold; refund
/// and volume spikes top out just below it.
pub fn assess_operational(metrics: &OperationalMetrics, policy: &OperationalPolicy) -> (f64, Vec<String>) {
    let mut risk: f64 = 0.0;
    let mut issues = Vec::new();

    if metrics.chargeback_rate >= policy.chargeback_freeze {
        risk = risk.max(95.0);
        issues.push(format!(
            "chargeback rate {:.2}% exceeds {:.2}% freeze threshold",
            metrics.chargeback_rate * 100.0,
            policy.chargeback_freeze * 100.0
        ));
    } else if metrics.chargeback_rate >= policy.chargeback_warning {
        risk = risk.max(60.0);
        issues.push(format!(
            "chargeback rate {:.2}% approaching {:.2}% threshold",
            metrics.chargeback_rate * 100.0,
            policy.chargeback_freeze * 100.0
        ));
    }

    if metrics.refund_rate >= policy.refund_freeze {
        risk = risk.max(85.0);
        issues.push(format!(
            "refund rate {:.1}% exceeds {:.1}% threshold",
            metrics.refund_rate * 100.0,
            policy.refund_freeze * 100.0
        ));
    } else if metrics.refund_rate >= policy.refund_warning {
        risk = risk.max(40.0);
        issues.push(format!(
            "refund rate {:.1}% exceeds {:.1}% warning threshold",
            metrics.refund_rate * 100.0,
            policy.refund_warning * 100.0
        ));
    }

    if metrics.volume_spike >= policy.volume_freeze {
        risk = risk.max(80.0);
        issues.push(format!("volume spike {:.1}x exceeds {:.0}x threshold", metrics.volume_spike, policy.volume_freeze));
    } else if metrics.volume_spike >= policy.volume_warning {
        risk = risk.max(30.0);
        issues.push(format!(
            "volume spike {:.1}x exceeds {:.0}x warning threshold",
            metrics.volume_spike, policy.volume_warning
        ));
    }

    if issues.is_empty() {
        risk = policy.baseline_risk;
    }
    (risk, issues)
}
