use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub fraud_risk_weight: f64,
    pub service_reliability_weight: f64,
    pub market_confidence_weight: f64,
    pub cost_effectiveness_weight: f64,
    pub compliance_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fraud_risk_weight: 0.25,
            service_reliability_weight: 0.25,
            market_confidence_weight: 0.20,
            cost_effectiveness_weight: 0.15,
            compliance_weight: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.fraud_risk_weight
            + self.service_reliability_weight
            + self.market_confidence_weight
            + self.cost_effectiveness_weight
            + self.compliance_weight
    }

    pub fn all_finite(&self) -> bool {
        self.as_array().iter().all(|w| w.is_finite())
    }

    pub fn any_negative(&self) -> bool {
        self.as_array().iter().any(|w| *w < 0.0)
    }

    fn as_array(&self) -> [f64; 5] {
        [
            self.fraud_risk_weight,
            self.service_reliability_weight,
            self.market_confidence_weight,
            self.cost_effectiveness_weight,
            self.compliance_weight,
        ]
    }
}

/// Component-score thresholds and the adjustment each one contributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentThresholds {
    pub fraud_high: f64,
    pub fraud_high_penalty: f64,
    pub fraud_low: f64,
    pub fraud_low_bonus: f64,
    pub reliability_poor: f64,
    pub reliability_poor_penalty: f64,
    pub reliability_poor_demotion: f64,
    pub reliability_excellent: f64,
    pub reliability_excellent_bonus: f64,
    pub market_poor: f64,
    pub market_poor_penalty: f64,
    pub market_strong: f64,
    pub market_strong_boost: f64,
    pub cost_good: f64,
    pub cost_good_fee_discount: f64,
    pub compliance_strong: f64,
    pub compliance_strong_bonus: f64,
    pub overall_excellent: f64,
    pub overall_excellent_boost: f64,
    pub overall_poor: f64,
    pub overall_poor_penalty: f64,
    pub overall_poor_demotion: f64,
    pub max_reliability_bonus: f64,
    pub max_priority_boost: f64,
    pub max_risk_penalty: f64,
}

impl Default for AdjustmentThresholds {
    fn default() -> Self {
        Self {
            fraud_high: 0.6,
            fraud_high_penalty: 0.2,
            fraud_low: 0.3,
            fraud_low_bonus: 0.1,
            reliability_poor: 0.5,
            reliability_poor_penalty: 0.4,
            reliability_poor_demotion: 0.3,
            reliability_excellent: 0.9,
            reliability_excellent_bonus: 0.15,
            market_poor: 0.4,
            market_poor_penalty: 0.2,
            market_strong: 0.8,
            market_strong_boost: 0.1,
            cost_good: 0.7,
            cost_good_fee_discount: 0.5,
            compliance_strong: 0.8,
            compliance_strong_bonus: 0.1,
            overall_excellent: 0.8,
            overall_excellent_boost: 0.2,
            overall_poor: 0.4,
            overall_poor_penalty: 0.3,
            overall_poor_demotion: 0.2,
            max_reliability_bonus: 0.3,
            max_priority_boost: 0.5,
            max_risk_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub thresholds: AdjustmentThresholds,
    /// Fee percentage that maps to a cost score of zero.
    pub fee_reference_pct: f64,
    /// Region used when `score` is called without one.
    pub default_region: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            thresholds: AdjustmentThresholds::default(),
            fee_reference_pct: 5.0,
            default_region: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingAdjustment {
    pub fee_adjustment: f64,
    pub reliability_bonus: f64,
    pub priority_boost: f64,
    pub risk_penalty: f64,
    pub reasons: Vec<String>,
}

impl RoutingAdjustment {
    pub fn net_priority_delta(&self) -> f64 {
        self.reliability_bonus + self.priority_boost - self.risk_penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub processor_id: String,
    pub region: String,
    pub overall_health: f64,
    pub fraud_risk: f64,
    pub service_reliability: f64,
    pub market_confidence: f64,
    pub cost_effectiveness: f64,
    pub compliance_score: f64,
    pub adjustment: RoutingAdjustment,
    /// Mean confidence of the insights behind this score.
    pub data_confidence: f64,
    pub synthetic_signals: usize,
}
