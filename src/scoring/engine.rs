use crate::domain::insight::InsightValue;
use crate::insights::cache::InsightCache;
use crate::scoring::insight_reader::{read_insights_for_processor, InsightFingerprint, InsightSet};
use crate::scoring::types::{AdjustmentThresholds, CompositeScore, RoutingAdjustment, ScoringConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

fn category(value: &InsightValue) -> Option<String> {
    match value {
        InsightValue::Category(c) => Some(c.trim().to_lowercase()),
        InsightValue::Numeric(_) => None,
    }
}

pub fn fraud_risk_score(value: &InsightValue) -> f64 {
    match value {
        InsightValue::Numeric(n) => clamp01(*n),
        InsightValue::Category(_) => match category(value).as_deref() {
            Some("critical") => 1.0,
            Some("high") => 0.8,
            Some("medium") => 0.5,
            _ => 0.2,
        },
    }
}

pub fn service_reliability_score(value: &InsightValue) -> f64 {
    match value {
        InsightValue::Numeric(uptime_pct) => clamp01(uptime_pct / 100.0),
        InsightValue::Category(_) => match category(value).as_deref() {
            Some("operational") => 1.0,
            Some("maintenance") => 0.8,
            Some("degraded") => 0.6,
            _ => 0.0,
        },
    }
}

pub fn market_confidence_score(value: &InsightValue) -> f64 {
    match value {
        InsightValue::Numeric(sentiment) => clamp01((sentiment.clamp(-1.0, 1.0) + 1.0) / 2.0),
        InsightValue::Category(_) => match category(value).as_deref() {
            Some("positive") => 0.8,
            Some("negative") => 0.2,
            _ => 0.5,
        },
    }
}

pub fn promotion_score(value: &InsightValue) -> f64 {
    match value {
        InsightValue::Numeric(discount_pct) => clamp01(discount_pct / 10.0),
        InsightValue::Category(_) => 0.5,
    }
}

pub fn fee_score(value: &InsightValue, fee_reference_pct: f64) -> f64 {
    match value {
        InsightValue::Numeric(fee_pct) if fee_reference_pct > 0.0 => {
            clamp01(1.0 - fee_pct / fee_reference_pct)
        }
        _ => 0.5,
    }
}

pub fn regulation_severity(value: &InsightValue) -> f64 {
    match value {
        InsightValue::Numeric(n) => clamp01(*n),
        InsightValue::Category(_) => match category(value).as_deref() {
            Some("none") => 0.0,
            Some("low") => 0.2,
            Some("medium") => 0.5,
            Some("high") => 0.8,
            Some("critical") => 1.0,
            _ => 0.3,
        },
    }
}

pub fn compute_composite(
    processor_id: &str,
    region: &str,
    set: &InsightSet,
    config: &ScoringConfig,
) -> CompositeScore {
    let fraud_risk = fraud_risk_score(&set.fraud_trend.value);
    let service_reliability = service_reliability_score(&set.service_status.value);
    let market_confidence = market_confidence_score(&set.social_sentiment.value);
    let cost_effectiveness = clamp01(
        (promotion_score(&set.promotion.value) + fee_score(&set.fee.value, config.fee_reference_pct))
            / 2.0,
    );
    let compliance_score = clamp01(1.0 - regulation_severity(&set.regulation.value));

    let w = &config.weights;
    let overall_health = clamp01(
        (w.fraud_risk_weight * (1.0 - fraud_risk))
            + (w.service_reliability_weight * service_reliability)
            + (w.market_confidence_weight * market_confidence)
            + (w.cost_effectiveness_weight * cost_effectiveness)
            + (w.compliance_weight * compliance_score),
    );

    let mut score = CompositeScore {
        processor_id: processor_id.to_string(),
        region: region.to_string(),
        overall_health,
        fraud_risk,
        service_reliability,
        market_confidence,
        cost_effectiveness,
        compliance_score,
        adjustment: RoutingAdjustment::default(),
        data_confidence: set.mean_confidence(),
        synthetic_signals: set.synthetic_count(),
    };
    score.adjustment = derive_adjustment(&score, &config.thresholds);
    score
}

pub fn derive_adjustment(score: &CompositeScore, t: &AdjustmentThresholds) -> RoutingAdjustment {
    let mut adj = RoutingAdjustment::default();

    if score.fraud_risk > t.fraud_high {
        adj.risk_penalty += t.fraud_high_penalty;
        adj.reasons
            .push(format!("high fraud risk ({:.2})", score.fraud_risk));
    } else if score.fraud_risk < t.fraud_low {
        adj.reliability_bonus += t.fraud_low_bonus;
        adj.reasons.push(format!("low fraud risk ({:.2})", score.fraud_risk));
    }

    if score.service_reliability < t.reliability_poor {
        adj.risk_penalty += t.reliability_poor_penalty;
        adj.priority_boost -= t.reliability_poor_demotion;
        adj.reasons.push(format!(
            "poor service reliability ({:.2})",
            score.service_reliability
        ));
    } else if score.service_reliability > t.reliability_excellent {
        adj.reliability_bonus += t.reliability_excellent_bonus;
        adj.reasons.push(format!(
            "excellent service reliability ({:.2})",
            score.service_reliability
        ));
    }

    if score.market_confidence < t.market_poor {
        adj.risk_penalty += t.market_poor_penalty;
        adj.reasons.push(format!(
            "weak market sentiment ({:.2})",
            score.market_confidence
        ));
    } else if score.market_confidence > t.market_strong {
        adj.priority_boost += t.market_strong_boost;
        adj.reasons.push(format!(
            "strong market sentiment ({:.2})",
            score.market_confidence
        ));
    }

    if score.cost_effectiveness > t.cost_good {
        adj.fee_adjustment -= t.cost_good_fee_discount;
        adj.reasons.push(format!(
            "favourable pricing ({:.2})",
            score.cost_effectiveness
        ));
    }

    if score.compliance_score > t.compliance_strong {
        adj.reliability_bonus += t.compliance_strong_bonus;
        adj.reasons.push(format!(
            "strong compliance posture ({:.2})",
            score.compliance_score
        ));
    }

    if score.overall_health > t.overall_excellent {
        adj.priority_boost += t.overall_excellent_boost;
        adj.reasons.push(format!(
            "excellent overall health ({:.2})",
            score.overall_health
        ));
    } else if score.overall_health < t.overall_poor {
        adj.risk_penalty += t.overall_poor_penalty;
        adj.priority_boost -= t.overall_poor_demotion;
        adj.reasons.push(format!(
            "poor overall health ({:.2})",
            score.overall_health
        ));
    }

    adj.reliability_bonus = adj.reliability_bonus.clamp(0.0, t.max_reliability_bonus);
    adj.priority_boost = adj
        .priority_boost
        .clamp(-t.max_priority_boost, t.max_priority_boost);
    adj.risk_penalty = adj.risk_penalty.clamp(0.0, t.max_risk_penalty);
    adj
}

type MemoKey = (String, String);

pub struct ScoringEngine {
    cache: Arc<InsightCache>,
    config: ScoringConfig,
    memo: Mutex<HashMap<MemoKey, (InsightFingerprint, CompositeScore)>>,
}

impl ScoringEngine {
    pub fn new(cache: Arc<InsightCache>, config: ScoringConfig) -> Self {
        Self {
            cache,
            config,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<InsightCache> {
        &self.cache
    }

    pub async fn score(&self, processor_id: &str) -> CompositeScore {
        let region = self.config.default_region.clone();
        self.score_in_region(processor_id, &region).await
    }

    /// Recomputes only when the underlying insight versions changed.
    pub async fn score_in_region(&self, processor_id: &str, region: &str) -> CompositeScore {
        let set = read_insights_for_processor(&self.cache, processor_id, region).await;
        let fingerprint = set.fingerprint();
        let key = (processor_id.to_string(), region.to_string());

        if let Ok(memo) = self.memo.lock() {
            if let Some((seen, score)) = memo.get(&key) {
                if *seen == fingerprint {
                    return score.clone();
                }
            }
        }

        let score = compute_composite(processor_id, region, &set, &self.config);
        tracing::debug!(
            processor = processor_id,
            region,
            overall_health = score.overall_health,
            synthetic_signals = score.synthetic_signals,
            "composite score recomputed"
        );

        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key, (fingerprint, score.clone()));
        }
        score
    }
}
