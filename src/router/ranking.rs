use crate::domain::processor::Processor;
use crate::domain::transaction::{Transaction, Urgency};
use crate::scoring::engine::clamp01;
use crate::scoring::types::{CompositeScore, RoutingAdjustment};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// How much of the fee term survives at each urgency level. Urgent payments
/// care about getting through, not about the cheapest rail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyFeeWeights {
    pub normal: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for UrgencyFeeWeights {
    fn default() -> Self {
        Self {
            normal: 1.0,
            high: 0.5,
            critical: 0.0,
        }
    }
}

impl UrgencyFeeWeights {
    pub fn weight(&self, urgency: Urgency) -> f64 {
        match urgency {
            Urgency::Normal => self.normal,
            Urgency::High => self.high,
            Urgency::Critical => self.critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Priority that maps to a step confidence of 1.0.
    pub priority_ceiling: f64,
    pub fee_priority_weight: f64,
    pub fee_reference_pct: f64,
    pub urgency_fee_weights: UrgencyFeeWeights,
    /// Priority added for a perfect success rate; rates at or below
    /// `success_rate_floor` add nothing.
    pub success_rate_weight: f64,
    pub success_rate_floor: f64,
    /// Added once when a transaction tag matches one of the processor's `best_for` tags.
    pub affinity_boost: f64,
    /// Overrides the catalogue's `base_priority` per processor id.
    pub base_priority: HashMap<String, f64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            priority_ceiling: 2.0,
            fee_priority_weight: 0.2,
            fee_reference_pct: 5.0,
            urgency_fee_weights: UrgencyFeeWeights::default(),
            success_rate_weight: 0.2,
            success_rate_floor: 0.9,
            affinity_boost: 0.1,
            base_priority: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub processor: Processor,
    pub composite: CompositeScore,
    pub freeze_resistance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedProcessor {
    pub processor_id: String,
    pub priority: f64,
    pub base_priority: f64,
    pub effective_fee_pct: f64,
    pub freeze_resistance: f64,
    pub composite: CompositeScore,
}

impl RankedProcessor {
    pub fn summary(&self) -> String {
        let adj = &self.composite.adjustment;
        let mut out = format!(
            "priority {:.3} (base {:.3} +bonus {:.2} +boost {:.2} -penalty {:.2}), fee {:.2}%, freeze resistance {:.0}",
            self.priority,
            self.base_priority,
            adj.reliability_bonus,
            adj.priority_boost,
            adj.risk_penalty,
            self.effective_fee_pct,
            self.freeze_resistance
        );
        if self.composite.synthetic_signals > 0 {
            out.push_str(&format!(", {} synthetic signals", self.composite.synthetic_signals));
        }
        if !adj.reasons.is_empty() {
            out.push_str(&format!("; {}", adj.reasons.join(", ")));
        }
        out
    }
}

pub fn effective_fee(processor: &Processor, adjustment: &RoutingAdjustment) -> f64 {
    processor.fee_baseline_pct * (1.0 + adjustment.fee_adjustment).max(0.0)
}

pub fn has_affinity(processor: &Processor, tx: &Transaction) -> bool {
    tx.tags
        .iter()
        .any(|tag| processor.best_for.iter().any(|b| b.eq_ignore_ascii_case(tag.trim())))
}

/// Static part of the priority: configured base, success-rate and fee
/// baselines, and business-type affinity.
pub fn base_priority(processor: &Processor, effective_fee_pct: f64, tx: &Transaction, config: &RoutingConfig) -> f64 {
    let configured = config
        .base_priority
        .get(&processor.id)
        .copied()
        .unwrap_or(processor.base_priority);
    let fee_term = if config.fee_reference_pct > 0.0 {
        clamp01(1.0 - effective_fee_pct / config.fee_reference_pct)
    } else {
        0.0
    };
    let success_term = if config.success_rate_floor < 1.0 {
        clamp01((processor.success_rate - config.success_rate_floor) / (1.0 - config.success_rate_floor))
    } else {
        0.0
    };
    let affinity = if has_affinity(processor, tx) {
        config.affinity_boost
    } else {
        0.0
    };
    configured
        + config.urgency_fee_weights.weight(tx.urgency) * config.fee_priority_weight * fee_term
        + config.success_rate_weight * success_term
        + affinity
}

pub fn rank_candidate(candidate: Candidate, tx: &Transaction, config: &RoutingConfig) -> RankedProcessor {
    let effective_fee_pct = effective_fee(&candidate.processor, &candidate.composite.adjustment);
    let base = base_priority(&candidate.processor, effective_fee_pct, tx, config);
    let priority = base + candidate.composite.adjustment.net_priority_delta();
    RankedProcessor {
        processor_id: candidate.processor.id,
        priority,
        base_priority: base,
        effective_fee_pct,
        freeze_resistance: candidate.freeze_resistance,
        composite: candidate.composite,
    }
}

/// Higher priority first, then lower fee, higher freeze resistance, lexical id.
pub fn compare(a: &RankedProcessor, b: &RankedProcessor) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| a.effective_fee_pct.total_cmp(&b.effective_fee_pct))
        .then_with(|| b.freeze_resistance.total_cmp(&a.freeze_resistance))
        .then_with(|| a.processor_id.cmp(&b.processor_id))
}

pub fn rank(candidates: Vec<Candidate>, tx: &Transaction, config: &RoutingConfig) -> Vec<RankedProcessor> {
    let mut ranked: Vec<RankedProcessor> = candidates
        .into_iter()
        .map(|c| rank_candidate(c, tx, config))
        .collect();
    ranked.sort_by(compare);
    ranked
}

pub fn normalized_confidence(priority: f64, config: &RoutingConfig) -> f64 {
    if config.priority_ceiling <= 0.0 {
        return 0.0;
    }
    clamp01(priority / config.priority_ceiling)
}
