use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Promotion,
    Regulation,
    Fee,
    FraudTrend,
    ServiceStatus,
    SocialSentiment,
}

impl SignalType {
    pub const ALL: [SignalType; 6] = [
        SignalType::Promotion,
        SignalType::Regulation,
        SignalType::Fee,
        SignalType::FraudTrend,
        SignalType::ServiceStatus,
        SignalType::SocialSentiment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Promotion => "promotion",
            SignalType::Regulation => "regulation",
            SignalType::Fee => "fee",
            SignalType::FraudTrend => "fraud_trend",
            SignalType::ServiceStatus => "service_status",
            SignalType::SocialSentiment => "social_sentiment",
        }
    }
}

/// Where an insight came from. Synthetic insights are never reported as live.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Live,
    Synthetic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn weight(self) -> f64 {
        match self {
            Confidence::High => 0.9,
            Confidence::Medium => 0.6,
            Confidence::Low => 0.3,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.55 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Signal payload.
///
/// Numeric meanings: promotion discount percent, fee percent, service uptime
/// percent, social sentiment in [-1, 1]. Categories: fraud trend risk level
/// (`low|medium|high|critical`), regulation severity
/// (`none|low|medium|high|critical`), service status
/// (`operational|maintenance|degraded|outage`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InsightValue {
    Numeric(f64),
    Category(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub processor_id: String,
    pub region: String,
    pub signal_type: SignalType,
    pub value: InsightValue,
    pub source: SourceTag,
    pub confidence: Confidence,
    pub detail: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Insight {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == SourceTag::Synthetic
    }
}
