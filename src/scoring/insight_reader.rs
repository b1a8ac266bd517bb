use crate::domain::insight::{Insight, SignalType, SourceTag};
use crate::insights::cache::InsightCache;
use chrono::{DateTime, Utc};

/// Latest insight per signal type for one `(processor, region)`.
#[derive(Debug, Clone)]
pub struct InsightSet {
    pub promotion: Insight,
    pub regulation: Insight,
    pub fee: Insight,
    pub fraud_trend: Insight,
    pub service_status: Insight,
    pub social_sentiment: Insight,
}

pub type InsightFingerprint = Vec<(SignalType, SourceTag, DateTime<Utc>)>;

impl InsightSet {
    pub fn iter(&self) -> impl Iterator<Item = &Insight> {
        [
            &self.promotion,
            &self.regulation,
            &self.fee,
            &self.fraud_trend,
            &self.service_status,
            &self.social_sentiment,
        ]
        .into_iter()
    }

    /// Identifies the exact insight versions a score was computed from.
    pub fn fingerprint(&self) -> InsightFingerprint {
        self.iter()
            .map(|i| (i.signal_type, i.source, i.fetched_at))
            .collect()
    }

    pub fn synthetic_count(&self) -> usize {
        self.iter().filter(|i| i.is_synthetic()).count()
    }

    pub fn mean_confidence(&self) -> f64 {
        let weights: Vec<f64> = self.iter().map(|i| i.confidence.weight()).collect();
        weights.iter().sum::<f64>() / weights.len() as f64
    }
}

pub async fn read_insights_for_processor(
    cache: &InsightCache,
    processor_id: &str,
    region: &str,
) -> InsightSet {
    let (promotion, regulation, fee, fraud_trend, service_status, social_sentiment) = tokio::join!(
        cache.get(processor_id, region, SignalType::Promotion),
        cache.get(processor_id, region, SignalType::Regulation),
        cache.get(processor_id, region, SignalType::Fee),
        cache.get(processor_id, region, SignalType::FraudTrend),
        cache.get(processor_id, region, SignalType::ServiceStatus),
        cache.get(processor_id, region, SignalType::SocialSentiment),
    );

    InsightSet {
        promotion,
        regulation,
        fee,
        fraud_trend,
        service_status,
        social_sentiment,
    }
}
