use payment_router::domain::insight::{InsightValue, SignalType};
use payment_router::insights::cache::{CacheConfig, InsightCache};
use payment_router::insights::mock::MockSource;
use payment_router::insights::rate_limit::RateLimitConfig;
use payment_router::insights::InsightSource;
use payment_router::scoring::engine::ScoringEngine;
use payment_router::scoring::types::ScoringConfig;
use std::sync::Arc;

fn scoring(source: Option<Arc<MockSource>>) -> ScoringEngine {
    let source = source.map(|s| s as Arc<dyn InsightSource>);
    let cache = InsightCache::new(
        source,
        CacheConfig::default(),
        RateLimitConfig {
            per_second: 1_000,
            per_day: 100_000,
        },
    );
    ScoringEngine::new(Arc::new(cache), ScoringConfig::default())
}

#[tokio::test]
async fn scoring_prefers_healthier_processor() {
    let source = Arc::new(
        MockSource::new()
            .with_value("stripe", SignalType::FraudTrend, InsightValue::Category("high".to_string()))
            .with_value("stripe", SignalType::ServiceStatus, InsightValue::Numeric(40.0))
            .with_value("stripe", SignalType::SocialSentiment, InsightValue::Numeric(-0.6)),
    );
    let engine = scoring(Some(source));

    let weak = engine.score("stripe").await;
    let strong = engine.score("visa").await;

    assert!(strong.overall_health > weak.overall_health);
    assert!(weak.adjustment.net_priority_delta() < strong.adjustment.net_priority_delta());
    assert!(weak.adjustment.risk_penalty > 0.0);
    assert!(weak
        .adjustment
        .reasons
        .iter()
        .any(|r| r.starts_with("poor service reliability")));
}

#[tokio::test]
async fn unchanged_insights_give_identical_scores() {
    let source = Arc::new(MockSource::new());
    let engine = scoring(Some(source.clone()));

    let first = engine.score("adyen").await;
    let second = engine.score("adyen").await;

    assert_eq!(first, second);
    assert_eq!(source.calls(), 6);
    assert_eq!(first.region, "US");
    assert_eq!(first.synthetic_signals, 0);
}

#[tokio::test]
async fn scores_are_kept_per_region() {
    let engine = scoring(Some(Arc::new(MockSource::new())));

    let us = engine.score_in_region("visa", "US").await;
    let eu = engine.score_in_region("visa", "EU").await;

    assert_eq!(us.region, "US");
    assert_eq!(eu.region, "EU");
    assert_eq!(engine.cache().stats().upstream_fetches, 12);
}

#[tokio::test]
async fn missing_source_scores_on_synthetic_signals() {
    let engine = scoring(None);
    let score = engine.score("square").await;

    assert_eq!(score.synthetic_signals, 6);
    assert!((score.data_confidence - 0.3).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&score.overall_health));
}
