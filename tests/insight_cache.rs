use payment_router::domain::insight::{InsightValue, SignalType, SourceTag};
use payment_router::error::AdapterError;
use payment_router::insights::cache::{CacheConfig, InsightCache};
use payment_router::insights::mock::MockSource;
use payment_router::insights::rate_limit::RateLimitConfig;
use payment_router::insights::InsightSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

fn generous() -> RateLimitConfig {
    RateLimitConfig {
        per_second: 1_000,
        per_day: 100_000,
    }
}

fn cache(source: &Arc<MockSource>, config: CacheConfig, rate_limit: RateLimitConfig) -> InsightCache {
    let source: Arc<dyn InsightSource> = source.clone();
    InsightCache::new(Some(source), config, rate_limit)
}

#[tokio::test]
async fn concurrent_misses_share_one_upstream_fetch() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(50)));
    let cache = Arc::new(cache(&source, CacheConfig::default(), generous()));

    let mut set = JoinSet::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        set.spawn(async move { cache.get("stripe", "US", SignalType::FraudTrend).await });
    }
    while let Some(insight) = set.join_next().await {
        assert_eq!(insight.unwrap().source, SourceTag::Live);
    }

    assert_eq!(source.calls(), 1);
    let stats = cache.stats();
    assert_eq!(stats.upstream_fetches, 1);
    assert_eq!(stats.coalesced + stats.hits, 9);
}

#[tokio::test]
async fn live_insight_is_stamped_with_live_ttl() {
    let source = Arc::new(MockSource::new().with_value(
        "stripe",
        SignalType::ServiceStatus,
        InsightValue::Category("degraded".to_string()),
    ));
    let cache = cache(&source, CacheConfig::default(), generous());

    let insight = cache.get("stripe", "EU", SignalType::ServiceStatus).await;
    assert_eq!(insight.value, InsightValue::Category("degraded".to_string()));
    assert_eq!(insight.region, "EU");
    assert_eq!(insight.expires_at - insight.fetched_at, chrono::Duration::seconds(3600));

    let again = cache.get("stripe", "EU", SignalType::ServiceStatus).await;
    assert_eq!(again, insight);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn failed_fetch_serves_synthetic_under_short_ttl() {
    let source = Arc::new(MockSource::failing(AdapterError::Unreachable("connection refused".to_string())));
    let cache = cache(&source, CacheConfig::default(), generous());

    let insight = cache.get("paypal", "US", SignalType::Fee).await;
    assert!(insight.is_synthetic());
    assert!(insight.detail.contains("fallback: unreachable"));
    assert_eq!(insight.expires_at - insight.fetched_at, chrono::Duration::seconds(300));

    // Cached fallback answers the next read without another upstream call.
    let again = cache.get("paypal", "US", SignalType::Fee).await;
    assert!(again.is_synthetic());
    assert_eq!(source.calls(), 1);
    assert_eq!(cache.stats().adapter_failures, 1);
}

#[tokio::test]
async fn expired_synthetic_entry_is_replaced_once_source_recovers() {
    let source = Arc::new(MockSource::failing(AdapterError::RateLimited));
    let config = CacheConfig {
        synthetic_ttl_secs: 1,
        ..CacheConfig::default()
    };
    let cache = cache(&source, config, generous());

    assert!(cache.get("visa", "US", SignalType::Promotion).await.is_synthetic());

    source.set_failure(None);
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let refreshed = cache.get("visa", "US", SignalType::Promotion).await;
    assert_eq!(refreshed.source, SourceTag::Live);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn exhausted_rate_budget_falls_back_without_calling_source() {
    let source = Arc::new(MockSource::new());
    let cache = cache(
        &source,
        CacheConfig::default(),
        RateLimitConfig {
            per_second: 1,
            per_day: 2_000,
        },
    );

    let first = cache.get("adyen", "US", SignalType::Regulation).await;
    let second = cache.get("adyen", "US", SignalType::FraudTrend).await;

    assert_eq!(first.source, SourceTag::Live);
    assert!(second.is_synthetic());
    assert!(second.detail.contains("rate budget exhausted"));
    assert_eq!(source.calls(), 1);
    assert_eq!(cache.stats().rate_limited, 1);
    assert_eq!(cache.rate_usage().used_last_24h, 1);
}

#[tokio::test]
async fn slow_source_times_out_into_synthetic() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(300)));
    let config = CacheConfig {
        fetch_timeout_ms: 20,
        ..CacheConfig::default()
    };
    let cache = cache(&source, config, generous());

    let insight = cache.get("square", "US", SignalType::SocialSentiment).await;
    assert!(insight.is_synthetic());
    assert!(insight.detail.contains("fallback: timeout"));
}

#[tokio::test]
async fn without_source_everything_is_synthetic() {
    let cache = InsightCache::new(None, CacheConfig::default(), generous());
    let insight = cache.get("crossmint", "US", SignalType::FraudTrend).await;

    assert!(insight.is_synthetic());
    assert_eq!(cache.stats().upstream_fetches, 0);
}

#[tokio::test]
async fn invalidate_drops_only_that_processor() {
    let source = Arc::new(MockSource::new());
    let cache = cache(&source, CacheConfig::default(), generous());
    cache.get("stripe", "US", SignalType::Fee).await;
    cache.get("visa", "US", SignalType::Fee).await;

    cache.invalidate("stripe").await;

    assert!(cache.peek("stripe", "US", SignalType::Fee).await.is_none());
    assert!(cache.peek("visa", "US", SignalType::Fee).await.is_some());
}
