use crate::domain::insight::{Insight, SignalType, SourceTag};
use crate::insights::rate_limit::{RateLimitConfig, RateLimiter, RateUsage};
use crate::insights::synthetic::SyntheticGenerator;
use crate::insights::InsightSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub live_ttl_secs: u64,
    pub synthetic_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            live_ttl_secs: 3600,
            synthetic_ttl_secs: 300,
            fetch_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey {
    pub processor_id: String,
    pub region: String,
    pub signal_type: SignalType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub coalesced: u64,
    pub upstream_fetches: u64,
    pub live_stored: u64,
    pub synthetic_served: u64,
    pub rate_limited: u64,
    pub adapter_failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    coalesced: AtomicU64,
    upstream_fetches: AtomicU64,
    live_stored: AtomicU64,
    synthetic_served: AtomicU64,
    rate_limited: AtomicU64,
    adapter_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Latest insight per `(processor, region, signal_type)`.
///
/// `get` never fails: a missing or failed upstream fetch is answered with a
/// synthetic insight cached under the shorter synthetic TTL. Concurrent misses
/// on the same key share a single upstream fetch.
pub struct InsightCache {
    source: Option<Arc<dyn InsightSource>>,
    synthetic: SyntheticGenerator,
    limiter: RateLimiter,
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, Insight>>,
    inflight: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    counters: Counters,
}

impl InsightCache {
    pub fn new(
        source: Option<Arc<dyn InsightSource>>,
        config: CacheConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self::with_generator(source, config, rate_limit, SyntheticGenerator::default())
    }

    pub fn with_generator(
        source: Option<Arc<dyn InsightSource>>,
        config: CacheConfig,
        rate_limit: RateLimitConfig,
        synthetic: SyntheticGenerator,
    ) -> Self {
        Self {
            source,
            synthetic,
            limiter: RateLimiter::new(rate_limit),
            config,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub async fn get(&self, processor_id: &str, region: &str, signal_type: SignalType) -> Insight {
        let key = CacheKey {
            processor_id: processor_id.to_string(),
            region: region.to_string(),
            signal_type,
        };

        if let Some(hit) = self.lookup(&key).await {
            bump(&self.counters.hits);
            return hit;
        }

        let gate = self.flight_gate(&key);
        let _flight = gate.lock().await;

        // Another caller may have refreshed the key while we waited.
        if let Some(hit) = self.lookup(&key).await {
            bump(&self.counters.coalesced);
            return hit;
        }

        let previous = self.entries.read().await.get(&key).map(|i| i.fetched_at);
        let insight = self.refresh(&key, previous).await;
        self.entries.write().await.insert(key.clone(), insight.clone());

        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.remove(&key);
        }
        insight
    }

    /// Cached insight regardless of expiry, without triggering a fetch.
    pub async fn peek(&self, processor_id: &str, region: &str, signal_type: SignalType) -> Option<Insight> {
        let key = CacheKey {
            processor_id: processor_id.to_string(),
            region: region.to_string(),
            signal_type,
        };
        self.entries.read().await.get(&key).cloned()
    }

    pub async fn invalidate(&self, processor_id: &str) {
        self.entries
            .write()
            .await
            .retain(|k, _| k.processor_id != processor_id);
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            upstream_fetches: c.upstream_fetches.load(Ordering::Relaxed),
            live_stored: c.live_stored.load(Ordering::Relaxed),
            synthetic_served: c.synthetic_served.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
            adapter_failures: c.adapter_failures.load(Ordering::Relaxed),
        }
    }

    pub fn rate_usage(&self) -> RateUsage {
        self.limiter.usage()
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Insight> {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|i| !i.is_expired(now))
            .cloned()
    }

    fn flight_gate(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        match self.inflight.lock() {
            Ok(mut inflight) => inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone(),
            Err(_) => Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    async fn refresh(&self, key: &CacheKey, previous: Option<DateTime<Utc>>) -> Insight {
        let Some(source) = &self.source else {
            return self.synthetic_for(key, "no live source configured");
        };

        if !self.limiter.try_acquire() {
            bump(&self.counters.rate_limited);
            tracing::warn!(
                processor = %key.processor_id,
                signal = key.signal_type.as_str(),
                "insight rate budget exhausted, serving synthetic"
            );
            return self.synthetic_for(key, "rate budget exhausted");
        }

        let now = Utc::now();
        let since = previous.unwrap_or_else(|| now - ttl(self.config.live_ttl_secs));
        bump(&self.counters.upstream_fetches);

        let fetch = source.fetch(&key.processor_id, &key.region, key.signal_type, since);
        match tokio::time::timeout(Duration::from_millis(self.config.fetch_timeout_ms), fetch).await {
            Ok(Ok(mut insight)) => {
                let stored_at = Utc::now();
                insight.processor_id = key.processor_id.clone();
                insight.region = key.region.clone();
                insight.signal_type = key.signal_type;
                insight.source = SourceTag::Live;
                insight.fetched_at = stored_at;
                insight.expires_at = stored_at + ttl(self.config.live_ttl_secs);
                bump(&self.counters.live_stored);
                tracing::debug!(
                    processor = %key.processor_id,
                    signal = key.signal_type.as_str(),
                    source = source.name(),
                    "live insight cached"
                );
                insight
            }
            Ok(Err(err)) => {
                bump(&self.counters.adapter_failures);
                tracing::warn!(
                    processor = %key.processor_id,
                    signal = key.signal_type.as_str(),
                    kind = err.kind(),
                    "insight fetch failed: {}",
                    err
                );
                self.synthetic_for(key, err.kind())
            }
            Err(_) => {
                bump(&self.counters.adapter_failures);
                tracing::warn!(
                    processor = %key.processor_id,
                    signal = key.signal_type.as_str(),
                    timeout_ms = self.config.fetch_timeout_ms,
                    "insight fetch timed out"
                );
                self.synthetic_for(key, "timeout")
            }
        }
    }

    fn synthetic_for(&self, key: &CacheKey, cause: &str) -> Insight {
        bump(&self.counters.synthetic_served);
        let now = Utc::now();
        let mut insight = self.synthetic.generate(
            &key.processor_id,
            &key.region,
            key.signal_type,
            now,
            now + ttl(self.config.synthetic_ttl_secs),
        );
        insight.detail = format!("{} (fallback: {})", insight.detail, cause);
        insight
    }
}

fn ttl(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64)
}
