use crate::domain::insight::{Confidence, Insight, InsightValue, SignalType, SourceTag};
use crate::error::AdapterError;
use crate::insights::InsightSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory insight source for tests and offline runs.
pub struct MockSource {
    values: Mutex<HashMap<(String, SignalType), InsightValue>>,
    failure: Mutex<Option<AdapterError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: AdapterError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    pub fn with_value(self, processor_id: &str, signal_type: SignalType, value: InsightValue) -> Self {
        self.set_value(processor_id, signal_type, value);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_value(&self, processor_id: &str, signal_type: SignalType, value: InsightValue) {
        if let Ok(mut values) = self.values.lock() {
            values.insert((processor_id.to_string(), signal_type), value);
        }
    }

    pub fn set_failure(&self, error: Option<AdapterError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn default_value(signal_type: SignalType) -> InsightValue {
    match signal_type {
        SignalType::Promotion => InsightValue::Numeric(5.0),
        SignalType::Fee => InsightValue::Numeric(2.9),
        SignalType::Regulation => InsightValue::Category("low".to_string()),
        SignalType::FraudTrend => InsightValue::Category("low".to_string()),
        SignalType::ServiceStatus => InsightValue::Numeric(99.95),
        SignalType::SocialSentiment => InsightValue::Numeric(0.6),
    }
}

#[async_trait::async_trait]
impl InsightSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(
        &self,
        processor_id: &str,
        region: &str,
        signal_type: SignalType,
        _since: DateTime<Utc>,
    ) -> Result<Insight, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(err) = failure {
            return Err(err);
        }

        let value = self
            .values
            .lock()
            .ok()
            .and_then(|v| v.get(&(processor_id.to_string(), signal_type)).cloned())
            .unwrap_or_else(|| default_value(signal_type));

        let now = Utc::now();
        Ok(Insight {
            processor_id: processor_id.to_string(),
            region: region.to_string(),
            signal_type,
            value,
            source: SourceTag::Live,
            confidence: Confidence::High,
            detail: format!("mock {} for {}", signal_type.as_str(), processor_id),
            fetched_at: now,
            expires_at: now,
        })
    }
}
