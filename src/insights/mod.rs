use crate::domain::insight::{Insight, SignalType};
use crate::error::AdapterError;
use chrono::{DateTime, Utc};

pub mod brave;
pub mod cache;
pub mod mock;
pub mod rate_limit;
pub mod synthetic;

#[async_trait::async_trait]
pub trait InsightSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        processor_id: &str,
        region: &str,
        signal_type: SignalType,
        since: DateTime<Utc>,
    ) -> Result<Insight, AdapterError>;
}
