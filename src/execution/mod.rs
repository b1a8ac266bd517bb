use crate::domain::transaction::Transaction;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod mock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Confirmed { reference: Option<String> },
    Rejected { reason: String },
    ProcessorUnavailable,
}

/// Settlement layer the router hands a selected processor to. An `Err` is
/// treated like `ProcessorUnavailable`.
#[async_trait::async_trait]
pub trait SettlementExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, processor_id: &str, transaction: &Transaction) -> Result<AttemptOutcome>;
}

/// Confirms every attempt. Used when the caller only wants a routing decision.
pub struct AcceptAll;

#[async_trait::async_trait]
impl SettlementExecutor for AcceptAll {
    fn name(&self) -> &'static str {
        "accept_all"
    }

    async fn attempt(&self, _processor_id: &str, _transaction: &Transaction) -> Result<AttemptOutcome> {
        Ok(AttemptOutcome::Confirmed { reference: None })
    }
}
