use crate::domain::transaction::Transaction;
use crate::execution::{AttemptOutcome, SettlementExecutor};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    Confirm,
    Reject(String),
    Unavailable,
    Error(String),
}

pub struct MockExecutor {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    default: MockBehavior,
    delay: Option<Duration>,
    attempts: Mutex<Vec<String>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            default: MockBehavior::Confirm,
            delay: None,
            attempts: Mutex::new(Vec::new()),
        }
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(self, processor_id: &str, behavior: MockBehavior) -> Self {
        self.set_behavior(processor_id, behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_behavior(&self, processor_id: &str, behavior: MockBehavior) {
        if let Ok(mut behaviors) = self.behaviors.lock() {
            behaviors.insert(processor_id.to_string(), behavior);
        }
    }

    /// Processor ids in the order they were attempted.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SettlementExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn attempt(&self, processor_id: &str, _transaction: &Transaction) -> Result<AttemptOutcome> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(processor_id.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .behaviors
            .lock()
            .ok()
            .and_then(|b| b.get(processor_id).cloned())
            .unwrap_or_else(|| self.default.clone());

        match behavior {
            MockBehavior::Confirm => Ok(AttemptOutcome::Confirmed {
                reference: Some(format!("mock_txn_{}", uuid::Uuid::new_v4())),
            }),
            MockBehavior::Reject(reason) => Ok(AttemptOutcome::Rejected { reason }),
            MockBehavior::Unavailable => Ok(AttemptOutcome::ProcessorUnavailable),
            MockBehavior::Error(message) => Err(anyhow::anyhow!(message)),
        }
    }
}
