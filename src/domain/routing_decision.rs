use crate::domain::routing_step::{RoutingAction, RoutingStep};
use crate::router::ranking::RankedProcessor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// First-ranked processor accepted the transaction (or no execution layer is attached).
    Selected,
    /// A lower-ranked processor took over after one or more live rejections.
    RecoveredByFallback,
    /// Every candidate was excluded or rejected.
    Exhausted,
    /// Caller cancelled before a processor confirmed.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResult {
    pub transaction_id: Uuid,
    pub selected_processor: Option<String>,
    pub outcome: RoutingOutcome,
    pub trace: Vec<RoutingStep>,
    pub ranking: Vec<RankedProcessor>,
    pub fallback_chain: Vec<String>,
    pub freeze_avoidance: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl RoutingResult {
    pub fn is_exhausted(&self) -> bool {
        self.outcome == RoutingOutcome::Exhausted
    }

    pub fn rejected_processors(&self) -> Vec<&str> {
        self.trace
            .iter()
            .filter(|s| s.action == RoutingAction::Rejected)
            .filter_map(|s| s.processor_id.as_deref())
            .collect()
    }

    pub fn final_step(&self) -> Option<&RoutingStep> {
        self.trace.last()
    }
}
