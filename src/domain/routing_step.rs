use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoutingAction {
    Evaluating,
    Selected,
    Rejected,
    Fallback,
}

/// One append-only entry of a transaction's routing trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingStep {
    pub step_index: u32,
    pub processor_id: Option<String>,
    pub action: RoutingAction,
    pub reason: String,
    pub confidence: f64,
    pub elapsed_ms: u64,
}

impl RoutingStep {
    pub fn is_choice(&self) -> bool {
        matches!(self.action, RoutingAction::Selected | RoutingAction::Fallback)
    }
}

pub mod reasons {
    pub const FROZEN: &str = "frozen";
    pub const UNAVAILABLE: &str = "processor unavailable";
    pub const NO_ELIGIBLE: &str = "no eligible processor";
    pub const UNSUPPORTED_CURRENCY: &str = "unsupported currency";
    pub const UNSUPPORTED_REGION: &str = "unsupported region";
    pub const AMOUNT_LIMIT: &str = "amount exceeds processor limit";
}
