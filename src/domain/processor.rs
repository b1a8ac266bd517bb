use serde::{Deserialize, Serialize};

pub const GLOBAL_REGION: &str = "GLOBAL";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Warning,
    Frozen,
    Unavailable,
}

impl HealthState {
    /// Only healthy and warning processors may receive new transactions.
    pub fn is_routable(self) -> bool {
        matches!(self, HealthState::Healthy | HealthState::Warning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Warning => "warning",
            HealthState::Frozen => "frozen",
            HealthState::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Processor {
    pub id: String,
    pub name: String,
    pub currencies: Vec<String>,
    pub regions: Vec<String>,
    pub fee_baseline_pct: f64,
    pub success_rate: f64,
    pub base_priority: f64,
    #[serde(default)]
    pub max_amount_minor: Option<i64>,
    #[serde(default)]
    pub best_for: Vec<String>,
}

impl Processor {
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.currencies.iter().any(|c| c.eq_ignore_ascii_case(currency))
    }

    pub fn supports_region(&self, region: &str) -> bool {
        self.regions
            .iter()
            .any(|r| r.eq_ignore_ascii_case(GLOBAL_REGION) || r.eq_ignore_ascii_case(region))
    }

    pub fn accepts_amount(&self, amount_minor: i64) -> bool {
        self.max_amount_minor.map_or(true, |max| amount_minor <= max)
    }
}

pub fn builtin_catalog() -> Vec<Processor> {
    vec![
        processor(
            "stripe",
            "Stripe",
            &["USD", "EUR", "GBP", "AUD"],
            &["US", "EU", "AU"],
            2.9,
            0.97,
            0.80,
            Some(99_999_900),
            &["b2b", "subscription", "saas"],
        ),
        processor(
            "paypal",
            "PayPal",
            &["USD", "EUR", "GBP"],
            &["US", "EU", "GLOBAL"],
            3.49,
            0.95,
            0.70,
            Some(10_000_000),
            &["consumer", "marketplace", "ecommerce"],
        ),
        processor(
            "square",
            "Square",
            &["USD", "CAD", "AUD"],
            &["US", "CA", "AU"],
            2.6,
            0.96,
            0.65,
            Some(5_000_000),
            &["retail", "pos", "small_business"],
        ),
        processor(
            "visa",
            "Visa Direct",
            &["USD", "EUR", "GBP", "JPY"],
            &["GLOBAL"],
            2.2,
            0.98,
            0.75,
            Some(200_000_000),
            &["enterprise", "high_value", "international"],
        ),
        processor(
            "adyen",
            "Adyen",
            &["USD", "EUR", "GBP", "JPY", "SGD"],
            &["EU", "ASIA", "GLOBAL"],
            2.5,
            0.97,
            0.72,
            Some(100_000_000),
            &["international", "enterprise", "high_volume"],
        ),
        processor(
            "crossmint",
            "Crossmint",
            &["USD", "USDC", "SOL", "ETH"],
            &["GLOBAL"],
            1.5,
            0.94,
            0.60,
            Some(50_000_000),
            &["crypto", "web3", "stablecoin", "international"],
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn processor(
    id: &str,
    name: &str,
    currencies: &[&str],
    regions: &[&str],
    fee_baseline_pct: f64,
    success_rate: f64,
    base_priority: f64,
    max_amount_minor: Option<i64>,
    best_for: &[&str],
) -> Processor {
    Processor {
        id: id.to_string(),
        name: name.to_string(),
        currencies: currencies.iter().map(|s| s.to_string()).collect(),
        regions: regions.iter().map(|s| s.to_string()).collect(),
        fee_baseline_pct,
        success_rate,
        base_priority,
        max_amount_minor,
        best_for: best_for.iter().map(|s| s.to_string()).collect(),
    }
}
