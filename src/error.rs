use thiserror::Error;

/// Failures an insight source may report. The cache treats every variant the
/// same way (synthetic fallback); they only differ in the logs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("insight source rate limited")]
    RateLimited,
    #[error("insight source unreachable: {0}")]
    Unreachable(String),
    #[error("malformed insight payload: {0}")]
    Malformed(String),
}

impl AdapterError {
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::RateLimited => "rate_limited",
            AdapterError::Unreachable(_) => "unreachable",
            AdapterError::Malformed(_) => "malformed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
    #[error("scoring weights must be non-negative and sum to 1.0 (got {0:.4})")]
    WeightsSum(f64),
    #[error("{name} must be within [{min}, {max}] (got {value})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("warning risk threshold {warning} must be below freeze threshold {freeze}")]
    InvertedRiskThresholds { warning: f64, freeze: f64 },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("synthetic ttl ({synthetic_secs}s) must be shorter than live ttl ({live_secs}s)")]
    SyntheticTtlNotShorter { synthetic_secs: u64, live_secs: u64 },
    #[error("base priority configured for unknown processor {0}")]
    UnknownProcessor(String),
    #[error("processor {processor} has invalid {field} ({value})")]
    InvalidProcessorValue {
        processor: String,
        field: &'static str,
        value: f64,
    },
    #[error("processor catalog is empty")]
    EmptyCatalog,
    #[error("duplicate processor id {0}")]
    DuplicateProcessor(String),
}
