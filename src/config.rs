use crate::domain::processor::{builtin_catalog, Processor};
use crate::error::ConfigError;
use crate::health::state::HealthThresholds;
use crate::insights::brave::DEFAULT_BASE_URL;
use crate::insights::cache::CacheConfig;
use crate::insights::rate_limit::RateLimitConfig;
use crate::router::ranking::RoutingConfig;
use crate::trace::publisher::DEFAULT_BUFFER;
use crate::scoring::types::ScoringConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub health: HealthThresholds,
    pub scoring: ScoringConfig,
    pub routing: RoutingConfig,
    pub trace_buffer: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            health: HealthThresholds::default(),
            scoring: ScoringConfig::default(),
            routing: RoutingConfig::default(),
            trace_buffer: DEFAULT_BUFFER,
        }
    }
}

impl RouterConfig {
    /// Rejects settings the engine cannot run with. Called before any
    /// transaction is accepted.
    pub fn validate(&self, catalog: &[Processor]) -> Result<(), ConfigError> {
        let w = &self.scoring.weights;
        if !w.all_finite() || w.any_negative() || (w.total() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightsSum(w.total()));
        }

        let t = &self.scoring.thresholds;
        for (name, value) in [
            ("fraud_high", t.fraud_high),
            ("fraud_low", t.fraud_low),
            ("reliability_poor", t.reliability_poor),
            ("reliability_excellent", t.reliability_excellent),
            ("market_poor", t.market_poor),
            ("market_strong", t.market_strong),
            ("cost_good", t.cost_good),
            ("compliance_strong", t.compliance_strong),
            ("overall_excellent", t.overall_excellent),
            ("overall_poor", t.overall_poor),
        ] {
            unit_range(name, value)?;
        }
        for (name, value) in [
            ("max_reliability_bonus", t.max_reliability_bonus),
            ("max_priority_boost", t.max_priority_boost),
            ("max_risk_penalty", t.max_risk_penalty),
        ] {
            non_negative(name, value)?;
        }

        let h = &self.health;
        percent_range("health.warning_risk", h.warning_risk)?;
        percent_range("health.freeze_risk", h.freeze_risk)?;
        if h.warning_risk >= h.freeze_risk {
            return Err(ConfigError::InvertedRiskThresholds {
                warning: h.warning_risk,
                freeze: h.freeze_risk,
            });
        }
        non_zero("health.staleness_secs", h.staleness_secs)?;

        let c = &self.cache;
        non_zero("cache.live_ttl_secs", c.live_ttl_secs)?;
        non_zero("cache.synthetic_ttl_secs", c.synthetic_ttl_secs)?;
        non_zero("cache.fetch_timeout_ms", c.fetch_timeout_ms)?;
        if c.synthetic_ttl_secs >= c.live_ttl_secs {
            return Err(ConfigError::SyntheticTtlNotShorter {
                synthetic_secs: c.synthetic_ttl_secs,
                live_secs: c.live_ttl_secs,
            });
        }

        non_zero("rate_limit.per_second", u64::from(self.rate_limit.per_second))?;
        non_zero("rate_limit.per_day", u64::from(self.rate_limit.per_day))?;
        non_zero("trace_buffer", self.trace_buffer as u64)?;

        let r = &self.routing;
        positive("routing.priority_ceiling", r.priority_ceiling)?;
        positive("routing.fee_reference_pct", r.fee_reference_pct)?;
        positive("scoring.fee_reference_pct", self.scoring.fee_reference_pct)?;
        non_negative("routing.fee_priority_weight", r.fee_priority_weight)?;
        non_negative("routing.success_rate_weight", r.success_rate_weight)?;
        non_negative("routing.affinity_boost", r.affinity_boost)?;
        if !(0.0..1.0).contains(&r.success_rate_floor) {
            return Err(ConfigError::OutOfRange {
                name: "routing.success_rate_floor",
                value: r.success_rate_floor,
                min: 0.0,
                max: 1.0,
            });
        }
        unit_range("urgency_fee_weights.normal", r.urgency_fee_weights.normal)?;
        unit_range("urgency_fee_weights.high", r.urgency_fee_weights.high)?;
        unit_range("urgency_fee_weights.critical", r.urgency_fee_weights.critical)?;

        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        let mut seen = HashSet::new();
        for p in catalog {
            if !seen.insert(p.id.as_str()) {
                return Err(ConfigError::DuplicateProcessor(p.id.clone()));
            }
            processor_value(&p.id, "base_priority", p.base_priority, p.base_priority.is_finite())?;
            processor_value(&p.id, "success_rate", p.success_rate, (0.0..=1.0).contains(&p.success_rate))?;
            processor_value(
                &p.id,
                "fee_baseline_pct",
                p.fee_baseline_pct,
                p.fee_baseline_pct.is_finite() && p.fee_baseline_pct >= 0.0,
            )?;
        }
        let mut overridden: Vec<(&String, &f64)> = r.base_priority.iter().collect();
        overridden.sort_by(|a, b| a.0.cmp(b.0));
        for (id, value) in overridden {
            if !seen.contains(id.as_str()) {
                return Err(ConfigError::UnknownProcessor(id.clone()));
            }
            processor_value(id, "base_priority override", *value, value.is_finite())?;
        }
        Ok(())
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: f64::MAX,
        })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Zero(name))
    }
}

fn processor_value(processor: &str, field: &'static str, value: f64, ok: bool) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidProcessorValue {
            processor: processor.to_string(),
            field,
            value,
        })
    }
}

fn percent_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 100.0,
        })
    }
}

fn non_zero(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero(name))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub router: RouterConfig,
    pub brave_api_key: Option<String>,
    pub brave_base_url: String,
    pub catalog_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut router = match lookup("ROUTER_CONFIG_PATH") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::InvalidEnv {
                    key: "ROUTER_CONFIG_PATH".to_string(),
                    value: format!("{}: {}", path, e),
                })?;
                serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidEnv {
                    key: "ROUTER_CONFIG_PATH".to_string(),
                    value: format!("{}: {}", path, e),
                })?
            }
            None => RouterConfig::default(),
        };

        let env = EnvReader { lookup: &lookup };
        router.cache.live_ttl_secs = env.or("INSIGHT_LIVE_TTL_SECS", router.cache.live_ttl_secs)?;
        router.cache.synthetic_ttl_secs = env.or("INSIGHT_SYNTHETIC_TTL_SECS", router.cache.synthetic_ttl_secs)?;
        router.cache.fetch_timeout_ms = env.or("INSIGHT_FETCH_TIMEOUT_MS", router.cache.fetch_timeout_ms)?;
        router.rate_limit.per_second = env.or("INSIGHT_RATE_PER_SECOND", router.rate_limit.per_second)?;
        router.rate_limit.per_day = env.or("INSIGHT_RATE_PER_DAY", router.rate_limit.per_day)?;
        router.health.staleness_secs = env.or("HEALTH_STALENESS_SECS", router.health.staleness_secs)?;
        router.health.warning_risk = env.or("HEALTH_WARNING_RISK", router.health.warning_risk)?;
        router.health.freeze_risk = env.or("HEALTH_FREEZE_RISK", router.health.freeze_risk)?;
        router.trace_buffer = env.or("TRACE_BUFFER", router.trace_buffer)?;

        let w = &mut router.scoring.weights;
        w.fraud_risk_weight = env.or("SCORE_WEIGHT_FRAUD_RISK", w.fraud_risk_weight)?;
        w.service_reliability_weight = env.or("SCORE_WEIGHT_SERVICE_RELIABILITY", w.service_reliability_weight)?;
        w.market_confidence_weight = env.or("SCORE_WEIGHT_MARKET_CONFIDENCE", w.market_confidence_weight)?;
        w.cost_effectiveness_weight = env.or("SCORE_WEIGHT_COST_EFFECTIVENESS", w.cost_effectiveness_weight)?;
        w.compliance_weight = env.or("SCORE_WEIGHT_COMPLIANCE", w.compliance_weight)?;

        if let Some(raw) = lookup("BASE_PRIORITY_OVERRIDES") {
            router.routing.base_priority.extend(parse_base_priorities(&raw)?);
        }

        Ok(Self {
            router,
            brave_api_key: lookup("BRAVE_SEARCH_API_KEY").filter(|k| !k.trim().is_empty()),
            brave_base_url: lookup("BRAVE_SEARCH_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            catalog_path: lookup("PROCESSOR_CATALOG_PATH"),
        })
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match (self.lookup)(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            }),
        }
    }
}

/// `stripe=0.9,visa=0.8`
fn parse_base_priorities(raw: &str) -> Result<Vec<(String, f64)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let invalid = || ConfigError::InvalidEnv {
                key: "BASE_PRIORITY_OVERRIDES".to_string(),
                value: pair.to_string(),
            };
            let (id, value) = pair.split_once('=').ok_or_else(invalid)?;
            let value: f64 = value.trim().parse().map_err(|_| invalid())?;
            Ok((id.trim().to_string(), value))
        })
        .collect()
}

pub fn load_catalog(path: Option<&str>) -> anyhow::Result<Vec<Processor>> {
    let Some(path) = path else {
        return Ok(builtin_catalog());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading processor catalog {}", path))?;
    let catalog: Vec<Processor> =
        serde_json::from_str(&raw).with_context(|| format!("parsing processor catalog {}", path))?;
    Ok(catalog)
}
