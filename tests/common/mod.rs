#![allow(dead_code)]

use payment_router::config::RouterConfig;
use payment_router::domain::processor::Processor;
use payment_router::execution::mock::MockExecutor;
use payment_router::health::state::HealthSample;
use payment_router::insights::mock::MockSource;
use payment_router::insights::rate_limit::RateLimitConfig;
use payment_router::insights::InsightSource;
use payment_router::RoutingEngine;
use std::sync::Arc;

pub fn processor(id: &str, base_priority: f64) -> Processor {
    Processor {
        id: id.to_string(),
        name: id.to_uppercase(),
        currencies: vec!["USD".to_string()],
        regions: vec!["US".to_string()],
        fee_baseline_pct: 2.9,
        success_rate: 0.97,
        base_priority,
        max_amount_minor: None,
        best_for: Vec::new(),
    }
}

/// Router config with a rate budget large enough that tests never hit it.
pub fn router_config() -> RouterConfig {
    RouterConfig {
        rate_limit: RateLimitConfig {
            per_second: 10_000,
            per_day: 1_000_000,
        },
        ..RouterConfig::default()
    }
}

pub fn engine_with(
    config: &RouterConfig,
    catalog: Vec<Processor>,
    source: Arc<MockSource>,
    executor: Arc<MockExecutor>,
) -> RoutingEngine {
    let source: Arc<dyn InsightSource> = source;
    RoutingEngine::from_config(config, catalog, Some(source))
        .unwrap()
        .with_executor(executor)
}

pub fn engine(catalog: Vec<Processor>, source: Arc<MockSource>, executor: Arc<MockExecutor>) -> RoutingEngine {
    engine_with(&router_config(), catalog, source, executor)
}

/// A frozen at risk 95, B healthy with freeze resistance 90, C healthy with 95.
pub fn abc_engine(executor: Arc<MockExecutor>) -> RoutingEngine {
    let engine = engine(
        vec![processor("a", 0.7), processor("b", 0.7), processor("c", 0.7)],
        Arc::new(MockSource::new()),
        executor,
    );
    engine.health().report("a", HealthSample::new(95.0, 40.0));
    engine.health().report("b", HealthSample::new(15.0, 90.0));
    engine.health().report("c", HealthSample::new(8.0, 95.0));
    engine
}
