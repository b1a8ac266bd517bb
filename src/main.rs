use payment_router::config::{load_catalog, AppConfig};
use payment_router::domain::routing_decision::RoutingResult;
use payment_router::domain::transaction::{Transaction, Urgency};
use payment_router::execution::mock::{MockBehavior, MockExecutor};
use payment_router::health::state::HealthSample;
use payment_router::health::transitions::OperationalMetrics;
use payment_router::insights::brave::BraveSearchSource;
use payment_router::insights::InsightSource;
use payment_router::trace::publisher::TraceTopic;
use payment_router::RoutingEngine;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;
    let catalog = load_catalog(cfg.catalog_path.as_deref())?;

    let source: Option<Arc<dyn InsightSource>> = match &cfg.brave_api_key {
        Some(key) => Some(Arc::new(BraveSearchSource::new(
            key.clone(),
            cfg.brave_base_url.clone(),
            cfg.router.cache.fetch_timeout_ms,
        ))),
        None => {
            tracing::info!("BRAVE_SEARCH_API_KEY not set, routing on synthetic insights only");
            None
        }
    };

    let executor = Arc::new(
        MockExecutor::new().with_behavior("paypal", MockBehavior::Reject("issuer declined".to_string())),
    );
    let engine = Arc::new(RoutingEngine::from_config(&cfg.router, catalog, source)?.with_executor(executor));

    spawn_observers(&engine);
    seed_health(&engine);

    let first_wave = vec![
        Transaction::new(50_000, "USD").with_tag("saas"),
        Transaction::new(12_500, "EUR").with_region("EU"),
        Transaction::new(250_000, "USDC").with_urgency(Urgency::High),
        Transaction::new(150_000_000, "USD").with_urgency(Urgency::Critical),
    ];
    for result in route_all(&engine, first_wave).await {
        print_result(&result)?;
    }

    // Chargebacks past 1% freeze stripe; later traffic must route around it.
    engine.health().report_operational(
        "stripe",
        OperationalMetrics {
            chargeback_rate: 0.015,
            refund_rate: 0.04,
            volume_spike: 2.0,
        },
    );

    let second_wave = vec![
        Transaction::new(50_000, "USD").with_tag("saas"),
        Transaction::new(8_000, "GBP"),
        Transaction::new(75_000, "USD").with_urgency(Urgency::High),
    ];
    for result in route_all(&engine, second_wave).await {
        print_result(&result)?;
    }

    let cache = engine.scoring().cache();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "cache": cache.stats(),
            "rate_budget": cache.rate_usage(),
            "health": engine.health().snapshot_all(),
        }))?
    );
    Ok(())
}

fn seed_health(engine: &RoutingEngine) {
    let seeds = [
        ("stripe", 15.0, 30.0),
        ("paypal", 20.0, 60.0),
        ("square", 12.0, 70.0),
        ("visa", 8.0, 90.0),
        ("adyen", 10.0, 80.0),
        ("crossmint", 8.0, 95.0),
    ];
    for (id, risk, freeze_resistance) in seeds {
        engine.health().report(id, HealthSample::new(risk, freeze_resistance));
    }
}

fn spawn_observers(engine: &RoutingEngine) {
    let mut transitions = engine.health().subscribe();
    tokio::spawn(async move {
        loop {
            match transitions.recv().await {
                Ok(t) => tracing::info!(
                    processor = %t.processor_id,
                    from = t.from.as_str(),
                    to = t.to.as_str(),
                    "health observer"
                ),
                Err(RecvError::Lagged(n)) => tracing::warn!("health observer lagged by {}", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut steps = engine.publisher().subscribe(TraceTopic::All);
    tokio::spawn(async move {
        loop {
            match steps.recv().await {
                Ok(event) => tracing::debug!(
                    transaction = %event.transaction_id,
                    step = event.step.step_index,
                    action = ?event.step.action,
                    processor = event.step.processor_id.as_deref().unwrap_or("-"),
                    "{}",
                    event.step.reason
                ),
                Err(RecvError::Lagged(n)) => tracing::warn!("trace observer lagged by {}", n),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn route_all(engine: &Arc<RoutingEngine>, transactions: Vec<Transaction>) -> Vec<RoutingResult> {
    let mut set = JoinSet::new();
    for (i, tx) in transactions.into_iter().enumerate() {
        let engine = Arc::clone(engine);
        set.spawn(async move { (i, engine.route(&tx).await) });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(done) => results.push(done),
            Err(e) => tracing::error!("routing task failed: {}", e),
        }
    }
    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, r)| r).collect()
}

fn print_result(result: &RoutingResult) -> anyhow::Result<()> {
    let summary = json!({
        "transaction_id": result.transaction_id,
        "selected_processor": result.selected_processor,
        "outcome": result.outcome,
        "fallback_chain": result.fallback_chain,
        "freeze_avoidance": result.freeze_avoidance,
        "trace": result.trace,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
