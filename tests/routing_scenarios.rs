mod common;

use common::{abc_engine, engine, engine_with, processor, router_config};
use payment_router::domain::processor::builtin_catalog;
use payment_router::domain::routing_decision::RoutingOutcome;
use payment_router::domain::routing_step::{reasons, RoutingAction, RoutingStep};
use payment_router::domain::transaction::{Transaction, Urgency};
use payment_router::error::AdapterError;
use payment_router::execution::mock::{MockBehavior, MockExecutor};
use payment_router::health::state::HealthSample;
use payment_router::insights::mock::MockSource;
use payment_router::trace::publisher::TraceTopic;
use payment_router::RoutingEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinSet;

fn actions(trace: &[RoutingStep]) -> Vec<(Option<&str>, RoutingAction)> {
    trace
        .iter()
        .map(|s| (s.processor_id.as_deref(), s.action))
        .collect()
}

fn usd() -> Transaction {
    Transaction::new(50_000, "USD")
}

#[tokio::test]
async fn frozen_processor_is_skipped_and_freeze_resistance_breaks_the_tie() {
    let engine = abc_engine(Arc::new(MockExecutor::new()));
    let result = engine.route(&usd()).await;

    assert_eq!(result.outcome, RoutingOutcome::Selected);
    assert_eq!(result.selected_processor.as_deref(), Some("c"));
    assert_eq!(result.fallback_chain, vec!["b".to_string()]);
    assert_eq!(
        actions(&result.trace),
        vec![
            (Some("a"), RoutingAction::Rejected),
            (Some("c"), RoutingAction::Evaluating),
            (Some("b"), RoutingAction::Evaluating),
            (Some("c"), RoutingAction::Selected),
        ]
    );
    assert_eq!(result.trace[0].reason, reasons::FROZEN);
    assert!(!result.trace.iter().any(|s| s.is_choice() && s.processor_id.as_deref() == Some("a")));
}

#[tokio::test]
async fn unavailable_processor_falls_back_and_is_never_reselected() {
    let executor = Arc::new(MockExecutor::new().with_behavior("b", MockBehavior::Unavailable));
    let engine = engine(
        vec![processor("a", 0.7), processor("b", 0.9), processor("c", 0.7)],
        Arc::new(MockSource::new()),
        executor.clone(),
    );
    engine.health().report("a", HealthSample::new(95.0, 40.0));
    engine.health().report("b", HealthSample::new(15.0, 90.0));
    engine.health().report("c", HealthSample::new(8.0, 95.0));

    let result = engine.route(&usd()).await;

    assert_eq!(result.outcome, RoutingOutcome::RecoveredByFallback);
    assert_eq!(result.selected_processor.as_deref(), Some("c"));
    assert!(result.freeze_avoidance);
    assert_eq!(executor.attempts(), vec!["b".to_string(), "c".to_string()]);
    assert_eq!(
        actions(&result.trace),
        vec![
            (Some("a"), RoutingAction::Rejected),
            (Some("b"), RoutingAction::Evaluating),
            (Some("c"), RoutingAction::Evaluating),
            (Some("b"), RoutingAction::Selected),
            (Some("b"), RoutingAction::Rejected),
            (Some("c"), RoutingAction::Fallback),
        ]
    );
    assert_eq!(result.trace[4].reason, reasons::UNAVAILABLE);

    let b_choices = result
        .trace
        .iter()
        .filter(|s| s.is_choice() && s.processor_id.as_deref() == Some("b"))
        .count();
    assert_eq!(b_choices, 1);
}

#[tokio::test]
async fn every_processor_down_exhausts_with_one_rejection_each() {
    let executor = Arc::new(MockExecutor::new());
    let engine = engine(
        vec![processor("a", 0.7), processor("b", 0.7), processor("c", 0.7)],
        Arc::new(MockSource::new()),
        executor.clone(),
    );
    engine.health().report("a", HealthSample::new(95.0, 40.0));
    engine.health().report("c", HealthSample::new(5.0, 90.0));
    engine.health().freeze("c", "compliance review");

    let result = engine.route(&usd()).await;

    assert!(result.is_exhausted());
    assert_eq!(result.selected_processor, None);
    assert!(executor.attempts().is_empty());
    assert_eq!(
        actions(&result.trace),
        vec![
            (Some("a"), RoutingAction::Rejected),
            (Some("b"), RoutingAction::Rejected),
            (Some("c"), RoutingAction::Rejected),
            (None, RoutingAction::Rejected),
        ]
    );
    assert_eq!(result.trace[1].reason, reasons::UNAVAILABLE);
    assert_eq!(result.trace[2].reason, reasons::FROZEN);
    assert_eq!(result.rejected_processors(), vec!["a", "b", "c"]);

    let last = result.final_step().unwrap();
    assert_eq!(last.reason, reasons::NO_ELIGIBLE);
    assert_eq!(last.confidence, 0.0);
}

#[tokio::test]
async fn every_candidate_declining_exhausts_after_trying_each_once() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_behavior("b", MockBehavior::Reject("issuer declined".to_string()))
            .with_behavior("c", MockBehavior::Error("connection reset".to_string())),
    );
    let engine = abc_engine(executor.clone());

    let result = engine.route(&usd()).await;

    assert_eq!(result.outcome, RoutingOutcome::Exhausted);
    assert_eq!(executor.attempts(), vec!["c".to_string(), "b".to_string()]);
    let rejections: Vec<&str> = result
        .trace
        .iter()
        .filter(|s| s.action == RoutingAction::Rejected)
        .map(|s| s.reason.as_str())
        .collect();
    assert_eq!(
        rejections,
        vec![reasons::FROZEN, reasons::UNAVAILABLE, "issuer declined", reasons::NO_ELIGIBLE]
    );
}

#[tokio::test]
async fn processor_frozen_mid_route_is_dropped_from_fallback() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_behavior("c", MockBehavior::Unavailable)
            .with_delay(Duration::from_millis(150)),
    );
    let engine = Arc::new(abc_engine(executor.clone()));

    let routing = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.route(&usd()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.health().freeze("b", "chargeback spike");

    let result = routing.await.unwrap();
    assert!(result.is_exhausted());
    assert_eq!(executor.attempts(), vec!["c".to_string()]);
    assert!(!result.trace.iter().any(|s| s.action == RoutingAction::Fallback));
}

#[tokio::test]
async fn unreadable_health_reading_excludes_processor() {
    let engine = engine(
        vec![processor("a", 0.9), processor("b", 0.7)],
        Arc::new(MockSource::new()),
        Arc::new(MockExecutor::new()),
    );
    engine.health().report("a", HealthSample::new(f64::NAN, 50.0));
    engine.health().report("b", HealthSample::new(10.0, 80.0));

    let result = engine.route(&usd()).await;

    assert_eq!(result.selected_processor.as_deref(), Some("b"));
    assert_eq!(result.trace[0].processor_id.as_deref(), Some("a"));
    assert_eq!(result.trace[0].reason, reasons::UNAVAILABLE);
    assert!(result.ranking.iter().all(|r| r.priority.is_finite()));
}

#[tokio::test]
async fn higher_success_rate_wins_between_equal_processors() {
    let mut steady = processor("steady", 0.7);
    steady.success_rate = 0.98;
    let mut flaky = processor("flaky", 0.7);
    flaky.success_rate = 0.91;
    let engine = engine(vec![flaky, steady], Arc::new(MockSource::new()), Arc::new(MockExecutor::new()));
    engine.health().report("flaky", HealthSample::new(10.0, 90.0));
    engine.health().report("steady", HealthSample::new(10.0, 60.0));

    let result = engine.route(&usd()).await;

    assert_eq!(result.selected_processor.as_deref(), Some("steady"));
    assert!(result.ranking[0].base_priority > result.ranking[1].base_priority);
}

#[tokio::test]
async fn business_tag_steers_to_matching_processor() {
    let mut saas = processor("saas", 0.7);
    saas.best_for = vec!["subscription".to_string(), "saas".to_string()];
    let retail = processor("retail", 0.7);
    let engine = engine(vec![retail, saas], Arc::new(MockSource::new()), Arc::new(MockExecutor::new()));
    engine.health().report("retail", HealthSample::new(10.0, 90.0));
    engine.health().report("saas", HealthSample::new(10.0, 60.0));

    let untagged = engine.route(&usd()).await;
    assert_eq!(untagged.selected_processor.as_deref(), Some("retail"));

    let tagged = engine.route(&usd().with_tag("subscription")).await;
    assert_eq!(tagged.selected_processor.as_deref(), Some("saas"));
}

#[tokio::test]
async fn published_steps_match_the_returned_trace() {
    let executor = Arc::new(MockExecutor::new().with_behavior("c", MockBehavior::Unavailable));
    let engine = abc_engine(executor);
    let tx = usd();
    let mut rx = engine.publisher().subscribe(TraceTopic::Transaction(tx.id));

    let result = engine.route(&tx).await;

    let mut published = Vec::new();
    loop {
        match rx.recv().await {
            Ok(event) => {
                assert_eq!(event.transaction_id, tx.id);
                published.push(event.step);
            }
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(n)) => panic!("lagged by {}", n),
        }
    }
    assert_eq!(published, result.trace);
    assert_eq!(engine.publisher().open_topics(), 0);
}

#[tokio::test]
async fn trace_is_ordered_and_choices_follow_evaluation() {
    let executor = Arc::new(MockExecutor::new().with_behavior("c", MockBehavior::Unavailable));
    let result = abc_engine(executor).route(&usd()).await;

    for (i, step) in result.trace.iter().enumerate() {
        assert_eq!(step.step_index as usize, i);
        assert!((0.0..=1.0).contains(&step.confidence));
    }
    assert!(result.trace.windows(2).all(|w| w[0].elapsed_ms <= w[1].elapsed_ms));

    let first_choice = result.trace.iter().position(|s| s.is_choice()).unwrap();
    let last_evaluation = result
        .trace
        .iter()
        .rposition(|s| s.action == RoutingAction::Evaluating)
        .unwrap();
    assert!(last_evaluation < first_choice);
    assert_eq!(
        result.trace.iter().filter(|s| s.action == RoutingAction::Selected).count(),
        1
    );
    for (i, step) in result.trace.iter().enumerate() {
        if step.action == RoutingAction::Fallback {
            assert_eq!(result.trace[i - 1].action, RoutingAction::Rejected);
        }
    }
}

#[tokio::test]
async fn cancelling_during_settlement_stops_routing() {
    let executor = Arc::new(MockExecutor::new().with_delay(Duration::from_secs(5)));
    let engine = Arc::new(abc_engine(executor));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let started = Instant::now();
    let routing = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.route_with_cancel(&usd(), cancel_rx).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_tx.send(true).unwrap();

    let result = routing.await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(result.outcome, RoutingOutcome::Cancelled);
    assert_eq!(result.selected_processor, None);
    assert_eq!(result.final_step().unwrap().action, RoutingAction::Selected);
}

#[tokio::test]
async fn cancelled_before_scoring_keeps_only_exclusions() {
    let executor = Arc::new(MockExecutor::new());
    let engine = abc_engine(executor.clone());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let result = engine.route_with_cancel(&usd(), cancel_rx).await;

    assert_eq!(result.outcome, RoutingOutcome::Cancelled);
    assert_eq!(actions(&result.trace), vec![(Some("a"), RoutingAction::Rejected)]);
    assert!(executor.attempts().is_empty());
}

#[tokio::test]
async fn failing_source_degrades_to_synthetic_signals() {
    let source = Arc::new(MockSource::failing(AdapterError::Unreachable("dns".to_string())));
    let engine = engine(
        vec![processor("a", 0.7), processor("b", 0.7)],
        source,
        Arc::new(MockExecutor::new()),
    );
    engine.health().report("a", HealthSample::new(10.0, 80.0));
    engine.health().report("b", HealthSample::new(10.0, 80.0));

    let result = engine.route(&usd()).await;

    assert!(result.selected_processor.is_some());
    assert_eq!(result.ranking.len(), 2);
    assert!(result.ranking.iter().all(|r| r.composite.synthetic_signals == 6));
    assert!(result.ranking.iter().all(|r| r.composite.data_confidence < 0.5));

    let stats = engine.scoring().cache().stats();
    assert_eq!(stats.adapter_failures, 12);
    assert_eq!(stats.live_stored, 0);
}

#[tokio::test]
async fn slow_source_is_cut_off_by_fetch_timeout() {
    let mut config = router_config();
    config.cache.fetch_timeout_ms = 20;
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(500)));
    let engine = engine_with(
        &config,
        vec![processor("a", 0.7)],
        source,
        Arc::new(MockExecutor::new()),
    );
    engine.health().report("a", HealthSample::new(10.0, 80.0));

    let started = Instant::now();
    let result = engine.route(&usd()).await;

    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(result.selected_processor.as_deref(), Some("a"));
    assert_eq!(result.ranking[0].composite.synthetic_signals, 6);
}

#[tokio::test]
async fn builtin_catalog_respects_currency_and_amount_limits() {
    let engine = RoutingEngine::from_config(&router_config(), builtin_catalog(), None)
        .unwrap()
        .with_executor(Arc::new(MockExecutor::new()));
    for p in builtin_catalog() {
        engine.health().report(&p.id, HealthSample::new(10.0, 80.0));
    }

    let tx = Transaction::new(150_000_000, "JPY").with_urgency(Urgency::Critical);
    let result = engine.route(&tx).await;

    assert_eq!(result.selected_processor.as_deref(), Some("visa"));
    let reason_for = |id: &str| {
        result
            .trace
            .iter()
            .find(|s| s.processor_id.as_deref() == Some(id) && s.action == RoutingAction::Rejected)
            .map(|s| s.reason.clone())
    };
    assert_eq!(reason_for("stripe").as_deref(), Some(reasons::UNSUPPORTED_CURRENCY));
    assert_eq!(reason_for("adyen").as_deref(), Some(reasons::AMOUNT_LIMIT));
}

#[tokio::test]
async fn unsupported_region_is_rejected() {
    let engine = RoutingEngine::from_config(&router_config(), builtin_catalog(), None).unwrap();
    for p in builtin_catalog() {
        engine.health().report(&p.id, HealthSample::new(10.0, 80.0));
    }

    let result = engine.route(&Transaction::new(10_000, "AUD").with_region("AU")).await;
    assert!(matches!(result.selected_processor.as_deref(), Some("stripe") | Some("square")));

    let eu = engine.route(&Transaction::new(10_000, "CAD").with_region("EU")).await;
    assert!(eu.is_exhausted());
    let square = eu
        .trace
        .iter()
        .find(|s| s.processor_id.as_deref() == Some("square"))
        .unwrap();
    assert_eq!(square.reason, reasons::UNSUPPORTED_REGION);
}

#[tokio::test]
async fn concurrent_routes_share_one_fetch_per_signal() {
    let source = Arc::new(MockSource::new());
    let engine = Arc::new(engine(
        vec![processor("a", 0.7), processor("b", 0.7)],
        source.clone(),
        Arc::new(MockExecutor::new()),
    ));
    engine.health().report("a", HealthSample::new(10.0, 80.0));
    engine.health().report("b", HealthSample::new(10.0, 85.0));

    let mut set = JoinSet::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        set.spawn(async move { engine.route(&usd()).await });
    }
    while let Some(result) = set.join_next().await {
        assert_eq!(result.unwrap().selected_processor.as_deref(), Some("b"));
    }
    assert_eq!(source.calls(), 12);
}
