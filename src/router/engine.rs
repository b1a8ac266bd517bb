use crate::config::RouterConfig;
use crate::domain::processor::{HealthState, Processor};
use crate::domain::routing_decision::{RoutingOutcome, RoutingResult};
use crate::domain::routing_step::{reasons, RoutingAction, RoutingStep};
use crate::domain::transaction::Transaction;
use crate::error::ConfigError;
use crate::execution::{AcceptAll, AttemptOutcome, SettlementExecutor};
use crate::health::monitor::HealthMonitor;
use crate::health::state::HealthSnapshot;
use crate::insights::cache::InsightCache;
use crate::insights::InsightSource;
use crate::router::ranking::{compare, normalized_confidence, rank, Candidate, RankedProcessor, RoutingConfig};
use crate::scoring::engine::ScoringEngine;
use crate::scoring::types::CompositeScore;
use crate::trace::publisher::TracePublisher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Append-only trace for one transaction. Every step is published as it is
/// recorded, so observers see the same order as the final result.
struct TraceLog<'a> {
    transaction_id: Uuid,
    publisher: &'a TracePublisher,
    started: Instant,
    steps: Vec<RoutingStep>,
}

impl<'a> TraceLog<'a> {
    fn new(transaction_id: Uuid, publisher: &'a TracePublisher) -> Self {
        Self {
            transaction_id,
            publisher,
            started: Instant::now(),
            steps: Vec::new(),
        }
    }

    fn record(&mut self, processor_id: Option<&str>, action: RoutingAction, reason: impl Into<String>, confidence: f64) {
        let step = RoutingStep {
            step_index: self.steps.len() as u32,
            processor_id: processor_id.map(str::to_string),
            action,
            reason: reason.into(),
            confidence,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        };
        self.publisher.publish(self.transaction_id, step.clone());
        self.steps.push(step);
    }

    fn finish(self) -> Vec<RoutingStep> {
        self.publisher.complete(self.transaction_id);
        self.steps
    }
}

enum Attempt {
    Confirmed(Option<String>),
    Failed(String),
    Cancelled,
}

pub struct RoutingEngine {
    catalog: Vec<Processor>,
    scoring: Arc<ScoringEngine>,
    health: Arc<HealthMonitor>,
    publisher: Arc<TracePublisher>,
    executor: Arc<dyn SettlementExecutor>,
    config: RoutingConfig,
}

impl RoutingEngine {
    pub fn new(
        catalog: Vec<Processor>,
        scoring: Arc<ScoringEngine>,
        health: Arc<HealthMonitor>,
        publisher: Arc<TracePublisher>,
        config: RoutingConfig,
    ) -> Self {
        let mut catalog = catalog;
        catalog.sort_by(|a, b| a.id.cmp(&b.id));
        for processor in &catalog {
            health.register(&processor.id);
        }
        Self {
            catalog,
            scoring,
            health,
            publisher,
            executor: Arc::new(AcceptAll),
            config,
        }
    }

    /// Validates `config` against the catalogue and wires every component.
    pub fn from_config(
        config: &RouterConfig,
        catalog: Vec<Processor>,
        source: Option<Arc<dyn InsightSource>>,
    ) -> Result<Self, ConfigError> {
        config.validate(&catalog)?;
        let cache = Arc::new(InsightCache::new(source, config.cache.clone(), config.rate_limit.clone()));
        let scoring = Arc::new(ScoringEngine::new(cache, config.scoring.clone()));
        let health = Arc::new(HealthMonitor::new(config.health.clone()));
        let publisher = Arc::new(TracePublisher::new(config.trace_buffer));
        Ok(Self::new(catalog, scoring, health, publisher, config.routing.clone()))
    }

    pub fn with_executor(mut self, executor: Arc<dyn SettlementExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn catalog(&self) -> &[Processor] {
        &self.catalog
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn publisher(&self) -> &Arc<TracePublisher> {
        &self.publisher
    }

    pub fn scoring(&self) -> &Arc<ScoringEngine> {
        &self.scoring
    }

    pub async fn route(&self, tx: &Transaction) -> RoutingResult {
        self.run(tx, None).await
    }

    /// Like `route`, but stops as soon as `cancel` flips to `true`. Steps already
    /// recorded stay in the trace.
    pub async fn route_with_cancel(&self, tx: &Transaction, cancel: watch::Receiver<bool>) -> RoutingResult {
        self.run(tx, Some(cancel)).await
    }

    async fn run(&self, tx: &Transaction, mut cancel: Option<watch::Receiver<bool>>) -> RoutingResult {
        let mut log = TraceLog::new(tx.id, &self.publisher);
        let region = tx
            .region
            .clone()
            .unwrap_or_else(|| self.scoring.config().default_region.clone());

        let mut eligible: Vec<(&Processor, HealthSnapshot)> = Vec::new();
        let mut best_excluded_base: Option<f64> = None;
        for processor in &self.catalog {
            match self.exclusion(processor, tx) {
                Ok(snapshot) => eligible.push((processor, snapshot)),
                Err((reason, health_related)) => {
                    if health_related {
                        let base = self.configured_base(processor);
                        best_excluded_base = Some(best_excluded_base.map_or(base, |b: f64| b.max(base)));
                    }
                    log.record(Some(&processor.id), RoutingAction::Rejected, reason, 1.0);
                }
            }
        }

        let ids: Vec<String> = eligible.iter().map(|(p, _)| p.id.clone()).collect();
        let scores = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                return self.finish(tx, log, None, RoutingOutcome::Cancelled, Vec::new(), Vec::new(), false);
            }
            scores = self.score_all(ids, &region) => scores,
        };

        let candidates: Vec<Candidate> = eligible
            .into_iter()
            .filter_map(|(processor, snapshot)| {
                let composite = scores.get(&processor.id).cloned()?;
                Some(Candidate {
                    processor: processor.clone(),
                    composite,
                    freeze_resistance: snapshot.freeze_resistance,
                })
            })
            .collect();
        let ranking = rank(candidates, tx, &self.config);
        for ranked in &ranking {
            log.record(
                Some(&ranked.processor_id),
                RoutingAction::Evaluating,
                ranked.summary(),
                ranked.composite.data_confidence,
            );
        }

        let mut freeze_avoidance = match (best_excluded_base, ranking.first()) {
            (Some(excluded), Some(top)) => excluded > self.configured_base_by_id(&top.processor_id),
            _ => false,
        };

        let mut remaining = ranking.clone();
        let mut first_choice = true;
        while !remaining.is_empty() {
            if is_cancelled(&cancel) {
                return self.finish(tx, log, None, RoutingOutcome::Cancelled, ranking, Vec::new(), freeze_avoidance);
            }

            let choice = remaining.remove(0);
            let action = if first_choice {
                RoutingAction::Selected
            } else {
                RoutingAction::Fallback
            };
            log.record(
                Some(&choice.processor_id),
                action,
                choice_reason(&choice, first_choice),
                normalized_confidence(choice.priority, &self.config),
            );

            match self.attempt(&choice.processor_id, tx, &mut cancel).await {
                Attempt::Confirmed(reference) => {
                    let outcome = if first_choice {
                        RoutingOutcome::Selected
                    } else {
                        RoutingOutcome::RecoveredByFallback
                    };
                    tracing::info!(
                        transaction = %tx.id,
                        processor = %choice.processor_id,
                        reference = reference.as_deref().unwrap_or("-"),
                        fallback = !first_choice,
                        "transaction routed"
                    );
                    let chain = remaining.iter().map(|r| r.processor_id.clone()).collect();
                    return self.finish(
                        tx,
                        log,
                        Some(choice.processor_id),
                        outcome,
                        ranking,
                        chain,
                        freeze_avoidance,
                    );
                }
                Attempt::Cancelled => {
                    return self.finish(tx, log, None, RoutingOutcome::Cancelled, ranking, Vec::new(), freeze_avoidance);
                }
                Attempt::Failed(reason) => {
                    tracing::warn!(
                        transaction = %tx.id,
                        processor = %choice.processor_id,
                        reason = %reason,
                        "processor rejected transaction, falling back"
                    );
                    log.record(Some(&choice.processor_id), RoutingAction::Rejected, reason, 1.0);
                    first_choice = false;
                    freeze_avoidance = true;
                    self.rerank(&mut remaining);
                }
            }
        }

        tracing::error!(transaction = %tx.id, currency = %tx.currency, "no eligible processor");
        log.record(None, RoutingAction::Rejected, reasons::NO_ELIGIBLE, 0.0);
        self.finish(tx, log, None, RoutingOutcome::Exhausted, ranking, Vec::new(), freeze_avoidance)
    }

    /// Health snapshot when the processor may take this transaction, otherwise
    /// the rejection reason and whether it was health-related.
    fn exclusion(&self, processor: &Processor, tx: &Transaction) -> Result<HealthSnapshot, (&'static str, bool)> {
        if !processor.supports_currency(&tx.currency) {
            return Err((reasons::UNSUPPORTED_CURRENCY, false));
        }
        if let Some(region) = &tx.region {
            if !processor.supports_region(region) {
                return Err((reasons::UNSUPPORTED_REGION, false));
            }
        }
        if !processor.accepts_amount(tx.amount_minor) {
            return Err((reasons::AMOUNT_LIMIT, false));
        }
        let snapshot = self.health.current(&processor.id).ok_or((reasons::UNAVAILABLE, true))?;
        match snapshot.state {
            HealthState::Frozen => Err((reasons::FROZEN, true)),
            HealthState::Unavailable => Err((reasons::UNAVAILABLE, true)),
            HealthState::Healthy | HealthState::Warning => Ok(snapshot),
        }
    }

    async fn score_all(&self, ids: Vec<String>, region: &str) -> HashMap<String, CompositeScore> {
        let mut set = JoinSet::new();
        for id in ids {
            let scoring = Arc::clone(&self.scoring);
            let region = region.to_string();
            set.spawn(async move {
                let score = scoring.score_in_region(&id, &region).await;
                (id, score)
            });
        }

        let mut scores = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, score)) => {
                    scores.insert(id, score);
                }
                Err(e) => tracing::error!("scoring task failed: {}", e),
            }
        }
        scores
    }

    async fn attempt(&self, processor_id: &str, tx: &Transaction, cancel: &mut Option<watch::Receiver<bool>>) -> Attempt {
        match self.health.state(processor_id) {
            HealthState::Frozen => return Attempt::Failed(reasons::FROZEN.to_string()),
            HealthState::Unavailable => return Attempt::Failed(reasons::UNAVAILABLE.to_string()),
            HealthState::Healthy | HealthState::Warning => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Attempt::Cancelled,
            outcome = self.executor.attempt(processor_id, tx) => outcome,
        };

        match outcome {
            Ok(AttemptOutcome::Confirmed { reference }) => Attempt::Confirmed(reference),
            Ok(AttemptOutcome::Rejected { reason }) => Attempt::Failed(reason),
            Ok(AttemptOutcome::ProcessorUnavailable) => Attempt::Failed(reasons::UNAVAILABLE.to_string()),
            Err(e) => {
                tracing::warn!(
                    processor = processor_id,
                    executor = self.executor.name(),
                    "settlement attempt errored: {}",
                    e
                );
                Attempt::Failed(reasons::UNAVAILABLE.to_string())
            }
        }
    }

    /// Refresh freeze resistance from current health, drop processors that
    /// stopped being routable, and restore the ranking order.
    fn rerank(&self, remaining: &mut Vec<RankedProcessor>) {
        remaining.retain_mut(|ranked| match self.health.current(&ranked.processor_id) {
            Some(snapshot) if snapshot.state.is_routable() => {
                ranked.freeze_resistance = snapshot.freeze_resistance;
                true
            }
            other => {
                tracing::info!(
                    processor = %ranked.processor_id,
                    state = other.map_or(HealthState::Unavailable, |s| s.state).as_str(),
                    "dropping processor from fallback candidates"
                );
                false
            }
        });
        remaining.sort_by(compare);
    }

    fn configured_base(&self, processor: &Processor) -> f64 {
        self.config
            .base_priority
            .get(&processor.id)
            .copied()
            .unwrap_or(processor.base_priority)
    }

    fn configured_base_by_id(&self, processor_id: &str) -> f64 {
        self.catalog
            .iter()
            .find(|p| p.id == processor_id)
            .map_or(0.0, |p| self.configured_base(p))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        tx: &Transaction,
        log: TraceLog<'_>,
        selected_processor: Option<String>,
        outcome: RoutingOutcome,
        ranking: Vec<RankedProcessor>,
        fallback_chain: Vec<String>,
        freeze_avoidance: bool,
    ) -> RoutingResult {
        if outcome == RoutingOutcome::Cancelled {
            tracing::info!(transaction = %tx.id, "routing cancelled by caller");
        }
        RoutingResult {
            transaction_id: tx.id,
            selected_processor,
            outcome,
            trace: log.finish(),
            ranking,
            fallback_chain,
            freeze_avoidance,
            created_at: chrono::Utc::now(),
        }
    }
}

fn choice_reason(choice: &RankedProcessor, first_choice: bool) -> String {
    if first_choice {
        format!("highest priority {:.3}", choice.priority)
    } else {
        format!("next best remaining, priority {:.3}", choice.priority)
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once the caller asks to cancel. Never resolves without a receiver
/// or after the sender is gone.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_without_receiver_never_fires() {
        let mut none = None;
        let fired = tokio::time::timeout(std::time::Duration::from_millis(20), cancelled(&mut none)).await;
        assert!(fired.is_err());

        let (tx, rx) = watch::channel(false);
        let mut some = Some(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_millis(20), cancelled(&mut some))
            .await
            .unwrap();
    }
}
