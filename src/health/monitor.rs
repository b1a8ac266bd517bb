use crate::domain::processor::HealthState;
use crate::health::state::{
    HealthSample, HealthSnapshot, HealthThresholds, HealthTransition, DEFAULT_FREEZE_RESISTANCE,
};
use crate::health::transitions::{assess_operational, effective_state, OperationalMetrics, OperationalPolicy};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

const TRANSITION_BUFFER: usize = 256;

#[derive(Debug, Default)]
struct Entry {
    latest: Option<HealthSample>,
    freeze_reason: Option<String>,
    published: Option<HealthState>,
}

impl Entry {
    fn state_at(&self, thresholds: &HealthThresholds, now: DateTime<Utc>) -> HealthState {
        effective_state(self.latest.as_ref(), self.freeze_reason.is_some(), thresholds, now)
    }

    fn snapshot(&self, processor_id: &str, thresholds: &HealthThresholds, now: DateTime<Utc>) -> HealthSnapshot {
        let mut issues = self.latest.as_ref().map(|s| s.issues.clone()).unwrap_or_default();
        if let Some(reason) = &self.freeze_reason {
            issues.insert(0, format!("frozen: {}", reason));
        }
        HealthSnapshot {
            processor_id: processor_id.to_string(),
            state: self.state_at(thresholds, now),
            risk_score: self.latest.as_ref().map_or(0.0, |s| s.risk_score),
            freeze_resistance: self
                .latest
                .as_ref()
                .map_or(DEFAULT_FREEZE_RESISTANCE, |s| s.freeze_resistance),
            issues,
            observed_at: self.latest.as_ref().map(|s| s.observed_at),
        }
    }
}

/// Per-processor health registry.
///
/// Readers take a short read lock; nothing is held across an await. Only state
/// changes are broadcast, never individual samples.
pub struct HealthMonitor {
    thresholds: HealthThresholds,
    policy: OperationalPolicy,
    entries: RwLock<HashMap<String, Entry>>,
    transitions: broadcast::Sender<HealthTransition>,
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self::with_policy(thresholds, OperationalPolicy::default())
    }

    pub fn with_policy(thresholds: HealthThresholds, policy: OperationalPolicy) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            thresholds,
            policy,
            entries: RwLock::new(HashMap::new()),
            transitions,
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthTransition> {
        self.transitions.subscribe()
    }

    /// Track a processor before its first sample; it reads as unavailable until one arrives.
    pub fn register(&self, processor_id: &str) {
        self.write().entry(processor_id.to_string()).or_default();
    }

    pub fn report(&self, processor_id: &str, sample: HealthSample) -> HealthState {
        if !sample.is_finite() {
            tracing::warn!(
                processor = processor_id,
                risk_score = sample.risk_score,
                freeze_resistance = sample.freeze_resistance,
                "unreadable health sample, treating processor as unavailable"
            );
        }
        self.update(processor_id, |entry| entry.latest = Some(sample))
    }

    /// Turn chargeback, refund and volume activity into a health sample.
    /// Freeze resistance carries over from the previous sample.
    pub fn report_operational(&self, processor_id: &str, metrics: OperationalMetrics) -> HealthState {
        let (risk, issues) = assess_operational(&metrics, &self.policy);
        self.update(processor_id, |entry| {
            let freeze_resistance = entry
                .latest
                .as_ref()
                .map_or(DEFAULT_FREEZE_RESISTANCE, |s| s.freeze_resistance);
            let mut sample = HealthSample::new(risk, freeze_resistance);
            sample.issues = issues;
            entry.latest = Some(sample);
        })
    }

    pub fn freeze(&self, processor_id: &str, reason: &str) -> HealthState {
        self.update(processor_id, |entry| entry.freeze_reason = Some(reason.to_string()))
    }

    pub fn release(&self, processor_id: &str) -> HealthState {
        self.update(processor_id, |entry| entry.freeze_reason = None)
    }

    pub fn current(&self, processor_id: &str) -> Option<HealthSnapshot> {
        let now = Utc::now();
        self.read()
            .get(processor_id)
            .map(|e| e.snapshot(processor_id, &self.thresholds, now))
    }

    /// Unknown processors are unavailable.
    pub fn state(&self, processor_id: &str) -> HealthState {
        self.current(processor_id)
            .map_or(HealthState::Unavailable, |s| s.state)
    }

    pub fn snapshot_all(&self) -> Vec<HealthSnapshot> {
        let now = Utc::now();
        let mut all: Vec<HealthSnapshot> = self
            .read()
            .iter()
            .map(|(id, e)| e.snapshot(id, &self.thresholds, now))
            .collect();
        all.sort_by(|a, b| a.processor_id.cmp(&b.processor_id));
        all
    }

    /// Publish transitions for processors whose readings went stale since the last event.
    pub fn sweep_stale(&self) -> Vec<HealthTransition> {
        self.sweep_stale_at(Utc::now())
    }

    pub fn sweep_stale_at(&self, now: DateTime<Utc>) -> Vec<HealthTransition> {
        let mut entries = self.write();
        let mut ids: Vec<&String> = entries.keys().collect();
        ids.sort();
        let ids: Vec<String> = ids.into_iter().cloned().collect();

        ids.iter()
            .filter_map(|id| {
                let entry = entries.get_mut(id)?;
                self.publish_if_changed(id, entry, now)
            })
            .collect()
    }

    fn update(&self, processor_id: &str, apply: impl FnOnce(&mut Entry)) -> HealthState {
        let now = Utc::now();
        let mut entries = self.write();
        let entry = entries.entry(processor_id.to_string()).or_default();
        apply(entry);
        self.publish_if_changed(processor_id, entry, now);
        entry.state_at(&self.thresholds, now)
    }

    fn publish_if_changed(&self, processor_id: &str, entry: &mut Entry, now: DateTime<Utc>) -> Option<HealthTransition> {
        let to = entry.state_at(&self.thresholds, now);
        let from = entry.published.unwrap_or(HealthState::Unavailable);
        entry.published = Some(to);
        if from == to {
            return None;
        }

        let transition = HealthTransition {
            processor_id: processor_id.to_string(),
            from,
            to,
            at: now,
        };
        match to {
            HealthState::Frozen | HealthState::Unavailable => tracing::warn!(
                processor = processor_id,
                from = from.as_str(),
                to = to.as_str(),
                "processor health transition"
            ),
            _ => tracing::info!(
                processor = processor_id,
                from = from.as_str(),
                to = to.as_str(),
                "processor health transition"
            ),
        }
        // No subscribers is fine.
        let _ = self.transitions.send(transition.clone());
        Some(transition)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
