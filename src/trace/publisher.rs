use crate::domain::routing_step::RoutingStep;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const DEFAULT_BUFFER: usize = 256;

/// How many completed transaction ids are remembered for late subscribers.
const FINISHED_MEMORY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTopic {
    /// Every step of every transaction.
    All,
    Transaction(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    pub transaction_id: Uuid,
    pub step: RoutingStep,
}

/// Fan-out of routing steps to observers.
///
/// Each subscriber gets a bounded buffer of `capacity` events. Publishing never
/// waits: a subscriber that falls behind loses its oldest undelivered events and
/// its next `recv` returns `RecvError::Lagged(n)` with the number dropped, after
/// which delivery resumes in order. Per-transaction channels close once the
/// router calls `complete`, so `recv` ends with `RecvError::Closed`. Subscribing
/// to a recently completed transaction returns an already closed receiver.
pub struct TracePublisher {
    capacity: usize,
    global: broadcast::Sender<TraceEvent>,
    topics: Mutex<Topics>,
}

#[derive(Default)]
struct Topics {
    open: HashMap<Uuid, broadcast::Sender<TraceEvent>>,
    finished: HashSet<Uuid>,
    finished_order: VecDeque<Uuid>,
}

impl Topics {
    fn finish(&mut self, transaction_id: Uuid) {
        self.open.remove(&transaction_id);
        if !self.finished.insert(transaction_id) {
            return;
        }
        self.finished_order.push_back(transaction_id);
        while self.finished_order.len() > FINISHED_MEMORY {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }
}

impl TracePublisher {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (global, _) = broadcast::channel(capacity);
        Self {
            capacity,
            global,
            topics: Mutex::new(Topics::default()),
        }
    }

    pub fn subscribe(&self, topic: TraceTopic) -> broadcast::Receiver<TraceEvent> {
        match topic {
            TraceTopic::All => self.global.subscribe(),
            TraceTopic::Transaction(id) => {
                let mut topics = self.topics();
                if topics.finished.contains(&id) {
                    // Sender dropped on return, so the receiver reads Closed.
                    return broadcast::channel(1).1;
                }
                topics
                    .open
                    .entry(id)
                    .or_insert_with(|| broadcast::channel(self.capacity).0)
                    .subscribe()
            }
        }
    }

    pub fn publish(&self, transaction_id: Uuid, step: RoutingStep) {
        let event = TraceEvent { transaction_id, step };
        if let Some(topic) = self.topics().open.get(&transaction_id) {
            let _ = topic.send(event.clone());
        }
        // Err only means nobody is listening.
        let _ = self.global.send(event);
    }

    /// Drops the transaction's channel; its subscribers drain then see `Closed`.
    pub fn complete(&self, transaction_id: Uuid) {
        self.topics().finish(transaction_id);
    }

    pub fn open_topics(&self) -> usize {
        self.topics().open.len()
    }

    fn topics(&self) -> MutexGuard<'_, Topics> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TracePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}
