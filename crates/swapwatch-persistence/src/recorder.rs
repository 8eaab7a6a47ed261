//! Exactly-once completion recording.
//!
//! The scheduler loop, a forced check and a simulation can all observe the
//! same terminal order at nearly the same time. Each order id gets its own
//! gate; only the holder of the gate may check-and-write, so at most one
//! record is ever produced per order.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use swapwatch_core::{Order, OrderId};
use swapwatch_telemetry::Metrics;
use tracing::{debug, info};

use crate::error::PersistenceResult;
use crate::record::CompletionRecord;
use crate::store::DynCompletionStore;

/// Writes one completion record per terminal order.
pub struct CompletionRecorder {
    store: DynCompletionStore,
    /// Order ids already persisted (lock-free reads).
    recorded: DashSet<String>,
    /// Per-order single-writer gates.
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl CompletionRecorder {
    /// Create a recorder, seeding the recorded set from the store so
    /// idempotency holds across restarts.
    pub fn new(store: DynCompletionStore) -> PersistenceResult<Self> {
        let recorded = DashSet::new();
        for record in store.load_all()? {
            recorded.insert(record.order_id);
        }
        if !recorded.is_empty() {
            info!(count = recorded.len(), "Loaded existing completion records");
        }

        Ok(Self {
            store,
            recorded,
            gates: DashMap::new(),
        })
    }

    /// Record `order` if it is terminal and not yet recorded.
    ///
    /// Returns `Ok(true)` iff this call wrote the record. Safe to call on
    /// every observation and from concurrent callers.
    pub fn record_if_terminal(&self, order: &Order) -> PersistenceResult<bool> {
        if !order.is_terminal() {
            return Ok(false);
        }
        let key = order.order_id.as_str();
        if self.recorded.contains(key) {
            return Ok(false);
        }

        let gate = self
            .gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock();

        // Another caller may have written while we waited.
        if self.recorded.contains(key) {
            debug!(order_id = %order.order_id, "Completion already recorded");
            return Ok(false);
        }

        let record = CompletionRecord::from_order(order);
        self.store.append(&record)?;
        self.recorded.insert(key.to_string());
        self.gates.remove(key);

        Metrics::completion_recorded(&order.status.to_string(), order.simulated);
        info!(
            order_id = %order.order_id,
            status = %order.status,
            record_id = %record.record_id,
            simulated = order.simulated,
            "Completion recorded"
        );
        Ok(true)
    }

    /// Lock-free check whether `order_id` already has a record.
    pub fn is_recorded(&self, order_id: &OrderId) -> bool {
        self.recorded.contains(order_id.as_str())
    }

    /// All stored records.
    pub fn records(&self) -> PersistenceResult<Vec<CompletionRecord>> {
        self.store.load_all()
    }
}
