use crate::domain::notification::CallbackRecord;
use crate::domain::order::{Order, OrderPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The full ledger state: the document serialized as the durable snapshot,
/// and the in-memory mirror every whole-state backend works on.
///
/// Mutation rules live here so the in-memory and snapshot backends cannot
/// drift apart.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerState {
    /// Orders keyed by business reference.
    pub orders: HashMap<String, Order>,
    /// Audit log in arrival order.
    pub callbacks: Vec<CallbackRecord>,
    /// Idempotency keys mapped to first-seen time. Write-once.
    pub idempotency: HashMap<String, DateTime<Utc>>,
}

impl LedgerState {
    /// Check-and-set on the idempotency map. Returns `true` when the key
    /// was newly claimed.
    pub fn claim(&mut self, key: &str, first_seen: DateTime<Utc>) -> bool {
        if self.idempotency.contains_key(key) {
            return false;
        }
        self.idempotency.insert(key.to_string(), first_seen);
        true
    }

    pub fn append_callback(&mut self, record: CallbackRecord) {
        self.callbacks.push(record);
    }

    pub fn upsert_order(&mut self, business_ref: &str, patch: &OrderPatch, now: DateTime<Utc>) -> Order {
        let order = self
            .orders
            .entry(business_ref.to_string())
            .or_insert_with(|| Order::new(business_ref, now));
        order.apply(patch, now);
        order.clone()
    }

    pub fn mark_paid(
        &mut self,
        business_ref: &str,
        provider_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Order {
        let order = self
            .orders
            .entry(business_ref.to_string())
            .or_insert_with(|| Order::new(business_ref, now));
        order.mark_paid(provider_ref, now);
        let order = order.clone();

        // Best-effort audit bookkeeping: flip the most recent unprocessed
        // callback for this reference.
        if let Some(record) = self
            .callbacks
            .iter_mut()
            .rev()
            .find(|c| c.business_ref == business_ref && !c.processed)
        {
            record.processed = true;
        }

        order
    }

    pub fn order(&self, business_ref: &str) -> Option<&Order> {
        self.orders.get(business_ref)
    }

    /// Tail of the audit log, arrival order preserved.
    pub fn recent_callbacks(&self, limit: usize) -> &[CallbackRecord] {
        let start = self.callbacks.len().saturating_sub(limit);
        &self.callbacks[start..]
    }
}
