use super::notification::CallbackRecord;
use super::order::{Order, OrderPatch};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage port for the ledger's three collections: orders, the callback
/// audit log, and idempotency keys.
///
/// Every mutating method is durable before it returns `Ok` — callers must
/// not observe a mutation as done until it has been persisted.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomic check-and-set on the idempotency collection. Returns `true`
    /// if the key was newly claimed, `false` if it was already present.
    /// Keys are write-once: never updated, never removed.
    async fn claim_notification(&self, key: &str, first_seen: DateTime<Utc>) -> Result<bool>;

    /// Appends an audit record. Append order is arrival order.
    async fn append_callback(&self, record: CallbackRecord) -> Result<()>;

    /// Creates the order as `Pending` when absent, otherwise merges the
    /// patch field by field. Returns the stored order.
    async fn upsert_order(&self, business_ref: &str, patch: OrderPatch) -> Result<Order>;

    /// Transitions the order to `Paid`, creating it if it does not exist
    /// yet (a paid-before-created arrival must not lose the order). Also
    /// flips `processed` on the most recent unprocessed callback for the
    /// reference; that bookkeeping is best-effort.
    async fn mark_paid(&self, business_ref: &str, provider_ref: Option<&str>) -> Result<Order>;

    async fn get_order(&self, business_ref: &str) -> Result<Option<Order>>;

    /// The most recent `limit` callback records, in arrival order.
    async fn list_callbacks(&self, limit: usize) -> Result<Vec<CallbackRecord>>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
