use super::state::LedgerState;
use crate::domain::notification::CallbackRecord;
use crate::domain::order::{Order, OrderPatch};
use crate::domain::ports::LedgerStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe, non-durable ledger store.
///
/// Holds the full `LedgerState` behind `Arc<RwLock<…>>`. Used for tests and
/// for ephemeral runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn claim_notification(&self, key: &str, first_seen: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.claim(key, first_seen))
    }

    async fn append_callback(&self, record: CallbackRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.append_callback(record);
        Ok(())
    }

    async fn upsert_order(&self, business_ref: &str, patch: OrderPatch) -> Result<Order> {
        let mut state = self.state.write().await;
        Ok(state.upsert_order(business_ref, &patch, Utc::now()))
    }

    async fn mark_paid(&self, business_ref: &str, provider_ref: Option<&str>) -> Result<Order> {
        let mut state = self.state.write().await;
        Ok(state.mark_paid(business_ref, provider_ref, Utc::now()))
    }

    async fn get_order(&self, business_ref: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.order(business_ref).cloned())
    }

    async fn list_callbacks(&self, limit: usize) -> Result<Vec<CallbackRecord>> {
        let state = self.state.read().await;
        Ok(state.recent_callbacks(limit).to_vec())
    }
}
