use crate::domain::notification::{CallbackRecord, Notification};
use crate::domain::order::Order;
use crate::domain::ports::LedgerStoreBox;
use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Outcome of recording a notification.
///
/// A duplicate delivery is a successful no-op, not an error: a retrying
/// sender always receives a definitive answer.
#[derive(Debug, Serialize)]
pub struct NotificationOutcome {
    pub accepted: bool,
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// The idempotency and state-transition logic layered on a `LedgerStore`.
///
/// Every distinct notification identifier triggers its state effect at most
/// once, no matter how many times the sender retries delivery. Mutating
/// calls are serialized behind `write_gate` so no two read-modify-write
/// sequences interleave; queries read the store directly.
pub struct LedgerService {
    store: LedgerStoreBox,
    write_gate: Mutex<()>,
}

impl LedgerService {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
        }
    }

    /// Records one notification.
    ///
    /// Resolves the opaque payload, claims its idempotency key, appends the
    /// audit record, upserts the order, and marks it paid on a recognized
    /// success event. A payload without a business order reference is
    /// rejected before any state changes. On a persistence failure the
    /// caller is expected to retry the identical notification; the
    /// idempotency key only commits together with a successful persist, so
    /// the retry is safe.
    pub async fn record_notification(&self, payload: Value) -> Result<NotificationOutcome> {
        let received_at = Utc::now();
        let note = Notification::resolve(payload, received_at)?;

        let _gate = self.write_gate.lock().await;

        if !self
            .store
            .claim_notification(&note.notify_id, received_at)
            .await?
        {
            debug!(notify_id = %note.notify_id, "duplicate notification, no effect applied");
            let order = self.store.get_order(&note.business_ref).await?;
            return Ok(NotificationOutcome {
                accepted: true,
                duplicate: true,
                order,
            });
        }

        self.store
            .append_callback(note.callback_record(received_at))
            .await?;

        let mut order = self
            .store
            .upsert_order(&note.business_ref, note.order_patch())
            .await?;

        if note.is_success_event() {
            order = self
                .store
                .mark_paid(&note.business_ref, note.provider_ref.as_deref())
                .await?;
        }

        info!(
            business_ref = %note.business_ref,
            event_type = %note.event_type,
            status = ?order.status,
            "notification recorded"
        );

        Ok(NotificationOutcome {
            accepted: true,
            duplicate: false,
            order: Some(order),
        })
    }

    /// Current snapshot of one order. No side effects.
    pub async fn get_order(&self, business_ref: &str) -> Result<Option<Order>> {
        self.store.get_order(business_ref).await
    }

    /// The most recent `limit` callback records in arrival order. No side
    /// effects.
    pub async fn list_callbacks(&self, limit: usize) -> Result<Vec<CallbackRecord>> {
        self.store.list_callbacks(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::error::LedgerError;
    use crate::infrastructure::in_memory::InMemoryStore;
    use serde_json::json;

    fn service() -> LedgerService {
        LedgerService::new(Box::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_success_notification_pays_order() {
        let service = service();

        let outcome = service
            .record_notification(json!({
                "out_order_no": "A1",
                "event_type": "pay_success",
                "notify_id": "n-1"
            }))
            .await
            .unwrap();

        assert!(outcome.accepted);
        assert!(!outcome.duplicate);
        let order = outcome.order.unwrap();
        assert_eq!(order.business_ref, "A1");
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_duplicate_notify_id_has_no_effect() {
        let service = service();
        let payload = json!({ "out_order_no": "A1", "notify_id": "n-1" });

        let first = service.record_notification(payload.clone()).await.unwrap();
        assert!(!first.duplicate);

        let second = service.record_notification(payload).await.unwrap();
        assert!(second.accepted);
        assert!(second.duplicate);

        // Exactly one audit record.
        assert_eq!(service.list_callbacks(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_success_event_stays_pending() {
        let service = service();

        let outcome = service
            .record_notification(json!({
                "out_order_no": "A2",
                "event_type": "pending_review",
                "notify_id": "n-1"
            }))
            .await
            .unwrap();

        assert_eq!(outcome.order.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_paid_status_never_regresses() {
        let service = service();

        service
            .record_notification(json!({
                "out_order_no": "A3", "event_type": "pay_success", "notify_id": "n-1"
            }))
            .await
            .unwrap();

        let outcome = service
            .record_notification(json!({
                "out_order_no": "A3", "event_type": "pending_review", "notify_id": "n-2"
            }))
            .await
            .unwrap();

        assert_eq!(outcome.order.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_missing_order_ref_rejected_without_state_change() {
        let service = service();

        let result = service.record_notification(json!({})).await;
        assert!(matches!(result, Err(LedgerError::MissingOrderRef)));

        assert!(service.list_callbacks(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_two_distinct_notifications_same_order() {
        let service = service();

        service
            .record_notification(json!({
                "out_order_no": "A4", "event_type": "pay_success", "notify_id": "n-1"
            }))
            .await
            .unwrap();
        service
            .record_notification(json!({
                "out_order_no": "A4", "event_type": "pay_success", "notify_id": "n-2"
            }))
            .await
            .unwrap();

        assert_eq!(service.list_callbacks(10).await.unwrap().len(), 2);
        let order = service.get_order("A4").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_provider_ref_merged_on_later_notification() {
        let service = service();

        service
            .record_notification(json!({
                "out_order_no": "A5", "event_type": "pending_review", "notify_id": "n-1"
            }))
            .await
            .unwrap();
        service
            .record_notification(json!({
                "out_order_no": "A5", "order_id": "dy-77",
                "event_type": "pending_review", "notify_id": "n-2"
            }))
            .await
            .unwrap();

        let order = service.get_order("A5").await.unwrap().unwrap();
        assert_eq!(order.provider_ref.as_deref(), Some("dy-77"));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_order_unknown_is_none() {
        let service = service();
        assert!(service.get_order("unknown").await.unwrap().is_none());
    }
}
