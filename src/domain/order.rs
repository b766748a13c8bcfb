use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// The status is monotonic: `Paid` is terminal and no mutation path ever
/// produces `Pending` from `Paid`. Refunds and cancellations are not modeled.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
}

/// A locally tracked order, keyed by the merchant-assigned business reference.
///
/// Created on first reference (by a callback or by an order-creation path)
/// and never deleted. Business metadata may arrive after creation and is
/// merged field by field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    /// Merchant-assigned business order identifier. Immutable once created.
    pub business_ref: String,
    /// The payment platform's own order identifier. May arrive before or
    /// after the order exists locally.
    pub provider_ref: Option<String>,
    pub status: OrderStatus,
    /// Order amount in minor currency units.
    pub amount_minor: Option<i64>,
    pub product_ref: Option<String>,
    pub user_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-level upsert input: present fields overwrite, absent fields are
/// preserved on the stored order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrderPatch {
    pub provider_ref: Option<String>,
    pub amount_minor: Option<i64>,
    pub product_ref: Option<String>,
    pub user_ref: Option<String>,
}

impl Order {
    /// Creates a fresh `Pending` order for the given business reference.
    pub fn new(business_ref: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            business_ref: business_ref.into(),
            provider_ref: None,
            status: OrderStatus::Pending,
            amount_minor: None,
            product_ref: None,
            user_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges a patch into the order. Status is never touched here; an
    /// empty provider reference never erases a stored one.
    pub fn apply(&mut self, patch: &OrderPatch, now: DateTime<Utc>) {
        if let Some(provider_ref) = &patch.provider_ref
            && !provider_ref.is_empty()
        {
            self.provider_ref = Some(provider_ref.clone());
        }
        if let Some(amount) = patch.amount_minor {
            self.amount_minor = Some(amount);
        }
        if let Some(product_ref) = &patch.product_ref {
            self.product_ref = Some(product_ref.clone());
        }
        if let Some(user_ref) = &patch.user_ref {
            self.user_ref = Some(user_ref.clone());
        }
        self.updated_at = now;
    }

    /// Transitions the order to `Paid`. Idempotent on already-paid orders.
    pub fn mark_paid(&mut self, provider_ref: Option<&str>, now: DateTime<Utc>) {
        self.status = OrderStatus::Paid;
        if let Some(provider_ref) = provider_ref
            && !provider_ref.is_empty()
        {
            self.provider_ref = Some(provider_ref.to_string());
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_is_pending() {
        let now = Utc::now();
        let order = Order::new("A1", now);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, now);
        assert!(order.provider_ref.is_none());
    }

    #[test]
    fn test_apply_preserves_absent_fields() {
        let now = Utc::now();
        let mut order = Order::new("A1", now);
        order.apply(
            &OrderPatch {
                amount_minor: Some(990),
                ..Default::default()
            },
            now,
        );
        order.apply(
            &OrderPatch {
                product_ref: Some("p-1".into()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(order.amount_minor, Some(990));
        assert_eq!(order.product_ref.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_apply_never_touches_status() {
        let now = Utc::now();
        let mut order = Order::new("A1", now);
        order.mark_paid(None, now);
        order.apply(
            &OrderPatch {
                user_ref: Some("u-1".into()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[test]
    fn test_empty_provider_ref_does_not_erase() {
        let now = Utc::now();
        let mut order = Order::new("A1", now);
        order.apply(
            &OrderPatch {
                provider_ref: Some("dy-123".into()),
                ..Default::default()
            },
            now,
        );
        order.apply(
            &OrderPatch {
                provider_ref: Some(String::new()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(order.provider_ref.as_deref(), Some("dy-123"));
    }

    #[test]
    fn test_mark_paid_is_idempotent() {
        let now = Utc::now();
        let mut order = Order::new("A1", now);
        order.mark_paid(Some("dy-123"), now);
        order.mark_paid(None, now);

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.provider_ref.as_deref(), Some("dy-123"));
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&OrderStatus::Paid).unwrap();
        assert_eq!(json, "\"PAID\"");
    }
}
