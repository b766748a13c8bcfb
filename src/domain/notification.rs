use crate::domain::order::OrderPatch;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types that transition an order to `Paid`.
const SUCCESS_EVENTS: [&str; 2] = ["pay_success", "verify_success"];

/// Fallback field names for the business order reference.
const BUSINESS_REF_FIELDS: [&str; 3] = ["out_order_no", "out_order_id", "merchant_order_no"];

/// Fallback field names for the platform's own order identifier.
const PROVIDER_REF_FIELDS: [&str; 2] = ["order_id", "douyin_order_id"];

/// A notification payload resolved into the fields the ledger acts on.
///
/// Upstream senders are inconsistent about field names, so each logical
/// value is resolved through a fallback list; the raw payload is kept
/// verbatim for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub business_ref: String,
    pub provider_ref: Option<String>,
    pub event_type: String,
    /// Deduplication identifier: the sender's `notify_id` when present,
    /// otherwise synthesized deterministically from the payload.
    pub notify_id: String,
    pub payload: Value,
}

/// Append-only audit entry for one accepted notification.
///
/// Immutable once written except for `processed`, which the ledger flips
/// after the notification's effect has been applied to an order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CallbackRecord {
    pub business_ref: String,
    pub provider_ref: Option<String>,
    pub event_type: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

/// Reads a field as text, accepting both string and numeric JSON values.
/// Empty strings count as absent.
fn field_text(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_field(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| field_text(payload, key))
}

impl Notification {
    /// Resolves an opaque payload. Fails only when no business order
    /// reference can be found; every other field is optional.
    ///
    /// `received_at` anchors the synthesized deduplication identifier when
    /// the payload carries neither `notify_id` nor `event_time`.
    pub fn resolve(payload: Value, received_at: DateTime<Utc>) -> Result<Self> {
        let business_ref =
            first_field(&payload, &BUSINESS_REF_FIELDS).ok_or(LedgerError::MissingOrderRef)?;
        let provider_ref = first_field(&payload, &PROVIDER_REF_FIELDS);
        let event_type =
            field_text(&payload, "event_type").unwrap_or_else(|| "pay_success".to_string());
        let notify_id = field_text(&payload, "notify_id").unwrap_or_else(|| {
            let event_time = field_text(&payload, "event_time")
                .unwrap_or_else(|| received_at.timestamp_millis().to_string());
            format!("{business_ref}:{event_type}:{event_time}")
        });

        Ok(Self {
            business_ref,
            provider_ref,
            event_type,
            notify_id,
            payload,
        })
    }

    /// Whether this event transitions the order to `Paid`.
    pub fn is_success_event(&self) -> bool {
        SUCCESS_EVENTS.contains(&self.event_type.as_str())
    }

    pub fn order_patch(&self) -> OrderPatch {
        OrderPatch {
            provider_ref: self.provider_ref.clone(),
            amount_minor: self.payload.get("amount").and_then(Value::as_i64),
            product_ref: field_text(&self.payload, "product_id"),
            user_ref: field_text(&self.payload, "user_id"),
        }
    }

    pub fn callback_record(&self, received_at: DateTime<Utc>) -> CallbackRecord {
        CallbackRecord {
            business_ref: self.business_ref.clone(),
            provider_ref: self.provider_ref.clone(),
            event_type: self.event_type.clone(),
            payload: self.payload.clone(),
            received_at,
            processed: false,
        }
    }
}
