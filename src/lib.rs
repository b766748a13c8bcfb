//! Idempotent order/callback ledger for a mini-program storefront backend.
//!
//! The ledger accepts asynchronous payment/verification notifications from an
//! external sender that may retry or deliver out of order, applies each
//! notification's effect to an order at most once, and keeps a full audit
//! trail of every accepted notification.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
