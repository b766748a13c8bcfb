//! Application layer containing the core business logic orchestration.
//!
//! This module defines the `LedgerService`, the single entry point for
//! recording notifications and querying order state. It owns the storage
//! backend and serializes all mutating calls behind a write gate.

pub mod ledger;
