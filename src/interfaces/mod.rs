//! Boundary adapters for feeding notifications into the ledger.

pub mod jsonl;
