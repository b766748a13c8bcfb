//! Storage backends implementing the `LedgerStore` port.
//!
//! `SnapshotStore` is the durable default (whole-file JSON snapshot);
//! `InMemoryStore` is for tests and ephemeral runs; `RocksDbStore` is an
//! optional keyed backend behind the `storage-rocksdb` feature.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod snapshot;
pub mod state;
