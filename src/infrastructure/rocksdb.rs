use crate::domain::notification::CallbackRecord;
use crate::domain::order::{Order, OrderPatch};
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column family for order state, keyed by business reference.
pub const CF_ORDERS: &str = "orders";
/// Column family for the append-ordered callback log, keyed by a big-endian
/// u64 sequence number.
pub const CF_CALLBACKS: &str = "callbacks";
/// Column family for idempotency keys, valued by first-seen time.
pub const CF_IDEMPOTENCY: &str = "idempotency";

/// A persistent ledger store backed by RocksDB.
///
/// The at-scale alternative to the whole-snapshot store: each mutation
/// writes only the affected keys. Same single-writer discipline — the
/// service serializes mutating calls, so read-modify-write sequences here
/// do not race.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    next_seq: Arc<AtomicU64>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at `path`, ensuring the three
    /// ledger column families exist and recovering the callback sequence
    /// counter from the last stored key.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ORDERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CALLBACKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        let next_seq = {
            let cf = db
                .cf_handle(CF_CALLBACKS)
                .ok_or_else(|| LedgerError::Storage("callbacks column family not found".into()))?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item?;
                    let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                        LedgerError::Storage("malformed callback sequence key".into())
                    })?;
                    u64::from_be_bytes(bytes) + 1
                }
                None => 0,
            }
        };

        Ok(Self {
            db: Arc::new(db),
            next_seq: Arc::new(AtomicU64::new(next_seq)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family not found: {name}")))
    }

    fn load_order(&self, business_ref: &str) -> Result<Option<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_pinned_cf(cf, business_ref.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store_order(&self, order: &Order) -> Result<()> {
        let cf = self.cf(CF_ORDERS)?;
        let value = serde_json::to_vec(order)?;
        self.db.put_cf(cf, order.business_ref.as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDbStore {
    async fn claim_notification(&self, key: &str, first_seen: DateTime<Utc>) -> Result<bool> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        if self.db.get_pinned_cf(cf, key.as_bytes())?.is_some() {
            return Ok(false);
        }
        let value = serde_json::to_vec(&first_seen)?;
        self.db.put_cf(cf, key.as_bytes(), value)?;
        Ok(true)
    }

    async fn append_callback(&self, record: CallbackRecord) -> Result<()> {
        let cf = self.cf(CF_CALLBACKS)?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let value = serde_json::to_vec(&record)?;
        self.db.put_cf(cf, seq.to_be_bytes(), value)?;
        Ok(())
    }

    async fn upsert_order(&self, business_ref: &str, patch: OrderPatch) -> Result<Order> {
        let now = Utc::now();
        let mut order = self
            .load_order(business_ref)?
            .unwrap_or_else(|| Order::new(business_ref, now));
        order.apply(&patch, now);
        self.store_order(&order)?;
        Ok(order)
    }

    async fn mark_paid(&self, business_ref: &str, provider_ref: Option<&str>) -> Result<Order> {
        let now = Utc::now();
        let mut order = self
            .load_order(business_ref)?
            .unwrap_or_else(|| Order::new(business_ref, now));
        order.mark_paid(provider_ref, now);
        self.store_order(&order)?;

        // Best-effort: walk the log backwards and flip the most recent
        // unprocessed callback for this reference.
        let cf = self.cf(CF_CALLBACKS)?;
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            let (key, value) = item?;
            let mut record: CallbackRecord = serde_json::from_slice(&value)?;
            if record.business_ref == business_ref && !record.processed {
                record.processed = true;
                self.db.put_cf(cf, key, serde_json::to_vec(&record)?)?;
                break;
            }
        }

        Ok(order)
    }

    async fn get_order(&self, business_ref: &str) -> Result<Option<Order>> {
        self.load_order(business_ref)
    }

    async fn list_callbacks(&self, limit: usize) -> Result<Vec<CallbackRecord>> {
        let cf = self.cf(CF_CALLBACKS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::End).take(limit) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        records.reverse();
        Ok(records)
    }
}
