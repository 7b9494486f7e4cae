//! Record stores.
//!
//! Each store owns one kind of record and is the only place that mutates it.
//! Mutations are atomic per record: the in-memory backend serialises them
//! behind a per-record lock, the MongoDB backend uses single-document
//! conditional writes.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    AlreadyDecided, ApiKey, LinkUnavailable, PaymentLink, Settlement, Transaction,
    TransactionStatus,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order ID already exists: {0}")]
    DuplicateOrder(String),

    #[error("Transaction {order_id} already decided as {status}")]
    AlreadyDecided {
        order_id: String,
        status: TransactionStatus,
    },

    /// Carries the kind of record that was missing.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    LinkUnavailable(#[from] LinkUnavailable),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub(crate) fn already_decided(order_id: &str, err: AlreadyDecided) -> Self {
        StoreError::AlreadyDecided {
            order_id: order_id.to_string(),
            status: err.0,
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

/// Filter and pagination for the admin transaction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    pub status: Option<TransactionStatus>,
    /// 1-based.
    pub page: u64,
    pub per_page: u64,
}

impl TransactionQuery {
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransactionStats {
    pub total: u64,
    pub pending: u64,
    pub successful: u64,
    pub failed: u64,
    /// Sum of SUCCESS amounts.
    pub total_amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiKeyCounts {
    pub total: u64,
    pub active: u64,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new PENDING record. Fails with `DuplicateOrder` if the id is taken.
    async fn create(&self, txn: Transaction) -> Result<(), StoreError>;

    async fn get(&self, order_id: &str) -> Result<Option<Transaction>, StoreError>;

    /// Compare-and-set from PENDING. Fails with `AlreadyDecided` once the
    /// record is terminal and `NotFound` if it does not exist.
    async fn transition(
        &self,
        order_id: &str,
        settlement: &Settlement,
    ) -> Result<Transaction, StoreError>;

    /// Newest first.
    async fn list(&self, query: &TransactionQuery) -> Result<Page<Transaction>, StoreError>;

    async fn stats(&self) -> Result<TransactionStats, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert(&self, key: ApiKey) -> Result<(), StoreError>;

    async fn find_by_hash(&self, hashed_secret: &str) -> Result<Option<ApiKey>, StoreError>;

    /// Increment `usage_count` and stamp `last_used_at`.
    async fn record_usage(&self, key_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<ApiKey>, StoreError>;

    async fn delete(&self, key_id: &str) -> Result<ApiKey, StoreError>;

    /// Flip `is_active` and return the updated record.
    async fn toggle_active(&self, key_id: &str) -> Result<ApiKey, StoreError>;

    async fn counts(&self) -> Result<ApiKeyCounts, StoreError>;
}

#[async_trait]
pub trait PaymentLinkStore: Send + Sync {
    async fn insert(&self, link: PaymentLink) -> Result<(), StoreError>;

    async fn get(&self, link_id: &str) -> Result<Option<PaymentLink>, StoreError>;

    /// Atomically check active/expiry/max_uses and count one use.
    async fn claim_use(&self, link_id: &str, now: DateTime<Utc>)
        -> Result<PaymentLink, StoreError>;

    /// Give back a use claimed by a mint that did not complete.
    async fn release_use(&self, link_id: &str) -> Result<(), StoreError>;
}

/// The three stores, backed by the same engine.
#[derive(Clone)]
pub struct Stores {
    pub transactions: Arc<dyn TransactionStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub links: Arc<dyn PaymentLinkStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            transactions: store.clone(),
            api_keys: store.clone(),
            links: store,
        }
    }

    pub fn mongo(store: MongoStore) -> Self {
        let store = Arc::new(store);
        Self {
            transactions: store.clone(),
            api_keys: store.clone(),
            links: store,
        }
    }
}
