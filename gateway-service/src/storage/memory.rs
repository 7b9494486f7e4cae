use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    ApiKeyCounts, ApiKeyStore, Page, PaymentLinkStore, StoreError, TransactionQuery,
    TransactionStats, TransactionStore,
};
use crate::models::{ApiKey, PaymentLink, Settlement, Transaction, TransactionStatus};

type Slot<T> = Arc<Mutex<T>>;

/// Process-local backend. Every record sits behind its own lock, so writers to
/// different records never contend. Map guards are never held across `.await`.
#[derive(Default)]
pub struct MemoryStore {
    transactions: DashMap<String, Slot<Transaction>>,
    api_keys: DashMap<String, Slot<ApiKey>>,
    /// hashed_secret -> key_id
    key_hashes: DashMap<String, String>,
    links: DashMap<String, Slot<PaymentLink>>,
}

fn slot_of<T>(map: &DashMap<String, Slot<T>>, id: &str) -> Option<Slot<T>> {
    map.get(id).map(|entry| Arc::clone(entry.value()))
}

fn slots<T>(map: &DashMap<String, Slot<T>>) -> Vec<Slot<T>> {
    map.iter().map(|entry| Arc::clone(entry.value())).collect()
}

async fn snapshot<T: Clone>(slots: Vec<Slot<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(slots.len());
    for slot in slots {
        out.push(slot.lock().await.clone());
    }
    out
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn create(&self, txn: Transaction) -> Result<(), StoreError> {
        match self.transactions.entry(txn.order_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateOrder(txn.order_id)),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Mutex::new(txn)));
                Ok(())
            }
        }
    }

    async fn get(&self, order_id: &str) -> Result<Option<Transaction>, StoreError> {
        match slot_of(&self.transactions, order_id) {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        order_id: &str,
        settlement: &Settlement,
    ) -> Result<Transaction, StoreError> {
        let slot = slot_of(&self.transactions, order_id).ok_or(StoreError::NotFound("Order"))?;
        let mut txn = slot.lock().await;
        txn.settle(settlement)
            .map_err(|e| StoreError::already_decided(order_id, e))?;
        Ok(txn.clone())
    }

    async fn list(&self, query: &TransactionQuery) -> Result<Page<Transaction>, StoreError> {
        let mut items: Vec<Transaction> = snapshot(slots(&self.transactions))
            .await
            .into_iter()
            .filter(|txn| query.status.map_or(true, |status| txn.status == status))
            .collect();

        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_id.cmp(&a.order_id))
        });

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(query.skip() as usize)
            .take(query.per_page as usize)
            .collect();

        Ok(Page { items, total })
    }

    async fn stats(&self) -> Result<TransactionStats, StoreError> {
        let mut stats = TransactionStats::default();
        for txn in snapshot(slots(&self.transactions)).await {
            stats.total += 1;
            match txn.status {
                TransactionStatus::Pending => stats.pending += 1,
                TransactionStatus::Failed => stats.failed += 1,
                TransactionStatus::Success => {
                    stats.successful += 1;
                    stats.total_amount += txn.amount;
                }
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert(&self, key: ApiKey) -> Result<(), StoreError> {
        match self.key_hashes.entry(key.hashed_secret.clone()) {
            Entry::Occupied(_) => Err(StoreError::Backend(anyhow::anyhow!(
                "API key hash collision"
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(key.key_id.clone());
                self.api_keys
                    .insert(key.key_id.clone(), Arc::new(Mutex::new(key)));
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, hashed_secret: &str) -> Result<Option<ApiKey>, StoreError> {
        let key_id = match self.key_hashes.get(hashed_secret) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        match slot_of(&self.api_keys, &key_id) {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn record_usage(&self, key_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let slot = slot_of(&self.api_keys, key_id).ok_or(StoreError::NotFound("API key"))?;
        let mut key = slot.lock().await;
        key.usage_count += 1;
        key.last_used_at = Some(at);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ApiKey>, StoreError> {
        let mut keys = snapshot(slots(&self.api_keys)).await;
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn delete(&self, key_id: &str) -> Result<ApiKey, StoreError> {
        let (_, slot) = self
            .api_keys
            .remove(key_id)
            .ok_or(StoreError::NotFound("API key"))?;
        let key = slot.lock().await.clone();
        self.key_hashes.remove(&key.hashed_secret);
        Ok(key)
    }

    async fn toggle_active(&self, key_id: &str) -> Result<ApiKey, StoreError> {
        let slot = slot_of(&self.api_keys, key_id).ok_or(StoreError::NotFound("API key"))?;
        let mut key = slot.lock().await;
        key.is_active = !key.is_active;
        Ok(key.clone())
    }

    async fn counts(&self) -> Result<ApiKeyCounts, StoreError> {
        let keys = snapshot(slots(&self.api_keys)).await;
        Ok(ApiKeyCounts {
            total: keys.len() as u64,
            active: keys.iter().filter(|k| k.is_active).count() as u64,
        })
    }
}

#[async_trait]
impl PaymentLinkStore for MemoryStore {
    async fn insert(&self, link: PaymentLink) -> Result<(), StoreError> {
        match self.links.entry(link.link_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Backend(anyhow::anyhow!(
                "Payment link id collision"
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Mutex::new(link)));
                Ok(())
            }
        }
    }

    async fn get(&self, link_id: &str) -> Result<Option<PaymentLink>, StoreError> {
        match slot_of(&self.links, link_id) {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn claim_use(
        &self,
        link_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentLink, StoreError> {
        let slot = slot_of(&self.links, link_id).ok_or(StoreError::NotFound("Payment link"))?;
        let mut link = slot.lock().await;
        link.claim_use(now)?;
        Ok(link.clone())
    }

    async fn release_use(&self, link_id: &str) -> Result<(), StoreError> {
        let slot = slot_of(&self.links, link_id).ok_or(StoreError::NotFound("Payment link"))?;
        slot.lock().await.release_use();
        Ok(())
    }
}
