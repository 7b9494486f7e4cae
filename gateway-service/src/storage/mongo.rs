use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
    },
    Client, Collection, Database, IndexModel,
};

use super::{
    ApiKeyCounts, ApiKeyStore, Page, PaymentLinkStore, StoreError, TransactionQuery,
    TransactionStats, TransactionStore,
};
use crate::models::{
    ApiKey, LinkUnavailable, PaymentLink, Settlement, Transaction, TransactionStatus,
};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

/// MongoDB backend. Every mutation is a single-document atomic operation.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    transactions: Collection<Transaction>,
    api_keys: Collection<ApiKey>,
    links: Collection<PaymentLink>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            StoreError::from(e)
        })?;
        client_options.app_name = Some("gateway-service".to_string());

        let client = Client::with_options(client_options)?;
        Ok(Self::new(&client.database(database)))
    }

    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            transactions: db.collection("transactions"),
            api_keys: db.collection("api_keys"),
            links: db.collection("payment_links"),
        }
    }

    pub async fn init_indexes(&self) -> Result<(), StoreError> {
        let created_idx = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("transaction_created_idx".to_string())
                    .build(),
            )
            .build();
        let status_idx = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("transaction_status_idx".to_string())
                    .build(),
            )
            .build();
        self.transactions
            .create_indexes([created_idx, status_idx], None)
            .await?;

        let hash_idx = IndexModel::builder()
            .keys(doc! { "hashed_secret": 1 })
            .options(
                IndexOptions::builder()
                    .name("api_key_hash_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.api_keys.create_indexes([hash_idx], None).await?;

        tracing::info!("Gateway indexes initialized");
        Ok(())
    }

    async fn count(&self, filter: Document) -> Result<u64, StoreError> {
        Ok(self.transactions.count_documents(filter, None).await?)
    }
}

#[async_trait]
impl TransactionStore for MongoStore {
    async fn create(&self, txn: Transaction) -> Result<(), StoreError> {
        let order_id = txn.order_id.clone();
        match self.transactions.insert_one(txn, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateOrder(order_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, order_id: &str) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .transactions
            .find_one(doc! { "_id": order_id }, None)
            .await?)
    }

    async fn transition(
        &self,
        order_id: &str,
        settlement: &Settlement,
    ) -> Result<Transaction, StoreError> {
        let mut txn = TransactionStore::get(self, order_id)
            .await?
            .ok_or(StoreError::NotFound("Order"))?;
        txn.settle(settlement)
            .map_err(|e| StoreError::already_decided(order_id, e))?;

        // Replace only while the stored copy is still PENDING.
        let filter = doc! { "_id": order_id, "status": TransactionStatus::Pending.as_str() };
        let result = self.transactions.replace_one(filter, &txn, None).await?;
        if result.matched_count == 1 {
            return Ok(txn);
        }

        match TransactionStore::get(self, order_id).await? {
            Some(current) => Err(StoreError::AlreadyDecided {
                order_id: order_id.to_string(),
                status: current.status,
            }),
            None => Err(StoreError::NotFound("Order")),
        }
    }

    async fn list(&self, query: &TransactionQuery) -> Result<Page<Transaction>, StoreError> {
        let mut filter = doc! {};
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }

        let total = self.count(filter.clone()).await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(query.skip())
            .limit(i64::try_from(query.per_page).unwrap_or(i64::MAX))
            .build();
        let items: Vec<Transaction> = self
            .transactions
            .find(filter, options)
            .await?
            .try_collect()
            .await?;

        Ok(Page { items, total })
    }

    async fn stats(&self) -> Result<TransactionStats, StoreError> {
        let total = self.count(doc! {}).await?;
        let pending = self
            .count(doc! { "status": TransactionStatus::Pending.as_str() })
            .await?;
        let successful = self
            .count(doc! { "status": TransactionStatus::Success.as_str() })
            .await?;
        let failed = self
            .count(doc! { "status": TransactionStatus::Failed.as_str() })
            .await?;

        let pipeline = vec![
            doc! { "$match": { "status": TransactionStatus::Success.as_str() } },
            doc! { "$group": { "_id": bson::Bson::Null, "total": { "$sum": "$amount" } } },
        ];
        let mut cursor = self.transactions.aggregate(pipeline, None).await?;
        let total_amount = match cursor.try_next().await? {
            Some(group) => group.get_f64("total").unwrap_or(0.0),
            None => 0.0,
        };

        Ok(TransactionStats {
            total,
            pending,
            successful,
            failed,
            total_amount,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for MongoStore {
    async fn insert(&self, key: ApiKey) -> Result<(), StoreError> {
        self.api_keys.insert_one(key, None).await?;
        Ok(())
    }

    async fn find_by_hash(&self, hashed_secret: &str) -> Result<Option<ApiKey>, StoreError> {
        Ok(self
            .api_keys
            .find_one(doc! { "hashed_secret": hashed_secret }, None)
            .await?)
    }

    async fn record_usage(&self, key_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let update = doc! {
            "$inc": { "usage_count": 1_i64 },
            "$set": { "last_used_at": bson::DateTime::from_chrono(at) },
        };
        let result = self
            .api_keys
            .update_one(doc! { "_id": key_id }, update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound("API key"));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ApiKey>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        Ok(self
            .api_keys
            .find(doc! {}, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn delete(&self, key_id: &str) -> Result<ApiKey, StoreError> {
        self.api_keys
            .find_one_and_delete(doc! { "_id": key_id }, None)
            .await?
            .ok_or(StoreError::NotFound("API key"))
    }

    async fn toggle_active(&self, key_id: &str) -> Result<ApiKey, StoreError> {
        let pipeline = vec![doc! { "$set": { "is_active": { "$not": "$is_active" } } }];
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.api_keys
            .find_one_and_update(doc! { "_id": key_id }, pipeline, options)
            .await?
            .ok_or(StoreError::NotFound("API key"))
    }

    async fn counts(&self) -> Result<ApiKeyCounts, StoreError> {
        let total = self.api_keys.count_documents(doc! {}, None).await?;
        let active = self
            .api_keys
            .count_documents(doc! { "is_active": true }, None)
            .await?;
        Ok(ApiKeyCounts { total, active })
    }
}

#[async_trait]
impl PaymentLinkStore for MongoStore {
    async fn insert(&self, link: PaymentLink) -> Result<(), StoreError> {
        self.links.insert_one(link, None).await?;
        Ok(())
    }

    async fn get(&self, link_id: &str) -> Result<Option<PaymentLink>, StoreError> {
        Ok(self.links.find_one(doc! { "_id": link_id }, None).await?)
    }

    async fn claim_use(
        &self,
        link_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentLink, StoreError> {
        let filter = doc! {
            "_id": link_id,
            "is_active": true,
            "$and": [
                { "$or": [
                    { "expires_at": bson::Bson::Null },
                    { "expires_at": { "$gt": bson::DateTime::from_chrono(now) } }
                ] },
                { "$or": [
                    { "max_uses": bson::Bson::Null },
                    { "$expr": { "$lt": ["$use_count", "$max_uses"] } }
                ] }
            ],
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        if let Some(link) = self
            .links
            .find_one_and_update(filter, doc! { "$inc": { "use_count": 1_i64 } }, options)
            .await?
        {
            return Ok(link);
        }

        // The conditional update matched nothing: report why.
        let link = PaymentLinkStore::get(self, link_id)
            .await?
            .ok_or(StoreError::NotFound("Payment link"))?;
        Err(link
            .check_available(now)
            .err()
            .unwrap_or(LinkUnavailable::Exhausted)
            .into())
    }

    async fn release_use(&self, link_id: &str) -> Result<(), StoreError> {
        self.links
            .update_one(
                doc! { "_id": link_id, "use_count": { "$gt": 0_i64 } },
                doc! { "$inc": { "use_count": -1_i64 } },
                None,
            )
            .await?;
        Ok(())
    }
}
