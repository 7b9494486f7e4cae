use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ApiKey, Transaction, TransactionStatus};
use crate::services::{AdminSession, IssuedKey};
use crate::storage::{ApiKeyCounts, Page, TransactionStats};

pub const DEFAULT_PER_PAGE: u64 = 50;
pub const MAX_PER_PAGE: u64 = 200;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username and password required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Username and password required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub access_token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl From<AdminSession> for LoginResponse {
    fn from(session: AdminSession) -> Self {
        Self {
            success: true,
            access_token: session.access_token,
            username: session.username,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminVerifyResponse {
    pub success: bool,
    pub username: String,
}

/// API key as listed to the admin. Never carries the secret or its hash.
#[derive(Debug, Serialize)]
pub struct ApiKeySummary {
    pub id: String,
    pub key_prefix: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_expired: bool,
    pub total_requests: i64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKeySummary {
    pub fn new(key: ApiKey, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: key.is_expired_at(now),
            id: key.key_id,
            key_prefix: key.key_prefix,
            owner_name: key.owner_name,
            created_at: key.created_at,
            expires_at: key.expires_at,
            is_active: key.is_active,
            total_requests: key.usage_count,
            last_used_at: key.last_used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiKeyListResponse {
    pub success: bool,
    pub api_keys: Vec<ApiKeySummary>,
}

fn default_expiry_days() -> i64 {
    365
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "owner_name must be between 1 and 100 characters"))]
    pub owner_name: String,
    #[serde(default = "default_expiry_days")]
    #[validate(range(min = 1, max = 3650, message = "expiry_days must be between 1 and 3650"))]
    pub expiry_days: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub success: bool,
    pub message: String,
    /// Plaintext; shown once.
    pub api_key: String,
    pub key_id: String,
    pub key_prefix: String,
    pub owner_name: String,
    pub expires_at: DateTime<Utc>,
    pub warning: String,
}

impl From<IssuedKey> for CreateApiKeyResponse {
    fn from(issued: IssuedKey) -> Self {
        Self {
            success: true,
            message: "API key created successfully".to_string(),
            api_key: issued.plaintext,
            key_id: issued.record.key_id,
            key_prefix: issued.record.key_prefix,
            owner_name: issued.record.owner_name,
            expires_at: issued.record.expires_at,
            warning: "Save this key securely. It will not be shown again!".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleApiKeyResponse {
    pub success: bool,
    pub message: String,
    pub is_active: bool,
}

impl ToggleApiKeyResponse {
    pub fn new(is_active: bool) -> Self {
        Self {
            success: true,
            message: if is_active {
                "API key activated".to_string()
            } else {
                "API key deactivated".to_string()
            },
            is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<TransactionStatus>,
}

impl TransactionListQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// Admin view of a transaction. The merchant key is not exposed.
#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    pub order_id: String,
    pub amount: f64,
    pub upi_id: String,
    pub message: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub merchant_id: String,
    pub bharatpay_reference: Option<String>,
    pub bank_reference: Option<String>,
    pub api_key_id: Option<String>,
}

impl From<Transaction> for TransactionSummary {
    fn from(txn: Transaction) -> Self {
        Self {
            order_id: txn.order_id,
            amount: txn.amount,
            upi_id: txn.upi_id,
            message: txn.message,
            status: txn.status,
            created_at: txn.created_at,
            paid_at: txn.paid_at,
            merchant_id: txn.merchant_id,
            bharatpay_reference: txn.bharatpay_reference,
            bank_reference: txn.bank_reference,
            api_key_id: txn.api_key_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub success: bool,
    pub transactions: Vec<TransactionSummary>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
    pub per_page: u64,
}

impl TransactionListResponse {
    pub fn new(page: Page<Transaction>, current_page: u64, per_page: u64) -> Self {
        Self {
            success: true,
            pages: page.total.div_ceil(per_page),
            total: page.total,
            transactions: page.items.into_iter().map(Into::into).collect(),
            current_page,
            per_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_transactions: u64,
    pub total_api_keys: u64,
    pub active_api_keys: u64,
    pub successful_payments: u64,
    pub pending_payments: u64,
    pub failed_payments: u64,
    pub total_amount: f64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: DashboardStats,
}

impl StatsResponse {
    pub fn new(txns: TransactionStats, keys: ApiKeyCounts) -> Self {
        Self {
            success: true,
            stats: DashboardStats {
                total_transactions: txns.total,
                total_api_keys: keys.total,
                active_api_keys: keys.active,
                successful_payments: txns.successful,
                pending_payments: txns.pending,
                failed_payments: txns.failed,
                total_amount: (txns.total_amount * 100.0).round() / 100.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let q = TransactionListQuery::default();
        assert_eq!((q.page(), q.per_page()), (1, DEFAULT_PER_PAGE));

        let q = TransactionListQuery {
            page: Some(0),
            per_page: Some(10_000),
            status: None,
        };
        assert_eq!((q.page(), q.per_page()), (1, MAX_PER_PAGE));
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page {
            items: Vec::new(),
            total: 101,
        };
        assert_eq!(TransactionListResponse::new(page, 1, 50).pages, 3);
    }

    #[test]
    fn status_filter_uses_wire_names() {
        let q: TransactionListQuery = serde_json::from_str(r#"{"status":"SUCCESS"}"#).unwrap();
        assert_eq!(q.status, Some(TransactionStatus::Success));
    }
}
