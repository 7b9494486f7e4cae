use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AmountInput;
use crate::models::{Transaction, TransactionStatus};
use crate::services::CreatedPayment;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQrRequest {
    #[validate(length(min = 1, max = 100, message = "upi must be between 1 and 100 characters"))]
    pub upi: String,
    pub amount: AmountInput,
    #[validate(length(max = 255, message = "message must be at most 255 characters"))]
    pub message: Option<String>,
    #[validate(length(min = 1, max = 100, message = "order_id must be between 1 and 100 characters"))]
    pub order_id: Option<String>,
    #[validate(length(max = 500, message = "webhook_url must be at most 500 characters"))]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateQrResponse {
    pub success: bool,
    pub order_id: String,
    pub merchant_id: String,
    pub merchant_key: String,
    /// Base64 PNG.
    pub qr_code: String,
    pub qr_data: String,
    pub amount: f64,
    pub upi_id: String,
    pub message: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<CreatedPayment> for GenerateQrResponse {
    fn from(created: CreatedPayment) -> Self {
        let txn = created.transaction;
        Self {
            success: true,
            order_id: txn.order_id,
            merchant_id: txn.merchant_id,
            merchant_key: txn.merchant_key,
            qr_code: created.qr_code,
            qr_data: txn.qr_data,
            amount: txn.amount,
            upi_id: txn.upi_id,
            message: txn.message,
            status: txn.status,
            created_at: txn.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "order_id is required"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "merchant_id is required"))]
    pub merchant_id: String,
    #[validate(length(min = 1, message = "merchant_key is required"))]
    pub merchant_key: String,
}

/// Settlement fields are present only on SUCCESS.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order_id: String,
    pub status: TransactionStatus,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bharatpay_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_reference: Option<String>,
}

impl From<Transaction> for VerifyPaymentResponse {
    fn from(txn: Transaction) -> Self {
        let settled = txn.status == TransactionStatus::Success;
        Self {
            success: true,
            order_id: txn.order_id,
            status: txn.status,
            amount: txn.amount,
            created_at: txn.created_at,
            paid_at: txn.paid_at.filter(|_| settled),
            bharatpay_reference: txn.bharatpay_reference.filter(|_| settled),
            bank_reference: txn.bank_reference.filter(|_| settled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::fixtures;

    #[test]
    fn failed_verification_omits_settlement_fields() {
        let mut txn = fixtures::pending("ORD_F");
        txn.status = TransactionStatus::Failed;

        let body = serde_json::to_value(VerifyPaymentResponse::from(txn)).unwrap();
        assert_eq!(body["status"], "FAILED");
        assert!(body.get("paid_at").is_none());
        assert!(body.get("bharatpay_reference").is_none());
    }

    #[test]
    fn successful_verification_carries_references() {
        let mut txn = fixtures::pending("ORD_S");
        txn.settle(&fixtures::success()).unwrap();

        let body = serde_json::to_value(VerifyPaymentResponse::from(txn)).unwrap();
        assert_eq!(body["status"], "SUCCESS");
        assert!(body["paid_at"].is_string());
        assert!(body["bank_reference"].is_string());
    }
}
