use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::optional_datetime;

pub const DEFAULT_MESSAGE: &str = "BharatPay Payment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the one allowed PENDING -> terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Success {
        paid_at: DateTime<Utc>,
        bharatpay_reference: String,
        bank_reference: String,
    },
    Failed,
}

impl Settlement {
    pub fn status(&self) -> TransactionStatus {
        match self {
            Settlement::Success { .. } => TransactionStatus::Success,
            Settlement::Failed => TransactionStatus::Failed,
        }
    }
}

/// Returned by [`Transaction::settle`] when the record has left PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transaction already decided as {0}")]
pub struct AlreadyDecided(pub TransactionStatus);

/// A payment request and its settlement state.
///
/// `order_id` is the primary key. `merchant_id` + `merchant_key` form the
/// per-order capability required to verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub order_id: String,
    pub api_key_id: Option<String>,
    pub merchant_id: String,
    pub merchant_key: String,
    pub upi_id: String,
    pub amount: f64,
    pub message: String,
    pub qr_data: String,
    pub status: TransactionStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "optional_datetime")]
    pub paid_at: Option<DateTime<Utc>>,
    pub bharatpay_reference: Option<String>,
    pub bank_reference: Option<String>,
    pub webhook_url: Option<String>,
}

impl Transaction {
    /// Apply a settlement. Only a PENDING record can be settled, and only once.
    pub fn settle(&mut self, settlement: &Settlement) -> Result<(), AlreadyDecided> {
        if self.status.is_terminal() {
            return Err(AlreadyDecided(self.status));
        }

        self.status = settlement.status();
        if let Settlement::Success {
            paid_at,
            bharatpay_reference,
            bank_reference,
        } = settlement
        {
            self.paid_at = Some(*paid_at);
            self.bharatpay_reference = Some(bharatpay_reference.clone());
            self.bank_reference = Some(bank_reference.clone());
        }

        Ok(())
    }
}
