use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::GatewayError;
use super::{ids, metrics};
use crate::models::{now_millis, Settlement, Transaction};
use crate::storage::{StoreError, TransactionStore};

pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.8;

/// Decides how a PENDING order settles on its first verification.
pub trait SettlementPolicy: Send + Sync {
    fn decide(&self, now: DateTime<Utc>) -> Settlement;
}

/// Succeeds with probability `p`, fails otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RandomSettlement {
    success_probability: f64,
}

impl RandomSettlement {
    pub fn new(success_probability: f64) -> Self {
        let success_probability = if success_probability.is_nan() {
            DEFAULT_SUCCESS_PROBABILITY
        } else {
            success_probability.clamp(0.0, 1.0)
        };
        Self {
            success_probability,
        }
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

impl Default for RandomSettlement {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_PROBABILITY)
    }
}

impl SettlementPolicy for RandomSettlement {
    fn decide(&self, now: DateTime<Utc>) -> Settlement {
        if rand::thread_rng().gen_bool(self.success_probability) {
            Settlement::Success {
                paid_at: now,
                bharatpay_reference: ids::new_bharatpay_reference(now),
                bank_reference: ids::new_bank_reference(),
            }
        } else {
            Settlement::Failed
        }
    }
}

/// Checks the merchant capability pair and settles each order at most once.
pub struct VerificationEngine {
    store: Arc<dyn TransactionStore>,
    policy: Arc<dyn SettlementPolicy>,
}

fn credentials_match(txn: &Transaction, merchant_id: &str, merchant_key: &str) -> bool {
    let id_ok = txn.merchant_id.as_bytes().ct_eq(merchant_id.as_bytes());
    let key_ok = txn.merchant_key.as_bytes().ct_eq(merchant_key.as_bytes());
    bool::from(id_ok & key_ok)
}

impl VerificationEngine {
    pub fn new(store: Arc<dyn TransactionStore>, policy: Arc<dyn SettlementPolicy>) -> Self {
        Self { store, policy }
    }

    /// Returns the settled record. Repeated calls return the stored outcome
    /// unchanged; concurrent first calls all observe the single winner.
    pub async fn verify(
        &self,
        order_id: &str,
        merchant_id: &str,
        merchant_key: &str,
    ) -> Result<Transaction, GatewayError> {
        let txn = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Order not found".to_string()))?;

        if !credentials_match(&txn, merchant_id, merchant_key) {
            return Err(GatewayError::Unauthorized(
                "Invalid merchant credentials".to_string(),
            ));
        }

        if txn.status.is_terminal() {
            metrics::record_verification(txn.status, false);
            return Ok(txn);
        }

        let settlement = self.policy.decide(now_millis());
        match self.store.transition(order_id, &settlement).await {
            Ok(decided) => {
                tracing::info!(
                    order_id = %order_id,
                    status = %decided.status,
                    "Transaction settled"
                );
                metrics::record_verification(decided.status, true);
                Ok(decided)
            }
            Err(StoreError::AlreadyDecided { status, .. }) => {
                tracing::debug!(order_id = %order_id, status = %status, "Lost settlement race");
                metrics::record_verification(status, false);
                self.store
                    .get(order_id)
                    .await?
                    .ok_or_else(|| GatewayError::NotFound("Order not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
