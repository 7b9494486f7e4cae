use chrono::Duration;
use std::sync::Arc;

use super::audit::{self, AuditAction};
use super::error::GatewayError;
use super::payments::{
    normalize_amount, validate_text, validate_upi_id, CreatedPayment, NewPayment, OrderSource,
    PaymentService, MAX_MESSAGE_LEN,
};
use super::{ids, metrics};
use crate::models::{now_millis, PaymentLink, DEFAULT_LINK_DESCRIPTION};
use crate::storage::{PaymentLinkStore, StoreError};

/// One year.
pub const MAX_EXPIRES_IN_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct NewPaymentLink {
    pub upi_id: String,
    pub amount: f64,
    pub description: Option<String>,
    pub max_uses: Option<i64>,
    pub expires_in_hours: Option<i64>,
    pub api_key_id: Option<String>,
}

/// Reusable payment templates that mint a fresh order per use.
pub struct PaymentLinkService {
    store: Arc<dyn PaymentLinkStore>,
    payments: Arc<PaymentService>,
}

impl PaymentLinkService {
    pub fn new(store: Arc<dyn PaymentLinkStore>, payments: Arc<PaymentService>) -> Self {
        Self { store, payments }
    }

    pub async fn create(&self, request: NewPaymentLink) -> Result<PaymentLink, GatewayError> {
        let upi_id = request.upi_id.trim().to_string();
        validate_upi_id(&upi_id)?;
        let amount = normalize_amount(request.amount)?;

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_LINK_DESCRIPTION.to_string());
        validate_text("description", &description, MAX_MESSAGE_LEN)?;

        if request.max_uses.is_some_and(|max| max < 1) {
            return Err(GatewayError::validation("max_uses must be at least 1"));
        }
        if request
            .expires_in_hours
            .is_some_and(|hours| !(1..=MAX_EXPIRES_IN_HOURS).contains(&hours))
        {
            return Err(GatewayError::validation(format!(
                "expires_in_hours must be between 1 and {}",
                MAX_EXPIRES_IN_HOURS
            )));
        }

        let now = now_millis();
        let link = PaymentLink {
            link_id: ids::new_link_id(),
            api_key_id: request.api_key_id,
            upi_id,
            amount,
            description,
            max_uses: request.max_uses,
            use_count: 0,
            expires_at: request.expires_in_hours.map(|h| now + Duration::hours(h)),
            is_active: true,
            created_at: now,
        };

        self.store.insert(link.clone()).await?;
        audit::record(
            AuditAction::PaymentLinkCreated,
            Some(&link.link_id),
            format!("Amount: {:.2}", link.amount),
        );

        Ok(link)
    }

    /// The link, if it can still mint an order.
    pub async fn get_usable(&self, link_id: &str) -> Result<PaymentLink, GatewayError> {
        let link = self
            .store
            .get(link_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Payment link not found".to_string()))?;
        link.check_available(now_millis())?;
        Ok(link)
    }

    /// Count one use and mint a PENDING order from the template. The use is
    /// given back if minting fails.
    pub async fn use_link(&self, link_id: &str) -> Result<CreatedPayment, GatewayError> {
        let link = match self.store.claim_use(link_id, now_millis()).await {
            Ok(link) => link,
            Err(StoreError::LinkUnavailable(reason)) => {
                metrics::record_link_use("rejected");
                return Err(reason.into());
            }
            Err(StoreError::NotFound(_)) => {
                return Err(GatewayError::NotFound("Payment link not found".to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let minted = self
            .payments
            .create_order(NewPayment {
                upi_id: link.upi_id.clone(),
                amount: link.amount,
                message: Some(link.description.clone()),
                order_id: None,
                webhook_url: None,
                api_key_id: None,
                source: OrderSource::PaymentLink,
            })
            .await;

        match minted {
            Ok(created) => {
                metrics::record_link_use("minted");
                audit::record(
                    AuditAction::PaymentLinkUsed,
                    Some(&link.link_id),
                    format!(
                        "Order {} (use {} of {})",
                        created.transaction.order_id,
                        link.use_count,
                        link.max_uses
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "unlimited".to_string())
                    ),
                );
                Ok(created)
            }
            Err(e) => {
                if let Err(release_err) = self.store.release_use(link_id).await {
                    tracing::error!(
                        link_id = %link_id,
                        error = %release_err,
                        "Failed to release payment link use"
                    );
                }
                metrics::record_link_use("failed");
                Err(e)
            }
        }
    }
}
