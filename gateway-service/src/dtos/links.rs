use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AmountInput;
use crate::models::PaymentLink;
use crate::services::CreatedPayment;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentLinkRequest {
    #[validate(length(min = 1, max = 100, message = "upi must be between 1 and 100 characters"))]
    pub upi: String,
    pub amount: AmountInput,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "max_uses must be at least 1"))]
    pub max_uses: Option<i64>,
    #[validate(range(min = 1, message = "expires_in_hours must be at least 1"))]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentLinkResponse {
    pub success: bool,
    pub link_id: String,
    pub payment_url: String,
    pub amount: f64,
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
}

impl CreatePaymentLinkResponse {
    pub fn new(link: PaymentLink, base_url: &str) -> Self {
        Self {
            success: true,
            payment_url: format!("{}/pay/{}", base_url, link.link_id),
            link_id: link.link_id,
            amount: link.amount,
            description: link.description,
            expires_at: link.expires_at,
            max_uses: link.max_uses,
        }
    }
}

/// Order minted from a public link. No `qr_data`: the page only shows the image.
#[derive(Debug, Serialize)]
pub struct PublicPayResponse {
    pub success: bool,
    pub order_id: String,
    pub merchant_id: String,
    pub merchant_key: String,
    pub qr_code: String,
    pub amount: f64,
}

impl From<CreatedPayment> for PublicPayResponse {
    fn from(created: CreatedPayment) -> Self {
        let txn = created.transaction;
        Self {
            success: true,
            order_id: txn.order_id,
            merchant_id: txn.merchant_id,
            merchant_key: txn.merchant_key,
            qr_code: created.qr_code,
            amount: txn.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment_link::fixtures::link;

    #[test]
    fn payment_url_joins_base_and_id() {
        let response = CreatePaymentLinkResponse::new(link("link_abc", Some(3)), "https://pay.example");
        assert_eq!(response.payment_url, "https://pay.example/pay/link_abc");
        assert_eq!(response.max_uses, Some(3));

        let body = serde_json::to_value(&response).unwrap();
        assert!(body["expires_at"].is_null());
    }
}
