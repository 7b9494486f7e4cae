use std::sync::Arc;

use super::error::GatewayError;
use super::upi::{render_qr_base64, QrRenderer, UpiUri};
use super::{audit, ids, metrics};
use crate::models::{now_millis, Transaction, TransactionStatus, DEFAULT_MESSAGE};
use crate::storage::{StoreError, TransactionStore};

pub const MAX_UPI_ID_LEN: usize = 100;
pub const MAX_MESSAGE_LEN: usize = 255;
pub const MAX_WEBHOOK_URL_LEN: usize = 500;
/// Largest accepted amount, in rupees (one crore).
pub const MAX_AMOUNT: f64 = 10_000_000.0;
const MAX_GENERATED_ID_ATTEMPTS: u32 = 5;

/// Where an order came from; used for metrics and audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSource {
    ApiKey,
    Demo,
    PaymentLink,
}

impl OrderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::ApiKey => "api_key",
            OrderSource::Demo => "demo",
            OrderSource::PaymentLink => "payment_link",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub upi_id: String,
    pub amount: f64,
    pub message: Option<String>,
    pub order_id: Option<String>,
    pub webhook_url: Option<String>,
    pub api_key_id: Option<String>,
    pub source: OrderSource,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub transaction: Transaction,
    /// Base64 PNG of the QR code.
    pub qr_code: String,
}

/// `local@handle`, no whitespace.
pub fn validate_upi_id(upi_id: &str) -> Result<(), GatewayError> {
    if upi_id.is_empty() || upi_id.len() > MAX_UPI_ID_LEN {
        return Err(GatewayError::validation(format!(
            "upi must be between 1 and {} characters",
            MAX_UPI_ID_LEN
        )));
    }
    let valid_shape = match upi_id.split_once('@') {
        Some((local, handle)) => !local.is_empty() && !handle.is_empty() && !handle.contains('@'),
        None => false,
    };
    if !valid_shape || upi_id.chars().any(char::is_whitespace) {
        return Err(GatewayError::validation(
            "upi must be a UPI address like name@bank",
        ));
    }
    Ok(())
}

/// Positive, finite, at most `MAX_AMOUNT`, rounded to paise.
pub fn normalize_amount(amount: f64) -> Result<f64, GatewayError> {
    if !amount.is_finite() {
        return Err(GatewayError::validation("amount must be a finite number"));
    }
    if amount > MAX_AMOUNT {
        return Err(GatewayError::validation(format!(
            "amount must not exceed {:.2}",
            MAX_AMOUNT
        )));
    }
    let rounded = (amount * 100.0).round() / 100.0;
    if !rounded.is_finite() || rounded <= 0.0 {
        return Err(GatewayError::validation("amount must be greater than 0"));
    }
    Ok(rounded)
}

pub fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), GatewayError> {
    if value.chars().count() > max_len {
        return Err(GatewayError::validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

fn validate_webhook_url(url: &str) -> Result<(), GatewayError> {
    validate_text("webhook_url", url, MAX_WEBHOOK_URL_LEN)?;
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(GatewayError::validation(
            "webhook_url must be an http(s) URL",
        ));
    }
    Ok(())
}

/// Mints PENDING transactions with their UPI payload and QR image.
pub struct PaymentService {
    store: Arc<dyn TransactionStore>,
    renderer: Arc<dyn QrRenderer>,
    payee_name: String,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        renderer: Arc<dyn QrRenderer>,
        payee_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renderer,
            payee_name: payee_name.into(),
        }
    }

    pub async fn create_order(&self, request: NewPayment) -> Result<CreatedPayment, GatewayError> {
        let upi_id = request.upi_id.trim().to_string();
        validate_upi_id(&upi_id)?;
        let amount = normalize_amount(request.amount)?;

        let message = request
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        validate_text("message", &message, MAX_MESSAGE_LEN)?;

        let webhook_url = request
            .webhook_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if let Some(url) = &webhook_url {
            validate_webhook_url(url)?;
        }

        let caller_order_id = match request.order_id {
            Some(order_id) => {
                ids::validate_order_id(&order_id).map_err(GatewayError::Validation)?;
                Some(order_id)
            }
            None => None,
        };

        let merchant_id = ids::new_merchant_id();
        let merchant_key = ids::new_merchant_key();
        let mut attempt = 1;

        let (transaction, qr_code) = loop {
            let now = now_millis();
            let order_id = caller_order_id
                .clone()
                .unwrap_or_else(|| ids::new_order_id(now));

            let qr_data =
                UpiUri::new(&upi_id, &self.payee_name, amount, &message, &order_id).build()?;
            let qr_code = render_qr_base64(self.renderer.as_ref(), &qr_data)?;

            let transaction = Transaction {
                order_id,
                api_key_id: request.api_key_id.clone(),
                merchant_id: merchant_id.clone(),
                merchant_key: merchant_key.clone(),
                upi_id: upi_id.clone(),
                amount,
                message: message.clone(),
                qr_data,
                status: TransactionStatus::Pending,
                created_at: now,
                paid_at: None,
                bharatpay_reference: None,
                bank_reference: None,
                webhook_url: webhook_url.clone(),
            };

            match self.store.create(transaction.clone()).await {
                Ok(()) => break (transaction, qr_code),
                // Only generated ids are retried.
                Err(StoreError::DuplicateOrder(id))
                    if caller_order_id.is_none() && attempt < MAX_GENERATED_ID_ATTEMPTS =>
                {
                    tracing::debug!(order_id = %id, attempt, "Generated order id collided");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        metrics::record_order_created(request.source);
        audit::record(
            audit::AuditAction::TransactionCreated,
            Some(&transaction.order_id),
            format!("Amount: {:.2} via {}", amount, request.source.as_str()),
        );

        Ok(CreatedPayment {
            transaction,
            qr_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn service() -> (Arc<MemoryStore>, PaymentService) {
        let store = Arc::new(MemoryStore::default());
        let service = PaymentService::new(
            store.clone(),
            Arc::new(crate::services::upi::PngQrRenderer),
            "BharatPay_Merchant",
        );
        (store, service)
    }

    fn request(upi: &str, amount: f64) -> NewPayment {
        NewPayment {
            upi_id: upi.to_string(),
            amount,
            message: None,
            order_id: None,
            webhook_url: None,
            api_key_id: None,
            source: OrderSource::Demo,
        }
    }

    #[tokio::test]
    async fn creates_pending_order_whose_uri_round_trips() {
        let (_, service) = service();
        let created = service.create_order(request("a@b", 100.0)).await.unwrap();
        let txn = &created.transaction;

        assert_eq!(txn.status, TransactionStatus::Pending);
        assert_eq!(txn.message, DEFAULT_MESSAGE);
        assert!(!created.qr_code.is_empty());

        let uri = UpiUri::parse(&txn.qr_data).unwrap();
        assert_eq!(uri.pa, "a@b");
        assert_eq!(uri.amount().unwrap(), 100.0);
        assert_eq!(uri.tr, txn.order_id);
    }

    #[tokio::test]
    async fn generated_order_ids_are_unique() {
        let (store, service) = service();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..30 {
            let created = service.create_order(request("a@b", 1.0)).await.unwrap();
            assert!(created.transaction.order_id.starts_with("BHARAT_ORD_"));
            assert!(seen.insert(created.transaction.order_id));
        }
        assert_eq!(store.stats().await.unwrap().total, 30);
    }

    #[tokio::test]
    async fn duplicate_order_id_is_rejected() {
        let (store, service) = service();
        let mut first = request("a@b", 10.0);
        first.order_id = Some("INV-1".to_string());
        service.create_order(first).await.unwrap();

        let mut second = request("c@d", 99.0);
        second.order_id = Some("INV-1".to_string());
        let err = service.create_order(second).await.unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateOrder(id) if id == "INV-1"));

        let stored = TransactionStore::get(store.as_ref(), "INV-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.upi_id, "a@b");
        assert_eq!(stored.amount, 10.0);
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected() {
        let (_, service) = service();
        for (upi, amount) in [
            ("", 10.0),
            ("no-at-sign", 10.0),
            ("a@b", 0.0),
            ("a@b", -5.0),
            ("a@b", 0.001),
            ("a@b", f64::NAN),
            ("a@b", 1e307),
            ("a@b", f64::MAX),
            ("a@b", MAX_AMOUNT + 0.01),
        ] {
            let err = service.create_order(request(upi, amount)).await.unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)), "{} {}", upi, amount);
        }

        let mut bad_id = request("a@b", 1.0);
        bad_id.order_id = Some("has spaces".to_string());
        assert!(matches!(
            service.create_order(bad_id).await,
            Err(GatewayError::Validation(_))
        ));

        let mut bad_hook = request("a@b", 1.0);
        bad_hook.webhook_url = Some("ftp://example.com".to_string());
        assert!(matches!(
            service.create_order(bad_hook).await,
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn amounts_round_to_paise() {
        assert_eq!(normalize_amount(10.006).unwrap(), 10.01);
        assert_eq!(normalize_amount(99.999).unwrap(), 100.0);
    }

    #[test]
    fn amounts_are_capped_and_never_infinite() {
        assert_eq!(normalize_amount(MAX_AMOUNT).unwrap(), MAX_AMOUNT);
        for amount in [1e307, f64::MAX, f64::INFINITY, MAX_AMOUNT + 0.01] {
            assert!(
                matches!(normalize_amount(amount), Err(GatewayError::Validation(_))),
                "{}",
                amount
            );
        }
    }
}
