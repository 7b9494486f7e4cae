use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::payments::{
    GenerateQrRequest, GenerateQrResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::middleware::CurrentCaller;
use crate::services::audit::{self, AuditAction};
use crate::services::{ApiIdentity, NewPayment, OrderSource};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// Mint a PENDING order and its UPI QR code.
pub async fn generate_qr(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    ValidatedJson(payload): ValidatedJson<GenerateQrRequest>,
) -> Result<Json<GenerateQrResponse>, AppError> {
    let source = match caller {
        ApiIdentity::Demo => OrderSource::Demo,
        ApiIdentity::Key(_) => OrderSource::ApiKey,
    };

    let created = state
        .payments
        .create_order(NewPayment {
            upi_id: payload.upi,
            amount: payload.amount.value()?,
            message: payload.message,
            order_id: payload.order_id,
            webhook_url: payload.webhook_url,
            api_key_id: caller.api_key_id().map(str::to_string),
            source,
        })
        .await?;

    tracing::info!(
        order_id = %created.transaction.order_id,
        amount = created.transaction.amount,
        source = source.as_str(),
        "Payment order created"
    );

    Ok(Json(GenerateQrResponse::from(created)))
}

/// Check the merchant pair and return the (possibly just decided) outcome.
pub async fn verify_payment(
    State(state): State<AppState>,
    CurrentCaller(_caller): CurrentCaller,
    ValidatedJson(payload): ValidatedJson<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let txn = state
        .verification
        .verify(&payload.order_id, &payload.merchant_id, &payload.merchant_key)
        .await?;

    audit::record(
        AuditAction::PaymentVerified,
        Some(&txn.order_id),
        format!("Status: {}", txn.status),
    );

    Ok(Json(VerifyPaymentResponse::from(txn)))
}
