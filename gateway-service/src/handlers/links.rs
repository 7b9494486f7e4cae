use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::dtos::links::{CreatePaymentLinkRequest, CreatePaymentLinkResponse, PublicPayResponse};
use crate::middleware::CurrentCaller;
use crate::models::PaymentLink;
use crate::services::{GatewayError, NewPaymentLink};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

pub async fn create_payment_link(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    ValidatedJson(payload): ValidatedJson<CreatePaymentLinkRequest>,
) -> Result<Json<CreatePaymentLinkResponse>, AppError> {
    let link = state
        .links
        .create(NewPaymentLink {
            upi_id: payload.upi,
            amount: payload.amount.value()?,
            description: payload.description,
            max_uses: payload.max_uses,
            expires_in_hours: payload.expires_in_hours,
            api_key_id: caller.api_key_id().map(str::to_string),
        })
        .await?;

    tracing::info!(link_id = %link.link_id, amount = link.amount, "Payment link created");

    Ok(Json(CreatePaymentLinkResponse::new(
        link,
        &state.config.public_base_url(),
    )))
}

/// Public, unauthenticated: mint an order from a link.
pub async fn public_pay(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Json<PublicPayResponse>, AppError> {
    let created = state.links.use_link(&link_id).await?;
    Ok(Json(PublicPayResponse::from(created)))
}

#[derive(Template)]
#[template(path = "pay.html")]
pub struct PaymentPageTemplate {
    pub link_id: String,
    /// Rupees, two decimals.
    pub amount: String,
    pub description: String,
}

impl From<&PaymentLink> for PaymentPageTemplate {
    fn from(link: &PaymentLink) -> Self {
        Self {
            link_id: link.link_id.clone(),
            amount: format!("{:.2}", link.amount),
            description: link.description.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessagePageTemplate {
    pub message: String,
}

impl MessagePageTemplate {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public payment page for a link.
pub async fn payment_page(State(state): State<AppState>, Path(link_id): Path<String>) -> Response {
    match state.links.get_usable(&link_id).await {
        Ok(link) => PaymentPageTemplate::from(&link).into_response(),
        Err(GatewayError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            MessagePageTemplate::new("Payment link not found"),
        )
            .into_response(),
        Err(GatewayError::LinkUnavailable(reason)) => (
            StatusCode::BAD_REQUEST,
            MessagePageTemplate::new(reason.to_string()),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
