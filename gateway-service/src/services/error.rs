use service_core::error::AppError;
use thiserror::Error;

use crate::models::LinkUnavailable;
use crate::services::credentials::AuthError;
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Order ID already exists: {0}")]
    DuplicateOrder(String),

    #[error(transparent)]
    LinkUnavailable(#[from] LinkUnavailable),

    #[error("QR rendering failed: {0}")]
    Render(anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateOrder(order_id) => GatewayError::DuplicateOrder(order_id),
            StoreError::NotFound(kind) => GatewayError::NotFound(format!("{} not found", kind)),
            StoreError::LinkUnavailable(reason) => GatewayError::LinkUnavailable(reason),
            StoreError::Backend(e) => GatewayError::Storage(e),
            err @ StoreError::AlreadyDecided { .. } => {
                GatewayError::Storage(anyhow::anyhow!(err.to_string()))
            }
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(e) => GatewayError::Storage(e),
            other => GatewayError::Unauthorized(other.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            GatewayError::Unauthorized(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            GatewayError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            err @ GatewayError::DuplicateOrder(_) => {
                AppError::BadRequest(anyhow::anyhow!(err.to_string()))
            }
            GatewayError::LinkUnavailable(reason) => AppError::BadRequest(anyhow::Error::new(reason)),
            GatewayError::Render(e) => AppError::InternalError(e.context("QR rendering failed")),
            GatewayError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}
