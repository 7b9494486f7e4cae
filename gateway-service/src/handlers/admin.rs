use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use service_core::error::AppError;

use super::parse_query;
use crate::dtos::admin::{
    AdminVerifyResponse, ApiKeyListResponse, ApiKeySummary, CreateApiKeyRequest,
    CreateApiKeyResponse, LoginRequest, LoginResponse, StatsResponse, ToggleApiKeyResponse,
    TransactionListQuery, TransactionListResponse,
};
use crate::dtos::MessageResponse;
use crate::middleware::CurrentAdmin;
use crate::models::now_millis;
use crate::services::GatewayError;
use crate::startup::AppState;
use crate::storage::TransactionQuery;
use crate::utils::ValidatedJson;

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let session = state
        .admin
        .login(&payload.username, &payload.password)
        .await?;

    tracing::info!(username = %session.username, "Admin session issued");
    Ok(Json(LoginResponse::from(session)))
}

pub async fn verify(CurrentAdmin(admin): CurrentAdmin) -> Json<AdminVerifyResponse> {
    Json(AdminVerifyResponse {
        success: true,
        username: admin.username,
    })
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<ApiKeyListResponse>, AppError> {
    let now = now_millis();
    let keys = state.api_keys.list().await?;

    Ok(Json(ApiKeyListResponse {
        success: true,
        api_keys: keys
            .into_iter()
            .map(|key| ApiKeySummary::new(key, now))
            .collect(),
    }))
}

pub async fn create_api_key(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    ValidatedJson(payload): ValidatedJson<CreateApiKeyRequest>,
) -> Result<Json<CreateApiKeyResponse>, AppError> {
    let issued = state
        .api_keys
        .issue(&payload.owner_name, payload.expiry_days)
        .await?;

    tracing::info!(
        key_id = %issued.record.key_id,
        owner_name = %issued.record.owner_name,
        admin = %admin.username,
        "API key issued"
    );

    Ok(Json(CreateApiKeyResponse::from(issued)))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.api_keys.revoke(&key_id).await?;
    Ok(Json(MessageResponse::new("API key deleted successfully")))
}

pub async fn toggle_api_key(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<ToggleApiKeyResponse>, AppError> {
    let updated = state.api_keys.toggle_active(&key_id).await?;
    Ok(Json(ToggleApiKeyResponse::new(updated.is_active)))
}

/// Newest first, optionally filtered by status.
pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    query: Result<Query<TransactionListQuery>, QueryRejection>,
) -> Result<Json<TransactionListResponse>, AppError> {
    let query = parse_query(query)?;
    let (page, per_page) = (query.page(), query.per_page());

    let result = state
        .stores
        .transactions
        .list(&TransactionQuery {
            status: query.status,
            page,
            per_page,
        })
        .await
        .map_err(GatewayError::from)?;

    Ok(Json(TransactionListResponse::new(result, page, per_page)))
}

pub async fn stats(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<StatsResponse>, AppError> {
    let txns = state
        .stores
        .transactions
        .stats()
        .await
        .map_err(GatewayError::from)?;
    let keys = state.api_keys.counts().await?;

    Ok(Json(StatsResponse::new(txns, keys)))
}
