use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::services::{authenticate, AdminIdentity};
use crate::startup::AppState;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Require a valid admin session token.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(state.admin.as_ref(), bearer_token(&req)).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Extractor for the admin authenticated by `admin_auth_middleware`.
pub struct CurrentAdmin(pub AdminIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<AdminIdentity>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Admin identity missing from request extensions"
            ))
        })?;

        Ok(CurrentAdmin(identity.clone()))
    }
}
