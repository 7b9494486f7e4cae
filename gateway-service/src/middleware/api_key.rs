use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use service_core::error::AppError;
use service_core::middleware::rate_limit::{check_keyed, client_ip};

use crate::services::{authenticate, ApiIdentity};
use crate::startup::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
struct ApiKeyParam {
    api_key: Option<String>,
}

/// `X-API-Key` header first, then the `api_key` query parameter.
fn presented_key(req: &Request) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        return Some(value.to_string());
    }

    req.uri()
        .query()
        .and_then(|query| serde_urlencoded::from_str::<ApiKeyParam>(query).ok())
        .and_then(|param| param.api_key)
}

/// Require a developer API key (or the demo sentinel) and apply the caller's
/// rate-limit bucket.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = presented_key(&req);
    let identity = authenticate(state.api_keys.as_ref(), presented.as_deref()).await?;

    match &identity {
        ApiIdentity::Demo => {
            let ip = client_ip(&req, state.config.rate_limit.trust_forwarded_for)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            check_keyed(
                &state.demo_limiter,
                &format!("demo:{}", ip),
                "Demo mode rate limit exceeded. Please try again later.",
            )?;
        }
        ApiIdentity::Key(key) => {
            check_keyed(
                &state.key_limiter,
                &key.key_id,
                "API key rate limit exceeded. Please try again later.",
            )
            .inspect_err(|_| tracing::warn!(key_id = %key.key_id, "API key rate limit exceeded"))?;
        }
    }

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Extractor for the caller authenticated by `api_key_middleware`.
pub struct CurrentCaller(pub ApiIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<ApiIdentity>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "API identity missing from request extensions"
            ))
        })?;

        Ok(CurrentCaller(identity.clone()))
    }
}
