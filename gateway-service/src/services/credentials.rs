//! Shared contract for the two credential gates: developer API keys and
//! admin session tokens.

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API key required. Provide X-API-Key header or api_key parameter")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API key is inactive")]
    InactiveApiKey,

    #[error("API key has expired")]
    ExpiredApiKey,

    #[error("Admin authentication required")]
    MissingToken,

    #[error("Invalid or expired admin token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Credential store error: {0}")]
    Storage(anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(e) => AppError::DatabaseError(e),
            other => AppError::Unauthorized(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Validates a presented credential and yields the caller identity.
#[async_trait]
pub trait CredentialAuthority: Send + Sync {
    type Credential: ?Sized + Sync;
    type Identity: Send;

    /// Error returned when the request carries no credential at all.
    fn missing() -> AuthError;

    async fn validate(&self, credential: &Self::Credential) -> Result<Self::Identity, AuthError>;
}

/// Resolve an optional presented credential through `authority`.
pub async fn authenticate<A>(authority: &A, presented: Option<&str>) -> Result<A::Identity, AuthError>
where
    A: CredentialAuthority<Credential = str>,
{
    match presented.map(str::trim).filter(|c| !c.is_empty()) {
        Some(credential) => authority.validate(credential).await,
        None => Err(A::missing()),
    }
}
