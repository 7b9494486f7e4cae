use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::audit::{self, AuditAction};
use super::credentials::{AuthError, CredentialAuthority};
use crate::config::AdminConfig;
use crate::utils::password::{hash_password, verify_password, PasswordHashString};

/// Admin sessions have a fixed absolute lifetime and are not refreshed.
pub const ADMIN_SESSION_HOURS: i64 = 24;

/// Claims of an admin session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub access_token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminIdentity {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Single configured administrator with stateless HS256 sessions.
pub struct AdminAuthority {
    username: String,
    password_hash: PasswordHashString,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AdminAuthority {
    /// Hashes the configured password; the plaintext is not retained.
    pub fn new(config: &AdminConfig) -> Result<Self, anyhow::Error> {
        let password_hash = hash_password(&config.password)?;
        let secret = config.jwt_secret.expose_secret().as_bytes();

        tracing::info!(username = %config.username, "Admin authority initialized");

        Ok(Self {
            username: config.username.clone(),
            password_hash,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AdminSession, AuthError> {
        let user_ok: bool = self.username.as_bytes().ct_eq(username.as_bytes()).into();

        // The hash check runs even when the username is wrong.
        let hash = self.password_hash.clone();
        let password = password.to_string();
        let password_ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash).is_ok())
            .await
            .map_err(|e| AuthError::Storage(anyhow::anyhow!("Password check failed: {}", e)))?;

        if !(user_ok && password_ok) {
            audit::record(
                AuditAction::AdminLoginFailed,
                Some(username),
                "Invalid credentials",
            );
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_token(Utc::now())?;
        audit::record(
            AuditAction::AdminLoginSuccess,
            Some(&session.username),
            "Admin logged in",
        );
        Ok(session)
    }

    fn issue_token(&self, now: DateTime<Utc>) -> Result<AdminSession, AuthError> {
        let exp = now + Duration::hours(ADMIN_SESSION_HOURS);
        let claims = AdminClaims {
            sub: self.username.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Storage(anyhow::anyhow!("Failed to sign admin token: {}", e)))?;

        Ok(AdminSession {
            access_token,
            username: self.username.clone(),
            expires_at: timestamp_to_utc(claims.exp),
        })
    }
}

fn timestamp_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl CredentialAuthority for AdminAuthority {
    type Credential = str;
    type Identity = AdminIdentity;

    fn missing() -> AuthError {
        AuthError::MissingToken
    }

    async fn validate(&self, token: &str) -> Result<AdminIdentity, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<AdminClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Admin token rejected");
            AuthError::InvalidToken
        })?;

        if data.claims.sub != self.username {
            return Err(AuthError::InvalidToken);
        }

        Ok(AdminIdentity {
            username: data.claims.sub,
            expires_at: timestamp_to_utc(data.claims.exp),
        })
    }
}
