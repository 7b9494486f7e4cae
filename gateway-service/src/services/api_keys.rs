use async_trait::async_trait;
use chrono::Duration;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::audit::{self, AuditAction};
use super::credentials::{AuthError, CredentialAuthority};
use super::error::GatewayError;
use super::{ids, metrics};
use crate::models::{now_millis, ApiKey};
use crate::storage::{ApiKeyCounts, ApiKeyStore, StoreError};

pub const MAX_OWNER_NAME_LEN: usize = 100;
pub const MAX_EXPIRY_DAYS: i64 = 3650;

/// Who is calling the developer API.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiIdentity {
    /// The configured demo sentinel. Has no key record.
    Demo,
    Key(ApiKey),
}

impl ApiIdentity {
    pub fn api_key_id(&self) -> Option<&str> {
        match self {
            ApiIdentity::Demo => None,
            ApiIdentity::Key(key) => Some(&key.key_id),
        }
    }
}

/// Plaintext is only ever returned here, once.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub plaintext: String,
    pub record: ApiKey,
}

pub fn hash_key(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

pub struct ApiKeyAuthority {
    store: Arc<dyn ApiKeyStore>,
    demo_key: Option<String>,
}

impl ApiKeyAuthority {
    /// `demo_key` of `None` disables the demo bypass.
    pub fn new(store: Arc<dyn ApiKeyStore>, demo_key: Option<String>) -> Self {
        Self {
            store,
            demo_key: demo_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub async fn issue(&self, owner_name: &str, expiry_days: i64) -> Result<IssuedKey, GatewayError> {
        let owner_name = owner_name.trim();
        if owner_name.is_empty() || owner_name.chars().count() > MAX_OWNER_NAME_LEN {
            return Err(GatewayError::validation(format!(
                "owner_name must be between 1 and {} characters",
                MAX_OWNER_NAME_LEN
            )));
        }
        if !(1..=MAX_EXPIRY_DAYS).contains(&expiry_days) {
            return Err(GatewayError::validation(format!(
                "expiry_days must be between 1 and {}",
                MAX_EXPIRY_DAYS
            )));
        }

        let plaintext = ids::new_api_key();
        let now = now_millis();
        let record = ApiKey {
            key_id: Uuid::new_v4().to_string(),
            hashed_secret: hash_key(&plaintext),
            key_prefix: plaintext.chars().take(ids::KEY_DISPLAY_LEN).collect(),
            owner_name: owner_name.to_string(),
            created_at: now,
            expires_at: now + Duration::days(expiry_days),
            is_active: true,
            usage_count: 0,
            last_used_at: None,
        };

        self.store.insert(record.clone()).await?;
        audit::record(
            AuditAction::ApiKeyCreated,
            Some(&record.key_id),
            format!("Created for {}", record.owner_name),
        );

        Ok(IssuedKey { plaintext, record })
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, GatewayError> {
        Ok(self.store.list().await?)
    }

    pub async fn revoke(&self, key_id: &str) -> Result<ApiKey, GatewayError> {
        let deleted = self.store.delete(key_id).await?;
        audit::record(
            AuditAction::ApiKeyDeleted,
            Some(key_id),
            format!("Deleted key for {}", deleted.owner_name),
        );
        Ok(deleted)
    }

    pub async fn toggle_active(&self, key_id: &str) -> Result<ApiKey, GatewayError> {
        let updated = self.store.toggle_active(key_id).await?;
        audit::record(
            AuditAction::ApiKeyToggled,
            Some(key_id),
            if updated.is_active {
                "Set to active"
            } else {
                "Set to inactive"
            },
        );
        Ok(updated)
    }

    pub async fn counts(&self) -> Result<ApiKeyCounts, GatewayError> {
        Ok(self.store.counts().await?)
    }

    fn reject(action: AuditAction, key_id: Option<&str>, err: AuthError) -> AuthError {
        let reason = match &err {
            AuthError::InactiveApiKey => "inactive",
            AuthError::ExpiredApiKey => "expired",
            AuthError::MissingApiKey => "missing",
            _ => "invalid",
        };
        metrics::record_api_key_rejected(reason);
        audit::record(action, key_id, &err);
        err
    }
}

#[async_trait]
impl CredentialAuthority for ApiKeyAuthority {
    type Credential = str;
    type Identity = ApiIdentity;

    fn missing() -> AuthError {
        Self::reject(AuditAction::ApiKeyMissing, None, AuthError::MissingApiKey)
    }

    async fn validate(&self, presented: &str) -> Result<ApiIdentity, AuthError> {
        if self.demo_key.as_deref() == Some(presented) {
            audit::record(AuditAction::DemoModeAccess, Some("demo"), "Demo mode API access");
            return Ok(ApiIdentity::Demo);
        }

        let key = self
            .store
            .find_by_hash(&hash_key(presented))
            .await
            .map_err(|e| AuthError::Storage(e.into()))?
            .ok_or_else(|| {
                Self::reject(AuditAction::ApiKeyInvalid, None, AuthError::InvalidApiKey)
            })?;

        if !key.is_active {
            return Err(Self::reject(
                AuditAction::ApiKeyInactive,
                Some(&key.key_id),
                AuthError::InactiveApiKey,
            ));
        }

        let now = now_millis();
        if key.is_expired_at(now) {
            return Err(Self::reject(
                AuditAction::ApiKeyExpired,
                Some(&key.key_id),
                AuthError::ExpiredApiKey,
            ));
        }

        match self.store.record_usage(&key.key_id, now).await {
            Ok(()) => {}
            // Revoked between lookup and use.
            Err(StoreError::NotFound(_)) => {
                return Err(Self::reject(
                    AuditAction::ApiKeyInvalid,
                    Some(&key.key_id),
                    AuthError::InvalidApiKey,
                ))
            }
            Err(e) => return Err(AuthError::Storage(e.into())),
        }

        Ok(ApiIdentity::Key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credentials::authenticate;
    use crate::storage::MemoryStore;

    fn setup(demo: Option<&str>) -> (Arc<MemoryStore>, ApiKeyAuthority) {
        let store = Arc::new(MemoryStore::default());
        let authority = ApiKeyAuthority::new(store.clone(), demo.map(str::to_string));
        (store, authority)
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn issued_key_validates_and_counts_usage() {
        let (store, authority) = setup(None);
        let issued = authority.issue("Acme", 30).await.unwrap();

        assert!(issued.plaintext.starts_with("bpay_"));
        assert_eq!(issued.record.key_prefix, &issued.plaintext[..12]);
        assert_ne!(issued.record.hashed_secret, issued.plaintext);

        let identity = authority.validate(&issued.plaintext).await.unwrap();
        assert_eq!(identity.api_key_id(), Some(issued.record.key_id.as_str()));

        let stored = store
            .find_by_hash(&issued.record.hashed_secret)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.usage_count, 1);
        assert!(stored.last_used_at.is_some());
    }

    #[tokio::test]
    async fn unknown_inactive_and_expired_keys_are_rejected() {
        let (store, authority) = setup(None);

        assert!(matches!(
            authority.validate("bpay_nope").await,
            Err(AuthError::InvalidApiKey)
        ));

        let issued = authority.issue("Acme", 30).await.unwrap();
        authority.toggle_active(&issued.record.key_id).await.unwrap();
        assert!(matches!(
            authority.validate(&issued.plaintext).await,
            Err(AuthError::InactiveApiKey)
        ));

        let mut expired = authority.issue("Old", 1).await.unwrap().record;
        let plaintext = "bpay_expired-for-test".to_string();
        ApiKeyStore::delete(store.as_ref(), &expired.key_id).await.unwrap();
        expired.hashed_secret = hash_key(&plaintext);
        expired.expires_at = now_millis() - Duration::days(1);
        ApiKeyStore::insert(store.as_ref(), expired).await.unwrap();
        assert!(matches!(
            authority.validate(&plaintext).await,
            Err(AuthError::ExpiredApiKey)
        ));
    }

    #[tokio::test]
    async fn demo_sentinel_maps_to_demo_identity() {
        let (_, authority) = setup(Some("demo-mode"));
        assert_eq!(
            authority.validate("demo-mode").await.unwrap(),
            ApiIdentity::Demo
        );

        let (_, disabled) = setup(Some(""));
        assert!(matches!(
            disabled.validate("demo-mode").await,
            Err(AuthError::InvalidApiKey)
        ));
    }

    #[tokio::test]
    async fn missing_credential_is_reported() {
        let (_, authority) = setup(None);
        assert!(matches!(
            authenticate(&authority, None).await,
            Err(AuthError::MissingApiKey)
        ));
        assert!(matches!(
            authenticate(&authority, Some("  ")).await,
            Err(AuthError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn issue_validates_inputs() {
        let (_, authority) = setup(None);
        assert!(matches!(
            authority.issue("  ", 30).await,
            Err(GatewayError::Validation(_))
        ));
        assert!(matches!(
            authority.issue("Acme", 0).await,
            Err(GatewayError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn revoke_unknown_key_is_not_found() {
        let (_, authority) = setup(None);
        assert!(matches!(
            authority.revoke("missing").await,
            Err(GatewayError::NotFound(msg)) if msg == "API key not found"
        ));
    }
}
