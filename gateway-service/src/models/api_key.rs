use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use super::optional_datetime;

/// Developer API key. Only the SHA-256 of the plaintext is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(rename = "_id")]
    pub key_id: String,
    pub hashed_secret: String,
    /// First characters of the plaintext, for display.
    pub key_prefix: String,
    pub owner_name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub usage_count: i64,
    #[serde(default, with = "optional_datetime")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
