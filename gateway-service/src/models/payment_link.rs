use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use super::optional_datetime;

pub const DEFAULT_LINK_DESCRIPTION: &str = "Payment";

/// Why a payment link cannot mint another transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkUnavailable {
    #[error("Payment link is inactive")]
    Inactive,
    #[error("Payment link has expired")]
    Expired,
    #[error("Payment link has reached its maximum number of uses")]
    Exhausted,
}

/// Reusable payment template. Each use mints a fresh transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    #[serde(rename = "_id")]
    pub link_id: String,
    pub api_key_id: Option<String>,
    pub upi_id: String,
    pub amount: f64,
    pub description: String,
    pub max_uses: Option<i64>,
    pub use_count: i64,
    #[serde(default, with = "optional_datetime")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn check_available(&self, now: DateTime<Utc>) -> Result<(), LinkUnavailable> {
        if !self.is_active {
            return Err(LinkUnavailable::Inactive);
        }
        if self.expires_at.is_some_and(|expires_at| now >= expires_at) {
            return Err(LinkUnavailable::Expired);
        }
        if self.max_uses.is_some_and(|max| self.use_count >= max) {
            return Err(LinkUnavailable::Exhausted);
        }
        Ok(())
    }

    /// Check every cap and count one use. Callers hold the record lock.
    pub fn claim_use(&mut self, now: DateTime<Utc>) -> Result<(), LinkUnavailable> {
        self.check_available(now)?;
        self.use_count += 1;
        Ok(())
    }

    pub fn release_use(&mut self) {
        self.use_count = (self.use_count - 1).max(0);
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::link;
    use super::*;
    use chrono::Duration;

    #[test]
    fn max_uses_caps_claims() {
        let now = Utc::now();
        let mut l = link("link_a", Some(2));

        assert!(l.claim_use(now).is_ok());
        assert!(l.claim_use(now).is_ok());
        assert_eq!(l.claim_use(now), Err(LinkUnavailable::Exhausted));
        assert_eq!(l.use_count, 2);
    }

    #[test]
    fn expired_link_is_rejected_before_counting() {
        let now = Utc::now();
        let mut l = link("link_b", None);
        l.expires_at = Some(now - Duration::seconds(1));

        assert_eq!(l.claim_use(now), Err(LinkUnavailable::Expired));
        assert_eq!(l.use_count, 0);
    }

    #[test]
    fn inactive_wins_over_other_caps() {
        let mut l = link("link_c", Some(0));
        l.is_active = false;
        assert_eq!(l.check_available(Utc::now()), Err(LinkUnavailable::Inactive));
    }

    #[test]
    fn release_never_goes_negative() {
        let mut l = link("link_d", None);
        l.release_use();
        assert_eq!(l.use_count, 0);
    }
}
