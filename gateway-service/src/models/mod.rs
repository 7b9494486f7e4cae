pub mod api_key;
pub mod payment_link;
pub mod transaction;

pub use api_key::ApiKey;
pub use payment_link::{LinkUnavailable, PaymentLink, DEFAULT_LINK_DESCRIPTION};
pub use transaction::{AlreadyDecided, Settlement, Transaction, TransactionStatus, DEFAULT_MESSAGE};

/// BSON datetime (de)serialization for optional chrono timestamps.
///
/// `None` is stored as BSON `null` so that `{ field: null }` filters match it.
pub(crate) mod optional_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}

/// Current time truncated to the millisecond precision BSON can store, so
/// records read back from either backend compare equal to what was written.
pub fn now_millis() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(3)
}
