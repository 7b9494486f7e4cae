//! Identifier and reference generation.
//!
//! Secrets (merchant keys, API keys, link ids) come from the OS RNG. Order
//! ids are only unique with high probability; the store rejects duplicates.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};

pub const API_KEY_PREFIX: &str = "bpay_";
/// Characters of the plaintext key kept for display.
pub const KEY_DISPLAY_LEN: usize = 12;
pub const MAX_ORDER_ID_LEN: usize = 100;

fn digits(len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

pub fn new_order_id(now: DateTime<Utc>) -> String {
    format!(
        "BHARAT_ORD_{}_{}",
        now.timestamp(),
        rand::thread_rng().gen_range(1000..=9999)
    )
}

pub fn new_merchant_id() -> String {
    let suffix: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("BHARAT_{}", suffix)
}

pub fn new_merchant_key() -> String {
    format!("BHARAT_KEY_{}", digits(12))
}

pub fn new_api_key() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, hex::encode(bytes))
}

pub fn new_link_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("link_{}", URL_SAFE_NO_PAD.encode(bytes))
}

pub fn new_bharatpay_reference(now: DateTime<Utc>) -> String {
    format!(
        "BHARAT{}{}",
        now.timestamp(),
        rand::thread_rng().gen_range(100_000..=999_999)
    )
}

pub fn new_bank_reference() -> String {
    format!("BANK{}", rand::thread_rng().gen_range(100_000_000..=999_999_999))
}

/// Caller-supplied order ids: 1..=100 chars of `[A-Za-z0-9_-]`.
pub fn validate_order_id(order_id: &str) -> Result<(), String> {
    if order_id.is_empty() || order_id.len() > MAX_ORDER_ID_LEN {
        return Err(format!(
            "order_id must be between 1 and {} characters",
            MAX_ORDER_ID_LEN
        ));
    }
    if !order_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("order_id may only contain letters, digits, '_' and '-'".to_string());
    }
    Ok(())
}
