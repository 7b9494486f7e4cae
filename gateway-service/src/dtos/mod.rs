pub mod admin;
pub mod links;
pub mod payments;

use serde::{Deserialize, Serialize};

use crate::services::GatewayError;

/// Amount given either as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn value(&self) -> Result<f64, GatewayError> {
        match self {
            AmountInput::Number(n) => Ok(*n),
            AmountInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| GatewayError::validation("amount must be a number")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        amount: AmountInput,
    }

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        let n: Body = serde_json::from_str(r#"{"amount": 100}"#).unwrap();
        assert_eq!(n.amount.value().unwrap(), 100.0);

        let s: Body = serde_json::from_str(r#"{"amount": " 49.50 "}"#).unwrap();
        assert_eq!(s.amount.value().unwrap(), 49.5);

        let bad: Body = serde_json::from_str(r#"{"amount": "ten"}"#).unwrap();
        assert!(matches!(bad.amount.value(), Err(GatewayError::Validation(_))));
    }

    #[test]
    fn amount_rejects_other_json_types() {
        assert!(serde_json::from_str::<Body>(r#"{"amount": true}"#).is_err());
    }
}
