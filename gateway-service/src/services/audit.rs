//! Security audit trail.
//!
//! Events go to the `audit` tracing target so they can be routed or filtered
//! separately (`RUST_LOG=audit=info`).

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    AdminLoginSuccess,
    AdminLoginFailed,
    ApiKeyCreated,
    ApiKeyDeleted,
    ApiKeyToggled,
    ApiKeyMissing,
    ApiKeyInvalid,
    ApiKeyInactive,
    ApiKeyExpired,
    DemoModeAccess,
    TransactionCreated,
    PaymentVerified,
    PaymentLinkCreated,
    PaymentLinkUsed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AdminLoginSuccess => "ADMIN_LOGIN_SUCCESS",
            AuditAction::AdminLoginFailed => "ADMIN_LOGIN_FAILED",
            AuditAction::ApiKeyCreated => "API_KEY_CREATED",
            AuditAction::ApiKeyDeleted => "API_KEY_DELETED",
            AuditAction::ApiKeyToggled => "API_KEY_TOGGLED",
            AuditAction::ApiKeyMissing => "API_KEY_MISSING",
            AuditAction::ApiKeyInvalid => "API_KEY_INVALID",
            AuditAction::ApiKeyInactive => "API_KEY_INACTIVE",
            AuditAction::ApiKeyExpired => "API_KEY_EXPIRED",
            AuditAction::DemoModeAccess => "DEMO_MODE_ACCESS",
            AuditAction::TransactionCreated => "TRANSACTION_CREATED",
            AuditAction::PaymentVerified => "PAYMENT_VERIFIED",
            AuditAction::PaymentLinkCreated => "PAYMENT_LINK_CREATED",
            AuditAction::PaymentLinkUsed => "PAYMENT_LINK_USED",
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::AdminLoginSuccess | AuditAction::AdminLoginFailed => "ADMIN",
            AuditAction::TransactionCreated | AuditAction::PaymentVerified => "TRANSACTION",
            AuditAction::PaymentLinkCreated | AuditAction::PaymentLinkUsed => "PAYMENT_LINK",
            _ => "API_KEY",
        }
    }

    /// Failed or rejected attempts are logged at warn.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuditAction::AdminLoginFailed
                | AuditAction::ApiKeyMissing
                | AuditAction::ApiKeyInvalid
                | AuditAction::ApiKeyInactive
                | AuditAction::ApiKeyExpired
        )
    }
}

pub fn record(action: AuditAction, entity_id: Option<&str>, details: impl Display) {
    let entity_id = entity_id.unwrap_or("-");
    if action.is_rejection() {
        tracing::warn!(
            target: "audit",
            action = action.as_str(),
            entity_type = action.entity_type(),
            entity_id = %entity_id,
            details = %details,
            "Security event"
        );
    } else {
        tracing::info!(
            target: "audit",
            action = action.as_str(),
            entity_type = action.entity_type(),
            entity_id = %entity_id,
            details = %details,
            "Audit event"
        );
    }
}
