pub mod admin;
pub mod api_keys;
pub mod audit;
pub mod credentials;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod payment_links;
pub mod payments;
pub mod upi;
pub mod verification;

pub use admin::{AdminAuthority, AdminIdentity, AdminSession};
pub use api_keys::{ApiIdentity, ApiKeyAuthority, IssuedKey};
pub use credentials::{authenticate, AuthError, CredentialAuthority};
pub use error::GatewayError;
pub use payment_links::{NewPaymentLink, PaymentLinkService};
pub use payments::{CreatedPayment, NewPayment, OrderSource, PaymentService};
pub use upi::{PngQrRenderer, QrRenderer, UpiUri};
pub use verification::{RandomSettlement, SettlementPolicy, VerificationEngine};
