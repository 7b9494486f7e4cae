pub mod admin;
pub mod api_key;

pub use admin::{admin_auth_middleware, CurrentAdmin};
pub use api_key::{api_key_middleware, CurrentCaller, API_KEY_HEADER};
