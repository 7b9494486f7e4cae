use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::observability::logging::LogFormat;

const DEV_ADMIN_PASSWORD: &str = "admin123";
const DEV_JWT_SECRET: &str = "bharatpay-dev-jwt-secret-change-me";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub service_name: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub upi: UpiConfig,
    pub settlement: SettlementConfig,
    pub api_keys: ApiKeyConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    /// Base used for payment link URLs. Falls back to `http://host:port`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: Secret<String>,
    pub jwt_secret: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpiConfig {
    pub payee_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    pub success_probability: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    /// Empty disables the demo bypass.
    #[serde(default)]
    pub demo_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub key_requests: u32,
    pub key_window_seconds: u64,
    pub demo_requests: u32,
    pub demo_window_seconds: u64,
    /// Key per-IP buckets on `X-Forwarded-For`. Enable only behind a proxy
    /// that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma separated; `*` allows any origin.
    pub allowed_origins: String,
}

impl CorsConfig {
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn allows_any(&self) -> bool {
        self.origins().iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl GatewayConfig {
    /// Defaults, then `configuration.*`, then `GATEWAY__SECTION__KEY`.
    pub fn load() -> Result<Self, AppError> {
        let config: GatewayConfig = core_config::load("GATEWAY", |b| {
            b.set_default("environment", "dev")?
                .set_default("service_name", "gateway-service")?
                .set_default("server.host", "0.0.0.0")?
                .set_default("server.port", 5000)?
                .set_default("storage.backend", "memory")?
                .set_default("storage.uri", "mongodb://localhost:27017")?
                .set_default("storage.database", "bharatpay")?
                .set_default("admin.username", "admin")?
                .set_default("admin.password", DEV_ADMIN_PASSWORD)?
                .set_default("admin.jwt_secret", DEV_JWT_SECRET)?
                .set_default("upi.payee_name", "BharatPay_Merchant")?
                .set_default("settlement.success_probability", 0.8)?
                .set_default("api_keys.demo_key", "demo-mode")?
                .set_default("rate_limit.login_attempts", 5)?
                .set_default("rate_limit.login_window_seconds", 60)?
                .set_default("rate_limit.key_requests", 300)?
                .set_default("rate_limit.key_window_seconds", 3600)?
                .set_default("rate_limit.demo_requests", 1000)?
                .set_default("rate_limit.demo_window_seconds", 3600)?
                .set_default("cors.allowed_origins", "*")?
                .set_default("logging.level", "info")?
                .set_default("logging.format", "json")
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.admin.username.trim().is_empty() {
            return Err(config_error("admin.username must not be empty"));
        }
        if self.admin.password.expose_secret().is_empty() {
            return Err(config_error("admin.password must not be empty"));
        }
        if self.admin.jwt_secret.expose_secret().len() < 16 {
            return Err(config_error("admin.jwt_secret must be at least 16 bytes"));
        }
        if !(0.0..=1.0).contains(&self.settlement.success_probability) {
            return Err(config_error(
                "settlement.success_probability must be between 0 and 1",
            ));
        }

        let limits = &self.rate_limit;
        if [limits.login_attempts, limits.key_requests, limits.demo_requests].contains(&0)
            || [
                limits.login_window_seconds,
                limits.key_window_seconds,
                limits.demo_window_seconds,
            ]
            .contains(&0)
        {
            return Err(config_error("rate limits and windows must be positive"));
        }

        if self.environment == Environment::Prod {
            if self.admin.password.expose_secret() == DEV_ADMIN_PASSWORD {
                return Err(config_error(
                    "GATEWAY__ADMIN__PASSWORD must be set in production",
                ));
            }
            if self.admin.jwt_secret.expose_secret() == DEV_JWT_SECRET {
                return Err(config_error(
                    "GATEWAY__ADMIN__JWT_SECRET must be set in production",
                ));
            }
            if self.cors.allows_any() {
                tracing::warn!("Wildcard CORS origin in production");
            }
        }

        Ok(())
    }

    /// `None` when the demo bypass is disabled.
    pub fn demo_key(&self) -> Option<String> {
        self.api_keys
            .demo_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.server.host, self.server.port),
        }
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_and_validate() {
        let config = GatewayConfig::load().expect("Failed to load config");
        assert!(!config.rate_limit.trust_forwarded_for);
        assert_eq!(config.upi.payee_name, "BharatPay_Merchant");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.demo_key().as_deref(), Some("demo-mode"));
    }

    #[test]
    fn prod_rejects_development_secrets() {
        let mut config = GatewayConfig::load().expect("Failed to load config");
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.admin.password = Secret::new("a-real-password".to_string());
        config.admin.jwt_secret = Secret::new("0123456789abcdef0123456789abcdef".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_demo_key_disables_bypass() {
        let mut config = GatewayConfig::load().expect("Failed to load config");
        config.api_keys.demo_key = Some("  ".to_string());
        assert_eq!(config.demo_key(), None);
    }

    #[test]
    fn cors_origins_are_split() {
        let cors = CorsConfig {
            allowed_origins: "https://a.example, https://b.example".to_string(),
        };
        assert_eq!(cors.origins().len(), 2);
        assert!(!cors.allows_any());
    }
}
