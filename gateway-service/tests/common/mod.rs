#![allow(dead_code)]

use gateway_service::config::{GatewayConfig, StorageBackend};
use gateway_service::startup::Application;
use reqwest::{Client, Response};
use serde_json::{json, Value};

pub const DEMO_KEY: &str = "demo-mode";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn on a random port with the in-memory backend, after `customize`.
    pub async fn spawn_with(customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        let mut config = GatewayConfig::load().expect("Failed to load configuration");
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.backend = StorageBackend::Memory;
        config.admin.username = ADMIN_USERNAME.to_string();
        config.admin.password = secrecy::Secret::new(ADMIN_PASSWORD.to_string());
        config.api_keys.demo_key = Some(DEMO_KEY.to_string());
        customize(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn admin_login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/api/admin/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn admin_token(&self) -> String {
        let body: Value = self
            .admin_login(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .json()
            .await
            .expect("Failed to parse JSON");
        body["access_token"]
            .as_str()
            .expect("login returned no token")
            .to_string()
    }

    /// Issue a developer key through the admin API; returns `(plaintext, key_id)`.
    pub async fn create_api_key(&self, token: &str, owner_name: &str) -> (String, String) {
        let body: Value = self
            .client
            .post(self.url("/api/admin/api-keys"))
            .bearer_auth(token)
            .json(&json!({ "owner_name": owner_name, "expiry_days": 30 }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse JSON");

        (
            body["api_key"].as_str().expect("no api_key").to_string(),
            body["key_id"].as_str().expect("no key_id").to_string(),
        )
    }

    pub async fn generate_qr(&self, api_key: &str, body: Value) -> Response {
        self.client
            .post(self.url("/api/v1/qr/generate"))
            .header("X-API-Key", api_key)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn verify_payment(&self, api_key: &str, order: &Value) -> Response {
        self.client
            .post(self.url("/api/v1/payment/verify"))
            .header("X-API-Key", api_key)
            .json(&json!({
                "order_id": order["order_id"],
                "merchant_id": order["merchant_id"],
                "merchant_key": order["merchant_key"],
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
