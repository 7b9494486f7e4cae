//! Application startup and lifecycle management.

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{
        create_ip_rate_limiter, create_keyed_rate_limiter, ip_rate_limit_middleware,
        spawn_pruning, IpRateLimit, KeyedRateLimiter,
    },
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{CorsConfig, GatewayConfig, StorageBackend};
use crate::handlers::{self, admin, docs, links, payments};
use crate::middleware::{admin_auth_middleware, api_key_middleware, API_KEY_HEADER};
use crate::services::{
    AdminAuthority, ApiKeyAuthority, PaymentLinkService, PaymentService, PngQrRenderer,
    RandomSettlement, VerificationEngine,
};
use crate::storage::{MongoStore, Stores};

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub stores: Stores,
    pub payments: Arc<PaymentService>,
    pub verification: Arc<VerificationEngine>,
    pub api_keys: Arc<ApiKeyAuthority>,
    pub admin: Arc<AdminAuthority>,
    pub links: Arc<PaymentLinkService>,
    pub login_limit: IpRateLimit,
    pub key_limiter: KeyedRateLimiter,
    pub demo_limiter: KeyedRateLimiter,
}

impl AppState {
    /// Wire every component from `config` over the given stores.
    pub fn new(config: GatewayConfig, stores: Stores) -> Result<Self, AppError> {
        let payments = Arc::new(PaymentService::new(
            stores.transactions.clone(),
            Arc::new(PngQrRenderer),
            config.upi.payee_name.clone(),
        ));
        let verification = Arc::new(VerificationEngine::new(
            stores.transactions.clone(),
            Arc::new(RandomSettlement::new(config.settlement.success_probability)),
        ));
        let api_keys = Arc::new(ApiKeyAuthority::new(
            stores.api_keys.clone(),
            config.demo_key(),
        ));
        let admin = Arc::new(AdminAuthority::new(&config.admin).map_err(AppError::ConfigError)?);
        let links = Arc::new(PaymentLinkService::new(
            stores.links.clone(),
            payments.clone(),
        ));

        let limits = &config.rate_limit;
        let login_limit = IpRateLimit {
            limiter: create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds),
            trust_forwarded_for: limits.trust_forwarded_for,
        };
        let key_limiter = create_keyed_rate_limiter(limits.key_requests, limits.key_window_seconds);
        let demo_limiter =
            create_keyed_rate_limiter(limits.demo_requests, limits.demo_window_seconds);

        Ok(Self {
            config: Arc::new(config),
            stores,
            payments,
            verification,
            api_keys,
            admin,
            links,
            login_limit,
            key_limiter,
            demo_limiter,
        })
    }

    /// Periodically drop idle rate-limit buckets. Must run inside a tokio
    /// runtime; the tasks end when the limiters are dropped.
    pub fn spawn_limiter_pruning(&self) {
        spawn_pruning(&self.login_limit.limiter, LIMITER_PRUNE_INTERVAL);
        spawn_pruning(&self.key_limiter, LIMITER_PRUNE_INTERVAL);
        spawn_pruning(&self.demo_limiter, LIMITER_PRUNE_INTERVAL);
    }
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if cors.allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .origins()
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Full HTTP surface: probes, admin API, developer API and public link pages.
pub fn build_router(state: AppState) -> Router {
    let admin_login = Router::new()
        .route("/login", post(admin::login))
        .route_layer(from_fn_with_state(
            state.login_limit.clone(),
            ip_rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/verify", get(admin::verify))
        .route("/stats", get(admin::stats))
        .route("/transactions", get(admin::list_transactions))
        .route(
            "/api-keys",
            get(admin::list_api_keys).post(admin::create_api_key),
        )
        .route("/api-keys/:key_id", delete(admin::delete_api_key))
        .route("/api-keys/:key_id/toggle", post(admin::toggle_api_key))
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    let developer_routes = Router::new()
        .route("/qr/generate", post(payments::generate_qr))
        .route("/payment/verify", post(payments::verify_payment))
        .route("/payment-link/create", post(links::create_payment_link))
        .route_layer(from_fn_with_state(state.clone(), api_key_middleware));

    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/docs", get(docs::api_docs))
        .route("/pay/:link_id", get(links::payment_page))
        .route("/api/public/pay/:link_id", post(links::public_pay))
        .nest("/api/admin", admin_login.merge(admin_routes))
        .nest("/api/v1", developer_routes)
        .fallback(handlers::not_found)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map_or("-", |id| id.0.as_str());

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

async fn connect_stores(config: &GatewayConfig) -> Result<Stores, AppError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Stores::in_memory())
        }
        StorageBackend::Mongo => {
            let store = MongoStore::connect(
                config.storage.uri.expose_secret(),
                &config.storage.database,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                AppError::DatabaseError(e.into())
            })?;

            store.init_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                AppError::DatabaseError(e.into())
            })?;

            tracing::info!(database = %config.storage.database, "Connected to MongoDB");
            Ok(Stores::mongo(store))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration. Port 0 binds a
    /// random free port.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let stores = connect_stores(&config).await?;
        let addr = format!("{}:{}", config.server.host, config.server.port);

        let state = AppState::new(config, stores)?;
        state.spawn_limiter_pruning();
        let router = build_router(state);

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Gateway service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
