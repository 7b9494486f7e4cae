use gateway_service::{config::GatewayConfig, services::metrics::init_metrics, Application};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::load()?;

    init_tracing(
        &config.service_name,
        &config.logging.level,
        config.logging.format,
        config.logging.otlp_endpoint.as_deref(),
    )?;
    init_metrics()?;

    tracing::info!(
        environment = ?config.environment,
        storage = ?config.storage.backend,
        "Starting gateway service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
