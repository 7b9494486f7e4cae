use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use super::payments::OrderSource;
use crate::models::TransactionStatus;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Call once, from `main`.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Metrics recorder already initialized"))
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_order_created(source: OrderSource) {
    counter!("gateway_orders_created_total", "source" => source.as_str()).increment(1);
}

/// `decided` is false when the stored outcome was replayed.
pub fn record_verification(status: TransactionStatus, decided: bool) {
    let outcome = if decided { "decided" } else { "replayed" };
    counter!(
        "gateway_verifications_total",
        "status" => status.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_api_key_rejected(reason: &'static str) {
    counter!("gateway_api_key_rejections_total", "reason" => reason).increment(1);
}

pub fn record_link_use(result: &'static str) {
    counter!("gateway_payment_link_uses_total", "result" => result).increment(1);
}
