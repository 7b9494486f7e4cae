use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Endpoint catalogue.
pub async fn api_docs() -> impl IntoResponse {
    Json(json!({
        "name": "BharatPay API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Simulated UPI payment gateway API",
        "authentication": {
            "developer_api": "X-API-Key header or api_key query parameter",
            "admin": "Authorization: Bearer <token from /api/admin/login>"
        },
        "endpoints": {
            "admin": {
                "login": "POST /api/admin/login",
                "verify": "GET /api/admin/verify",
                "api_keys": "GET /api/admin/api-keys",
                "create_key": "POST /api/admin/api-keys",
                "delete_key": "DELETE /api/admin/api-keys/:id",
                "toggle_key": "POST /api/admin/api-keys/:id/toggle",
                "transactions": "GET /api/admin/transactions?page&per_page&status",
                "stats": "GET /api/admin/stats"
            },
            "developer_api": {
                "generate_qr": "POST /api/v1/qr/generate (requires API key)",
                "verify_payment": "POST /api/v1/payment/verify (requires API key)",
                "create_payment_link": "POST /api/v1/payment-link/create (requires API key)"
            },
            "public": {
                "payment_link": "GET /pay/:link_id",
                "pay_with_link": "POST /api/public/pay/:link_id"
            },
            "operations": {
                "health": "GET /health",
                "ready": "GET /ready",
                "metrics": "GET /metrics"
            }
        }
    }))
}
