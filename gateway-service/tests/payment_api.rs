mod common;

use common::{TestApp, DEMO_KEY};
use serde_json::{json, Value};

fn query_param<'a>(uri: &'a str, name: &str) -> Option<&'a str> {
    uri.split_once('?')?
        .1
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
}

#[tokio::test]
async fn generate_qr_returns_pending_order_with_upi_payload() {
    let app = TestApp::spawn().await;

    let response = app
        .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": 100 }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["amount"], 100.0);
    assert_eq!(body["upi_id"], "a@b");
    assert_eq!(body["message"], "BharatPay Payment");
    assert!(body["order_id"].as_str().unwrap().starts_with("BHARAT_ORD_"));
    assert!(body["merchant_id"].as_str().unwrap().starts_with("BHARAT_"));
    assert!(body["merchant_key"].as_str().unwrap().starts_with("BHARAT_KEY_"));
    assert!(!body["qr_code"].as_str().unwrap().is_empty());

    let qr_data = body["qr_data"].as_str().unwrap();
    assert!(qr_data.starts_with("upi://pay?"));
    assert_eq!(query_param(qr_data, "pa"), Some("a%40b"));
    assert_eq!(query_param(qr_data, "am"), Some("100.00"));
    assert_eq!(query_param(qr_data, "tr"), body["order_id"].as_str());
}

#[tokio::test]
async fn generated_order_ids_are_unique() {
    let app = TestApp::spawn().await;

    let mut seen = std::collections::HashSet::new();
    for _ in 0..5 {
        let body: Value = app
            .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": "10.50" }))
            .await
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["amount"], 10.5);
        assert!(seen.insert(body["order_id"].as_str().unwrap().to_string()));
    }
}

#[tokio::test]
async fn verify_decides_once_and_replays_identically() {
    let app = TestApp::spawn().await;

    let order: Value = app
        .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": 100 }))
        .await
        .json()
        .await
        .expect("Failed to parse JSON");

    let first = app.verify_payment(DEMO_KEY, &order).await;
    assert_eq!(first.status().as_u16(), 200);
    let first = first.text().await.expect("Failed to read body");

    let second = app
        .verify_payment(DEMO_KEY, &order)
        .await
        .text()
        .await
        .expect("Failed to read body");
    assert_eq!(first, second);

    let body: Value = serde_json::from_str(&first).unwrap();
    let status = body["status"].as_str().unwrap();
    assert!(status == "SUCCESS" || status == "FAILED");
    if status == "SUCCESS" {
        assert!(body["bharatpay_reference"].as_str().unwrap().starts_with("BHARAT"));
        assert!(body["bank_reference"].as_str().unwrap().starts_with("BANK"));
        assert!(body["paid_at"].is_string());
    } else {
        assert!(body.get("paid_at").is_none());
    }
}

#[tokio::test]
async fn settlement_probability_is_configurable() {
    let app = TestApp::spawn_with(|c| c.settlement.success_probability = 0.0).await;

    let order: Value = app
        .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": 5 }))
        .await
        .json()
        .await
        .unwrap();
    let body: Value = app.verify_payment(DEMO_KEY, &order).await.json().await.unwrap();
    assert_eq!(body["status"], "FAILED");
}

#[tokio::test]
async fn mismatched_merchant_pair_is_unauthorized_before_and_after_settlement() {
    let app = TestApp::spawn_with(|c| c.settlement.success_probability = 1.0).await;

    let order: Value = app
        .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": 100 }))
        .await
        .json()
        .await
        .unwrap();

    let mut forged = order.clone();
    forged["merchant_key"] = json!("BHARAT_KEY_000000000000");

    let response = app.verify_payment(DEMO_KEY, &forged).await;
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    let settled: Value = app.verify_payment(DEMO_KEY, &order).await.json().await.unwrap();
    assert_eq!(settled["status"], "SUCCESS");

    let response = app.verify_payment(DEMO_KEY, &forged).await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .verify_payment(
            DEMO_KEY,
            &json!({ "order_id": "NOPE", "merchant_id": "x", "merchant_key": "y" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Order not found");
}

#[tokio::test]
async fn duplicate_order_id_is_rejected_and_original_kept() {
    let app = TestApp::spawn().await;

    let first = app
        .generate_qr(
            DEMO_KEY,
            json!({ "upi": "a@b", "amount": 10, "order_id": "INV-42" }),
        )
        .await;
    assert_eq!(first.status().as_u16(), 200);
    let original: Value = first.json().await.unwrap();

    let second = app
        .generate_qr(
            DEMO_KEY,
            json!({ "upi": "c@d", "amount": 99, "order_id": "INV-42" }),
        )
        .await;
    assert_eq!(second.status().as_u16(), 400);
    let body: Value = second.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("INV-42"));

    let verified: Value = app.verify_payment(DEMO_KEY, &original).await.json().await.unwrap();
    assert_eq!(verified["order_id"], "INV-42");
    assert_eq!(verified["amount"], 10.0);
}

#[tokio::test]
async fn invalid_generate_requests_are_bad_requests() {
    let app = TestApp::spawn().await;

    for body in [
        json!({ "upi": "a@b", "amount": 0 }),
        json!({ "upi": "a@b", "amount": -3 }),
        json!({ "upi": "a@b", "amount": "lots" }),
        json!({ "upi": "a@b", "amount": 1e307 }),
        json!({ "upi": "a@b", "amount": "1e307" }),
        json!({ "upi": "not-a-vpa", "amount": 10 }),
        json!({ "upi": "", "amount": 10 }),
        json!({ "amount": 10 }),
    ] {
        let response = app.generate_qr(DEMO_KEY, body.clone()).await;
        assert_eq!(response.status().as_u16(), 400, "{}", body);
        let envelope: Value = response.json().await.unwrap();
        assert_eq!(envelope["success"], false);
    }
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/v1/qr/generate"))
        .json(&json!({ "upi": "a@b", "amount": 100 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "API key required. Provide X-API-Key header or api_key parameter"
    );
}
