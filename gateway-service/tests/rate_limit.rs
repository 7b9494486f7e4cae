mod common;

use common::{TestApp, ADMIN_PASSWORD, ADMIN_USERNAME, DEMO_KEY};
use serde_json::json;

#[tokio::test]
async fn login_attempts_are_limited_per_ip() {
    let app = TestApp::spawn_with(|c| {
        c.rate_limit.login_attempts = 2;
        c.rate_limit.login_window_seconds = 60;
    })
    .await;

    for _ in 0..2 {
        let response = app.admin_login(ADMIN_USERNAME, "wrong").await;
        assert_eq!(response.status().as_u16(), 401);
    }

    let response = app.admin_login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn demo_traffic_is_limited() {
    let app = TestApp::spawn_with(|c| {
        c.rate_limit.demo_requests = 1;
        c.rate_limit.demo_window_seconds = 3600;
    })
    .await;

    let first = app
        .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": 1 }))
        .await;
    assert_eq!(first.status().as_u16(), 200);

    let second = app
        .generate_qr(DEMO_KEY, json!({ "upi": "a@b", "amount": 1 }))
        .await;
    assert_eq!(second.status().as_u16(), 429);
    assert!(second.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn each_api_key_has_its_own_budget() {
    let app = TestApp::spawn_with(|c| {
        c.rate_limit.key_requests = 1;
        c.rate_limit.key_window_seconds = 3600;
    })
    .await;
    let token = app.admin_token().await;
    let (first_key, _) = app.create_api_key(&token, "First").await;
    let (second_key, _) = app.create_api_key(&token, "Second").await;

    let body = json!({ "upi": "a@b", "amount": 1 });
    assert_eq!(app.generate_qr(&first_key, body.clone()).await.status().as_u16(), 200);
    assert_eq!(app.generate_qr(&first_key, body.clone()).await.status().as_u16(), 429);
    assert_eq!(app.generate_qr(&second_key, body).await.status().as_u16(), 200);
}

#[tokio::test]
async fn forwarded_for_header_does_not_open_new_demo_buckets() {
    let app = TestApp::spawn_with(|c| {
        c.rate_limit.demo_requests = 1;
        c.rate_limit.demo_window_seconds = 3600;
    })
    .await;

    let mut statuses = Vec::new();
    for forwarded in ["198.51.100.1", "198.51.100.2"] {
        let response = app
            .client
            .post(app.url("/api/v1/qr/generate"))
            .header("X-API-Key", DEMO_KEY)
            .header("X-Forwarded-For", forwarded)
            .json(&json!({ "upi": "a@b", "amount": 1 }))
            .send()
            .await
            .expect("Failed to execute request");
        statuses.push(response.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 429]);
}

#[tokio::test]
async fn forwarded_for_is_honoured_when_trusted() {
    let app = TestApp::spawn_with(|c| {
        c.rate_limit.login_attempts = 1;
        c.rate_limit.trust_forwarded_for = true;
    })
    .await;

    let login = |forwarded: &'static str| {
        app.client
            .post(app.url("/api/admin/login"))
            .header("X-Forwarded-For", forwarded)
            .json(&json!({ "username": ADMIN_USERNAME, "password": "wrong" }))
            .send()
    };

    assert_eq!(login("198.51.100.1").await.unwrap().status().as_u16(), 401);
    assert_eq!(login("198.51.100.1").await.unwrap().status().as_u16(), 429);
    assert_eq!(login("198.51.100.2").await.unwrap().status().as_u16(), 401);
}
