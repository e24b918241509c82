//! Payment provider redirects back to the order page.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use marketstall_core::Role;
use marketstall_integration_tests::{FakeBackend, TestApp, TestResponse, sample_order};
use serde_json::Value;

fn notice_count(res: &TestResponse) -> usize {
    res.json
        .get("notices")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

async fn signed_in_with_order(order_id: i64) -> TestApp {
    let backend = FakeBackend::new();
    backend.add_account("tok-1", 7, Role::Customer);
    backend.insert_order(sample_order(order_id));
    let app = TestApp::new(backend);
    app.sign_in("tok-1").await;
    app
}

#[tokio::test]
async fn test_success_redirect_notifies_once() {
    let app = signed_in_with_order(42).await;

    let res = app.get("/en/orders/42?success=true").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/en/orders/42"));

    let res = app.get("/en/orders/42").await;
    assert_eq!(res.status, StatusCode::OK);
    let notices = res.json["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["level"], "success");
    assert_eq!(res.json["order"]["id"], 42);
    assert_eq!(res.json["total"], "$20.00");

    // Reopening the provider link does not notify again.
    let res = app.get("/en/orders/42?success=true").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json.get("notices").is_none());
}

#[tokio::test]
async fn test_concurrent_redirects_notify_once() {
    let app = signed_in_with_order(42).await;

    // The provider link opened in two tabs at once.
    let (first, second) = tokio::join!(
        app.get("/en/orders/42?success=true"),
        app.get("/en/orders/42?success=true"),
    );
    let redirects = [&first, &second]
        .iter()
        .filter(|res| res.status == StatusCode::SEE_OTHER)
        .count();
    assert_eq!(redirects, 1);

    let after = app.get("/en/orders/42").await;
    assert_eq!(
        notice_count(&first) + notice_count(&second) + notice_count(&after),
        1
    );
}

#[tokio::test]
async fn test_canceled_redirect_keeps_other_params() {
    let app = signed_in_with_order(42).await;

    let res = app.get("/en/orders/42?ref=mail&canceled&utm=x").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location(), Some("/en/orders/42?ref=mail&utm=x"));

    let res = app.get("/en/orders/42?ref=mail&utm=x").await;
    let notices = res.json["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["level"], "error");
}

#[tokio::test]
async fn test_markers_are_per_order() {
    let backend = FakeBackend::new();
    backend.add_account("tok-1", 7, Role::Customer);
    backend.insert_order(sample_order(1));
    backend.insert_order(sample_order(2));
    let app = TestApp::new(backend);
    app.sign_in("tok-1").await;

    let res = app.get("/en/orders/1?success").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    let res = app.get("/en/orders/2?success").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_ambiguous_indicators_are_ignored() {
    let app = signed_in_with_order(42).await;

    let res = app.get("/en/orders/42?success&canceled").await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json.get("notices").is_none());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = signed_in_with_order(42).await;

    let res = app.get("/en/orders/999?success=true").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json["error"], "not_found");

    let res = app.get("/en/orders/not-a-number").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_page_requires_sign_in() {
    let app = TestApp::new(FakeBackend::new());

    let res = app.get("/en/orders/42?success=true").await;

    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(
        res.location(),
        Some("/en/login?next=%2Fen%2Forders%2F42%3Fsuccess%3Dtrue")
    );
}
