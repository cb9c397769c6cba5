//! Registration, login, token refresh, and profile endpoints.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use reqwest::header::SET_COOKIE;
use serde_json::json;

use toybox_integration_tests::{
    ADMIN_EMAIL, ADMIN_PASSWORD, TestContext, expect_error, expect_json,
};

#[tokio::test]
async fn test_register_sets_http_only_cookies() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    let resp = client
        .post(ctx.url("/api/user/register"))
        .json(&json!({
            "name": "Ravi",
            "email": "Ravi@Example.com",
            "password": "correct-horse-1",
        }))
        .send()
        .await
        .unwrap();

    let cookies: Vec<String> = resp
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

    let body = expect_json(resp, StatusCode::CREATED).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "ravi@example.com");
    assert_eq!(body["user"]["role"], "customer");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body.get("accessToken").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let ctx = TestContext::new().await;
    ctx.customer("dup@example.com").await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/register"))
        .json(&json!({
            "name": "Again",
            "email": "DUP@example.com",
            "password": "another-pass-2",
        }))
        .send()
        .await
        .unwrap();

    expect_error(resp, StatusCode::BAD_REQUEST, "User already exists").await;
}

#[tokio::test]
async fn test_register_validates_input() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    let resp = client
        .post(ctx.url("/api/user/register"))
        .json(&json!({ "name": "Shorty", "email": "s@example.com", "password": "short" }))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "Password must be at least 8 characters",
    )
    .await;

    let resp = client
        .post(ctx.url("/api/user/register"))
        .json(&json!({ "name": "Nomail", "email": "not-an-email", "password": "long-enough-1" }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "Invalid email address").await;
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let ctx = TestContext::new().await;
    ctx.customer("known@example.com").await;
    let client = TestContext::client();

    for (email, password) in [
        ("known@example.com", "wrong-password"),
        ("unknown@example.com", "correct-horse-1"),
    ] {
        let resp = client
            .post(ctx.url("/api/user/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        expect_error(resp, StatusCode::UNAUTHORIZED, "Invalid credentials").await;
    }
}

#[tokio::test]
async fn test_login_then_profile() {
    let ctx = TestContext::new().await;
    ctx.customer("reader@example.com").await;
    let client = TestContext::client();

    let resp = client
        .post(ctx.url("/api/user/login"))
        .json(&json!({ "email": "reader@example.com", "password": "correct-horse-1" }))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;

    let resp = client
        .get(ctx.url("/api/user/get-profile"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["user"]["email"], "reader@example.com");
    assert_eq!(body["user"]["name"], "Test Customer");
}

#[tokio::test]
async fn test_profile_requires_token() {
    let ctx = TestContext::new().await;

    let resp = TestContext::client()
        .get(ctx.url("/api/user/get-profile"))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Not authorized, no token").await;

    let resp = TestContext::client()
        .get(ctx.url("/api/user/get-profile"))
        .header("Cookie", "accessToken=not.a.jwt")
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Invalid or expired token").await;
}

#[tokio::test]
async fn test_refresh_and_logout() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("cycle@example.com").await;

    let resp = client
        .post(ctx.url("/api/user/refresh"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["message"], "Token refreshed");

    let resp = client
        .post(ctx.url("/api/user/logout"))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;

    let resp = client
        .get(ctx.url("/api/user/get-profile"))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Not authorized, no token").await;

    let resp = client
        .post(ctx.url("/api/user/refresh"))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Not authorized, no token").await;
}

#[tokio::test]
async fn test_access_token_rejected_as_refresh_token() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("swap@example.com").await;

    // Grab the access cookie and present it as the refresh cookie
    let resp = client
        .post(ctx.url("/api/user/login"))
        .json(&json!({ "email": "swap@example.com", "password": "correct-horse-1" }))
        .send()
        .await
        .unwrap();
    let access = resp
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|c| c.strip_prefix("accessToken="))
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string();

    let resp = TestContext::client()
        .post(ctx.url("/api/user/refresh"))
        .header("Cookie", format!("refreshToken={access}"))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Invalid or expired token").await;
}

#[tokio::test]
async fn test_change_password() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("rotate@example.com").await;

    let resp = client
        .post(ctx.url("/api/user/change-password"))
        .json(&json!({ "oldPassword": "nope-nope-nope", "newPassword": "fresh-pass-99" }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Invalid credentials").await;

    let resp = client
        .post(ctx.url("/api/user/change-password"))
        .json(&json!({ "oldPassword": "correct-horse-1", "newPassword": "fresh-pass-99" }))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/login"))
        .json(&json!({ "email": "rotate@example.com", "password": "fresh-pass-99" }))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;
}

#[tokio::test]
async fn test_admin_login_requires_admin_role() {
    let ctx = TestContext::new().await;
    ctx.customer("shopper@example.com").await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/admin"))
        .json(&json!({ "email": "shopper@example.com", "password": "correct-horse-1" }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Invalid credentials").await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/admin"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let ctx = TestContext::new().await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/login"))
        .header("Content-Type", "application/json")
        .body("{\"email\":")
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    let resp = client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::new().await;

    let resp = TestContext::client()
        .get(ctx.url("/health"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "trace-me-123");
}
