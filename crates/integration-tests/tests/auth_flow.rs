//! Integration tests for registration, verification and login.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`DATABASE_URL`)
//! - The server running (cargo run -p notekeeper-server)

use reqwest::StatusCode;
use serde_json::{Value, json};

use notekeeper_integration_tests::{TEST_PASSWORD, TestContext, unique_email};

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;

    let resp = ctx.client.get(ctx.url("/health")).send().await.expect("health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .get(ctx.url("/health/ready"))
        .send()
        .await
        .expect("readiness");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_register_then_wrong_code() {
    let ctx = TestContext::new().await;
    let email = unique_email();

    let resp = ctx
        .client
        .post(ctx.url("/auth/register"))
        .json(&json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": email,
            "password": "cobol-rules"
        }))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["message"], "Verification code has been sent!");

    // Codes are digits only, so this can never match
    let resp = ctx
        .client
        .post(ctx.url("/auth/verify"))
        .json(&json!({ "email": email, "code": "not-a-code" }))
        .send()
        .await
        .expect("verify");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"], "incorrect_code");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_verify_without_registration() {
    let ctx = TestContext::new().await;

    let resp = ctx
        .client
        .post(ctx.url("/auth/verify"))
        .json(&json!({ "email": unique_email(), "code": "123456" }))
        .send()
        .await
        .expect("verify");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_register_existing_email_conflicts() {
    let ctx = TestContext::new().await;
    let user = ctx.logged_in_user().await;

    let resp = ctx
        .client
        .post(ctx.url("/auth/register"))
        .json(&json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": user.email,
            "password": "cobol-rules"
        }))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_login_failures_look_the_same() {
    let ctx = TestContext::new().await;
    let user = ctx.logged_in_user().await;

    let wrong_password: Value = ctx
        .client
        .post(ctx.url("/auth/login"))
        .json(&json!({ "email": user.email, "password": "not-the-one" }))
        .send()
        .await
        .expect("login")
        .json()
        .await
        .expect("json");

    let unknown_user: Value = ctx
        .client
        .post(ctx.url("/auth/login"))
        .json(&json!({ "email": unique_email(), "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("login")
        .json()
        .await
        .expect("json");

    assert_eq!(wrong_password["error"], "wrong_credentials");
    assert_eq!(wrong_password, unknown_user);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_protected_routes_need_token() {
    let ctx = TestContext::new().await;

    let resp = ctx.client.get(ctx.url("/notes")).send().await.expect("notes");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = ctx
        .client
        .get(ctx.url("/users"))
        .bearer_auth("abc.def")
        .send()
        .await
        .expect("users");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
