//! Integration tests for notes and user management.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`DATABASE_URL`)
//! - The server running (cargo run -p notekeeper-server)

use reqwest::StatusCode;
use serde_json::{Value, json};

use notekeeper_integration_tests::TestContext;

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_note_crud() {
    let ctx = TestContext::new().await;
    let user = ctx.logged_in_user().await;

    let resp = ctx
        .client
        .post(ctx.url("/notes"))
        .bearer_auth(&user.token)
        .json(&json!({ "title": "Reading list", "description": "SICP" }))
        .send()
        .await
        .expect("create");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let note: Value = resp.json().await.expect("json");
    let id = note["id"].as_i64().expect("id");
    assert_eq!(note["user_id"], user.id);

    let resp = ctx
        .client
        .put(ctx.url(&format!("/notes/{id}")))
        .bearer_auth(&user.token)
        .json(&json!({ "title": "Reading list", "description": "SICP, TAOCP" }))
        .send()
        .await
        .expect("update");
    assert_eq!(resp.status(), StatusCode::OK);

    let list: Value = ctx
        .client
        .get(ctx.url("/notes?page=1&limit=10"))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("list")
        .json()
        .await
        .expect("json");
    assert_eq!(list["count"], 1);
    assert_eq!(list["notes"][0]["description"], "SICP, TAOCP");

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/notes/{id}")))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("delete");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .get(ctx.url(&format!("/notes/{id}")))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("show");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The row survives with deleted_at set
    let deleted: Option<bool> =
        sqlx::query_scalar("SELECT deleted_at IS NOT NULL FROM notes WHERE id = $1")
            .bind(id)
            .fetch_optional(&ctx.pool)
            .await
            .expect("query");
    assert_eq!(deleted, Some(true));
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_notes_hidden_from_other_users() {
    let ctx = TestContext::new().await;
    let owner = ctx.logged_in_user().await;
    let other = ctx.logged_in_user().await;

    let note: Value = ctx
        .client
        .post(ctx.url("/notes"))
        .bearer_auth(&owner.token)
        .json(&json!({ "title": "Mine" }))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("json");
    let id = note["id"].as_i64().expect("id");

    let resp = ctx
        .client
        .get(ctx.url(&format!("/notes/{id}")))
        .bearer_auth(&other.token)
        .send()
        .await
        .expect("show");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_user_can_only_delete_self() {
    let ctx = TestContext::new().await;
    let alice = ctx.logged_in_user().await;
    let bob = ctx.logged_in_user().await;

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/users/{}", bob.id)))
        .bearer_auth(&alice.token)
        .send()
        .await
        .expect("delete other");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/users/{}", alice.id)))
        .bearer_auth(&alice.token)
        .send()
        .await
        .expect("delete self");
    assert_eq!(resp.status(), StatusCode::OK);
}
