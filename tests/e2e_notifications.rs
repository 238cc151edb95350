//! E2E tests for notifications

mod common;

use common::TestServer;
use serde_json::{Value, json};

#[tokio::test]
async fn test_activity_on_my_posts_is_listed() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let post_id = server.create_post(&alice, "look at this").await;

    server
        .post(&format!("/api/posts/{post_id}/like"), &bob, json!({}))
        .await;
    server
        .post(
            &format!("/api/posts/{post_id}/comments"),
            &bob,
            json!({ "text": "nice one" }),
        )
        .await;
    server
        .post(&format!("/api/users/{}/follow", alice.id), &bob, json!({}))
        .await;
    // own activity never notifies
    server
        .post(&format!("/api/posts/{post_id}/like"), &alice, json!({}))
        .await;

    let items: Value = server
        .get("/api/notifications", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 3);

    let mut kinds: Vec<&str> = items.iter().filter_map(|n| n["type"].as_str()).collect();
    kinds.sort_unstable();
    assert_eq!(kinds, vec!["COMMENT", "FOLLOW", "LIKE"]);

    assert!(items.iter().all(|n| n["actor"]["username"] == "bob"));

    let comment = items.iter().find(|n| n["type"] == "COMMENT").unwrap();
    assert_eq!(comment["excerpt"], "nice one");
    assert_eq!(comment["post"]["text_excerpt"], "look at this");
}

#[tokio::test]
async fn test_unread_count_resets_on_mark_read() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let post_id = server.create_post(&alice, "count me").await;

    server
        .post(&format!("/api/posts/{post_id}/like"), &bob, json!({}))
        .await;

    let unread: Value = server
        .get("/api/notifications/unread-count", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 1);

    let response = server
        .post("/api/notifications/mark-read", &alice, json!({}))
        .await;
    assert_eq!(response.status(), 200);

    let unread: Value = server
        .get("/api/notifications/unread-count", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 0);

    server
        .post(
            &format!("/api/posts/{post_id}/comments"),
            &bob,
            json!({ "text": "again" }),
        )
        .await;

    let unread: Value = server
        .get("/api/notifications/unread-count", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 1);
}

#[tokio::test]
async fn test_pending_follow_does_not_notify() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    server.make_private(&alice).await;

    server
        .post(&format!("/api/users/{}/follow", alice.id), &bob, json!({}))
        .await;

    let items: Value = server
        .get("/api/notifications", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_approved_follow_is_unread_after_mark_read() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    server.make_private(&alice).await;

    server
        .post(&format!("/api/users/{}/follow", alice.id), &bob, json!({}))
        .await;
    server
        .post("/api/notifications/mark-read", &alice, json!({}))
        .await;

    let response = server
        .post(
            &format!("/api/users/requests/{}/approve", bob.id),
            &alice,
            json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let unread: Value = server
        .get("/api/notifications/unread-count", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 1);

    let items: Value = server
        .get("/api/notifications", Some(&alice))
        .await
        .json()
        .await
        .unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "FOLLOW");
    assert_eq!(items[0]["actor"]["username"], "bob");
}
