//! Database tests

use super::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

async fn create_user(db: &Database, username: &str) -> User {
    db.insert_user(
        username,
        &format!("{username}@example.com"),
        "hash",
        Some(username),
    )
    .await
    .unwrap()
}

async fn create_text_post(db: &Database, author_id: i64, text: &str) -> i64 {
    db.insert_post(&NewPost {
        author_id,
        text: Some(text.to_string()),
        attachments: vec![],
        tag_user_ids: vec![],
        poll: None,
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_database_connection() {
    let (db, _temp_dir) = create_test_db().await;
    db.ping().await.unwrap();
}

#[tokio::test]
async fn test_user_insert_and_lookup() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = create_user(&db, "alice").await;
    assert!(!alice.is_private);
    assert!(alice.notifications_seen_at.is_none());

    let by_name = db.get_user_by_username("ALICE").await.unwrap().unwrap();
    assert_eq!(by_name.id, alice.id);
    let by_email = db.get_user_by_email("alice@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, alice.id);

    let duplicate = db
        .insert_user("alice", "other@example.com", "hash", None)
        .await;
    assert!(matches!(duplicate, Err(crate::error::AppError::Validation(_))));
}

#[tokio::test]
async fn test_patch_profile_only_touches_given_fields() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;

    db.patch_user_profile(
        alice.id,
        &ProfilePatch {
            bio: Some(Some("hello".to_string())),
            is_private: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let updated = db.get_user(alice.id).await.unwrap().unwrap();
    assert_eq!(updated.bio.as_deref(), Some("hello"));
    assert!(updated.is_private);
    assert_eq!(updated.display_name.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_follow_request_lifecycle() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    db.insert_follow(bob.id, alice.id, FollowState::Pending)
        .await
        .unwrap();
    assert_eq!(
        db.get_follow_state(bob.id, alice.id).await.unwrap(),
        Some(FollowState::Pending)
    );
    assert_eq!(db.count_followers(alice.id).await.unwrap(), 0);
    assert_eq!(db.count_following(bob.id).await.unwrap(), 0);

    let second = db.insert_follow(bob.id, alice.id, FollowState::Pending).await;
    assert!(second.is_err());

    let pending = db.get_pending_requesters(alice.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].username, "bob");

    assert!(db.accept_follow_request(alice.id, bob.id).await.unwrap());
    assert!(!db.accept_follow_request(alice.id, bob.id).await.unwrap());
    assert_eq!(db.count_followers(alice.id).await.unwrap(), 1);
    assert_eq!(db.get_following_ids(bob.id).await.unwrap(), vec![alice.id]);

    assert!(db.delete_follow(bob.id, alice.id).await.unwrap());
    assert!(!db.delete_follow(bob.id, alice.id).await.unwrap());
}

#[tokio::test]
async fn test_accept_all_follow_requests() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;

    db.insert_follow(bob.id, alice.id, FollowState::Pending).await.unwrap();
    db.insert_follow(carol.id, alice.id, FollowState::Pending).await.unwrap();

    assert_eq!(db.accept_all_follow_requests(alice.id).await.unwrap(), 2);
    assert_eq!(db.count_followers(alice.id).await.unwrap(), 2);
    assert!(db.get_pending_requesters(alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_accepted_follow_counts_from_approval_time() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;

    db.insert_follow(bob.id, alice.id, FollowState::Pending).await.unwrap();
    db.insert_follow(carol.id, alice.id, FollowState::Pending).await.unwrap();
    let seen_at = Utc::now();
    assert_eq!(db.count_activity_since(alice.id, seen_at).await.unwrap(), 0);

    db.accept_follow_request(alice.id, bob.id).await.unwrap();
    assert_eq!(db.count_activity_since(alice.id, seen_at).await.unwrap(), 1);

    db.accept_all_follow_requests(alice.id).await.unwrap();
    assert_eq!(db.count_activity_since(alice.id, seen_at).await.unwrap(), 2);
}

#[tokio::test]
async fn test_block_status_both_directions() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    db.insert_block(alice.id, bob.id).await.unwrap();
    db.insert_block(alice.id, bob.id).await.unwrap();
    assert_eq!(db.get_block_status(alice.id, bob.id).await.unwrap(), (true, false));
    assert_eq!(db.get_block_status(bob.id, alice.id).await.unwrap(), (false, true));

    db.insert_block(bob.id, alice.id).await.unwrap();
    assert_eq!(db.get_block_status(alice.id, bob.id).await.unwrap(), (true, true));

    db.delete_block(alice.id, bob.id).await.unwrap();
    db.delete_block(alice.id, bob.id).await.unwrap();
    assert_eq!(db.get_block_status(alice.id, bob.id).await.unwrap(), (false, true));
}

#[tokio::test]
async fn test_post_with_dependents_and_cascade() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let post_id = db
        .insert_post(&NewPost {
            author_id: alice.id,
            text: Some("look".to_string()),
            attachments: vec![
                NewAttachment {
                    url: "https://media.example.com/posts/a.png".to_string(),
                    media_type: MediaType::Image,
                },
                NewAttachment {
                    url: "https://media.example.com/posts/b.mp4".to_string(),
                    media_type: MediaType::Video,
                },
            ],
            tag_user_ids: vec![bob.id],
            poll: Some(NewPoll {
                question: "Which?".to_string(),
                options: vec!["one".to_string(), "two".to_string()],
            }),
        })
        .await
        .unwrap();

    let attachments = db.get_attachments_for_posts(&[post_id]).await.unwrap();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].position, 0);
    assert_eq!(attachments[1].media_type, MediaType::Video);

    let tags = db.get_tags_for_posts(&[post_id]).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].username, "bob");

    let polls = db.get_polls_for_posts(&[post_id]).await.unwrap();
    assert_eq!(polls.len(), 1);
    let options = db.get_poll_options(&[polls[0].id]).await.unwrap();
    assert_eq!(options.len(), 2);

    db.toggle_like(bob.id, post_id).await.unwrap();
    db.insert_save(bob.id, post_id).await.unwrap();
    db.insert_comment(post_id, bob.id, None, "nice").await.unwrap();

    db.delete_post(post_id).await.unwrap();
    assert!(db.get_post(post_id).await.unwrap().is_none());
    assert!(db.get_attachments_for_posts(&[post_id]).await.unwrap().is_empty());
    assert!(db.get_comments_for_post(post_id).await.unwrap().is_empty());
    assert!(db.get_like_counts(&[post_id]).await.unwrap().is_empty());
    assert!(db.get_saved_posts(bob.id, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_like_toggle() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post_id = create_text_post(&db, alice.id, "hi").await;

    assert_eq!(db.toggle_like(bob.id, post_id).await.unwrap(), (true, 1));
    assert_eq!(db.toggle_like(bob.id, post_id).await.unwrap(), (false, 0));
    assert_eq!(db.toggle_like(bob.id, post_id).await.unwrap(), (true, 1));

    let liked = db.get_liked_post_ids(bob.id, &[post_id]).await.unwrap();
    assert!(liked.contains(&post_id));
    let counts = db.get_like_counts(&[post_id]).await.unwrap();
    assert_eq!(counts.get(&post_id), Some(&1));
}

#[tokio::test]
async fn test_poll_vote_upsert_keeps_one_row() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let post_id = db
        .insert_post(&NewPost {
            author_id: alice.id,
            text: Some("vote".to_string()),
            attachments: vec![],
            tag_user_ids: vec![],
            poll: Some(NewPoll {
                question: "Pick".to_string(),
                options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            }),
        })
        .await
        .unwrap();
    let poll = db.get_polls_for_posts(&[post_id]).await.unwrap().remove(0);
    let options = db.get_poll_options(&[poll.id]).await.unwrap();

    db.upsert_poll_vote(poll.id, bob.id, options[0].id).await.unwrap();
    db.upsert_poll_vote(poll.id, bob.id, options[2].id).await.unwrap();

    assert_eq!(db.count_poll_votes(poll.id).await.unwrap(), 1);
    let votes = db.get_user_poll_votes(bob.id, &[poll.id]).await.unwrap();
    assert_eq!(votes.get(&poll.id), Some(&options[2].id));

    let options = db.get_poll_options(&[poll.id]).await.unwrap();
    assert_eq!(options[0].votes, 0);
    assert_eq!(options[2].votes, 1);
}

#[tokio::test]
async fn test_feed_and_explore_filters() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;

    create_text_post(&db, alice.id, "mine").await;
    create_text_post(&db, bob.id, "from bob #Rust").await;
    create_text_post(&db, carol.id, "from carol").await;

    db.insert_follow(alice.id, bob.id, FollowState::Accepted).await.unwrap();

    let feed = db.get_feed_posts(alice.id, 10, 0).await.unwrap();
    let authors: Vec<i64> = feed.iter().map(|p| p.author_id).collect();
    assert_eq!(authors.len(), 2);
    assert!(authors.contains(&alice.id));
    assert!(authors.contains(&bob.id));

    let tagged = db
        .get_explore_posts(None, Some("rust"), &[], 10, 0)
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].author_id, bob.id);

    let excluded = db
        .get_explore_posts(Some(alice.id), None, &[alice.id, bob.id], 10, 0)
        .await
        .unwrap();
    assert_eq!(excluded.len(), 1);
    assert_eq!(excluded[0].author_id, carol.id);
}

#[tokio::test]
async fn test_private_author_hidden_from_explore_and_search() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    create_text_post(&db, alice.id, "secret thoughts").await;
    db.patch_user_profile(
        alice.id,
        &ProfilePatch {
            is_private: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(db.get_explore_posts(Some(bob.id), None, &[], 10, 0).await.unwrap().is_empty());
    assert!(db.search_posts(Some(bob.id), "secret", 10).await.unwrap().is_empty());
    assert_eq!(db.search_posts(Some(alice.id), "secret", 10).await.unwrap().len(), 1);

    db.insert_follow(bob.id, alice.id, FollowState::Accepted).await.unwrap();
    assert_eq!(db.search_posts(Some(bob.id), "SECRET", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_send_message_canonical_conversation() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let key = ConversationKey::new(bob.id, alice.id).unwrap();
    let window_start = Utc::now() - Duration::seconds(10);

    let first = db.send_message(bob.id, key, "hi", window_start, 10).await.unwrap();
    let second = db
        .send_message(alice.id, ConversationKey::new(alice.id, bob.id).unwrap(), "hey", window_start, 10)
        .await
        .unwrap();
    assert_eq!(first.conversation_id, second.conversation_id);
    assert!(!first.is_read);

    let conversation = db.get_conversation(key).await.unwrap().unwrap();
    assert_eq!(conversation.user_low, alice.id.min(bob.id));
    assert_eq!(db.count_messages(conversation.id).await.unwrap(), 2);

    let messages = db.get_messages(conversation.id, 50, 0).await.unwrap();
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].content, "hey");
}

#[tokio::test]
async fn test_send_message_rate_limit_writes_nothing() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let key = ConversationKey::new(alice.id, bob.id).unwrap();
    let window_start = Utc::now() - Duration::seconds(10);

    for i in 0..3 {
        db.send_message(bob.id, key, &format!("m{i}"), window_start, 3)
            .await
            .unwrap();
    }
    let rejected = db.send_message(bob.id, key, "too many", window_start, 3).await;
    assert!(matches!(rejected, Err(crate::error::AppError::RateLimited)));

    let conversation = db.get_conversation(key).await.unwrap().unwrap();
    assert_eq!(db.count_messages(conversation.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_send_message_survives_cancelled_caller() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let key = ConversationKey::new(alice.id, bob.id).unwrap();
    let window_start = Utc::now() - Duration::seconds(10);

    // dropped after the first poll
    let cancelled = tokio::time::timeout(
        std::time::Duration::ZERO,
        db.send_message(bob.id, key, "cancelled", window_start, 10),
    )
    .await;
    assert!(cancelled.is_err());

    let mut committed = 0;
    for _ in 0..100 {
        if let Some(conversation) = db.get_conversation(key).await.unwrap() {
            committed = db.count_messages(conversation.id).await.unwrap();
            if committed == 1 {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(committed, 1);

    // no transaction was left open on a pooled connection
    for i in 0..5 {
        db.send_message(alice.id, key, &format!("after {i}"), window_start, 10)
            .await
            .unwrap();
    }
    let conversation = db.get_conversation(key).await.unwrap().unwrap();
    assert_eq!(db.count_messages(conversation.id).await.unwrap(), 6);
}

#[tokio::test]
async fn test_rate_limited_rollback_releases_connection() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let key = ConversationKey::new(alice.id, bob.id).unwrap();
    let window_start = Utc::now() - Duration::seconds(10);

    db.send_message(bob.id, key, "only one", window_start, 1).await.unwrap();
    for _ in 0..10 {
        let rejected = db.send_message(bob.id, key, "again", window_start, 1).await;
        assert!(matches!(rejected, Err(crate::error::AppError::RateLimited)));
    }

    let reply = db.send_message(alice.id, key, "reply", window_start, 1).await.unwrap();
    assert_eq!(reply.sender_id, alice.id);
    create_text_post(&db, alice.id, "still writable").await;
}

#[tokio::test]
async fn test_send_message_blocked_creates_no_conversation() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let key = ConversationKey::new(alice.id, bob.id).unwrap();

    db.insert_block(alice.id, bob.id).await.unwrap();
    let result = db
        .send_message(bob.id, key, "hi", Utc::now() - Duration::seconds(10), 10)
        .await;
    assert!(matches!(result, Err(crate::error::AppError::Forbidden(_))));
    assert!(db.get_conversation(key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_conversations_and_mark_read() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let key = ConversationKey::new(alice.id, bob.id).unwrap();
    let window_start = Utc::now() - Duration::seconds(10);

    db.insert_follow(bob.id, alice.id, FollowState::Accepted).await.unwrap();
    db.send_message(bob.id, key, "one", window_start, 10).await.unwrap();
    db.send_message(bob.id, key, "two", window_start, 10).await.unwrap();

    let inbox = db.list_conversations(alice.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    let row = &inbox[0];
    assert_eq!(row.other_id, bob.id);
    assert_eq!(row.unread_count, 2);
    assert_eq!(row.last_message_content.as_deref(), Some("two"));
    assert!(!row.i_follow);
    assert!(row.follows_me);

    let bob_inbox = db.list_conversations(bob.id).await.unwrap();
    assert_eq!(bob_inbox[0].unread_count, 0);

    assert_eq!(db.mark_conversation_read(row.conversation_id, alice.id).await.unwrap(), 2);
    assert_eq!(db.mark_conversation_read(row.conversation_id, alice.id).await.unwrap(), 0);
    let inbox = db.list_conversations(alice.id).await.unwrap();
    assert_eq!(inbox[0].unread_count, 0);
}

#[tokio::test]
async fn test_activity_queries_exclude_self() {
    let (db, _temp_dir) = create_test_db().await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let post_id = create_text_post(&db, alice.id, "post").await;
    let since = Utc::now() - Duration::days(7);

    db.toggle_like(alice.id, post_id).await.unwrap();
    db.toggle_like(bob.id, post_id).await.unwrap();
    db.insert_comment(post_id, alice.id, None, "self").await.unwrap();
    db.insert_comment(post_id, bob.id, None, "great").await.unwrap();
    db.insert_follow(bob.id, alice.id, FollowState::Accepted).await.unwrap();

    let likes = db.get_like_activity(alice.id, since, 200).await.unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].actor_username, "bob");
    assert_eq!(likes[0].post_id, Some(post_id));

    let comments = db.get_comment_activity(alice.id, since, 200).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment_text.as_deref(), Some("great"));

    let follows = db.get_follow_activity(alice.id, since, 200).await.unwrap();
    assert_eq!(follows.len(), 1);
    assert!(follows[0].post_id.is_none());

    assert_eq!(db.count_activity_since(alice.id, since).await.unwrap(), 3);
    assert_eq!(
        db.count_activity_since(alice.id, Utc::now() + Duration::seconds(1))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_search_users_case_insensitive() {
    let (db, _temp_dir) = create_test_db().await;
    create_user(&db, "alice").await;
    create_user(&db, "malice").await;
    create_user(&db, "bob").await;

    let found = db.search_users("ALI", 10).await.unwrap();
    let names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "malice"]);

    assert!(db.search_users("%", 10).await.unwrap().is_empty());
}
