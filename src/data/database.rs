//! SQLite database operations
//!
//! All database access goes through this module.

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Shared visibility rule for listing posts: public authors, the viewer's
/// own posts and posts of private authors the viewer follows.
/// Expects the author joined as `u`, the post as `p`, and one viewer id bound twice.
const POST_VISIBLE_TO_VIEWER: &str = r#"
    (u.is_private = 0
     OR p.author_id = ?
     OR EXISTS (SELECT 1 FROM follows vf
                WHERE vf.follower_id = ? AND vf.followed_id = p.author_id AND vf.state = 'ACCEPTED'))
"#;

/// Escape `%`, `_` and `\` and wrap in wildcards for a substring `LIKE ... ESCAPE '\'`.
pub(crate) fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    use sqlx::Executor;
                    conn.execute("PRAGMA busy_timeout = 5000").await?;
                    conn.execute("PRAGMA journal_mode = WAL").await?;
                    conn.execute("PRAGMA foreign_keys = ON").await?;
                    Ok(())
                })
            })
            .connect(&connection_string)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Connectivity check used by the health endpoint
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run `work` inside `BEGIN IMMEDIATE` ... `COMMIT` on its own task.
    ///
    /// The task outlives a cancelled caller, so a connection never goes back
    /// to the pool with a transaction still open. `work` hands the connection
    /// back together with its result; an `Err` rolls back.
    async fn run_immediate<T, F, Fut>(&self, work: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(PoolConnection<Sqlite>) -> Fut + Send + 'static,
        Fut: Future<Output = (PoolConnection<Sqlite>, Result<T, AppError>)> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let mut conn = pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let (mut conn, result) = work(conn).await;
            let result = match result {
                Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
                    Ok(_) => return Ok(value),
                    Err(error) => Err(AppError::from(error)),
                },
                Err(error) => Err(error),
            };

            if let Err(rollback_error) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                tracing::error!(error = %rollback_error, "Rollback failed, closing connection");
                // closing the connection makes SQLite discard the transaction
                drop(conn.detach());
            }
            result
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("transaction task failed: {e}")))?
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// # Errors
    /// `Validation` when the username or email is already taken
    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<User, AppError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, display_name, email, password_hash, is_private, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(display_name)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(AppError::validation(
                "Username or email already in use",
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Resolve usernames to ids, silently skipping unknown names
    pub async fn get_user_ids_by_usernames(&self, usernames: &[String]) -> Result<Vec<i64>, AppError> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT id FROM users WHERE username IN (");
        {
            let mut separated = query_builder.separated(", ");
            for username in usernames {
                separated.push_bind(username.as_str());
            }
        }
        query_builder.push(")");

        let ids = query_builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Batch-load public identities
    pub async fn get_user_summaries(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, UserSummary>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, username, display_name, avatar_url FROM users WHERE id IN ",
        );
        push_id_list(&mut query_builder, ids);

        let users = query_builder
            .build_query_as::<UserSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    /// Apply a partial profile update
    pub async fn patch_user_profile(&self, id: i64, patch: &ProfilePatch) -> Result<(), AppError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        {
            let mut separated = query_builder.separated(", ");
            if let Some(display_name) = &patch.display_name {
                separated.push("display_name = ");
                separated.push_bind_unseparated(display_name.clone());
            }
            if let Some(bio) = &patch.bio {
                separated.push("bio = ");
                separated.push_bind_unseparated(bio.clone());
            }
            if let Some(avatar_url) = &patch.avatar_url {
                separated.push("avatar_url = ");
                separated.push_bind_unseparated(avatar_url.clone());
            }
            if let Some(cover_url) = &patch.cover_url {
                separated.push("cover_url = ");
                separated.push_bind_unseparated(cover_url.clone());
            }
            if let Some(is_private) = patch.is_private {
                separated.push("is_private = ");
                separated.push_bind_unseparated(is_private);
            }
        }
        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);

        query_builder.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Change email, `Validation` if another account uses it
    pub async fn update_user_email(&self, id: i64, email: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::validation("Email already in use")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_user_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_notifications_seen_at(
        &self,
        id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET notifications_seen_at = ? WHERE id = ?")
            .bind(seen_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Case-insensitive substring search on username and display name
    pub async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserSummary>, AppError> {
        let pattern = like_pattern(query);
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, username, display_name, avatar_url FROM users
            WHERE username LIKE ? ESCAPE '\' OR display_name LIKE ? ESCAPE '\'
            ORDER BY username ASC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    // =========================================================================
    // Follows
    // =========================================================================

    pub async fn get_follow_state(
        &self,
        follower_id: i64,
        followed_id: i64,
    ) -> Result<Option<FollowState>, AppError> {
        let state = sqlx::query_scalar::<_, FollowState>(
            "SELECT state FROM follows WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    /// Insert a follow edge
    ///
    /// # Errors
    /// `Validation` if an edge already exists for the pair
    pub async fn insert_follow(
        &self,
        follower_id: i64,
        followed_id: i64,
        state: FollowState,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id, state, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(state)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::validation(
                "You already follow or requested to follow this user",
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the edge whatever its state
    ///
    /// # Returns
    /// `true` if an edge existed
    pub async fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of accepted followers
    pub async fn count_followers(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE followed_id = ? AND state = 'ACCEPTED'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Number of accepted followings
    pub async fn count_following(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND state = 'ACCEPTED'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn get_following_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT followed_id FROM follows WHERE follower_id = ? AND state = 'ACCEPTED'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Users waiting for approval, ordered by username
    pub async fn get_pending_requesters(&self, user_id: i64) -> Result<Vec<UserSummary>, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, u.display_name, u.avatar_url
            FROM follows f JOIN users u ON u.id = f.follower_id
            WHERE f.followed_id = ? AND f.state = 'PENDING'
            ORDER BY u.username ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Flip a pending request to accepted
    ///
    /// # Returns
    /// `false` if no pending request existed
    pub async fn accept_follow_request(
        &self,
        followed_id: i64,
        follower_id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE follows SET state = 'ACCEPTED', created_at = ?
            WHERE follower_id = ? AND followed_id = ? AND state = 'PENDING'
            "#,
        )
        .bind(Utc::now())
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop a pending request
    ///
    /// # Returns
    /// `false` if no pending request existed
    pub async fn reject_follow_request(
        &self,
        followed_id: i64,
        follower_id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = ? AND followed_id = ? AND state = 'PENDING'",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Accept every pending request, used when an account turns public
    pub async fn accept_all_follow_requests(&self, followed_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE follows SET state = 'ACCEPTED', created_at = ? WHERE followed_id = ? AND state = 'PENDING'",
        )
        .bind(Utc::now())
        .bind(followed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Idempotent block
    pub async fn insert_block(&self, blocker_id: i64, blocked_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent unblock
    pub async fn delete_block(&self, blocker_id: i64, blocked_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Both directions of the block relation between `me` and `other`
    ///
    /// # Returns
    /// `(blocked_by_me, blocked_me)`
    pub async fn get_block_status(&self, me: i64, other: i64) -> Result<(bool, bool), AppError> {
        let (blocked_by_me, blocked_me): (bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?),
                EXISTS (SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?)
            "#,
        )
        .bind(me)
        .bind(other)
        .bind(other)
        .bind(me)
        .fetch_one(&self.pool)
        .await?;
        Ok((blocked_by_me, blocked_me))
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post with attachments, tags and poll atomically.
    ///
    /// # Returns
    /// Id of the new post
    pub async fn insert_post(&self, post: &NewPost) -> Result<i64, AppError> {
        let now = Utc::now();
        let post = post.clone();

        self.run_immediate(move |mut conn| async move {
            let result: Result<i64, AppError> = async {
                let post_id: i64 = sqlx::query_scalar(
                    "INSERT INTO posts (author_id, text, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(post.author_id)
                .bind(&post.text)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *conn)
                .await?;

                for (position, attachment) in post.attachments.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO post_attachments (post_id, url, media_type, position) VALUES (?, ?, ?, ?)",
                    )
                    .bind(post_id)
                    .bind(&attachment.url)
                    .bind(attachment.media_type)
                    .bind(position as i64)
                    .execute(&mut *conn)
                    .await?;
                }

                for user_id in &post.tag_user_ids {
                    sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, user_id) VALUES (?, ?)")
                        .bind(post_id)
                        .bind(user_id)
                        .execute(&mut *conn)
                        .await?;
                }

                if let Some(poll) = &post.poll {
                    let poll_id: i64 = sqlx::query_scalar(
                        "INSERT INTO polls (post_id, question, created_at) VALUES (?, ?, ?) RETURNING id",
                    )
                    .bind(post_id)
                    .bind(&poll.question)
                    .bind(now)
                    .fetch_one(&mut *conn)
                    .await?;

                    for (position, option) in poll.options.iter().enumerate() {
                        sqlx::query(
                            "INSERT INTO poll_options (poll_id, text, position) VALUES (?, ?, ?)",
                        )
                        .bind(poll_id)
                        .bind(option)
                        .bind(position as i64)
                        .execute(&mut *conn)
                        .await?;
                    }
                }

                Ok(post_id)
            }
            .await;
            (conn, result)
        })
        .await
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    pub async fn update_post_text(&self, id: i64, text: Option<&str>) -> Result<(), AppError> {
        sqlx::query("UPDATE posts SET text = ?, updated_at = ? WHERE id = ?")
            .bind(text)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a post; attachments, tags, poll, likes, saves and comments cascade.
    pub async fn delete_post(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Posts by followed accounts (accepted) and the user, newest first
    pub async fn get_feed_posts(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            WHERE p.author_id = ?
               OR p.author_id IN (
                    SELECT followed_id FROM follows WHERE follower_id = ? AND state = 'ACCEPTED'
               )
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn count_feed_posts(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM posts p
            WHERE p.author_id = ?
               OR p.author_id IN (
                    SELECT followed_id FROM follows WHERE follower_id = ? AND state = 'ACCEPTED'
               )
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// All posts visible to `viewer_id`, newest first.
    ///
    /// `tag` filters on a case-insensitive `#tag` substring of the text.
    /// Authors in `exclude_authors` are skipped.
    pub async fn get_explore_posts(
        &self,
        viewer_id: Option<i64>,
        tag: Option<&str>,
        exclude_authors: &[i64],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let viewer = viewer_id.unwrap_or(0);
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT p.* FROM posts p JOIN users u ON u.id = p.author_id WHERE ",
        );
        push_visibility(&mut query_builder, viewer);

        if let Some(tag) = tag {
            query_builder.push(" AND p.text LIKE ");
            query_builder.push_bind(like_pattern(&format!("#{tag}")));
            query_builder.push(" ESCAPE '\\'");
        }
        if !exclude_authors.is_empty() {
            query_builder.push(" AND p.author_id NOT IN ");
            push_id_list(&mut query_builder, exclude_authors);
        }

        query_builder.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let posts = query_builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    pub async fn get_user_posts(
        &self,
        author_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts WHERE author_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn count_user_posts(&self, author_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Posts the user saved, newest post first
    pub async fn get_saved_posts(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM saves s JOIN posts p ON p.id = s.post_id
            WHERE s.user_id = ?
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Text of the newest posts by public authors since `since`, capped at `cap`
    pub async fn get_recent_post_texts(
        &self,
        since: DateTime<Utc>,
        cap: i64,
    ) -> Result<Vec<String>, AppError> {
        let texts = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.text FROM posts p JOIN users u ON u.id = p.author_id
            WHERE p.created_at >= ? AND p.text IS NOT NULL AND u.is_private = 0
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(cap)
        .fetch_all(&self.pool)
        .await?;
        Ok(texts)
    }

    /// Case-insensitive substring search on post text, newest first
    pub async fn search_posts(
        &self,
        viewer_id: Option<i64>,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT p.* FROM posts p JOIN users u ON u.id = p.author_id WHERE p.text LIKE ",
        );
        query_builder.push_bind(like_pattern(query));
        query_builder.push(" ESCAPE '\\' AND ");
        push_visibility(&mut query_builder, viewer_id.unwrap_or(0));
        query_builder.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        query_builder.push_bind(limit);

        let posts = query_builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    // =========================================================================
    // Post details (batched)
    // =========================================================================

    pub async fn get_attachments_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<Attachment>, AppError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT post_id, url, media_type, position FROM post_attachments WHERE post_id IN ",
        );
        push_id_list(&mut query_builder, post_ids);
        query_builder.push(" ORDER BY post_id, position");

        let attachments = query_builder
            .build_query_as::<Attachment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(attachments)
    }

    pub async fn get_tags_for_posts(&self, post_ids: &[i64]) -> Result<Vec<PostTag>, AppError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT t.post_id, u.id, u.username, u.display_name, u.avatar_url
            FROM post_tags t JOIN users u ON u.id = t.user_id
            WHERE t.post_id IN "#,
        );
        push_id_list(&mut query_builder, post_ids);
        query_builder.push(" ORDER BY u.username");

        let tags = query_builder
            .build_query_as::<PostTag>()
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    /// `post_id -> count` for a table keyed by post (likes, saves, comments)
    async fn count_by_post(
        &self,
        table: &'static str,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT post_id, COUNT(*) FROM {table} WHERE post_id IN "
        ));
        push_id_list(&mut query_builder, post_ids);
        query_builder.push(" GROUP BY post_id");

        let rows = query_builder
            .build_query_as::<(i64, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Posts among `post_ids` that have a row for `user_id` in `table`
    async fn flagged_by_user(
        &self,
        table: &'static str,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT post_id FROM {table} WHERE user_id = "
        ));
        query_builder.push_bind(user_id);
        query_builder.push(" AND post_id IN ");
        push_id_list(&mut query_builder, post_ids);

        let ids = query_builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn get_like_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, AppError> {
        self.count_by_post("likes", post_ids).await
    }

    pub async fn get_comment_counts(
        &self,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, AppError> {
        self.count_by_post("comments", post_ids).await
    }

    pub async fn get_liked_post_ids(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, AppError> {
        self.flagged_by_user("likes", user_id, post_ids).await
    }

    pub async fn get_saved_post_ids(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, AppError> {
        self.flagged_by_user("saves", user_id, post_ids).await
    }

    // =========================================================================
    // Likes & Saves
    // =========================================================================

    /// Toggle a like
    ///
    /// # Returns
    /// `(liked, like_count)` after the toggle
    pub async fn toggle_like(&self, user_id: i64, post_id: i64) -> Result<(bool, i64), AppError> {
        let removed = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        let liked = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                "INSERT OR IGNORE INTO likes (user_id, post_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(post_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            true
        };

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((liked, count))
    }

    /// Idempotent save
    pub async fn insert_save(&self, user_id: i64, post_id: i64) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO saves (user_id, post_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(post_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Idempotent unsave
    pub async fn delete_save(&self, user_id: i64, post_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM saves WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Polls
    // =========================================================================

    pub async fn get_polls_for_posts(&self, post_ids: &[i64]) -> Result<Vec<Poll>, AppError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder =
            QueryBuilder::<Sqlite>::new("SELECT id, post_id, question FROM polls WHERE post_id IN ");
        push_id_list(&mut query_builder, post_ids);

        let polls = query_builder
            .build_query_as::<Poll>()
            .fetch_all(&self.pool)
            .await?;
        Ok(polls)
    }

    /// Options with live vote counts, ordered by poll then position
    pub async fn get_poll_options(&self, poll_ids: &[i64]) -> Result<Vec<PollOption>, AppError> {
        if poll_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT o.id, o.poll_id, o.text, o.position,
                   (SELECT COUNT(*) FROM poll_votes v WHERE v.option_id = o.id) AS votes
            FROM poll_options o
            WHERE o.poll_id IN "#,
        );
        push_id_list(&mut query_builder, poll_ids);
        query_builder.push(" ORDER BY o.poll_id, o.position");

        let options = query_builder
            .build_query_as::<PollOption>()
            .fetch_all(&self.pool)
            .await?;
        Ok(options)
    }

    /// `poll_id -> option_id` chosen by `user_id`
    pub async fn get_user_poll_votes(
        &self,
        user_id: i64,
        poll_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, AppError> {
        if poll_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query_builder =
            QueryBuilder::<Sqlite>::new("SELECT poll_id, option_id FROM poll_votes WHERE user_id = ");
        query_builder.push_bind(user_id);
        query_builder.push(" AND poll_id IN ");
        push_id_list(&mut query_builder, poll_ids);

        let rows = query_builder
            .build_query_as::<(i64, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Cast or change a vote; one row per (poll, user)
    pub async fn upsert_poll_vote(
        &self,
        poll_id: i64,
        user_id: i64,
        option_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO poll_votes (poll_id, user_id, option_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(poll_id, user_id)
            DO UPDATE SET option_id = excluded.option_id, created_at = excluded.created_at
            "#,
        )
        .bind(poll_id)
        .bind(user_id)
        .bind(option_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_poll_votes(&self, poll_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poll_votes WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// All comments of a post joined with their authors, oldest first
    pub async fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>, AppError> {
        let comments = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.parent_id, c.text, c.created_at,
                   u.id AS author_id, u.username AS author_username,
                   u.display_name AS author_display_name, u.avatar_url AS author_avatar_url
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn get_comment(&self, id: i64) -> Result<Option<CommentRow>, AppError> {
        let comment = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.parent_id, c.text, c.created_at,
                   u.id AS author_id, u.username AS author_username,
                   u.display_name AS author_display_name, u.avatar_url AS author_avatar_url
            FROM comments c JOIN users u ON u.id = c.author_id
            WHERE c.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    pub async fn insert_comment(
        &self,
        post_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        text: &str,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO comments (post_id, author_id, parent_id, text, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(parent_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Delete a comment; replies cascade
    pub async fn delete_comment(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Conversations & Messages
    // =========================================================================

    pub async fn get_conversation(
        &self,
        key: ConversationKey,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE user_low = ? AND user_high = ?",
        )
        .bind(key.low)
        .bind(key.high)
        .fetch_optional(&self.pool)
        .await?;
        Ok(conversation)
    }

    /// Send a message in one transaction.
    ///
    /// Counts the sender's messages newer than `window_start`, checks blocks in
    /// both directions, upserts the conversation and appends the message.
    /// Nothing is written when any check fails.
    ///
    /// # Errors
    /// - `RateLimited` when the sender already sent `rate_limit` messages in the window
    /// - `Forbidden` when either side blocked the other
    pub async fn send_message(
        &self,
        sender_id: i64,
        key: ConversationKey,
        content: &str,
        window_start: DateTime<Utc>,
        rate_limit: i64,
    ) -> Result<Message, AppError> {
        let recipient_id = key.other(sender_id);
        let now = Utc::now();

        let content = content.to_string();

        self.run_immediate(move |mut conn| async move {
            let result: Result<Message, AppError> = async {
                let recent: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM messages WHERE sender_id = ? AND created_at > ?",
                )
                .bind(sender_id)
                .bind(window_start)
                .fetch_one(&mut *conn)
                .await?;
                if recent >= rate_limit {
                    return Err(AppError::RateLimited);
                }

                let (blocked_by_me, blocked_me): (bool, bool) = sqlx::query_as(
                    r#"
                    SELECT
                        EXISTS (SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?),
                        EXISTS (SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?)
                    "#,
                )
                .bind(sender_id)
                .bind(recipient_id)
                .bind(recipient_id)
                .bind(sender_id)
                .fetch_one(&mut *conn)
                .await?;
                if blocked_by_me {
                    return Err(AppError::forbidden(
                        "You blocked this user. Unblock them to send messages.",
                    ));
                }
                if blocked_me {
                    return Err(AppError::forbidden("You can't message this user."));
                }

                let conversation_id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO conversations (user_low, user_high, created_at, last_activity_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(user_low, user_high) DO UPDATE SET last_activity_at = excluded.last_activity_at
                    RETURNING id
                    "#,
                )
                .bind(key.low)
                .bind(key.high)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *conn)
                .await?;

                let message = sqlx::query_as::<_, Message>(
                    r#"
                    INSERT INTO messages (conversation_id, sender_id, content, is_read, created_at)
                    VALUES (?, ?, ?, 0, ?)
                    RETURNING *
                    "#,
                )
                .bind(conversation_id)
                .bind(sender_id)
                .bind(&content)
                .bind(now)
                .fetch_one(&mut *conn)
                .await?;

                Ok(message)
            }
            .await;
            (conn, result)
        })
        .await
    }

    /// Inbox of `user_id`, most recently active first, in one query
    pub async fn list_conversations(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT
                c.id AS conversation_id,
                c.last_activity_at,
                u.id AS other_id,
                u.username AS other_username,
                u.display_name AS other_display_name,
                u.avatar_url AS other_avatar_url,
                lm.id AS last_message_id,
                lm.sender_id AS last_message_sender_id,
                lm.content AS last_message_content,
                lm.created_at AS last_message_created_at,
                (SELECT COUNT(*) FROM messages m
                 WHERE m.conversation_id = c.id AND m.sender_id != ? AND m.is_read = 0) AS unread_count,
                EXISTS (SELECT 1 FROM follows f
                        WHERE f.follower_id = ? AND f.followed_id = u.id AND f.state = 'ACCEPTED') AS i_follow,
                EXISTS (SELECT 1 FROM follows f
                        WHERE f.follower_id = u.id AND f.followed_id = ? AND f.state = 'ACCEPTED') AS follows_me
            FROM conversations c
            JOIN users u
              ON u.id = CASE WHEN c.user_low = ? THEN c.user_high ELSE c.user_low END
            LEFT JOIN messages lm
              ON lm.id = (SELECT m2.id FROM messages m2
                          WHERE m2.conversation_id = c.id
                          ORDER BY m2.created_at DESC, m2.id DESC
                          LIMIT 1)
            WHERE c.user_low = ? OR c.user_high = ?
            ORDER BY c.last_activity_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Page of a conversation, oldest first
    pub async fn get_messages(
        &self,
        conversation_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages WHERE conversation_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    pub async fn count_messages(&self, conversation_id: i64) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Mark every message not sent by `reader_id` as read
    ///
    /// # Returns
    /// Number of messages flipped
    pub async fn mark_conversation_read(
        &self,
        conversation_id: i64,
        reader_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = 1
            WHERE conversation_id = ? AND sender_id != ? AND is_read = 0
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Message together with its conversation
    pub async fn get_message_with_conversation(
        &self,
        id: i64,
    ) -> Result<Option<(Message, Conversation)>, AppError> {
        let Some(message) = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
                .bind(message.conversation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation.map(|conversation| (message, conversation)))
    }

    pub async fn delete_message(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Notifications (derived)
    // =========================================================================

    /// Likes by others on `user_id`'s posts since `since`, newest first
    pub async fn get_like_activity(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ActivityRow>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT u.id AS actor_id, u.username AS actor_username,
                   u.display_name AS actor_display_name, u.avatar_url AS actor_avatar_url,
                   p.id AS post_id, p.text AS post_text,
                   (SELECT a.url FROM post_attachments a WHERE a.post_id = p.id ORDER BY a.position LIMIT 1) AS post_thumb_url,
                   (SELECT a.media_type FROM post_attachments a WHERE a.post_id = p.id ORDER BY a.position LIMIT 1) AS post_thumb_type,
                   NULL AS comment_id, NULL AS comment_text,
                   l.created_at
            FROM likes l
            JOIN posts p ON p.id = l.post_id
            JOIN users u ON u.id = l.user_id
            WHERE p.author_id = ? AND l.user_id != ? AND l.created_at >= ?
            ORDER BY l.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Comments by others on `user_id`'s posts since `since`, newest first
    pub async fn get_comment_activity(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ActivityRow>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT u.id AS actor_id, u.username AS actor_username,
                   u.display_name AS actor_display_name, u.avatar_url AS actor_avatar_url,
                   p.id AS post_id, p.text AS post_text,
                   (SELECT a.url FROM post_attachments a WHERE a.post_id = p.id ORDER BY a.position LIMIT 1) AS post_thumb_url,
                   (SELECT a.media_type FROM post_attachments a WHERE a.post_id = p.id ORDER BY a.position LIMIT 1) AS post_thumb_type,
                   c.id AS comment_id, c.text AS comment_text,
                   c.created_at
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            JOIN users u ON u.id = c.author_id
            WHERE p.author_id = ? AND c.author_id != ? AND c.created_at >= ?
            ORDER BY c.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Accepted follows of `user_id` since `since`, newest first
    pub async fn get_follow_activity(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ActivityRow>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT u.id AS actor_id, u.username AS actor_username,
                   u.display_name AS actor_display_name, u.avatar_url AS actor_avatar_url,
                   NULL AS post_id, NULL AS post_text, NULL AS post_thumb_url, NULL AS post_thumb_type,
                   NULL AS comment_id, NULL AS comment_text,
                   f.created_at
            FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.followed_id = ? AND f.state = 'ACCEPTED' AND f.created_at >= ?
            ORDER BY f.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Number of likes, comments and follows newer than `since`
    pub async fn count_activity_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM likes l JOIN posts p ON p.id = l.post_id
                 WHERE p.author_id = ? AND l.user_id != ? AND l.created_at > ?)
              + (SELECT COUNT(*) FROM comments c JOIN posts p ON p.id = c.post_id
                 WHERE p.author_id = ? AND c.author_id != ? AND c.created_at > ?)
              + (SELECT COUNT(*) FROM follows f
                 WHERE f.followed_id = ? AND f.state = 'ACCEPTED' AND f.created_at > ?)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(since)
        .bind(user_id)
        .bind(user_id)
        .bind(since)
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

fn push_visibility(builder: &mut QueryBuilder<'_, Sqlite>, viewer_id: i64) {
    let mut parts = POST_VISIBLE_TO_VIEWER.split('?');
    if let Some(head) = parts.next() {
        builder.push(head);
    }
    for part in parts {
        builder.push_bind(viewer_id);
        builder.push(part);
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ab"), "%ab%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
