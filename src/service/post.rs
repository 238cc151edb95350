//! Post service
//!
//! Posts, likes, saves, polls and comments. Every list of posts is turned
//! into [`PostView`]s by [`present_posts`], which loads the related rows
//! with one batched query per relation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{
    Attachment, CommentRow, Database, FollowState, NewAttachment, NewPoll, NewPost, Poll,
    PollOption, Post, UserSummary,
};
use crate::error::AppError;
use crate::metrics::POSTS_CREATED_TOTAL;
use crate::storage::MediaStorage;

const MIN_POLL_OPTIONS: usize = 2;
const MAX_POLL_OPTIONS: usize = 4;

/// A post as rendered to clients
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub author: UserSummary,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<UserSummary>,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
    pub saved_by_me: bool,
    pub poll: Option<PollView>,
    /// Set on explore posts blended into a short feed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub suggested: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub id: i64,
    pub question: String,
    pub options: Vec<PollOption>,
    pub total: i64,
    /// Position of the viewer's choice
    pub selected: Option<i64>,
}

impl PollView {
    fn new(poll: Poll, mut options: Vec<PollOption>, chosen_option_id: Option<i64>) -> Self {
        options.sort_by_key(|option| option.position);
        let total = options.iter().map(|option| option.votes).sum();
        let selected = chosen_option_id.and_then(|chosen| {
            options
                .iter()
                .find(|option| option.id == chosen)
                .map(|option| option.position)
        });
        Self {
            id: poll.id,
            question: poll.question,
            options,
            total,
            selected,
        }
    }
}

/// Poll tally returned by the vote and results endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PollResults {
    pub results: Vec<PollOption>,
    pub total: i64,
    pub selected: Option<i64>,
}

impl From<PollView> for PollResults {
    fn from(view: PollView) -> Self {
        Self {
            results: view.options,
            total: view.total,
            selected: view.selected,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: i64,
}

/// Client input for a new post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostDraft {
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
    /// Usernames to tag, with or without a leading `@`
    #[serde(default)]
    pub tags: Vec<String>,
    pub poll: Option<NewPoll>,
}

/// A comment with its replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: UserSummary,
    pub replies: Vec<CommentView>,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        let author = row.author();
        Self {
            id: row.id,
            post_id: row.post_id,
            parent_id: row.parent_id,
            text: row.text,
            created_at: row.created_at,
            author,
            replies: Vec::new(),
        }
    }
}

fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn normalize_poll(poll: &NewPoll) -> Result<NewPoll, AppError> {
    let question = poll.question.trim();
    if question.is_empty() {
        return Err(AppError::validation("Poll question is required"));
    }

    let options: Vec<String> = poll
        .options
        .iter()
        .map(|option| option.trim().to_string())
        .collect();
    if options.iter().any(String::is_empty) {
        return Err(AppError::validation("Poll options cannot be empty"));
    }
    if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
        return Err(AppError::validation(format!(
            "A poll needs between {MIN_POLL_OPTIONS} and {MAX_POLL_OPTIONS} options"
        )));
    }

    Ok(NewPoll {
        question: question.to_string(),
        options,
    })
}

fn normalize_tag_usernames(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim().trim_start_matches('@').to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_ascii_lowercase()))
        .collect()
}

/// Arrange comments as roots with one level of replies.
///
/// A reply to a reply is attached to the root of its chain. Comments whose
/// parent is missing become roots. Input order (oldest first) is kept.
pub(crate) fn build_comment_tree(rows: Vec<CommentRow>) -> Vec<CommentView> {
    let parents: HashMap<i64, Option<i64>> =
        rows.iter().map(|row| (row.id, row.parent_id)).collect();

    let root_of = |id: i64| -> i64 {
        let mut current = id;
        for _ in 0..parents.len() {
            match parents.get(&current).copied().flatten() {
                Some(parent) if parents.contains_key(&parent) => current = parent,
                _ => break,
            }
        }
        current
    };

    let mut roots: Vec<CommentView> = Vec::new();
    let mut root_index: HashMap<i64, usize> = HashMap::new();
    let mut replies: Vec<(i64, CommentView)> = Vec::new();

    for row in rows {
        let root = match row.parent_id {
            Some(parent) if parents.contains_key(&parent) => Some(root_of(parent)),
            _ => None,
        };
        match root {
            Some(root) if root != row.id => replies.push((root, row.into())),
            _ => {
                root_index.insert(row.id, roots.len());
                roots.push(row.into());
            }
        }
    }

    for (root, reply) in replies {
        match root_index.get(&root) {
            Some(&idx) => roots[idx].replies.push(reply),
            None => {
                root_index.insert(reply.id, roots.len());
                roots.push(reply);
            }
        }
    }

    roots
}

/// Turn posts into views, keeping their order.
pub async fn present_posts(
    db: &Database,
    viewer_id: Option<i64>,
    posts: Vec<Post>,
) -> Result<Vec<PostView>, AppError> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let mut author_ids: Vec<i64> = posts.iter().map(|post| post.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors = db.get_user_summaries(&author_ids).await?;

    let mut attachments: HashMap<i64, Vec<Attachment>> = HashMap::new();
    for attachment in db.get_attachments_for_posts(&post_ids).await? {
        attachments
            .entry(attachment.post_id)
            .or_default()
            .push(attachment);
    }

    let mut tags: HashMap<i64, Vec<UserSummary>> = HashMap::new();
    for tag in db.get_tags_for_posts(&post_ids).await? {
        tags.entry(tag.post_id).or_default().push(UserSummary {
            id: tag.id,
            username: tag.username,
            display_name: tag.display_name,
            avatar_url: tag.avatar_url,
        });
    }

    let like_counts = db.get_like_counts(&post_ids).await?;
    let comment_counts = db.get_comment_counts(&post_ids).await?;
    let (liked, saved) = match viewer_id {
        Some(viewer) => (
            db.get_liked_post_ids(viewer, &post_ids).await?,
            db.get_saved_post_ids(viewer, &post_ids).await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    let polls = db.get_polls_for_posts(&post_ids).await?;
    let poll_ids: Vec<i64> = polls.iter().map(|poll| poll.id).collect();
    let mut options: HashMap<i64, Vec<PollOption>> = HashMap::new();
    for option in db.get_poll_options(&poll_ids).await? {
        options.entry(option.poll_id).or_default().push(option);
    }
    let votes = match viewer_id {
        Some(viewer) => db.get_user_poll_votes(viewer, &poll_ids).await?,
        None => HashMap::new(),
    };
    let mut poll_views: HashMap<i64, PollView> = polls
        .into_iter()
        .map(|poll| {
            let poll_options = options.remove(&poll.id).unwrap_or_default();
            let chosen = votes.get(&poll.id).copied();
            (poll.post_id, PollView::new(poll, poll_options, chosen))
        })
        .collect();

    let views = posts
        .into_iter()
        .filter_map(|post| {
            let author = authors.get(&post.author_id)?.clone();
            Some(PostView {
                id: post.id,
                author,
                text: post.text,
                created_at: post.created_at,
                updated_at: post.updated_at,
                attachments: attachments.remove(&post.id).unwrap_or_default(),
                tags: tags.remove(&post.id).unwrap_or_default(),
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                liked_by_me: liked.contains(&post.id),
                saved_by_me: saved.contains(&post.id),
                poll: poll_views.remove(&post.id),
                suggested: false,
            })
        })
        .collect();

    Ok(views)
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    /// Load a post the viewer is allowed to see.
    ///
    /// Posts of private accounts are only visible to the author and
    /// accepted followers; everyone else gets a 404.
    async fn visible_post(&self, post_id: i64, viewer_id: Option<i64>) -> Result<Post, AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        if viewer_id == Some(post.author_id) {
            return Ok(post);
        }

        let author = self
            .db
            .get_user(post.author_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        if !author.is_private {
            return Ok(post);
        }

        if let Some(viewer) = viewer_id {
            if self.db.get_follow_state(viewer, author.id).await? == Some(FollowState::Accepted) {
                return Ok(post);
            }
        }

        Err(AppError::not_found("Post"))
    }

    async fn present_one(&self, viewer_id: Option<i64>, post: Post) -> Result<PostView, AppError> {
        present_posts(&self.db, viewer_id, vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Post"))
    }

    /// Create a post
    ///
    /// Text is trimmed; a post without text needs at least one attachment.
    /// Tagged usernames that don't exist are ignored.
    pub async fn create(&self, author_id: i64, draft: PostDraft) -> Result<PostView, AppError> {
        let text = normalize_text(draft.text.as_deref());

        let attachments: Vec<NewAttachment> = draft
            .attachments
            .into_iter()
            .map(|attachment| NewAttachment {
                url: attachment.url.trim().to_string(),
                media_type: attachment.media_type,
            })
            .collect();
        if attachments.iter().any(|attachment| attachment.url.is_empty()) {
            return Err(AppError::validation("Attachment URL is required"));
        }
        if text.is_none() && attachments.is_empty() {
            return Err(AppError::validation(
                "A post needs text or at least one attachment",
            ));
        }

        let poll = draft.poll.as_ref().map(normalize_poll).transpose()?;

        let usernames = normalize_tag_usernames(&draft.tags);
        let mut tag_user_ids = self.db.get_user_ids_by_usernames(&usernames).await?;
        tag_user_ids.sort_unstable();
        tag_user_ids.dedup();

        let post_id = self
            .db
            .insert_post(&NewPost {
                author_id,
                text,
                attachments,
                tag_user_ids,
                poll,
            })
            .await?;
        POSTS_CREATED_TOTAL.inc();
        tracing::info!(post_id, author_id, "Post created");

        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        self.present_one(Some(author_id), post).await
    }

    pub async fn get(&self, post_id: i64, viewer_id: Option<i64>) -> Result<PostView, AppError> {
        let post = self.visible_post(post_id, viewer_id).await?;
        self.present_one(viewer_id, post).await
    }

    /// Replace the text of a post (author only)
    pub async fn update_text(
        &self,
        post_id: i64,
        user_id: i64,
        text: Option<String>,
    ) -> Result<PostView, AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        if post.author_id != user_id {
            return Err(AppError::forbidden("You can only edit your own posts"));
        }

        let text = normalize_text(text.as_deref());
        if text.is_none() && self.db.get_attachments_for_posts(&[post.id]).await?.is_empty() {
            return Err(AppError::validation(
                "A post needs text or at least one attachment",
            ));
        }

        self.db.update_post_text(post.id, text.as_deref()).await?;
        let post = self
            .db
            .get_post(post.id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        self.present_one(Some(user_id), post).await
    }

    /// Delete a post (author only) and its remote media
    pub async fn delete(&self, post_id: i64, user_id: i64) -> Result<(), AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        if post.author_id != user_id {
            return Err(AppError::forbidden("You can only delete your own posts"));
        }

        let attachments = self.db.get_attachments_for_posts(&[post.id]).await?;
        self.db.delete_post(post.id).await?;
        tracing::info!(post_id, "Post deleted");

        for attachment in attachments {
            self.storage.delete_url_best_effort(&attachment.url).await;
        }
        Ok(())
    }

    pub async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<LikeOutcome, AppError> {
        let post = self.visible_post(post_id, Some(user_id)).await?;
        let (liked, like_count) = self.db.toggle_like(user_id, post.id).await?;
        Ok(LikeOutcome { liked, like_count })
    }

    pub async fn save(&self, post_id: i64, user_id: i64) -> Result<(), AppError> {
        let post = self.visible_post(post_id, Some(user_id)).await?;
        self.db.insert_save(user_id, post.id).await
    }

    pub async fn unsave(&self, post_id: i64, user_id: i64) -> Result<(), AppError> {
        self.db.delete_save(user_id, post_id).await
    }

    async fn poll_view(
        &self,
        post_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<PollView, AppError> {
        let post = self.visible_post(post_id, viewer_id).await?;
        let poll = self
            .db
            .get_polls_for_posts(&[post.id])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Poll"))?;
        let options = self.db.get_poll_options(&[poll.id]).await?;
        let chosen = match viewer_id {
            Some(viewer) => self
                .db
                .get_user_poll_votes(viewer, &[poll.id])
                .await?
                .get(&poll.id)
                .copied(),
            None => None,
        };
        Ok(PollView::new(poll, options, chosen))
    }

    /// Vote for the option at `position`; voting again replaces the choice.
    pub async fn vote(
        &self,
        post_id: i64,
        user_id: i64,
        position: i64,
    ) -> Result<PollResults, AppError> {
        let poll = self.poll_view(post_id, Some(user_id)).await?;
        let option = poll
            .options
            .iter()
            .find(|option| option.position == position)
            .ok_or_else(|| AppError::validation("Invalid poll option"))?;

        self.db.upsert_poll_vote(poll.id, user_id, option.id).await?;
        Ok(self.poll_view(post_id, Some(user_id)).await?.into())
    }

    pub async fn poll_results(
        &self,
        post_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<PollResults, AppError> {
        Ok(self.poll_view(post_id, viewer_id).await?.into())
    }

    pub async fn comments(
        &self,
        post_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<Vec<CommentView>, AppError> {
        let post = self.visible_post(post_id, viewer_id).await?;
        let rows = self.db.get_comments_for_post(post.id).await?;
        Ok(build_comment_tree(rows))
    }

    /// Comment on a post, optionally replying to a comment of the same post
    pub async fn add_comment(
        &self,
        post_id: i64,
        user_id: i64,
        text: &str,
        parent_id: Option<i64>,
    ) -> Result<CommentView, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("Comment cannot be empty"));
        }

        let post = self.visible_post(post_id, Some(user_id)).await?;
        if let Some(parent_id) = parent_id {
            let parent = self.db.get_comment(parent_id).await?;
            if parent.map(|parent| parent.post_id) != Some(post.id) {
                return Err(AppError::validation(
                    "Parent comment does not belong to this post",
                ));
            }
        }

        let comment_id = self
            .db
            .insert_comment(post.id, user_id, parent_id, text)
            .await?;
        self.db
            .get_comment(comment_id)
            .await?
            .map(CommentView::from)
            .ok_or_else(|| AppError::not_found("Comment"))
    }

    /// Delete a comment (author only); replies go with it
    pub async fn delete_comment(&self, comment_id: i64, user_id: i64) -> Result<(), AppError> {
        let comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;
        if comment.author_id != user_id {
            return Err(AppError::forbidden("You can only delete your own comments"));
        }
        self.db.delete_comment(comment.id).await
    }
}
