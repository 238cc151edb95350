//! Feed service
//!
//! Home feed, explore, saved posts, trending hashtags and search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::Page;
use super::post::{PostView, present_posts};
use crate::data::{Database, UserSummary};
use crate::error::AppError;

/// Upper bound on posts scanned for trends
const TRENDS_SCAN_CAP: i64 = 1000;

lazy_static! {
    static ref HASHTAG: Regex = Regex::new(r"#([A-Za-z0-9_]+)").expect("valid hashtag regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingTag {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trends {
    pub since: DateTime<Utc>,
    pub total_tags: usize,
    pub trends: Vec<TrendingTag>,
}

/// Count hashtags across post texts.
///
/// Tags are lower-cased and counted once per post. Returns the `limit`
/// most used tags (ties by name) and the number of distinct tags seen.
pub fn extract_trends<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> (Vec<TrendingTag>, usize) {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for text in texts {
        let tags: HashSet<String> = HASHTAG
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
            .collect();
        for tag in tags {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }

    let total = counts.len();
    let mut ranked: Vec<TrendingTag> = counts
        .into_iter()
        .map(|(tag, count)| TrendingTag {
            tag: format!("#{tag}"),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked.truncate(limit);
    (ranked, total)
}

/// Normalize an explore tag filter: leading `#` removed, blank means none.
fn normalize_tag(tag: Option<&str>) -> Option<String> {
    tag.map(str::trim)
        .map(|tag| tag.trim_start_matches('#'))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
}

/// Feed service
pub struct FeedService {
    db: Arc<Database>,
}

impl FeedService {
    /// Create new feed service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Home feed
    ///
    /// Posts by accepted followees and the user, newest first. When the
    /// page runs short it is topped up with explore posts from other
    /// authors, marked `suggested`.
    pub async fn home(&self, user_id: i64, page: Page) -> Result<Vec<PostView>, AppError> {
        let posts = self
            .db
            .get_feed_posts(user_id, page.limit, page.offset())
            .await?;
        let mut views = present_posts(&self.db, Some(user_id), posts).await?;

        let missing = page.limit - views.len() as i64;
        if missing <= 0 {
            return Ok(views);
        }

        let feed_total = self.db.count_feed_posts(user_id).await?;
        let mut exclude = self.db.get_following_ids(user_id).await?;
        exclude.push(user_id);
        let explore_offset = (page.offset() - feed_total).max(0);

        let extra = self
            .db
            .get_explore_posts(Some(user_id), None, &exclude, missing, explore_offset)
            .await?;
        let seen: HashSet<i64> = views.iter().map(|view| view.id).collect();
        let extra = extra
            .into_iter()
            .filter(|post| !seen.contains(&post.id))
            .collect();

        for mut view in present_posts(&self.db, Some(user_id), extra).await? {
            view.suggested = true;
            views.push(view);
        }
        Ok(views)
    }

    /// Posts from every visible author, optionally filtered by hashtag
    pub async fn explore(
        &self,
        viewer_id: Option<i64>,
        tag: Option<&str>,
        page: Page,
    ) -> Result<Vec<PostView>, AppError> {
        let tag = normalize_tag(tag);
        let posts = self
            .db
            .get_explore_posts(viewer_id, tag.as_deref(), &[], page.limit, page.offset())
            .await?;
        present_posts(&self.db, viewer_id, posts).await
    }

    pub async fn saved(&self, user_id: i64, page: Page) -> Result<Vec<PostView>, AppError> {
        let posts = self
            .db
            .get_saved_posts(user_id, page.limit, page.offset())
            .await?;
        present_posts(&self.db, Some(user_id), posts).await
    }

    /// Most used hashtags over the last `days` days
    pub async fn trends(&self, days: i64, limit: usize) -> Result<Trends, AppError> {
        let since = Utc::now() - Duration::days(days);
        let texts = self.db.get_recent_post_texts(since, TRENDS_SCAN_CAP).await?;
        let (trends, total_tags) = extract_trends(texts.iter().map(String::as_str), limit);
        Ok(Trends {
            since,
            total_tags,
            trends,
        })
    }

    pub async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserSummary>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.db.search_users(query, limit).await
    }

    pub async fn search_posts(
        &self,
        viewer_id: Option<i64>,
        query: &str,
        limit: i64,
    ) -> Result<Vec<PostView>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let posts = self.db.search_posts(viewer_id, query, limit).await?;
        present_posts(&self.db, viewer_id, posts).await
    }
}
