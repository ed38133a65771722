//! Comment threads, cached per post.

use crate::{
    post::{parse_rows, timestamp, PostId, Profile, UserId},
    remote::{into_row, DataService, Embed, Filter, Order, Query, Row, Table},
    FeedError, FeedResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: PostId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: Profile,
}

#[derive(Deserialize)]
struct CommentRow {
    id: String,
    post_id: String,
    content: String,
    created_at: DateTime<Utc>,
    author: Option<Profile>,
}

impl Comment {
    pub fn parse_row(row: &Row) -> FeedResult<Self> {
        let table = Table::Comments.name();
        let raw: CommentRow = serde_json::from_value(Value::Object(row.clone()))
            .map_err(|err| FeedError::malformed(table, err.to_string()))?;

        if raw.id.is_empty() || raw.post_id.is_empty() {
            return Err(FeedError::malformed(table, "id or post id is empty").into());
        }
        let author = raw
            .author
            .ok_or_else(|| FeedError::malformed(table, "author profile is missing"))?
            .validate(table)?;

        Ok(Comment {
            id: raw.id,
            post_id: raw.post_id,
            content: raw.content,
            created_at: raw.created_at,
            author,
        })
    }
}

/// Trimmed comment text, or `None` when nothing would be left to submit.
pub fn normalize(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Cached threads keyed by post id. A missing key means "not loaded yet",
/// which is distinct from a loaded empty thread.
#[derive(Debug, Default, Clone)]
pub struct CommentThreads {
    threads: HashMap<PostId, Vec<Comment>>,
}

impl CommentThreads {
    pub fn get(&self, post_id: &str) -> Option<&Vec<Comment>> {
        self.threads.get(post_id)
    }

    pub fn is_loaded(&self, post_id: &str) -> bool {
        self.threads.contains_key(post_id)
    }

    /// Replace whatever was cached for `post_id`.
    pub fn store(&mut self, post_id: PostId, thread: Vec<Comment>) {
        debug!("Caching {} comments for post {post_id}", thread.len());
        self.threads.insert(post_id, thread);
    }

    pub fn evict(&mut self, post_id: &str) {
        self.threads.remove(post_id);
    }

    pub fn as_map(&self) -> &HashMap<PostId, Vec<Comment>> {
        &self.threads
    }
}

/// Fetch the whole thread for a post, oldest first.
pub async fn fetch_thread(service: &dyn DataService, post_id: &str) -> FeedResult<Vec<Comment>> {
    let query = Query::from(Table::Comments)
        .filter(Filter::Eq("post_id", json!(post_id)))
        .order(Order::asc("created_at"))
        .embed(Embed::Author);
    let rows = service.query(&query).await?;
    Ok(parse_rows(&rows, Comment::parse_row))
}

/// Insert a comment by `author`. Empty text is rejected before the store is
/// touched.
pub async fn insert_comment(
    service: &dyn DataService,
    author: &UserId,
    post_id: &str,
    text: &str,
) -> FeedResult<()> {
    let content = normalize(text).ok_or(FeedError::EmptyComment)?;
    let record = into_row(json!({
        "post_id": post_id,
        "user_id": author,
        "content": content,
        "created_at": timestamp(Utc::now()),
    }))?;
    service.insert(Table::Comments, record).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, content: &str) -> Comment {
        Comment {
            id: id.into(),
            post_id: "p1".into(),
            content: content.into(),
            created_at: Utc::now(),
            author: Profile {
                id: "u1".into(),
                username: "lofi_kid".into(),
                display_name: None,
                avatar_url: None,
            },
        }
    }

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize("  Great track! "), Some("Great track!"));
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   \n\t"), None);
    }

    #[test]
    fn absent_thread_differs_from_empty_thread() {
        let mut threads = CommentThreads::default();
        assert!(!threads.is_loaded("p1"));
        assert!(threads.get("p1").is_none());

        threads.store("p1".into(), Vec::new());
        assert!(threads.is_loaded("p1"));
        assert_eq!(threads.get("p1").map(Vec::len), Some(0));
    }

    #[test]
    fn store_replaces_previous_thread() {
        let mut threads = CommentThreads::default();
        threads.store("p1".into(), vec![comment("c1", "first")]);
        threads.store("p1".into(), vec![comment("c1", "first"), comment("c2", "second")]);
        assert_eq!(threads.get("p1").map(Vec::len), Some(2));

        threads.evict("p1");
        assert!(!threads.is_loaded("p1"));
    }

    #[test]
    fn parse_row_drops_comment_without_author() {
        let rows: Vec<Row> = vec![
            json!({
                "id": "c1",
                "post_id": "p1",
                "content": "nice",
                "created_at": "2026-10-18T10:00:00.000Z",
                "author": { "id": "u1", "username": "lofi_kid" }
            }),
            json!({
                "id": "c2",
                "post_id": "p1",
                "content": "orphan",
                "created_at": "2026-10-18T10:01:00.000Z",
                "author": null
            }),
            json!({
                "id": "c3",
                "post_id": "p1",
                "content": "bad author",
                "created_at": "2026-10-18T10:02:00.000Z",
                "author": { "id": "", "username": "ghost" }
            }),
        ]
        .into_iter()
        .filter_map(|val| val.as_object().cloned())
        .collect();

        let thread = parse_rows(&rows, Comment::parse_row);
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, "c1");
    }
}
