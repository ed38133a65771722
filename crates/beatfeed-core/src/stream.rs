use crate::{
    post::{parse_rows, timestamp, Post, PostId},
    remote::{DataService, Embed, Filter, Order, Query, Table},
    FeedResult,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::{collections::HashSet, fmt::Display};
use tracing::debug;

/// The active posts, newest first, plus the cursor used for one-at-a-time
/// viewing.
#[derive(Debug, Default, Clone)]
pub struct PostList {
    posts: Vec<Post>,
    index: usize,
    /// Set while an initial load is outstanding; records what the change
    /// feed did in the meantime so the batch can be merged instead of
    /// blindly replacing the list.
    pending: Option<PendingLoad>,
}

#[derive(Debug, Default, Clone)]
struct PendingLoad {
    inserted: HashSet<PostId>,
    deleted: HashSet<PostId>,
}

impl PostList {
    // ***
    // Load handling
    // ***

    /// Mark the start of a load. Realtime changes from here on are
    /// remembered until `finish_load`.
    pub fn begin_load(&mut self) {
        self.pending = Some(PendingLoad::default());
    }

    /// Install a freshly fetched batch. Posts that arrived over the change
    /// feed while the fetch was in flight are kept when the batch does not
    /// contain them, and posts deleted in the meantime stay deleted.
    pub fn finish_load(&mut self, batch: Vec<Post>) {
        let pending = self.pending.take().unwrap_or_default();
        let current_id = self.current().map(|post| post.id.clone());

        let batch_ids: HashSet<&str> = batch.iter().map(|post| post.id.as_str()).collect();
        let mut kept: Vec<Post> = self
            .posts
            .iter()
            .filter(|post| {
                pending.inserted.contains(&post.id) && !batch_ids.contains(post.id.as_str())
            })
            .cloned()
            .collect();
        let fetched = batch
            .into_iter()
            .filter(|post| !pending.deleted.contains(&post.id));

        let mut seen = HashSet::new();
        kept.extend(fetched);
        kept.retain(|post| seen.insert(post.id.clone()));
        kept.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!("Loaded {} posts into the feed", kept.len());
        self.posts = kept;
        self.index = current_id
            .and_then(|id| self.position(&id))
            .unwrap_or(0);
        self.clamp_index();
    }

    /// Abandon the outstanding load, keeping the list as it is.
    pub fn abort_load(&mut self) {
        self.pending = None;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    // ***
    // Change feed
    // ***

    /// Put a post at the front of the list. Returns false when the id is
    /// already present.
    pub fn apply_remote_insert(&mut self, post: Post) -> bool {
        if self.position(&post.id).is_some() {
            debug!("Ignoring duplicate insert for post {}", post.id);
            return false;
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.inserted.insert(post.id.clone());
            pending.deleted.remove(&post.id);
        }
        let had_posts = !self.posts.is_empty();
        self.posts.insert(0, post);
        if had_posts {
            // keep pointing at the post being viewed
            self.index += 1;
        }
        true
    }

    /// Remove the post with the given id. Returns false when it was absent.
    pub fn apply_remote_delete(&mut self, post_id: &str) -> bool {
        if let Some(pending) = self.pending.as_mut() {
            pending.deleted.insert(post_id.to_owned());
            pending.inserted.remove(post_id);
        }
        let Some(idx) = self.position(post_id) else {
            return false;
        };
        self.posts.remove(idx);
        if idx < self.index {
            self.index -= 1;
        }
        self.clamp_index();
        true
    }

    // ***
    // Cursor
    // ***

    /// Move the cursor forward; no-op on the last post.
    pub fn next(&mut self) -> usize {
        if self.index + 1 < self.posts.len() {
            self.index += 1;
        }
        self.index
    }

    /// Move the cursor back; no-op on the first post.
    pub fn previous(&mut self) -> usize {
        self.index = self.index.saturating_sub(1);
        self.index
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Post> {
        self.posts.get(self.index)
    }

    // ***
    // Helpers
    // ***

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.position(post_id).and_then(|idx| self.posts.get(idx))
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Get the number of posts in the feed
    pub fn size(&self) -> usize {
        self.posts.len()
    }

    fn position(&self, post_id: &str) -> Option<usize> {
        self.posts.iter().position(|post| post.id == post_id)
    }

    fn clamp_index(&mut self) {
        self.index = self.index.min(self.posts.len().saturating_sub(1));
    }
}

impl From<Vec<Post>> for PostList {
    fn from(posts: Vec<Post>) -> Self {
        Self {
            posts,
            index: 0,
            pending: None,
        }
    }
}

impl Display for PostList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for post in self.posts.iter() {
            writeln!(f, "{}", post)?;
        }
        Ok(())
    }
}

/// Every post that has not expired at `now`, newest first, authors joined.
pub async fn fetch_active(service: &dyn DataService, now: DateTime<Utc>) -> FeedResult<Vec<Post>> {
    let query = Query::from(Table::Posts)
        .filter(Filter::NullOrAfter("expires_at", json!(timestamp(now))))
        .order(Order::desc("created_at"))
        .embed(Embed::Author);
    let rows = service.query(&query).await?;
    Ok(parse_rows(&rows, Post::parse_row))
}

/// A single post by id with its author, or `None` if it is gone or expired.
pub async fn fetch_post(
    service: &dyn DataService,
    post_id: &str,
    now: DateTime<Utc>,
) -> FeedResult<Option<Post>> {
    let query = Query::from(Table::Posts)
        .filter(Filter::Eq("id", json!(post_id)))
        .embed(Embed::Author)
        .limit(1);
    let rows = service.query(&query).await?;
    Ok(parse_rows(&rows, Post::parse_row)
        .into_iter()
        .find(|post| post.is_active(now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{MediaKind, Profile};
    use chrono::Duration;

    fn post(id: &str, minutes_ago: i64) -> Post {
        Post {
            id: id.into(),
            media_url: format!("https://cdn.example/{id}.jpg"),
            media_kind: MediaKind::Image,
            caption: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            expires_at: None,
            views: 0,
            author: Profile {
                id: "u1".into(),
                username: "lofi_kid".into(),
                display_name: None,
                avatar_url: None,
            },
        }
    }

    fn ids(list: &PostList) -> Vec<&str> {
        list.posts().iter().map(|post| post.id.as_str()).collect()
    }

    #[test]
    fn realtime_insert_prepends() {
        let mut list = PostList::from(vec![post("p1", 1), post("p2", 2), post("p3", 3)]);
        assert!(list.apply_remote_insert(post("p0", 0)));
        assert_eq!(ids(&list), ["p0", "p1", "p2", "p3"]);
    }

    #[test]
    fn realtime_insert_is_idempotent() {
        let mut list = PostList::from(vec![post("p1", 1), post("p2", 2)]);
        assert!(!list.apply_remote_insert(post("p2", 2)));
        assert_eq!(ids(&list), ["p1", "p2"]);
    }

    #[test]
    fn realtime_delete_removes_exactly_one() {
        let mut list = PostList::from(vec![post("p1", 1), post("p2", 2), post("p3", 3)]);
        assert!(list.apply_remote_delete("p2"));
        assert_eq!(ids(&list), ["p1", "p3"]);

        assert!(!list.apply_remote_delete("nope"));
        assert_eq!(ids(&list), ["p1", "p3"]);
    }

    #[test]
    fn cursor_is_clamped() {
        let mut list = PostList::from(vec![post("p1", 1), post("p2", 2), post("p3", 3)]);
        assert_eq!(list.previous(), 0);
        assert_eq!(list.next(), 1);
        assert_eq!(list.next(), 2);
        assert_eq!(list.next(), 2);
        assert_eq!(list.current().map(|p| p.id.as_str()), Some("p3"));
    }

    #[test]
    fn cursor_on_empty_list() {
        let mut list = PostList::default();
        assert_eq!(list.next(), 0);
        assert_eq!(list.previous(), 0);
        assert!(list.current().is_none());
    }

    #[test]
    fn cursor_follows_viewed_post_across_changes() {
        let mut list = PostList::from(vec![post("p1", 1), post("p2", 2), post("p3", 3)]);
        list.next();
        assert_eq!(list.current().map(|p| p.id.as_str()), Some("p2"));

        list.apply_remote_insert(post("p0", 0));
        assert_eq!(list.current().map(|p| p.id.as_str()), Some("p2"));

        list.apply_remote_delete("p0");
        list.apply_remote_delete("p1");
        assert_eq!(list.current().map(|p| p.id.as_str()), Some("p2"));

        list.apply_remote_delete("p2");
        list.apply_remote_delete("p3");
        assert_eq!(list.index(), 0);
        assert!(list.current().is_none());
    }

    #[test]
    fn load_keeps_posts_inserted_while_in_flight() {
        let mut list = PostList::default();
        list.begin_load();
        list.apply_remote_insert(post("p0", 0));

        list.finish_load(vec![post("p1", 1), post("p2", 2)]);
        assert_eq!(ids(&list), ["p0", "p1", "p2"]);
        assert!(!list.is_loading());
    }

    #[test]
    fn load_does_not_duplicate_raced_insert() {
        let mut list = PostList::default();
        list.begin_load();
        list.apply_remote_insert(post("p1", 1));

        list.finish_load(vec![post("p1", 1), post("p2", 2)]);
        assert_eq!(ids(&list), ["p1", "p2"]);
    }

    #[test]
    fn load_respects_delete_while_in_flight() {
        let mut list = PostList::default();
        list.begin_load();
        list.apply_remote_delete("p2");

        list.finish_load(vec![post("p1", 1), post("p2", 2)]);
        assert_eq!(ids(&list), ["p1"]);
    }

    #[test]
    fn reload_drops_posts_missing_from_batch() {
        let mut list = PostList::from(vec![post("p1", 1), post("p2", 2)]);
        list.begin_load();
        list.finish_load(vec![post("p1", 1)]);
        assert_eq!(ids(&list), ["p1"]);
    }

    #[test]
    fn display_lists_every_post() {
        let list = PostList::from(vec![post("p1", 1), post("p2", 2)]);
        let rendered = list.to_string();
        assert!(rendered.contains("p1.jpg"));
        assert!(rendered.contains("p2.jpg"));
        assert!(rendered.find("p1.jpg") < rendered.find("p2.jpg"));
    }
}
