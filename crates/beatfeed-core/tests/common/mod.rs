#![allow(dead_code)]

use async_trait::async_trait;
use beatfeed_core::{
    clipboard::MemoryClipboard,
    config::FeedConfig,
    db::{generate_temp_db, SqliteService},
    identity::StaticIdentity,
    mount,
    post::timestamp,
    remote::{into_row, DataService, Filter, Query, Row, Subscription, SubscriptionId, Table},
    state::{FeedEvent, FeedSnapshot},
    FeedError, FeedHandle, FeedResult,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{broadcast, Notify};

/// Sqlite store that can be told to fail or stall particular calls.
pub struct FlakyService {
    pub inner: SqliteService,
    pub fail_posts: AtomicBool,
    pub fail_likes: AtomicBool,
    pub fail_comments: AtomicBool,
    pub hold_likes: AtomicBool,
    entered: Notify,
    release: Notify,
    path: PathBuf,
}

impl FlakyService {
    pub fn new() -> Self {
        let path = generate_temp_db();
        Self {
            inner: SqliteService::open(&path).unwrap(),
            fail_posts: AtomicBool::new(false),
            fail_likes: AtomicBool::new(false),
            fail_comments: AtomicBool::new(false),
            hold_likes: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
            path,
        }
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    /// Resolves once a held like write has reached the store.
    pub async fn like_write_started(&self) {
        self.entered.notified().await;
    }

    pub fn release_like_write(&self) {
        self.release.notify_one();
    }

    async fn check_like_write(&self) -> FeedResult<()> {
        if self.fail_likes.load(Ordering::SeqCst) {
            return Err(FeedError::storage_error("likes unavailable".into()).into());
        }
        if self.hold_likes.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(())
    }

    pub async fn count(&self, table: Table, filters: Vec<Filter>) -> usize {
        let mut query = Query::from(table);
        for filter in filters {
            query = query.filter(filter);
        }
        self.inner.query(&query).await.unwrap().len()
    }
}

impl Drop for FlakyService {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait]
impl DataService for FlakyService {
    async fn query(&self, query: &Query) -> FeedResult<Vec<Row>> {
        if query.table == Table::Posts && self.fail_posts.load(Ordering::SeqCst) {
            return Err(FeedError::storage_error("posts unavailable".into()).into());
        }
        self.inner.query(query).await
    }

    async fn insert(&self, table: Table, record: Row) -> FeedResult<Row> {
        match table {
            Table::Likes => self.check_like_write().await?,
            Table::Comments if self.fail_comments.load(Ordering::SeqCst) => {
                return Err(FeedError::storage_error("comments unavailable".into()).into())
            }
            _ => {}
        }
        self.inner.insert(table, record).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> FeedResult<usize> {
        if table == Table::Likes {
            self.check_like_write().await?;
        }
        self.inner.delete(table, filters).await
    }

    async fn subscribe(&self, table: Table) -> FeedResult<Subscription> {
        self.inner.subscribe(table).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> FeedResult<()> {
        self.inner.unsubscribe(id).await
    }
}

pub struct Fixture {
    pub store: Arc<FlakyService>,
    pub identity: Arc<StaticIdentity>,
    pub clipboard: Arc<MemoryClipboard>,
    pub config: FeedConfig,
}

impl Fixture {
    pub async fn new(viewer: Option<&str>) -> Self {
        let fixture = Self {
            store: Arc::new(FlakyService::new()),
            identity: Arc::new(StaticIdentity::new(viewer.map(str::to_owned))),
            clipboard: Arc::new(MemoryClipboard::default()),
            config: FeedConfig {
                app_origin: "https://beats.example".into(),
                focus_delay_ms: 10,
                ..FeedConfig::default()
            },
        };
        fixture.profile("u1", "lofi_kid").await;
        fixture.profile("u2", "bassline_betty").await;
        fixture
    }

    pub fn mount(&self) -> FeedHandle {
        mount(
            self.store.clone(),
            self.identity.clone(),
            self.clipboard.clone(),
            &self.config,
        )
    }

    pub async fn profile(&self, id: &str, username: &str) {
        self.insert(Table::Profiles, json!({ "id": id, "username": username }))
            .await;
    }

    /// A post by u1 created `minutes_ago`, optionally expiring
    /// `expires_in` minutes from now (negative means already expired).
    pub async fn post(&self, id: &str, minutes_ago: i64, expires_in: Option<i64>) {
        let now = Utc::now();
        let expires_at = expires_in
            .map(|mins| json!(timestamp(now + Duration::minutes(mins))))
            .unwrap_or(Value::Null);
        self.insert(
            Table::Posts,
            json!({
                "id": id,
                "user_id": "u1",
                "media_url": format!("https://cdn.example/{id}.jpg"),
                "media_type": "image",
                "caption": format!("caption for {id}"),
                "created_at": timestamp(now - Duration::minutes(minutes_ago)),
                "expires_at": expires_at,
            }),
        )
        .await;
    }

    pub async fn like(&self, post_id: &str, user_id: &str) {
        self.insert(Table::Likes, json!({ "post_id": post_id, "user_id": user_id }))
            .await;
    }

    pub async fn comment(&self, post_id: &str, user_id: &str, content: &str, at: DateTime<Utc>) {
        self.insert(
            Table::Comments,
            json!({
                "post_id": post_id,
                "user_id": user_id,
                "content": content,
                "created_at": timestamp(at),
            }),
        )
        .await;
    }

    pub async fn delete_post(&self, id: &str) {
        self.store
            .inner
            .delete(Table::Posts, &[Filter::Eq("id", json!(id))])
            .await
            .unwrap();
    }

    async fn insert(&self, table: Table, value: Value) {
        self.store
            .inner
            .insert(table, into_row(value).unwrap())
            .await
            .unwrap();
    }
}

pub fn ids(snapshot: &FeedSnapshot) -> Vec<&str> {
    snapshot.posts.iter().map(|post| post.id.as_str()).collect()
}

/// Poll the session until `check` holds.
pub async fn wait_for(feed: &FeedHandle, check: impl Fn(&FeedSnapshot) -> bool) -> FeedSnapshot {
    for _ in 0..200 {
        let snapshot = feed.snapshot().await.unwrap();
        if check(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("feed never reached the expected state");
}

/// Next event (other than `Changed`) matching `pick`, within two seconds.
pub async fn next_event<T>(
    events: &mut broadcast::Receiver<FeedEvent>,
    pick: impl Fn(FeedEvent) -> Option<T>,
) -> T {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(found) = pick(event) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(2), wait)
        .await
        .expect("timed out waiting for event")
}

pub fn is_feed_error(err: &anyhow::Error, check: impl Fn(&FeedError) -> bool) -> bool {
    err.downcast_ref::<FeedError>().is_some_and(check)
}
