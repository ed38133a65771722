//! Command handlers for the `beatfeed` binary. Every handler opens the local
//! store, mounts a feed session where the command needs one, prints the
//! result and unmounts again.
mod error;

pub use error::CliError;

use beatfeed_core::{
    clipboard::MemoryClipboard,
    config::FeedConfig,
    db::SqliteService,
    identity::StaticIdentity,
    mount,
    post::{timestamp, MediaKind, UserId},
    remote::{into_row, DataService, Table},
    state::FeedSnapshot,
    FeedHandle, FeedResult,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::{
    io::{Read, Write},
    path::PathBuf,
    sync::Arc,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured filter. Logs go to stderr so
/// `--json` output stays clean.
pub fn init_tracing(config: &FeedConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Everything a command needs: the store plus who is acting.
pub struct Context {
    pub config: FeedConfig,
    pub path: PathBuf,
    pub store: Arc<SqliteService>,
    pub user: Option<UserId>,
    pub json: bool,
}

impl Context {
    pub fn open(
        config: FeedConfig,
        db: Option<PathBuf>,
        user: Option<UserId>,
        json: bool,
    ) -> FeedResult<Self> {
        let path = db.unwrap_or_else(|| config.db.clone());
        let store = Arc::new(SqliteService::open(&path)?);
        Ok(Self {
            config,
            path,
            store,
            user,
            json,
        })
    }

    fn user(&self) -> FeedResult<&UserId> {
        self.user.as_ref().ok_or_else(|| CliError::MissingUser.into())
    }

    /// Mount a session as the current user and wait for its first load.
    async fn session(&self) -> FeedResult<(FeedHandle, FeedSnapshot, Arc<MemoryClipboard>)> {
        let clipboard = Arc::new(MemoryClipboard::default());
        let feed = mount(
            self.store.clone(),
            Arc::new(StaticIdentity::new(self.user.clone())),
            clipboard.clone(),
            &self.config,
        );
        let snapshot = feed.ready().await?;
        Ok((feed, snapshot, clipboard))
    }

    fn print_json(&self, value: &impl serde::Serialize) -> FeedResult<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Read from stdin until EOF when a value was not given on the command line.
fn read_stdin(prompt: &str) -> FeedResult<String> {
    println!("{prompt} (Press Ctrl-d on new line to end): ");
    std::io::stdout().flush()?;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf.trim().into())
}

fn media_kind(kind: &str) -> FeedResult<MediaKind> {
    match kind {
        "image" => Ok(MediaKind::Image),
        "video" => Ok(MediaKind::Video),
        other => Err(CliError::InvalidMediaKind { kind: other.into() }.into()),
    }
}

// ***
// Command handlers
// ***

pub fn init(ctx: &Context) -> FeedResult<()> {
    println!("Store ready at {:?}", ctx.path);
    debug!("Origin for shared links: {}", ctx.config.app_origin);
    Ok(())
}

pub async fn add_profile(
    ctx: &Context,
    id: String,
    username: String,
    display_name: Option<String>,
) -> FeedResult<()> {
    let record = into_row(json!({
        "id": id,
        "username": username,
        "display_name": display_name,
        "avatar_url": Value::Null,
    }))?;
    ctx.store.insert(Table::Profiles, record).await?;
    println!("Added profile {username}");
    Ok(())
}

pub async fn new_post(
    ctx: &Context,
    media_url: String,
    kind: &str,
    caption: Option<String>,
    ttl_hours: Option<i64>,
) -> FeedResult<()> {
    let user = ctx.user()?;
    let kind = media_kind(kind)?;
    let now = Utc::now();
    let record = into_row(json!({
        "user_id": user,
        "media_url": media_url,
        "media_type": kind.as_str(),
        "caption": caption,
        "created_at": timestamp(now),
        "expires_at": ttl_hours.map(|hours| timestamp(now + Duration::hours(hours))),
    }))?;
    let stored = ctx.store.insert(Table::Posts, record).await?;
    if ctx.json {
        ctx.print_json(&stored)?;
    } else {
        println!(
            "Posted {}",
            stored.get("id").and_then(Value::as_str).unwrap_or_default()
        );
    }
    Ok(())
}

pub async fn feed(ctx: &Context) -> FeedResult<()> {
    let (feed, snapshot, _) = ctx.session().await?;
    if ctx.json {
        ctx.print_json(&snapshot)?;
    } else if snapshot.load_error {
        eprintln!("Unable to load posts right now");
    } else if snapshot.posts.is_empty() {
        println!("No posts yet");
    } else {
        for post in snapshot.posts.iter() {
            let liked = if snapshot.is_liked(&post.id) { " [liked]" } else { "" };
            let comments = snapshot.thread(&post.id).map(Vec::len).unwrap_or(0);
            println!("{post}{liked} ({comments} comments)");
        }
    }
    feed.unmount().await
}

pub async fn like(ctx: &Context, post_id: &str) -> FeedResult<()> {
    ctx.user()?;
    let (feed, _, _) = ctx.session().await?;
    let result = feed.like(post_id).await;
    feed.unmount().await?;
    let liked = result?;
    if ctx.json {
        ctx.print_json(&json!({ "post_id": post_id, "liked": liked }))
    } else {
        println!("{} {post_id}", if liked { "Liked" } else { "Unliked" });
        Ok(())
    }
}

pub async fn thread(ctx: &Context, post_id: &str) -> FeedResult<()> {
    let (feed, snapshot, _) = ctx.session().await?;
    feed.unmount().await?;
    let thread = snapshot.thread(post_id).cloned().unwrap_or_default();
    if ctx.json {
        return ctx.print_json(&thread);
    }
    if thread.is_empty() {
        println!("No comments on {post_id}");
    }
    for comment in thread.iter() {
        println!(
            "{} · {}\n  {}",
            comment.author.name(),
            comment.created_at.format("%Y-%m-%d %H:%M"),
            comment.content
        );
    }
    Ok(())
}

pub async fn comment(ctx: &Context, post_id: &str, text: Option<String>) -> FeedResult<()> {
    ctx.user()?;
    let text = match text {
        Some(text) => text,
        None => read_stdin("Enter comment")?,
    };
    let (feed, _, _) = ctx.session().await?;
    let result = feed.comment(post_id, &text).await;
    feed.unmount().await?;
    let thread = result?;
    if ctx.json {
        ctx.print_json(&thread)
    } else {
        println!("Comment added; {} in thread", thread.len());
        Ok(())
    }
}

pub async fn share(ctx: &Context, post_id: &str) -> FeedResult<()> {
    let (feed, _, clipboard) = ctx.session().await?;
    let result = feed.share(post_id).await;
    feed.unmount().await?;
    let url = result?;
    debug!("Clipboard now holds {:?}", clipboard.contents());
    println!("{url}");
    Ok(())
}

pub async fn message(ctx: &Context, to: &str, text: Option<String>) -> FeedResult<()> {
    ctx.user()?;
    let text = match text {
        Some(text) => text,
        None => read_stdin("Enter message")?,
    };
    let (feed, _, _) = ctx.session().await?;
    let result = feed.send_message(to, &text).await;
    feed.unmount().await?;
    let message = result?;
    if ctx.json {
        ctx.print_json(&message)
    } else {
        println!("Sent message {} to {to}", message.id);
        Ok(())
    }
}
