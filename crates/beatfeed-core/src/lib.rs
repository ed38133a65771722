//! Feed synchronization core for beatfeed. A feed session keeps an ordered
//! list of active posts, their comment threads and the viewer's likes in
//! step with a remote store, and exposes it all through a [`FeedHandle`].
mod error;
pub mod clipboard;
pub mod comments;
pub mod config;
pub mod db;
pub mod feed;
pub mod identity;
pub mod likes;
pub mod message;
pub mod post;
pub mod remote;
pub mod state;
pub mod stream;

pub use error::{FeedError, FeedResult};
pub use feed::{mount, FeedHandle};

pub mod constant {
    pub const CONFIG_DIR: &str = ".beatfeed";
    pub const CONFIG_FILE: &str = "beatfeed.toml";
    pub const CONFIG_ENV: &str = "BEATFEEDCONF";
    pub const DB_FILE: &str = "beatfeed.db";
    pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";
    pub const POST_PATH: &str = "/post";
    pub const DEFAULT_COMMAND_BUFFER: usize = 32;
    pub const DEFAULT_EVENT_BUFFER: usize = 64;
    pub const DEFAULT_FOCUS_DELAY_MS: u64 = 100;
}

/// Used to send results back to the caller of a feed operation.
pub type Responder<T> = tokio::sync::oneshot::Sender<T>;
