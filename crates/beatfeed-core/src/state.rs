use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    comments::Comment,
    constant::POST_PATH,
    post::{Post, PostId, UserId},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

/// A copy of everything a presentation layer needs to render the feed.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct FeedSnapshot {
    pub phase: Phase,
    pub load_error: bool,
    pub posts: Vec<Post>,
    pub index: usize,
    pub comments_open: bool,
    pub draft: String,
    pub threads: HashMap<PostId, Vec<Comment>>,
    pub liked: HashMap<PostId, bool>,
}

impl FeedSnapshot {
    pub fn current(&self) -> Option<&Post> {
        self.posts.get(self.index)
    }

    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked.get(post_id).copied().unwrap_or(false)
    }

    pub fn thread(&self, post_id: &str) -> Option<&Vec<Comment>> {
        self.threads.get(post_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Error,
}

/// A transient, user-facing toast.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Create,
    Messages,
    Profile(UserId),
    Post(PostId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".into(),
            Route::Create => "/create".into(),
            Route::Messages => "/messages".into(),
            Route::Profile(user_id) => format!("/profile/{user_id}"),
            Route::Post(post_id) => format!("{POST_PATH}/{post_id}"),
        }
    }

    /// Absolute URL for this route under `origin`.
    pub fn url(&self, origin: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self.path())
    }
}

/// What a feed session tells its presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Session state changed; take a new snapshot.
    Changed,
    Notify(Notification),
    FocusCommentInput(PostId),
    Navigate(Route),
}
