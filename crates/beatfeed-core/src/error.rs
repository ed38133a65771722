use thiserror::Error;

pub type FeedResult<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum FeedError {
    /// The comment was empty once surrounding whitespace was removed.
    #[error("Comment cannot be empty")]
    EmptyComment,
    /// The direct message was empty once surrounding whitespace was removed.
    #[error("Message cannot be empty")]
    EmptyMessage,
    /// A viewer-scoped operation was attempted without a signed in user.
    #[error("You need to be signed in to do that")]
    SignedOut,
    /// A like toggle for this post is still waiting on the store.
    #[error("A reaction for post {post_id} is already being processed")]
    ToggleInFlight { post_id: String },
    /// The requested post is not part of the feed.
    #[error("Post does not exist with the given ID: {post_id}")]
    UnknownPost { post_id: String },
    /// A row returned by the store did not have the expected shape.
    #[error("Malformed {table} row: {msg}")]
    MalformedRow { table: &'static str, msg: String },
    /// The feed session has been unmounted.
    #[error("The feed session is closed")]
    SessionClosed,
    #[error("ERROR: {msg}")]
    Storage { msg: String },
    #[error("Clipboard unavailable: {msg}")]
    Clipboard { msg: String },
    /// Custom Error type for errors not covered by the above errors.
    #[error("{msg}")]
    CustomError { msg: String },
}

impl FeedError {
    pub fn custom_error(msg: String) -> Self {
        Self::CustomError { msg }
    }

    pub fn storage_error(msg: String) -> Self {
        Self::Storage { msg }
    }

    pub fn malformed(table: &'static str, msg: impl Into<String>) -> Self {
        Self::MalformedRow {
            table,
            msg: msg.into(),
        }
    }
}

impl From<sqlite::Error> for FeedError {
    fn from(err: sqlite::Error) -> Self {
        Self::Storage {
            msg: err.message.unwrap_or_else(|| "unknown sqlite error".into()),
        }
    }
}
