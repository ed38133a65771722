//! This module defines the `Post` struct, the media item everything in the
//! feed revolves around, together with the author `Profile` embedded in it.

use crate::{
    remote::{Row, Table},
    FeedError, FeedResult,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use textwrap::core::display_width;
use textwrap::{self, wrap};

pub type PostId = String;
pub type UserId = String;

/// Denormalised author data carried alongside posts and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Name to show for this author; falls back to the username.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }

    pub(crate) fn validate(self, table: &'static str) -> FeedResult<Self> {
        if self.id.is_empty() {
            return Err(FeedError::malformed(table, "author id is empty").into());
        }
        if self.username.is_empty() {
            return Err(FeedError::malformed(table, "author username is empty").into());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A time-bounded media item shown in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub media_url: String,
    pub media_kind: MediaKind,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub author: Profile,
}

/// Shape of a `posts` row as the store hands it out, author joined under
/// `author`.
#[derive(Deserialize)]
struct PostRow {
    id: String,
    media_url: String,
    media_type: MediaKind,
    caption: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    views: Option<i64>,
    author: Option<Profile>,
}

impl Post {
    /// Convert an untyped store row into a `Post`. Rows with a missing or
    /// malformed author join are rejected here.
    pub fn parse_row(row: &Row) -> FeedResult<Self> {
        let table = Table::Posts.name();
        let raw: PostRow = serde_json::from_value(serde_json::Value::Object(row.clone()))
            .map_err(|err| FeedError::malformed(table, err.to_string()))?;

        if raw.id.is_empty() {
            return Err(FeedError::malformed(table, "id is empty").into());
        }
        if raw.media_url.is_empty() {
            return Err(FeedError::malformed(table, "media url is empty").into());
        }
        let author = raw
            .author
            .ok_or_else(|| FeedError::malformed(table, "author profile is missing"))?
            .validate(table)?;

        Ok(Post {
            id: raw.id,
            media_url: raw.media_url,
            media_kind: raw.media_type,
            caption: raw.caption.filter(|caption| !caption.is_empty()),
            created_at: raw.created_at,
            expires_at: raw.expires_at,
            views: raw.views.unwrap_or_default().max(0) as u64,
            author,
        })
    }

    /// Whether the post still belongs in the active feed at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Parse every row, dropping (and logging) the ones that fail validation.
pub fn parse_rows<T>(rows: &[Row], parse: fn(&Row) -> FeedResult<T>) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match parse(row) {
            Ok(val) => Some(val),
            Err(err) => {
                tracing::warn!("Dropping row: {err}");
                None
            }
        })
        .collect()
}

/// Every timestamp handed to the store goes through here, so that string
/// comparison in the store matches time ordering.
pub fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:-<54}\n", "")?;
        let header = format!("@{} · {}", self.author.username, self.media_kind.as_str());
        write!(f, "\\ {:^50} /\n/ {:50} \\\n", header, "")?;
        let content_width = 50;
        let wrapping_config = textwrap::Options::new(content_width).break_words(true);
        let body = format!(
            "{}\n{}\n",
            self.caption.as_deref().unwrap_or(""),
            self.media_url
        );
        for (idx, line) in wrap(&body, wrapping_config).into_iter().enumerate() {
            let (left_closure, right_closure) = if idx % 2 == 0 {
                ("\\ ", " /")
            } else {
                ("/ ", " \\")
            };
            let text_width = display_width(&line);
            let whitespace = content_width.saturating_sub(text_width);
            write!(
                f,
                "{left_closure}{}{}{right_closure}\n",
                line,
                " ".repeat(whitespace)
            )?;
        }
        write!(f, "{:-<54}", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn author() -> serde_json::Value {
        json!({
            "id": "u1",
            "username": "lofi_kid",
            "display_name": "Lo-Fi Kid",
            "avatar_url": null
        })
    }

    #[test]
    fn parse_row_with_author() {
        let post = Post::parse_row(&row(json!({
            "id": "p1",
            "user_id": "u1",
            "media_url": "https://cdn.example/p1.mp4",
            "media_type": "video",
            "caption": "new beat 🔥",
            "created_at": "2026-10-18T10:00:00.000Z",
            "expires_at": null,
            "views": 7,
            "author": author()
        })))
        .unwrap();

        assert_eq!(post.id, "p1");
        assert_eq!(post.media_kind, MediaKind::Video);
        assert_eq!(post.views, 7);
        assert_eq!(post.author.name(), "Lo-Fi Kid");
        assert!(post.is_active(Utc::now()));
    }

    #[test]
    fn parse_row_rejects_missing_author() {
        let result = Post::parse_row(&row(json!({
            "id": "p1",
            "media_url": "https://cdn.example/p1.jpg",
            "media_type": "image",
            "caption": null,
            "created_at": "2026-10-18T10:00:00.000Z",
            "expires_at": null,
            "author": null
        })));
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::MalformedRow { .. })
        ));
    }

    #[test]
    fn parse_row_rejects_unknown_media_kind() {
        let result = Post::parse_row(&row(json!({
            "id": "p1",
            "media_url": "https://cdn.example/p1.wav",
            "media_type": "audio",
            "created_at": "2026-10-18T10:00:00.000Z",
            "author": author()
        })));
        assert!(result.is_err());
    }

    #[test]
    fn expired_post_is_not_active() {
        let mut post = Post::parse_row(&row(json!({
            "id": "p1",
            "media_url": "https://cdn.example/p1.jpg",
            "media_type": "image",
            "created_at": "2026-10-18T10:00:00.000Z",
            "expires_at": "2026-10-19T10:00:00.000Z",
            "author": author()
        })))
        .unwrap();
        let now: DateTime<Utc> = "2026-10-20T00:00:00Z".parse().unwrap();
        assert!(!post.is_active(now));

        post.expires_at = None;
        assert!(post.is_active(now));
    }

    #[test]
    fn timestamps_sort_as_strings() {
        let early: DateTime<Utc> = "2026-10-18T09:59:59.5Z".parse().unwrap();
        let late: DateTime<Utc> = "2026-10-18T10:00:00Z".parse().unwrap();
        assert!(timestamp(early) < timestamp(late));
        assert_eq!(timestamp(late), "2026-10-18T10:00:00.000Z");
    }

    #[test]
    fn post_formatting_using_display() {
        let post = Post::parse_row(&row(json!({
            "id": "p1",
            "media_url": "https://cdn.example/p1.jpg",
            "media_type": "image",
            "caption": "This is a demo caption with emojis to test formatting 😃😃",
            "created_at": "2026-10-18T10:00:00.000Z",
            "author": author()
        })))
        .unwrap();
        let rendered = format!("{}", post);
        assert!(rendered.contains("@lofi_kid"));
        assert!(rendered.starts_with(&"-".repeat(54)));
    }

    #[test]
    fn long_caption_display_does_not_overflow() {
        let caption = "word ".repeat(3000);
        let post = Post::parse_row(&row(json!({
            "id": "p1",
            "media_url": "https://cdn.example/p1.jpg",
            "media_type": "video",
            "caption": caption,
            "created_at": "2026-10-18T10:00:00.000Z",
            "author": author()
        })))
        .unwrap();
        let rendered = format!("{}", post);
        // two header lines plus more than 255 wrapped caption lines
        assert!(rendered.lines().count() > 260);
        assert!(rendered.ends_with(&"-".repeat(54)));
    }
}
