//! Direct messages between two users. Only the write path lives here; the
//! feed uses it for "message the author" style actions.

use crate::{
    post::{timestamp, UserId},
    remote::{into_row, DataService, Row, Table},
    FeedError, FeedResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn parse_row(row: &Row) -> FeedResult<Self> {
        let table = Table::Messages.name();
        let message: Message = serde_json::from_value(serde_json::Value::Object(row.clone()))
            .map_err(|err| FeedError::malformed(table, err.to_string()))?;
        if message.id.is_empty() || message.sender_id.is_empty() || message.receiver_id.is_empty() {
            return Err(FeedError::malformed(table, "id, sender or receiver is empty").into());
        }
        Ok(message)
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Send `content` from `sender` to `receiver`, returning the stored message.
pub async fn send(
    service: &dyn DataService,
    sender: &UserId,
    receiver: &str,
    content: &str,
) -> FeedResult<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(FeedError::EmptyMessage.into());
    }
    let record = into_row(json!({
        "sender_id": sender,
        "receiver_id": receiver,
        "content": content,
        "created_at": timestamp(Utc::now()),
        "read_at": null,
    }))?;
    let stored = service.insert(Table::Messages, record).await?;
    Message::parse_row(&stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unread_message() {
        let row = into_row(json!({
            "id": "m1",
            "sender_id": "u1",
            "receiver_id": "u2",
            "content": "yo, send me the stems",
            "created_at": "2026-10-18T10:00:00.000Z",
            "read_at": null
        }))
        .unwrap();
        let message = Message::parse_row(&row).unwrap();
        assert_eq!(message.receiver_id, "u2");
        assert!(!message.is_read());
    }

    #[test]
    fn parse_rejects_missing_receiver() {
        let row = into_row(json!({
            "id": "m1",
            "sender_id": "u1",
            "receiver_id": "",
            "content": "hello",
            "created_at": "2026-10-18T10:00:00.000Z"
        }))
        .unwrap();
        assert!(Message::parse_row(&row).is_err());
    }
}
