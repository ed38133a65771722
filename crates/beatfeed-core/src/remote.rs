//! The contract with the remote data service: a relational store reachable
//! through query/insert/delete plus a per-table change feed.

use crate::{FeedError, FeedResult};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// A loosely typed row, as a REST backend would return it. Rows only become
/// domain types after crossing a `parse_row` function.
pub type Row = serde_json::Map<String, Value>;

pub type SubscriptionId = u64;

/// Build a record for `insert` out of a `json!` object literal.
pub fn into_row(value: Value) -> FeedResult<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FeedError::custom_error(format!("expected a JSON object, got {other}")).into()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Posts,
    Comments,
    Likes,
    Messages,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Likes => "likes",
            Table::Messages => "messages",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
    /// `column IS NULL OR column > value`
    NullOrAfter(&'static str, Value),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embed {
    /// Join `profiles` on `user_id` and attach it under `author`.
    Author,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub embed: Option<Embed>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            embed: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One event from the change feed. For deletes `row` holds the old record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row: Row,
}

impl ChangeEvent {
    pub fn row_id(&self) -> Option<&str> {
        self.row.get("id").and_then(Value::as_str)
    }
}

/// A live change-feed subscription. Hand the id back to
/// [`DataService::unsubscribe`] to release it.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn query(&self, query: &Query) -> FeedResult<Vec<Row>>;

    /// Insert a record and return it as stored (with generated columns).
    async fn insert(&self, table: Table, record: Row) -> FeedResult<Row>;

    /// Delete every row matching all `filters`; returns the number removed.
    async fn delete(&self, table: Table, filters: &[Filter]) -> FeedResult<usize>;

    async fn subscribe(&self, table: Table) -> FeedResult<Subscription>;

    async fn unsubscribe(&self, id: SubscriptionId) -> FeedResult<()>;
}
