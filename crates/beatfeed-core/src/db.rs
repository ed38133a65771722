//! A `DataService` backed by a local sqlite Db, with an in-process change
//! feed. Good enough for the CLI and for tests; a hosted backend would
//! implement the same trait over its REST/realtime API.

use crate::{
    post::timestamp,
    remote::{
        ChangeEvent, ChangeKind, DataService, Embed, Filter, Query, Row, Subscription,
        SubscriptionId, Table,
    },
    FeedError, FeedResult,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::{thread_rng, Rng};
use serde_json::Value as Json;
use sqlite::{Connection, State, Value};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};
use tokio::sync::mpsc;
use tracing::{debug, info};

const DB_PREFIX: &str = "beatfeed-";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS profiles
    (id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    display_name TEXT,
    avatar_url TEXT);

    CREATE TABLE IF NOT EXISTS posts
    (id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    media_url TEXT NOT NULL,
    media_type TEXT NOT NULL,
    caption TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    views INTEGER NOT NULL DEFAULT 0);

    CREATE TABLE IF NOT EXISTS comments
    (id TEXT PRIMARY KEY,
    post_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL);

    CREATE TABLE IF NOT EXISTS likes
    (post_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (post_id, user_id));

    CREATE TABLE IF NOT EXISTS messages
    (id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    read_at TEXT);
";

fn columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Profiles => &["id", "username", "display_name", "avatar_url"],
        Table::Posts => &[
            "id",
            "user_id",
            "media_url",
            "media_type",
            "caption",
            "created_at",
            "expires_at",
            "views",
        ],
        Table::Comments => &["id", "post_id", "user_id", "content", "created_at"],
        Table::Likes => &["post_id", "user_id"],
        Table::Messages => &[
            "id",
            "sender_id",
            "receiver_id",
            "content",
            "created_at",
            "read_at",
        ],
    }
}

struct Subscriber {
    id: SubscriptionId,
    table: Table,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

pub struct SqliteService {
    conn: Mutex<Connection>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
}

impl SqliteService {
    /// Open (or create) the Db at `path` and make sure the tables exist.
    pub fn open(path: impl AsRef<Path>) -> FeedResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.try_exists()? {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = sqlite::open(path).map_err(FeedError::from)?;
        setup_tables(&conn)?;
        info!("Opened store at {path:?}");
        Ok(Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    fn conn(&self) -> FeedResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FeedError::storage_error("connection lock poisoned".into()).into())
    }

    fn publish(&self, table: Table, kind: ChangeKind, rows: Vec<Row>) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        for row in rows {
            let event = ChangeEvent { table, kind, row };
            // closed receivers drop out here
            subscribers.retain(|sub| sub.table != table || sub.tx.send(event.clone()).is_ok());
        }
    }
}

pub fn setup_tables(conn: &Connection) -> FeedResult<()> {
    conn.execute(SCHEMA).map_err(FeedError::from)?;
    Ok(())
}

/// Names of the columns of `table` as the Db reports them.
pub fn query_table_info(conn: &Connection, table: Table) -> FeedResult<Vec<String>> {
    let statement = format!("PRAGMA table_info({});", table.name());
    let mut stmt = conn.prepare(statement).map_err(FeedError::from)?;
    let mut names = Vec::new();
    while let State::Row = stmt.next().map_err(FeedError::from)? {
        names.push(stmt.read::<String, _>("name").map_err(FeedError::from)?);
    }
    Ok(names)
}

fn to_sql(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(val) => Value::Integer(*val as i64),
        Json::Number(num) => match num.as_i64() {
            Some(val) => Value::Integer(val),
            None => Value::Float(num.as_f64().unwrap_or_default()),
        },
        Json::String(val) => Value::String(val.clone()),
        other => Value::String(other.to_string()),
    }
}

fn to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(val) => Json::from(val),
        Value::Float(val) => Json::from(val),
        Value::String(val) => Json::String(val),
        Value::Binary(val) => Json::from(val),
    }
}

/// Render `filters` as a WHERE clause with positional parameters.
fn where_clause(filters: &[Filter]) -> (String, Vec<Value>) {
    let mut parts = Vec::with_capacity(filters.len());
    let mut params = Vec::new();
    for filter in filters {
        match filter {
            Filter::Eq(column, Json::Null) => parts.push(format!("{column} IS NULL")),
            Filter::Eq(column, value) => {
                parts.push(format!("{column} = ?"));
                params.push(to_sql(value));
            }
            Filter::In(_, values) if values.is_empty() => parts.push("0".into()),
            Filter::In(column, values) => {
                let slots = vec!["?"; values.len()].join(", ");
                parts.push(format!("{column} IN ({slots})"));
                params.extend(values.iter().map(to_sql));
            }
            Filter::NullOrAfter(column, value) => {
                parts.push(format!("({column} IS NULL OR {column} > ?)"));
                params.push(to_sql(value));
            }
        }
    }
    if parts.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", parts.join(" AND ")), params)
    }
}

fn check_columns(table: Table, names: impl IntoIterator<Item = &'static str>) -> FeedResult<()> {
    let known = columns(table);
    for name in names {
        if !known.contains(&name) {
            return Err(FeedError::storage_error(format!(
                "unknown column {name} for {}",
                table.name()
            ))
            .into());
        }
    }
    Ok(())
}

fn filter_columns(filters: &[Filter]) -> Vec<&'static str> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, _) | Filter::In(column, _) | Filter::NullOrAfter(column, _) => *column,
        })
        .collect()
}

fn select(conn: &Connection, query: &Query) -> FeedResult<Vec<Row>> {
    check_columns(query.table, filter_columns(&query.filters))?;
    let (clause, params) = where_clause(&query.filters);
    let mut statement = format!("SELECT * FROM {}{}", query.table.name(), clause);
    if let Some(order) = query.order {
        check_columns(query.table, [order.column])?;
        let direction = if order.ascending { "ASC" } else { "DESC" };
        statement.push_str(&format!(
            " ORDER BY {} {direction}, rowid {direction}",
            order.column
        ));
    }
    if let Some(limit) = query.limit {
        statement.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(statement).map_err(FeedError::from)?;
    for (idx, param) in params.into_iter().enumerate() {
        stmt.bind((idx + 1, param)).map_err(FeedError::from)?;
    }
    let names = stmt.column_names().to_vec();
    let mut rows = Vec::new();
    while let State::Row = stmt.next().map_err(FeedError::from)? {
        let mut row = Row::new();
        for (idx, name) in names.iter().enumerate() {
            let value = stmt.read::<Value, _>(idx).map_err(FeedError::from)?;
            row.insert(name.clone(), to_json(value));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Attach each row's author profile under `author` (null when the profile
/// does not exist).
fn embed_authors(conn: &Connection, rows: &mut [Row]) -> FeedResult<()> {
    let user_ids: Vec<Json> = rows
        .iter()
        .filter_map(|row| row.get("user_id").cloned())
        .collect();
    let profiles = select(
        conn,
        &Query::from(Table::Profiles).filter(Filter::In("id", user_ids)),
    )?;
    let by_id: HashMap<String, Row> = profiles
        .into_iter()
        .filter_map(|profile| {
            let id = profile.get("id")?.as_str()?.to_owned();
            Some((id, profile))
        })
        .collect();
    for row in rows.iter_mut() {
        let author = row
            .get("user_id")
            .and_then(Json::as_str)
            .and_then(|id| by_id.get(id))
            .cloned()
            .map(Json::Object)
            .unwrap_or(Json::Null);
        row.insert("author".into(), author);
    }
    Ok(())
}

/// Fill in the columns the Db would generate for a hosted backend.
fn with_defaults(table: Table, mut record: Row) -> Row {
    let has = |col: &str| columns(table).contains(&col);
    if has("id") && !matches!(record.get("id"), Some(Json::String(id)) if !id.is_empty()) {
        record.insert("id".into(), Json::String(uuid::Uuid::new_v4().to_string()));
    }
    if has("created_at") && record.get("created_at").map_or(true, Json::is_null) {
        record.insert("created_at".into(), Json::String(timestamp(Utc::now())));
    }
    if has("views") && record.get("views").map_or(true, Json::is_null) {
        record.insert("views".into(), Json::from(0));
    }
    record
}

#[async_trait]
impl DataService for SqliteService {
    async fn query(&self, query: &Query) -> FeedResult<Vec<Row>> {
        let conn = self.conn()?;
        let mut rows = select(&conn, query)?;
        if let Some(Embed::Author) = query.embed {
            embed_authors(&conn, &mut rows)?;
        }
        debug!("{} rows from {}", rows.len(), query.table.name());
        Ok(rows)
    }

    async fn insert(&self, table: Table, record: Row) -> FeedResult<Row> {
        let record = with_defaults(table, record);
        let known = columns(table);
        let mut names = Vec::with_capacity(record.len());
        for name in record.keys() {
            match known.iter().find(|col| **col == name.as_str()) {
                Some(col) => names.push(*col),
                None => {
                    return Err(FeedError::storage_error(format!(
                        "unknown column {name} for {}",
                        table.name()
                    ))
                    .into())
                }
            }
        }
        let slots = vec!["?"; names.len()].join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({slots})",
            table.name(),
            names.join(", ")
        );

        {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(statement).map_err(FeedError::from)?;
            for (idx, name) in names.iter().enumerate() {
                stmt.bind((idx + 1, to_sql(&record[*name])))
                    .map_err(FeedError::from)?;
            }
            while let State::Row = stmt.next().map_err(FeedError::from)? {}
        }

        debug!("Inserted into {}", table.name());
        self.publish(table, ChangeKind::Insert, vec![record.clone()]);
        Ok(record)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> FeedResult<usize> {
        check_columns(table, filter_columns(filters))?;
        let removed = {
            let conn = self.conn()?;
            let removed = select(&conn, &Query {
                table,
                filters: filters.to_vec(),
                order: None,
                embed: None,
                limit: None,
            })?;
            let (clause, params) = where_clause(filters);
            let statement = format!("DELETE FROM {}{}", table.name(), clause);
            let mut stmt = conn.prepare(statement).map_err(FeedError::from)?;
            for (idx, param) in params.into_iter().enumerate() {
                stmt.bind((idx + 1, param)).map_err(FeedError::from)?;
            }
            while let State::Row = stmt.next().map_err(FeedError::from)? {}
            removed
        };

        let count = removed.len();
        debug!("Deleted {count} rows from {}", table.name());
        self.publish(table, ChangeKind::Delete, removed);
        Ok(count)
    }

    async fn subscribe(&self, table: Table) -> FeedResult<Subscription> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .map_err(|_| FeedError::storage_error("subscriber lock poisoned".into()))?
            .push(Subscriber { id, table, tx });
        debug!("Subscription {id} opened on {}", table.name());
        Ok(Subscription { id, events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> FeedResult<()> {
        self.subscribers
            .lock()
            .map_err(|_| FeedError::storage_error("subscriber lock poisoned".into()))?
            .retain(|sub| sub.id != id);
        debug!("Subscription {id} closed");
        Ok(())
    }
}

/// Generates a random db name with four 16-bit fields, such that when generating
/// random numbers, the range of each 16 bit field is 0-65536. Hence,
/// each random db name is `beatfeed-xxxxx-xxxxx-xxxxx-xxxxx.db`
/// The generated digits are padded with zeroes to ensure standardised
/// length of each field.
pub fn generate_random_db_name() -> String {
    let mut buffer = [0u16; 4];
    thread_rng().fill(&mut buffer);
    let mut result = buffer
        .into_iter()
        .map(|val| format!("{:05}", val.to_be()))
        .collect::<Vec<String>>()
        .join("-");
    result.insert_str(0, DB_PREFIX);
    result.push_str(".db");
    result
}

pub fn generate_temp_db() -> PathBuf {
    std::env::temp_dir().join(generate_random_db_name())
}
