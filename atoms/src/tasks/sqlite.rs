//! Durable backend on a pooled `SQLite` database.
//!
//! Each new connection gets WAL mode, a busy timeout and the `fold_case`
//! function used for case-insensitive search. The `tasks` table is created on
//! open if it does not exist yet.
//!
//! Timestamps are stored as fixed-width RFC 3339 text with microseconds, so
//! ordering by the text column is ordering by time.

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

use super::error::{StoreError, StoreResult};
use super::model::{fold_case, next_updated_at, StatusFilter, Task, TaskChanges, TaskQuery, TaskSort};
use super::repository::{Backend, TaskRepository};

pub type ConnectionPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    completed   INTEGER NOT NULL DEFAULT 0,
    priority    INTEGER NOT NULL DEFAULT 1 CHECK (priority BETWEEN 1 AND 3),
    due_date    TEXT,
    tags        TEXT NOT NULL DEFAULT '[]',
    notes       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks (created_at);
";

const COLUMNS: &str = "id, title, completed, priority, due_date, tags, notes, created_at, updated_at";

/// Pool settings for the durable backend.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pooled connections (default: 4).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        register_functions(conn)
    }
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| fold_case(&t)))
        },
    )
}

/// Tasks stored in a `SQLite` database.
pub struct RelationalRepository {
    pool: ConnectionPool,
}

impl RelationalRepository {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &str, config: &ConnectionConfig) -> StoreResult<Self> {
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(std::time::Duration::from_secs(5))
            .connection_customizer(Box::new(ConnectionCustomizer {
                busy_timeout_ms: config.busy_timeout_ms,
            }))
            .build(SqliteConnectionManager::file(path))?;
        Self::from_pool(pool)
    }

    /// Private in-memory database. A single connection is kept alive for the
    /// lifetime of the pool so every call sees the same data.
    pub fn in_memory() -> StoreResult<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_customizer(Box::new(ConnectionCustomizer {
                busy_timeout_ms: ConnectionConfig::default().busy_timeout_ms,
            }))
            .build(SqliteConnectionManager::memory())?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: ConnectionPool) -> StoreResult<Self> {
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let due_date: Option<String> = row.get(4)?;
    let tags: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        completed: row.get(2)?,
        priority: row.get(3)?,
        due_date: due_date.map(|raw| parse_ts(4, &raw)).transpose()?,
        tags: serde_json::from_str(&tags)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        notes: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
        updated_at: parse_ts(8, &updated_at)?,
    })
}

/// Kept in lockstep with [`TaskSort::compare`].
fn order_by(sort: TaskSort) -> &'static str {
    match sort {
        TaskSort::Created => "created_at DESC, id ASC",
        TaskSort::Due => "due_date IS NULL, due_date ASC, created_at DESC, id ASC",
        TaskSort::Priority => "priority ASC, created_at DESC, id ASC",
    }
}

fn optional_text(value: Option<String>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Text)
}

/// `SET` clause built from whichever fields are present. Values are only
/// ever bound, never spliced into the SQL text.
#[derive(Default)]
struct Assignments {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Assignments {
    fn push(&mut self, column: &str, value: SqlValue) {
        self.values.push(value);
        self.columns.push(format!("{column} = ?{}", self.values.len()));
    }

    fn from_changes(changes: &TaskChanges) -> StoreResult<Self> {
        let mut set = Self::default();
        if let Some(title) = changes.title.as_set() {
            set.push("title", SqlValue::Text(title.clone()));
        }
        if let Some(completed) = changes.completed.as_set() {
            set.push("completed", SqlValue::Integer(i64::from(*completed)));
        }
        if let Some(priority) = changes.priority.as_set() {
            set.push("priority", SqlValue::Integer(i64::from(*priority)));
        }
        if let Some(due_date) = changes.due_date.as_set() {
            set.push("due_date", optional_text(due_date.map(format_ts)));
        }
        if let Some(tags) = changes.tags.as_set() {
            set.push("tags", SqlValue::Text(serde_json::to_string(tags)?));
        }
        if let Some(notes) = changes.notes.as_set() {
            set.push("notes", optional_text(notes.clone()));
        }
        Ok(set)
    }
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl TaskRepository for RelationalRepository {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn list(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(needle) = query.needle() {
            values.push(SqlValue::Text(needle));
            let n = values.len();
            clauses.push(format!(
                "(instr(fold_case(title), ?{n}) > 0 OR instr(fold_case(coalesce(notes, '')), ?{n}) > 0)"
            ));
        }
        match query.status {
            StatusFilter::All => {}
            StatusFilter::Active => clauses.push("completed = 0".to_string()),
            StatusFilter::Completed => clauses.push("completed = 1".to_string()),
        }

        let mut sql = format!("SELECT {COLUMNS} FROM tasks");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by(query.sort));
        values.push(SqlValue::Integer(
            i64::try_from(query.limit).unwrap_or(i64::MAX),
        ));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        let conn = self.pool.get()?;
        let task = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn insert(&self, task: &Task) -> StoreResult<Task> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!(
                "INSERT INTO tasks ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 RETURNING {COLUMNS}"
            ),
            params![
                task.id,
                task.title,
                task.completed,
                task.priority,
                task.due_date.map(format_ts),
                serde_json::to_string(&task.tags)?,
                task.notes,
                format_ts(task.created_at),
                format_ts(task.updated_at),
            ],
            task_from_row,
        )
        .map_err(|e| {
            if is_primary_key_violation(&e) {
                StoreError::Conflict(task.id.clone())
            } else {
                StoreError::Sqlite(e)
            }
        })
    }

    fn update(
        &self,
        id: &str,
        changes: &TaskChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let mut set = Assignments::from_changes(changes)?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT updated_at FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(previous) = previous else {
            return Ok(None);
        };

        let stamp = next_updated_at(parse_ts(0, &previous)?, now);
        set.push("updated_at", SqlValue::Text(format_ts(stamp)));
        set.values.push(SqlValue::Text(id.to_string()));
        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ?{} RETURNING {COLUMNS}",
            set.columns.join(", "),
            set.values.len()
        );

        let task = tx.query_row(&sql, params_from_iter(set.values.iter()), task_from_row)?;
        tx.commit()?;
        Ok(Some(task))
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}
