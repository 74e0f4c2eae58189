//! The durable record store.
//!
//! Schema and query shapes are ported directly from `original_source/src/
//! app/database.py`'s `aiosqlite` functions. Error wrapping follows
//! `hook_common::pgqueue::PgQueueError`: sqlx errors are captured with the
//! failing command attached rather than surfaced bare, but since SQLite has
//! no connection-pool-vs-query distinction worth separating, a single
//! `StoreError::Database` variant carries the `#[from] sqlx::Error`.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::StoreError;
use crate::models::{CallbackAttempt, CallbackStatus, RequestMode, RequestRecord, RequestStatus};

pub type StoreResult<T> = Result<T, StoreError>;

/// Owns the connection pool and schema lifecycle for one SQLite database
/// file. Cheap to clone (the inner pool is reference-counted).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to `database_url` (e.g. `sqlite://consuma.db`), applying the
    /// same pragmas as `init_db`: WAL journaling and a 5 second busy
    /// timeout, so concurrent workers don't trip `SQLITE_BUSY` under load.
    ///
    /// `sqlite::memory:` gets a pool of exactly one connection: each
    /// physical connection to an in-memory database is its own private,
    /// empty database, so a second pooled connection would see none of the
    /// tables `migrate` just created on the first.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let max_connections = if database_url.contains(":memory:") { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout=5000").execute(&pool).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                id TEXT PRIMARY KEY,
                mode TEXT NOT NULL,
                input_data TEXT NOT NULL,
                iterations INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                result TEXT,
                duration_ms REAL,
                callback_url TEXT,
                callback_status TEXT,
                callback_attempts INTEGER NOT NULL DEFAULT 0,
                callback_error TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                completed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS callback_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL REFERENCES requests(id),
                attempt_number INTEGER NOT NULL,
                status_code INTEGER,
                error TEXT,
                duration_ms REAL NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_mode ON requests(mode)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_callback_attempts_request_id \
             ON callback_attempts(request_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Cheap liveness check backing `/healthz`'s `db_connected` field.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a brand new request row in `pending` status.
    pub async fn insert_request(
        &self,
        id: &str,
        mode: RequestMode,
        input_data: &str,
        iterations: u32,
        callback_url: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO requests (id, mode, input_data, iterations, callback_url) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(mode.to_string())
        .bind(input_data)
        .bind(iterations)
        .bind(callback_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the outcome of running the work function: final status, the
    /// digest, and how long it took.
    pub async fn update_request_result(
        &self,
        id: &str,
        status: RequestStatus,
        result: &str,
        duration_ms: f64,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE requests \
             SET status = ?, result = ?, duration_ms = ?, completed_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(result)
        .bind(duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the outcome of the callback delivery cycle.
    pub async fn update_callback_status(
        &self,
        id: &str,
        callback_status: CallbackStatus,
        attempts: u32,
        error: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE requests \
             SET callback_status = ?, callback_attempts = ?, callback_error = ? \
             WHERE id = ?",
        )
        .bind(callback_status.to_string())
        .bind(attempts)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one row to the delivery trace. Called before the attempt's
    /// outcome is reflected on the parent request row, so the trace always
    /// has at least as many rows as `callback_attempts` claims.
    pub async fn insert_callback_attempt(
        &self,
        request_id: &str,
        attempt_number: u32,
        status_code: Option<u16>,
        error: Option<&str>,
        duration_ms: f64,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO callback_attempts \
             (request_id, attempt_number, status_code, error, duration_ms) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(request_id)
        .bind(attempt_number)
        .bind(status_code.map(|c| c as i64))
        .bind(error)
        .bind(duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_request(&self, id: &str) -> StoreResult<Option<RequestRecord>> {
        let row = sqlx::query("SELECT * FROM requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    pub async fn get_callback_attempts(&self, request_id: &str) -> StoreResult<Vec<CallbackAttempt>> {
        let rows = sqlx::query(
            "SELECT * FROM callback_attempts WHERE request_id = ? ORDER BY attempt_number",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_attempt).collect()
    }

    /// List requests newest-first, optionally filtered by mode, backing
    /// `GET /requests`'s pagination.
    pub async fn list_requests(
        &self,
        mode: Option<RequestMode>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<RequestRecord>> {
        let rows = match mode {
            Some(mode) => {
                sqlx::query(
                    "SELECT * FROM requests WHERE mode = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(mode.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM requests ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_request).collect()
    }
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> StoreResult<RequestRecord> {
    let mode: String = row.try_get("mode")?;
    let status: String = row.try_get("status")?;
    let callback_status: Option<String> = row.try_get("callback_status")?;
    let created_at: String = row.try_get("created_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    Ok(RequestRecord {
        id: row.try_get("id")?,
        mode: mode.parse().map_err(invalid_enum)?,
        input_data: row.try_get("input_data")?,
        iterations: row.try_get::<i64, _>("iterations")? as u32,
        status: status.parse().map_err(invalid_enum)?,
        result: row.try_get("result")?,
        duration_ms: row.try_get("duration_ms")?,
        callback_url: row.try_get("callback_url")?,
        callback_status: callback_status.map(|s| s.parse().map_err(invalid_enum)).transpose()?,
        callback_attempts: row.try_get::<i64, _>("callback_attempts")? as u32,
        callback_error: row.try_get("callback_error")?,
        created_at: parse_timestamp(&created_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> StoreResult<CallbackAttempt> {
    let created_at: String = row.try_get("created_at")?;
    let status_code: Option<i64> = row.try_get("status_code")?;

    Ok(CallbackAttempt {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        attempt_number: row.try_get::<i64, _>("attempt_number")? as u32,
        status_code: status_code.map(|c| c as u16),
        error: row.try_get("error")?,
        duration_ms: row.try_get("duration_ms")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    // SQLite's datetime('now') produces "YYYY-MM-DD HH:MM:SS" with no
    // timezone offset; it is always UTC by construction.
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Database(sqlx::Error::ColumnDecode {
            index: "created_at".to_owned(),
            source: Box::new(e),
        }))
}

fn invalid_enum(message: String) -> StoreError {
    StoreError::Database(sqlx::Error::ColumnDecode {
        index: "status".to_owned(),
        source: message.into(),
    })
}
