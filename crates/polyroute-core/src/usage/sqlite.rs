//! SQLite-backed usage log.
//!
//! Two tables, compatible with databases written by earlier deployments:
//!
//! ```text
//! usage(provider, success, session_id, response_time, tier, created_at)
//! sessions(chat_id PK, last_provider, switch_count, status, last_used,
//!          last_tier, failed_tier)
//! ```
//!
//! Schema changes are additive. On open, columns missing from an existing
//! table are added with defaults, so old rows read back with `tier =
//! 'unknown'`. All statements run on the tokio-rusqlite background thread.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use polyroute_types::{BackendId, Tier};
use rusqlite::OptionalExtension;
use tracing::{debug, warn};

use super::{
    BackendStats, Result, SessionSummary, StorageError, UsageRecord, UsageSink,
};
use crate::session::SessionStatus;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    success INTEGER NOT NULL,
    session_id TEXT,
    response_time REAL NOT NULL DEFAULT 0,
    tier TEXT DEFAULT 'unknown',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_usage_provider ON usage(provider);
CREATE TABLE IF NOT EXISTS sessions (
    chat_id TEXT PRIMARY KEY,
    last_provider TEXT,
    switch_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    last_used TEXT,
    last_tier TEXT,
    failed_tier TEXT
);
";

/// Columns added after the first schema, with their declarations.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("usage", "tier", "TEXT DEFAULT 'unknown'"),
    ("usage", "created_at", "TEXT"),
    ("sessions", "last_tier", "TEXT"),
    ("sessions", "failed_tier", "TEXT"),
];

/// Durable usage log in a SQLite database.
pub struct SqliteUsageRecorder {
    conn: tokio_rusqlite::Connection,
}

impl SqliteUsageRecorder {
    /// Open (or create) the database at `path` and bring its schema up to
    /// date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(StorageError::database)?;
        let recorder = Self { conn };
        recorder.init_schema().await?;
        debug!(path = %path.display(), "usage database ready");
        Ok(recorder)
    }

    /// Open an existing database for reading only.
    ///
    /// No schema is created or migrated, so the file is left exactly as
    /// found. Columns added by newer builds read as `NULL` on older files.
    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio_rusqlite::Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await
        .map_err(StorageError::database)?;
        debug!(path = %path.display(), "usage database opened read-only");
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(StorageError::database)?;
        let recorder = Self { conn };
        recorder.init_schema().await?;
        Ok(recorder)
    }

    async fn init_schema(&self) -> Result<()> {
        let added = self
            .conn
            .call(|conn| -> rusqlite::Result<Vec<String>> {
                conn.execute_batch(SCHEMA)?;
                let mut added = Vec::new();
                for (table, column, decl) in ADDED_COLUMNS {
                    if ensure_column(conn, table, column, decl)? {
                        added.push(format!("{table}.{column}"));
                    }
                }
                Ok(added)
            })
            .await
            .map_err(StorageError::database)?;
        if !added.is_empty() {
            debug!(columns = ?added, "migrated usage database schema");
        }
        Ok(())
    }

    /// Append one attempt row.
    pub async fn insert_attempt(&self, record: &UsageRecord) -> Result<()> {
        let provider = record.backend.to_string();
        let success = i64::from(record.success);
        let session_id = record.session_id.clone();
        let latency = record.latency_secs;
        let tier = record.tier.clone();
        let created_at = record.timestamp.to_rfc3339();

        self.conn
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO usage (provider, success, session_id, response_time, tier, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![provider, success, session_id, latency, tier, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::database)
    }

    /// Insert or replace the summary row for one session.
    pub async fn upsert_session(&self, summary: &SessionSummary) -> Result<()> {
        let chat_id = summary.session_id.clone();
        let last_provider = summary.last_backend.as_ref().map(BackendId::to_string);
        let switch_count = i64::try_from(summary.switch_count).unwrap_or(i64::MAX);
        let status = summary.status.as_str();
        let failed_tier = match summary.status {
            SessionStatus::Exhausted { failed_tier } => Some(failed_tier.as_str()),
            SessionStatus::Active => None,
        };
        let last_used = summary.last_used.to_rfc3339();
        let last_tier = summary.last_tier.clone();

        self.conn
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT OR REPLACE INTO sessions \
                     (chat_id, last_provider, switch_count, status, last_used, last_tier, failed_tier) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        chat_id,
                        last_provider,
                        switch_count,
                        status,
                        last_used,
                        last_tier,
                        failed_tier
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::database)
    }

    /// Per-backend aggregates, busiest backend first.
    pub async fn stats(&self) -> Result<Vec<BackendStats>> {
        self.conn
            .call(|conn| -> rusqlite::Result<Vec<BackendStats>> {
                let mut stmt = conn.prepare(
                    "SELECT provider, COUNT(*), COALESCE(SUM(success), 0), \
                     COALESCE(AVG(response_time), 0.0) \
                     FROM usage GROUP BY provider ORDER BY COUNT(*) DESC, provider",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(BackendStats {
                        backend: row.get(0)?,
                        calls: row.get::<_, i64>(1)?.max(0) as u64,
                        successes: row.get::<_, i64>(2)?.max(0) as u64,
                        avg_latency_secs: row.get(3)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(StorageError::database)
    }

    /// The stored summary for `session_id`, if any.
    pub async fn session_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let chat_id = session_id.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<Option<SessionSummary>> {
                let sql = format!(
                    "SELECT chat_id, last_provider, switch_count, status, last_used, \
                     {}, {} FROM sessions WHERE chat_id = ?1",
                    column_or_null(conn, "sessions", "last_tier")?,
                    column_or_null(conn, "sessions", "failed_tier")?,
                );
                conn.query_row(
                    &sql,
                    rusqlite::params![chat_id],
                    |row| {
                        let status: Option<String> = row.get(3)?;
                        let failed_tier: Option<String> = row.get(6)?;
                        let last_used: Option<String> = row.get(4)?;
                        Ok(SessionSummary {
                            session_id: row.get(0)?,
                            last_backend: row.get::<_, Option<String>>(1)?.map(BackendId::from),
                            switch_count: row.get::<_, Option<i64>>(2)?.unwrap_or(0).max(0)
                                as u64,
                            status: parse_status(status.as_deref(), failed_tier.as_deref()),
                            last_used: last_used
                                .as_deref()
                                .and_then(parse_timestamp)
                                .unwrap_or_default(),
                            last_tier: row.get(5)?,
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(StorageError::database)
    }

    /// The most recent `limit` attempts, oldest first.
    pub async fn recent_attempts(&self, limit: usize) -> Result<Vec<UsageRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut records = self
            .conn
            .call(move |conn| -> rusqlite::Result<Vec<UsageRecord>> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT provider, success, session_id, response_time, {}, {} \
                     FROM usage ORDER BY rowid DESC LIMIT ?1",
                    column_or_null(conn, "usage", "tier")?,
                    column_or_null(conn, "usage", "created_at")?,
                ))?;
                let rows = stmt.query_map(rusqlite::params![limit], |row| {
                    let created_at: Option<String> = row.get(5)?;
                    Ok(UsageRecord {
                        backend: BackendId::from(row.get::<_, String>(0)?),
                        success: row.get::<_, Option<i64>>(1)?.unwrap_or(0) != 0,
                        session_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        latency_secs: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                        tier: row
                            .get::<_, Option<String>>(4)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        timestamp: created_at
                            .as_deref()
                            .and_then(parse_timestamp)
                            .unwrap_or_default(),
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(StorageError::database)?;
        records.reverse();
        Ok(records)
    }
}

#[async_trait]
impl UsageSink for SqliteUsageRecorder {
    async fn record_attempt(&self, record: &UsageRecord) {
        if let Err(e) = self.insert_attempt(record).await {
            warn!(
                backend = %record.backend,
                session = %record.session_id,
                error = %e,
                "failed to record usage attempt"
            );
        }
    }

    async fn record_session(&self, summary: &SessionSummary) {
        if let Err(e) = self.upsert_session(summary).await {
            warn!(
                session = %summary.session_id,
                error = %e,
                "failed to record session summary"
            );
        }
    }
}

impl std::fmt::Debug for SqliteUsageRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUsageRecorder").finish_non_exhaustive()
    }
}

/// Add `column` to `table` unless it already exists. Returns whether it
/// was added.
fn ensure_column(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> rusqlite::Result<bool> {
    if has_column(conn, table, column)? {
        return Ok(false);
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))?;
    Ok(true)
}

fn has_column(conn: &rusqlite::Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns.iter().any(|c| c == column))
}

/// `column` if `table` has it, else a `NULL` literal in its place.
fn column_or_null(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<String> {
    Ok(if has_column(conn, table, column)? {
        column.to_string()
    } else {
        "NULL".to_string()
    })
}

/// RFC 3339, or the `YYYY-MM-DD HH:MM:SS[.ffffff]` form older rows and
/// SQLite's `CURRENT_TIMESTAMP` use.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_status(status: Option<&str>, failed_tier: Option<&str>) -> SessionStatus {
    match (status, failed_tier.and_then(|t| t.parse::<Tier>().ok())) {
        (Some("all_exhausted"), Some(failed_tier)) => SessionStatus::Exhausted { failed_tier },
        _ => SessionStatus::Active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attempt(backend: &str, success: bool, session: &str, latency: f64) -> UsageRecord {
        let id = BackendId::from(backend);
        if success {
            UsageRecord::success(&id, session, latency, "simple")
        } else {
            UsageRecord::failure(&id, session, "simple")
        }
    }

    #[tokio::test]
    async fn attempts_read_back_in_order() {
        let db = SqliteUsageRecorder::open_in_memory().await.unwrap();
        db.insert_attempt(&attempt("groq", false, "s1", 0.0)).await.unwrap();
        db.insert_attempt(&attempt("gemini", true, "s1", 1.25)).await.unwrap();

        let rows = db.recent_attempts(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].backend.as_str(), "groq");
        assert!(!rows[0].success);
        assert_eq!(rows[1].backend.as_str(), "gemini");
        assert!(rows[1].success);
        assert_eq!(rows[1].latency_secs, 1.25);
        assert_eq!(rows[1].tier, "simple");

        let last = db.recent_attempts(1).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].backend.as_str(), "gemini");
    }

    #[tokio::test]
    async fn stats_aggregate_per_backend() {
        let db = SqliteUsageRecorder::open_in_memory().await.unwrap();
        db.insert_attempt(&attempt("groq", true, "a", 1.0)).await.unwrap();
        db.insert_attempt(&attempt("groq", true, "a", 3.0)).await.unwrap();
        db.insert_attempt(&attempt("groq", false, "b", 0.0)).await.unwrap();
        db.insert_attempt(&attempt("deepseek", true, "b", 2.0)).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.len(), 2);

        let groq = &stats[0];
        assert_eq!(groq.backend, "groq");
        assert_eq!(groq.calls, 3);
        assert_eq!(groq.successes, 2);
        assert!((groq.avg_latency_secs - 4.0 / 3.0).abs() < 1e-9);

        let deepseek = &stats[1];
        assert_eq!(deepseek.calls, 1);
        assert!((deepseek.success_rate() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stats_empty_database() {
        let db = SqliteUsageRecorder::open_in_memory().await.unwrap();
        assert!(db.stats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_summary_upserts() {
        let db = SqliteUsageRecorder::open_in_memory().await.unwrap();
        assert!(db.session_summary("chat-1").await.unwrap().is_none());

        let used = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut summary = SessionSummary {
            session_id: "chat-1".into(),
            last_backend: Some(BackendId::from("groq")),
            last_tier: Some("complex".into()),
            switch_count: 1,
            status: SessionStatus::Active,
            last_used: used,
        };
        db.upsert_session(&summary).await.unwrap();

        summary.switch_count = 2;
        summary.status = SessionStatus::Exhausted {
            failed_tier: Tier::Medium,
        };
        db.upsert_session(&summary).await.unwrap();

        let stored = db.session_summary("chat-1").await.unwrap().unwrap();
        assert_eq!(stored, summary);
    }

    #[tokio::test]
    async fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_stats.db");

        {
            let db = SqliteUsageRecorder::open(&path).await.unwrap();
            db.insert_attempt(&attempt("gemini", true, "s", 0.4)).await.unwrap();
        }

        let db = SqliteUsageRecorder::open(&path).await.unwrap();
        let stats = db.stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].backend, "gemini");
    }

    /// A database as the first schema version left it.
    fn write_legacy_db(path: &Path) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT,
                success INTEGER,
                session_id TEXT,
                response_time REAL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE sessions (
                chat_id TEXT PRIMARY KEY,
                last_provider TEXT,
                switch_count INTEGER DEFAULT 0,
                status TEXT,
                last_used TIMESTAMP
            );
            INSERT INTO usage (provider, success, session_id, response_time, created_at)
            VALUES ('groq', 1, '42', 0.8, '2024-05-01 10:00:00.123456');
            INSERT INTO sessions (chat_id, last_provider, switch_count, status, last_used)
            VALUES ('42', 'groq', 3, 'active', '2024-05-01 10:00:00');",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn legacy_database_gains_new_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        write_legacy_db(&path);

        let db = SqliteUsageRecorder::open(&path).await.unwrap();
        let rows = db.recent_attempts(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tier, "unknown");
        assert_eq!(
            rows[0].timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-05-01 10:00:00"
        );

        let session = db.session_summary("42").await.unwrap().unwrap();
        assert_eq!(session.switch_count, 3);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.last_tier.is_none());

        db.insert_attempt(&attempt("gemini", true, "42", 0.5)).await.unwrap();
        assert_eq!(db.stats().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn read_only_open_leaves_schema_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        write_legacy_db(&path);

        let db = SqliteUsageRecorder::open_read_only(&path).await.unwrap();
        let stats = db.stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].backend, "groq");

        let rows = db.recent_attempts(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tier, "unknown");

        let session = db.session_summary("42").await.unwrap().unwrap();
        assert_eq!(session.switch_count, 3);
        assert!(session.last_tier.is_none());

        assert!(db.insert_attempt(&attempt("gemini", true, "42", 0.5)).await.is_err());
        drop(db);

        let conn = rusqlite::Connection::open(&path).unwrap();
        assert!(!has_column(&conn, "sessions", "last_tier").unwrap());
        assert!(!has_column(&conn, "usage", "tier").unwrap());
    }

    #[tokio::test]
    async fn read_only_open_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(SqliteUsageRecorder::open_read_only(&path).await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2026-03-01T12:00:00+00:00").is_some());
        assert!(parse_timestamp("2026-03-01 12:00:00").is_some());
        assert!(parse_timestamp("2026-03-01 12:00:00.5").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn status_parsing() {
        assert_eq!(parse_status(Some("active"), None), SessionStatus::Active);
        assert_eq!(
            parse_status(Some("all_exhausted"), Some("complex")),
            SessionStatus::Exhausted {
                failed_tier: Tier::Complex
            }
        );
        assert_eq!(parse_status(Some("all_exhausted"), None), SessionStatus::Active);
        assert_eq!(parse_status(None, None), SessionStatus::Active);
    }
}
