//! Persistence for returning users, mirrored attachments and cached windows.
//!
//! [`Storage`] is the contract the rest of the server relies on;
//! [`SqliteStore`] is the only adapter. Calls are synchronous and short, the
//! connection is guarded by a mutex so the store can be shared across tasks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use o365ical_core::{TimeWindow, WINDOW_FORMAT};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use thiserror::Error;
use tracing::debug;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row for the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// A row with the same unique key already exists.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored contents could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value has an unexpected shape.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A previous holder of the connection panicked.
    #[error("storage connection poisoned")]
    Poisoned,
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Returns true for a cache miss or unknown key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true when a unique key was already taken.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Metadata of a mirrored attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Provider-assigned attachment id.
    pub attachment_id: String,
    /// File name on disk, inside the attachment's directory.
    pub file_name: String,
    /// MIME type served with the file.
    pub content_type: String,
    /// When the record was written.
    pub refreshed_at: DateTime<Utc>,
}

/// A cached window row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredWindow {
    /// Serialized event collection.
    pub contents: String,
    /// When the contents were last replaced.
    pub refreshed_at: DateTime<Utc>,
}

/// Storage contract used by the window cache, the attachment mirror and the
/// session registry.
pub trait Storage: Send + Sync {
    /// Returns every persisted `user -> session token` mapping.
    fn load_user_tokens(&self) -> StoreResult<HashMap<String, String>>;

    /// Inserts or replaces the session token of `user`.
    fn upsert_user_token(&self, user: &str, token: &str) -> StoreResult<()>;

    /// Looks up an attachment record. Fails with `NotFound` on a miss.
    fn find_attachment(&self, attachment_id: &str) -> StoreResult<AttachmentRecord>;

    /// Writes a new attachment record. Fails with `Duplicate` if the id is
    /// already recorded.
    fn insert_attachment(&self, record: &AttachmentRecord) -> StoreResult<()>;

    /// Loads the cached contents of `(user, window)`. Fails with `NotFound`
    /// on a miss.
    fn load_window(&self, user: &str, window: &TimeWindow) -> StoreResult<StoredWindow>;

    /// Atomically inserts or overwrites the cached contents of `(user, window)`.
    fn upsert_window(
        &self,
        user: &str,
        window: &TimeWindow,
        contents: &str,
        refreshed_at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logged_users (
    user TEXT PRIMARY KEY,
    token TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS attachments (
    att_id TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    content_type TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS window_cache (
    user TEXT NOT NULL,
    window_start TEXT NOT NULL,
    window_end TEXT NOT NULL,
    contents TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    PRIMARY KEY (user, window_start, window_end)
);
";

/// SQLite-backed [`Storage`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    /// Creates an in-memory store (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn window_key(window: &TimeWindow) -> (String, String) {
    (
        window.start.format(WINDOW_FORMAT).to_string(),
        window.end.format(WINDOW_FORMAT).to_string(),
    )
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp `{}`: {}", value, e)))
}

impl Storage for SqliteStore {
    fn load_user_tokens(&self) -> StoreResult<HashMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user, token FROM logged_users")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut tokens = HashMap::new();
        for row in rows {
            let (user, token): (String, String) = row?;
            tokens.insert(user, token);
        }
        Ok(tokens)
    }

    fn upsert_user_token(&self, user: &str, token: &str) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO logged_users (user, token, last_updated) VALUES (?1, ?2, ?3)
             ON CONFLICT(user) DO UPDATE SET token = excluded.token,
                                             last_updated = excluded.last_updated",
            params![user, token, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn find_attachment(&self, attachment_id: &str) -> StoreResult<AttachmentRecord> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT file_name, content_type, last_updated FROM attachments WHERE att_id = ?1",
                params![attachment_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let (file_name, content_type, last_updated) =
            row.ok_or_else(|| StoreError::not_found(format!("attachment {}", attachment_id)))?;

        Ok(AttachmentRecord {
            attachment_id: attachment_id.to_string(),
            file_name,
            content_type,
            refreshed_at: parse_timestamp(&last_updated)?,
        })
    }

    fn insert_attachment(&self, record: &AttachmentRecord) -> StoreResult<()> {
        let result = self.conn()?.execute(
            "INSERT INTO attachments (att_id, file_name, content_type, last_updated)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.attachment_id,
                record.file_name,
                record.content_type,
                record.refreshed_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Duplicate(format!(
                    "attachment {}",
                    record.attachment_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_window(&self, user: &str, window: &TimeWindow) -> StoreResult<StoredWindow> {
        let (start, end) = window_key(window);
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT contents, last_updated FROM window_cache
                 WHERE user = ?1 AND window_start = ?2 AND window_end = ?3",
                params![user, start, end],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let (contents, last_updated) = row.ok_or_else(|| {
            StoreError::not_found(format!("window {}..{} for {}", start, end, user))
        })?;

        Ok(StoredWindow {
            contents,
            refreshed_at: parse_timestamp(&last_updated)?,
        })
    }

    fn upsert_window(
        &self,
        user: &str,
        window: &TimeWindow,
        contents: &str,
        refreshed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let (start, end) = window_key(window);
        self.conn()?.execute(
            "INSERT INTO window_cache (user, window_start, window_end, contents, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user, window_start, window_end) DO UPDATE
                SET contents = excluded.contents, last_updated = excluded.last_updated",
            params![user, start, end, contents, refreshed_at.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 2, 8, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap(),
        )
    }

    fn record(id: &str) -> AttachmentRecord {
        AttachmentRecord {
            attachment_id: id.to_string(),
            file_name: "notes.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            refreshed_at: Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn user_tokens_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_user_tokens().unwrap().is_empty());

        store.upsert_user_token("jdoe", "token-1").unwrap();
        store.upsert_user_token("asmith", "token-2").unwrap();
        store.upsert_user_token("jdoe", "token-3").unwrap();

        let tokens = store.load_user_tokens().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["jdoe"], "token-3");
        assert_eq!(tokens["asmith"], "token-2");
    }

    #[test]
    fn attachment_insert_and_find() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.find_attachment("a1").unwrap_err().is_not_found());

        store.insert_attachment(&record("a1")).unwrap();
        assert_eq!(store.find_attachment("a1").unwrap(), record("a1"));
    }

    #[test]
    fn attachment_duplicate_is_reported() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_attachment(&record("a1")).unwrap();

        let err = store.insert_attachment(&record("a1")).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn window_upsert_overwrites() {
        let store = SqliteStore::in_memory().unwrap();
        let first = Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 2, 6, 9, 0, 0).unwrap();

        assert!(store.load_window("jdoe", &window()).unwrap_err().is_not_found());

        store.upsert_window("jdoe", &window(), "[1]", first).unwrap();
        store.upsert_window("jdoe", &window(), "[2]", second).unwrap();

        let stored = store.load_window("jdoe", &window()).unwrap();
        assert_eq!(stored.contents, "[2]");
        assert_eq!(stored.refreshed_at, second);
    }

    #[test]
    fn window_key_is_exact() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        store.upsert_window("jdoe", &window(), "[]", now).unwrap();

        let shifted = TimeWindow::new(window().start, window().end + chrono::Duration::days(1));
        assert!(store.load_window("jdoe", &shifted).unwrap_err().is_not_found());
        assert!(store.load_window("asmith", &window()).unwrap_err().is_not_found());
    }

    #[test]
    fn open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o365ical.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert_user_token("jdoe", "t").unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load_user_tokens().unwrap()["jdoe"], "t");
    }
}
