//! SQLite persistence for users, game progress, support tickets
//! and analysis records.
//!
//! Every operation opens its own connection (WAL, foreign keys, busy
//! timeout), so a [`Store`] is a cheap, cloneable handle holding only the
//! database path. Methods are blocking; async callers run them through
//! `tokio::task::spawn_blocking`.
//!
//! Each collection lives in its own submodule, which also owns the record
//! types for that collection.

/// `ToSql`/`FromSql` for enums stored as their `as_str()` text.
macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub mod analyses;
pub mod progress;
pub mod tickets;
pub mod users;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;

use crate::error::AppError;

/// Schema version stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct Store {
    db_path: Arc<PathBuf>,
}

/// A stored enum column held a value outside its variant set.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl Store {
    /// Open (creating if needed) the database at `db_path` and apply the schema.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let store = Self { db_path: Arc::new(db_path.to_path_buf()) };
        store.init_db()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.conn()?;
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(store_err("read user_version"))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        init_schema(&conn)
    }

    /// Open a connection with the pragmas every operation relies on.
    pub(crate) fn conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(self.db_path.as_path()).map_err(|e| {
            AppError::Store(format!("open {}: {e}", self.db_path.display()))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(store_err("set journal_mode WAL"))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(store_err("set foreign_keys ON"))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(store_err("set busy_timeout"))?;
        Ok(conn)
    }
}

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            age INTEGER,
            profile_picture TEXT,
            share_progress_with_teachers INTEGER NOT NULL DEFAULT 0,
            allow_activity_tracking INTEGER NOT NULL DEFAULT 1,
            receive_emails INTEGER NOT NULL DEFAULT 1,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS auth_tokens (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, token_hash)
        );

        CREATE TABLE IF NOT EXISTS game_progress (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            game_type TEXT NOT NULL CHECK (game_type IN ('seguin', 'monkey', 'jigsaw')),
            completion_time REAL NOT NULL,
            accuracy REAL NOT NULL CHECK (accuracy >= 0 AND accuracy <= 100),
            level INTEGER NOT NULL,
            date TEXT NOT NULL,
            age_group TEXT,
            puzzle_size TEXT,
            total_pieces INTEGER,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_progress_user_game_date
            ON game_progress (user_id, game_type, date);

        CREATE TABLE IF NOT EXISTS support_tickets (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            subject TEXT NOT NULL,
            message TEXT NOT NULL,
            email TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'in-progress', 'resolved', 'closed')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ticket_responses (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id TEXT NOT NULL REFERENCES support_tickets(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            results TEXT NOT NULL,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        PRAGMA user_version = 1;
        ",
    )
    .map_err(store_err("initialize schema"))
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Wrap a rusqlite error with the operation that produced it.
pub(crate) fn store_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> AppError {
    move |e| AppError::Store(format!("{context}: {e}"))
}

/// Time-ordered record id.
pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Convert a JSON column decode failure into a rusqlite row error.
pub(crate) fn json_column_err(idx: usize, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_parent_dirs_and_schema() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("mindpop.db");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());

        let conn = store.conn().unwrap();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn reopen_is_idempotent() {
        let (tmp, _store) = testing::store();
        let again = Store::open(&tmp.path().join("mindpop.db"));
        assert!(again.is_ok());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
