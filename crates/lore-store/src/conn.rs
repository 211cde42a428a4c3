//! The single write connection, mutex-guarded. All reads and writes go
//! through it; the corpora served here never outgrow one connection.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use lore_core::errors::LoreResult;

use crate::to_store_err;

/// Mutex-guarded SQLite connection.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open (or create) the database file and apply pragmas.
    pub fn open(path: &Path) -> LoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_store_err(e.to_string()))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> LoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_store_err(e.to_string()))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a closure with the connection.
    pub fn with_conn<F, T>(&self, f: F) -> LoreResult<T>
    where
        F: FnOnce(&Connection) -> LoreResult<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|e| to_store_err(format!("connection lock poisoned: {e}")))?;
        f(&guard)
    }
}

/// WAL mode, NORMAL sync, busy timeout, foreign keys.
fn apply_pragmas(conn: &Connection) -> LoreResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
