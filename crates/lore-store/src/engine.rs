//! The store engine: owns the write connection and runs migrations at
//! open. Registered in the resource registry as the vector-store handle.

use std::path::Path;

use lore_core::errors::LoreResult;
use lore_core::traits::IProbe;

use crate::conn::WriteConnection;
use crate::migrations::run_migrations;
use crate::to_store_err;

pub struct StoreEngine {
    conn: WriteConnection,
}

impl StoreEngine {
    /// Open (or create) the database file and bring the schema current.
    pub fn open(path: &Path) -> LoreResult<Self> {
        let conn = WriteConnection::open(path)?;
        conn.with_conn(run_migrations)?;
        Ok(Self { conn })
    }

    /// In-memory engine for tests.
    pub fn open_in_memory() -> LoreResult<Self> {
        let conn = WriteConnection::open_in_memory()?;
        conn.with_conn(run_migrations)?;
        Ok(Self { conn })
    }

    pub fn with_conn<F, T>(&self, f: F) -> LoreResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> LoreResult<T>,
    {
        self.conn.with_conn(f)
    }
}

impl IProbe for StoreEngine {
    fn probe(&self) -> LoreResult<()> {
        self.with_conn(|c| {
            c.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| to_store_err(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_runs_migrations_and_probes() {
        let engine = StoreEngine::open_in_memory().unwrap();
        engine.probe().unwrap();
    }

    #[test]
    fn open_on_disk_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lore.db");
        {
            let engine = StoreEngine::open(&path).unwrap();
            engine.probe().unwrap();
        }
        let engine = StoreEngine::open(&path).unwrap();
        engine.probe().unwrap();
    }
}
