//! # lore-store
//!
//! SQLite persistence for the retrieval core: one shared connection,
//! namespace-partitioned vector and document-metadata tables, the
//! per-knowledge-base Vector Index Accessor, and the reactive
//! vector/metadata consistency repair.

pub mod accessor;
pub mod conn;
pub mod engine;
pub mod migrations;
pub mod queries;

pub use accessor::{IndexHandle, RepairReport, VectorIndexAccessor};
pub use engine::StoreEngine;

use lore_core::errors::{LoreError, StoreError};

/// Shorthand for wrapping rusqlite error strings.
pub(crate) fn to_store_err(message: impl ToString) -> LoreError {
    StoreError::Sqlite {
        message: message.to_string(),
    }
    .into()
}
