/// Vector/metadata store errors for SQLite operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("unknown knowledge base: {kb}")]
    UnknownKnowledgeBase { kb: String },

    #[error("knowledge base already exists: {kb}")]
    KnowledgeBaseExists { kb: String },

    #[error("vector and metadata stores disagree for {kb}: {vectors} vectors vs {metadata} metadata rows")]
    Inconsistent {
        kb: String,
        vectors: usize,
        metadata: usize,
    },

    #[error("partial write rolled back for {kb}: {reason}")]
    PartialWrite { kb: String, reason: String },
}
