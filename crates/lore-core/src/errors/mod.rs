//! Error taxonomy for the lore workspace.
//!
//! One thiserror enum per subsystem, gathered under [`LoreError`].
//! Cache corruption is deliberately absent: an unreadable lexical cache
//! file is a cache miss, never an error.

mod provider_error;
mod retrieval_error;
mod store_error;

pub use provider_error::ProviderError;
pub use retrieval_error::RetrievalError;
pub use store_error::StoreError;

/// Top-level error type for the lore workspace.
#[derive(Debug, thiserror::Error)]
pub enum LoreError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("config error: {0}")]
    Config(String),
}

/// Result alias used across the workspace.
pub type LoreResult<T> = Result<T, LoreError>;
