use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four logical resources the registry manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Embedding,
    Generation,
    Reranker,
    VectorStore,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Embedding,
        ResourceKind::Generation,
        ResourceKind::Reranker,
        ResourceKind::VectorStore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Embedding => "embedding",
            ResourceKind::Generation => "generation",
            ResourceKind::Reranker => "reranker",
            ResourceKind::VectorStore => "vector-store",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a resource handle.
///
/// `Degraded` means reachable-but-unreliable: the handle keeps serving
/// but is flagged in health reports. `Failed` is terminal for the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    Uninitialized,
    Ready,
    Degraded,
    Failed,
}

/// Per-kind status snapshot produced by `health_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub statuses: HashMap<ResourceKind, ResourceStatus>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// True when every tracked resource is `Ready`.
    pub fn all_ready(&self) -> bool {
        self.statuses
            .values()
            .all(|s| *s == ResourceStatus::Ready)
    }
}

/// One fallback occurrence, recorded when a retrieval path degrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub component: String,
    pub failure: String,
    pub fallback_used: String,
    pub timestamp: DateTime<Utc>,
}
