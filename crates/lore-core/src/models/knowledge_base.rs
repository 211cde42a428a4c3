use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{LoreError, LoreResult};

/// Validated knowledge-base identifier.
///
/// Names are normalized the way the ingestion layer creates them:
/// surrounding whitespace trimmed, interior spaces replaced by `_`.
/// Only ASCII alphanumerics, `_` and `-` are accepted, which keeps the
/// id safe to embed in file names and SQL namespace columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KbId(String);

impl KbId {
    /// Normalize and validate a raw knowledge-base name.
    pub fn new(raw: &str) -> LoreResult<Self> {
        let name = raw.trim().replace(' ', "_");
        if name.is_empty() {
            return Err(LoreError::Config(
                "knowledge base name must not be empty".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(LoreError::Config(format!(
                "invalid knowledge base name: {raw:?}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
