//! Bounded exponential backoff for resource initialization.

use std::thread;
use std::time::Duration;

use tracing::warn;

use lore_core::errors::{LoreResult, ProviderError};
use lore_core::models::ResourceKind;

/// Run `init` up to `max_attempts` times, sleeping `base^attempt` seconds
/// between failures. Returns the first success, or `InitFailed` carrying
/// the last error once the attempt cap is reached.
pub fn retry_init<T>(
    kind: ResourceKind,
    max_attempts: u32,
    base_secs: u64,
    mut init: impl FnMut() -> LoreResult<T>,
) -> LoreResult<T> {
    let attempts = max_attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        match init() {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_reason = e.to_string();
                warn!(
                    kind = %kind,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "resource initialization attempt failed"
                );
                if attempt < attempts {
                    let delay = base_secs.saturating_pow(attempt);
                    thread::sleep(Duration::from_secs(delay));
                }
            }
        }
    }

    Err(ProviderError::InitFailed {
        kind: kind.as_str().to_string(),
        attempts,
        reason: last_reason,
    }
    .into())
}
