/// Resource-handle and model-provider errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("resource unavailable: {kind}")]
    Unavailable { kind: String },

    #[error("initialization failed for {kind} after {attempts} attempts: {reason}")]
    InitFailed {
        kind: String,
        attempts: u32,
        reason: String,
    },

    #[error("liveness probe failed for {kind}: {reason}")]
    ProbeFailed { kind: String, reason: String },

    #[error("request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("registry is shut down")]
    ShutDown,
}
