use thiserror::Error;

#[derive(Debug, Error)]
pub enum BTreeError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a node storage provider (missing node, corrupt record, ...).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);
