use chrono::{DateTime, Utc};

/// Precondition failures raised by the versioning engine.
///
/// Every variant is raised synchronously by the call that violates it and is
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum TemporalError {
    #[error("{kind}/{id} has no created_at, so the start of its first version cannot be known")]
    MissingCreationTimestamp { kind: String, id: String },

    #[error("cannot resolve state at {requested}: it is later than now ({now})")]
    FutureQuery {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("version upper bound {end} must be after its lower bound {start}")]
    InvalidTemporalBound {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("cannot revert to a {operation} version: {reason}")]
    InvalidRevertTarget { operation: String, reason: String },

    #[error("cannot untrash a {operation} version: {reason}")]
    InvalidUntrashTarget { operation: String, reason: String },

    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
}
