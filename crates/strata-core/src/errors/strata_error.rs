use super::{StorageError, TemporalError};

/// Top-level error type for Strata.
/// All subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    #[error("entity not found: {kind}/{id}")]
    EntityNotFound { kind: String, id: String },

    #[error("version not found: {version_id}")]
    VersionNotFound { version_id: i64 },

    #[error("temporal error: {0}")]
    TemporalError(#[from] TemporalError),

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("{hook} hook aborted the transaction: {reason}")]
    HookAborted { hook: String, reason: String },

    #[error("transaction rolled back: {0}")]
    RolledBack(Box<StrataError>),
}

/// What a failed call left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The call failed before writing anything; state is untouched.
    Unchanged,
    /// Writes had started; the transaction was rolled back.
    RolledBack,
}

impl StrataError {
    pub fn outcome(&self) -> FailureOutcome {
        match self {
            Self::RolledBack(_) => FailureOutcome::RolledBack,
            _ => FailureOutcome::Unchanged,
        }
    }

    /// The underlying error, looking through `RolledBack`.
    pub fn root(&self) -> &StrataError {
        match self {
            Self::RolledBack(inner) => inner.root(),
            other => other,
        }
    }

    /// The temporal precondition failure behind this error, if any.
    pub fn as_temporal(&self) -> Option<&TemporalError> {
        match self.root() {
            Self::TemporalError(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience type alias.
pub type StrataResult<T> = Result<T, StrataError>;
