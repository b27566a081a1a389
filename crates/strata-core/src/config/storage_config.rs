//! Storage subsystem configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the SQLite collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Read connections opened for file-backed databases.
    pub read_pool_size: usize,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            read_pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}
