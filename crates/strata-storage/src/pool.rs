//! Connection handling: one serialized writer, a small pool of readers.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use strata_core::config::StorageConfig;
use strata_core::errors::StorageError;
use strata_core::StrataResult;

use crate::to_storage_err;

fn poisoned(what: &str) -> strata_core::StrataError {
    strata_core::StrataError::StorageError(StorageError::PoolPoisoned(what.to_string()))
}

/// The single write connection. Holding its lock is what serializes
/// version-chain extension.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path, config: &StorageConfig) -> StrataResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| to_storage_err(format!("enable WAL: {e}")))?;
        apply_pragmas(&conn, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory(config: &StorageConfig) -> StrataResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn lock(&self) -> StrataResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| poisoned("write connection"))
    }

    /// Run `f` against the write connection.
    pub fn with_conn<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }
}

/// Read-only connections for file-backed databases, handed out round-robin.
pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn open(path: &Path, config: &StorageConfig) -> StrataResult<Self> {
        let size = config.read_pool_size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
            conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
                .map_err(|e| to_storage_err(e.to_string()))?;
            conns.push(Mutex::new(conn));
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.conns.len()
    }

    /// Run `f` against the next reader.
    pub fn with_conn<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let conn = self.conns[idx]
            .lock()
            .map_err(|_| poisoned("read connection"))?;
        f(&conn)
    }
}

fn apply_pragmas(conn: &Connection, config: &StorageConfig) -> StrataResult<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| to_storage_err(format!("apply pragmas: {e}")))
}
