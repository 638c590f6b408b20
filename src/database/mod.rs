//! Embedded store.
//!
//! All persistent state lives in a single SQLite database: file rows, symbol
//! rows with an FTS5 companion index, relation rows with composite foreign
//! keys back to files, and the watcher-ownership singleton. One writer at a
//! time; the write lock plus the ownership row serialize processes.

mod files;
mod migrations;
mod ownership;
mod relations;
mod schema;
mod symbols;
mod types;

pub use ownership::{probe_pid_alive, AcquireOptions, OwnerRole, OwnershipRow};
pub use types::{
    DatabaseStats, FileRecord, RelationFilter, RelationRecord, SymbolQuery, SymbolRecord,
};

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Seconds SQLite waits on the write lock before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts per operation when the write lock stays contended.
const BUSY_RETRY_ATTEMPTS: u32 = 5;

pub struct IndexStore {
    conn: Connection,
    file_path: PathBuf,
    /// Open transaction nesting depth; inner calls are savepoint-free no-ops.
    tx_depth: Cell<u32>,
}

impl IndexStore {
    /// Open (creating if needed) the store at `db_path`.
    ///
    /// Open-time sequence: enable WAL, disable foreign keys, run migrations
    /// and schema creation, verify referential integrity, re-enable foreign
    /// keys. Any integrity violation aborts the open.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                file: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        // Cascade deletes must still fire the FTS sync triggers.
        conn.execute("PRAGMA recursive_triggers = ON", [])?;

        let mut store = Self {
            conn,
            file_path: db_path.to_path_buf(),
            tx_depth: Cell::new(0),
        };

        // Migrations may rebuild tables with a different FK shape, so the
        // whole window runs unenforced and is verified afterwards.
        store.conn.execute("PRAGMA foreign_keys = OFF", [])?;
        store.run_migrations()?;
        store.initialize_schema()?;
        store.check_integrity()?;
        store.conn.execute("PRAGMA foreign_keys = ON", [])?;

        debug!("Opened index store at {}", db_path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn check_integrity(&self) -> Result<()> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let table: String = row.get(0)?;
            return Err(Error::StoreIntegrity(format!(
                "foreign_key_check reported violations in table '{table}'"
            )));
        }
        Ok(())
    }

    /// Run `f` inside a deferred transaction. Nested calls join the open
    /// transaction instead of creating savepoints.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.run_tx("BEGIN", f)
    }

    /// Run `f` inside a transaction that reserves the write lock up front.
    pub fn immediate_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.run_tx("BEGIN IMMEDIATE", f)
    }

    fn run_tx<T>(&self, begin: &str, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        if self.tx_depth.get() > 0 {
            self.tx_depth.set(self.tx_depth.get() + 1);
            let result = f(self);
            self.tx_depth.set(self.tx_depth.get() - 1);
            return result;
        }

        with_busy_retry(|| self.conn.execute_batch(begin).map_err(Error::from))?;
        self.tx_depth.set(1);
        let result = f(self);
        self.tx_depth.set(0);
        match result {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                // Best effort: the connection may already have rolled back.
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    /// Counter bumped inside every index transaction; readers compare it to
    /// decide whether their graph caches are current.
    pub fn index_version(&self) -> Result<i64> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'index_version'",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub(crate) fn bump_index_version(&self) -> Result<i64> {
        let next = self.index_version()? + 1;
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES ('index_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![next.to_string()],
        )?;
        Ok(next)
    }

    /// Aggregate row counts for the stats surface.
    pub fn stats(&self) -> Result<DatabaseStats> {
        let total_files: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let total_symbols: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        let total_relations: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))?;

        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM symbols GROUP BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut symbols_by_kind = std::collections::HashMap::new();
        for row in rows {
            let (kind, count) = row?;
            symbols_by_kind.insert(kind, count);
        }

        let db_size_mb = std::fs::metadata(&self.file_path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        Ok(DatabaseStats {
            total_files,
            total_symbols,
            total_relations,
            symbols_by_kind,
            db_size_mb,
        })
    }
}

/// Retry `op` on write-lock contention. Each attempt already waits out the
/// store's busy timeout; running out of attempts surfaces a typed busy error.
pub(crate) fn with_busy_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Err(err) if is_busy(&err) => {
                if attempt >= BUSY_RETRY_ATTEMPTS {
                    info!("store still busy after {attempt} attempts");
                    return Err(Error::StoreBusy { attempts: attempt });
                }
                debug!("store busy (attempt {attempt}), retrying");
            }
            other => return other,
        }
    }
}

fn is_busy(err: &Error) -> bool {
    matches!(
        err,
        Error::Store(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::DatabaseBusy
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> IndexStore {
        IndexStore::open(&dir.path().join("gildash.db")).unwrap()
    }

    #[test]
    fn open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        drop(open_store(&dir));
        drop(open_store(&dir));
    }

    #[test]
    fn nested_transactions_are_noops() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .transaction(|s| {
                s.immediate_transaction(|inner| {
                    inner.bump_index_version()?;
                    Ok(())
                })?;
                s.bump_index_version()?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.index_version().unwrap(), 2);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let result: Result<()> = store.transaction(|s| {
            s.bump_index_version()?;
            Err(Error::Closed)
        });
        assert!(result.is_err());
        assert_eq!(store.index_version().unwrap(), 0);
    }

    #[test]
    fn index_version_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert_eq!(store.index_version().unwrap(), 0);
        assert_eq!(store.bump_index_version().unwrap(), 1);
    }
}
