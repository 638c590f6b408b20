// Watcher ownership: single-writer election over the shared store

use super::IndexStore;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;

/// Coordinator role produced by an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRole {
    /// This process performs writes and reacts to filesystem events.
    Owner,
    /// Another live owner exists; this process only serves queries.
    Reader,
}

/// The singleton coordination row.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipRow {
    pub pid: i64,
    pub heartbeat_at: String,
    pub instance_id: Option<String>,
}

/// Inputs to an acquisition attempt. The probe and clock are injectable so
/// death and recycling scenarios are testable without real processes.
pub struct AcquireOptions<'a> {
    pub now: DateTime<Utc>,
    pub is_alive: &'a dyn Fn(i64) -> bool,
    pub stale_after_seconds: i64,
    /// Random per-process identifier defeating PID recycling.
    pub instance_id: Option<&'a str>,
}

impl IndexStore {
    /// Try to become the watcher owner. Runs inside an immediate transaction
    /// so two concurrent callers serialize on the write lock.
    ///
    /// The row is replaced (and the caller promoted) when it is absent, its
    /// process is dead, its heartbeat is stale, or a live process carries a
    /// different instance identifier under a recycled pid. A live row with a
    /// fresh heartbeat demotes the caller to reader.
    pub fn acquire_ownership(&self, pid: i64, opts: &AcquireOptions) -> Result<OwnerRole> {
        self.immediate_transaction(|s| {
            let Some(row) = s.owner_row()? else {
                s.write_owner_row(pid, opts)?;
                debug!("Acquired ownership: no previous owner (pid {pid})");
                return Ok(OwnerRole::Owner);
            };

            let age = heartbeat_age_seconds(&row.heartbeat_at, opts.now);
            let pid_alive = (opts.is_alive)(row.pid);

            // A live process under the old pid but with a different instance
            // identifier is a recycled pid, not the old owner. The same-pid
            // case is this process's own refresh and falls through to the
            // stale check instead.
            if pid_alive
                && row.pid != pid
                && let (Some(theirs), Some(ours)) = (row.instance_id.as_deref(), opts.instance_id)
                && theirs != ours
            {
                s.write_owner_row(pid, opts)?;
                debug!(
                    "Acquired ownership: pid {} recycled (instance mismatch)",
                    row.pid
                );
                return Ok(OwnerRole::Owner);
            }

            if pid_alive && age < opts.stale_after_seconds {
                return Ok(OwnerRole::Reader);
            }

            s.write_owner_row(pid, opts)?;
            debug!(
                "Acquired ownership: previous owner pid {} {} (heartbeat age {}s)",
                row.pid,
                if pid_alive { "stale" } else { "dead" },
                age
            );
            Ok(OwnerRole::Owner)
        })
    }

    /// Refresh the heartbeat iff this process still owns the row.
    pub fn update_heartbeat(&self, pid: i64, now: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE watcher_owner SET heartbeat_at = ?1 WHERE pid = ?2",
            params![now.to_rfc3339(), pid],
        )?;
        Ok(())
    }

    /// Drop the ownership row iff this process owns it.
    pub fn release_ownership(&self, pid: i64) -> Result<()> {
        let count = self
            .conn()
            .execute("DELETE FROM watcher_owner WHERE pid = ?1", params![pid])?;
        if count > 0 {
            debug!("Released ownership (pid {pid})");
        }
        Ok(())
    }

    pub fn owner_row(&self) -> Result<Option<OwnershipRow>> {
        match self.conn().query_row(
            "SELECT pid, heartbeat_at, instance_id FROM watcher_owner WHERE id = 0",
            [],
            |row| {
                Ok(OwnershipRow {
                    pid: row.get(0)?,
                    heartbeat_at: row.get(1)?,
                    instance_id: row.get(2)?,
                })
            },
        ) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_owner_row(&self, pid: i64, opts: &AcquireOptions) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO watcher_owner (id, pid, heartbeat_at, instance_id)
             VALUES (0, ?1, ?2, ?3)",
            params![pid, opts.now.to_rfc3339(), opts.instance_id],
        )?;
        Ok(())
    }
}

/// Whole-second heartbeat age; an unparsable timestamp counts as age zero.
fn heartbeat_age_seconds(heartbeat_at: &str, now: DateTime<Utc>) -> i64 {
    DateTime::parse_from_rfc3339(heartbeat_at)
        .map(|t| (now - t.with_timezone(&Utc)).num_seconds().max(0))
        .unwrap_or(0)
}

/// Default liveness probe: ask the OS process table. A pid that is missing is
/// dead; anything else (including probe failures) counts as alive, erring on
/// the side of not stealing ownership.
pub fn probe_pid_alive(pid: i64) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

    let Ok(pid_u32) = u32::try_from(pid) else {
        return false;
    };
    let target = Pid::from_u32(pid_u32);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[target]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system.process(target).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> IndexStore {
        IndexStore::open(&dir.path().join("gildash.db")).unwrap()
    }

    fn opts<'a>(
        now: DateTime<Utc>,
        alive: &'a dyn Fn(i64) -> bool,
        stale: i64,
        instance: Option<&'a str>,
    ) -> AcquireOptions<'a> {
        AcquireOptions {
            now,
            is_alive: alive,
            stale_after_seconds: stale,
            instance_id: instance,
        }
    }

    #[test]
    fn first_caller_becomes_owner() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        let role = store
            .acquire_ownership(100, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
        assert_eq!(store.owner_row().unwrap().unwrap().pid, 100);
    }

    #[test]
    fn live_fresh_owner_demotes_second_caller() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        store
            .acquire_ownership(100, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();
        let role = store
            .acquire_ownership(200, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();
        assert_eq!(role, OwnerRole::Reader);
        assert_eq!(store.owner_row().unwrap().unwrap().pid, 100);
    }

    #[test]
    fn dead_owner_is_replaced() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        store
            .acquire_ownership(100, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();

        let dead = |pid: i64| pid != 100;
        let role = store
            .acquire_ownership(200, &opts(Utc::now(), &dead, 60, Some("b")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
        assert_eq!(store.owner_row().unwrap().unwrap().pid, 200);
    }

    #[test]
    fn stale_heartbeat_is_replaced_even_when_alive() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        let t0 = Utc::now();
        store
            .acquire_ownership(100, &opts(t0, &alive, 60, Some("a")))
            .unwrap();

        let later = t0 + chrono::Duration::seconds(61);
        let role = store
            .acquire_ownership(200, &opts(later, &alive, 60, Some("b")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
    }

    #[test]
    fn heartbeat_age_equal_to_threshold_is_stale() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        let t0 = Utc::now();
        store
            .acquire_ownership(100, &opts(t0, &alive, 60, Some("a")))
            .unwrap();

        let at_threshold = t0 + chrono::Duration::seconds(60);
        let role = store
            .acquire_ownership(200, &opts(at_threshold, &alive, 60, Some("b")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
    }

    #[test]
    fn zero_stale_threshold_always_promotes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        let now = Utc::now();
        store
            .acquire_ownership(100, &opts(now, &alive, 0, Some("a")))
            .unwrap();
        let role = store
            .acquire_ownership(200, &opts(now, &alive, 0, Some("b")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
    }

    #[test]
    fn recycled_pid_with_instance_mismatch_is_replaced() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        store
            .acquire_ownership(100, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();

        // pid 100 is alive again (recycled to a different process)
        let role = store
            .acquire_ownership(200, &opts(Utc::now(), &alive, 60, Some("b")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
        let row = store.owner_row().unwrap().unwrap();
        assert_eq!(row.pid, 200);
        assert_eq!(row.instance_id.as_deref(), Some("b"));
    }

    #[test]
    fn same_pid_instance_mismatch_is_own_refresh_not_recycling() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        let t0 = Utc::now();
        store
            .acquire_ownership(100, &opts(t0, &alive, 60, Some("a")))
            .unwrap();

        // Same pid, different instance id, fresh heartbeat: reader.
        let role = store
            .acquire_ownership(100, &opts(t0, &alive, 60, Some("z")))
            .unwrap();
        assert_eq!(role, OwnerRole::Reader);
        assert_eq!(
            store.owner_row().unwrap().unwrap().instance_id.as_deref(),
            Some("a")
        );
    }

    #[test]
    fn release_then_acquire_produces_owner() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        store
            .acquire_ownership(100, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();
        store.release_ownership(100).unwrap();
        assert!(store.owner_row().unwrap().is_none());

        let role = store
            .acquire_ownership(200, &opts(Utc::now(), &alive, 60, Some("b")))
            .unwrap();
        assert_eq!(role, OwnerRole::Owner);
    }

    #[test]
    fn release_by_non_owner_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        store
            .acquire_ownership(100, &opts(Utc::now(), &alive, 60, Some("a")))
            .unwrap();
        store.release_ownership(999).unwrap();
        assert_eq!(store.owner_row().unwrap().unwrap().pid, 100);
    }

    #[test]
    fn heartbeat_update_is_pid_guarded() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let alive = |_: i64| true;
        let t0 = Utc::now();
        store
            .acquire_ownership(100, &opts(t0, &alive, 60, Some("a")))
            .unwrap();
        let before = store.owner_row().unwrap().unwrap().heartbeat_at;

        store
            .update_heartbeat(999, t0 + chrono::Duration::seconds(30))
            .unwrap();
        assert_eq!(store.owner_row().unwrap().unwrap().heartbeat_at, before);

        store
            .update_heartbeat(100, t0 + chrono::Duration::seconds(30))
            .unwrap();
        assert_ne!(store.owner_row().unwrap().unwrap().heartbeat_at, before);
    }

    #[test]
    fn unparsable_heartbeat_counts_as_age_zero() {
        assert_eq!(heartbeat_age_seconds("not-a-timestamp", Utc::now()), 0);
    }
}
