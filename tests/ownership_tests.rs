//! Ownership election across coordinators sharing one store, plus facade
//! lifecycle behavior.

use chrono::Utc;
use gildash::database::{AcquireOptions, IndexStore, OwnerRole};
use gildash::{Gildash, GildashOptions};
use std::path::PathBuf;
use tempfile::TempDir;

fn store_pair() -> (TempDir, IndexStore, IndexStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gildash.db");
    let first = IndexStore::open(&path).unwrap();
    let second = IndexStore::open(&path).unwrap();
    (dir, first, second)
}

fn options<'a>(
    alive: &'a dyn Fn(i64) -> bool,
    instance: &'a str,
) -> AcquireOptions<'a> {
    AcquireOptions {
        now: Utc::now(),
        is_alive: alive,
        stale_after_seconds: 60,
        instance_id: Some(instance),
    }
}

#[test]
fn reader_promotes_when_the_owner_dies() {
    let (_dir, p1, p2) = store_pair();
    let alive = |_: i64| true;

    assert_eq!(
        p1.acquire_ownership(100, &options(&alive, "a")).unwrap(),
        OwnerRole::Owner
    );
    assert_eq!(
        p2.acquire_ownership(200, &options(&alive, "b")).unwrap(),
        OwnerRole::Reader
    );

    // P1 dies; P2's next probe sees a dead pid and takes over.
    let p1_dead = |pid: i64| pid != 100;
    assert_eq!(
        p2.acquire_ownership(200, &options(&p1_dead, "b")).unwrap(),
        OwnerRole::Owner
    );
    let row = p2.owner_row().unwrap().unwrap();
    assert_eq!(row.pid, 200);
}

#[test]
fn pid_recycling_is_detected_through_instance_ids() {
    let (_dir, p1, p2) = store_pair();
    let alive = |_: i64| true;

    // P1 owns with instance id "a", then dies; the OS hands its pid to an
    // unrelated process, so the liveness probe keeps answering true.
    p1.acquire_ownership(100, &options(&alive, "a")).unwrap();

    let role = p2.acquire_ownership(200, &options(&alive, "b")).unwrap();
    assert_eq!(role, OwnerRole::Owner);
    let row = p2.owner_row().unwrap().unwrap();
    assert_eq!(row.pid, 200);
    assert_eq!(row.instance_id.as_deref(), Some("b"));
}

#[test]
fn two_stores_share_one_ownership_row() {
    let (_dir, p1, p2) = store_pair();
    let alive = |_: i64| true;

    p1.acquire_ownership(100, &options(&alive, "a")).unwrap();
    // Both handles observe the same singleton.
    assert_eq!(p1.owner_row().unwrap(), p2.owner_row().unwrap());

    p1.release_ownership(100).unwrap();
    assert!(p2.owner_row().unwrap().is_none());
}

#[tokio::test]
async fn watch_mode_elects_exactly_one_owner_per_store() {
    let dir = TempDir::new().unwrap();
    let root: PathBuf = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("a.ts"), "export const A = 1;\n").unwrap();

    let mut options = GildashOptions::new(&root);
    options.watch_mode = true;
    let engine = Gildash::open(options).await.unwrap();

    // The watcher task runs the election; wait for it to settle.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while engine.role() != OwnerRole::Owner && std::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }

    // Same process, same pid: the single engine becomes owner.
    assert_eq!(engine.role(), OwnerRole::Owner);

    engine.close().await.unwrap();

    // Close released the row, so a fresh engine can own immediately.
    let store = IndexStore::open(&root.join(".gildash/gildash.db")).unwrap();
    assert!(store.owner_row().unwrap().is_none());
}

#[tokio::test]
async fn closed_engine_fails_fast_and_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("a.ts"), "export const A = 1;\n").unwrap();

    let engine = Gildash::open(GildashOptions::new(&root)).await.unwrap();
    engine.full_index().await.unwrap();

    engine.close().await.unwrap();
    engine.close().await.unwrap();

    assert!(matches!(
        engine.full_index().await,
        Err(gildash::Error::Closed)
    ));
    assert!(matches!(engine.stats(), Err(gildash::Error::Closed)));
    assert!(matches!(
        engine.search_symbols(&gildash::SymbolQuery::prefix("a")),
        Err(gildash::Error::Closed)
    ));
}
