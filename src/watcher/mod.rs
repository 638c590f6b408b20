//! Filesystem watching and single-writer role management.
//!
//! The owner coordinator subscribes to filesystem events, debounces them per
//! path, and dispatches coalesced batches to the index coordinator. Readers
//! never react to filesystem events; they re-probe ownership on a cadence
//! and promote when the owner dies, goes stale, or releases. Watcher I/O
//! failures always reach the error channel; no callback swallows them.

pub mod debounce;
pub mod events;

use crate::database::{probe_pid_alive, AcquireOptions, IndexStore, OwnerRole};
use crate::error::Result;
use crate::indexing::IndexCoordinator;
use crate::EngineEvent;
use chrono::Utc;
use debounce::Debouncer;
use notify::{RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub debounce_ms: u64,
    pub heartbeat_interval: u64,
    pub reader_poll_interval: u64,
    pub stale_after_seconds: i64,
}

/// Handle to the running watcher task.
pub(crate) struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn(
    config: WatcherConfig,
    store: Arc<Mutex<IndexStore>>,
    coordinator: Arc<IndexCoordinator>,
    events_tx: broadcast::Sender<EngineEvent>,
    role_cell: Arc<Mutex<OwnerRole>>,
    pid: i64,
    instance_id: String,
) -> WatcherHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(
        config,
        store,
        coordinator,
        events_tx,
        role_cell,
        pid,
        instance_id,
        shutdown_rx,
    ));
    WatcherHandle {
        shutdown: shutdown_tx,
        task,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config: WatcherConfig,
    store: Arc<Mutex<IndexStore>>,
    coordinator: Arc<IndexCoordinator>,
    events_tx: broadcast::Sender<EngineEvent>,
    role_cell: Arc<Mutex<OwnerRole>>,
    pid: i64,
    instance_id: String,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let ignore: Vec<glob::Pattern> = config
        .ignore_patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let emit = |event: EngineEvent| {
        let _ = events_tx.send(event);
    };

    let mut role = match try_acquire(&store, pid, &instance_id, config.stale_after_seconds) {
        Ok(role) => role,
        Err(err) => {
            // Never crash on ownership trouble; stay a reader and re-probe.
            emit(EngineEvent::Error(format!("ownership: {err}")));
            OwnerRole::Reader
        }
    };
    *role_cell.lock() = role;
    emit(EngineEvent::RoleChanged(role));
    info!("Watcher started as {:?} (pid {pid})", role);

    let (fs_tx, mut fs_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut fs_watcher = None;
    if role == OwnerRole::Owner {
        fs_watcher = start_fs_watcher(&config.root, fs_tx.clone(), &emit);
    }

    let mut debouncer = Debouncer::new(config.debounce_ms);
    let mut tick = tokio::time::interval(Duration::from_millis(config.debounce_ms.clamp(10, 1000)));
    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(config.heartbeat_interval.max(1)));
    let mut poll = tokio::time::interval(Duration::from_secs(config.reader_poll_interval.max(1)));
    let mut signals = Box::pin(shutdown_signal());

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = &mut signals => {
                info!("Termination signal received, shutting down watcher");
                break;
            }
            maybe_event = fs_rx.recv() => match maybe_event {
                Some(Ok(event)) => {
                    for (path, kind) in events::relevant_changes(&event, &config.extensions, &ignore) {
                        emit(EngineEvent::FileChanged { path: path.clone(), kind });
                        debouncer.record(path, kind);
                    }
                }
                Some(Err(err)) => emit(EngineEvent::Error(format!("watcher: {err}"))),
                None => {}
            },
            _ = tick.tick() => {
                if role == OwnerRole::Owner {
                    let batch = debouncer.take_ready();
                    if !batch.is_empty() {
                        dispatch_batch(&coordinator, batch, &emit).await;
                    }
                }
            },
            _ = heartbeat.tick() => {
                if role == OwnerRole::Owner {
                    if refresh_heartbeat(&store, pid, &emit) {
                        // Restart path after a watcher malfunction.
                        if fs_watcher.is_none() {
                            fs_watcher = start_fs_watcher(&config.root, fs_tx.clone(), &emit);
                        }
                    } else {
                        // Lost the row (takeover or store trouble): demote.
                        role = OwnerRole::Reader;
                        *role_cell.lock() = role;
                        fs_watcher = None;
                        emit(EngineEvent::RoleChanged(role));
                        warn!("Ownership lost, demoted to reader (pid {pid})");
                    }
                }
            },
            _ = poll.tick() => {
                if role == OwnerRole::Reader {
                    match try_acquire(&store, pid, &instance_id, config.stale_after_seconds) {
                        Ok(OwnerRole::Owner) => {
                            role = OwnerRole::Owner;
                            *role_cell.lock() = role;
                            fs_watcher = start_fs_watcher(&config.root, fs_tx.clone(), &emit);
                            emit(EngineEvent::RoleChanged(role));
                            info!("Promoted to owner (pid {pid})");
                        }
                        Ok(OwnerRole::Reader) => {}
                        Err(err) => emit(EngineEvent::Error(format!("ownership: {err}"))),
                    }
                }
            },
        }
    }

    drop(fs_watcher);
    if role == OwnerRole::Owner {
        let store = store.lock();
        if let Err(err) = store.release_ownership(pid) {
            warn!("Failed to release ownership on shutdown: {err}");
        }
    }
}

fn try_acquire(
    store: &Mutex<IndexStore>,
    pid: i64,
    instance_id: &str,
    stale_after_seconds: i64,
) -> Result<OwnerRole> {
    let store = store.lock();
    store.acquire_ownership(
        pid,
        &AcquireOptions {
            now: Utc::now(),
            is_alive: &probe_pid_alive,
            stale_after_seconds,
            instance_id: Some(instance_id),
        },
    )
}

/// Refresh the heartbeat; false means this process no longer owns the row.
fn refresh_heartbeat(
    store: &Mutex<IndexStore>,
    pid: i64,
    emit: &impl Fn(EngineEvent),
) -> bool {
    let store = store.lock();
    match store.owner_row() {
        Ok(Some(row)) if row.pid == pid => match store.update_heartbeat(pid, Utc::now()) {
            Ok(()) => true,
            Err(err) => {
                emit(EngineEvent::Error(format!("ownership: {err}")));
                false
            }
        },
        Ok(_) => false,
        Err(err) => {
            emit(EngineEvent::Error(format!("ownership: {err}")));
            false
        }
    }
}

async fn dispatch_batch(
    coordinator: &Arc<IndexCoordinator>,
    batch: Vec<crate::indexing::ChangeEvent>,
    emit: &impl Fn(EngineEvent),
) {
    debug!("Dispatching batch of {} changes", batch.len());
    let worker = coordinator.clone();
    let result = tokio::task::spawn_blocking(move || worker.incremental(&batch)).await;

    match result {
        Ok(Ok(outcome)) => {
            for failure in &outcome.failures {
                emit(EngineEvent::Error(format!(
                    "{}: {}",
                    failure.file, failure.message
                )));
            }
            emit(EngineEvent::Indexed {
                changed: outcome.changed,
                deleted: outcome.deleted,
            });
        }
        Ok(Err(err)) => emit(EngineEvent::Error(format!("incremental index: {err}"))),
        Err(err) => emit(EngineEvent::Error(format!("index task panicked: {err}"))),
    }
}

fn start_fs_watcher(
    root: &Path,
    tx: mpsc::UnboundedSender<notify::Result<notify::Event>>,
    emit: &impl Fn(EngineEvent),
) -> Option<notify::RecommendedWatcher> {
    let sender = tx.clone();
    let created = notify::recommended_watcher(move |res| {
        let _ = sender.send(res);
    })
    .and_then(|mut watcher| {
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(watcher)
    });

    match created {
        Ok(watcher) => {
            debug!("Filesystem watcher subscribed at {}", root.display());
            Some(watcher)
        }
        Err(err) => {
            emit(EngineEvent::Error(format!("watcher: {err}")));
            None
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = wait_for_ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => wait_for_ctrl_c().await,
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await;
    }
}

/// A ctrl-c future that never resolves when handler registration fails, so
/// a restricted environment cannot shut the watcher down spuriously.
async fn wait_for_ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
