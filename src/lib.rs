//! Gildash - Local Code Intelligence Engine
//!
//! Gildash crawls a TypeScript project root, extracts symbol declarations
//! and inter-file relationships into an embedded SQLite store, and answers
//! queries about symbols, dependency graphs, and change impact. In watch
//! mode it keeps the store current through debounced filesystem events,
//! coordinating multiple processes over the same store with a single-writer
//! ownership protocol.

pub mod config;
pub mod database;
pub mod error;
pub mod extractors;
pub mod graph;
pub mod indexing;
pub mod logging;
pub mod resolver;
pub mod watcher;

pub use config::GildashOptions;
pub use database::{
    DatabaseStats, FileRecord, OwnerRole, RelationFilter, RelationRecord, SymbolQuery,
    SymbolRecord,
};
pub use error::{Error, Result};
pub use extractors::{RelationKind, SymbolKind};
pub use graph::{file_key, CycleOptions, DependencyGraph, FanMetrics};
pub use indexing::{BatchOutcome, ChangeEvent, ChangeKind};

use database::IndexStore;
use indexing::IndexCoordinator;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

/// Events emitted over the engine's broadcast channel.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// An index transaction committed; file keys that changed or vanished.
    Indexed {
        changed: Vec<String>,
        deleted: Vec<String>,
    },
    /// A tracked file saw a filesystem event (pre-debounce).
    FileChanged { path: PathBuf, kind: ChangeKind },
    RoleChanged(OwnerRole),
    Error(String),
}

/// How long a reader serves a cached graph before rebuilding, even when it
/// cannot observe an index-version advance.
const READER_GRAPH_TTL: Duration = Duration::from_secs(15);

/// Graph cache key: one graph per project scope plus one cross-project graph.
type GraphScope = Option<String>;

struct CachedGraph {
    graph: DependencyGraph,
    version: i64,
    built_at: Instant,
}

/// The coordinator facade: owns the store, the index coordinator, the graph
/// cache, and (in watch mode) the watcher task.
pub struct Gildash {
    options: GildashOptions,
    store: Arc<Mutex<IndexStore>>,
    coordinator: Arc<IndexCoordinator>,
    events: broadcast::Sender<EngineEvent>,
    role: Arc<Mutex<OwnerRole>>,
    graphs: Mutex<HashMap<GraphScope, CachedGraph>>,
    watcher: Mutex<Option<watcher::WatcherHandle>>,
    closed: AtomicBool,
    pid: i64,
    instance_id: String,
}

impl Gildash {
    /// Open the engine over `options.project_root`. Creates the store under
    /// `<root>/.gildash/` and, in watch mode, starts the ownership/watch
    /// loop.
    pub async fn open(options: GildashOptions) -> Result<Self> {
        let store = Arc::new(Mutex::new(IndexStore::open(&options.db_path())?));
        let coordinator = Arc::new(IndexCoordinator::new(
            options.project_root.clone(),
            options.extensions.clone(),
            &options.ignore_patterns,
            options.parser_cache_capacity,
            store.clone(),
        ));
        let (events, _) = broadcast::channel(256);
        let pid = std::process::id() as i64;
        let instance_id = Uuid::new_v4().to_string();

        // Without a watcher there is no contending process to defer to; the
        // caller is the writer. The watcher task elects the real role.
        let initial_role = if options.watch_mode {
            OwnerRole::Reader
        } else {
            OwnerRole::Owner
        };
        let role = Arc::new(Mutex::new(initial_role));

        let engine = Self {
            store,
            coordinator,
            events,
            role,
            graphs: Mutex::new(HashMap::new()),
            watcher: Mutex::new(None),
            closed: AtomicBool::new(false),
            pid,
            instance_id,
            options,
        };

        if engine.options.watch_mode {
            let handle = watcher::spawn(
                watcher::WatcherConfig {
                    root: engine.coordinator.root().to_path_buf(),
                    extensions: engine.options.extensions.clone(),
                    ignore_patterns: engine.options.ignore_patterns.clone(),
                    debounce_ms: engine.options.debounce_ms,
                    heartbeat_interval: engine.options.heartbeat_interval,
                    reader_poll_interval: engine.options.reader_poll_interval,
                    stale_after_seconds: engine.options.stale_after_seconds,
                },
                engine.store.clone(),
                engine.coordinator.clone(),
                engine.events.clone(),
                engine.role.clone(),
                engine.pid,
                engine.instance_id.clone(),
            );
            *engine.watcher.lock() = Some(handle);
        }

        info!(
            "Gildash open at {} (pid {}, watch: {})",
            engine.options.project_root.display(),
            engine.pid,
            engine.options.watch_mode
        );
        Ok(engine)
    }

    pub fn options(&self) -> &GildashOptions {
        &self.options
    }

    pub fn pid(&self) -> i64 {
        self.pid
    }

    /// Current coordinator role. Owner performs writes; readers only query.
    pub fn role(&self) -> OwnerRole {
        *self.role.lock()
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Index the whole tree. Emits `Indexed` after the transaction commits.
    pub async fn full_index(&self) -> Result<BatchOutcome> {
        self.ensure_open()?;
        let coordinator = self.coordinator.clone();
        let outcome = tokio::task::spawn_blocking(move || coordinator.full_index())
            .await
            .map_err(|err| Error::Watcher(format!("index task panicked: {err}")))??;

        let _ = self.events.send(EngineEvent::Indexed {
            changed: outcome.changed.clone(),
            deleted: outcome.deleted.clone(),
        });
        Ok(outcome)
    }

    /// Apply a batch of filesystem changes. An empty batch is a no-op.
    pub async fn incremental(&self, changes: Vec<ChangeEvent>) -> Result<BatchOutcome> {
        self.ensure_open()?;
        if changes.is_empty() {
            let store = self.store.lock();
            return Ok(BatchOutcome {
                index_version: store.index_version()?,
                ..BatchOutcome::default()
            });
        }
        let coordinator = self.coordinator.clone();
        let outcome = tokio::task::spawn_blocking(move || coordinator.incremental(&changes))
            .await
            .map_err(|err| Error::Watcher(format!("index task panicked: {err}")))??;

        let _ = self.events.send(EngineEvent::Indexed {
            changed: outcome.changed.clone(),
            deleted: outcome.deleted.clone(),
        });
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Symbol queries
    // ------------------------------------------------------------------

    pub fn search_symbols(&self, query: &SymbolQuery) -> Result<Vec<SymbolRecord>> {
        self.ensure_open()?;
        self.store.lock().search_symbols(query)
    }

    pub fn search_exact(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
        project: Option<&str>,
    ) -> Result<Vec<SymbolRecord>> {
        self.ensure_open()?;
        self.store.lock().search_exact(name, kind, project)
    }

    pub fn file_symbols(&self, project: &str, file_path: &str) -> Result<Vec<SymbolRecord>> {
        self.ensure_open()?;
        self.store.lock().get_file_symbols(project, file_path)
    }

    pub fn file_relations(&self, project: &str, file_path: &str) -> Result<Vec<RelationRecord>> {
        self.ensure_open()?;
        self.store.lock().get_outgoing(project, file_path)
    }

    pub fn search_relations(&self, filter: &RelationFilter) -> Result<Vec<RelationRecord>> {
        self.ensure_open()?;
        self.store.lock().search_relations(filter)
    }

    pub fn projects(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.store.lock().projects()
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        self.ensure_open()?;
        self.store.lock().stats()
    }

    // ------------------------------------------------------------------
    // Graph queries (scope None = cross-project graph)
    // ------------------------------------------------------------------

    pub fn dependencies(
        &self,
        scope: Option<&str>,
        file: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        self.with_graph(scope, |g| g.dependencies(file, limit))
    }

    pub fn dependents(
        &self,
        scope: Option<&str>,
        file: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        self.with_graph(scope, |g| g.dependents(file, limit))
    }

    pub fn transitive_dependencies(
        &self,
        scope: Option<&str>,
        file: &str,
    ) -> Result<Vec<String>> {
        self.with_graph(scope, |g| {
            g.transitive_dependencies(file).into_iter().collect()
        })
    }

    pub fn transitive_dependents(&self, scope: Option<&str>, file: &str) -> Result<Vec<String>> {
        self.with_graph(scope, |g| {
            g.transitive_dependents(file).into_iter().collect()
        })
    }

    /// Impact set: transitive dependents of every changed file plus the
    /// change set itself.
    pub fn affected(&self, scope: Option<&str>, changed: &[String]) -> Result<Vec<String>> {
        self.with_graph(scope, |g| g.affected(changed).into_iter().collect())
    }

    pub fn has_cycle(&self, scope: Option<&str>) -> Result<bool> {
        self.with_graph(scope, |g| g.has_cycle())
    }

    pub fn cycle_paths(
        &self,
        scope: Option<&str>,
        options: &CycleOptions,
    ) -> Result<Vec<Vec<String>>> {
        self.with_graph(scope, |g| g.cycle_paths(options))
    }

    pub fn fan_metrics(&self, scope: Option<&str>, file: &str) -> Result<FanMetrics> {
        self.with_graph(scope, |g| g.fan_metrics(file))
    }

    /// Run a closure against the cached dependency graph for a scope,
    /// rebuilding when stale. Owners trust the index-version counter alone;
    /// readers additionally age out after a TTL.
    pub fn with_graph<T>(
        &self,
        scope: Option<&str>,
        f: impl FnOnce(&DependencyGraph) -> T,
    ) -> Result<T> {
        self.ensure_open()?;
        let store = self.store.lock();
        let current_version = store.index_version()?;
        let role = *self.role.lock();
        let key: GraphScope = scope.map(|s| s.to_string());

        let mut graphs = self.graphs.lock();
        if let Some(cached) = graphs.get(&key) {
            let fresh = match role {
                OwnerRole::Owner => cached.version == current_version,
                OwnerRole::Reader => {
                    cached.version == current_version
                        && cached.built_at.elapsed() < READER_GRAPH_TTL
                }
            };
            if fresh {
                return Ok(f(&cached.graph));
            }
        }

        let projects: Option<Vec<String>> = key.as_ref().map(|p| vec![p.clone()]);
        let edges = store.load_graph_edges(projects.as_deref())?;
        let graph = DependencyGraph::from_edges(
            edges
                .into_iter()
                .map(|(p, src, dp, dst)| (file_key(&p, &src), file_key(&dp, &dst))),
        );
        let result = f(&graph);
        graphs.insert(
            key,
            CachedGraph {
                graph,
                version: current_version,
                built_at: Instant::now(),
            },
        );
        Ok(result)
    }

    /// Shut the engine down: stop the watcher, release ownership, and make
    /// every further operation fail fast. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let handle = self.watcher.lock().take();
        if let Some(handle) = handle {
            // The watcher releases ownership on its way out.
            handle.stop().await;
        }

        info!("Gildash closed (pid {})", self.pid);
        Ok(())
    }
}
