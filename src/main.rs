//! Gildash CLI: index a project, watch it, and query the results.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use gildash::{
    CycleOptions, EngineEvent, Gildash, GildashOptions, SymbolKind, SymbolQuery,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gildash", version, about = "Local code intelligence for TypeScript projects")]
struct Cli {
    /// Project root to operate on.
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full index of the project tree.
    Index,
    /// Index, then watch the tree and reindex on changes.
    Watch,
    /// Prefix-search symbol names.
    Search {
        query: String,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show direct or transitive dependencies of a file.
    Deps {
        /// File path relative to its project root.
        file: String,
        #[arg(long)]
        project: Option<String>,
        /// Show dependents instead of dependencies.
        #[arg(long)]
        reverse: bool,
        /// Follow edges transitively.
        #[arg(long)]
        transitive: bool,
    },
    /// Show the impact set of a change to the given files.
    Affected {
        files: Vec<String>,
        #[arg(long)]
        project: Option<String>,
    },
    /// List dependency cycles.
    Cycles {
        #[arg(long)]
        max: Option<usize>,
    },
    /// Print store statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    gildash::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Index => {
            let engine = Gildash::open(GildashOptions::new(&cli.root)).await?;
            let outcome = engine.full_index().await?;
            println!(
                "Indexed {} files ({} changed, {} deleted, {} failures), {} symbols, {} relations",
                outcome.files_seen,
                outcome.changed.len(),
                outcome.deleted.len(),
                outcome.failures.len(),
                outcome.symbols_written,
                outcome.relations_written
            );
            for failure in &outcome.failures {
                eprintln!("  failed: {} ({})", failure.file, failure.message);
            }
            engine.close().await?;
        }
        Command::Watch => {
            let mut options = GildashOptions::new(&cli.root);
            options.watch_mode = true;
            let engine = Gildash::open(options).await?;
            let mut events = engine.subscribe();
            engine.full_index().await?;
            println!("Watching {} (ctrl-c to stop)", cli.root.display());

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(EngineEvent::Indexed { changed, deleted }) => {
                            if !changed.is_empty() || !deleted.is_empty() {
                                println!("indexed: {} changed, {} deleted", changed.len(), deleted.len());
                            }
                        }
                        Ok(EngineEvent::RoleChanged(role)) => println!("role: {role:?}"),
                        Ok(EngineEvent::Error(message)) => eprintln!("error: {message}"),
                        Ok(EngineEvent::FileChanged { .. }) => {}
                        Err(_) => break,
                    },
                }
            }
            engine.close().await?;
        }
        Command::Search {
            query,
            kind,
            project,
            limit,
        } => {
            let kind = kind
                .map(|k| {
                    SymbolKind::from_str(&k).ok_or_else(|| anyhow!("unknown symbol kind: {k}"))
                })
                .transpose()?;
            let engine = Gildash::open(GildashOptions::new(&cli.root)).await?;
            let results = engine.search_symbols(&SymbolQuery {
                text: query,
                kind,
                project,
                limit,
            })?;
            for symbol in results {
                println!(
                    "{}  {}  {}::{}",
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.project,
                    symbol.file_path
                );
            }
            engine.close().await?;
        }
        Command::Deps {
            file,
            project,
            reverse,
            transitive,
        } => {
            let engine = Gildash::open(GildashOptions::new(&cli.root)).await?;
            let project = resolve_project(&engine, project)?;
            let key = gildash::file_key(&project, &file);
            let results = match (reverse, transitive) {
                (false, false) => engine.dependencies(Some(&project), &key, None)?,
                (true, false) => engine.dependents(Some(&project), &key, None)?,
                (false, true) => engine.transitive_dependencies(Some(&project), &key)?,
                (true, true) => engine.transitive_dependents(Some(&project), &key)?,
            };
            for dep in results {
                println!("{dep}");
            }
            engine.close().await?;
        }
        Command::Affected { files, project } => {
            let engine = Gildash::open(GildashOptions::new(&cli.root)).await?;
            let project = resolve_project(&engine, project)?;
            let keys: Vec<String> = files
                .iter()
                .map(|f| gildash::file_key(&project, f))
                .collect();
            for file in engine.affected(Some(&project), &keys)? {
                println!("{file}");
            }
            engine.close().await?;
        }
        Command::Cycles { max } => {
            let engine = Gildash::open(GildashOptions::new(&cli.root)).await?;
            let cycles = engine.cycle_paths(
                None,
                &CycleOptions {
                    max_cycles: max,
                    max_len: None,
                },
            )?;
            if cycles.is_empty() {
                println!("no cycles");
            }
            for cycle in cycles {
                println!("{}", cycle.join(" -> "));
            }
            engine.close().await?;
        }
        Command::Stats => {
            let engine = Gildash::open(GildashOptions::new(&cli.root)).await?;
            let stats = engine.stats()?;
            println!("files:     {}", stats.total_files);
            println!("symbols:   {}", stats.total_symbols);
            println!("relations: {}", stats.total_relations);
            let mut kinds: Vec<_> = stats.symbols_by_kind.iter().collect();
            kinds.sort();
            for (kind, count) in kinds {
                println!("  {kind}: {count}");
            }
            println!("db size:   {:.2} MB", stats.db_size_mb);
            engine.close().await?;
        }
    }

    Ok(())
}

fn resolve_project(engine: &Gildash, project: Option<String>) -> Result<String> {
    if let Some(project) = project {
        return Ok(project);
    }
    engine
        .projects()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("store is empty; run `gildash index` first"))
}
