//! Dependency graph behavior over an indexed store.

use gildash::{
    file_key, ChangeEvent, ChangeKind, CycleOptions, DependencyGraph, Gildash, GildashOptions,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn project_root() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

async fn open(root: &Path) -> Gildash {
    Gildash::open(GildashOptions::new(root)).await.unwrap()
}

#[tokio::test]
async fn three_file_import_cycle_is_detected_and_enumerated() {
    let (_dir, root) = project_root();
    write(&root, "a.ts", "import { B } from './b';\nexport const A = 1;\n");
    write(&root, "b.ts", "import { C } from './c';\nexport const B = 1;\n");
    write(&root, "c.ts", "import { A } from './a';\nexport const C = 1;\n");

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    assert!(engine.has_cycle(Some(&project)).unwrap());
    let cycles = engine
        .cycle_paths(Some(&project), &CycleOptions::default())
        .unwrap();
    assert!(!cycles.is_empty());
    let cycle = &cycles[0];
    assert_eq!(cycle.len(), 3);
    for file in ["a.ts", "b.ts", "c.ts"] {
        let key = file_key(&project, file);
        assert!(cycle.contains(&key), "cycle {cycle:?} missing {key}");
    }

    engine.close().await.unwrap();
}

#[tokio::test]
async fn acyclic_tree_reports_no_cycles() {
    let (_dir, root) = project_root();
    write(&root, "a.ts", "export const A = 1;\n");
    write(&root, "b.ts", "import { A } from './a';\nexport const B = 1;\n");

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    assert!(!engine.has_cycle(Some(&project)).unwrap());
    assert!(engine
        .cycle_paths(Some(&project), &CycleOptions::default())
        .unwrap()
        .is_empty());
    engine.close().await.unwrap();
}

#[tokio::test]
async fn dependencies_dependents_and_affected_follow_the_import_chain() {
    let (_dir, root) = project_root();
    write(&root, "core.ts", "export const CORE = 1;\n");
    write(
        &root,
        "service.ts",
        "import { CORE } from './core';\nexport const SERVICE = CORE;\n",
    );
    write(
        &root,
        "app.ts",
        "import { SERVICE } from './service';\nexport const APP = SERVICE;\n",
    );

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    let core = file_key(&project, "core.ts");
    let service = file_key(&project, "service.ts");
    let app = file_key(&project, "app.ts");

    assert_eq!(
        engine.dependencies(Some(&project), &service, None).unwrap(),
        vec![core.clone()]
    );
    assert_eq!(
        engine.dependents(Some(&project), &service, None).unwrap(),
        vec![app.clone()]
    );
    assert_eq!(
        engine
            .transitive_dependencies(Some(&project), &app)
            .unwrap()
            .len(),
        2
    );

    // changing core impacts everything above it, plus core itself
    let impact = engine
        .affected(Some(&project), &[core.clone()])
        .unwrap();
    assert_eq!(impact, vec![app, core, service]);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn fan_metrics_for_a_middle_node() {
    let (_dir, root) = project_root();
    write(&root, "core.ts", "export const CORE = 1;\n");
    write(
        &root,
        "mid.ts",
        "import { CORE } from './core';\nexport const MID = CORE;\n",
    );
    write(
        &root,
        "top.ts",
        "import { MID } from './mid';\nexport const TOP = MID;\n",
    );

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    let metrics = engine
        .fan_metrics(Some(&project), &file_key(&project, "mid.ts"))
        .unwrap();
    assert_eq!(metrics.fan_in, 1);
    assert_eq!(metrics.fan_out, 1);
    assert_eq!(metrics.transitive_in, 1);
    assert_eq!(metrics.transitive_out, 1);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn graph_cache_refreshes_after_incremental_changes() {
    let (_dir, root) = project_root();
    write(&root, "a.ts", "export const A = 1;\n");
    write(&root, "b.ts", "export const B = 1;\n");

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    let b = file_key(&project, "b.ts");
    assert!(engine.dependencies(Some(&project), &b, None).unwrap().is_empty());

    // b now imports a; the version counter advanced, so the cache rebuilds
    write(&root, "b.ts", "import { A } from './a';\nexport const B = A;\n");
    engine
        .incremental(vec![ChangeEvent {
            path: root.join("b.ts"),
            kind: ChangeKind::Modified,
        }])
        .await
        .unwrap();

    assert_eq!(
        engine.dependencies(Some(&project), &b, None).unwrap(),
        vec![file_key(&project, "a.ts")]
    );

    engine.close().await.unwrap();
}

#[tokio::test]
async fn patching_the_graph_matches_a_fresh_build() {
    let (_dir, root) = project_root();
    write(&root, "a.ts", "export const A = 1;\n");
    write(
        &root,
        "b.ts",
        "import { A } from './a';\nexport const B = A;\n",
    );
    write(
        &root,
        "c.ts",
        "import { B } from './b';\nexport const C = B;\n",
    );

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    // Snapshot the built graph, then mutate the store incrementally.
    let mut patched = engine
        .with_graph(Some(&project), |g| g.clone())
        .unwrap();

    write(
        &root,
        "b.ts",
        "import { C } from './c';\nexport const B = 1;\n",
    );
    std::fs::remove_file(root.join("a.ts")).unwrap();
    engine
        .incremental(vec![
            ChangeEvent {
                path: root.join("b.ts"),
                kind: ChangeKind::Modified,
            },
            ChangeEvent {
                path: root.join("a.ts"),
                kind: ChangeKind::Deleted,
            },
        ])
        .await
        .unwrap();

    // Patch the snapshot with the same change set.
    let b = file_key(&project, "b.ts");
    let a = file_key(&project, "a.ts");
    let relations: Vec<(String, Vec<String>)> = vec![(
        b.clone(),
        engine
            .file_relations(&project, "b.ts")
            .unwrap()
            .into_iter()
            .map(|r| file_key(&r.dst_project, &r.dst_file_path))
            .collect(),
    )];
    patched.patch_files(&[b], &[a], |file| {
        relations
            .iter()
            .find(|(key, _)| key == file)
            .map(|(_, dsts)| dsts.clone())
            .unwrap_or_default()
    });

    let fresh = engine.with_graph(Some(&project), |g| g.clone()).unwrap();
    assert_eq!(patched, fresh);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn type_only_imports_contribute_graph_edges() {
    let (_dir, root) = project_root();
    write(&root, "types.ts", "export interface Shape { area: number }\n");
    write(
        &root,
        "draw.ts",
        "import { Shape } from './types';\nexport function draw(s: Shape) { return s.area; }\n",
    );

    let engine = open(&root).await;
    engine.full_index().await.unwrap();
    let project = engine.projects().unwrap().remove(0);

    let deps = engine
        .dependencies(Some(&project), &file_key(&project, "draw.ts"), None)
        .unwrap();
    assert_eq!(deps, vec![file_key(&project, "types.ts")]);

    engine.close().await.unwrap();
}

#[test]
fn adjacency_list_is_a_read_only_view() {
    let graph = DependencyGraph::from_edges([("a".to_string(), "b".to_string())]);
    let adjacency = graph.adjacency_list();
    assert!(adjacency.get("a").unwrap().contains("b"));
    assert!(adjacency.get("b").is_none());
}
