//! Dependency graph engine.
//!
//! Forward and reverse adjacency over file keys (`project::path`), built from
//! persisted import, type-reference, and re-export relations. Supports
//! transitive closure, impact sets, cycle detection and enumeration, and
//! incremental patching that stays equal to a fresh build.

mod cycles;

pub use cycles::CycleOptions;

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Canonical node key for a file.
pub fn file_key(project: &str, file_path: &str) -> String {
    format!("{project}::{file_path}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanMetrics {
    pub fan_in: usize,
    pub fan_out: usize,
    pub transitive_in: usize,
    pub transitive_out: usize,
}

/// File-level dependency graph. Self-loops are preserved; they are cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    forward: HashMap<String, BTreeSet<String>>,
    reverse: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble both adjacency maps from `(source, destination)` edges.
    pub fn from_edges(edges: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut graph = Self::new();
        for (src, dst) in edges {
            graph.add_edge(src, dst);
        }
        graph
    }

    pub fn add_edge(&mut self, src: String, dst: String) {
        self.forward.entry(src.clone()).or_default().insert(dst.clone());
        self.reverse.entry(dst).or_default().insert(src);
    }

    pub fn node_count(&self) -> usize {
        let mut nodes: BTreeSet<&String> = self.forward.keys().collect();
        nodes.extend(self.reverse.keys());
        nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(|dsts| dsts.len()).sum()
    }

    /// Direct out-neighbors of `file`.
    pub fn dependencies(&self, file: &str, limit: Option<usize>) -> Vec<String> {
        self.neighbors(&self.forward, file, limit)
    }

    /// Direct in-neighbors of `file`.
    pub fn dependents(&self, file: &str, limit: Option<usize>) -> Vec<String> {
        self.neighbors(&self.reverse, file, limit)
    }

    fn neighbors(
        &self,
        map: &HashMap<String, BTreeSet<String>>,
        file: &str,
        limit: Option<usize>,
    ) -> Vec<String> {
        let Some(set) = map.get(file) else {
            return Vec::new();
        };
        let iter = set.iter().cloned();
        match limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }

    /// Everything reachable from `file` following edges forward, excluding
    /// `file` itself.
    pub fn transitive_dependencies(&self, file: &str) -> BTreeSet<String> {
        self.reachable(&self.forward, file)
    }

    /// Everything that can reach `file`, excluding `file` itself.
    pub fn transitive_dependents(&self, file: &str) -> BTreeSet<String> {
        self.reachable(&self.reverse, file)
    }

    fn reachable(&self, map: &HashMap<String, BTreeSet<String>>, start: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&String> = match map.get(start) {
            Some(set) => set.iter().collect(),
            None => Vec::new(),
        };
        while let Some(node) = stack.pop() {
            if node != start && visited.insert(node.clone()) {
                if let Some(next) = map.get(node) {
                    stack.extend(next.iter());
                }
            }
        }
        visited
    }

    /// Impact set of a change: every transitive dependent of each changed
    /// file, plus the changed files themselves.
    pub fn affected(&self, changed: &[String]) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = changed.iter().cloned().collect();
        for file in changed {
            set.extend(self.transitive_dependents(file));
        }
        set
    }

    /// True iff any strongly connected component has more than one node, or
    /// any node depends on itself.
    pub fn has_cycle(&self) -> bool {
        cycles::has_cycle(self)
    }

    /// Enumerate simple cycles (Johnson's algorithm over each non-trivial
    /// SCC), optionally bounded by count and length. Each cycle is listed
    /// once, starting at its smallest node.
    pub fn cycle_paths(&self, options: &CycleOptions) -> Vec<Vec<String>> {
        cycles::cycle_paths(self, options)
    }

    pub fn fan_metrics(&self, file: &str) -> FanMetrics {
        FanMetrics {
            fan_in: self.reverse.get(file).map_or(0, |s| s.len()),
            fan_out: self.forward.get(file).map_or(0, |s| s.len()),
            transitive_in: self.transitive_dependents(file).len(),
            transitive_out: self.transitive_dependencies(file).len(),
        }
    }

    /// Read-only view of the forward adjacency.
    pub fn adjacency_list(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.forward
    }

    /// Apply an incremental update: files in `changed` and `deleted` lose
    /// their outgoing edges, deleted files additionally vanish from every
    /// adjacency entry, and changed files gain the edges `relations_for`
    /// reports. The result equals a fresh build over the updated relations.
    pub fn patch_files(
        &mut self,
        changed: &[String],
        deleted: &[String],
        relations_for: impl Fn(&str) -> Vec<String>,
    ) {
        for file in changed.iter().chain(deleted) {
            self.remove_outgoing(file);
        }
        for file in deleted {
            self.remove_incoming(file);
        }
        for file in changed {
            for dst in relations_for(file) {
                self.add_edge(file.clone(), dst);
            }
        }
    }

    fn remove_outgoing(&mut self, file: &str) {
        if let Some(dsts) = self.forward.remove(file) {
            for dst in dsts {
                if let Some(srcs) = self.reverse.get_mut(&dst) {
                    srcs.remove(file);
                    if srcs.is_empty() {
                        self.reverse.remove(&dst);
                    }
                }
            }
        }
    }

    fn remove_incoming(&mut self, file: &str) {
        if let Some(srcs) = self.reverse.remove(file) {
            for src in srcs {
                if let Some(dsts) = self.forward.get_mut(&src) {
                    dsts.remove(file);
                    if dsts.is_empty() {
                        self.forward.remove(&src);
                    }
                }
            }
        }
    }

    pub(crate) fn forward(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(src: &str, dst: &str) -> (String, String) {
        (src.to_string(), dst.to_string())
    }

    fn diamond() -> DependencyGraph {
        // a -> b -> d, a -> c -> d
        DependencyGraph::from_edges([
            edge("a", "b"),
            edge("a", "c"),
            edge("b", "d"),
            edge("c", "d"),
        ])
    }

    #[test]
    fn direct_neighbors() {
        let g = diamond();
        assert_eq!(g.dependencies("a", None), vec!["b", "c"]);
        assert_eq!(g.dependents("d", None), vec!["b", "c"]);
        assert_eq!(g.dependencies("a", Some(1)), vec!["b"]);
        assert!(g.dependencies("missing", None).is_empty());
    }

    #[test]
    fn transitive_closure_excludes_start() {
        let g = diamond();
        let deps = g.transitive_dependencies("a");
        assert_eq!(deps, ["b", "c", "d"].map(String::from).into_iter().collect());
        let dependents = g.transitive_dependents("d");
        assert_eq!(dependents, ["a", "b", "c"].map(String::from).into_iter().collect());
    }

    #[test]
    fn affected_includes_the_change_set() {
        let g = diamond();
        let impact = g.affected(&["d".to_string()]);
        assert_eq!(impact, ["a", "b", "c", "d"].map(String::from).into_iter().collect());
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = diamond();
        assert!(!g.has_cycle());
        assert!(g.cycle_paths(&CycleOptions::default()).is_empty());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = DependencyGraph::from_edges([edge("a", "a")]);
        assert!(g.has_cycle());
        assert_eq!(g.cycle_paths(&CycleOptions::default()), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn three_node_cycle_is_enumerated() {
        let g = DependencyGraph::from_edges([edge("a", "b"), edge("b", "c"), edge("c", "a")]);
        assert!(g.has_cycle());
        let cycles = g.cycle_paths(&CycleOptions::default());
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);
    }

    #[test]
    fn cycle_limits_are_honored() {
        // two 2-cycles plus one 4-cycle
        let g = DependencyGraph::from_edges([
            edge("a", "b"),
            edge("b", "a"),
            edge("b", "c"),
            edge("c", "b"),
            edge("c", "d"),
            edge("d", "a"),
        ]);
        let all = g.cycle_paths(&CycleOptions::default());
        assert_eq!(all.len(), 3);

        let capped = g.cycle_paths(&CycleOptions {
            max_cycles: Some(1),
            max_len: None,
        });
        assert_eq!(capped.len(), 1);

        let short = g.cycle_paths(&CycleOptions {
            max_cycles: None,
            max_len: Some(2),
        });
        assert!(short.iter().all(|c| c.len() <= 2));
        assert_eq!(short.len(), 2);
    }

    #[test]
    fn has_cycle_agrees_with_cycle_paths() {
        for g in [
            DependencyGraph::new(),
            diamond(),
            DependencyGraph::from_edges([edge("a", "a")]),
            DependencyGraph::from_edges([edge("a", "b"), edge("b", "a")]),
        ] {
            assert_eq!(
                g.has_cycle(),
                !g.cycle_paths(&CycleOptions::default()).is_empty()
            );
        }
    }

    #[test]
    fn fan_metrics_count_both_directions() {
        let g = diamond();
        let m = g.fan_metrics("b");
        assert_eq!(m.fan_in, 1);
        assert_eq!(m.fan_out, 1);
        assert_eq!(m.transitive_in, 1);
        assert_eq!(m.transitive_out, 1);
    }

    #[test]
    fn patch_matches_fresh_build() {
        let mut g = diamond();
        // b now depends on c instead of d; c is deleted entirely
        g.patch_files(
            &["b".to_string()],
            &["c".to_string()],
            |file| match file {
                "b" => vec!["d".to_string()],
                _ => Vec::new(),
            },
        );
        let fresh =
            DependencyGraph::from_edges([edge("a", "b"), edge("b", "d")]);
        assert_eq!(g, fresh);
    }

    #[test]
    fn patch_with_empty_change_set_is_identity() {
        let mut g = diamond();
        let before = g.clone();
        g.patch_files(&[], &[], |_| Vec::new());
        assert_eq!(g, before);
    }

    #[test]
    fn patched_self_loop_still_cycles() {
        let mut g = diamond();
        g.patch_files(&["d".to_string()], &[], |_| vec!["d".to_string()]);
        assert!(g.has_cycle());
    }
}
