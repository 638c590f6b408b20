//! Cycle detection and enumeration.
//!
//! Detection runs Tarjan's SCC over the adjacency; any component larger than
//! one node, or any self-loop, is a cycle. Enumeration applies Johnson's
//! circuit-finding algorithm inside each non-trivial component, emitting each
//! simple cycle exactly once anchored at its smallest node.

use super::DependencyGraph;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};

/// Bounds for cycle enumeration; unset means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOptions {
    pub max_cycles: Option<usize>,
    pub max_len: Option<usize>,
}

pub(super) fn has_cycle(graph: &DependencyGraph) -> bool {
    if graph.forward().iter().any(|(node, dsts)| dsts.contains(node)) {
        return true;
    }
    let (digraph, _) = to_petgraph(graph);
    tarjan_scc(&digraph).into_iter().any(|scc| scc.len() > 1)
}

pub(super) fn cycle_paths(graph: &DependencyGraph, options: &CycleOptions) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let max_cycles = options.max_cycles.unwrap_or(usize::MAX);
    let len_ok = |len: usize| options.max_len.is_none_or(|max| len <= max);

    // Self-loops are length-1 cycles; Johnson below only sees larger SCCs.
    let mut loops: Vec<&String> = graph
        .forward()
        .iter()
        .filter(|(node, dsts)| dsts.contains(*node))
        .map(|(node, _)| node)
        .collect();
    loops.sort();
    for node in loops {
        if cycles.len() >= max_cycles {
            return cycles;
        }
        if len_ok(1) {
            cycles.push(vec![node.clone()]);
        }
    }

    let (digraph, _) = to_petgraph(graph);
    let mut components: Vec<Vec<String>> = tarjan_scc(&digraph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut nodes: Vec<String> =
                scc.into_iter().map(|ix| digraph[ix].clone()).collect();
            nodes.sort();
            nodes
        })
        .collect();
    components.sort();

    for nodes in components {
        if cycles.len() >= max_cycles {
            break;
        }
        enumerate_component(graph, &nodes, options, &mut cycles);
    }

    cycles.truncate(max_cycles);
    cycles
}

fn to_petgraph(graph: &DependencyGraph) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
    let mut digraph = DiGraph::new();
    let mut indices: HashMap<String, NodeIndex> = HashMap::new();

    {
        let mut index_of = |digraph: &mut DiGraph<String, ()>, name: &String| {
            *indices
                .entry(name.clone())
                .or_insert_with(|| digraph.add_node(name.clone()))
        };

        for (src, dsts) in graph.forward() {
            for dst in dsts {
                let s = index_of(&mut digraph, src);
                let d = index_of(&mut digraph, dst);
                digraph.add_edge(s, d, ());
            }
        }
    }
    (digraph, indices)
}

/// Johnson's circuit enumeration within one strongly connected component.
/// Nodes are ordered; every cycle is reported rooted at its smallest member,
/// which makes each simple cycle appear once.
fn enumerate_component(
    graph: &DependencyGraph,
    nodes: &[String],
    options: &CycleOptions,
    cycles: &mut Vec<Vec<String>>,
) {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    // Component-local adjacency, self-loops excluded (already reported).
    let adjacency: Vec<BTreeSet<usize>> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            graph
                .forward()
                .get(node)
                .map(|dsts| {
                    dsts.iter()
                        .filter_map(|d| index.get(d.as_str()).copied())
                        .filter(|&j| j != i)
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let max_cycles = options.max_cycles.unwrap_or(usize::MAX);

    for start in 0..nodes.len() {
        if cycles.len() >= max_cycles {
            return;
        }
        let mut state = Johnson {
            nodes,
            adjacency: &adjacency,
            start,
            blocked: vec![false; nodes.len()],
            block_list: vec![BTreeSet::new(); nodes.len()],
            path: Vec::new(),
            options,
            cycles,
        };
        state.circuit(start);
    }
}

struct Johnson<'a> {
    nodes: &'a [String],
    adjacency: &'a [BTreeSet<usize>],
    start: usize,
    blocked: Vec<bool>,
    block_list: Vec<BTreeSet<usize>>,
    path: Vec<usize>,
    options: &'a CycleOptions,
    cycles: &'a mut Vec<Vec<String>>,
}

impl Johnson<'_> {
    fn circuit(&mut self, v: usize) -> bool {
        let max_cycles = self.options.max_cycles.unwrap_or(usize::MAX);
        let mut found = false;
        self.path.push(v);
        self.blocked[v] = true;

        let neighbors: Vec<usize> = self.adjacency[v]
            .iter()
            .copied()
            .filter(|&w| w >= self.start)
            .collect();
        for w in neighbors {
            if self.cycles.len() >= max_cycles {
                break;
            }
            if w == self.start {
                if self.options.max_len.is_none_or(|max| self.path.len() <= max) {
                    self.cycles
                        .push(self.path.iter().map(|&i| self.nodes[i].clone()).collect());
                }
                found = true;
            } else if !self.blocked[w]
                && self
                    .options
                    .max_len
                    .is_none_or(|max| self.path.len() < max)
                && self.circuit(w)
            {
                found = true;
            }
        }

        if found {
            self.unblock(v);
        } else {
            for &w in &self.adjacency[v] {
                if w >= self.start {
                    self.block_list[w].insert(v);
                }
            }
        }
        self.path.pop();
        found
    }

    fn unblock(&mut self, u: usize) {
        self.blocked[u] = false;
        let waiting = std::mem::take(&mut self.block_list[u]);
        for w in waiting {
            if self.blocked[w] {
                self.unblock(w);
            }
        }
    }
}
