//! Node-capacitated max-flow via node splitting plus Edmonds-Karp, used by
//! the redundancy heuristic to probe how many node-disjoint paths exist
//! between a DN and its candidate backup peers.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};

/// A plain capacitated digraph distinct from [`crate::builder::PlannerGraph`]:
/// max-flow needs a split in-node/out-node per site, which would otherwise
/// double the bookkeeping required to keep `PlannerGraph`'s node kinds in
/// sync.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    graph: DiGraph<String, f64>,
    index: HashMap<String, NodeIndex>,
}

/// Builds a node-split flow graph: every input node `n` with node capacity
/// `cap(n)` becomes `n_in -> n_out` with capacity `cap(n)`, and every input
/// edge `(u, v)` with capacity `edge_cap` becomes `u_out -> v_in`.
/// Nodes absent from `node_capacity` are treated as uncapacitated
/// (`f64::INFINITY`), appropriate for the source and sink themselves.
pub fn split_node_graph(
    nodes: &[String],
    edges: &[(String, String, f64)],
    node_capacity: &HashMap<String, f64>,
) -> FlowGraph {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();

    for n in nodes {
        let in_idx = graph.add_node(format!("{n}__in"));
        let out_idx = graph.add_node(format!("{n}__out"));
        let cap = node_capacity.get(n).copied().unwrap_or(f64::INFINITY);
        graph.add_edge(in_idx, out_idx, cap);
        index.insert(format!("{n}__in"), in_idx);
        index.insert(format!("{n}__out"), out_idx);
    }

    for (u, v, cap) in edges {
        if let (Some(&u_out), Some(&v_in)) = (index.get(&format!("{u}__out")), index.get(&format!("{v}__in"))) {
            graph.add_edge(u_out, v_in, *cap);
        }
    }

    FlowGraph { graph, index }
}

/// Edmonds-Karp max-flow from `source`'s out-node to `sink`'s in-node.
/// Suitable for the small per-probe subgraphs this heuristic runs on;
/// not intended for whole-topology flow problems.
pub fn max_flow(fg: &FlowGraph, source: &str, sink: &str) -> f64 {
    edmonds_karp(fg, source, sink).map(|(flow, _)| flow).unwrap_or(0.0)
}

/// Like [`max_flow`], but also reports which input edges (by original
/// `(u, v)` pair, not the split in/out form) carried strictly positive flow
/// in the computed maximum flow. Used by the redundancy heuristic to turn a
/// max-flow probe into a restricted candidate edge set.
pub fn max_flow_with_edge_usage(
    fg: &FlowGraph,
    source: &str,
    sink: &str,
    edges: &[(String, String, f64)],
) -> (f64, std::collections::HashSet<(String, String)>) {
    let Some((total_flow, residual)) = edmonds_karp(fg, source, sink) else {
        return (0.0, std::collections::HashSet::new());
    };

    let mut used = std::collections::HashSet::new();
    for (u, v, cap) in edges {
        if *cap <= 0.0 {
            continue;
        }
        let (Some(&u_out), Some(&v_in)) = (fg.index.get(&format!("{u}__out")), fg.index.get(&format!("{v}__in"))) else {
            continue;
        };
        let remaining = residual.get(&(u_out, v_in)).copied().unwrap_or(*cap);
        if remaining < cap - 1e-9 {
            used.insert((u.clone(), v.clone()));
        }
    }
    (total_flow, used)
}

/// Shared Edmonds-Karp core: returns the total flow and the final residual
/// capacity map, or `None` when `source`/`sink` don't resolve to in/out
/// nodes in `fg`.
fn edmonds_karp(fg: &FlowGraph, source: &str, sink: &str) -> Option<(f64, HashMap<(NodeIndex, NodeIndex), f64>)> {
    let &src = fg.index.get(&format!("{source}__out"))?;
    let &dst = fg.index.get(&format!("{sink}__in"))?;
    if src == dst {
        return Some((f64::INFINITY, HashMap::new()));
    }

    let mut residual: HashMap<(NodeIndex, NodeIndex), f64> = HashMap::new();
    for e in fg.graph.edge_references() {
        *residual.entry((e.source(), e.target())).or_insert(0.0) += *e.weight();
        residual.entry((e.target(), e.source())).or_insert(0.0);
    }

    let mut total_flow = 0.0;
    loop {
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited = std::collections::HashSet::new();
        visited.insert(src);
        let mut queue = VecDeque::new();
        queue.push_back(src);

        while let Some(node) = queue.pop_front() {
            if node == dst {
                break;
            }
            let neighbors: Vec<NodeIndex> = residual.keys().filter(|(u, _)| *u == node).map(|(_, v)| *v).collect();
            for next in neighbors {
                let cap = residual[&(node, next)];
                if cap > 1e-9 && !visited.contains(&next) {
                    visited.insert(next);
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }

        if !visited.contains(&dst) {
            break;
        }

        let mut path_flow = f64::INFINITY;
        let mut cur = dst;
        while cur != src {
            let prev = parent[&cur];
            path_flow = path_flow.min(residual[&(prev, cur)]);
            cur = prev;
        }

        let mut cur = dst;
        while cur != src {
            let prev = parent[&cur];
            *residual.get_mut(&(prev, cur)).unwrap() -= path_flow;
            *residual.get_mut(&(cur, prev)).unwrap() += path_flow;
            cur = prev;
        }

        total_flow += path_flow;
        if !path_flow.is_finite() {
            break;
        }
    }
    Some((total_flow, residual))
}
