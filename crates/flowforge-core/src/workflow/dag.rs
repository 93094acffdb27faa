//! Dependency graph construction, cycle detection, and execution ordering.
//!
//! Uses `petgraph` to model node dependencies as a directed graph (edge from
//! dependency to dependent). Problems in the graph never abort a run: a node
//! that depends on a missing node, every member of a cycle, and everything
//! downstream of either are *blocked*. Blocked nodes are reported as skipped
//! while the rest of the graph executes normally.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use flowforge_types::workflow::WorkflowNode;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Why a node will not be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    MissingDependency(String),
    Cycle,
    BlockedUpstream(String),
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::MissingDependency(dep) => write!(f, "depends on missing node {dep}"),
            BlockReason::Cycle => write!(f, "part of a dependency cycle"),
            BlockReason::BlockedUpstream(up) => {
                write!(f, "upstream node {up} is blocked by a dependency violation")
            }
        }
    }
}

/// Analysed dependency structure of a workflow's nodes.
///
/// Node references are indices into the slice passed to [`DependencyGraph::build`].
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    /// Resolved, de-duplicated upstream indices per node.
    upstream: Vec<Vec<usize>>,
    order: Vec<usize>,
    blocked: Vec<(usize, BlockReason)>,
    violations: Vec<String>,
}

impl DependencyGraph {
    /// Build the graph from `depends_on` lists.
    ///
    /// Kahn's algorithm runs to completion with ties broken by authoring
    /// index; strongly connected components identify cycle members. Node ids
    /// are expected to be unique; on duplicates the first occurrence wins.
    pub fn build(nodes: &[WorkflowNode]) -> Self {
        let mut id_to_idx: HashMap<&str, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            id_to_idx.entry(node.id.as_str()).or_insert(i);
        }

        let mut graph = DiGraph::<usize, ()>::with_capacity(nodes.len(), nodes.len());
        let indices: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();

        let mut upstream: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut direct: HashMap<usize, BlockReason> = HashMap::new();
        let mut violations = Vec::new();

        for (i, node) in nodes.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in &node.depends_on {
                if !seen.insert(dep.as_str()) {
                    continue;
                }
                match id_to_idx.get(dep.as_str()) {
                    Some(&from) => {
                        upstream[i].push(from);
                        graph.add_edge(indices[from], indices[i], ());
                    }
                    None => {
                        violations.push(format!("node {} depends on missing node {dep}", node.id));
                        direct
                            .entry(i)
                            .or_insert_with(|| BlockReason::MissingDependency(dep.clone()));
                    }
                }
            }
        }

        // Cycles: any SCC with more than one member, or a self-loop.
        let mut cycles: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
                members.sort_unstable();
                members
            })
            .collect();
        cycles.sort_unstable_by_key(|members| members[0]);
        for members in &cycles {
            let names: Vec<&str> = members.iter().map(|&i| nodes[i].id.as_str()).collect();
            violations.push(format!("cycle detected involving nodes {{{}}}", names.join(", ")));
            for &i in members {
                direct.insert(i, BlockReason::Cycle);
            }
        }

        // Everything downstream of a directly blocked node is blocked too.
        let mut blocked_set: HashSet<usize> = direct.keys().copied().collect();
        let mut queue: VecDeque<usize> = {
            let mut seeds: Vec<usize> = blocked_set.iter().copied().collect();
            seeds.sort_unstable();
            seeds.into()
        };
        while let Some(i) = queue.pop_front() {
            for next in graph.neighbors_directed(indices[i], Direction::Outgoing) {
                let j = graph[next];
                if blocked_set.insert(j) {
                    queue.push_back(j);
                }
            }
        }

        let blocked: Vec<(usize, BlockReason)> = (0..nodes.len())
            .filter(|i| blocked_set.contains(i))
            .map(|i| {
                let reason = direct.remove(&i).unwrap_or_else(|| {
                    let up = upstream[i]
                        .iter()
                        .find(|u| blocked_set.contains(u))
                        .map(|&u| nodes[u].id.clone())
                        .unwrap_or_default();
                    BlockReason::BlockedUpstream(up)
                });
                (i, reason)
            })
            .collect();

        let order = kahn_order(&graph, &indices)
            .into_iter()
            .filter(|i| !blocked_set.contains(i))
            .collect();

        Self {
            graph,
            upstream,
            order,
            blocked,
            violations,
        }
    }

    /// Executable node indices in dependency order.
    pub fn execution_order(&self) -> &[usize] {
        &self.order
    }

    /// Blocked node indices in authoring order, with the reason.
    pub fn blocked(&self) -> &[(usize, BlockReason)] {
        &self.blocked
    }

    pub fn is_blocked(&self, idx: usize) -> bool {
        self.blocked.iter().any(|(i, _)| *i == idx)
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Direct upstream indices of a node (de-duplicated, existing nodes only).
    pub fn upstream(&self, idx: usize) -> &[usize] {
        self.upstream.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node `idx` transitively depends on.
    pub fn transitive_upstream(&self, idx: usize) -> HashSet<usize> {
        let mut visited = HashSet::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            for &dep in self.upstream(current) {
                if visited.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        visited
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// Kahn's algorithm with a min-heap on authoring index. Nodes on a cycle and
/// their dependents never reach in-degree zero and are left out.
fn kahn_order(graph: &DiGraph<usize, ()>, indices: &[NodeIndex]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = indices
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(indices.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for next in graph.neighbors_directed(indices[i], Direction::Outgoing) {
            let j = graph[next];
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn node(id: &str, depends_on: &[&str]) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            service: "hr".to_string(),
            action: "create_employee".to_string(),
            actor: "hr_manager".to_string(),
            parameters: vec![],
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            outputs: BTreeMap::new(),
        }
    }

    fn ids<'a>(nodes: &'a [WorkflowNode], order: &[usize]) -> Vec<&'a str> {
        order.iter().map(|&i| nodes[i].id.as_str()).collect()
    }

    #[test]
    fn test_independent_nodes_keep_authoring_order() {
        let nodes = vec![node("c", &[]), node("a", &[]), node("b", &[])];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(ids(&nodes, g.execution_order()), vec!["c", "a", "b"]);
        assert!(g.violations().is_empty());
        assert!(g.blocked().is_empty());
    }

    #[test]
    fn test_dependencies_come_first() {
        let nodes = vec![node("b", &["a"]), node("a", &[]), node("c", &["b", "a"])];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(ids(&nodes, g.execution_order()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_broken_by_authoring_index() {
        // root fans out; y is authored before x so it runs first.
        let nodes = vec![
            node("root", &[]),
            node("y", &["root"]),
            node("x", &["root"]),
            node("z", &[]),
        ];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(ids(&nodes, g.execution_order()), vec!["root", "y", "x", "z"]);
    }

    #[test]
    fn test_duplicate_dependencies_collapse() {
        let nodes = vec![node("a", &[]), node("b", &["a", "a"])];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(g.upstream(1), &[0]);
        assert_eq!(ids(&nodes, g.execution_order()), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_dependency_blocks_node_and_dependents() {
        let nodes = vec![
            node("a", &[]),
            node("c", &["missing_id"]),
            node("d", &["c"]),
            node("e", &["a"]),
        ];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(
            g.violations(),
            &["node c depends on missing node missing_id".to_string()]
        );
        assert_eq!(ids(&nodes, g.execution_order()), vec!["a", "e"]);
        assert_eq!(
            g.blocked(),
            &[
                (1, BlockReason::MissingDependency("missing_id".into())),
                (2, BlockReason::BlockedUpstream("c".into())),
            ]
        );
    }

    #[test]
    fn test_two_node_cycle() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"]), node("c", &[])];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(g.violations(), &["cycle detected involving nodes {a, b}".to_string()]);
        assert_eq!(ids(&nodes, g.execution_order()), vec!["c"]);
        assert!(g.is_blocked(0));
        assert!(g.is_blocked(1));
        assert!(!g.is_blocked(2));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let nodes = vec![node("a", &["a"])];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(g.violations(), &["cycle detected involving nodes {a}".to_string()]);
        assert!(g.execution_order().is_empty());
    }

    #[test]
    fn test_cycle_downstream_is_blocked_with_upstream_reason() {
        let nodes = vec![
            node("a", &["c"]),
            node("b", &["a"]),
            node("c", &["b"]),
            node("d", &["c"]),
        ];
        let g = DependencyGraph::build(&nodes);
        assert_eq!(
            g.violations(),
            &["cycle detected involving nodes {a, b, c}".to_string()]
        );
        assert_eq!(g.blocked().len(), 4);
        assert_eq!(g.blocked()[3], (3, BlockReason::BlockedUpstream("c".into())));
    }

    #[test]
    fn test_transitive_upstream() {
        let nodes = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["b"]),
            node("d", &[]),
        ];
        let g = DependencyGraph::build(&nodes);
        let up = g.transitive_upstream(2);
        assert!(up.contains(&0));
        assert!(up.contains(&1));
        assert!(!up.contains(&3));
        assert!(g.transitive_upstream(0).is_empty());
        assert_eq!(g.node_count(), 4);
    }

    #[test]
    fn test_empty_graph() {
        let g = DependencyGraph::build(&[]);
        assert!(g.execution_order().is_empty());
        assert!(g.violations().is_empty());
    }
}
