//! Dependency graph and cycle detection.
//!
//! The graph is the only place that runs graph search. It records
//! identifier-to-identifier edges from declared dependencies (the union of
//! every registration of the same identifier), offers a per-identifier and a
//! whole-graph cycle search, and tracks which identifiers are on the active
//! resolution path.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{CircularDependencyError, DiResult};

mod report;
mod stack;

pub use report::{export_dot, suggest_resolutions, visualize, CycleReport, DependencyReport, MissingDependency};
pub use stack::ResolutionStack;

/// An identifier path demonstrating a cycle; first and last elements match.
pub type Cycle = Vec<String>;

/// A registered identifier and its outgoing edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyGraphNode {
    pub identifier: String,
    pub display_name: String,
    /// Grows monotonically across repeated registrations
    pub dependencies: Vec<String>,
    /// On the active resolution path
    pub is_resolving: bool,
    /// Construction and wiring completed at least once
    pub is_resolved: bool,
}

impl DependencyGraphNode {
    fn new(identifier: &str, display_name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            dependencies: Vec::new(),
            is_resolving: false,
            is_resolved: false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Identifier-keyed dependency graph.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::DependencyGraph;
///
/// let mut graph = DependencyGraph::new();
/// graph.register_component("UserService", "UserService", &["OrderService".into()]);
/// graph.register_component("OrderService", "OrderService", &["UserService".into()]);
/// graph.register_component("AuditService", "AuditService", &["UserService".into()]);
///
/// let cycle = graph.detect_circular_dependency("UserService").unwrap();
/// assert_eq!(cycle, ["UserService", "OrderService", "UserService"]);
///
/// assert!(graph.is_cyclic_edge("OrderService", "UserService"));
/// assert!(!graph.is_cyclic_edge("AuditService", "UserService"));
/// assert_eq!(graph.get_all_circular_dependencies().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyGraphNode>,
    order: Vec<String>,
    stack: ResolutionStack,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions `dependencies` into the node for `identifier`, creating it if absent.
    pub fn register_component(&mut self, identifier: &str, display_name: &str, dependencies: &[String]) {
        if !self.nodes.contains_key(identifier) {
            self.order.push(identifier.to_string());
        }
        let node = self
            .nodes
            .entry(identifier.to_string())
            .or_insert_with(|| DependencyGraphNode::new(identifier, display_name));
        for dependency in dependencies {
            if !node.dependencies.contains(dependency) {
                node.dependencies.push(dependency.clone());
            }
        }
    }

    pub fn remove_component(&mut self, identifier: &str) -> Option<DependencyGraphNode> {
        self.order.retain(|id| id != identifier);
        self.nodes.remove(identifier)
    }

    pub(crate) fn restore_node(&mut self, identifier: &str, previous: Option<DependencyGraphNode>) {
        match previous {
            Some(node) => {
                self.nodes.insert(identifier.to_string(), node);
            }
            None => {
                self.remove_component(identifier);
            }
        }
    }

    pub fn node(&self, identifier: &str) -> Option<&DependencyGraphNode> {
        self.nodes.get(identifier)
    }

    /// Nodes in first-registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyGraphNode> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.nodes.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dependencies_of(&self, identifier: &str) -> &[String] {
        self.nodes
            .get(identifier)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Depth-first search from `identifier` for any reachable cycle.
    ///
    /// Every call is a fresh traversal, so edges added between calls are
    /// always taken into account.
    pub fn detect_circular_dependency(&self, identifier: &str) -> Option<Cycle> {
        if !self.nodes.contains_key(identifier) {
            return None;
        }
        let mut marks = HashMap::new();
        let mut path = Vec::new();
        let mut found = Vec::new();
        self.search(identifier, &mut marks, &mut path, &mut found, true);
        found.into_iter().next()
    }

    /// Every distinct cycle in the graph.
    pub fn get_all_circular_dependencies(&self) -> Vec<Cycle> {
        let mut marks: HashMap<String, Mark> = HashMap::new();
        let mut found = Vec::new();
        for identifier in &self.order {
            if !marks.contains_key(identifier) {
                let mut path = Vec::new();
                self.search(identifier, &mut marks, &mut path, &mut found, false);
            }
        }

        let mut seen = HashSet::new();
        found.retain(|cycle| seen.insert(canonical(cycle)));
        found
    }

    fn search(
        &self,
        identifier: &str,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
        found: &mut Vec<Cycle>,
        first_only: bool,
    ) {
        marks.insert(identifier.to_string(), Mark::OnPath);
        path.push(identifier.to_string());

        for dependency in self.dependencies_of(identifier) {
            if first_only && !found.is_empty() {
                break;
            }
            match marks.get(dependency.as_str()).copied() {
                Some(Mark::OnPath) => {
                    if let Some(start) = path.iter().position(|p| p == dependency) {
                        let mut cycle = path[start..].to_vec();
                        cycle.push(dependency.clone());
                        found.push(cycle);
                    }
                }
                Some(Mark::Done) => {}
                None => {
                    if self.nodes.contains_key(dependency.as_str()) {
                        self.search(dependency, marks, path, found, first_only);
                    }
                }
            }
        }

        path.pop();
        marks.insert(identifier.to_string(), Mark::Done);
    }

    /// A cycle passing through `identifier`, if one exists.
    pub fn cycle_through(&self, identifier: &str) -> Option<Cycle> {
        for dependency in self.dependencies_of(identifier) {
            if let Some(path) = self.path_between(dependency, identifier) {
                let mut cycle = vec![identifier.to_string()];
                cycle.extend(path);
                return Some(cycle);
            }
        }
        None
    }

    pub fn is_in_cycle(&self, identifier: &str) -> bool {
        self.cycle_through(identifier).is_some()
    }

    /// True iff some cycle contains `component -> dependency` as adjacent pair.
    ///
    /// That holds exactly when `dependency` can reach `component` again.
    /// Edges that merely lead into a cycle elsewhere are not cyclic.
    pub fn is_cyclic_edge(&self, component: &str, dependency: &str) -> bool {
        if !self.dependencies_of(component).iter().any(|d| d == dependency) {
            return false;
        }
        component == dependency || self.path_between(dependency, component).is_some()
    }

    /// Shortest edge path `from -> ... -> to`, both ends included.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_string()]);
        }
        let mut previous: HashMap<&str, &str> = HashMap::new();
        let mut queue = std::collections::VecDeque::from([from]);
        let mut visited: HashSet<&str> = HashSet::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.dependencies_of(current) {
                let next = next.as_str();
                if !visited.insert(next) {
                    continue;
                }
                previous.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(&prev) = previous.get(cursor) {
                        path.push(prev.to_string());
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Pushes `identifier` on the resolution path.
    ///
    /// Fails with a circular dependency error carrying the full stack when the
    /// identifier is already being resolved.
    pub fn start_resolving(&mut self, identifier: &str) -> DiResult<()> {
        self.stack.push(identifier)?;
        if let Some(node) = self.nodes.get_mut(identifier) {
            node.is_resolving = true;
        }
        Ok(())
    }

    /// Pops `identifier` and marks it resolved.
    pub fn finish_resolving(&mut self, identifier: &str) {
        self.stack.pop(identifier);
        if let Some(node) = self.nodes.get_mut(identifier) {
            node.is_resolving = false;
            node.is_resolved = true;
        }
    }

    /// Pops `identifier` after a failed resolution.
    pub fn abandon_resolving(&mut self, identifier: &str) {
        self.stack.pop(identifier);
        if let Some(node) = self.nodes.get_mut(identifier) {
            node.is_resolving = false;
        }
    }

    pub fn is_resolving(&self, identifier: &str) -> bool {
        self.stack.contains(identifier)
    }

    /// The cycle a lookup of `identifier` would close while it is resolving.
    pub fn reentry_cycle(&self, identifier: &str) -> Option<CircularDependencyError> {
        self.stack.cycle_error(identifier)
    }

    pub fn resolution_stack(&self) -> &ResolutionStack {
        &self.stack
    }

    /// Clears resolution flags and the active path, keeping edges.
    pub fn reset_resolution_state(&mut self) {
        self.stack.clear();
        for node in self.nodes.values_mut() {
            node.is_resolving = false;
            node.is_resolved = false;
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.stack.clear();
    }
}

// Rotation starting at the smallest identifier, closing element dropped.
fn canonical(cycle: &[String]) -> Vec<String> {
    let body = &cycle[..cycle.len().saturating_sub(1)];
    let Some(start) = body
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    body[start..].iter().chain(&body[..start]).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (id, targets) in edges {
            graph.register_component(id, id, &deps(targets));
        }
        graph
    }

    #[test]
    fn repeated_registration_unions_edges() {
        let mut g = graph(&[("Reports", &["Mailer"])]);
        g.register_component("Reports", "Reports", &deps(&["Clock", "Mailer"]));
        assert_eq!(g.dependencies_of("Reports"), ["Mailer", "Clock"]);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn three_node_cycle() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        assert_eq!(g.detect_circular_dependency("a").unwrap(), ["a", "b", "c", "a"]);
        assert_eq!(g.cycle_through("b").unwrap(), ["b", "c", "a", "b"]);

        let all = g.get_all_circular_dependencies();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(&[("Loop", &["Loop"])]);
        assert_eq!(g.detect_circular_dependency("Loop").unwrap(), ["Loop", "Loop"]);
        assert!(g.is_cyclic_edge("Loop", "Loop"));
    }

    #[test]
    fn edge_into_cycle_is_not_cyclic() {
        // x -> a, a <-> b: only a->b and b->a are cyclic
        let g = graph(&[("x", &["a"]), ("a", &["b"]), ("b", &["a"])]);
        assert!(g.is_cyclic_edge("a", "b"));
        assert!(g.is_cyclic_edge("b", "a"));
        assert!(!g.is_cyclic_edge("x", "a"));
        assert!(!g.is_in_cycle("x"));
        // x reaches a cycle even though it is not on it
        assert!(g.detect_circular_dependency("x").is_some());
    }

    #[test]
    fn acyclic_graph_reports_nothing() {
        let g = graph(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &["external"])]);
        assert!(g.get_all_circular_dependencies().is_empty());
        assert!(g.detect_circular_dependency("a").is_none());
    }

    #[test]
    fn resolution_flags() {
        let mut g = graph(&[("a", &[])]);
        g.start_resolving("a").unwrap();
        assert!(g.is_resolving("a"));
        assert!(g.node("a").unwrap().is_resolving);
        assert!(g.start_resolving("a").is_err());

        g.finish_resolving("a");
        let node = g.node("a").unwrap();
        assert!(!node.is_resolving);
        assert!(node.is_resolved);

        g.reset_resolution_state();
        assert!(!g.node("a").unwrap().is_resolved);
    }

    #[test]
    fn canonical_rotation() {
        assert_eq!(canonical(&deps(&["b", "c", "a", "b"])), deps(&["a", "b", "c"]));
        assert_eq!(canonical(&deps(&["c", "a", "b", "c"])), deps(&["a", "b", "c"]));
    }
}
