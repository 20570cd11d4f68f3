//! Read-only diagnostics over the dependency graph.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::DependencyGraph;
use crate::error::{DiError, DiResult};

/// One detected cycle with a description and ways to break it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub path: Vec<String>,
    pub description: String,
    pub suggestions: Vec<String>,
}

impl CycleReport {
    pub fn new(path: Vec<String>) -> Self {
        let description = if path.len() <= 2 {
            format!("{} depends on itself", path.first().map(String::as_str).unwrap_or("?"))
        } else {
            format!("Circular dependency: {}", path.join(" -> "))
        };
        let suggestions = suggest_resolutions(&path);
        Self {
            path,
            description,
            suggestions,
        }
    }
}

/// A declared dependency whose identifier was never registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub component: String,
    pub dependency: String,
}

/// Snapshot of the registry's dependency state.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub total_components: usize,
    pub resolved_components: usize,
    pub cycles: Vec<CycleReport>,
    pub unresolved_components: Vec<String>,
    pub missing_dependencies: Vec<MissingDependency>,
    pub generated_at: DateTime<Utc>,
}

impl DependencyReport {
    /// Builds a report; `is_registered` decides whether a dependency exists.
    pub fn from_graph(graph: &DependencyGraph, is_registered: impl Fn(&str) -> bool) -> Self {
        let mut resolved = 0;
        let mut unresolved_components = Vec::new();
        let mut missing_dependencies = Vec::new();

        for node in graph.nodes() {
            if node.is_resolved {
                resolved += 1;
            } else {
                unresolved_components.push(node.identifier.clone());
            }
            for dependency in &node.dependencies {
                if !graph.contains(dependency) && !is_registered(dependency) {
                    missing_dependencies.push(MissingDependency {
                        component: node.identifier.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        Self {
            total_components: graph.len(),
            resolved_components: resolved,
            cycles: graph
                .get_all_circular_dependencies()
                .into_iter()
                .map(CycleReport::new)
                .collect(),
            unresolved_components,
            missing_dependencies,
            generated_at: Utc::now(),
        }
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    pub fn to_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiError::Export(e.to_string()))
    }

    pub fn to_yaml(&self) -> DiResult<String> {
        serde_yaml::to_string(self).map_err(|e| DiError::Export(e.to_string()))
    }
}

/// Suggestions for breaking `cycle`.
///
/// The first suggestion always names the edge at the cycle's midpoint as the
/// one to defer.
pub fn suggest_resolutions(cycle: &[String]) -> Vec<String> {
    if cycle.len() < 2 {
        return Vec::new();
    }
    if cycle.len() == 2 {
        return vec![
            format!("Remove the self-dependency of '{}'", cycle[0]),
            format!("Declare the '{}' dependency as deferred", cycle[0]),
        ];
    }

    let edges = cycle.len() - 1;
    let mid = edges / 2;
    let (from, to) = (&cycle[mid], &cycle[mid + 1]);
    let members = cycle[..edges].join(", ");

    vec![
        format!("Defer the '{} -> {}' edge with a deferred dependency declaration", from, to),
        format!(
            "Extract the functionality shared by {} into a separate component they can all depend on",
            members
        ),
        format!("Look up '{}' from the registry at the point of use instead of injecting it into '{}'", to, from),
    ]
}

/// Text tree of every component and its edges.
pub fn visualize(graph: &DependencyGraph) -> String {
    let mut output = format!("Dependency graph ({} components)\n", graph.len());

    for node in graph.nodes() {
        let state = if node.is_resolving {
            "resolving"
        } else if node.is_resolved {
            "resolved"
        } else {
            "pending"
        };
        output.push_str(&format!("{} [{}]\n", node.identifier, state));

        let count = node.dependencies.len();
        for (i, dependency) in node.dependencies.iter().enumerate() {
            let branch = if i + 1 == count { "└──" } else { "├──" };
            let marker = if !graph.contains(dependency) {
                " (missing)"
            } else if graph.is_cyclic_edge(&node.identifier, dependency) {
                " (cycle)"
            } else {
                ""
            };
            output.push_str(&format!("  {} {}{}\n", branch, dependency, marker));
        }
    }

    let cycles = graph.get_all_circular_dependencies();
    if !cycles.is_empty() {
        output.push_str("\nCycles:\n");
        for cycle in cycles {
            output.push_str(&format!("  {}\n", cycle.join(" -> ")));
        }
    }
    output
}

/// Graphviz rendering; cyclic edges are drawn red and dashed.
pub fn export_dot(graph: &DependencyGraph) -> String {
    let mut output = String::new();
    output.push_str("digraph DependencyGraph {\n");
    output.push_str("  rankdir=TB;\n");
    output.push_str("  node [shape=box];\n\n");

    for node in graph.nodes() {
        let color = if node.is_resolved { "lightblue" } else { "lightyellow" };
        output.push_str(&format!(
            "  \"{}\" [label=\"{}\", fillcolor={}, style=filled];\n",
            node.identifier, node.display_name, color
        ));
    }

    output.push('\n');

    for node in graph.nodes() {
        for dependency in &node.dependencies {
            let style = if !graph.contains(dependency) {
                "style=dotted"
            } else if graph.is_cyclic_edge(&node.identifier, dependency) {
                "style=dashed, color=red"
            } else {
                "style=solid"
            };
            output.push_str(&format!(
                "  \"{}\" -> \"{}\" [{}];\n",
                node.identifier, dependency, style
            ));
        }
    }

    output.push_str("}\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn midpoint_edge_is_suggested_first() {
        let suggestions = suggest_resolutions(&strings(&["a", "b", "c", "d", "a"]));
        assert!(suggestions[0].contains("'c -> d'"));
        assert_eq!(suggestions.len(), 3);

        let two = suggest_resolutions(&strings(&["UserService", "OrderService", "UserService"]));
        assert!(two[0].contains("'OrderService -> UserService'"));
    }

    #[test]
    fn report_counts_and_missing() {
        let mut graph = DependencyGraph::new();
        graph.register_component("UserService", "UserService", &strings(&["OrderService"]));
        graph.register_component("OrderService", "OrderService", &strings(&["UserService"]));
        graph.register_component("Reports", "Reports", &strings(&["Mailer"]));
        graph.start_resolving("Reports").unwrap();
        graph.finish_resolving("Reports");

        let report = DependencyReport::from_graph(&graph, |_| false);
        assert_eq!(report.total_components, 3);
        assert_eq!(report.resolved_components, 1);
        assert_eq!(report.unresolved_components, ["UserService", "OrderService"]);
        assert_eq!(
            report.missing_dependencies,
            [MissingDependency {
                component: "Reports".into(),
                dependency: "Mailer".into()
            }]
        );
        assert!(report.has_cycles());
        assert_eq!(report.cycles[0].path, ["UserService", "OrderService", "UserService"]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"total_components\": 3"));
    }

    #[test]
    fn dot_marks_cyclic_edges() {
        let mut graph = DependencyGraph::new();
        graph.register_component("A", "A", &strings(&["B"]));
        graph.register_component("B", "B", &strings(&["A", "C"]));
        graph.register_component("C", "C", &[]);

        let dot = export_dot(&graph);
        assert!(dot.starts_with("digraph DependencyGraph {"));
        assert!(dot.contains("\"A\" -> \"B\" [style=dashed, color=red];"));
        assert!(dot.contains("\"B\" -> \"C\" [style=solid];"));

        let text = visualize(&graph);
        assert!(text.contains("├── A (cycle)"));
        assert!(text.contains("└── C\n"));
        assert!(text.contains("A -> B -> A"));
    }
}
