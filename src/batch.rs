//! Batch registration in dependency order.
//!
//! Entries are sorted so that, within the batch, every component is
//! registered after the components it depends on, as reported by the
//! registry's declaration source. Dependencies outside the
//! batch do not affect the order. When the batch contains a cycle the sort
//! gives up and the remaining entries are registered in input order; the
//! cyclic edges are then handled by the normal deferred pass.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::descriptors::RegistrationOptions;
use crate::error::DiError;
use crate::registry::ComponentRegistry;
use crate::target::{ComponentTarget, DependencyDeclaration};

/// One component in a batch registration.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub identifier: String,
    pub target: ComponentTarget,
    pub options: RegistrationOptions,
}

impl BatchEntry {
    pub fn new(identifier: impl Into<String>, target: ComponentTarget, options: RegistrationOptions) -> Self {
        Self {
            identifier: identifier.into(),
            target,
            options,
        }
    }
}

/// Result of [`ComponentRegistry::batch_register`].
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Identifiers in the order they were registered
    pub order: Vec<String>,
    pub registered: Vec<String>,
    /// Entries whose registration failed; the rest of the batch still ran
    pub failed: Vec<(String, DiError)>,
    /// The in-batch dependencies were not acyclic
    pub cycle_detected: bool,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    Visiting,
    Done,
}

/// Dependency-first order over the entries, as indices into `entries`.
///
/// Returns `true` as the second value when a cycle cut the sort short.
fn dependency_order<F>(entries: &[BatchEntry], declared: F) -> (Vec<usize>, bool)
where
    F: Fn(&ComponentTarget) -> Vec<DependencyDeclaration>,
{
    let index: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.identifier.as_str(), i))
        .collect();
    let edges: Vec<Vec<usize>> = entries
        .iter()
        .map(|entry| {
            declared(&entry.target)
                .iter()
                .filter_map(|d| index.get(d.identifier.as_str()).copied())
                .collect()
        })
        .collect();

    let mut marks = vec![Visit::Unvisited; entries.len()];
    let mut order = Vec::with_capacity(entries.len());

    for start in 0..entries.len() {
        if marks[start] != Visit::Unvisited {
            continue;
        }
        // explicit stack of (node, next edge)
        let mut stack = vec![(start, 0usize)];
        marks[start] = Visit::Visiting;

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            frame.1 += 1;
            if let Some(&dep) = edges[node].get(next) {
                match marks[dep] {
                    Visit::Unvisited => {
                        marks[dep] = Visit::Visiting;
                        stack.push((dep, 0));
                    }
                    Visit::Visiting => {
                        warn!(
                            component = %entries[node].identifier,
                            dependency = %entries[dep].identifier,
                            "cycle in batch; registering remaining entries in input order"
                        );
                        let mut placed = vec![false; entries.len()];
                        for &i in &order {
                            placed[i] = true;
                        }
                        order.extend((0..entries.len()).filter(|&i| !placed[i]));
                        return (order, true);
                    }
                    Visit::Done => {}
                }
            } else {
                marks[node] = Visit::Done;
                order.push(node);
                stack.pop();
            }
        }
    }
    (order, false)
}

impl ComponentRegistry {
    /// Registers several components, dependencies first.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_wire::{BatchEntry, Component, ComponentRegistry, ComponentTarget, RegistrationOptions};
    ///
    /// struct Mailer;
    /// impl Component for Mailer {}
    /// struct Smtp;
    /// impl Component for Smtp {}
    ///
    /// let registry = ComponentRegistry::new();
    /// let outcome = registry.batch_register(vec![
    ///     BatchEntry::new(
    ///         "Mailer",
    ///         ComponentTarget::new(|_| Mailer).with_dependency("smtp", "Smtp"),
    ///         RegistrationOptions::new(),
    ///     ),
    ///     BatchEntry::new("Smtp", ComponentTarget::new(|_| Smtp), RegistrationOptions::new()),
    /// ]);
    ///
    /// assert_eq!(outcome.order, ["Smtp", "Mailer"]);
    /// assert!(outcome.is_success());
    /// ```
    pub fn batch_register(&self, entries: Vec<BatchEntry>) -> BatchOutcome {
        let (order, cycle_detected) = dependency_order(&entries, |target| self.declared_dependencies(target));
        let mut slots: Vec<Option<BatchEntry>> = entries.into_iter().map(Some).collect();
        let mut outcome = BatchOutcome {
            cycle_detected,
            ..BatchOutcome::default()
        };

        for i in order {
            let Some(entry) = slots[i].take() else { continue };
            outcome.order.push(entry.identifier.clone());
            match self.register(&entry.identifier, entry.target, entry.options) {
                Ok(()) => outcome.registered.push(entry.identifier),
                Err(err) => {
                    warn!(component = %entry.identifier, error = %err, "batch entry failed");
                    outcome.failed.push((entry.identifier, err));
                }
            }
        }

        debug!(
            registered = outcome.registered.len(),
            failed = outcome.failed.len(),
            cycle_detected,
            "batch registration finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::metadata::{DeclarationSource, TargetDeclarations};

    struct Node;
    impl Component for Node {}

    fn entry(identifier: &str, deps: &[&str]) -> BatchEntry {
        let target = deps
            .iter()
            .fold(ComponentTarget::new(|_| Node), |t, d| t.with_dependency(d.to_lowercase(), *d));
        BatchEntry::new(identifier, target, RegistrationOptions::new())
    }

    fn sort(entries: &[BatchEntry]) -> (Vec<usize>, bool) {
        dependency_order(entries, |target| TargetDeclarations.declared_dependencies(target))
    }

    fn names(entries: &[BatchEntry], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| entries[i].identifier.clone()).collect()
    }

    #[test]
    fn chain_is_sorted_dependencies_first() {
        let entries = vec![entry("A", &["B"]), entry("C", &[]), entry("B", &["C"])];
        let (order, cyclic) = sort(&entries);
        assert!(!cyclic);
        assert_eq!(names(&entries, &order), ["C", "B", "A"]);
    }

    #[test]
    fn external_dependencies_are_ignored() {
        let entries = vec![entry("A", &["Logger"]), entry("B", &[])];
        let (order, _) = sort(&entries);
        assert_eq!(names(&entries, &order), ["A", "B"]);
    }

    #[test]
    fn cycle_falls_back_to_input_order() {
        let entries = vec![entry("X", &[]), entry("A", &["B"]), entry("B", &["A"]), entry("Y", &[])];
        let (order, cyclic) = sort(&entries);
        assert!(cyclic);
        assert_eq!(names(&entries, &order), ["X", "A", "B", "Y"]);
    }

    #[test]
    fn inherited_declarations_count() {
        let base = ComponentTarget::declared::<()>().with_dependency("audit", "Audit");
        let entries = vec![
            BatchEntry::new("Admin", ComponentTarget::new(|_| Node).extends(base), RegistrationOptions::new()),
            entry("Audit", &[]),
        ];
        let (order, _) = sort(&entries);
        assert_eq!(names(&entries, &order), ["Audit", "Admin"]);
    }
}
