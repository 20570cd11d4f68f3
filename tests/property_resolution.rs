//! Property-based tests for registration and wiring
//!
//! Random dependency graphs are registered in random order; the tests check
//! that every declared property ends up wired and that cycle detection agrees
//! with a reference topological sort.

use ferrous_wire::{
    ApplicationReady, Component, ComponentInstance, ComponentRegistry, ComponentTarget, DiResult, InjectionPoint,
    RegistrationOptions, SlotState,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const MAX_NODES: usize = 6;

/// Slot accepting any component type.
struct AnySlot(Mutex<(SlotState, Option<ComponentInstance>)>);

impl Default for AnySlot {
    fn default() -> Self {
        AnySlot(Mutex::new((SlotState::Unset, None)))
    }
}

impl InjectionPoint for AnySlot {
    fn assign(&self, value: &ComponentInstance) -> DiResult<()> {
        *self.0.lock() = (SlotState::Wired, Some(value.clone()));
        Ok(())
    }

    fn mark_pending(&self) -> DiResult<()> {
        self.0.lock().0 = SlotState::Pending;
        Ok(())
    }

    fn mark_empty(&self) -> DiResult<()> {
        *self.0.lock() = (SlotState::Empty, None);
        Ok(())
    }

    fn freeze(&self) {}

    fn reset(&self) {
        *self.0.lock() = (SlotState::Unset, None);
    }

    fn state(&self) -> SlotState {
        self.0.lock().0
    }
}

// distinct type per node so registrations never alias
#[derive(Default)]
struct Node<const N: usize> {
    slots: [AnySlot; MAX_NODES],
}

impl<const N: usize> Component for Node<N> {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        let index: usize = property.strip_prefix("dep")?.parse().ok()?;
        self.slots.get(index).map(|s| s as &dyn InjectionPoint)
    }
}

fn slot_state(registry: &ComponentRegistry, node: usize, dep: usize) -> SlotState {
    let instance = registry.get(&name(node)).unwrap().instance().unwrap();
    instance.component().injection_point(&format!("dep{}", dep)).unwrap().state()
}

fn name(i: usize) -> String {
    format!("Node{}", i)
}

fn base_target(i: usize) -> ComponentTarget {
    match i {
        0 => ComponentTarget::new(|_| Node::<0>::default()),
        1 => ComponentTarget::new(|_| Node::<1>::default()),
        2 => ComponentTarget::new(|_| Node::<2>::default()),
        3 => ComponentTarget::new(|_| Node::<3>::default()),
        4 => ComponentTarget::new(|_| Node::<4>::default()),
        _ => ComponentTarget::new(|_| Node::<5>::default()),
    }
}

fn target(i: usize, deps: &BTreeSet<usize>) -> ComponentTarget {
    deps.iter()
        .fold(base_target(i), |t, &d| t.with_dependency(format!("dep{}", d), name(d)))
}

fn adjacency(n: usize, edges: &[(usize, usize)]) -> Vec<BTreeSet<usize>> {
    let mut adj = vec![BTreeSet::new(); n];
    for &(from, to) in edges {
        adj[from % n].insert(to % n);
    }
    adj
}

/// Kahn's algorithm: the graph is cyclic iff some node is never freed.
fn has_cycle(adj: &[BTreeSet<usize>]) -> bool {
    let n = adj.len();
    let mut pending: Vec<usize> = adj.iter().map(|deps| deps.len()).collect();
    let mut ready: Vec<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut freed = 0;
    while let Some(done) = ready.pop() {
        freed += 1;
        for (i, deps) in adj.iter().enumerate() {
            if deps.contains(&done) {
                pending[i] -= 1;
                if pending[i] == 0 {
                    ready.push(i);
                }
            }
        }
    }
    freed < n
}

fn register_all(adj: &[BTreeSet<usize>], order: &[usize]) -> (ComponentRegistry, Arc<ApplicationReady>) {
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder().readiness(ready.clone()).build();
    for &i in order {
        registry
            .register(&name(i), target(i, &adj[i]), RegistrationOptions::new())
            .unwrap();
    }
    (registry, ready)
}

fn graph_and_order() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, Vec<usize>)> {
    (1..=MAX_NODES).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n), 0..12),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Property: in an acyclic graph every property is wired by the time the
    // last component is registered, whatever the registration order
    #[test]
    fn acyclic_graph_is_wired_without_readiness((n, edges, order) in graph_and_order()) {
        // keep only edges pointing at lower indices
        let acyclic: Vec<(usize, usize)> = edges.into_iter().filter(|(a, b)| a > b).collect();
        let adj = adjacency(n, &acyclic);
        let (registry, _ready) = register_all(&adj, &order);

        prop_assert!(registry.circular_dependencies().is_empty());
        prop_assert!(registry.pending_deferrals().is_empty());
        for (i, deps) in adj.iter().enumerate() {
            for &d in deps {
                prop_assert_eq!(slot_state(&registry, i, d), SlotState::Wired);
            }
        }
    }

    // Property: cycle detection agrees with a reference sort, and every
    // property is wired once the readiness signal fires
    #[test]
    fn cycles_are_detected_and_wired_after_ready((n, edges, order) in graph_and_order()) {
        let adj = adjacency(n, &edges);
        let (registry, ready) = register_all(&adj, &order);

        let cyclic = has_cycle(&adj);
        prop_assert_eq!(!registry.circular_dependencies().is_empty(), cyclic);
        prop_assert_eq!(registry.generate_dependency_report().has_cycles(), cyclic);

        ready.fire();
        prop_assert!(registry.pending_deferrals().is_empty());
        for (i, deps) in adj.iter().enumerate() {
            for &d in deps {
                prop_assert_eq!(slot_state(&registry, i, d), SlotState::Wired);
            }
        }
    }
}
