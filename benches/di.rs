use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ferrous_wire::*;
use std::sync::Arc;

struct DatabaseService;
impl Component for DatabaseService {}

#[derive(Default)]
struct UserRepository {
    database: Injected<DatabaseService>,
}
impl Component for UserRepository {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        (property == "databaseService").then_some(&self.database as &dyn InjectionPoint)
    }
}

#[derive(Default)]
struct UserService {
    orders: Injected<OrderService>,
}
impl Component for UserService {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        (property == "orderService").then_some(&self.orders as &dyn InjectionPoint)
    }
}

#[derive(Default)]
struct OrderService {
    users: Injected<UserService>,
}
impl Component for OrderService {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        (property == "userService").then_some(&self.users as &dyn InjectionPoint)
    }
}

fn wired_registry() -> ComponentRegistry {
    let registry = ComponentRegistry::new();
    registry
        .register("DatabaseService", ComponentTarget::new(|_| DatabaseService), RegistrationOptions::new())
        .unwrap();
    registry
        .register(
            "UserRepository",
            ComponentTarget::new(|_| UserRepository::default()).with_dependency("databaseService", "DatabaseService"),
            RegistrationOptions::new(),
        )
        .unwrap();
    registry
}

// ===== Lookups =====

fn bench_singleton_lookup(c: &mut Criterion) {
    let registry = wired_registry();

    c.bench_function("singleton_lookup", |b| {
        b.iter(|| {
            let repo = registry.get_typed::<UserRepository>(black_box("UserRepository")).unwrap();
            black_box(repo);
        })
    });
}

fn bench_prototype_lookup(c: &mut Criterion) {
    let registry = wired_registry();
    registry
        .register(
            "RequestRepository",
            ComponentTarget::new(|_| UserRepository::default()).with_dependency("databaseService", "DatabaseService"),
            RegistrationOptions::new().scope(Scope::Prototype),
        )
        .unwrap();

    c.bench_function("prototype_lookup_wired", |b| {
        b.iter(|| {
            let repo = registry.get(black_box("RequestRepository")).unwrap();
            black_box(repo);
        })
    });
}

// ===== Registration =====

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("acyclic_pair", |b| {
        b.iter_batched(ComponentRegistry::new, |registry| {
            registry
                .register("DatabaseService", ComponentTarget::new(|_| DatabaseService), RegistrationOptions::new())
                .unwrap();
            registry
                .register(
                    "UserRepository",
                    ComponentTarget::new(|_| UserRepository::default())
                        .with_dependency("databaseService", "DatabaseService"),
                    RegistrationOptions::new(),
                )
                .unwrap();
            registry
        }, BatchSize::SmallInput)
    });

    // timers go to the runtime instead of one thread per deferred batch
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _guard = runtime.enter();

    group.bench_function("cyclic_pair_until_ready", |b| {
        b.iter_batched(
            || {
                let ready = Arc::new(ApplicationReady::new());
                let registry = ComponentRegistry::builder().readiness(ready.clone()).build();
                (registry, ready)
            },
            |(registry, ready)| {
                registry
                    .register(
                        "UserService",
                        ComponentTarget::new(|_| UserService::default()).with_dependency("orderService", "OrderService"),
                        RegistrationOptions::new(),
                    )
                    .unwrap();
                registry
                    .register(
                        "OrderService",
                        ComponentTarget::new(|_| OrderService::default()).with_dependency("userService", "UserService"),
                        RegistrationOptions::new(),
                    )
                    .unwrap();
                ready.fire();
                registry.clear();
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// ===== Graph analysis =====

fn chain_graph(len: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for i in 0..len {
        let deps = if i + 1 < len { vec![format!("C{}", i + 1)] } else { vec!["C0".to_string()] };
        graph.register_component(&format!("C{}", i), "Chain", &deps);
    }
    graph
}

fn bench_cycle_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_detection");

    for len in [10usize, 100, 1000] {
        let graph = chain_graph(len);
        group.bench_with_input(BenchmarkId::new("detect_ring", len), &graph, |b, graph| {
            b.iter(|| black_box(graph.detect_circular_dependency("C0")))
        });
        group.bench_with_input(BenchmarkId::new("is_cyclic_edge", len), &graph, |b, graph| {
            b.iter(|| black_box(graph.is_cyclic_edge("C0", "C1")))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_singleton_lookup,
    bench_prototype_lookup,
    bench_registration,
    bench_cycle_detection
);
criterion_main!(benches);
