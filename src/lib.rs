//! # ferrous-wire
//!
//! Component registry and dependency resolution engine with cycle detection
//! and deferred property wiring.
//!
//! ## Features
//!
//! - **Categorized registry**: components keyed by category and identifier,
//!   with aliases when one type is registered under several names
//! - **Dependency graph**: every registration updates a graph that detects
//!   cycles, produces reports, and exports to DOT
//! - **Deferred wiring**: cyclic and not-yet-registered dependencies are
//!   wired after a readiness signal or a timeout, whichever comes first
//! - **Batch registration**: several components registered dependencies first
//! - **Diagnostics**: observers, `tracing` events, text and JSON reports
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_wire::{
//!     Component, ComponentRegistry, ComponentTarget, Injected, InjectionPoint,
//!     RegistrationOptions,
//! };
//!
//! struct DatabaseService {
//!     url: String,
//! }
//! impl Component for DatabaseService {}
//!
//! #[derive(Default)]
//! struct UserRepository {
//!     database: Injected<DatabaseService>,
//! }
//! impl Component for UserRepository {
//!     fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
//!         match property {
//!             "databaseService" => Some(&self.database),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let registry = ComponentRegistry::new();
//! registry
//!     .register(
//!         "DatabaseService",
//!         ComponentTarget::new(|_| DatabaseService { url: "postgres://localhost".into() }),
//!         RegistrationOptions::new(),
//!     )
//!     .unwrap();
//! registry
//!     .register(
//!         "UserRepository",
//!         ComponentTarget::new(|_| UserRepository::default())
//!             .with_dependency("databaseService", "DatabaseService"),
//!         RegistrationOptions::new(),
//!     )
//!     .unwrap();
//!
//! let repository = registry.get_required::<UserRepository>("UserRepository");
//! assert_eq!(repository.database.get().unwrap().url, "postgres://localhost");
//! ```
//!
//! ## Cycles
//!
//! With the default [`DetectionPolicy::Lazy`], a registration that closes a
//! cycle succeeds and the cyclic edges are wired by the deferred pass. With
//! [`DetectionPolicy::Eager`] it fails with [`DiError::CircularDependency`]:
//!
//! ```rust
//! use ferrous_wire::{
//!     Component, ComponentRegistry, ComponentTarget, DetectionPolicy, DiError,
//!     RegistrationOptions,
//! };
//!
//! struct A;
//! impl Component for A {}
//! struct B;
//! impl Component for B {}
//!
//! let registry = ComponentRegistry::builder()
//!     .detection_policy(DetectionPolicy::Eager)
//!     .build();
//!
//! registry
//!     .register("A", ComponentTarget::new(|_| A).with_dependency("b", "B"), RegistrationOptions::new())
//!     .unwrap();
//! let err = registry
//!     .register("B", ComponentTarget::new(|_| B).with_dependency("a", "A"), RegistrationOptions::new())
//!     .unwrap_err();
//!
//! match err {
//!     DiError::CircularDependency(cycle) => assert_eq!(cycle.cycle, ["B", "A", "B"]),
//!     other => panic!("unexpected error: {}", other),
//! }
//! assert!(!registry.contains("B"));
//! ```

pub mod batch;
pub mod component;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod graph;
pub mod key;
pub mod lifecycle;
pub mod metadata;
pub mod observer;
pub mod registry;
pub mod resolution;
pub mod scope;
pub mod target;

// Internal modules
mod internal;

// Re-export core types
pub use batch::{BatchEntry, BatchOutcome};
pub use component::{Component, ComponentInstance, Injected, InjectionPoint, Lookup, SlotState};
pub use config::{
    ConfigSource, ConfigValue, DetectionPolicy, EnvironmentConfigSource, MapConfigSource, RegistryConfig,
    DEFAULT_DEFERRED_TIMEOUT,
};
pub use descriptors::{ComponentDescriptor, LifecycleHooks, RegistrationOptions};
pub use error::{CircularDependencyError, DiError, DiResult};
pub use graph::{
    CycleReport, DependencyGraph, DependencyGraphNode, DependencyReport, MissingDependency, ResolutionStack,
};
pub use key::{Category, ComponentKey};
pub use lifecycle::{ApplicationReady, ReadinessSignal, ReadyCallback};
pub use metadata::{CacheStats, DeclarationCache, DeclarationSource, TargetDeclarations};
pub use observer::{DiObserver, TracingObserver};
pub use registry::{ComponentRegistry, RegistryBuilder};
pub use resolution::{DeferredOutcome, DeferredTrigger, DelayedAssignment, PendingDeferral};
pub use scope::Scope;
pub use target::{BoxError, ComponentTarget, ConstructorArgs, DependencyDeclaration, TargetId};
