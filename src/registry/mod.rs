//! Component registry module.
//!
//! This module contains the [`ComponentRegistry`] handle, its builder, and the
//! shared state the resolution passes operate on.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::component::{Component, Lookup};
use crate::config::{DetectionPolicy, RegistryConfig};
use crate::descriptors::{ComponentDescriptor, RegistrationOptions};
use crate::error::{DiError, DiResult};
use crate::graph::{self, DependencyGraph, DependencyReport};
use crate::internal::DisposeBag;
use crate::key::Category;
use crate::lifecycle::{ApplicationReady, ReadinessSignal};
use crate::metadata::{CacheStats, DeclarationCache, DeclarationSource, TargetDeclarations};
use crate::observer::{DiObserver, Observers};
use crate::resolution::{DeferredQueue, PendingDeferral};
use crate::target::{ComponentTarget, ConstructorArgs, DependencyDeclaration};

pub(crate) mod store;

use store::{DescriptorTable, InstanceStore};

/// Component registry and resolution engine.
///
/// The registry stores component descriptors keyed by category and
/// identifier, keeps the dependency graph in sync with every registration,
/// and constructs singletons eagerly as they are registered. Dependencies
/// that cannot be wired immediately (cyclic edges, components registered
/// later) are wired by a deferred pass that runs on the readiness signal or
/// after the configured timeout, whichever comes first.
///
/// # Thread Safety
///
/// The registry is `Send + Sync` and cheap to clone. Registration, lookup,
/// and deferred passes are serialized by a single re-entrant resolution
/// lock, so a component is never constructed twice and a deferred batch
/// never runs concurrently with the registration that feeds it.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{
///     ApplicationReady, Component, ComponentRegistry, ComponentTarget, Injected,
///     InjectionPoint, RegistrationOptions,
/// };
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct UserService {
///     orders: Injected<OrderService>,
/// }
/// impl Component for UserService {
///     fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
///         (property == "orderService").then_some(&self.orders as &dyn InjectionPoint)
///     }
/// }
///
/// #[derive(Default)]
/// struct OrderService {
///     users: Injected<UserService>,
/// }
/// impl Component for OrderService {
///     fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
///         (property == "userService").then_some(&self.users as &dyn InjectionPoint)
///     }
/// }
///
/// let ready = Arc::new(ApplicationReady::new());
/// let registry = ComponentRegistry::builder().readiness(ready.clone()).build();
///
/// registry
///     .register(
///         "UserService",
///         ComponentTarget::new(|_| UserService::default())
///             .with_dependency("orderService", "OrderService"),
///         RegistrationOptions::new(),
///     )
///     .unwrap();
/// registry
///     .register(
///         "OrderService",
///         ComponentTarget::new(|_| OrderService::default())
///             .with_dependency("userService", "UserService"),
///         RegistrationOptions::new(),
///     )
///     .unwrap();
///
/// let users = registry.get_typed::<UserService>("UserService").unwrap().unwrap();
/// assert!(users.orders.get().is_none());
///
/// ready.fire();
/// assert!(users.orders.get().is_some());
/// ```
#[derive(Clone)]
pub struct ComponentRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    pub(crate) config: RegistryConfig,
    /// Serializes registration, lookup, and deferred passes
    pub(crate) resolution: ReentrantMutex<()>,
    pub(crate) graph: Mutex<DependencyGraph>,
    pub(crate) descriptors: RwLock<DescriptorTable>,
    pub(crate) instances: Mutex<InstanceStore>,
    pub(crate) deferred: Mutex<DeferredQueue>,
    /// Batches enqueued while a resolution was in progress
    pub(crate) postponed: Mutex<Vec<(String, u64)>>,
    pub(crate) disposers: Mutex<DisposeBag>,
    pub(crate) declarations: DeclarationCache,
    pub(crate) source: Arc<dyn DeclarationSource>,
    pub(crate) readiness: Arc<dyn ReadinessSignal>,
    pub(crate) observers: Observers,
    pub(crate) prototype_serial: AtomicU64,
    /// Deferred timeouts still waiting or running
    pub(crate) timers: Arc<AtomicUsize>,
    pub(crate) weak_self: Weak<RegistryInner>,
}

impl ComponentRegistry {
    /// Creates a registry with the default configuration.
    ///
    /// Without an external readiness signal, deferred properties are wired
    /// when the timeout elapses.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Registers a component under `identifier`.
    ///
    /// Singletons are constructed and wired before this returns, except for
    /// the properties that have to wait for the deferred pass. Registering
    /// the same category and identifier again replaces the descriptor and
    /// keeps the existing instance. Registering a target type that already
    /// has an instance under a different identifier creates an alias.
    ///
    /// # Errors
    ///
    /// - [`DiError::InvalidTarget`] for an empty identifier or a target
    ///   without a constructor
    /// - [`DiError::CircularDependency`] when the registration closes a cycle
    ///   under [`DetectionPolicy::Eager`]; the registry is left unchanged
    /// - [`DiError::ConstructionFailed`] when the constructor fails
    pub fn register(&self, identifier: &str, target: ComponentTarget, options: RegistrationOptions) -> DiResult<()> {
        self.inner.register(identifier, target, options)
    }

    /// Looks up a component in any category.
    ///
    /// Returns [`Lookup::NotYetAvailable`] while the component sits on the
    /// active resolution path or waits for the deferred pass.
    pub fn get(&self, identifier: &str) -> DiResult<Lookup> {
        self.inner.lookup(identifier, None, None)
    }

    pub fn get_in(&self, identifier: &str, category: Category) -> DiResult<Lookup> {
        self.inner.lookup(identifier, Some(category), None)
    }

    /// Constructs a fresh, unstored instance with the given arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_wire::{Component, ComponentRegistry, ComponentTarget, ConstructorArgs, RegistrationOptions};
    /// use serde_json::json;
    ///
    /// struct Greeter(String);
    /// impl Component for Greeter {}
    ///
    /// let registry = ComponentRegistry::new();
    /// registry
    ///     .register(
    ///         "Greeter",
    ///         ComponentTarget::new(|args| Greeter(args.arg_or(0, "hello".to_string()))),
    ///         RegistrationOptions::new(),
    ///     )
    ///     .unwrap();
    ///
    /// let custom = registry
    ///     .get_with_args("Greeter", ConstructorArgs::new(vec![json!("hi")]))
    ///     .unwrap();
    /// assert_eq!(custom.downcast::<Greeter>().unwrap().0, "hi");
    ///
    /// let shared = registry.get("Greeter").unwrap();
    /// assert_eq!(shared.downcast::<Greeter>().unwrap().0, "hello");
    /// ```
    pub fn get_with_args(&self, identifier: &str, args: ConstructorArgs) -> DiResult<Lookup> {
        self.inner.lookup(identifier, None, Some(&args))
    }

    pub fn lookup(&self, identifier: &str, category: Option<Category>, args: Option<ConstructorArgs>) -> DiResult<Lookup> {
        self.inner.lookup(identifier, category, args.as_ref())
    }

    /// Looks up and downcasts a component.
    ///
    /// `Ok(None)` means the component is registered but not available yet.
    pub fn get_typed<T: Component>(&self, identifier: &str) -> DiResult<Option<Arc<T>>> {
        match self.get(identifier)? {
            Lookup::Ready(instance) => instance.downcast::<T>().map(Some).ok_or_else(|| {
                DiError::TypeMismatch(format!(
                    "{} is a {}, not a {}",
                    identifier,
                    instance.type_name(),
                    std::any::type_name::<T>()
                ))
            }),
            Lookup::NotYetAvailable => Ok(None),
        }
    }

    /// Like [`get_typed`](Self::get_typed), panicking when the component is
    /// missing, unavailable, or of a different type.
    ///
    /// # Panics
    ///
    /// Panics on any lookup failure. Use in wiring code where a missing
    /// component is a programming error.
    pub fn get_required<T: Component>(&self, identifier: &str) -> Arc<T> {
        match self.get_typed::<T>(identifier) {
            Ok(Some(instance)) => instance,
            Ok(None) => panic!("component '{}' is not available yet", identifier),
            Err(e) => panic!("failed to resolve '{}': {}", identifier, e),
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.inner.descriptors.read().contains_identifier(identifier)
    }

    pub fn descriptor(&self, identifier: &str) -> Option<Arc<ComponentDescriptor>> {
        self.inner.descriptors.read().find(identifier, None)
    }

    /// Registered descriptors in registration order, aliases excluded.
    pub fn descriptors(&self) -> Vec<Arc<ComponentDescriptor>> {
        self.inner.descriptors.read().all()
    }

    pub fn len(&self) -> usize {
        self.inner.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored singleton instances.
    pub fn instance_count(&self) -> usize {
        self.inner.instances.lock().len()
    }

    /// Batches still waiting for the deferred pass.
    pub fn pending_deferrals(&self) -> Vec<PendingDeferral> {
        self.inner.deferred.lock().pending()
    }

    /// Deferred timeouts currently counting down or running.
    ///
    /// A batch consumed by readiness or by dependency registration cancels
    /// its timeout.
    pub fn armed_timeouts(&self) -> usize {
        self.inner.timers.load(Ordering::SeqCst)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.declarations.stats()
    }

    /// Declarations of `target` as registration would see them.
    pub(crate) fn declared_dependencies(&self, target: &ComponentTarget) -> Vec<DependencyDeclaration> {
        self.inner.declarations.get_or_load(target, self.inner.source.as_ref())
    }

    /// Copy of the dependency graph for offline analysis.
    pub fn graph_snapshot(&self) -> DependencyGraph {
        self.inner.graph.lock().clone()
    }

    /// First cycle reachable from `identifier`, if any.
    pub fn detect_circular_dependency(&self, identifier: &str) -> Option<Vec<String>> {
        self.inner.graph.lock().detect_circular_dependency(identifier)
    }

    pub fn circular_dependencies(&self) -> Vec<Vec<String>> {
        self.inner.graph.lock().get_all_circular_dependencies()
    }

    /// Builds a report of components, cycles, and missing dependencies.
    pub fn generate_dependency_report(&self) -> DependencyReport {
        let graph = self.graph_snapshot();
        let descriptors = self.inner.descriptors.read();
        DependencyReport::from_graph(&graph, |identifier| descriptors.contains_identifier(identifier))
    }

    /// Renders the dependency graph as an indented text tree.
    pub fn visualize_dependency_graph(&self) -> String {
        graph::visualize(&self.inner.graph.lock())
    }

    /// Renders the dependency graph in Graphviz DOT format.
    pub fn export_dot(&self) -> String {
        graph::export_dot(&self.inner.graph.lock())
    }

    /// Drops every stored instance, running destroy hooks newest first.
    ///
    /// Descriptors stay registered; singletons are constructed again on the
    /// next lookup. Pending deferred batches are discarded.
    pub fn clear_instances(&self) {
        self.inner.clear_instances();
    }

    /// Drops every instance and descriptor.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.len())
            .field("instances", &self.instance_count())
            .field("pending_deferrals", &self.inner.deferred.lock().len())
            .field("detection_policy", &self.inner.config.detection_policy)
            .finish()
    }
}

/// Builder for [`ComponentRegistry`].
pub struct RegistryBuilder {
    config: RegistryConfig,
    source: Option<Arc<dyn DeclarationSource>>,
    readiness: Option<Arc<dyn ReadinessSignal>>,
    observers: Observers,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            source: None,
            readiness: None,
            observers: Observers::new(),
        }
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn detection_policy(mut self, policy: DetectionPolicy) -> Self {
        self.config.detection_policy = policy;
        self
    }

    pub fn deferred_timeout(mut self, timeout: Duration) -> Self {
        self.config.deferred_timeout = timeout;
        self
    }

    /// Replaces the source of dependency declarations.
    pub fn declarations(mut self, source: Arc<dyn DeclarationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Signal that triggers the deferred pass.
    pub fn readiness(mut self, signal: Arc<dyn ReadinessSignal>) -> Self {
        self.readiness = Some(signal);
        self
    }

    pub fn add_observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> ComponentRegistry {
        let RegistryBuilder {
            config,
            source,
            readiness,
            observers,
        } = self;

        let inner = Arc::new_cyclic(|weak_self| RegistryInner {
            declarations: DeclarationCache::new(config.cache_declarations),
            config,
            resolution: ReentrantMutex::new(()),
            graph: Mutex::new(DependencyGraph::new()),
            descriptors: RwLock::new(DescriptorTable::default()),
            instances: Mutex::new(InstanceStore::default()),
            deferred: Mutex::new(DeferredQueue::default()),
            postponed: Mutex::new(Vec::new()),
            disposers: Mutex::new(DisposeBag::default()),
            source: source.unwrap_or_else(|| Arc::new(TargetDeclarations)),
            readiness: readiness.unwrap_or_else(|| Arc::new(ApplicationReady::new())),
            observers,
            prototype_serial: AtomicU64::new(0),
            timers: Arc::new(AtomicUsize::new(0)),
            weak_self: weak_self.clone(),
        });

        ComponentRegistry { inner }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
