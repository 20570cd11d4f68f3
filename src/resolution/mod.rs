//! Construction and wiring.
//!
//! A singleton moves through `Constructing -> Wiring -> Ready`. While wiring,
//! each declared dependency is classified: edges inside a cycle, and edges
//! declared as always-deferred, go to the deferred pass; everything else is
//! looked up and assigned before registration returns. A dependency that
//! cannot be looked up yet (unregistered, or itself waiting) is deferred too.
//!
//! Deferred assignments are grouped into one batch per component. The batch
//! runs once, on the first of: the readiness signal, the timeout, or the
//! registration of the last dependency it waits for (non-cyclic edges only).

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use crate::component::{ComponentInstance, InjectionPoint, Lookup, SlotState};
use crate::config::DetectionPolicy;
use crate::descriptors::{ComponentDescriptor, RegistrationOptions};
use crate::error::{CircularDependencyError, DiError, DiResult};
use crate::key::{Category, ComponentKey};
use crate::registry::store::StoredInstance;
use crate::registry::RegistryInner;
use crate::scope::Scope;
use crate::target::{ComponentTarget, ConstructorArgs};

mod deferred;

pub use deferred::{DeferredOutcome, DeferredTrigger, DelayedAssignment, PendingDeferral};
pub(crate) use deferred::{arm_timeout, DeferredBatch, DeferredQueue, DeferredWork};

/// Keeps an identifier on the resolution path until finished or dropped.
struct ResolvingGuard<'a> {
    inner: &'a RegistryInner,
    identifier: String,
    finished: bool,
}

impl<'a> ResolvingGuard<'a> {
    fn start(inner: &'a RegistryInner, identifier: &str) -> DiResult<Self> {
        inner.graph.lock().start_resolving(identifier)?;
        Ok(Self {
            inner,
            identifier: identifier.to_string(),
            finished: false,
        })
    }

    fn finish(mut self) {
        self.finished = true;
        self.inner.graph.lock().finish_resolving(&self.identifier);
        self.inner.after_pop();
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.graph.lock().abandon_resolving(&self.identifier);
            self.inner.after_pop();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl RegistryInner {
    pub(crate) fn register(
        &self,
        identifier: &str,
        target: ComponentTarget,
        options: RegistrationOptions,
    ) -> DiResult<()> {
        let _serial = self.resolution.lock();

        if identifier.trim().is_empty() {
            return Err(DiError::InvalidTarget {
                identifier: identifier.to_string(),
                reason: "identifier is empty".to_string(),
            });
        }
        if !target.is_constructible() {
            return Err(DiError::InvalidTarget {
                identifier: identifier.to_string(),
                reason: format!("{} has no constructor", target.type_name()),
            });
        }

        let category = options
            .category
            .unwrap_or_else(|| self.default_category(identifier));
        let key = ComponentKey::new(category, identifier);

        let canonical = self.instances.lock().key_for_target(target.id()).cloned();
        if let Some(canonical) = canonical.filter(|c| *c != key) {
            debug!(alias = %key, component = %canonical, "registered alias");
            self.descriptors.write().add_alias(key.clone(), canonical);
            self.observers.registered(&key, options.scope);
            self.satisfy_waiting(identifier, category);
            return Ok(());
        }

        let mut dependencies = self.declarations.get_or_load(&target, self.source.as_ref());
        let previous = self.descriptors.read().exact(&key);
        if let Some(previous) = &previous {
            for declaration in &previous.dependencies {
                if !dependencies.iter().any(|d| d.property == declaration.property) {
                    dependencies.push(declaration.clone());
                }
            }
        }
        let descriptor = Arc::new(ComponentDescriptor::new(
            identifier.to_string(),
            target,
            category,
            options,
            dependencies,
        ));

        let graph_snapshot = {
            let mut graph = self.graph.lock();
            let snapshot = graph.node(identifier).cloned();
            graph.register_component(
                identifier,
                descriptor.target.display_name(),
                &descriptor.dependency_identifiers(),
            );
            snapshot
        };

        let cycle = self.graph.lock().cycle_through(identifier);
        if let Some(cycle) = cycle {
            self.observers.cycle_detected(&cycle);
            if self.config.detection_policy == DetectionPolicy::Eager {
                let mut graph = self.graph.lock();
                let mut stack = graph.resolution_stack().frames().to_vec();
                stack.push(identifier.to_string());
                graph.restore_node(identifier, graph_snapshot);
                warn!(component = %key, cycle = %cycle.join(" -> "), "registration rejected: circular dependency");
                return Err(CircularDependencyError::new(stack, cycle).into());
            }
            info!(component = %key, cycle = %cycle.join(" -> "), "cycle detected; cyclic edges will be wired later");
        }

        let previous = self.descriptors.write().insert(descriptor.clone());
        debug!(
            component = %key,
            scope = ?descriptor.scope,
            dependencies = descriptor.dependencies.len(),
            "registered"
        );
        self.observers.registered(&key, descriptor.scope);

        if let Err(err) = self.activate(&descriptor) {
            self.descriptors.write().restore(&key, previous);
            self.graph.lock().restore_node(identifier, graph_snapshot);
            warn!(component = %key, error = %err, "registration failed");
            return Err(err);
        }

        self.satisfy_waiting(identifier, category);
        Ok(())
    }

    fn default_category(&self, identifier: &str) -> Category {
        if self.config.infer_categories {
            Category::infer(identifier)
        } else {
            Category::Component
        }
    }

    fn activate(&self, descriptor: &Arc<ComponentDescriptor>) -> DiResult<()> {
        if descriptor.scope == Scope::Prototype {
            return Ok(());
        }
        if descriptor.awaits_readiness() {
            debug!(component = %descriptor.identifier, "construction waits for readiness");
            self.schedule(descriptor.key().to_string(), descriptor.clone(), DeferredWork::Construct);
            return Ok(());
        }

        let existing = self.instances.lock().get(&descriptor.key());
        match existing {
            // re-registration: only properties that were never wired
            Some(instance) => {
                let delayed = self.wire(descriptor, &instance)?;
                if !delayed.is_empty() {
                    descriptor.mark_async();
                    self.schedule(
                        descriptor.key().to_string(),
                        descriptor.clone(),
                        DeferredWork::Wire {
                            instance,
                            assignments: delayed,
                        },
                    );
                }
                Ok(())
            }
            None => self.resolve_singleton(descriptor).map(|_| ()),
        }
    }

    pub(crate) fn lookup(
        &self,
        identifier: &str,
        category: Option<Category>,
        args: Option<&ConstructorArgs>,
    ) -> DiResult<Lookup> {
        let _serial = self.resolution.lock();

        let descriptor = self
            .descriptors
            .read()
            .find(identifier, category)
            .ok_or_else(|| DiError::ComponentNotFound(identifier.to_string()))?;
        let key = descriptor.key();

        let reentry = self.graph.lock().reentry_cycle(&descriptor.identifier);
        if let Some(cycle) = reentry {
            if self.config.detection_policy == DetectionPolicy::Eager {
                warn!(component = %key, cycle = %cycle.cycle.join(" -> "), "lookup re-entered its own resolution");
                return Err(cycle.into());
            }
            trace!(component = %key, "lookup on active resolution path");
            return Ok(Lookup::NotYetAvailable);
        }

        if args.is_some() || descriptor.scope == Scope::Prototype {
            let args = args.unwrap_or(&descriptor.args);
            return self.construct_fresh(&descriptor, args).map(Lookup::Ready);
        }

        let stored = self.instances.lock().get(&key);
        if let Some(instance) = stored {
            return Ok(Lookup::Ready(instance));
        }
        if self.deferred.lock().is_awaiting_construction(&key.to_string()) {
            return Ok(Lookup::NotYetAvailable);
        }
        if self.config.detection_policy == DetectionPolicy::Lazy
            && self.graph.lock().is_in_cycle(&descriptor.identifier)
        {
            return Ok(Lookup::NotYetAvailable);
        }

        self.resolve_singleton(&descriptor).map(Lookup::Ready)
    }

    /// Constructs, wires, and stores a singleton.
    fn resolve_singleton(&self, descriptor: &Arc<ComponentDescriptor>) -> DiResult<ComponentInstance> {
        let started = Instant::now();
        let key = descriptor.key();
        let guard = ResolvingGuard::start(self, &descriptor.identifier)?;

        let instance = descriptor.target.construct(&descriptor.identifier, &descriptor.args)?;
        let delayed = self.wire(descriptor, &instance)?;

        self.instances.lock().insert(
            descriptor.target.id(),
            StoredInstance {
                key: key.clone(),
                instance: instance.clone(),
                properties: descriptor.dependencies.iter().map(|d| d.property.clone()).collect(),
            },
        );
        if let Some(hook) = &descriptor.hooks.destroy {
            self.disposers.lock().push(&descriptor.identifier, instance.clone(), hook);
        }
        guard.finish();

        self.observers.resolved(&key, started.elapsed());
        debug!(component = %key, deferred = delayed.len(), "resolved");

        if delayed.is_empty() {
            self.finalize(descriptor, &instance, true);
        } else {
            descriptor.mark_async();
            self.schedule(
                key.to_string(),
                descriptor.clone(),
                DeferredWork::Wire {
                    instance: instance.clone(),
                    assignments: delayed,
                },
            );
        }
        Ok(instance)
    }

    /// Constructs and wires an instance that is never stored.
    fn construct_fresh(&self, descriptor: &Arc<ComponentDescriptor>, args: &ConstructorArgs) -> DiResult<ComponentInstance> {
        let started = Instant::now();
        let guard = ResolvingGuard::start(self, &descriptor.identifier)?;

        let instance = descriptor.target.construct(&descriptor.identifier, args)?;
        let delayed = self.wire(descriptor, &instance)?;
        guard.finish();

        self.observers.resolved(&descriptor.key(), started.elapsed());

        if delayed.is_empty() {
            self.finalize(descriptor, &instance, false);
        } else {
            let serial = self.prototype_serial.fetch_add(1, Ordering::Relaxed);
            self.schedule(
                format!("{}#{}", descriptor.key(), serial),
                descriptor.clone(),
                DeferredWork::Wire {
                    instance: instance.clone(),
                    assignments: delayed,
                },
            );
        }
        Ok(instance)
    }

    /// Immediate wiring pass, in declaration order.
    ///
    /// Returns the assignments that have to wait for the deferred pass.
    fn wire(&self, descriptor: &ComponentDescriptor, instance: &ComponentInstance) -> DiResult<Vec<DelayedAssignment>> {
        let mut delayed = Vec::new();

        for declaration in &descriptor.dependencies {
            let Some(point) = instance.component().injection_point(&declaration.property) else {
                warn!(
                    component = %descriptor.identifier,
                    property = %declaration.property,
                    "declared dependency has no injection point"
                );
                continue;
            };
            if point.state() != SlotState::Unset {
                continue;
            }

            let cyclic = self
                .graph
                .lock()
                .is_cyclic_edge(&descriptor.identifier, &declaration.identifier);

            if !declaration.defer_by_default && !cyclic {
                match self.lookup(&declaration.identifier, declaration.category, None) {
                    Ok(Lookup::Ready(dependency)) => {
                        point.assign(&dependency)?;
                        trace!(
                            component = %descriptor.identifier,
                            property = %declaration.property,
                            "wired"
                        );
                        continue;
                    }
                    Ok(Lookup::NotYetAvailable) | Err(DiError::ComponentNotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }

            point.mark_pending()?;
            delayed.push(DelayedAssignment {
                component: descriptor.identifier.clone(),
                property: declaration.property.clone(),
                dependency: declaration.identifier.clone(),
                category: declaration.category,
                cyclic,
            });
        }
        Ok(delayed)
    }

    /// Freezes stored singletons and runs the init hook.
    fn finalize(&self, descriptor: &ComponentDescriptor, instance: &ComponentInstance, stored: bool) {
        if stored {
            for declaration in &descriptor.dependencies {
                if let Some(point) = instance.component().injection_point(&declaration.property) {
                    point.freeze();
                }
            }
        }
        if let Some(hook) = &descriptor.hooks.init {
            trace!(component = %descriptor.identifier, hook = %hook, "init hook");
            instance.component().on_lifecycle(hook);
        }
    }

    fn is_stored(&self, descriptor: &ComponentDescriptor, instance: &ComponentInstance) -> bool {
        self.instances
            .lock()
            .get(&descriptor.key())
            .map_or(false, |stored| stored.ptr_eq(instance))
    }

    fn schedule(&self, key: String, descriptor: Arc<ComponentDescriptor>, work: DeferredWork) {
        if let DeferredWork::Wire { assignments, .. } = &work {
            debug!(
                component = %descriptor.identifier,
                properties = assignments.len(),
                "deferring properties"
            );
            self.observers.deferred(&descriptor.identifier, assignments);
        }

        let ticket = self.deferred.lock().enqueue(&key, descriptor, work);
        let Some(ticket) = ticket else {
            trace!(key = %key, "merged into pending batch");
            return;
        };

        // nested resolutions arm once the outermost one has stored its instance
        let nested = !self.graph.lock().resolution_stack().is_empty();
        if nested {
            self.postponed.lock().push((key, ticket));
        } else {
            self.arm(key, ticket);
        }
    }

    fn arm(&self, key: String, ticket: u64) {
        let weak = self.weak_self.clone();
        let ready_key = key.clone();
        self.readiness.on_ready_once(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_deferred(&ready_key, ticket, DeferredTrigger::Ready);
            }
        }));

        // already fired: the batch ran inside the subscription
        let waiting = self.deferred.lock().holds(&key, ticket);
        if !waiting {
            return;
        }

        let weak = self.weak_self.clone();
        let timeout_key = key.clone();
        let timer = arm_timeout(self.config.deferred_timeout, self.timers.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_deferred(&timeout_key, ticket, DeferredTrigger::Timeout);
            }
        });
        if let Some(timer) = timer {
            self.deferred.lock().attach_timer(&key, ticket, timer);
        }
    }

    fn after_pop(&self) {
        let idle = self.graph.lock().resolution_stack().is_empty();
        if idle {
            let postponed = std::mem::take(&mut *self.postponed.lock());
            for (key, ticket) in postponed {
                self.arm(key, ticket);
            }
        }
    }

    /// Entry point of the readiness and timeout callbacks.
    ///
    /// Never panics out: a panicking batch is logged and reported to observers.
    pub(crate) fn run_deferred(&self, key: &str, ticket: u64, trigger: DeferredTrigger) {
        let _serial = self.resolution.lock();

        let batch = self.deferred.lock().take(key, ticket);
        let Some(batch) = batch else {
            trace!(key, ?trigger, "deferred batch already consumed");
            return;
        };

        if trigger == DeferredTrigger::Timeout {
            warn!(
                component = %batch.descriptor.identifier,
                timeout_ms = self.config.deferred_timeout.as_millis() as u64,
                "readiness signal did not arrive in time; running deferred batch"
            );
        }

        let identifier = batch.descriptor.identifier.clone();
        match catch_unwind(AssertUnwindSafe(|| self.complete_batch(batch, trigger))) {
            Ok(outcome) => self.observers.deferred_completed(&outcome),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(component = %identifier, %message, "deferred batch panicked");
                self.observers.deferred_failed(&DiError::DeferredResolutionFailure {
                    component: identifier,
                    property: "*".to_string(),
                    dependency: "*".to_string(),
                    reason: message,
                });
            }
        }
    }

    fn complete_batch(&self, batch: DeferredBatch, trigger: DeferredTrigger) -> DeferredOutcome {
        let DeferredBatch { descriptor, work, .. } = batch;
        let mut outcome = DeferredOutcome::new(&descriptor.identifier, trigger);

        match work {
            DeferredWork::Wire { instance, assignments } => {
                for assignment in &assignments {
                    let Some(point) = instance.component().injection_point(&assignment.property) else {
                        continue;
                    };
                    self.construct_if_awaiting(&assignment.dependency, assignment.category, trigger);

                    let resolved = match self.lookup(&assignment.dependency, assignment.category, None) {
                        Ok(Lookup::Ready(dependency)) => point.assign(&dependency).map_err(|e| e.to_string()),
                        Ok(Lookup::NotYetAvailable) => Err("dependency is not available".to_string()),
                        Err(err) => Err(err.to_string()),
                    };

                    match resolved {
                        Ok(()) => outcome.wired.push(assignment.property.clone()),
                        Err(reason) => {
                            self.leave_empty(point, assignment, reason);
                            outcome.emptied.push(assignment.property.clone());
                        }
                    }
                }

                let stored = self.is_stored(&descriptor, &instance);
                self.finalize(&descriptor, &instance, stored);
                debug!(
                    component = %descriptor.identifier,
                    ?trigger,
                    wired = outcome.wired.len(),
                    emptied = outcome.emptied.len(),
                    "deferred wiring completed"
                );
            }
            DeferredWork::Construct => {
                outcome.constructed = true;
                match self.resolve_singleton(&descriptor) {
                    Ok(_) => {
                        debug!(component = %descriptor.identifier, ?trigger, "deferred construction completed");
                        self.satisfy_waiting(&descriptor.identifier, descriptor.category);
                    }
                    Err(err) => {
                        error!(component = %descriptor.identifier, error = %err, "deferred construction failed");
                        self.observers.deferred_failed(&err);
                    }
                }
            }
        }
        outcome
    }

    /// Pulls a dependency's pending construction forward into this pass.
    fn construct_if_awaiting(&self, identifier: &str, category: Option<Category>, trigger: DeferredTrigger) {
        let descriptor = self.descriptors.read().find(identifier, category);
        let Some(descriptor) = descriptor else { return };
        let batch = self.deferred.lock().take_construction(&descriptor.key().to_string());
        if let Some(batch) = batch {
            let outcome = self.complete_batch(batch, trigger);
            self.observers.deferred_completed(&outcome);
        }
    }

    fn leave_empty(&self, point: &dyn InjectionPoint, assignment: &DelayedAssignment, reason: String) {
        if let Err(err) = point.mark_empty() {
            debug!(error = %err, "slot already settled");
        }
        let failure = DiError::DeferredResolutionFailure {
            component: assignment.component.clone(),
            property: assignment.property.clone(),
            dependency: assignment.dependency.clone(),
            reason,
        };
        warn!(error = %failure, "deferred property left empty");
        self.observers.deferred_failed(&failure);
    }

    /// Wires waiting non-cyclic assignments once their dependency exists.
    fn satisfy_waiting(&self, identifier: &str, category: Category) {
        let waiting = self.deferred.lock().waiting_on(identifier, category);
        if waiting.is_empty() {
            return;
        }

        let mut wired: HashMap<String, Vec<String>> = HashMap::new();
        for (key, instance, assignment) in waiting {
            let cyclic = self
                .graph
                .lock()
                .is_cyclic_edge(&assignment.component, &assignment.dependency);
            if cyclic {
                self.deferred.lock().mark_cyclic(&key, &assignment.property);
                continue;
            }

            let dependency = match self.lookup(&assignment.dependency, assignment.category, None) {
                Ok(Lookup::Ready(dependency)) => dependency,
                _ => continue,
            };
            let Some(point) = instance.component().injection_point(&assignment.property) else {
                continue;
            };
            if let Err(err) = point.assign(&dependency) {
                debug!(component = %assignment.component, error = %err, "waiting property not wired");
                continue;
            }
            trace!(component = %assignment.component, property = %assignment.property, "wired on registration");
            wired.entry(key.clone()).or_default().push(assignment.property.clone());

            let released = self.deferred.lock().complete_assignment(&key, &assignment.property);
            if let Some(batch) = released {
                let mut outcome = DeferredOutcome::new(&batch.descriptor.identifier, DeferredTrigger::DependencyRegistered);
                outcome.wired = wired.remove(&key).unwrap_or_default();
                if let Some(instance) = batch.instance() {
                    let stored = self.is_stored(&batch.descriptor, instance);
                    self.finalize(&batch.descriptor, instance, stored);
                }
                self.observers.deferred_completed(&outcome);
            }
        }
    }

    pub(crate) fn clear_instances(&self) {
        let _serial = self.resolution.lock();

        let disposers = self.disposers.lock().drain_reverse();
        for (identifier, instance, hook) in disposers {
            let result = catch_unwind(AssertUnwindSafe(|| instance.component().on_lifecycle(&hook)));
            if let Err(payload) = result {
                error!(
                    component = %identifier,
                    hook = %hook,
                    message = %panic_message(payload.as_ref()),
                    "destroy hook panicked"
                );
            }
        }

        // reset slots so bidirectional references do not keep each other alive
        let stored = self.instances.lock().clear();
        for entry in &stored {
            for property in &entry.properties {
                if let Some(point) = entry.instance.component().injection_point(property) {
                    point.reset();
                }
            }
        }

        let dropped = self.deferred.lock().clear();
        self.postponed.lock().clear();
        self.graph.lock().reset_resolution_state();
        debug!(instances = stored.len(), pending = dropped.len(), "instances cleared");
    }

    pub(crate) fn clear(&self) {
        let _serial = self.resolution.lock();
        self.clear_instances();
        self.descriptors.write().clear();
        self.graph.lock().clear();
        self.declarations.clear();
        debug!("registry cleared");
    }
}
