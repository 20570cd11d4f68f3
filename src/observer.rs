//! Diagnostic observers for registry events.
//!
//! Observers receive registration, resolution, deferral, and cycle events as
//! they happen. Calls are synchronous, so keep implementations cheap.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::ComponentKey;
use crate::resolution::{DeferredOutcome, DelayedAssignment};
use crate::scope::Scope;

/// Observer trait for registry events.
///
/// Every method has a no-op default; implement only what you need.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{
///     Component, ComponentKey, ComponentRegistry, ComponentTarget, DiObserver,
///     RegistrationOptions, Scope,
/// };
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct RegistrationCounter(AtomicUsize);
///
/// impl DiObserver for RegistrationCounter {
///     fn registered(&self, _key: &ComponentKey, _scope: Scope) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// struct Clock;
/// impl Component for Clock {}
///
/// let counter = Arc::new(RegistrationCounter::default());
/// let registry = ComponentRegistry::builder()
///     .add_observer(counter.clone())
///     .build();
///
/// registry
///     .register("Clock", ComponentTarget::new(|_| Clock), RegistrationOptions::new())
///     .unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// A component was registered (aliases included).
    fn registered(&self, _key: &ComponentKey, _scope: Scope) {}

    /// A component finished construction and immediate wiring.
    fn resolved(&self, _key: &ComponentKey, _duration: Duration) {}

    /// Properties of `component` were handed to the deferred pass.
    fn deferred(&self, _component: &str, _assignments: &[DelayedAssignment]) {}

    /// A deferred batch ran.
    fn deferred_completed(&self, _outcome: &DeferredOutcome) {}

    /// A deferred property fell back to the empty value, or a deferred
    /// construction failed.
    fn deferred_failed(&self, _error: &DiError) {}

    /// A cycle was found while registering.
    fn cycle_detected(&self, _cycle: &[String]) {}
}

/// Fan-out over the registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn registered(&self, key: &ComponentKey, scope: Scope) {
        for observer in &self.observers {
            observer.registered(key, scope);
        }
    }

    pub(crate) fn resolved(&self, key: &ComponentKey, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn deferred(&self, component: &str, assignments: &[DelayedAssignment]) {
        for observer in &self.observers {
            observer.deferred(component, assignments);
        }
    }

    pub(crate) fn deferred_completed(&self, outcome: &DeferredOutcome) {
        for observer in &self.observers {
            observer.deferred_completed(outcome);
        }
    }

    pub(crate) fn deferred_failed(&self, error: &DiError) {
        for observer in &self.observers {
            observer.deferred_failed(error);
        }
    }

    pub(crate) fn cycle_detected(&self, cycle: &[String]) {
        for observer in &self.observers {
            observer.cycle_detected(cycle);
        }
    }
}

/// Forwards every event to `tracing`.
///
/// The registry already emits its own `tracing` events; this observer adds
/// per-resolution timing at `trace` level and is mostly useful when a
/// subscriber filters on the `ferrous_wire::observer` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn registered(&self, key: &ComponentKey, scope: Scope) {
        tracing::debug!(component = %key, ?scope, "registered");
    }

    fn resolved(&self, key: &ComponentKey, duration: Duration) {
        tracing::trace!(component = %key, elapsed_us = duration.as_micros() as u64, "resolved");
    }

    fn deferred(&self, component: &str, assignments: &[DelayedAssignment]) {
        let properties: Vec<&str> = assignments.iter().map(|a| a.property.as_str()).collect();
        tracing::debug!(component, ?properties, "deferred");
    }

    fn deferred_completed(&self, outcome: &DeferredOutcome) {
        tracing::debug!(
            component = %outcome.component,
            trigger = ?outcome.trigger,
            wired = outcome.wired.len(),
            emptied = outcome.emptied.len(),
            "deferred batch completed"
        );
    }

    fn deferred_failed(&self, error: &DiError) {
        tracing::warn!(%error, "deferred resolution failed");
    }

    fn cycle_detected(&self, cycle: &[String]) {
        tracing::info!(cycle = %cycle.join(" -> "), "cycle detected");
    }
}
