//! Component instances and their injection points.
//!
//! Components are constructed first with every dependency property in the
//! [`SlotState::Unset`] state, then wired in a second pass. A property whose
//! dependency cannot be satisfied immediately is marked
//! [`SlotState::Pending`] and filled in by the deferred pass, or set to
//! [`SlotState::Empty`] when it never resolves.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DiError, DiResult};

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Base trait for everything the registry constructs.
///
/// A component exposes its dependency properties by name through
/// [`Component::injection_point`]. Property names must match the names used in
/// the target's dependency declarations.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Component, Injected, InjectionPoint};
///
/// struct Database;
/// impl Component for Database {}
///
/// struct UserRepository {
///     database: Injected<Database>,
/// }
///
/// impl Component for UserRepository {
///     fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
///         match property {
///             "databaseService" => Some(&self.database),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Returns the slot backing a dependency property.
    fn injection_point(&self, _property: &str) -> Option<&dyn InjectionPoint> {
        None
    }

    /// Invoked with the configured hook name for init and destroy hooks.
    fn on_lifecycle(&self, _hook: &str) {}
}

/// State of a single injection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Constructed, not wired yet
    Unset,
    /// Waiting for the deferred pass
    Pending,
    /// Holds a dependency instance
    Wired,
    /// Resolution failed or timed out; explicitly empty
    Empty,
}

/// Type-erased view of a property slot used by the wiring passes.
pub trait InjectionPoint: Send + Sync {
    /// Assigns a resolved dependency, downcasting it to the slot type.
    fn assign(&self, value: &ComponentInstance) -> DiResult<()>;

    /// Marks the slot as waiting for the deferred pass.
    fn mark_pending(&self) -> DiResult<()>;

    /// Sets the explicit empty value.
    fn mark_empty(&self) -> DiResult<()>;

    /// Freezes the slot: once wired or emptied it can no longer change.
    fn freeze(&self);

    /// Drops the held value and returns to [`SlotState::Unset`].
    fn reset(&self);

    fn state(&self) -> SlotState;
}

struct Slot<T> {
    value: Option<Arc<T>>,
    state: SlotState,
    frozen: bool,
}

/// Option-typed dependency property.
///
/// Reads return `None` until the property is wired, and keep returning `None`
/// if resolution failed.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Injected, SlotState};
///
/// struct OrderService;
///
/// let slot: Injected<OrderService> = Injected::new();
/// assert!(slot.get().is_none());
/// assert_eq!(slot.state(), SlotState::Unset);
/// ```
pub struct Injected<T> {
    slot: RwLock<Slot<T>>,
}

impl<T> Injected<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                value: None,
                state: SlotState::Unset,
                frozen: false,
            }),
        }
    }

    /// Returns the wired dependency, or `None` while unset, pending, or empty.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().value.clone()
    }

    pub fn state(&self) -> SlotState {
        self.slot.read().state
    }

    pub fn is_wired(&self) -> bool {
        self.state() == SlotState::Wired
    }

    pub fn is_frozen(&self) -> bool {
        self.slot.read().frozen
    }

    fn transition(&self, state: SlotState, value: Option<Arc<T>>) -> DiResult<()> {
        let mut slot = self.slot.write();
        if slot.frozen && matches!(slot.state, SlotState::Wired | SlotState::Empty) {
            return Err(DiError::Frozen(type_name::<T>().to_string()));
        }
        slot.state = state;
        slot.value = value;
        Ok(())
    }
}

impl<T> Default for Injected<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Injected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("Injected")
            .field("type", &type_name::<T>())
            .field("state", &slot.state)
            .field("frozen", &slot.frozen)
            .finish()
    }
}

impl<T: Send + Sync + 'static> InjectionPoint for Injected<T> {
    fn assign(&self, value: &ComponentInstance) -> DiResult<()> {
        let typed = value
            .downcast::<T>()
            .ok_or_else(|| DiError::TypeMismatch(type_name::<T>().to_string()))?;
        self.transition(SlotState::Wired, Some(typed))
    }

    fn mark_pending(&self) -> DiResult<()> {
        self.transition(SlotState::Pending, None)
    }

    fn mark_empty(&self) -> DiResult<()> {
        self.transition(SlotState::Empty, None)
    }

    fn freeze(&self) {
        self.slot.write().frozen = true;
    }

    fn reset(&self) {
        let mut slot = self.slot.write();
        slot.value = None;
        slot.state = SlotState::Unset;
        slot.frozen = false;
    }

    fn state(&self) -> SlotState {
        self.slot.read().state
    }
}

/// Handle to a constructed component.
///
/// Cloning is cheap; clones share the same underlying instance.
#[derive(Clone)]
pub struct ComponentInstance {
    any: AnyArc,
    component: Arc<dyn Component>,
    type_name: &'static str,
}

impl ComponentInstance {
    pub fn new<T: Component>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Component>(arc: Arc<T>) -> Self {
        Self {
            any: arc.clone(),
            component: arc,
            type_name: type_name::<T>(),
        }
    }

    /// Returns the typed instance, or `None` if it is not a `T`.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }

    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ComponentInstance) -> bool {
        Arc::as_ptr(&self.any) as *const () == Arc::as_ptr(&other.any) as *const ()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Result of a registry lookup.
///
/// `NotYetAvailable` is returned instead of an error for a singleton that
/// has no instance yet because it sits on a dependency cycle or is waiting for
/// the readiness signal. Callers that need the value during that window should
/// declare a deferred dependency instead of looking it up directly.
#[derive(Debug, Clone)]
pub enum Lookup {
    Ready(ComponentInstance),
    NotYetAvailable,
}

impl Lookup {
    pub fn is_ready(&self) -> bool {
        matches!(self, Lookup::Ready(_))
    }

    pub fn instance(self) -> Option<ComponentInstance> {
        match self {
            Lookup::Ready(instance) => Some(instance),
            Lookup::NotYetAvailable => None,
        }
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Lookup::Ready(instance) => instance.downcast::<T>(),
            Lookup::NotYetAvailable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database {
        url: String,
    }
    impl Component for Database {}

    struct Other;
    impl Component for Other {}

    #[test]
    fn assign_wires_matching_type() {
        let slot: Injected<Database> = Injected::new();
        let db = ComponentInstance::new(Database { url: "pg".into() });

        slot.assign(&db).unwrap();
        assert_eq!(slot.state(), SlotState::Wired);
        assert_eq!(slot.get().unwrap().url, "pg");
    }

    #[test]
    fn assign_rejects_other_types() {
        let slot: Injected<Database> = Injected::new();
        let other = ComponentInstance::new(Other);

        assert!(matches!(slot.assign(&other), Err(DiError::TypeMismatch(_))));
        assert_eq!(slot.state(), SlotState::Unset);
    }

    #[test]
    fn frozen_slot_keeps_terminal_value() {
        let slot: Injected<Database> = Injected::new();
        slot.mark_pending().unwrap();
        slot.freeze();

        // pending slots still accept their deferred value
        slot.mark_empty().unwrap();
        let db = ComponentInstance::new(Database { url: "pg".into() });
        assert!(matches!(slot.assign(&db), Err(DiError::Frozen(_))));
        assert_eq!(slot.state(), SlotState::Empty);

        slot.reset();
        assert!(!slot.is_frozen());
        slot.assign(&db).unwrap();
        assert!(slot.is_wired());
    }

    #[test]
    fn instance_identity() {
        let a = ComponentInstance::new(Other);
        let b = a.clone();
        let c = ComponentInstance::new(Other);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(a.type_name().ends_with("Other"));
    }
}
