//! Component scope definitions.

use serde::{Deserialize, Serialize};

/// Component scopes controlling instance caching behavior.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ComponentRegistry, ComponentTarget, Component, RegistrationOptions, Scope};
///
/// struct Clock;
/// impl Component for Clock {}
///
/// let registry = ComponentRegistry::new();
/// registry
///     .register(
///         "Clock",
///         ComponentTarget::new(|_| Clock),
///         RegistrationOptions::new().scope(Scope::Prototype),
///     )
///     .unwrap();
///
/// let a = registry.get("Clock").unwrap().instance().unwrap();
/// let b = registry.get("Clock").unwrap().instance().unwrap();
/// assert!(!a.ptr_eq(&b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// One shared instance per registry
    ///
    /// Constructed and wired during registration, stored in the instance
    /// store, and returned by every lookup until the registry is cleared.
    #[default]
    Singleton,
    /// New instance per lookup, never stored
    ///
    /// Every lookup runs construction and wiring again. Prototype components
    /// are not constructed at registration time.
    Prototype,
}
