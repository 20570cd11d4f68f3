//! Registration options and component descriptors.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::key::{Category, ComponentKey};
use crate::scope::Scope;
use crate::target::{ComponentTarget, ConstructorArgs, DependencyDeclaration};

/// Names of the lifecycle hooks passed to [`crate::Component::on_lifecycle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleHooks {
    /// Runs once a singleton is fully wired
    pub init: Option<String>,
    /// Runs when the instance is cleared, in reverse construction order
    pub destroy: Option<String>,
}

/// Options for a single registration, merged over the defaults
/// (`Singleton`, inferred category, no arguments).
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Category, RegistrationOptions, Scope};
/// use serde_json::json;
///
/// let options = RegistrationOptions::new()
///     .scope(Scope::Prototype)
///     .category(Category::Repository)
///     .arg(json!("users"))
///     .init_hook("connect");
///
/// assert_eq!(options.scope, Scope::Prototype);
/// assert_eq!(options.category, Some(Category::Repository));
/// assert_eq!(options.args.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    pub scope: Scope,
    pub category: Option<Category>,
    pub args: ConstructorArgs,
    pub hooks: LifecycleHooks,
    /// Construction waits for the readiness signal
    pub asynchronous: bool,
}

impl RegistrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn args(mut self, args: impl Into<ConstructorArgs>) -> Self {
        self.args = args.into();
        self
    }

    pub fn arg(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    pub fn init_hook(mut self, name: impl Into<String>) -> Self {
        self.hooks.init = Some(name.into());
        self
    }

    pub fn destroy_hook(mut self, name: impl Into<String>) -> Self {
        self.hooks.destroy = Some(name.into());
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }
}

/// Everything the registry knows about a registered component.
///
/// Immutable once registered, except for the async flag which the
/// resolution pass raises when the component's wiring has to be deferred.
pub struct ComponentDescriptor {
    pub identifier: String,
    pub target: ComponentTarget,
    pub category: Category,
    pub scope: Scope,
    pub args: ConstructorArgs,
    pub hooks: LifecycleHooks,
    /// Declared dependencies, parent declarations included
    pub dependencies: Vec<DependencyDeclaration>,
    awaits_readiness: bool,
    is_async: AtomicBool,
}

impl ComponentDescriptor {
    pub(crate) fn new(
        identifier: String,
        target: ComponentTarget,
        category: Category,
        options: RegistrationOptions,
        dependencies: Vec<DependencyDeclaration>,
    ) -> Self {
        Self {
            identifier,
            target,
            category,
            scope: options.scope,
            args: options.args,
            hooks: options.hooks,
            dependencies,
            awaits_readiness: options.asynchronous,
            is_async: AtomicBool::new(options.asynchronous),
        }
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.category, self.identifier.clone())
    }

    /// True when construction or wiring waits on the readiness signal.
    pub fn is_async(&self) -> bool {
        self.is_async.load(Ordering::Acquire)
    }

    /// True when construction itself waits on the readiness signal.
    pub fn awaits_readiness(&self) -> bool {
        self.awaits_readiness
    }

    pub(crate) fn mark_async(&self) {
        self.is_async.store(true, Ordering::Release);
    }

    pub fn dependency_identifiers(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.identifier.clone()).collect()
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("identifier", &self.identifier)
            .field("target", &self.target.type_name())
            .field("category", &self.category)
            .field("scope", &self.scope)
            .field("hooks", &self.hooks)
            .field("dependencies", &self.dependencies)
            .field("is_async", &self.is_async())
            .finish()
    }
}
