//! Error types for the component registry.

use thiserror::Error;

use crate::graph::suggest_resolutions;

/// Errors raised while registering, resolving, or wiring components.
///
/// Structural errors (`InvalidTarget`, `CircularDependency`, `ConstructionFailed`)
/// fail the registration that triggered them. `DeferredResolutionFailure` is
/// never returned from a public call: it is logged and handed to observers when
/// a deferred property falls back to the empty value.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ComponentRegistry, DiError};
///
/// let registry = ComponentRegistry::new();
/// match registry.get("MissingService") {
///     Err(DiError::ComponentNotFound(identifier)) => {
///         assert_eq!(identifier, "MissingService");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// The registration target cannot be constructed
    #[error("Invalid target for '{identifier}': {reason}")]
    InvalidTarget { identifier: String, reason: String },
    /// Lookup for an identifier that was never registered
    #[error("Component not found: {0}")]
    ComponentNotFound(String),
    /// A cycle rejected under the eager detection policy
    #[error(transparent)]
    CircularDependency(Box<CircularDependencyError>),
    /// A deferred property could not be resolved before its batch ran
    #[error("Deferred resolution of {component}.{property} -> {dependency} failed: {reason}")]
    DeferredResolutionFailure {
        component: String,
        property: String,
        dependency: String,
        reason: String,
    },
    /// The component constructor returned an error
    #[error("Construction of '{identifier}' failed: {message}")]
    ConstructionFailed { identifier: String, message: String },
    /// The resolved instance is not of the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(String),
    /// Assignment to an injection point that was already frozen
    #[error("Injection point is frozen: {0}")]
    Frozen(String),
    /// The resolution stack grew past its limit
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Invalid registry configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Diagnostics could not be serialized
    #[error("Export failed: {0}")]
    Export(String),
}

/// Cycle found on the active resolution path or in the dependency graph.
///
/// Carries the resolution stack at the time of detection, the cyclic sub-path
/// (first and last element are the same identifier) and human-readable
/// suggestions for breaking the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circular dependency: {}", .cycle.join(" -> "))]
pub struct CircularDependencyError {
    /// Identifiers on the active resolution path, outermost first
    pub stack: Vec<String>,
    /// The cyclic sub-path, e.g. `[a, b, c, a]`
    pub cycle: Vec<String>,
    /// Suggestions for breaking the cycle
    pub suggestions: Vec<String>,
}

impl CircularDependencyError {
    pub fn new(stack: Vec<String>, cycle: Vec<String>) -> Self {
        let suggestions = suggest_resolutions(&cycle);
        Self {
            stack,
            cycle,
            suggestions,
        }
    }
}

impl From<CircularDependencyError> for DiError {
    fn from(err: CircularDependencyError) -> Self {
        DiError::CircularDependency(Box::new(err))
    }
}

/// Result type for registry operations
pub type DiResult<T> = Result<T, DiError>;
