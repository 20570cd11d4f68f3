//! Registration targets: constructors plus declared dependencies.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::{Component, ComponentInstance};
use crate::error::{DiError, DiResult};
use crate::key::Category;

/// Error type accepted from fallible constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Constructor = Arc<dyn Fn(&ConstructorArgs) -> Result<ComponentInstance, BoxError> + Send + Sync>;

/// Identity of a target type.
///
/// Equality and hashing use the `TypeId` only; the name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TargetId {
    type_id: TypeId,
    type_name: &'static str,
}

impl TargetId {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for TargetId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TargetId {}

impl Hash for TargetId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// One declared dependency: "this component needs `identifier` at `property`".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub property: String,
    pub identifier: String,
    /// Expected category; `None` searches every category
    pub category: Option<Category>,
    /// Always wire through the deferred pass, even when resolvable
    pub defer_by_default: bool,
}

impl DependencyDeclaration {
    pub fn new(property: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            identifier: identifier.into(),
            category: None,
            defer_by_default: false,
        }
    }

    pub fn in_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn deferred(mut self) -> Self {
        self.defer_by_default = true;
        self
    }
}

/// Positional constructor arguments.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::ConstructorArgs;
/// use serde_json::json;
///
/// let args = ConstructorArgs::new(vec![json!("postgres://localhost"), json!(8)]);
/// let url: String = args.arg(0).unwrap();
/// let pool: u32 = args.arg(1).unwrap();
/// assert_eq!(url, "postgres://localhost");
/// assert_eq!(pool, 8);
/// assert_eq!(args.arg_or::<u32>(2, 30), 30);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructorArgs(Vec<Value>);

impl ConstructorArgs {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserializes the argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> DiResult<T> {
        let value = self
            .0
            .get(index)
            .ok_or_else(|| DiError::TypeMismatch(format!("missing constructor argument {}", index)))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            DiError::TypeMismatch(format!("constructor argument {} as {}: {}", index, type_name::<T>(), e))
        })
    }

    pub fn arg_or<T: DeserializeOwned>(&self, index: usize, default: T) -> T {
        self.arg(index).unwrap_or(default)
    }
}

impl From<Vec<Value>> for ConstructorArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

#[derive(Clone)]
struct TargetInner {
    id: TargetId,
    constructor: Option<Constructor>,
    dependencies: Vec<DependencyDeclaration>,
    parent: Option<ComponentTarget>,
}

/// A constructible component type together with its declared dependencies.
///
/// Dependencies are stated explicitly with the builder methods. A target may
/// extend a parent target, inheriting its declarations; a child declaration
/// for the same property replaces the parent's.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Component, ComponentTarget, Injected, InjectionPoint};
///
/// struct DatabaseService;
/// impl Component for DatabaseService {}
///
/// #[derive(Default)]
/// struct UserRepository {
///     database: Injected<DatabaseService>,
/// }
///
/// impl Component for UserRepository {
///     fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
///         (property == "databaseService").then_some(&self.database as &dyn InjectionPoint)
///     }
/// }
///
/// let target = ComponentTarget::new(|_| UserRepository::default())
///     .with_dependency("databaseService", "DatabaseService");
///
/// assert!(target.is_constructible());
/// assert_eq!(target.display_name(), "UserRepository");
/// assert_eq!(target.own_dependencies().len(), 1);
/// ```
#[derive(Clone)]
pub struct ComponentTarget {
    inner: Arc<TargetInner>,
}

impl ComponentTarget {
    /// Creates a target from an infallible constructor.
    pub fn new<T, F>(constructor: F) -> Self
    where
        T: Component,
        F: Fn(&ConstructorArgs) -> T + Send + Sync + 'static,
    {
        Self::from_constructor::<T>(Arc::new(move |args: &ConstructorArgs| {
            Ok(ComponentInstance::new(constructor(args)))
        }))
    }

    /// Creates a target from a constructor that may fail.
    pub fn try_new<T, E, F>(constructor: F) -> Self
    where
        T: Component,
        E: Into<BoxError>,
        F: Fn(&ConstructorArgs) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::from_constructor::<T>(Arc::new(move |args: &ConstructorArgs| {
            constructor(args).map(ComponentInstance::new).map_err(Into::into)
        }))
    }

    /// Declares a type without a constructor.
    ///
    /// Such a target can act as a parent for declaration inheritance but is
    /// rejected by registration.
    pub fn declared<T: 'static>() -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::of::<T>(),
                constructor: None,
                dependencies: Vec::new(),
                parent: None,
            }),
        }
    }

    fn from_constructor<T: 'static>(constructor: Constructor) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::of::<T>(),
                constructor: Some(constructor),
                dependencies: Vec::new(),
                parent: None,
            }),
        }
    }

    pub fn extends(mut self, parent: ComponentTarget) -> Self {
        Arc::make_mut(&mut self.inner).parent = Some(parent);
        self
    }

    pub fn with_dependency(self, property: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.dependency(DependencyDeclaration::new(property, identifier))
    }

    pub fn with_dependency_in(
        self,
        property: impl Into<String>,
        identifier: impl Into<String>,
        category: Category,
    ) -> Self {
        self.dependency(DependencyDeclaration::new(property, identifier).in_category(category))
    }

    pub fn with_deferred_dependency(self, property: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.dependency(DependencyDeclaration::new(property, identifier).deferred())
    }

    /// Adds a declaration, replacing an earlier one for the same property.
    pub fn dependency(mut self, declaration: DependencyDeclaration) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        match inner
            .dependencies
            .iter_mut()
            .find(|d| d.property == declaration.property)
        {
            Some(existing) => *existing = declaration,
            None => inner.dependencies.push(declaration),
        }
        self
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.id.type_name
    }

    /// Type name without its module path.
    pub fn display_name(&self) -> &'static str {
        let name = self.inner.id.type_name;
        let base = name.split('<').next().unwrap_or(name);
        match base.rfind("::") {
            Some(pos) => &name[pos + 2..],
            None => name,
        }
    }

    pub fn is_constructible(&self) -> bool {
        self.inner.constructor.is_some()
    }

    /// Declarations made directly on this target, excluding the parent's.
    pub fn own_dependencies(&self) -> &[DependencyDeclaration] {
        &self.inner.dependencies
    }

    pub fn parent(&self) -> Option<&ComponentTarget> {
        self.inner.parent.as_ref()
    }

    pub(crate) fn construct(&self, identifier: &str, args: &ConstructorArgs) -> DiResult<ComponentInstance> {
        let constructor = self.inner.constructor.as_ref().ok_or_else(|| DiError::InvalidTarget {
            identifier: identifier.to_string(),
            reason: format!("{} has no constructor", self.type_name()),
        })?;
        constructor(args).map_err(|e| DiError::ConstructionFailed {
            identifier: identifier.to_string(),
            message: e.to_string(),
        })
    }
}

impl fmt::Debug for ComponentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTarget")
            .field("type", &self.inner.id)
            .field("constructible", &self.is_constructible())
            .field("dependencies", &self.inner.dependencies)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.id()))
            .finish()
    }
}
