//! Component keys and category namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Advisory category tag for a component.
///
/// Identifiers are unique within a category namespace, so `UserService` as a
/// `Service` and `UserService` as a `Controller` are two distinct components.
/// When a registration does not name a category it is inferred from the
/// identifier's suffix.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::Category;
///
/// assert_eq!(Category::infer("UserService"), Category::Service);
/// assert_eq!(Category::infer("LoginController"), Category::Controller);
/// assert_eq!(Category::infer("UserRepository"), Category::Repository);
/// assert_eq!(Category::infer("Clock"), Category::Component);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Component,
    Controller,
    Service,
    Repository,
}

impl Category {
    /// All categories, in the order untargeted lookups search them.
    pub const ALL: [Category; 4] = [
        Category::Component,
        Category::Controller,
        Category::Service,
        Category::Repository,
    ];

    /// Infers a category from the identifier naming convention.
    pub fn infer(identifier: &str) -> Category {
        let lower = identifier.to_ascii_lowercase();
        if lower.ends_with("controller") {
            Category::Controller
        } else if lower.ends_with("service") {
            Category::Service
        } else if lower.ends_with("repository") {
            Category::Repository
        } else {
            Category::Component
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Component => "COMPONENT",
            Category::Controller => "CONTROLLER",
            Category::Service => "SERVICE",
            Category::Repository => "REPOSITORY",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry key: an identifier inside a category namespace.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Category, ComponentKey};
///
/// let key = ComponentKey::new(Category::Service, "UserService");
/// assert_eq!(key.identifier(), "UserService");
/// assert_eq!(key.to_string(), "SERVICE:UserService");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    pub category: Category,
    pub identifier: String,
}

impl ComponentKey {
    pub fn new(category: Category, identifier: impl Into<String>) -> Self {
        Self {
            category,
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.identifier)
    }
}
