//! Declared-dependency lookup and its cache.
//!
//! The registry never inspects a target directly; it asks a
//! [`DeclarationSource`] for the dependency list. Results are memoized in a
//! [`DeclarationCache`], keyed by the target type together with what the
//! target and its parents declare, so two targets of one type with different
//! declarations never share an entry. The cache only ever saves work: a
//! contended or disabled cache behaves as a miss and the source is asked
//! again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::target::{ComponentTarget, DependencyDeclaration, TargetId};

/// Supplies the dependencies a target declares.
pub trait DeclarationSource: Send + Sync {
    fn declared_dependencies(&self, target: &ComponentTarget) -> Vec<DependencyDeclaration>;
}

/// Reads declarations from the target builder, inheriting from parents.
///
/// Parent declarations come first; a child declaration for a property the
/// parent already declares replaces it in place.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Component, ComponentTarget, DeclarationSource, TargetDeclarations};
///
/// struct BaseController;
/// struct AdminController;
/// impl Component for AdminController {}
///
/// let base = ComponentTarget::declared::<BaseController>()
///     .with_dependency("logger", "LoggerService")
///     .with_dependency("auth", "AuthService");
/// let admin = ComponentTarget::new(|_| AdminController)
///     .extends(base)
///     .with_dependency("auth", "AdminAuthService")
///     .with_dependency("audit", "AuditService");
///
/// let deps = TargetDeclarations.declared_dependencies(&admin);
/// let ids: Vec<_> = deps.iter().map(|d| d.identifier.as_str()).collect();
/// assert_eq!(ids, ["LoggerService", "AdminAuthService", "AuditService"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetDeclarations;

impl DeclarationSource for TargetDeclarations {
    fn declared_dependencies(&self, target: &ComponentTarget) -> Vec<DependencyDeclaration> {
        let mut chain = vec![target];
        let mut current = target;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }

        let mut merged: Vec<DependencyDeclaration> = Vec::new();
        for link in chain.into_iter().rev() {
            for declaration in link.own_dependencies() {
                match merged.iter_mut().find(|d| d.property == declaration.property) {
                    Some(existing) => *existing = declaration.clone(),
                    None => merged.push(declaration.clone()),
                }
            }
        }
        merged
    }
}

/// Hit and miss counters of a [`DeclarationCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache key: each link of the parent chain with its own declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DeclarationKey(Vec<(TargetId, Vec<DependencyDeclaration>)>);

impl DeclarationKey {
    fn of(target: &ComponentTarget) -> Self {
        let mut links = vec![(target.id(), target.own_dependencies().to_vec())];
        let mut current = target;
        while let Some(parent) = current.parent() {
            links.push((parent.id(), parent.own_dependencies().to_vec()));
            current = parent;
        }
        Self(links)
    }
}

/// Per-target memo of declared dependencies.
pub struct DeclarationCache {
    enabled: bool,
    entries: Mutex<HashMap<DeclarationKey, Arc<[DependencyDeclaration]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DeclarationCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns cached declarations or loads them from `source`.
    pub fn get_or_load(&self, target: &ComponentTarget, source: &dyn DeclarationSource) -> Vec<DependencyDeclaration> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return source.declared_dependencies(target);
        }

        let key = DeclarationKey::of(target);
        {
            let entries = self.entries.try_lock();
            if let Some(entries) = entries {
                if let Some(found) = entries.get(&key) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return found.to_vec();
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let loaded = source.declared_dependencies(target);

        let entries = self.entries.try_lock();
        if let Some(mut entries) = entries {
            entries.insert(key, loaded.as_slice().into());
        }
        loaded
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for DeclarationCache {
    fn default() -> Self {
        Self::new(true)
    }
}
