//! Descriptor table and instance store owned by the registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::ComponentInstance;
use crate::descriptors::ComponentDescriptor;
use crate::key::{Category, ComponentKey};
use crate::target::TargetId;

/// Registered descriptors plus identifier aliases.
#[derive(Default)]
pub(crate) struct DescriptorTable {
    entries: HashMap<ComponentKey, Arc<ComponentDescriptor>>,
    aliases: HashMap<ComponentKey, ComponentKey>,
    order: Vec<ComponentKey>,
}

impl DescriptorTable {
    /// Inserts or replaces; returns the previous descriptor.
    pub(crate) fn insert(&mut self, descriptor: Arc<ComponentDescriptor>) -> Option<Arc<ComponentDescriptor>> {
        let key = descriptor.key();
        self.aliases.remove(&key);
        let previous = self.entries.insert(key.clone(), descriptor);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    pub(crate) fn restore(&mut self, key: &ComponentKey, previous: Option<Arc<ComponentDescriptor>>) {
        match previous {
            Some(descriptor) => {
                self.entries.insert(key.clone(), descriptor);
            }
            None => {
                self.entries.remove(key);
                self.order.retain(|k| k != key);
            }
        }
    }

    /// The descriptor registered under exactly `key`, ignoring aliases.
    pub(crate) fn exact(&self, key: &ComponentKey) -> Option<Arc<ComponentDescriptor>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn add_alias(&mut self, alias: ComponentKey, canonical: ComponentKey) {
        self.aliases.insert(alias, canonical);
    }

    pub(crate) fn get(&self, key: &ComponentKey) -> Option<Arc<ComponentDescriptor>> {
        self.entries
            .get(key)
            .or_else(|| self.aliases.get(key).and_then(|canonical| self.entries.get(canonical)))
            .cloned()
    }

    /// Finds by identifier, searching every category when none is given.
    pub(crate) fn find(&self, identifier: &str, category: Option<Category>) -> Option<Arc<ComponentDescriptor>> {
        let categories: &[Category] = match &category {
            Some(c) => std::slice::from_ref(c),
            None => &Category::ALL,
        };
        categories
            .iter()
            .find_map(|c| self.get(&ComponentKey::new(*c, identifier)))
    }

    pub(crate) fn contains_identifier(&self, identifier: &str) -> bool {
        self.find(identifier, None).is_some()
    }

    /// Descriptors in registration order.
    pub(crate) fn all(&self) -> Vec<Arc<ComponentDescriptor>> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).cloned())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.aliases.clear();
        self.order.clear();
    }
}

pub(crate) struct StoredInstance {
    pub(crate) key: ComponentKey,
    pub(crate) instance: ComponentInstance,
    /// Dependency properties to reset on clear
    pub(crate) properties: Vec<String>,
}

/// Singleton instances, keyed by component and by target type.
#[derive(Default)]
pub(crate) struct InstanceStore {
    instances: HashMap<ComponentKey, StoredInstance>,
    by_target: HashMap<TargetId, ComponentKey>,
    order: Vec<ComponentKey>,
}

impl InstanceStore {
    pub(crate) fn insert(&mut self, target: TargetId, stored: StoredInstance) {
        let key = stored.key.clone();
        self.by_target.entry(target).or_insert_with(|| key.clone());
        if self.instances.insert(key.clone(), stored).is_none() {
            self.order.push(key);
        }
    }

    pub(crate) fn get(&self, key: &ComponentKey) -> Option<ComponentInstance> {
        self.instances.get(key).map(|s| s.instance.clone())
    }

    pub(crate) fn key_for_target(&self, target: TargetId) -> Option<&ComponentKey> {
        self.by_target.get(&target)
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }

    /// Empties the store, returning instances newest first.
    pub(crate) fn clear(&mut self) -> Vec<StoredInstance> {
        self.by_target.clear();
        let mut drained = Vec::with_capacity(self.order.len());
        while let Some(key) = self.order.pop() {
            if let Some(stored) = self.instances.remove(&key) {
                drained.push(stored);
            }
        }
        drained
    }
}
