//! Destroy hooks, run in reverse construction order.

use crate::component::ComponentInstance;

struct Disposer {
    identifier: String,
    instance: ComponentInstance,
    hook: String,
}

/// LIFO list of pending destroy hooks.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposer>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, identifier: &str, instance: ComponentInstance, hook: &str) {
        self.entries.push(Disposer {
            identifier: identifier.to_string(),
            instance,
            hook: hook.to_string(),
        });
    }

    /// Removes every hook, newest first, for the caller to run.
    pub(crate) fn drain_reverse(&mut self) -> Vec<(String, ComponentInstance, String)> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some(d) = self.entries.pop() {
            drained.push((d.identifier, d.instance, d.hook));
        }
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
