//! Deferred assignment records and the per-component batch queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::component::ComponentInstance;
use crate::descriptors::ComponentDescriptor;
use crate::key::Category;

/// A dependency property that could not be wired immediately.
///
/// Consumed exactly once, by the deferred pass or by an earlier registration
/// of the dependency it waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayedAssignment {
    /// Owning component identifier
    pub component: String,
    pub property: String,
    /// Requested dependency identifier
    pub dependency: String,
    pub category: Option<Category>,
    /// The edge was classified as part of a cycle
    pub cyclic: bool,
}

/// What caused a deferred batch to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeferredTrigger {
    /// The readiness signal fired
    Ready,
    /// The timeout elapsed first
    Timeout,
    /// Every waiting dependency was registered
    DependencyRegistered,
}

/// Result of one deferred batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredOutcome {
    pub component: String,
    pub trigger: DeferredTrigger,
    /// Properties that received their dependency
    pub wired: Vec<String>,
    /// Properties set to the empty value
    pub emptied: Vec<String>,
    /// The whole construction was deferred
    pub constructed: bool,
}

impl DeferredOutcome {
    pub(crate) fn new(component: &str, trigger: DeferredTrigger) -> Self {
        Self {
            component: component.to_string(),
            trigger,
            wired: Vec::new(),
            emptied: Vec::new(),
            constructed: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.emptied.is_empty()
    }
}

/// Summary of a batch still waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDeferral {
    pub key: String,
    pub component: String,
    /// Waiting properties; empty for a deferred construction
    pub properties: Vec<String>,
    /// A timeout is counting down for this batch
    pub timeout_armed: bool,
}

pub(crate) enum DeferredWork {
    Wire {
        instance: ComponentInstance,
        assignments: Vec<DelayedAssignment>,
    },
    Construct,
}

pub(crate) struct DeferredBatch {
    pub(crate) key: String,
    pub(crate) descriptor: Arc<ComponentDescriptor>,
    pub(crate) ticket: u64,
    pub(crate) work: DeferredWork,
    /// Pending timeout; dropping the batch cancels it
    pub(crate) timer: Option<TimeoutGuard>,
}

impl DeferredBatch {
    pub(crate) fn instance(&self) -> Option<&ComponentInstance> {
        match &self.work {
            DeferredWork::Wire { instance, .. } => Some(instance),
            DeferredWork::Construct => None,
        }
    }
}

/// Outstanding batches keyed by component.
///
/// Enqueueing twice for the same key merges into the existing batch, so each
/// component gets exactly one deferred pass.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    batches: HashMap<String, DeferredBatch>,
    order: Vec<String>,
    next_ticket: u64,
}

impl DeferredQueue {
    /// Adds work for `key`; returns the ticket when a new batch was created.
    pub(crate) fn enqueue(
        &mut self,
        key: &str,
        descriptor: Arc<ComponentDescriptor>,
        work: DeferredWork,
    ) -> Option<u64> {
        if let Some(existing) = self.batches.get_mut(key) {
            if let (
                DeferredWork::Wire { assignments, .. },
                DeferredWork::Wire {
                    assignments: incoming,
                    ..
                },
            ) = (&mut existing.work, work)
            {
                for assignment in incoming {
                    if !assignments.iter().any(|a| a.property == assignment.property) {
                        assignments.push(assignment);
                    }
                }
            }
            return None;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.batches.insert(
            key.to_string(),
            DeferredBatch {
                key: key.to_string(),
                descriptor,
                ticket,
                work,
                timer: None,
            },
        );
        self.order.push(key.to_string());
        Some(ticket)
    }

    /// The batch for `key` is still queued under `ticket`.
    pub(crate) fn holds(&self, key: &str, ticket: u64) -> bool {
        self.batches.get(key).map_or(false, |b| b.ticket == ticket)
    }

    /// Hands the batch its timeout; a consumed batch cancels it at once.
    pub(crate) fn attach_timer(&mut self, key: &str, ticket: u64, timer: TimeoutGuard) {
        match self.batches.get_mut(key) {
            Some(batch) if batch.ticket == ticket => batch.timer = Some(timer),
            _ => drop(timer),
        }
    }

    /// Removes the batch if `ticket` still matches.
    pub(crate) fn take(&mut self, key: &str, ticket: u64) -> Option<DeferredBatch> {
        if self.batches.get(key)?.ticket != ticket {
            return None;
        }
        self.order.retain(|k| k != key);
        self.batches.remove(key)
    }

    /// Removes a pending construction regardless of its ticket.
    pub(crate) fn take_construction(&mut self, key: &str) -> Option<DeferredBatch> {
        if !self.is_awaiting_construction(key) {
            return None;
        }
        self.order.retain(|k| k != key);
        self.batches.remove(key)
    }

    /// Wiring assignments that wait for `identifier` and may be satisfied early.
    ///
    /// Assignments declared as always-deferred are left for the deferred pass.
    pub(crate) fn waiting_on(
        &self,
        identifier: &str,
        category: Category,
    ) -> Vec<(String, ComponentInstance, DelayedAssignment)> {
        let mut found = Vec::new();
        for key in &self.order {
            let Some(batch) = self.batches.get(key) else { continue };
            let DeferredWork::Wire { instance, assignments } = &batch.work else {
                continue;
            };
            for assignment in assignments {
                let matches = assignment.dependency == identifier
                    && assignment.category.map_or(true, |c| c == category);
                let always_deferred = batch
                    .descriptor
                    .dependencies
                    .iter()
                    .any(|d| d.property == assignment.property && d.defer_by_default);
                if matches && !always_deferred {
                    found.push((key.clone(), instance.clone(), assignment.clone()));
                }
            }
        }
        found
    }

    pub(crate) fn mark_cyclic(&mut self, key: &str, property: &str) {
        if let Some(DeferredBatch {
            work: DeferredWork::Wire { assignments, .. },
            ..
        }) = self.batches.get_mut(key)
        {
            for assignment in assignments.iter_mut().filter(|a| a.property == property) {
                assignment.cyclic = true;
            }
        }
    }

    /// Drops a satisfied assignment; returns the batch once nothing is left.
    pub(crate) fn complete_assignment(&mut self, key: &str, property: &str) -> Option<DeferredBatch> {
        let batch = self.batches.get_mut(key)?;
        let DeferredWork::Wire { assignments, .. } = &mut batch.work else {
            return None;
        };
        assignments.retain(|a| a.property != property);
        if assignments.is_empty() {
            self.order.retain(|k| k != key);
            self.batches.remove(key)
        } else {
            None
        }
    }

    pub(crate) fn is_awaiting_construction(&self, key: &str) -> bool {
        matches!(
            self.batches.get(key),
            Some(DeferredBatch {
                work: DeferredWork::Construct,
                ..
            })
        )
    }

    pub(crate) fn pending(&self) -> Vec<PendingDeferral> {
        self.order
            .iter()
            .filter_map(|key| self.batches.get(key))
            .map(|batch| PendingDeferral {
                key: batch.key.clone(),
                component: batch.descriptor.identifier.clone(),
                properties: match &batch.work {
                    DeferredWork::Wire { assignments, .. } => {
                        assignments.iter().map(|a| a.property.clone()).collect()
                    }
                    DeferredWork::Construct => Vec::new(),
                },
                timeout_armed: batch.timer.is_some(),
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.len()
    }

    pub(crate) fn clear(&mut self) -> Vec<DeferredBatch> {
        self.order.clear();
        self.batches.drain().map(|(_, batch)| batch).collect()
    }
}

/// Counts one live timeout for as long as it exists.
struct LiveTimer(Arc<AtomicUsize>);

impl LiveTimer {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for LiveTimer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Cancel {
    Task(tokio::task::JoinHandle<()>),
    Thread { cancelled: Arc<AtomicBool>, thread: Thread },
}

/// Cancels an armed timeout when dropped.
pub(crate) struct TimeoutGuard {
    cancel: Option<Cancel>,
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        match self.cancel.take() {
            Some(Cancel::Task(handle)) => handle.abort(),
            Some(Cancel::Thread { cancelled, thread }) => {
                cancelled.store(true, Ordering::Release);
                thread.unpark();
            }
            None => {}
        }
    }
}

/// Runs `task` once `timeout` elapses, unless the returned guard is dropped first.
///
/// Uses the current tokio runtime when there is one, a plain thread otherwise.
/// `live` counts timeouts that are still waiting or running.
pub(crate) fn arm_timeout<F>(timeout: Duration, live: Arc<AtomicUsize>, task: F) -> Option<TimeoutGuard>
where
    F: FnOnce() + Send + 'static,
{
    let counted = LiveTimer::new(live);
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let join = handle.spawn(async move {
                let _counted = counted;
                tokio::time::sleep(timeout).await;
                if let Err(e) = tokio::task::spawn_blocking(task).await {
                    tracing::error!(error = %e, "deferred timeout task failed");
                }
            });
            Some(TimeoutGuard {
                cancel: Some(Cancel::Task(join)),
            })
        }
        Err(_) => {
            let cancelled = Arc::new(AtomicBool::new(false));
            let flag = cancelled.clone();
            let spawned = std::thread::Builder::new()
                .name("ferrous-wire-timeout".into())
                .spawn(move || {
                    let _counted = counted;
                    let deadline = Instant::now() + timeout;
                    loop {
                        if flag.load(Ordering::Acquire) {
                            return;
                        }
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        std::thread::park_timeout(deadline - now);
                    }
                    task();
                });
            match spawned {
                Ok(handle) => Some(TimeoutGuard {
                    cancel: Some(Cancel::Thread {
                        cancelled,
                        thread: handle.thread().clone(),
                    }),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "could not arm deferred timeout; waiting on readiness only");
                    None
                }
            }
        }
    }
}
