//! Application readiness signal.
//!
//! Deferred wiring subscribes to a one-shot readiness signal that the
//! application fires once bootstrapping is complete. The registry never fires
//! the signal itself.

use std::fmt;

use parking_lot::Mutex;

/// Callback invoked once when the application becomes ready.
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

/// One-shot readiness subscription.
pub trait ReadinessSignal: Send + Sync {
    /// Runs `callback` once the signal fires, or right away if it already has.
    fn on_ready_once(&self, callback: ReadyCallback);
}

#[derive(Default)]
struct ReadyState {
    fired: bool,
    callbacks: Vec<ReadyCallback>,
}

/// In-process readiness signal.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ApplicationReady, ReadinessSignal};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let ready = ApplicationReady::new();
/// let ran = Arc::new(AtomicBool::new(false));
///
/// let flag = ran.clone();
/// ready.on_ready_once(Box::new(move || flag.store(true, Ordering::SeqCst)));
/// assert!(!ran.load(Ordering::SeqCst));
///
/// assert_eq!(ready.fire(), 1);
/// assert!(ran.load(Ordering::SeqCst));
/// assert_eq!(ready.fire(), 0);
/// ```
#[derive(Default)]
pub struct ApplicationReady {
    state: Mutex<ReadyState>,
}

impl ApplicationReady {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal, returning how many callbacks ran.
    ///
    /// Only the first call has an effect.
    pub fn fire(&self) -> usize {
        let callbacks = {
            let mut state = self.state.lock();
            if state.fired {
                return 0;
            }
            state.fired = true;
            std::mem::take(&mut state.callbacks)
        };

        let count = callbacks.len();
        tracing::debug!(callbacks = count, "application ready");
        // outside the lock: callbacks may subscribe again
        for callback in callbacks {
            callback();
        }
        count
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().fired
    }

    pub fn pending_callbacks(&self) -> usize {
        self.state.lock().callbacks.len()
    }
}

impl ReadinessSignal for ApplicationReady {
    fn on_ready_once(&self, callback: ReadyCallback) {
        let mut state = self.state.lock();
        if state.fired {
            drop(state);
            callback();
        } else {
            state.callbacks.push(callback);
        }
    }
}

impl fmt::Debug for ApplicationReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ApplicationReady")
            .field("fired", &state.fired)
            .field("pending_callbacks", &state.callbacks.len())
            .finish()
    }
}
