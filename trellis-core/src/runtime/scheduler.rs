//! Update Scheduler
//!
//! The scheduler batches component updates. Marking a clean component dirty
//! enqueues it; a flush drains the queue and then runs the after-render
//! callbacks that the updates registered.
//!
//! # Algorithm
//!
//! 1. `schedule` appends an instance to the pending queue unless it is already
//!    there. The first schedule after a flush requests a deferred flush from
//!    the trigger.
//! 2. `flush` pops instances in enqueue order and updates each one. Updates
//!    may schedule more instances (children receiving props, parents receiving
//!    binding echoes); those are appended and drained in the same flush.
//! 3. Once the queue is empty, after-render callbacks run newest first, so
//!    callbacks registered by children during mount run before those of their
//!    ancestors.
//! 4. If after-render callbacks scheduled more work, go back to 2.
//!
//! A scheduler is a cheap handle; clones share the same queue. Tests create a
//! fresh scheduler each to stay isolated.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::component::{Component, InstanceId};
use super::trigger::{FlushTrigger, ManualTrigger};

/// One-shot callback run in the after-render phase.
pub type AfterRender = Box<dyn FnOnce() + Send>;

struct Queue {
    /// Instances awaiting update, in enqueue order.
    pending: IndexMap<InstanceId, Component>,

    /// After-render callbacks, in registration order.
    after_render: Vec<AfterRender>,

    /// A flush is currently draining.
    flushing: bool,

    /// A deferred flush has been requested and not yet run.
    requested: bool,

    /// Whether fragments mounted now should play their intros.
    intro_enabled: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    trigger: Box<dyn FlushTrigger>,
}

/// Pending-instance queue plus after-render callback list.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler whose deferred flushes are run by the caller.
    pub fn new() -> Self {
        Self::with_trigger(ManualTrigger::new())
    }

    /// Create a scheduler with a custom deferred-flush trigger.
    pub fn with_trigger(trigger: impl FlushTrigger + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    pending: IndexMap::new(),
                    after_render: Vec::new(),
                    flushing: false,
                    requested: false,
                    intro_enabled: true,
                }),
                trigger: Box::new(trigger),
            }),
        }
    }

    /// Enqueue an instance for update. No-op if it is already pending.
    pub fn schedule(&self, component: &Component) {
        let request = {
            let mut queue = self.shared.queue.lock();
            if queue.pending.contains_key(&component.id()) {
                return;
            }
            queue.pending.insert(component.id(), component.clone());
            tracing::debug!(
                instance = ?component.id(),
                pending = queue.pending.len(),
                "scheduled update"
            );

            let request = !queue.flushing && !queue.requested;
            if request {
                queue.requested = true;
            }
            request
        };

        if request {
            self.shared.trigger.request();
        }
    }

    /// Register a one-shot callback for the after-render phase.
    pub fn after_render(&self, callback: impl FnOnce() + Send + 'static) {
        self.shared.queue.lock().after_render.push(Box::new(callback));
    }

    /// Run a previously requested deferred flush, if one is outstanding.
    pub fn run_deferred(&self) {
        let requested = self.shared.queue.lock().requested;
        if requested {
            self.flush();
        }
    }

    /// Synchronously drain all pending updates and after-render callbacks.
    ///
    /// Calling `flush` from inside a running flush returns immediately; the
    /// outer flush picks up whatever was scheduled.
    pub fn flush(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.flushing {
                return;
            }
            queue.flushing = true;
        }

        let mut updates = 0usize;
        loop {
            while let Some(component) = self.pop_pending() {
                component.update();
                updates += 1;
            }

            while let Some(callback) = self.pop_after_render() {
                callback();
            }

            // Checked and reset under the lock `schedule` takes: work arriving
            // from another thread is either drained by this loop or sees
            // `flushing == false` and requests a new flush.
            let mut queue = self.shared.queue.lock();
            if queue.pending.is_empty() && queue.after_render.is_empty() {
                queue.flushing = false;
                queue.requested = false;
                break;
            }
        }
        tracing::debug!(updates, "flush complete");
    }

    fn pop_pending(&self) -> Option<Component> {
        self.shared
            .queue
            .lock()
            .pending
            .shift_remove_index(0)
            .map(|(_, component)| component)
    }

    fn pop_after_render(&self) -> Option<AfterRender> {
        self.shared.queue.lock().after_render.pop()
    }

    /// Whether `component` is waiting for an update.
    pub fn is_pending(&self, component: &Component) -> bool {
        self.shared.queue.lock().pending.contains_key(&component.id())
    }

    /// Number of instances waiting for an update.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    /// Whether a deferred flush has been requested and not yet run.
    pub fn flush_requested(&self) -> bool {
        self.shared.queue.lock().requested
    }

    /// Whether fragments mounted now should play their intros.
    pub fn intro_enabled(&self) -> bool {
        self.shared.queue.lock().intro_enabled
    }

    pub(crate) fn set_intro_enabled(&self, enabled: bool) {
        self.shared.queue.lock().intro_enabled = enabled;
    }

    /// Whether two handles share the same queue.
    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.shared.queue.lock();
        f.debug_struct("Scheduler")
            .field("pending", &queue.pending.len())
            .field("after_render", &queue.after_render.len())
            .field("flushing", &queue.flushing)
            .finish()
    }
}
