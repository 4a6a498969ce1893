//! Deferred Flush Triggers
//!
//! The first `schedule` after a flush asks the scheduler's trigger for a
//! deferred flush. What "deferred" means is up to the embedder:
//!
//! - [`ManualTrigger`] records the request; the embedder calls
//!   [`Scheduler::run_deferred`] at its own microtask boundary.
//! - [`TokioTrigger`] wakes a [`FlushDriver`] task, which runs the flush on
//!   the tokio runtime.
//!
//! A forced synchronous [`Scheduler::flush`] is always available regardless of
//! the trigger.
//!
//! [`Scheduler::run_deferred`]: super::Scheduler::run_deferred
//! [`Scheduler::flush`]: super::Scheduler::flush

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use super::scheduler::Scheduler;

/// Something that eventually causes `Scheduler::run_deferred` to be called.
pub trait FlushTrigger: Send + Sync {
    fn request(&self);
}

/// Trigger that only counts requests.
#[derive(Debug, Default)]
pub struct ManualTrigger {
    requests: AtomicUsize,
}

impl ManualTrigger {
    /// Create a trigger with no requests recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deferred flushes requested so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl FlushTrigger for ManualTrigger {
    fn request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: FlushTrigger + ?Sized> FlushTrigger for Arc<T> {
    fn request(&self) {
        (**self).request()
    }
}

/// Trigger backed by a tokio [`Notify`]. Requests coalesce: any number of
/// requests before the driver wakes produce one flush.
#[derive(Debug, Clone)]
pub struct TokioTrigger {
    notify: Arc<Notify>,
}

/// The task side of a [`TokioTrigger`].
#[derive(Debug)]
pub struct FlushDriver {
    notify: Arc<Notify>,
}

impl TokioTrigger {
    /// Create a trigger and the driver that services it.
    pub fn new() -> (Self, FlushDriver) {
        let notify = Arc::new(Notify::new());
        (
            Self {
                notify: Arc::clone(&notify),
            },
            FlushDriver { notify },
        )
    }
}

impl FlushTrigger for TokioTrigger {
    fn request(&self) {
        self.notify.notify_one();
    }
}

impl FlushDriver {
    /// Wait for the next request and flush once.
    pub async fn tick(&self, scheduler: &Scheduler) {
        self.notify.notified().await;
        scheduler.run_deferred();
    }

    /// Flush on every request, forever.
    pub async fn run(self, scheduler: Scheduler) {
        loop {
            self.tick(&scheduler).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Component, ComponentDef, EmptyFragment, Fragment, Options, Schema, State};
    use serde_json::json;

    struct Plain;

    impl ComponentDef for Plain {
        fn name(&self) -> &str {
            "Plain"
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::new(["a", "b"]).unwrap())
        }

        fn create_fragment(&self, _: &Component, _: &State) -> Box<dyn Fragment> {
            Box::new(EmptyFragment)
        }
    }

    #[test]
    fn manual_trigger_counts_one_request_per_cycle() {
        let trigger = Arc::new(ManualTrigger::new());
        let scheduler = Scheduler::with_trigger(Arc::clone(&trigger));
        let component = Component::new(&scheduler, Arc::new(Plain), Options::new());

        component.set("a", json!(1)).unwrap();
        component.set("b", json!(2)).unwrap();
        assert_eq!(trigger.requests(), 1);

        scheduler.run_deferred();
        assert_eq!(trigger.requests(), 1);
        assert!(!scheduler.flush_requested());

        component.set("a", json!(3)).unwrap();
        assert_eq!(trigger.requests(), 2);
    }

    #[tokio::test]
    async fn request_before_tick_is_not_lost() {
        let (trigger, driver) = TokioTrigger::new();
        let scheduler = Scheduler::with_trigger(trigger.clone());
        let component = Component::new(&scheduler, Arc::new(Plain), Options::new());

        component.set("a", json!(1)).unwrap();
        trigger.request();
        driver.tick(&scheduler).await;

        assert!(component.dirty().is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }
}
