//! Developer-mode precondition checks.
//!
//! [`StrictComponent`] wraps a [`Component`] and adds two checks: a target is
//! required at construction, and destroying twice logs a warning. Everything
//! else is delegated through `Deref`.

use std::ops::Deref;
use std::sync::Arc;

use super::component::{Component, ComponentDef, Options};
use super::scheduler::Scheduler;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct StrictComponent {
    inner: Component,
}

impl StrictComponent {
    /// Build a strict instance. Fails with [`Error::MissingTarget`] when no
    /// target is given.
    pub fn new(
        scheduler: &Scheduler,
        def: Arc<dyn ComponentDef>,
        options: Options,
    ) -> Result<Self> {
        if options.target.is_none() {
            return Err(Error::MissingTarget);
        }
        Ok(Self {
            inner: Component::new(scheduler, def, options),
        })
    }

    /// Destroy the instance; a repeated call warns and does nothing.
    pub fn destroy(&self, detach: bool) {
        if !self.inner.teardown(detach) {
            tracing::warn!(
                instance = ?self.inner.id(),
                component = self.inner.name(),
                "Component was already destroyed"
            );
        }
    }

    /// Unwrap into the plain instance.
    pub fn into_inner(self) -> Component {
        self.inner
    }
}

impl Deref for StrictComponent {
    type Target = Component;

    fn deref(&self) -> &Component {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{EmptyFragment, Fragment, Schema, Setup, State, Target};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted(Arc<AtomicUsize>);

    impl ComponentDef for Counted {
        fn name(&self) -> &str {
            "Counted"
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::new(["a"]).unwrap())
        }

        fn setup(&self, cx: &mut Setup<'_>) {
            let destroyed = Arc::clone(&self.0);
            cx.on_destroy(move || {
                destroyed.fetch_add(1, Ordering::SeqCst);
            });
        }

        fn create_fragment(&self, _: &Component, _: &State) -> Box<dyn Fragment> {
            Box::new(EmptyFragment)
        }
    }

    #[test]
    fn construction_without_target_fails() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let result =
            StrictComponent::new(&Scheduler::new(), Arc::new(Counted(destroyed)), Options::new());
        assert!(matches!(result, Err(Error::MissingTarget)));
    }

    #[test]
    fn second_destroy_runs_nothing() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new();
        let strict = StrictComponent::new(
            &scheduler,
            Arc::new(Counted(Arc::clone(&destroyed))),
            Options::new().target(Target::new("body")),
        )
        .unwrap();

        strict.destroy(true);
        strict.destroy(false);

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(strict.into_inner().is_destroyed());
    }

    #[test]
    fn delegates_to_the_wrapped_instance() {
        let scheduler = Scheduler::new();
        let strict = StrictComponent::new(
            &scheduler,
            Arc::new(Counted(Arc::new(AtomicUsize::new(0)))),
            Options::new().target(Target::new("body")),
        )
        .unwrap();

        strict.set("a", serde_json::json!(1)).unwrap();
        assert!(scheduler.is_pending(&strict));
        scheduler.flush();
        assert!(strict.dirty().is_empty());
    }
}
