//! Component Instances
//!
//! A [`Component`] is one live instance of a [`ComponentDef`]. It owns its
//! state, its dirty set and its fragment, and follows the lifecycle
//!
//! ```text
//! Created -> Mounted -> (Updating)* -> Destroyed
//! ```
//!
//! `Updating` is not a stored state: the scheduler calls [`Component::update`]
//! during a flush whenever the dirty set is non-empty.
//!
//! # Locking
//!
//! All instance data lives behind one mutex. It is never held while calling
//! into the fragment, hooks, binding callbacks or listeners. To call the
//! fragment, the instance lends it out of the lock and takes it back
//! afterwards. If the instance is destroyed while its fragment is lent, the
//! returning caller destroys the fragment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::dirty::{DirtyTracker, FieldId, FieldSet};
use super::events::{Event, Listener, Listeners, Unsubscribe};
use super::fragment::{Anchor, Fragment, HostNode, OutroCallback, Target};
use super::scheduler::Scheduler;
use super::state::{Props, Schema, State, Value};
use crate::error::Result;

/// Unique identifier for a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Repeating lifecycle hook (`before_render`, `after_render`).
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Cleanup returned by an `on_mount` hook, or registered with `on_destroy`.
pub type Teardown = Box<dyn FnOnce() + Send>;

/// One-shot hook run after the first mount.
pub type MountHook = Box<dyn FnOnce() -> Option<Teardown> + Send>;

/// Receives the current value of a bound field.
pub type BindingCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// A component type: what generated code provides for each component.
pub trait ComponentDef: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn schema(&self) -> Arc<Schema>;

    /// Initialize state and register lifecycle hooks.
    fn setup(&self, cx: &mut Setup<'_>) {
        let _ = cx;
    }

    /// Build the fragment for a new instance.
    fn create_fragment(&self, component: &Component, state: &State) -> Box<dyn Fragment>;

    /// Expose the instance's named references to its own code.
    fn inject_refs(&self, component: &Component, refs: &IndexMap<String, Component>) {
        let _ = (component, refs);
    }

    /// Invoke a named method, used by event handlers wired in generated code.
    fn call(&self, component: &Component, method: &str, event: &Event) {
        let _ = (component, event);
        tracing::warn!(component = self.name(), method, "no such method");
    }
}

/// Construction options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Mount immediately into this target.
    pub target: Option<Target>,
    pub anchor: Option<Anchor>,
    pub props: Props,
    pub slots: IndexMap<String, Target>,
    /// Claim the target's existing nodes instead of creating new ones.
    pub hydrate: bool,
    /// Play intros during the initial mount.
    pub intro: bool,
}

impl Options {
    /// Create options for a detached instance with no props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount into `target` during construction.
    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Initial property values.
    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Set a single initial property.
    pub fn prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    /// Provide a container for a named slot.
    pub fn slot(mut self, name: impl Into<String>, target: Target) -> Self {
        self.slots.insert(name.into(), target);
        self
    }

    /// Claim the target's existing nodes on the initial mount.
    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate = hydrate;
        self
    }

    /// Play intros on the initial mount.
    pub fn intro(mut self, intro: bool) -> Self {
        self.intro = intro;
        self
    }
}

#[derive(Default)]
struct Hooks {
    before_render: Vec<Hook>,
    after_render: Vec<Hook>,
    on_mount: Vec<MountHook>,
    on_destroy: Vec<Teardown>,
}

/// Handed to [`ComponentDef::setup`] while the instance is being built.
pub struct Setup<'a> {
    state: &'a mut State,
    hooks: &'a mut Hooks,
    handle: WeakComponent,
}

impl Setup<'_> {
    /// State under construction.
    pub fn state(&self) -> &State {
        self.state
    }

    /// Mutable state under construction.
    pub fn state_mut(&mut self) -> &mut State {
        self.state
    }

    /// Set an initial value.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.state.schema().require(name)?;
        self.state.set_field(field, value);
        Ok(())
    }

    /// Handle to the instance under construction. Upgrading only succeeds
    /// once setup has returned.
    pub fn handle(&self) -> WeakComponent {
        self.handle.clone()
    }

    /// Run before every render, including the first.
    pub fn before_render(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.before_render.push(Arc::new(hook));
    }

    /// Run after every render, in the after-render phase.
    pub fn after_render(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.after_render.push(Arc::new(hook));
    }

    /// Run once after the first mount. A returned teardown runs on destroy.
    pub fn on_mount(&mut self, hook: impl FnOnce() -> Option<Teardown> + Send + 'static) {
        self.hooks.on_mount.push(Box::new(hook));
    }

    /// Run once when the instance is destroyed.
    pub fn on_destroy(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.on_destroy.push(Box::new(hook));
    }
}

enum Phase {
    Live {
        /// `None` while lent out to a caller.
        fragment: Option<Box<dyn Fragment>>,
        on_destroy: Vec<Teardown>,
        created: bool,
        mounted: bool,
    },
    Destroyed {
        /// Detach flag for a fragment that was lent out when the instance
        /// was destroyed; the borrower destroys it on return.
        lent: Option<bool>,
    },
}

struct Inner {
    state: State,
    dirty: DirtyTracker,
    phase: Phase,
    before_render: Vec<Hook>,
    after_render: Vec<Hook>,
    on_mount: Vec<MountHook>,
    bindings: HashMap<FieldId, BindingCallback>,
    refs: IndexMap<String, Component>,
    slotted: IndexMap<String, Target>,
}

struct Core {
    id: InstanceId,
    def: Arc<dyn ComponentDef>,
    scheduler: Scheduler,
    listeners: Listeners,
    inner: Mutex<Inner>,
}

/// Handle to a live (or destroyed) component instance. Clones share the
/// same instance.
#[derive(Clone)]
pub struct Component {
    core: Arc<Core>,
}

/// Non-owning handle, used by children to reach their parent.
#[derive(Clone)]
pub struct WeakComponent(Weak<Core>);

impl WeakComponent {
    /// Upgrade to a strong handle, if the instance is still reachable.
    pub fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|core| Component { core })
    }
}

impl std::fmt::Debug for WeakComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakComponent")
    }
}

impl Component {
    /// Build an instance and, when `options.target` is set, mount it and
    /// flush synchronously before returning.
    pub fn new(scheduler: &Scheduler, def: Arc<dyn ComponentDef>, options: Options) -> Self {
        let Options {
            target,
            anchor,
            props,
            slots,
            hydrate,
            intro,
        } = options;

        let core = Arc::new_cyclic(|weak: &Weak<Core>| {
            let mut state = State::new(def.schema());
            let mut hooks = Hooks::default();
            def.setup(&mut Setup {
                state: &mut state,
                hooks: &mut hooks,
                handle: WeakComponent(weak.clone()),
            });
            state.inject(&props);

            Core {
                id: InstanceId::new(),
                def: Arc::clone(&def),
                scheduler: scheduler.clone(),
                listeners: Listeners::default(),
                inner: Mutex::new(Inner {
                    state,
                    dirty: DirtyTracker::new(),
                    phase: Phase::Live {
                        fragment: None,
                        on_destroy: hooks.on_destroy,
                        created: false,
                        mounted: false,
                    },
                    before_render: hooks.before_render,
                    after_render: hooks.after_render,
                    on_mount: hooks.on_mount,
                    bindings: HashMap::new(),
                    refs: IndexMap::new(),
                    slotted: slots,
                }),
            }
        });
        let component = Component { core };
        tracing::debug!(instance = ?component.id(), component = def.name(), "initialize");

        component.run_before_render();
        let state = component.get_state();
        let fragment = def.create_fragment(&component, &state);
        component.restore_fragment(fragment);

        if let Some(target) = target {
            scheduler.set_intro_enabled(intro);
            component.mount(&target, anchor, hydrate);
            scheduler.flush();
            scheduler.set_intro_enabled(true);
        }

        component
    }

    /// Unique id of this instance.
    pub fn id(&self) -> InstanceId {
        self.core.id
    }

    /// The definition this instance was built from.
    pub fn def(&self) -> &Arc<dyn ComponentDef> {
        &self.core.def
    }

    /// Name of the definition.
    pub fn name(&self) -> &str {
        self.core.def.name()
    }

    /// Scheduler this instance updates through.
    pub fn scheduler(&self) -> &Scheduler {
        &self.core.scheduler
    }

    /// Non-owning handle to this instance.
    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent(Arc::downgrade(&self.core))
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Snapshot of the current state.
    pub fn get_state(&self) -> State {
        self.core.inner.lock().state.clone()
    }

    /// Current value of a field by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.core.inner.lock().state.get(name).cloned()
    }

    /// Field schema of the definition.
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(self.core.inner.lock().state.schema())
    }

    /// Current dirty set.
    pub fn dirty(&self) -> FieldSet {
        self.core.inner.lock().dirty.current()
    }

    /// Whether `destroy` has run.
    pub fn is_destroyed(&self) -> bool {
        matches!(self.core.inner.lock().phase, Phase::Destroyed { .. })
    }

    /// Whether the fragment has been mounted and not destroyed.
    pub fn is_mounted(&self) -> bool {
        matches!(
            self.core.inner.lock().phase,
            Phase::Live { mounted: true, .. }
        )
    }

    /// The instance's own setter: write, mark dirty, notify a binding.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let field = self.schema().require(name)?;
        self.set_field(field, value);
        Ok(())
    }

    /// Set a field by id: write, mark dirty, notify a binding.
    pub fn set_field(&self, field: FieldId, value: Value) {
        let (schedule, binding) = {
            let mut inner = self.core.inner.lock();
            inner.state.set_field(field, value.clone());
            let schedule = inner.mark(field);
            (schedule, inner.bindings.get(&field).cloned())
        };
        if schedule {
            self.core.scheduler.schedule(self);
        }
        if let Some(callback) = binding {
            callback(&value);
        }
    }

    /// Edit a field in place and mark it dirty, without notifying bindings.
    pub fn write_field(&self, field: FieldId, edit: impl FnOnce(&mut Value)) {
        let schedule = {
            let mut inner = self.core.inner.lock();
            edit(inner.state.field_mut(field));
            inner.mark(field)
        };
        if schedule {
            self.core.scheduler.schedule(self);
        }
    }

    /// Mark a field dirty by name.
    pub fn mark_dirty(&self, name: &str) -> Result<()> {
        let field = self.schema().require(name)?;
        self.mark_field(field);
        Ok(())
    }

    /// Mark a field dirty by id, scheduling the instance if it was clean.
    pub fn mark_field(&self, field: FieldId) {
        let schedule = self.core.inner.lock().mark(field);
        if schedule {
            self.core.scheduler.schedule(self);
        }
    }

    /// Merge properties into state, marking every declared key dirty.
    pub fn set_props(&self, values: &Props) {
        let schedule = {
            let mut inner = self.core.inner.lock();
            let written = inner.state.inject(values);
            let mut schedule = false;
            for field in written.iter() {
                schedule |= inner.mark(field);
            }
            schedule
        };
        if schedule {
            self.core.scheduler.schedule(self);
        }
    }

    /// Register a binding callback and invoke it once with the current value.
    pub fn bind(&self, name: &str, callback: BindingCallback) {
        let current = {
            let mut inner = self.core.inner.lock();
            let Some(field) = inner.state.schema().field(name) else {
                tracing::warn!(
                    component = self.name(),
                    prop = name,
                    "cannot bind undeclared property"
                );
                return;
            };
            inner.bindings.insert(field, Arc::clone(&callback));
            inner.state.get_field(field).clone()
        };
        callback(&current);
    }

    /// Subscribe to an event fired by this instance.
    pub fn on(
        &self,
        event: &str,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let listener: Listener = Arc::new(listener);
        self.core.listeners.subscribe(event, listener)
    }

    /// Deliver an event to this instance's listeners.
    pub fn fire(&self, event: &str, detail: Value) -> usize {
        self.core.listeners.dispatch(&Event {
            name: event.to_string(),
            detail,
        })
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.core.listeners.count(event)
    }

    /// Content container passed for a named slot.
    pub fn slotted(&self, name: &str) -> Option<Target> {
        self.core.inner.lock().slotted.get(name).cloned()
    }

    /// A named reference to a child instance.
    pub fn reference(&self, name: &str) -> Option<Component> {
        self.core.inner.lock().refs.get(name).cloned()
    }

    /// Point a named reference at `child`.
    pub fn set_reference(&self, name: &str, child: Component) {
        self.core.inner.lock().refs.insert(name.to_string(), child);
    }

    /// Clear a reference, but only if it still points at `child`.
    pub fn clear_reference(&self, name: &str, child: &Component) -> bool {
        let mut inner = self.core.inner.lock();
        match inner.refs.get(name) {
            Some(current) if current.ptr_eq(child) => {
                inner.refs.shift_remove(name);
                true
            }
            _ => false,
        }
    }

    /// Build the fragment's nodes ahead of mounting.
    pub fn create(&self) {
        if let Some(mut fragment) = self.lend_uncreated() {
            fragment.create();
            self.restore_fragment(fragment);
        }
    }

    /// Adopt existing nodes ahead of mounting.
    pub fn claim(&self, nodes: &[HostNode]) {
        if let Some(mut fragment) = self.lend_uncreated() {
            fragment.claim(nodes);
            self.restore_fragment(fragment);
        }
    }

    /// Attach to `target`, creating (or, with `hydrate`, claiming) first if
    /// that has not happened yet, then queue `on_mount` and after-render work.
    pub fn mount(&self, target: &Target, anchor: Option<Anchor>, hydrate: bool) {
        let Some((mut fragment, created)) = self.lend_fragment() else {
            return;
        };

        if !created {
            if hydrate {
                fragment.claim(target.nodes());
            } else {
                fragment.create();
            }
        }
        if fragment.has_intro() {
            fragment.intro(target, anchor, self.core.scheduler.intro_enabled());
        } else {
            fragment.mount(target, anchor);
        }
        self.restore_fragment(fragment);

        if let Phase::Live { mounted, .. } = &mut self.core.inner.lock().phase {
            *mounted = true;
        }
        self.inject_refs();

        // Registered ahead of the after-render hooks: the after-render phase
        // runs newest first, so these hooks fire before on_mount, and a
        // child's on_mount fires before its ancestors' after-render hooks.
        let on_mount = std::mem::take(&mut self.core.inner.lock().on_mount);
        let weak = self.downgrade();
        self.core.scheduler.after_render(move || {
            let teardowns: Vec<Teardown> = on_mount.into_iter().filter_map(|hook| hook()).collect();
            match weak.upgrade() {
                Some(component) => component.adopt_teardowns(teardowns),
                None => teardowns.into_iter().for_each(|t| t()),
            }
        });
        self.queue_after_render();
    }

    /// Patch the fragment with the accumulated dirty set. No-op when clean or
    /// destroyed.
    pub fn update(&self) {
        {
            let inner = self.core.inner.lock();
            if !inner.dirty.is_dirty() || !matches!(inner.phase, Phase::Live { .. }) {
                return;
            }
        }

        self.run_before_render();

        let (dirty, state) = {
            let mut inner = self.core.inner.lock();
            (inner.dirty.take(), inner.state.clone())
        };
        tracing::debug!(instance = ?self.id(), component = self.name(), ?dirty, "update");

        if let Some((mut fragment, _)) = self.lend_fragment() {
            fragment.patch(dirty, &state);
            self.restore_fragment(fragment);
        }
        self.inject_refs();
        self.queue_after_render();
    }

    /// Run the fragment's outro. Completes immediately when there is no
    /// fragment to transition.
    pub fn outro(&self, on_complete: OutroCallback) {
        match self.lend_fragment() {
            Some((mut fragment, _)) => {
                fragment.outro(on_complete);
                self.restore_fragment(fragment);
            }
            None => on_complete(),
        }
    }

    /// Destroy the fragment, run `on_destroy` hooks, fire `destroy` and drop
    /// all listeners. Further calls are no-ops.
    pub fn destroy(&self, detach: bool) {
        self.teardown(detach);
    }

    /// Returns false if the instance was already destroyed.
    pub(crate) fn teardown(&self, detach: bool) -> bool {
        let (fragment, on_destroy) = {
            let mut inner = self.core.inner.lock();
            let phase = std::mem::replace(&mut inner.phase, Phase::Destroyed { lent: None });
            let (fragment, on_destroy) = match phase {
                Phase::Live {
                    fragment,
                    on_destroy,
                    ..
                } => (fragment, on_destroy),
                already @ Phase::Destroyed { .. } => {
                    inner.phase = already;
                    return false;
                }
            };
            if fragment.is_none() {
                inner.phase = Phase::Destroyed { lent: Some(detach) };
            }
            inner.bindings.clear();
            inner.refs.clear();
            inner.before_render.clear();
            inner.after_render.clear();
            (fragment, on_destroy)
        };
        tracing::debug!(instance = ?self.id(), component = self.name(), "destroy");

        if let Some(mut fragment) = fragment {
            fragment.destroy(detach);
        }
        for hook in on_destroy {
            hook();
        }
        self.fire("destroy", Value::Null);
        self.core.listeners.clear();
        true
    }

    fn adopt_teardowns(&self, teardowns: Vec<Teardown>) {
        let orphaned = {
            let mut inner = self.core.inner.lock();
            match &mut inner.phase {
                Phase::Live { on_destroy, .. } => {
                    on_destroy.extend(teardowns);
                    Vec::new()
                }
                Phase::Destroyed { .. } => teardowns,
            }
        };
        // Destroyed before on_mount ran, most likely by a binding firing
        // during mount. The teardowns still run, now.
        for teardown in orphaned {
            teardown();
        }
    }

    fn run_before_render(&self) {
        let hooks = self.core.inner.lock().before_render.clone();
        for hook in hooks {
            hook();
        }
    }

    fn queue_after_render(&self) {
        let hooks = self.core.inner.lock().after_render.clone();
        for hook in hooks {
            self.core.scheduler.after_render(move || hook());
        }
    }

    fn inject_refs(&self) {
        let refs = self.core.inner.lock().refs.clone();
        self.core.def.inject_refs(self, &refs);
    }

    fn lend_fragment(&self) -> Option<(Box<dyn Fragment>, bool)> {
        let mut inner = self.core.inner.lock();
        match &mut inner.phase {
            Phase::Live {
                fragment, created, ..
            } => {
                let was_created = *created;
                let lent = fragment.take()?;
                *created = true;
                Some((lent, was_created))
            }
            Phase::Destroyed { .. } => None,
        }
    }

    /// Lend the fragment only if it has not been created or claimed yet.
    fn lend_uncreated(&self) -> Option<Box<dyn Fragment>> {
        let mut inner = self.core.inner.lock();
        match &mut inner.phase {
            Phase::Live {
                fragment, created, ..
            } if !*created => {
                let lent = fragment.take()?;
                *created = true;
                Some(lent)
            }
            _ => None,
        }
    }

    fn restore_fragment(&self, mut fragment: Box<dyn Fragment>) {
        let orphaned = {
            let mut inner = self.core.inner.lock();
            match &mut inner.phase {
                Phase::Live { fragment: slot, .. } => {
                    *slot = Some(fragment);
                    return;
                }
                Phase::Destroyed { lent } => lent.take(),
            }
        };
        if let Some(detach) = orphaned {
            fragment.destroy(detach);
        }
    }
}

impl Inner {
    /// Mark a field dirty. Returns true when the instance has to be
    /// scheduled: it went from clean to dirty and is still live.
    fn mark(&mut self, field: FieldId) -> bool {
        matches!(self.phase, Phase::Live { .. }) && self.dirty.mark(field)
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;
    use serde_json::json;

    /// Fragment that destroys its own instance from inside `patch`.
    struct SelfDestroying {
        handle: WeakComponent,
        destroyed: Arc<AtomicUsize>,
    }

    impl Fragment for SelfDestroying {
        fn create(&mut self) {}
        fn claim(&mut self, _nodes: &[HostNode]) {}
        fn mount(&mut self, _target: &Target, _anchor: Option<Anchor>) {}

        fn patch(&mut self, _dirty: FieldSet, _state: &State) {
            if let Some(component) = self.handle.upgrade() {
                component.destroy(true);
            }
        }

        fn destroy(&mut self, _detach: bool) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Widget {
        destroyed: Arc<AtomicUsize>,
        torn_down: Arc<AtomicUsize>,
    }

    impl ComponentDef for Widget {
        fn name(&self) -> &str {
            "Widget"
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::new(["a", "b"]).unwrap())
        }

        fn setup(&self, cx: &mut Setup<'_>) {
            let torn_down = Arc::clone(&self.torn_down);
            cx.on_mount(move || {
                let teardown: Teardown = Box::new(move || {
                    torn_down.fetch_add(1, Ordering::SeqCst);
                });
                Some(teardown)
            });
        }

        fn create_fragment(&self, component: &Component, _state: &State) -> Box<dyn Fragment> {
            Box::new(SelfDestroying {
                handle: component.downgrade(),
                destroyed: Arc::clone(&self.destroyed),
            })
        }
    }

    fn widget() -> (Arc<Widget>, Arc<dyn ComponentDef>) {
        let def = Arc::new(Widget::default());
        (Arc::clone(&def), def)
    }

    #[test]
    fn destroy_during_patch_destroys_lent_fragment_on_return() {
        let (widget, def) = widget();
        let scheduler = Scheduler::new();
        let component = Component::new(&scheduler, def, Options::new().target(Target::new("body")));

        component.set("a", json!(1)).unwrap();
        scheduler.flush();

        assert!(component.is_destroyed());
        assert_eq!(widget.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(widget.torn_down.load(Ordering::SeqCst), 1);

        component.destroy(true);
        assert_eq!(widget.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn live_instance_keeps_mount_teardowns_until_destroy() {
        let (widget, def) = widget();
        let scheduler = Scheduler::new();
        let component = Component::new(&scheduler, def, Options::new().target(Target::new("body")));

        assert!(component.is_mounted());
        assert_eq!(widget.torn_down.load(Ordering::SeqCst), 0);

        component.destroy(true);
        assert_eq!(widget.torn_down.load(Ordering::SeqCst), 1);
        assert_eq!(widget.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_instance_waits_for_explicit_mount() {
        let (widget, def) = widget();
        let scheduler = Scheduler::new();
        let component = Component::new(&scheduler, def, Options::new());

        assert!(!component.is_mounted());
        scheduler.flush();
        assert_eq!(widget.torn_down.load(Ordering::SeqCst), 0);

        component.mount(&Target::new("body"), None, false);
        assert!(component.is_mounted());
        scheduler.flush();
        component.destroy(false);
        assert_eq!(widget.torn_down.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_props_marks_present_keys_and_skips_undeclared() {
        let (_, def) = widget();
        let scheduler = Scheduler::new();
        let component = Component::new(&scheduler, def, Options::new().prop("a", json!(1)));
        let schema = component.schema();

        let values: Props = [("a".to_string(), json!(1)), ("zzz".to_string(), json!(2))]
            .into_iter()
            .collect();
        component.set_props(&values);

        let dirty = component.dirty();
        assert_eq!(dirty.len(), 1);
        assert!(dirty.contains(schema.field("a").unwrap()));
        assert!(scheduler.is_pending(&component));
    }

    #[test]
    fn bind_reports_current_value_then_changes() {
        let (_, def) = widget();
        let scheduler = Scheduler::new();
        let component = Component::new(&scheduler, def, Options::new().prop("b", json!("x")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        component.bind("b", Arc::new(move |value: &Value| sink.lock().push(value.clone())));
        component.set("b", json!("y")).unwrap();
        component.set("a", json!(1)).unwrap();

        assert_eq!(*seen.lock(), vec![json!("x"), json!("y")]);
        assert!(matches!(component.set("nope", Value::Null), Err(Error::UnknownField(_))));
    }
}
