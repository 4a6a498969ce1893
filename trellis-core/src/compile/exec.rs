//! Block Execution
//!
//! [`BlockFragment`] runs a planned [`Block`] against the runtime contract:
//! each [`Fragment`] method executes the statements of its bucket. Per-usage
//! runtime data (the live instance, the selector value, spread levels, the
//! pending patch and the binding suppression flags) sits in a [`UsageState`]
//! indexed like the block's usage plans.
//!
//! [`EachFragment`] wraps a block planned inside iteration blocks and keeps
//! one [`BlockFragment`] per iteration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use super::ast::{EachBlock, Expr, Handler};
use super::block::{Block, Bucket, Stmt};
use super::eval::{write_location, EachContext, EvalContext};
use super::plan::{
    BindingPlan, LevelSource, MountParent, Source, SpreadLevel, SpreadPlan, UsageId, UsagePlan,
};
use super::registry::Registry;
use super::spread;
use crate::runtime::{
    Anchor, BindingCallback, Component, ComponentDef, FieldSet, Fragment, HostNode, Options,
    OutroCallback, Props, Scheduler, State, Target, Value, WeakComponent,
};

struct UsageState {
    instance: Option<Component>,
    switch_value: Value,
    levels: Vec<Props>,
    changes: Props,
    /// One suppression flag per binding, shared with its setter.
    updating: Vec<Arc<AtomicBool>>,
    /// Marker a switch instance mounts before.
    anchor: Anchor,
    mount_target: Option<Target>,
}

impl UsageState {
    fn new(plan: &UsagePlan) -> Self {
        Self {
            instance: None,
            switch_value: Value::Null,
            levels: Vec::new(),
            changes: Props::new(),
            updating: plan
                .bindings
                .iter()
                .map(|_| Arc::new(AtomicBool::new(false)))
                .collect(),
            anchor: Anchor::new(),
            mount_target: None,
        }
    }

    fn reset_updating(&self) {
        for flag in &self.updating {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

/// What a block needs from the instance it renders for.
#[derive(Clone)]
struct Host {
    parent: WeakComponent,
    owner: Arc<dyn ComponentDef>,
    scheduler: Scheduler,
    registry: Registry,
}

impl Host {
    fn of(parent: &Component, registry: Registry) -> Self {
        Self {
            parent: parent.downgrade(),
            owner: Arc::clone(parent.def()),
            scheduler: parent.scheduler().clone(),
            registry,
        }
    }
}

/// Fragment executing a planned block for one parent instance.
pub struct BlockFragment {
    block: Arc<Block>,
    host: Host,
    contexts: Vec<EachContext>,
    state: State,
    usages: Vec<UsageState>,
}

impl BlockFragment {
    /// Build the fragment and run the block's `init` statements, which
    /// construct the child instances.
    pub fn new(
        block: Arc<Block>,
        parent: &Component,
        registry: Registry,
        state: &State,
        contexts: Vec<EachContext>,
    ) -> Self {
        Self::hosted(block, Host::of(parent, registry), state, contexts)
    }

    fn hosted(block: Arc<Block>, host: Host, state: &State, contexts: Vec<EachContext>) -> Self {
        let usages = block.usages().iter().map(UsageState::new).collect();
        let mut fragment = Self {
            host,
            contexts,
            state: state.clone(),
            usages,
            block,
        };

        let block = Arc::clone(&fragment.block);
        for stmt in block.statements(Bucket::Init) {
            let plan = block.usage(stmt.usage());
            match stmt {
                Stmt::SpreadLevels { .. } => {
                    if let Some(spread) = &plan.spread {
                        fragment.usages[plan.id.0].levels = fragment.eval_levels(spread);
                    }
                }
                Stmt::SwitchValue { .. } => {
                    if let Source::Dynamic(selector) = &plan.source {
                        fragment.usages[plan.id.0].switch_value = fragment.eval(&selector.node);
                    }
                }
                Stmt::Instantiate { .. } => {
                    fragment.usages[plan.id.0].instance = fragment.instantiate(plan);
                }
                _ => {}
            }
        }
        fragment
    }

    /// Child instance of the usage at `index`, if one is live.
    pub fn instance(&self, index: usize) -> Option<&Component> {
        self.usages.get(index).and_then(|u| u.instance.as_ref())
    }

    /// The planned block this fragment executes.
    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }

    fn eval(&self, expr: &Expr) -> Value {
        EvalContext::new(&self.state, &self.contexts).eval(expr)
    }

    fn eval_level(&self, level: &SpreadLevel) -> Props {
        let value = self.eval(&level.value.node);
        match &level.source {
            LevelSource::Named(name) => Props::from([(name.clone(), value)]),
            LevelSource::Spread => spread::level_from(value),
        }
    }

    fn eval_levels(&self, spread: &SpreadPlan) -> Vec<Props> {
        spread.levels.iter().map(|level| self.eval_level(level)).collect()
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn ComponentDef>> {
        let owner = &self.host.owner;
        if name == owner.name() {
            return Some(Arc::clone(owner));
        }
        let def = self.host.registry.get(name);
        if def.is_none() {
            tracing::warn!(component = name, parent = owner.name(), "component is not registered");
        }
        def
    }

    fn resolve(&self, plan: &UsagePlan) -> Option<Arc<dyn ComponentDef>> {
        match &plan.source {
            Source::Static(name) => self.lookup(name),
            Source::SelfRef => Some(Arc::clone(&self.host.owner)),
            Source::Dynamic(_) => match &self.usages[plan.id.0].switch_value {
                Value::Null => None,
                Value::String(name) => self.lookup(name),
                other => {
                    tracing::warn!(selector = %other, "selector does not name a component");
                    None
                }
            },
        }
    }

    fn initial_props(&self, plan: &UsagePlan) -> Props {
        let usage = &self.usages[plan.id.0];
        let mut props = match &plan.spread {
            Some(_) => spread::merge(&usage.levels),
            None => plan
                .attributes
                .iter()
                .map(|a| (a.name.clone(), self.eval(&a.value.node)))
                .collect(),
        };
        for (binding, flag) in plan.bindings.iter().zip(&usage.updating) {
            let value = self.eval(&binding.expression.node);
            if !value.is_null() {
                props.insert(binding.name.clone(), value);
                flag.store(true, Ordering::SeqCst);
            }
        }
        props
    }

    fn instantiate(&self, plan: &UsagePlan) -> Option<Component> {
        let def = self.resolve(plan)?;
        let mut options = Options::new().props(self.initial_props(plan));
        if plan.has_slot {
            options = options.slot("default", Target::slot("default"));
        }
        let instance = Component::new(&self.host.scheduler, def, options);
        tracing::trace!(usage = %plan.var, instance = ?instance.id(), "instantiate");
        self.wire(plan, &instance);
        Some(instance)
    }

    /// Bindings, handlers and the named reference.
    fn wire(&self, plan: &UsagePlan, instance: &Component) {
        let usage = &self.usages[plan.id.0];
        for (binding, flag) in plan.bindings.iter().zip(&usage.updating) {
            instance.bind(&binding.name, self.binding_setter(binding, Arc::clone(flag)));
        }
        for handler in &plan.handlers {
            self.wire_handler(instance, handler);
        }
        if let (Some(reference), Some(parent)) = (&plan.reference, self.host.parent.upgrade()) {
            parent.set_reference(reference, instance.clone());
        }
    }

    fn binding_setter(&self, binding: &BindingPlan, flag: Arc<AtomicBool>) -> BindingCallback {
        let parent = self.host.parent.clone();
        let contexts = self.contexts.clone();
        let target = binding.expression.node.clone();
        let fields = binding.expression.fields;
        Arc::new(move |value: &Value| {
            flag.store(true, Ordering::SeqCst);
            let Some(parent) = parent.upgrade() else {
                return;
            };
            let state = parent.get_state();
            let Some(location) = EvalContext::new(&state, &contexts).locate(&target) else {
                tracing::warn!(location = %target.snippet(), "binding target is not a location");
                return;
            };
            if write_location(&parent, &location, value.clone()) {
                for field in fields.iter() {
                    parent.mark_field(field);
                }
            }
        })
    }

    fn wire_handler(&self, instance: &Component, handler: &Handler) {
        let parent = self.host.parent.clone();
        // Listeners live as long as the child; they are dropped on destroy.
        let _subscription = match handler.method.clone() {
            Some(method) => instance.on(&handler.event, move |event| {
                if let Some(parent) = parent.upgrade() {
                    parent.def().call(&parent, &method, event);
                }
            }),
            None => instance.on(&handler.event, move |event| {
                if let Some(parent) = parent.upgrade() {
                    parent.fire(&event.name, event.detail.clone());
                }
            }),
        };
    }

    fn slot_target(&self, host: usize) -> Option<Target> {
        self.usages[host].instance.as_ref()?.slotted("default")
    }

    fn mount_usage(&mut self, plan: &UsagePlan, target: &Target, anchor: Option<Anchor>) {
        let (target, anchor) = match plan.parent {
            MountParent::Block => (target.clone(), anchor),
            MountParent::Slot(host) => match self.slot_target(host.0) {
                Some(slot) => (slot, None),
                None => return,
            },
        };
        let usage = &mut self.usages[plan.id.0];
        let anchor = if plan.is_switch() {
            usage.mount_target = Some(target.clone());
            Some(usage.anchor)
        } else {
            anchor
        };
        if let Some(instance) = &usage.instance {
            instance.mount(&target, anchor, false);
        }
    }

    /// Move the slot content of `host` into `slot`, the default slot of its
    /// new instance. Switch usages in the slot also retarget their future
    /// swaps; with no slot they stay unmounted until the host returns.
    fn remount_slot_content(&mut self, host: UsageId, slot: Option<&Target>) {
        let block = Arc::clone(&self.block);
        for child in block.usages() {
            if child.parent != MountParent::Slot(host) {
                continue;
            }
            let usage = &mut self.usages[child.id.0];
            let anchor = if child.is_switch() {
                usage.mount_target = slot.cloned();
                Some(usage.anchor)
            } else {
                None
            };
            if let (Some(slot), Some(instance)) = (slot, &usage.instance) {
                instance.mount(slot, anchor, false);
            }
        }
    }

    fn compute_changes(&mut self, plan: &UsagePlan, dirty: FieldSet) {
        let id = plan.id.0;
        let mut changes = Props::new();

        match &plan.spread {
            Some(spread) if dirty.intersects(spread.all) => {
                let updates = spread
                    .levels
                    .iter()
                    .map(|level| {
                        level
                            .condition
                            .map_or(true, |own| dirty.intersects(own))
                            .then(|| self.eval_level(level))
                    })
                    .collect();
                changes = spread::spread_update(&mut self.usages[id].levels, updates);
            }
            Some(_) => {}
            None => {
                for attribute in plan.dynamic_attributes() {
                    if dirty.intersects(attribute.value.fields) {
                        changes.insert(attribute.name.clone(), self.eval(&attribute.value.node));
                    }
                }
            }
        }

        for (binding, flag) in plan.bindings.iter().zip(&self.usages[id].updating) {
            if !flag.load(Ordering::SeqCst) && dirty.intersects(binding.expression.fields) {
                let value = self.eval(&binding.expression.node);
                flag.store(!value.is_null(), Ordering::SeqCst);
                changes.insert(binding.name.clone(), value);
            }
        }

        tracing::trace!(usage = %plan.var, keys = changes.len(), "patch");
        self.usages[id].changes = changes;
    }

    fn apply_changes(&mut self, plan: &UsagePlan) {
        let usage = &mut self.usages[plan.id.0];
        let changes = std::mem::take(&mut usage.changes);
        if let Some(instance) = &usage.instance {
            if !changes.is_empty() {
                instance.set_props(&changes);
            }
        }
        usage.reset_updating();
    }

    fn swap(&mut self, plan: &UsagePlan) {
        let Source::Dynamic(selector) = &plan.source else {
            return;
        };
        let id = plan.id.0;
        let value = self.eval(&selector.node);
        if value == self.usages[id].switch_value {
            if plan.has_updates() {
                self.apply_changes(plan);
            }
            return;
        }

        tracing::debug!(
            usage = %plan.var,
            from = %self.usages[id].switch_value,
            to = %value,
            "swap"
        );
        self.usages[id].switch_value = value;
        self.usages[id].changes.clear();

        let old = self.usages[id].instance.take();
        if let Some(old) = &old {
            let outgoing = old.clone();
            old.outro(Box::new(move || outgoing.destroy(true)));
        }

        if let Some(spread) = &plan.spread {
            self.usages[id].levels = self.eval_levels(spread);
        }
        self.usages[id].reset_updating();

        match self.instantiate(plan) {
            Some(instance) => {
                instance.create();
                let slot = instance.slotted("default");
                self.remount_slot_content(plan.id, slot.as_ref());
                let usage = &self.usages[id];
                if let Some(target) = &usage.mount_target {
                    instance.mount(target, Some(usage.anchor), false);
                }
                self.usages[id].instance = Some(instance);
            }
            None => {
                self.remount_slot_content(plan.id, None);
                if let (Some(reference), Some(old), Some(parent)) =
                    (&plan.reference, &old, self.host.parent.upgrade())
                {
                    parent.clear_reference(reference, old);
                }
            }
        }
    }
}

impl Fragment for BlockFragment {
    fn create(&mut self) {
        let block = Arc::clone(&self.block);
        for stmt in block.statements(Bucket::Create) {
            if let Some(instance) = &self.usages[stmt.usage().0].instance {
                instance.create();
            }
        }
    }

    fn claim(&mut self, nodes: &[HostNode]) {
        let block = Arc::clone(&self.block);
        if block.statements(Bucket::Claim).is_empty() {
            // Not compiled for hydration: build fresh instead.
            self.create();
            return;
        }
        for stmt in block.statements(Bucket::Claim) {
            if let Some(instance) = &self.usages[stmt.usage().0].instance {
                instance.claim(nodes);
            }
        }
    }

    fn mount(&mut self, target: &Target, anchor: Option<Anchor>) {
        let block = Arc::clone(&self.block);
        for stmt in block.statements(Bucket::Mount) {
            self.mount_usage(block.usage(stmt.usage()), target, anchor);
        }
    }

    fn patch(&mut self, dirty: FieldSet, state: &State) {
        self.state = state.clone();
        let block = Arc::clone(&self.block);
        for stmt in block.statements(Bucket::Update) {
            let plan = block.usage(stmt.usage());
            match stmt {
                Stmt::ComputeChanges { .. } => self.compute_changes(plan, dirty),
                Stmt::ApplyChanges { .. } => self.apply_changes(plan),
                Stmt::Swap { .. } => self.swap(plan),
                _ => {}
            }
        }
    }

    fn outro(&mut self, on_complete: OutroCallback) {
        let block = Arc::clone(&self.block);
        let outgoing: Vec<Component> = block
            .statements(Bucket::Outro)
            .iter()
            .filter_map(|stmt| self.usages[stmt.usage().0].instance.clone())
            .collect();
        if outgoing.is_empty() {
            on_complete();
            return;
        }

        let remaining = Arc::new(AtomicUsize::new(outgoing.len()));
        let done = Arc::new(Mutex::new(Some(on_complete)));
        for instance in outgoing {
            let remaining = Arc::clone(&remaining);
            let done = Arc::clone(&done);
            instance.outro(Box::new(move || {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let callback = done.lock().take();
                    if let Some(callback) = callback {
                        callback();
                    }
                }
            }));
        }
    }

    fn destroy(&mut self, detach: bool) {
        let block = Arc::clone(&self.block);
        let parent = self.host.parent.upgrade();
        for stmt in block.statements(Bucket::Destroy) {
            let plan = block.usage(stmt.usage());
            let Some(instance) = self.usages[plan.id.0].instance.take() else {
                continue;
            };
            if let (Some(reference), Some(parent)) = (&plan.reference, &parent) {
                parent.clear_reference(reference, &instance);
            }
            instance.destroy(detach && plan.parent == MountParent::Block);
        }
    }
}

/// Fragment for a block nested in iteration blocks: one [`BlockFragment`]
/// per iteration tuple, keyed by the tuple's indices across patches.
pub struct EachFragment {
    block: Arc<Block>,
    each: Arc<[EachBlock]>,
    host: Host,
    state: State,
    iterations: IndexMap<Vec<usize>, BlockFragment>,
    mounted: Option<(Target, Option<Anchor>)>,
}

impl EachFragment {
    /// Expand the iteration blocks against `state` and build every
    /// iteration's block.
    pub fn new(
        block: Arc<Block>,
        each: Arc<[EachBlock]>,
        parent: &Component,
        registry: Registry,
        state: &State,
    ) -> Self {
        let mut fragment = Self {
            block,
            each,
            host: Host::of(parent, registry),
            state: state.clone(),
            iterations: IndexMap::new(),
            mounted: None,
        };
        fragment.iterations = expand(&fragment.each, state)
            .into_iter()
            .map(|contexts| fragment.build(contexts))
            .collect();
        fragment
    }

    /// Number of live iterations.
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Block fragment of the iteration at `index`, in list order.
    pub fn iteration(&self, index: usize) -> Option<&BlockFragment> {
        self.iterations.get_index(index).map(|(_, fragment)| fragment)
    }

    /// Block fragment of the iteration with the given index tuple.
    pub fn iteration_at(&self, key: &[usize]) -> Option<&BlockFragment> {
        self.iterations.get(key)
    }

    fn build(&self, contexts: Vec<EachContext>) -> (Vec<usize>, BlockFragment) {
        let key = iteration_key(&contexts);
        let block = Arc::clone(&self.block);
        let fragment = BlockFragment::hosted(block, self.host.clone(), &self.state, contexts);
        (key, fragment)
    }
}

fn iteration_key(contexts: &[EachContext]) -> Vec<usize> {
    contexts.iter().map(|c| c.index).collect()
}

/// Every iteration tuple of `each`, outermost block first.
fn expand(each: &[EachBlock], state: &State) -> Vec<Vec<EachContext>> {
    let mut tuples = vec![Vec::new()];
    for block in each {
        let mut next = Vec::new();
        for prefix in tuples {
            let len = match EvalContext::new(state, &prefix).eval(&block.list) {
                Value::Array(items) => items.len(),
                Value::Null => 0,
                other => {
                    tracing::warn!(list = %other, "iteration source is not a list");
                    0
                }
            };
            for index in 0..len {
                let mut contexts = prefix.clone();
                contexts.push(EachContext {
                    context: block.context.clone(),
                    index_name: block.index.clone(),
                    list: block.list.clone(),
                    index,
                });
                next.push(contexts);
            }
        }
        tuples = next;
    }
    tuples
}

impl Fragment for EachFragment {
    fn create(&mut self) {
        for fragment in self.iterations.values_mut() {
            fragment.create();
        }
    }

    fn claim(&mut self, nodes: &[HostNode]) {
        for fragment in self.iterations.values_mut() {
            fragment.claim(nodes);
        }
    }

    fn mount(&mut self, target: &Target, anchor: Option<Anchor>) {
        for fragment in self.iterations.values_mut() {
            fragment.mount(target, anchor);
        }
        self.mounted = Some((target.clone(), anchor));
    }

    fn patch(&mut self, dirty: FieldSet, state: &State) {
        self.state = state.clone();
        let tuples = expand(&self.each, state);
        let keys: IndexSet<Vec<usize>> = tuples.iter().map(|c| iteration_key(c)).collect();

        let mut previous = std::mem::take(&mut self.iterations);
        previous.retain(|key, stale| {
            let keep = keys.contains(key);
            if !keep {
                stale.destroy(true);
            }
            keep
        });

        let mut current = IndexMap::with_capacity(tuples.len());
        for contexts in tuples {
            let key = iteration_key(&contexts);
            if let Some(mut fragment) = previous.shift_remove(&key) {
                fragment.patch(dirty, state);
                current.insert(key, fragment);
                continue;
            }
            let (key, mut fragment) = self.build(contexts);
            fragment.create();
            if let Some((target, anchor)) = &self.mounted {
                fragment.mount(target, *anchor);
            }
            current.insert(key, fragment);
        }
        self.iterations = current;
    }

    fn outro(&mut self, on_complete: OutroCallback) {
        if self.iterations.is_empty() {
            on_complete();
            return;
        }
        let remaining = Arc::new(AtomicUsize::new(self.iterations.len()));
        let done = Arc::new(Mutex::new(Some(on_complete)));
        for fragment in self.iterations.values_mut() {
            let remaining = Arc::clone(&remaining);
            let done = Arc::clone(&done);
            fragment.outro(Box::new(move || {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let callback = done.lock().take();
                    if let Some(callback) = callback {
                        callback();
                    }
                }
            }));
        }
    }

    fn destroy(&mut self, detach: bool) {
        for (_, mut fragment) in self.iterations.drain(..) {
            fragment.destroy(detach);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ast::{Attribute, InlineComponent};
    use crate::compile::plan::Planner;
    use crate::compile::scope::Scope;
    use crate::compile::CompileOptions;
    use crate::runtime::{EmptyFragment, Schema};
    use serde_json::json;

    struct Leaf {
        name: &'static str,
        fields: &'static [&'static str],
    }

    impl ComponentDef for Leaf {
        fn name(&self) -> &str {
            self.name
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::new(self.fields.iter().copied()).unwrap())
        }

        fn create_fragment(&self, _: &Component, _: &State) -> Box<dyn Fragment> {
            Box::new(EmptyFragment)
        }
    }

    /// `{#each rows as row}{#each row as item}<Row label={item}/>`
    struct Grid {
        schema: Arc<Schema>,
        each: Arc<[EachBlock]>,
        block: Arc<Block>,
        registry: Registry,
        parent: Component,
    }

    fn grid() -> Grid {
        let schema = Arc::new(Schema::new(["rows"]).unwrap());
        let each: Arc<[EachBlock]> = vec![
            EachBlock::new(Expr::ident("rows"), "row"),
            EachBlock::new(Expr::ident("row"), "item"),
        ]
        .into();
        let registry = Registry::new();
        registry.register(Arc::new(Leaf {
            name: "Row",
            fields: &["label"],
        }));

        let options = CompileOptions::default();
        let mut block = Block::for_each("App", &each);
        let node =
            InlineComponent::named("Row").attr(Attribute::named("label", Expr::ident("item")));
        Planner::new("App", Scope::new(&schema, &each), &registry, &options)
            .plan(&mut block, &node)
            .unwrap();

        let parent = Component::new(
            &Scheduler::new(),
            Arc::new(Leaf {
                name: "App",
                fields: &["rows"],
            }),
            Options::new(),
        );
        Grid {
            schema,
            each,
            block: Arc::new(block),
            registry,
            parent,
        }
    }

    impl Grid {
        fn state(&self, rows: Value) -> State {
            let mut state = State::new(Arc::clone(&self.schema));
            state.inject(&Props::from([("rows".to_string(), rows)]));
            state
        }

        fn fragment(&self, rows: Value) -> EachFragment {
            let state = self.state(rows);
            let mut fragment = EachFragment::new(
                Arc::clone(&self.block),
                Arc::clone(&self.each),
                &self.parent,
                self.registry.clone(),
                &state,
            );
            fragment.create();
            fragment.mount(&Target::new("body"), None);
            fragment
        }

        fn dirty(&self) -> FieldSet {
            self.schema.set_of(["rows"])
        }
    }

    fn row_at(fragment: &EachFragment, key: &[usize]) -> Component {
        fragment
            .iteration_at(key)
            .and_then(|iteration| iteration.instance(0))
            .cloned()
            .unwrap()
    }

    #[test]
    fn expands_nested_lists_in_order() {
        let grid = grid();
        let fragment = grid.fragment(json!([["a", "b"], ["c"]]));

        assert_eq!(fragment.len(), 3);
        assert_eq!(row_at(&fragment, &[0, 1]).get("label"), Some(json!("b")));
        assert_eq!(row_at(&fragment, &[1, 0]).get("label"), Some(json!("c")));
        assert!(fragment.iteration(2).is_some());
        assert!(fragment.iteration(3).is_none());
    }

    #[test]
    fn shrinking_an_inner_list_keeps_later_iterations() {
        let grid = grid();
        let mut fragment = grid.fragment(json!([["a", "b"], ["c"]]));
        let removed = row_at(&fragment, &[0, 1]);
        let kept = row_at(&fragment, &[1, 0]);

        fragment.patch(grid.dirty(), &grid.state(json!([["a"], ["d"]])));

        assert_eq!(fragment.len(), 2);
        assert!(removed.is_destroyed());
        assert!(!kept.is_destroyed());
        assert!(row_at(&fragment, &[1, 0]).ptr_eq(&kept));
        assert!(fragment.iteration(1).and_then(|i| i.instance(0)).unwrap().ptr_eq(&kept));
        assert_eq!(kept.get("label"), Some(json!("d")));
    }

    #[test]
    fn new_iterations_are_created_and_mounted() {
        let grid = grid();
        let mut fragment = grid.fragment(json!([["a"]]));
        let first = row_at(&fragment, &[0, 0]);

        fragment.patch(grid.dirty(), &grid.state(json!([["a", "b"], ["c"]])));

        assert_eq!(fragment.len(), 3);
        assert!(row_at(&fragment, &[0, 0]).ptr_eq(&first));
        assert!(row_at(&fragment, &[0, 1]).is_mounted());
        assert!(row_at(&fragment, &[1, 0]).is_mounted());

        fragment.destroy(true);
        assert!(fragment.is_empty());
        assert!(first.is_destroyed());
    }

    #[test]
    fn non_list_source_renders_nothing() {
        let grid = grid();
        let fragment = grid.fragment(json!({ "not": "a list" }));
        assert!(fragment.is_empty());
    }
}
