//! Component Registry
//!
//! Names resolve to component definitions through a shared [`Registry`].
//! A name can be declared before its definition exists, which is how
//! mutually referencing components are planned: the planner only needs to
//! know that the name will resolve, the fragment looks it up at run time.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;

use super::ast::EachBlock;
use super::block::Block;
use super::exec::{BlockFragment, EachFragment};
use crate::runtime::{Component, ComponentDef, Event, Fragment, Props, Schema, Setup, State};

/// Shared name -> definition table. Clones share the same table.
#[derive(Clone, Default)]
pub struct Registry {
    defs: Arc<DashMap<String, Option<Arc<dyn ComponentDef>>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a name for a definition registered later.
    pub fn declare(&self, name: impl Into<String>) {
        self.defs.entry(name.into()).or_insert(None);
    }

    /// Register a definition under its own name, replacing any previous one.
    pub fn register(&self, def: Arc<dyn ComponentDef>) {
        tracing::debug!(component = def.name(), "register");
        self.defs.insert(def.name().to_string(), Some(def));
    }

    /// Definition registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ComponentDef>> {
        self.defs.get(name).and_then(|entry| entry.value().clone())
    }

    /// Whether `name` is declared or registered.
    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Number of declared or registered names.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

/// Method invoked by an `on:event={method}` handler.
pub type Method = Arc<dyn Fn(&Component, &Event) + Send + Sync>;

type SetupHook = Arc<dyn Fn(&mut Setup<'_>) + Send + Sync>;

/// A compiled component: a schema, defaults, and a planned block rendered
/// by [`BlockFragment`].
pub struct PlannedComponent {
    name: String,
    schema: Arc<Schema>,
    defaults: Props,
    block: Arc<Block>,
    each: Arc<[EachBlock]>,
    registry: Registry,
    methods: IndexMap<String, Method>,
    setup: Vec<SetupHook>,
}

impl PlannedComponent {
    pub(crate) fn new(
        name: String,
        schema: Schema,
        defaults: Props,
        block: Block,
        each: Vec<EachBlock>,
        registry: Registry,
    ) -> Self {
        Self {
            name,
            schema: Arc::new(schema),
            defaults,
            block: Arc::new(block),
            each: each.into(),
            registry,
            methods: IndexMap::new(),
            setup: Vec::new(),
        }
    }

    /// Attach a method callable from event handlers.
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Component, &Event) + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    /// Run extra setup (hooks, computed initial state) for every instance.
    pub fn with_setup(mut self, hook: impl Fn(&mut Setup<'_>) + Send + Sync + 'static) -> Self {
        self.setup.push(Arc::new(hook));
        self
    }

    /// The planned block.
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn defaults(&self) -> &Props {
        &self.defaults
    }

    /// Register with the registry it was compiled against.
    pub fn register(self) -> Arc<dyn ComponentDef> {
        let registry = self.registry.clone();
        let def: Arc<dyn ComponentDef> = Arc::new(self);
        registry.register(Arc::clone(&def));
        def
    }
}

impl ComponentDef for PlannedComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn setup(&self, cx: &mut Setup<'_>) {
        cx.state_mut().inject(&self.defaults);
        for hook in &self.setup {
            hook(cx);
        }
    }

    fn create_fragment(&self, component: &Component, state: &State) -> Box<dyn Fragment> {
        if self.each.is_empty() {
            Box::new(BlockFragment::new(
                Arc::clone(&self.block),
                component,
                self.registry.clone(),
                state,
                Vec::new(),
            ))
        } else {
            Box::new(EachFragment::new(
                Arc::clone(&self.block),
                Arc::clone(&self.each),
                component,
                self.registry.clone(),
                state,
            ))
        }
    }

    fn call(&self, component: &Component, method: &str, event: &Event) {
        match self.methods.get(method) {
            Some(method) => method(component, event),
            None => tracing::warn!(component = %self.name, method, "no such method"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EmptyFragment;

    struct Leaf;

    impl ComponentDef for Leaf {
        fn name(&self) -> &str {
            "Leaf"
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::new(["value"]).unwrap())
        }

        fn create_fragment(&self, _: &Component, _: &State) -> Box<dyn Fragment> {
            Box::new(EmptyFragment)
        }
    }

    #[test]
    fn declared_names_resolve_once_registered() {
        let registry = Registry::new();
        registry.declare("Leaf");
        assert!(registry.contains("Leaf"));
        assert!(registry.get("Leaf").is_none());

        registry.register(Arc::new(Leaf));
        assert_eq!(registry.get("Leaf").map(|d| d.name().to_string()), Some("Leaf".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clones_share_the_table() {
        let registry = Registry::new();
        let clone = registry.clone();
        clone.register(Arc::new(Leaf));
        assert!(registry.contains("Leaf"));
        assert!(!registry.contains("Other"));
    }
}
