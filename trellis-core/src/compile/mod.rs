//! Composition Planner
//!
//! Turns a component's child usages into a planned [`Block`] and wraps it
//! as a [`PlannedComponent`] that the runtime can instantiate.
//!
//! # Pipeline
//!
//! 1. The template parser hands over a [`ComponentSource`] (serde JSON).
//! 2. [`Scope`] resolves every expression's dependencies against the schema
//!    and the enclosing iteration blocks.
//! 3. [`Planner`] lays out each usage's statements in the block's buckets.
//! 4. [`BlockFragment`] executes the buckets for each instance.

mod ast;
mod block;
mod eval;
mod exec;
mod plan;
mod registry;
mod scope;
mod spread;

pub use ast::{
    Attribute, Binding, ComponentDescriptor, ComponentSource, EachBlock, Expr, Handler,
    InlineComponent,
};
pub use block::{Block, Bucket, ContextOwner, Stmt};
pub use eval::{assign, write_location, EachContext, EvalContext, Location, Segment};
pub use exec::{BlockFragment, EachFragment};
pub use plan::{
    AttributePlan, BindingPlan, LevelSource, MountParent, Planner, Source, SpreadLevel, SpreadPlan,
    UsageId, UsageNames, UsagePlan,
};
pub use registry::{Method, PlannedComponent, Registry};
pub use scope::{Expression, Scope};
pub use spread::{level_from, merge, spread_update};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::runtime::Schema;

/// Planner options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Overrides the component name used in the block.
    pub name: Option<String>,
    /// Emit claim statements for hydration.
    pub hydratable: bool,
}

impl CompileOptions {
    /// Parse options from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ComponentSource {
    /// Parse a component source from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Plan every child usage of `source`.
pub fn compile(
    source: &ComponentSource,
    registry: &Registry,
    options: &CompileOptions,
) -> Result<PlannedComponent> {
    let schema = Schema::new(source.fields.iter().cloned())?;
    if let Some(unknown) = source.defaults.keys().find(|k| schema.field(k).is_none()) {
        return Err(Error::UnknownField(unknown.clone()));
    }

    let name = options.name.clone().unwrap_or_else(|| source.name.clone());
    let mut block = Block::for_each(name.clone(), &source.each);
    let planner = Planner::new(&name, Scope::new(&schema, &source.each), registry, options);
    for child in &source.children {
        planner.plan(&mut block, child)?;
    }

    tracing::debug!(
        component = %name,
        usages = block.usages().len(),
        dependencies = block.dependencies().len(),
        hydratable = options.hydratable,
        "compiled"
    );

    Ok(PlannedComponent::new(
        name,
        schema,
        source.defaults.clone(),
        block,
        source.each.clone(),
        registry.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_from_json_use_defaults() {
        let options = CompileOptions::from_json(r#"{ "hydratable": true }"#).unwrap();
        assert!(options.hydratable);
        assert_eq!(options.name, None);

        assert!(matches!(CompileOptions::from_json("{"), Err(Error::Config(_))));
    }

    #[test]
    fn compile_rejects_undeclared_defaults() {
        let source = ComponentSource {
            name: "App".into(),
            fields: vec!["a".into()],
            defaults: [("b".to_string(), json!(1))].into_iter().collect(),
            children: Vec::new(),
            each: Vec::new(),
        };
        let err = compile(&source, &Registry::new(), &CompileOptions::default()).err();
        assert!(matches!(err, Some(Error::UnknownField(name)) if name == "b"));
    }

    #[test]
    fn compile_from_json_source() {
        let registry = Registry::new();
        registry.declare("Child");
        let source = ComponentSource::from_json(
            r#"{
                "name": "App",
                "fields": ["title"],
                "children": [{
                    "descriptor": { "kind": "static", "name": "Child" },
                    "attributes": [
                        { "kind": "named", "name": "title", "value": { "type": "identifier", "name": "title" } }
                    ]
                }]
            }"#,
        )
        .unwrap();

        let planned = compile(&source, &registry, &CompileOptions::default()).unwrap();
        assert_eq!(planned.block().usages().len(), 1);
        assert!(planned.block().render().contains("var child = new Child("));
    }
}
