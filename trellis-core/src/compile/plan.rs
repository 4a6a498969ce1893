//! Composition Planner
//!
//! For each child component usage, decide:
//!
//! - which properties it is constructed with,
//! - which properties go into the patch on each update, and under which
//!   dirty-field guard,
//! - how its bindings write back into the parent,
//! - which events are wired to what,
//! - and, for a dynamically selected child, when to swap instances.
//!
//! The result is a [`UsagePlan`] stored in the block plus statements placed
//! into the block's buckets. Absent attributes, bindings or handlers simply
//! produce fewer statements.
//!
//! # Patch gating
//!
//! A named dynamic attribute is re-sent when its dependencies intersect the
//! dirty set. With spreads, the union `U` of every level's dependencies
//! guards the whole recomputation; within it, a level whose dependencies are
//! a strict subset of `U` is gated on its own dependencies, and every other
//! level (empty or equal to `U`) is recomputed unconditionally.

use indexmap::IndexSet;

use super::ast::{Attribute, ComponentDescriptor, Expr, Handler, InlineComponent};
use super::block::{Block, Bucket, Stmt};
use super::registry::Registry;
use super::scope::{Expression, Scope};
use super::CompileOptions;
use crate::error::{Error, Result};
use crate::runtime::FieldSet;

/// Index of a usage within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsageId(pub usize);

/// Resolved descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Static(String),
    SelfRef,
    Dynamic(Expression),
}

/// Where a usage mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountParent {
    /// The block's own target and anchor.
    Block,
    /// The default slot of another usage.
    Slot(UsageId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributePlan {
    pub name: String,
    pub value: Expression,
}

impl AttributePlan {
    /// Whether the value depends on any field or context.
    pub fn is_dynamic(&self) -> bool {
        !self.value.dependencies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LevelSource {
    /// A named attribute, contributing a one-key object.
    Named(String),
    /// A spread expression.
    Spread,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadLevel {
    pub source: LevelSource,
    pub value: Expression,
    /// Own guard, for levels whose dependencies are a strict subset of the
    /// union. `None` means recompute whenever the union guard passes.
    pub condition: Option<FieldSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadPlan {
    pub levels: Vec<SpreadLevel>,
    pub all_dependencies: IndexSet<String>,
    pub all: FieldSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingPlan {
    /// Property of the child.
    pub name: String,
    /// Parent location.
    pub expression: Expression,
    /// Name of the generated setter.
    pub setter: String,
    /// The location lives inside an iteration context.
    pub contextual: bool,
}

/// Generated local names for one usage.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageNames {
    pub initial_data: String,
    pub changes: String,
    pub updating: String,
    pub levels: String,
    pub switch_value: String,
    pub switch_props: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsagePlan {
    pub id: UsageId,
    pub var: String,
    pub source: Source,
    /// Named attributes, for initial properties without spread.
    pub attributes: Vec<AttributePlan>,
    pub spread: Option<SpreadPlan>,
    pub bindings: Vec<BindingPlan>,
    pub handlers: Vec<Handler>,
    pub reference: Option<String>,
    pub has_slot: bool,
    pub parent: MountParent,
    pub names: UsageNames,
}

impl UsagePlan {
    /// Whether the usage selects its component at run time.
    pub fn is_switch(&self) -> bool {
        matches!(self.source, Source::Dynamic(_))
    }

    /// Named attributes that take part in the update patch.
    pub fn dynamic_attributes(&self) -> impl Iterator<Item = &AttributePlan> {
        self.attributes.iter().filter(|a| a.is_dynamic())
    }

    /// Whether an update computes a patch for this usage.
    pub fn has_updates(&self) -> bool {
        self.spread.is_some()
            || self.dynamic_attributes().next().is_some()
            || !self.bindings.is_empty()
    }

    /// Whether initial properties need to be built.
    pub fn has_props(&self) -> bool {
        !self.attributes.is_empty() || self.spread.is_some() || !self.bindings.is_empty()
    }
}

/// Plans the child usages of one block.
pub struct Planner<'a> {
    scope: Scope<'a>,
    registry: &'a Registry,
    options: &'a CompileOptions,
    component: &'a str,
}

impl<'a> Planner<'a> {
    /// Planner for the usages of `component`.
    pub fn new(
        component: &'a str,
        scope: Scope<'a>,
        registry: &'a Registry,
        options: &'a CompileOptions,
    ) -> Self {
        Self {
            scope,
            registry,
            options,
            component,
        }
    }

    /// Plan a usage that mounts directly into the block.
    pub fn plan(&self, block: &mut Block, node: &InlineComponent) -> Result<UsageId> {
        self.plan_usage(block, node, MountParent::Block)
    }

    fn plan_usage(
        &self,
        block: &mut Block,
        node: &InlineComponent,
        parent: MountParent,
    ) -> Result<UsageId> {
        let source = self.resolve_source(&node.descriptor)?;
        if let Source::Dynamic(selector) = &source {
            block.add_dependencies(&selector.dependencies);
        }

        let base = match &source {
            Source::Static(name) => name.to_lowercase(),
            Source::SelfRef => self.component.to_lowercase(),
            Source::Dynamic(_) => "switch_instance".to_string(),
        };
        let var = block.unique_name(&base);
        let names = UsageNames {
            initial_data: block.unique_name(&format!("{var}_initial_data")),
            changes: block.unique_name(&format!("{var}_changes")),
            updating: block.unique_name(&format!("{var}_updating")),
            levels: block.unique_name(&format!("{var}_spread_levels")),
            switch_value: block.unique_name("switch_value"),
            switch_props: block.unique_name("switch_props"),
        };

        let (attributes, spread) = self.plan_attributes(block, &node.attributes)?;
        let bindings = node
            .bindings
            .iter()
            .map(|binding| self.plan_binding(block, &var, &binding.name, &binding.expression))
            .collect::<Result<Vec<_>>>()?;
        if !bindings.is_empty() {
            block.set_maintain_context();
        }
        block.add_outro();

        let id = block.push_usage(UsagePlan {
            id: UsageId(0),
            var,
            source,
            attributes,
            spread,
            bindings,
            handlers: node.handlers.clone(),
            reference: node.reference.clone(),
            has_slot: !node.children.is_empty(),
            parent,
            names,
        });

        // Slot content is rendered into the same block, ahead of the usage
        // that hosts it.
        for child in &node.children {
            self.plan_usage(block, child, MountParent::Slot(id))?;
        }

        self.emit(block, id);
        let plan = block.usage(id);
        tracing::trace!(
            usage = %plan.var,
            switch = plan.is_switch(),
            bindings = plan.bindings.len(),
            "planned usage"
        );
        Ok(id)
    }

    fn resolve_source(&self, descriptor: &ComponentDescriptor) -> Result<Source> {
        Ok(match descriptor {
            ComponentDescriptor::Static { name } => {
                if name != self.component && !self.registry.contains(name) {
                    return Err(Error::UnresolvedComponent(name.clone()));
                }
                Source::Static(name.clone())
            }
            ComponentDescriptor::SelfRef => Source::SelfRef,
            ComponentDescriptor::Dynamic { expression } => {
                Source::Dynamic(self.scope.resolve(expression)?)
            }
        })
    }

    fn plan_attributes(
        &self,
        block: &mut Block,
        attributes: &[Attribute],
    ) -> Result<(Vec<AttributePlan>, Option<SpreadPlan>)> {
        let mut resolved = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            let value = self.scope.resolve(attribute.expression())?;
            block.add_dependencies(&value.dependencies);
            let source = match attribute {
                Attribute::Named { name, .. } if name.is_empty() => {
                    return Err(Error::InvalidAttribute("named attribute without a name".into()));
                }
                Attribute::Named { name, .. } => LevelSource::Named(name.clone()),
                Attribute::Spread { .. } => LevelSource::Spread,
            };
            resolved.push((source, value));
        }

        if !resolved.iter().any(|(s, _)| *s == LevelSource::Spread) {
            let attributes = resolved
                .into_iter()
                .filter_map(|(source, value)| match source {
                    LevelSource::Named(name) => Some(AttributePlan { name, value }),
                    LevelSource::Spread => None,
                })
                .collect();
            return Ok((attributes, None));
        }

        let mut all_dependencies = IndexSet::new();
        for (_, value) in &resolved {
            all_dependencies.extend(value.dependencies.iter().cloned());
        }
        let all = resolved
            .iter()
            .fold(FieldSet::EMPTY, |acc, (_, value)| acc.union(value.fields));

        let levels = resolved
            .into_iter()
            .map(|(source, value)| {
                let condition = (!value.fields.is_empty() && value.fields.is_strict_subset(all))
                    .then_some(value.fields);
                SpreadLevel {
                    source,
                    value,
                    condition,
                }
            })
            .collect();

        Ok((
            Vec::new(),
            Some(SpreadPlan {
                levels,
                all_dependencies,
                all,
            }),
        ))
    }

    fn plan_binding(
        &self,
        block: &mut Block,
        var: &str,
        name: &str,
        target: &Expr,
    ) -> Result<BindingPlan> {
        let invalid = || Error::InvalidBinding {
            name: name.to_string(),
            snippet: target.snippet(),
        };
        if !target.is_assignable() {
            return Err(invalid());
        }

        let mut root = None;
        target.identifiers(&mut |ident| {
            root.get_or_insert(ident);
        });
        let root = root.ok_or_else(invalid)?;

        let contextual = match self.scope.owner_of(root) {
            Some(position) => {
                let each = &self.scope.each_blocks()[position];
                // An iteration index is not a location.
                if each.context != root || !each.list.is_assignable() {
                    return Err(invalid());
                }
                block.mark_context_binding(&each.context);
                true
            }
            None => false,
        };

        let expression = self.scope.resolve(target)?;
        block.add_dependencies(&expression.dependencies);

        Ok(BindingPlan {
            name: name.to_string(),
            setter: block.unique_name(&format!("{var}_{name}_binding")),
            expression,
            contextual,
        })
    }

    fn emit(&self, block: &mut Block, id: UsageId) {
        let plan = block.usage(id);
        let switch = plan.is_switch();
        let spread = plan.spread.is_some();
        let has_updates = plan.has_updates();

        if spread {
            block.push(Bucket::Init, Stmt::SpreadLevels { usage: id });
        }
        if switch {
            block.push(Bucket::Init, Stmt::SwitchValue { usage: id });
        }
        block.push(Bucket::Init, Stmt::Instantiate { usage: id });

        block.push(Bucket::Create, Stmt::Create { usage: id });
        if self.options.hydratable {
            block.push(Bucket::Claim, Stmt::Claim { usage: id });
        }
        block.push(Bucket::Mount, Stmt::Mount { usage: id });

        if has_updates {
            block.push(Bucket::Update, Stmt::ComputeChanges { usage: id });
        }
        if switch {
            block.push(Bucket::Update, Stmt::Swap { usage: id });
        } else if has_updates {
            block.push(Bucket::Update, Stmt::ApplyChanges { usage: id });
        }

        block.push(Bucket::Destroy, Stmt::Destroy { usage: id });
        block.push(Bucket::Outro, Stmt::Outro { usage: id });
    }
}
