//! Render Blocks
//!
//! A [`Block`] is the unit of generated view code: named statement buckets
//! for each lifecycle phase plus the usage plans the statements refer to.
//! Statements are typed ([`Stmt`]) and executed by
//! [`BlockFragment`](super::exec::BlockFragment); [`Block::render`] prints
//! them as readable pseudo-code for inspection and snapshot tests.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use indexmap::{IndexMap, IndexSet};

use super::ast::EachBlock;
use super::plan::{LevelSource, MountParent, Source, UsageId, UsagePlan};
use super::scope::changed_guard;

/// Lifecycle phase a statement runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Init,
    Create,
    Claim,
    Mount,
    Update,
    Destroy,
    Outro,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::Init,
        Bucket::Create,
        Bucket::Claim,
        Bucket::Mount,
        Bucket::Update,
        Bucket::Destroy,
        Bucket::Outro,
    ];

    fn label(self) -> &'static str {
        match self {
            Bucket::Init => "init",
            Bucket::Create => "create",
            Bucket::Claim => "claim",
            Bucket::Mount => "mount",
            Bucket::Update => "update",
            Bucket::Destroy => "destroy",
            Bucket::Outro => "outro",
        }
    }
}

/// One generated statement, always about a single usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stmt {
    /// Evaluate the spread levels.
    SpreadLevels { usage: UsageId },
    /// Evaluate the selector.
    SwitchValue { usage: UsageId },
    /// Build initial properties, construct, wire bindings, handlers and
    /// the reference.
    Instantiate { usage: UsageId },
    Create { usage: UsageId },
    Claim { usage: UsageId },
    Mount { usage: UsageId },
    /// Compute the property patch from the dirty set.
    ComputeChanges { usage: UsageId },
    /// Re-evaluate the selector and replace the instance when it changed;
    /// otherwise apply the patch.
    Swap { usage: UsageId },
    /// Apply the patch and reset binding suppression.
    ApplyChanges { usage: UsageId },
    Destroy { usage: UsageId },
    Outro { usage: UsageId },
}

impl Stmt {
    /// The usage a statement belongs to.
    pub fn usage(&self) -> UsageId {
        match *self {
            Stmt::SpreadLevels { usage }
            | Stmt::SwitchValue { usage }
            | Stmt::Instantiate { usage }
            | Stmt::Create { usage }
            | Stmt::Claim { usage }
            | Stmt::Mount { usage }
            | Stmt::ComputeChanges { usage }
            | Stmt::Swap { usage }
            | Stmt::ApplyChanges { usage }
            | Stmt::Destroy { usage }
            | Stmt::Outro { usage } => usage,
        }
    }
}

/// An iteration variable that usages of this block may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOwner {
    pub context: String,
    /// Some usage binds to a location through this variable.
    pub has_binding: bool,
}

#[derive(Debug, Clone)]
pub struct Block {
    name: String,
    buckets: IndexMap<Bucket, Vec<Stmt>>,
    usages: Vec<UsagePlan>,
    names: HashMap<String, usize>,
    dependencies: IndexSet<String>,
    context_owners: Vec<ContextOwner>,
    has_outros: bool,
    maintain_context: bool,
}

impl Block {
    /// Create an empty block.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buckets: Bucket::ALL.iter().map(|b| (*b, Vec::new())).collect(),
            usages: Vec::new(),
            names: HashMap::new(),
            dependencies: IndexSet::new(),
            context_owners: Vec::new(),
            has_outros: false,
            maintain_context: false,
        }
    }

    /// A block rendered once per iteration of `each`.
    pub fn for_each(name: impl Into<String>, each: &[EachBlock]) -> Self {
        let mut block = Self::new(name);
        block.context_owners = each
            .iter()
            .map(|e| ContextOwner {
                context: e.context.clone(),
                has_binding: false,
            })
            .collect();
        block
    }

    /// Name of the component the block renders.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reserve a local name, suffixing `_1`, `_2`, ... on collision.
    pub fn unique_name(&mut self, base: &str) -> String {
        let count = self.names.entry(base.to_string()).or_insert(0);
        let name = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        name
    }

    pub(crate) fn push_usage(&mut self, mut plan: UsagePlan) -> UsageId {
        let id = UsageId(self.usages.len());
        plan.id = id;
        self.usages.push(plan);
        id
    }

    /// Plan of a usage by id.
    pub fn usage(&self, id: UsageId) -> &UsagePlan {
        &self.usages[id.0]
    }

    /// All usage plans, in planning order.
    pub fn usages(&self) -> &[UsagePlan] {
        &self.usages
    }

    pub(crate) fn push(&mut self, bucket: Bucket, stmt: Stmt) {
        self.buckets.entry(bucket).or_default().push(stmt);
    }

    /// Statements of one bucket, in emission order.
    pub fn statements(&self, bucket: Bucket) -> &[Stmt] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record dependencies of a usage on the block.
    pub fn add_dependencies(&mut self, dependencies: &IndexSet<String>) {
        self.dependencies.extend(dependencies.iter().cloned());
    }

    /// State fields any statement in this block reads.
    pub fn dependencies(&self) -> &IndexSet<String> {
        &self.dependencies
    }

    pub(crate) fn mark_context_binding(&mut self, context: &str) {
        if let Some(owner) = self.context_owners.iter_mut().find(|o| o.context == context) {
            owner.has_binding = true;
        }
    }

    /// Whether a contextual binding writes through iteration `context`.
    pub fn context_has_binding(&self, context: &str) -> bool {
        self.context_owners
            .iter()
            .any(|o| o.context == context && o.has_binding)
    }

    /// Iteration blocks that introduce a context, with their binding flags.
    pub fn context_owners(&self) -> &[ContextOwner] {
        &self.context_owners
    }

    pub(crate) fn add_outro(&mut self) {
        self.has_outros = true;
    }

    /// Whether any usage can play an outro.
    pub fn has_outros(&self) -> bool {
        self.has_outros
    }

    pub(crate) fn set_maintain_context(&mut self) {
        self.maintain_context = true;
    }

    /// Whether the iteration context must be kept current for setters.
    pub fn maintains_context(&self) -> bool {
        self.maintain_context
    }

    /// Print every non-empty bucket as pseudo-code.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn render_stmt(&self, out: &mut String, stmt: Stmt) -> fmt::Result {
        let plan = self.usage(stmt.usage());
        let var = &plan.var;
        let n = &plan.names;
        match stmt {
            Stmt::SpreadLevels { .. } => {
                let spread = plan.spread.as_ref().ok_or(fmt::Error)?;
                writeln!(out, "var {} = [", n.levels)?;
                for level in &spread.levels {
                    match &level.source {
                        LevelSource::Named(name) => {
                            writeln!(out, "\t{{ {name}: {} }},", level.value.snippet())?
                        }
                        LevelSource::Spread => writeln!(out, "\t{},", level.value.snippet())?,
                    }
                }
                writeln!(out, "];")?;
            }
            Stmt::SwitchValue { .. } => {
                if let Source::Dynamic(selector) = &plan.source {
                    writeln!(out, "var {} = {};", n.switch_value, selector.snippet())?;
                }
            }
            Stmt::Instantiate { .. } => self.render_instantiate(out, plan)?,
            Stmt::Create { .. } => self.guarded(out, plan, &format!("{var}._fragment.c();"))?,
            Stmt::Claim { .. } => {
                self.guarded(out, plan, &format!("{var}._fragment.l(nodes);"))?
            }
            Stmt::Mount { .. } => {
                let (target, anchor) = match plan.parent {
                    MountParent::Block => ("#target".to_string(), "anchor"),
                    MountParent::Slot(host) => {
                        (format!("{}._slotted.default", self.usage(host).var), "null")
                    }
                };
                if plan.is_switch() {
                    writeln!(out, "var {var}_anchor = createComment();")?;
                    writeln!(out, "insert({target}, {var}_anchor, {anchor});")?;
                    self.guarded(out, plan, &format!("{var}._mount({target}, {var}_anchor);"))?;
                } else {
                    writeln!(out, "{var}._mount({target}, {anchor});")?;
                }
            }
            Stmt::ComputeChanges { .. } => self.render_changes(out, plan)?,
            Stmt::ApplyChanges { .. } => {
                writeln!(out, "{var}._set({});", n.changes)?;
                if !plan.bindings.is_empty() {
                    writeln!(out, "{} = {{}};", n.updating)?;
                }
            }
            Stmt::Swap { .. } => self.render_swap(out, plan)?,
            Stmt::Destroy { .. } => {
                let detach = match plan.parent {
                    MountParent::Block => "detach",
                    MountParent::Slot(_) => "false",
                };
                if plan.reference.is_some() {
                    self.render_ref_clear(out, plan)?;
                }
                self.guarded(out, plan, &format!("{var}.destroy({detach});"))?;
            }
            Stmt::Outro { .. } => {
                self.guarded(out, plan, &format!("{var}._fragment.o(outrocallback);"))?
            }
        }
        Ok(())
    }

    fn guarded(&self, out: &mut String, plan: &UsagePlan, line: &str) -> fmt::Result {
        if plan.is_switch() {
            writeln!(out, "if ({}) {line}", plan.var)
        } else {
            writeln!(out, "{line}")
        }
    }

    fn render_props(&self, out: &mut String, plan: &UsagePlan, indent: &str) -> fmt::Result {
        let n = &plan.names;
        if plan.spread.is_some() {
            writeln!(out, "{indent}var {} = {{}};", n.initial_data)?;
            writeln!(
                out,
                "{indent}for (var i = 0; i < {levels}.length; i += 1) {data} = assign({data}, {levels}[i]);",
                levels = n.levels,
                data = n.initial_data
            )?;
        } else {
            let fields: Vec<String> = plan
                .attributes
                .iter()
                .map(|a| format!("{}: {}", a.name, a.value.snippet()))
                .collect();
            writeln!(out, "{indent}var {} = {{ {} }};", n.initial_data, fields.join(", "))?;
        }
        for binding in &plan.bindings {
            writeln!(
                out,
                "{indent}if ({value} !== void 0) {{ {data}.{name} = {value}; {updating}.{name} = true; }}",
                value = binding.expression.snippet(),
                data = n.initial_data,
                name = binding.name,
                updating = n.updating
            )?;
        }
        Ok(())
    }

    fn render_instantiate(&self, out: &mut String, plan: &UsagePlan) -> fmt::Result {
        let var = &plan.var;
        let n = &plan.names;
        let constructor = match &plan.source {
            Source::Static(name) => name.clone(),
            Source::SelfRef => self.name.clone(),
            Source::Dynamic(_) => n.switch_value.clone(),
        };
        let slots = if plan.has_slot {
            ", slots: { default: createFragment() }"
        } else {
            ""
        };
        let data = if plan.has_props() {
            n.initial_data.as_str()
        } else {
            "{}"
        };

        if !plan.bindings.is_empty() {
            writeln!(out, "var {} = {{}};", n.updating)?;
        }
        for binding in &plan.bindings {
            let target = binding.expression.snippet();
            let lhs = if binding.contextual {
                format!("{target} /* via list[index] */")
            } else {
                target
            };
            writeln!(
                out,
                "function {}(value) {{ {}.{} = true; {lhs} = value; #component._mark({}); }}",
                binding.setter,
                n.updating,
                binding.name,
                binding.expression.dependencies.iter().cloned().collect::<Vec<_>>().join(", ")
            )?;
        }

        let (open, indent) = if plan.is_switch() {
            writeln!(out, "function {}(ctx) {{", n.switch_props)?;
            if plan.has_props() {
                self.render_props(out, plan, "\t")?;
            }
            writeln!(out, "\treturn {{ props: {data}{slots} }};")?;
            writeln!(out, "}}")?;
            writeln!(out, "if ({}) {{", n.switch_value)?;
            writeln!(out, "\tvar {var} = new {constructor}({}(ctx));", n.switch_props)?;
            (true, "\t")
        } else {
            if plan.has_props() {
                self.render_props(out, plan, "")?;
            }
            writeln!(out, "var {var} = new {constructor}({{ props: {data}{slots} }});")?;
            (false, "")
        };

        self.render_wiring(out, plan, indent)?;
        if open {
            writeln!(out, "}}")?;
        }
        Ok(())
    }

    fn render_wiring(&self, out: &mut String, plan: &UsagePlan, indent: &str) -> fmt::Result {
        let var = &plan.var;
        for binding in &plan.bindings {
            writeln!(out, "{indent}{var}.bind(\"{}\", {});", binding.name, binding.setter)?;
        }
        for handler in &plan.handlers {
            match &handler.method {
                Some(method) => writeln!(
                    out,
                    "{indent}{var}.on(\"{}\", function(event) {{ #component.{method}(event); }});",
                    handler.event
                )?,
                None => writeln!(
                    out,
                    "{indent}{var}.on(\"{0}\", function(event) {{ #component.fire(\"{0}\", event); }});",
                    handler.event
                )?,
            }
        }
        if let Some(reference) = &plan.reference {
            writeln!(out, "{indent}#component.refs.{reference} = {var};")?;
        }
        Ok(())
    }

    fn render_ref_clear(&self, out: &mut String, plan: &UsagePlan) -> fmt::Result {
        if let Some(reference) = &plan.reference {
            writeln!(
                out,
                "if (#component.refs.{reference} === {var}) #component.refs.{reference} = null;",
                var = plan.var
            )?;
        }
        Ok(())
    }

    fn render_changes(&self, out: &mut String, plan: &UsagePlan) -> fmt::Result {
        let n = &plan.names;
        match &plan.spread {
            Some(spread) => {
                writeln!(
                    out,
                    "var {} = ({}) ? getSpreadUpdate({}, [",
                    n.changes,
                    changed_guard(&spread.all_dependencies),
                    n.levels
                )?;
                for level in &spread.levels {
                    let value = match &level.source {
                        LevelSource::Named(name) => {
                            format!("{{ {name}: {} }}", level.value.snippet())
                        }
                        LevelSource::Spread => level.value.snippet(),
                    };
                    match level.condition {
                        Some(_) => {
                            writeln!(out, "\t({}) && {value},", level.value.changed_guard())?
                        }
                        None => writeln!(out, "\t{value},")?,
                    }
                }
                writeln!(out, "]) : {{}};")?;
            }
            None => {
                writeln!(out, "var {} = {{}};", n.changes)?;
                for attribute in plan.dynamic_attributes() {
                    writeln!(
                        out,
                        "if ({}) {}.{} = {};",
                        attribute.value.changed_guard(),
                        n.changes,
                        attribute.name,
                        attribute.value.snippet()
                    )?;
                }
            }
        }
        for binding in &plan.bindings {
            let guard = binding.expression.changed_guard();
            writeln!(
                out,
                "if (!{updating}.{name} && {guard}) {{ {changes}.{name} = {value}; {updating}.{name} = {value} !== void 0; }}",
                updating = n.updating,
                name = binding.name,
                changes = n.changes,
                value = binding.expression.snippet()
            )?;
        }
        Ok(())
    }

    fn render_swap(&self, out: &mut String, plan: &UsagePlan) -> fmt::Result {
        let var = &plan.var;
        let n = &plan.names;
        let Source::Dynamic(selector) = &plan.source else {
            return Err(fmt::Error);
        };
        writeln!(
            out,
            "if ({} !== ({} = {})) {{",
            n.switch_value,
            n.switch_value,
            selector.snippet()
        )?;
        writeln!(out, "\tconst old_component = {var};")?;
        writeln!(out, "\tif (old_component) {{")?;
        writeln!(out, "\t\tgroupOutros();")?;
        writeln!(out, "\t\told_component._fragment.o(() => {{ old_component.destroy(); }});")?;
        writeln!(out, "\t}}")?;
        writeln!(out, "\tif ({}) {{", n.switch_value)?;
        writeln!(out, "\t\t{var} = new {}({}(ctx));", n.switch_value, n.switch_props)?;
        self.render_wiring(out, plan, "\t\t")?;
        writeln!(out, "\t\t{var}._fragment.c();")?;
        if plan.has_slot {
            writeln!(
                out,
                "\t\tslot_nodes.forEach(node => {var}._slotted.default.appendChild(node));"
            )?;
        }
        writeln!(out, "\t\t{var}._mount({var}_anchor.parentNode, {var}_anchor);")?;
        writeln!(out, "\t}} else {{")?;
        writeln!(out, "\t\t{var} = null;")?;
        if let Some(reference) = &plan.reference {
            writeln!(
                out,
                "\t\tif (#component.refs.{reference} === old_component) #component.refs.{reference} = null;"
            )?;
        }
        writeln!(out, "\t}}")?;
        if plan.has_updates() {
            writeln!(out, "}} else if ({var}) {{")?;
            writeln!(out, "\t{var}._set({});", n.changes)?;
            if !plan.bindings.is_empty() {
                writeln!(out, "\t{} = {{}};", n.updating)?;
            }
        }
        writeln!(out, "}}")
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// {}", self.name)?;
        for bucket in Bucket::ALL {
            let statements = self.statements(bucket);
            if statements.is_empty() {
                continue;
            }
            writeln!(f, "[{}]", bucket.label())?;
            let mut body = String::new();
            for stmt in statements {
                self.render_stmt(&mut body, *stmt)?;
            }
            f.write_str(&body)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ast::{Attribute, Binding, Expr, Handler, InlineComponent};
    use crate::compile::plan::Planner;
    use crate::compile::registry::Registry;
    use crate::compile::scope::Scope;
    use crate::compile::CompileOptions;
    use crate::runtime::Schema;

    fn render(node: InlineComponent, hydratable: bool) -> String {
        let schema = Schema::new(["a", "text", "view"]).unwrap();
        let registry = Registry::new();
        registry.declare("Foo");
        let options = CompileOptions {
            hydratable,
            ..CompileOptions::default()
        };
        let planner = Planner::new("App", Scope::new(&schema, &[]), &registry, &options);
        let mut block = Block::new("App");
        planner.plan(&mut block, &node).unwrap();
        block.render()
    }

    #[test]
    fn unique_names_are_suffixed() {
        let mut block = Block::new("App");
        assert_eq!(block.unique_name("foo"), "foo");
        assert_eq!(block.unique_name("foo"), "foo_1");
        assert_eq!(block.unique_name("foo"), "foo_2");
        assert_eq!(block.unique_name("bar"), "bar");
    }

    #[test]
    fn renders_static_usage_with_binding() {
        let out = render(
            InlineComponent::named("Foo")
                .attr(Attribute::named("a", Expr::ident("a")))
                .bind(Binding::new("value", Expr::ident("text")))
                .on(Handler::forward("close")),
            false,
        );

        assert!(out.contains("var foo_initial_data = { a: ctx.a };"));
        assert!(out.contains("var foo = new Foo({ props: foo_initial_data });"));
        assert!(out.contains("foo.bind(\"value\", foo_value_binding);"));
        assert!(out.contains("#component.fire(\"close\", event)"));
        assert!(out.contains("if (changed.a) foo_changes.a = ctx.a;"));
        assert!(out.contains("foo._set(foo_changes);\nfoo_updating = {};"));
        assert!(!out.contains("[claim]"));
    }

    #[test]
    fn renders_switch_guards_and_claim() {
        let out = render(InlineComponent::switch(Expr::ident("view")), true);

        assert!(out.contains("var switch_value = ctx.view;"));
        assert!(out.contains("if (switch_instance) switch_instance._fragment.c();"));
        assert!(out.contains("if (switch_instance) switch_instance._fragment.l(nodes);"));
        assert!(out.contains("old_component._fragment.o(() => { old_component.destroy(); });"));
        assert!(!out.contains("_set("));
    }

    #[test]
    fn swap_declares_old_component_for_both_branches() {
        let out = render(
            InlineComponent::switch(Expr::ident("view")).reference("current"),
            false,
        );

        let declared = out
            .find("\tconst old_component = switch_instance;\n\tif (old_component) {")
            .unwrap();
        let cleared = out
            .find("if (#component.refs.current === old_component)")
            .unwrap();
        assert!(declared < cleared);
        assert_eq!(out.matches("const old_component").count(), 1);
    }
}
