//! Input Tree
//!
//! Typed nodes handed to the planner by the template parser. The tree is
//! serde-deserializable so build tooling can pass it as JSON.

use serde::{Deserialize, Serialize};

use crate::runtime::{Props, Value};

/// An expression in a template, in a small assignable-location friendly form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    /// A constant.
    Literal { value: Value },
    /// A state field, an iteration alias or an iteration index.
    Identifier { name: String },
    /// `object.property`
    Member { object: Box<Expr>, property: String },
    /// `{ key: expr, ... }`
    Object { entries: Vec<(String, Expr)> },
}

impl Expr {
    /// A constant value.
    pub fn literal(value: Value) -> Self {
        Expr::Literal { value }
    }

    /// A reference to a field or iteration context.
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    /// `self.property`
    pub fn dot(self, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(self),
            property: property.into(),
        }
    }

    /// An object literal.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Expr)>,
        K: Into<String>,
    {
        Expr::Object {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Visit every identifier in evaluation order.
    pub fn identifiers<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Literal { .. } => {}
            Expr::Identifier { name } => visit(name),
            Expr::Member { object, .. } => object.identifiers(visit),
            Expr::Object { entries } => {
                for (_, value) in entries {
                    value.identifiers(visit);
                }
            }
        }
    }

    /// Whether this expression names a location that can be assigned to:
    /// an identifier, or a member chain rooted at one.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Identifier { .. } => true,
            Expr::Member { object, .. } => object.is_assignable(),
            _ => false,
        }
    }

    /// Source-like rendering used in generated output.
    pub fn snippet(&self) -> String {
        match self {
            Expr::Literal { value } => value.to_string(),
            Expr::Identifier { name } => format!("ctx.{name}"),
            Expr::Member { object, property } => format!("{}.{property}", object.snippet()),
            Expr::Object { entries } => {
                let fields: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.snippet()))
                    .collect();
                format!("{{ {} }}", fields.join(", "))
            }
        }
    }
}

/// A property passed to a child component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Attribute {
    /// `name={value}`; a literal value makes a static attribute.
    Named { name: String, value: Expr },
    /// `{...expression}`
    Spread { expression: Expr },
}

impl Attribute {
    /// `name={value}`.
    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Attribute::Named {
            name: name.into(),
            value,
        }
    }

    /// `{...expression}`.
    pub fn spread(expression: Expr) -> Self {
        Attribute::Spread { expression }
    }

    /// The value expression of the attribute.
    pub fn expression(&self) -> &Expr {
        match self {
            Attribute::Named { value, .. } => value,
            Attribute::Spread { expression } => expression,
        }
    }

    pub fn is_spread(&self) -> bool {
        matches!(self, Attribute::Spread { .. })
    }
}

/// `bind:name={expression}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub expression: Expr,
}

impl Binding {
    pub fn new(name: impl Into<String>, expression: Expr) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

/// `on:event={method}`; without a method the event is forwarded to the
/// parent's own listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    pub event: String,
    #[serde(default)]
    pub method: Option<String>,
}

impl Handler {
    pub fn call(event: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            method: Some(method.into()),
        }
    }

    pub fn forward(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            method: None,
        }
    }
}

/// Which implementation a usage site instantiates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ComponentDescriptor {
    /// A registered component, fixed at compile time.
    Static { name: String },
    /// The component being compiled.
    SelfRef,
    /// Re-evaluated on every update; evaluates to a registered component
    /// name, or null for nothing.
    Dynamic { expression: Expr },
}

/// A child component usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineComponent {
    pub descriptor: ComponentDescriptor,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default)]
    pub handlers: Vec<Handler>,
    /// Content for the default slot.
    #[serde(default)]
    pub children: Vec<InlineComponent>,
    /// Name under which the parent keeps a reference to the instance.
    #[serde(default)]
    pub reference: Option<String>,
}

impl InlineComponent {
    /// A usage with no attributes, bindings or handlers.
    pub fn new(descriptor: ComponentDescriptor) -> Self {
        Self {
            descriptor,
            attributes: Vec::new(),
            bindings: Vec::new(),
            handlers: Vec::new(),
            children: Vec::new(),
            reference: None,
        }
    }

    /// A usage of a registered component.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(ComponentDescriptor::Static { name: name.into() })
    }

    /// A recursive usage of the component being compiled.
    pub fn self_ref() -> Self {
        Self::new(ComponentDescriptor::SelfRef)
    }

    /// A usage whose component is selected at run time.
    pub fn switch(expression: Expr) -> Self {
        Self::new(ComponentDescriptor::Dynamic { expression })
    }

    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn on(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Add content for the default slot.
    pub fn child(mut self, child: InlineComponent) -> Self {
        self.children.push(child);
        self
    }

    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.reference = Some(name.into());
        self
    }
}

/// An iteration block enclosing the usages being planned:
/// `{#each list as context, index}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EachBlock {
    pub list: Expr,
    pub context: String,
    #[serde(default)]
    pub index: Option<String>,
}

impl EachBlock {
    /// `{#each list as context}`.
    pub fn new(list: Expr, context: impl Into<String>) -> Self {
        Self {
            list,
            context: context.into(),
            index: None,
        }
    }

    pub fn indexed(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }
}

/// A component to compile: its fields, their defaults, and the child
/// usages of its template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSource {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub defaults: Props,
    #[serde(default)]
    pub children: Vec<InlineComponent>,
    /// Iteration blocks enclosing `children`, outermost first.
    #[serde(default)]
    pub each: Vec<EachBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_usage_from_json() {
        let usage: InlineComponent = serde_json::from_value(json!({
            "descriptor": { "kind": "dynamic", "expression": { "type": "identifier", "name": "view" } },
            "attributes": [
                { "kind": "named", "name": "title", "value": { "type": "literal", "value": "hi" } },
                { "kind": "spread", "expression": { "type": "identifier", "name": "rest" } }
            ],
            "bindings": [ { "name": "value", "expression": { "type": "identifier", "name": "text" } } ],
            "handlers": [ { "event": "close" } ],
            "reference": "current"
        }))
        .unwrap();

        assert!(matches!(usage.descriptor, ComponentDescriptor::Dynamic { .. }));
        assert_eq!(usage.attributes.len(), 2);
        assert!(usage.attributes[1].is_spread());
        assert_eq!(usage.handlers[0], Handler::forward("close"));
        assert_eq!(usage.reference.as_deref(), Some("current"));
    }

    #[test]
    fn assignable_locations() {
        assert!(Expr::ident("a").is_assignable());
        assert!(Expr::ident("a").dot("b").dot("c").is_assignable());
        assert!(!Expr::literal(json!(1)).is_assignable());
        assert!(!Expr::literal(json!({})).dot("x").is_assignable());
    }

    #[test]
    fn snippet_rendering() {
        let expr = Expr::object([("a", Expr::ident("x").dot("y")), ("b", Expr::literal(json!(2)))]);
        assert_eq!(expr.snippet(), "{ a: ctx.x.y, b: 2 }");
    }
}
