//! Dependency resolution.
//!
//! An [`Expression`] is an [`Expr`] together with the state fields it reads.
//! Identifiers introduced by an enclosing iteration block are *contextual*:
//! they do not name state directly, so the expression depends on whatever the
//! iteration's list depends on instead.

use indexmap::IndexSet;

use super::ast::{EachBlock, Expr};
use crate::error::{Error, Result};
use crate::runtime::{FieldSet, Schema};

/// An expression with its resolved dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub node: Expr,
    /// State fields read, directly or through an iteration list.
    pub dependencies: IndexSet<String>,
    /// Iteration aliases and indices read.
    pub contextual_dependencies: IndexSet<String>,
    /// `dependencies` as a field mask of the owning component.
    pub fields: FieldSet,
}

impl Expression {
    /// Expression text with fields read from `ctx`.
    pub fn snippet(&self) -> String {
        self.node.snippet()
    }

    /// Render a `changed.a || changed.b` guard.
    pub fn changed_guard(&self) -> String {
        changed_guard(&self.dependencies)
    }
}

pub(crate) fn changed_guard(dependencies: &IndexSet<String>) -> String {
    dependencies
        .iter()
        .map(|d| format!("changed.{d}"))
        .collect::<Vec<_>>()
        .join(" || ")
}

/// Fields of the component being compiled plus the iteration blocks
/// enclosing the usages being planned.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    schema: &'a Schema,
    each: &'a [EachBlock],
}

impl<'a> Scope<'a> {
    /// Scope of `schema` inside the iteration blocks `each`.
    pub fn new(schema: &'a Schema, each: &'a [EachBlock]) -> Self {
        Self { schema, each }
    }

    pub fn each_blocks(&self) -> &'a [EachBlock] {
        self.each
    }

    /// The innermost iteration block that introduces `name`, by position.
    pub fn owner_of(&self, name: &str) -> Option<usize> {
        self.each
            .iter()
            .rposition(|e| e.context == name || e.index.as_deref() == Some(name))
    }

    /// Resolve identifiers of `node` into field and context dependencies.
    pub fn resolve(&self, node: &Expr) -> Result<Expression> {
        self.resolve_within(node, self.each.len())
    }

    /// Resolve using only the first `depth` iteration blocks: a block's list
    /// is evaluated in the scope outside of it.
    fn resolve_within(&self, node: &Expr, depth: usize) -> Result<Expression> {
        let mut dependencies = IndexSet::new();
        let mut contextual = IndexSet::new();
        let mut failure = None;

        node.identifiers(&mut |name| {
            if failure.is_some() {
                return;
            }
            let owner = self.each[..depth]
                .iter()
                .rposition(|e| e.context == name || e.index.as_deref() == Some(name));
            match owner {
                Some(position) => {
                    contextual.insert(name.to_string());
                    match self.resolve_within(&self.each[position].list, position) {
                        Ok(list) => {
                            dependencies.extend(list.dependencies);
                            contextual.extend(list.contextual_dependencies);
                        }
                        Err(err) => failure = Some(err),
                    }
                }
                None if self.schema.field(name).is_some() => {
                    dependencies.insert(name.to_string());
                }
                None => failure = Some(Error::UnknownField(name.to_string())),
            }
        });

        if let Some(err) = failure {
            return Err(err);
        }
        let fields = self.schema.set_of(dependencies.iter().map(String::as_str));
        Ok(Expression {
            node: node.clone(),
            dependencies,
            contextual_dependencies: contextual,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_identifiers_are_dependencies() {
        let schema = Schema::new(["a", "b"]).unwrap();
        let scope = Scope::new(&schema, &[]);
        let expr = scope
            .resolve(&Expr::object([("x", Expr::ident("a")), ("y", Expr::ident("b").dot("c"))]))
            .unwrap();

        assert_eq!(expr.dependencies.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(expr.contextual_dependencies.is_empty());
        assert_eq!(expr.fields.len(), 2);
        assert_eq!(expr.changed_guard(), "changed.a || changed.b");
    }

    #[test]
    fn contextual_identifiers_depend_on_the_list() {
        let schema = Schema::new(["rows", "other"]).unwrap();
        let each = [
            EachBlock::new(Expr::ident("rows"), "row"),
            EachBlock::new(Expr::ident("row").dot("cells"), "cell").indexed("j"),
        ];
        let scope = Scope::new(&schema, &each);

        let expr = scope.resolve(&Expr::ident("cell").dot("text")).unwrap();
        assert_eq!(expr.dependencies.iter().collect::<Vec<_>>(), vec!["rows"]);
        assert!(expr.contextual_dependencies.contains("cell"));
        assert!(expr.contextual_dependencies.contains("row"));

        let index = scope.resolve(&Expr::ident("j")).unwrap();
        assert!(index.contextual_dependencies.contains("j"));
        assert_eq!(scope.owner_of("row"), Some(0));
        assert_eq!(scope.owner_of("j"), Some(1));
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        let schema = Schema::new(["a"]).unwrap();
        let scope = Scope::new(&schema, &[]);
        assert!(matches!(
            scope.resolve(&Expr::ident("missing")),
            Err(Error::UnknownField(name)) if name == "missing"
        ));
        assert!(scope.resolve(&Expr::literal(json!(1))).unwrap().dependencies.is_empty());
    }
}
