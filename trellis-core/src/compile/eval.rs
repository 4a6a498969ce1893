//! Expression evaluation and assignment.
//!
//! Generated code evaluates expressions against the parent's state plus the
//! iteration contexts it was instantiated in. An [`EachContext`] is a plain
//! record (alias, list location, index) carried by value, so a binding setter
//! created inside an iteration addresses `list[index]` rather than a captured
//! per-iteration variable.

use super::ast::Expr;
use crate::runtime::{Component, State, Value};

/// One iteration of an enclosing each block.
#[derive(Debug, Clone, PartialEq)]
pub struct EachContext {
    pub context: String,
    pub index_name: Option<String>,
    pub list: Expr,
    pub index: usize,
}

/// One step of a path into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A writable location: a state field plus a path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub root: String,
    pub path: Vec<Segment>,
}

/// What expressions are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub state: &'a State,
    pub contexts: &'a [EachContext],
}

impl<'a> EvalContext<'a> {
    /// Evaluate against `state` inside the given iteration contexts.
    pub fn new(state: &'a State, contexts: &'a [EachContext]) -> Self {
        Self { state, contexts }
    }

    fn outer(&self, depth: usize) -> EvalContext<'a> {
        EvalContext {
            state: self.state,
            contexts: &self.contexts[..depth],
        }
    }

    /// Evaluate `expr`. Missing values evaluate to null.
    pub fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Literal { value } => value.clone(),
            Expr::Identifier { name } => self.lookup(name),
            Expr::Member { object, property } => match self.eval(object) {
                Value::Object(mut map) => map.remove(property).unwrap_or(Value::Null),
                Value::Array(items) => property
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.into_iter().nth(i))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            Expr::Object { entries } => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), self.eval(value)))
                    .collect(),
            ),
        }
    }

    fn lookup(&self, name: &str) -> Value {
        for (depth, each) in self.contexts.iter().enumerate().rev() {
            if each.index_name.as_deref() == Some(name) {
                return Value::from(each.index);
            }
            if each.context == name {
                return match self.outer(depth).eval(&each.list) {
                    Value::Array(mut items) if each.index < items.len() => {
                        items.swap_remove(each.index)
                    }
                    _ => Value::Null,
                };
            }
        }
        self.state.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Resolve an assignable expression to the state location it names.
    pub fn locate(&self, expr: &Expr) -> Option<Location> {
        match expr {
            Expr::Identifier { name } => {
                for (depth, each) in self.contexts.iter().enumerate().rev() {
                    if each.index_name.as_deref() == Some(name) {
                        return None;
                    }
                    if each.context == *name {
                        let mut location = self.outer(depth).locate(&each.list)?;
                        location.path.push(Segment::Index(each.index));
                        return Some(location);
                    }
                }
                Some(Location {
                    root: name.clone(),
                    path: Vec::new(),
                })
            }
            Expr::Member { object, property } => {
                let mut location = self.locate(object)?;
                location.path.push(Segment::Key(property.clone()));
                Some(location)
            }
            _ => None,
        }
    }
}

/// Write `value` at `path` inside `target`, creating intermediate objects
/// for missing keys. Returns false if the path runs through a non-container
/// or past the end of an array.
pub fn assign(target: &mut Value, path: &[Segment], value: Value) -> bool {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return true;
    };
    let next = match first {
        Segment::Key(key) => {
            if target.is_null() {
                *target = Value::Object(Default::default());
            }
            match target {
                Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                _ => return false,
            }
        }
        Segment::Index(index) => match target {
            Value::Array(items) if *index < items.len() => &mut items[*index],
            _ => return false,
        },
    };
    assign(next, rest, value)
}

/// Write `value` to `location` in `component`'s state and mark the root
/// field dirty.
pub fn write_location(component: &Component, location: &Location, value: Value) -> bool {
    let Some(field) = component.schema().field(&location.root) else {
        return false;
    };
    let mut written = false;
    component.write_field(field, |slot| {
        written = assign(slot, &location.path, value);
    });
    if !written {
        tracing::warn!(root = %location.root, path = ?location.path, "binding target not writable");
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Schema;
    use serde_json::json;
    use std::sync::Arc;

    fn state(values: Value) -> State {
        let map = values.as_object().unwrap();
        let schema = Arc::new(Schema::new(map.keys().cloned()).unwrap());
        let mut state = State::new(schema);
        for (k, v) in map {
            let field = state.schema().field(k).unwrap();
            state.set_field(field, v.clone());
        }
        state
    }

    #[test]
    fn evaluates_members_and_objects() {
        let state = state(json!({ "user": { "name": "ada" }, "n": 2 }));
        let cx = EvalContext::new(&state, &[]);

        assert_eq!(cx.eval(&Expr::ident("user").dot("name")), json!("ada"));
        assert_eq!(cx.eval(&Expr::ident("user").dot("missing")), Value::Null);
        assert_eq!(
            cx.eval(&Expr::object([("count", Expr::ident("n"))])),
            json!({ "count": 2 })
        );
    }

    #[test]
    fn iteration_aliases_resolve_through_the_list() {
        let state = state(json!({ "todos": [{ "done": false }, { "done": true }] }));
        let contexts = [EachContext {
            context: "todo".into(),
            index_name: Some("i".into()),
            list: Expr::ident("todos"),
            index: 1,
        }];
        let cx = EvalContext::new(&state, &contexts);

        assert_eq!(cx.eval(&Expr::ident("todo").dot("done")), json!(true));
        assert_eq!(cx.eval(&Expr::ident("i")), json!(1));
        assert_eq!(
            cx.locate(&Expr::ident("todo").dot("done")),
            Some(Location {
                root: "todos".into(),
                path: vec![Segment::Index(1), Segment::Key("done".into())],
            })
        );
        assert_eq!(cx.locate(&Expr::ident("i")), None);
    }

    #[test]
    fn assign_creates_missing_keys_but_not_indices() {
        let mut value = json!({ "items": [1, 2] });
        let path = [Segment::Key("a".into()), Segment::Key("b".into())];
        assert!(assign(&mut value, &path, json!(3)));
        assert_eq!(value["a"]["b"], json!(3));

        assert!(assign(&mut value, &[Segment::Key("items".into()), Segment::Index(1)], json!(9)));
        assert_eq!(value["items"], json!([1, 9]));
        assert!(!assign(&mut value, &[Segment::Key("items".into()), Segment::Index(5)], json!(0)));
    }
}
