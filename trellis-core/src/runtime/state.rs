//! Component State
//!
//! A component's state is a fixed list of declared fields. The [`Schema`]
//! maps field names to [`FieldId`]s once, when the component definition is
//! built; afterwards state is addressed by id and dirtiness is a bitmask.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::dirty::{FieldId, FieldSet, MAX_FIELDS};
use crate::error::{Error, Result};

/// Dynamic value stored in component state and passed as properties.
pub type Value = serde_json::Value;

/// Property name to value, in insertion order. Used for `set_props` and for
/// initial properties.
pub type Props = IndexMap<String, Value>;

/// Ordered field declarations for one component type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: IndexSet<String>,
}

impl Schema {
    /// Declare the fields of a component, in order.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: IndexSet<String> = fields.into_iter().map(Into::into).collect();
        if fields.len() > MAX_FIELDS {
            return Err(Error::TooManyFields {
                count: fields.len(),
                max: MAX_FIELDS,
            });
        }
        Ok(Self { fields })
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<FieldId> {
        self.fields.get_index_of(name).map(FieldId::new)
    }

    /// Look up a field by name, failing if it is not declared.
    pub fn require(&self, name: &str) -> Result<FieldId> {
        self.field(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Name of a field.
    pub fn name(&self, field: FieldId) -> &str {
        &self.fields[field.index()]
    }

    /// Resolve a set of names into a field set, skipping undeclared names.
    pub fn set_of<'a, I>(&self, names: I) -> FieldSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().filter_map(|n| self.field(n)).collect()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

/// Current values of every declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl State {
    /// All fields start out null.
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Null; schema.len()];
        Self { schema, values }
    }

    /// Schema this state was built for.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value of a field.
    pub fn get_field(&self, field: FieldId) -> &Value {
        &self.values[field.index()]
    }

    /// Read a field by name. Undeclared names read as `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.field(name).map(|f| self.get_field(f))
    }

    /// Overwrite a field.
    pub fn set_field(&mut self, field: FieldId, value: Value) {
        self.values[field.index()] = value;
    }

    /// Mutable access to a field's value.
    pub fn field_mut(&mut self, field: FieldId) -> &mut Value {
        &mut self.values[field.index()]
    }

    /// Merge properties into state. Returns the fields that were written;
    /// names the schema does not declare are skipped.
    pub fn inject(&mut self, props: &Props) -> FieldSet {
        let mut written = FieldSet::new();
        for (name, value) in props {
            match self.schema.field(name) {
                Some(field) => {
                    self.set_field(field, value.clone());
                    written.insert(field);
                }
                None => {
                    tracing::debug!(prop = %name, "ignoring undeclared property");
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_rejects_oversized_declarations() {
        let names: Vec<String> = (0..65).map(|i| format!("f{i}")).collect();
        assert!(matches!(
            Schema::new(names),
            Err(Error::TooManyFields { count: 65, max: 64 })
        ));
    }

    #[test]
    fn inject_writes_declared_fields_only() {
        let schema = Arc::new(Schema::new(["count", "label"]).unwrap());
        let mut state = State::new(schema.clone());

        let mut props = Props::new();
        props.insert("count".into(), json!(3));
        props.insert("bogus".into(), json!(true));

        let written = state.inject(&props);
        assert_eq!(written.len(), 1);
        assert!(written.contains(schema.field("count").unwrap()));
        assert_eq!(state.get("count"), Some(&json!(3)));
        assert_eq!(state.get("label"), Some(&Value::Null));
        assert_eq!(state.get("bogus"), None);
    }
}
