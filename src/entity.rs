//! Runtime entities and the fetch policy bounding relation hydration.

use crate::config::TableDescriptor;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which relations to hydrate, and how deep.
///
/// `Everything` hydrates every relation of the entity it is applied to; each
/// hydrated child then gets `Nothing`. Going deeper takes a nested `Fields`
/// map. There is no cycle detection: the policy itself is the depth bound.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FetchPolicy {
    #[default]
    Nothing,
    Everything,
    /// Relation name (field name, or the alias of a one-to-one) -> child policy.
    Fields(BTreeMap<String, FetchPolicy>),
}

static NOTHING: FetchPolicy = FetchPolicy::Nothing;

impl FetchPolicy {
    /// `false`/`null` -> nothing, `true` -> everything, object -> per relation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(true) => FetchPolicy::Everything,
            Value::Object(map) => FetchPolicy::Fields(
                map.iter()
                    .map(|(k, v)| (k.clone(), FetchPolicy::from_json(v)))
                    .collect(),
            ),
            _ => FetchPolicy::Nothing,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, FetchPolicy::Nothing)
    }

    /// Policy for the children of relation `name`, or `None` when the
    /// relation is not to be fetched at all.
    ///
    /// `true` under a relation name fetches that relation only; its own
    /// relations stay unhydrated. A nested object is passed down as is.
    pub fn for_relation(&self, name: &str) -> Option<&FetchPolicy> {
        match self {
            FetchPolicy::Nothing => None,
            FetchPolicy::Everything => Some(&NOTHING),
            FetchPolicy::Fields(map) => match map.get(name)? {
                FetchPolicy::Nothing => None,
                FetchPolicy::Everything => Some(&NOTHING),
                nested @ FetchPolicy::Fields(_) => Some(nested),
            },
        }
    }

    /// Shorthand for `{ name: Everything }`.
    pub fn only(name: &str) -> Self {
        FetchPolicy::Fields(BTreeMap::from([(name.to_string(), FetchPolicy::Everything)]))
    }
}

/// Hydrated value of one relation slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Related {
    /// One-to-one; `None` when the foreign value is null or matches nothing.
    One(Option<Box<Entity>>),
    /// One-to-many and many-to-many.
    Many(Vec<Entity>),
}

/// One record of a table plus the relations hydrated onto it.
///
/// Hydrated sub-entities are owned by this entity; hydration always builds
/// fresh children, never shared references.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    table: Arc<TableDescriptor>,
    values: Map<String, Value>,
    related: BTreeMap<String, Related>,
}

impl Entity {
    pub fn new(table: Arc<TableDescriptor>, values: Map<String, Value>) -> Self {
        Entity {
            table,
            values,
            related: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &Arc<TableDescriptor> {
        &self.table
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.values
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Primary key value, absent when missing or null.
    pub fn primary_value(&self) -> Option<&Value> {
        self.values
            .get(self.table.primary_key())
            .filter(|v| !v.is_null())
    }

    pub fn set_related(&mut self, name: &str, related: Related) {
        self.related.insert(name.to_string(), related);
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    pub fn is_hydrated(&self, name: &str) -> bool {
        self.related.contains_key(name)
    }

    pub fn hydrated_count(&self) -> usize {
        self.related.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn policy_from_json() {
        assert_eq!(FetchPolicy::from_json(&json!(false)), FetchPolicy::Nothing);
        assert_eq!(FetchPolicy::from_json(&json!(null)), FetchPolicy::Nothing);
        assert_eq!(FetchPolicy::from_json(&json!(true)), FetchPolicy::Everything);
        let nested = FetchPolicy::from_json(&json!({ "author": { "company": true }, "tags": false }));
        assert_eq!(
            nested.for_relation("author"),
            Some(&FetchPolicy::only("company"))
        );
        assert_eq!(nested.for_relation("tags"), None);
        assert_eq!(nested.for_relation("comments"), None);
    }

    #[test]
    fn everything_goes_one_level() {
        let child = FetchPolicy::Everything.for_relation("anything").unwrap();
        assert!(child.is_nothing());
        assert_eq!(child.for_relation("deeper"), None);

        let only = FetchPolicy::only("author");
        let child = only.for_relation("author").unwrap();
        assert!(child.is_nothing());
    }

    #[test]
    fn nothing_fetches_nothing() {
        assert_eq!(FetchPolicy::Nothing.for_relation("author"), None);
    }
}
