//! Many-to-many link maintenance: every write replaces the whole link set.

use crate::config::SchemaRegistry;
use crate::entity::{Entity, Related};
use crate::error::AppError;
use crate::store::{Record, Store};
use serde_json::Value;
use std::sync::Arc;

pub struct ManyToManyMutator<'a> {
    store: &'a dyn Store,
    registry: &'a SchemaRegistry,
}

impl<'a> ManyToManyMutator<'a> {
    pub fn new(store: &'a dyn Store, registry: &'a SchemaRegistry) -> Self {
        ManyToManyMutator { store, registry }
    }

    /// For each many-to-many field of the entity's table: delete every link of
    /// the entity, then link each non-empty target listed in `inputs`. The
    /// field's slot ends up holding the linked target records.
    pub async fn reconcile(&self, entity: &mut Entity, inputs: &Record) -> Result<(), AppError> {
        let table = Arc::clone(entity.table());
        let Some(key) = entity.primary_value().cloned() else {
            if table.many_to_many_fields().next().is_some() {
                tracing::warn!(table = %table.name, "entity has no key; many-to-many links left untouched");
            }
            return Ok(());
        };

        for (field, target, target_field, link) in table.many_to_many_fields() {
            let removed = self
                .store
                .delete_by_predicate(&link.table, &link.source_column, &key)
                .await?;
            tracing::debug!(link = %link.table, removed, "cleared links");

            let target_desc = Arc::clone(self.registry.require(target)?);
            let join_field = self.registry.target_join_field(target, target_field)?;
            let mut linked = Vec::new();
            for target_value in replacement_list(inputs.get(&field.name)) {
                let mut row = Record::new();
                row.insert(link.source_column.clone(), key.clone());
                row.insert(link.target_column.clone(), target_value.clone());
                self.store.insert(&link.table, &row).await?;

                match self.store.find_by_predicate(target, join_field, target_value).await? {
                    Some(record) => linked.push(Entity::new(Arc::clone(&target_desc), record)),
                    None => {
                        tracing::warn!(table = %target, value = %target_value, "linked target not found")
                    }
                }
            }
            entity.set_related(&field.name, Related::Many(linked));
        }
        Ok(())
    }
}

/// Target values from an input: a list, or a single value; empty entries skipped.
fn replacement_list(input: Option<&Value>) -> Vec<&Value> {
    match input {
        Some(Value::Array(items)) => items.iter().filter(|v| !is_empty_target(v)).collect(),
        Some(v) if !is_empty_target(v) => vec![v],
        _ => Vec::new(),
    }
}

fn is_empty_target(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty() || s == "0",
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        load_from_str(
            &json!({ "tables": {
                "posts": { "fields": { "id": "increments", "tags": "many-to-many:tags:code" } },
                "tags": { "fields": { "id": "increments", "code": "string|unique" } }
            } })
            .to_string(),
        )
        .unwrap()
        .registry
    }

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    fn linked_codes(store: &MemoryStore) -> Vec<Value> {
        let mut codes: Vec<Value> = store
            .rows("posts_tags_link")
            .into_iter()
            .filter(|r| r["posts_id"] == json!(1))
            .map(|r| r["tags_id"].clone())
            .collect();
        codes.sort_by_key(|v| v.to_string());
        codes
    }

    #[tokio::test]
    async fn replacement_is_full_not_incremental() {
        let registry = registry();
        let store = MemoryStore::new();
        store
            .seed("tags", ["a", "b", "c"].map(|c| rec(json!({ "code": c }))))
            .unwrap();
        store
            .seed("posts_tags_link", [rec(json!({ "posts_id": 2, "tags_id": "a" }))])
            .unwrap();
        let mutator = ManyToManyMutator::new(&store, &registry);
        let mut post = Entity::new(Arc::clone(registry.get("posts").unwrap()), rec(json!({ "id": 1 })));

        mutator.reconcile(&mut post, &rec(json!({ "tags": ["a", "b"] }))).await.unwrap();
        assert_eq!(linked_codes(&store), vec![json!("a"), json!("b")]);

        mutator.reconcile(&mut post, &rec(json!({ "tags": ["b", "c"] }))).await.unwrap();
        assert_eq!(linked_codes(&store), vec![json!("b"), json!("c")]);

        let Some(Related::Many(tags)) = post.related("tags") else {
            panic!("tags slot not set");
        };
        assert_eq!(tags.len(), 2);
        // other entities' links are untouched
        assert_eq!(store.rows("posts_tags_link").len(), 3);
    }

    #[tokio::test]
    async fn empty_targets_are_skipped() {
        let registry = registry();
        let store = MemoryStore::new();
        let mutator = ManyToManyMutator::new(&store, &registry);
        let mut post = Entity::new(Arc::clone(registry.get("posts").unwrap()), rec(json!({ "id": 1 })));
        mutator
            .reconcile(&mut post, &rec(json!({ "tags": ["", null, 0] })))
            .await
            .unwrap();
        assert!(store.rows("posts_tags_link").is_empty());

        mutator.reconcile(&mut post, &Record::new()).await.unwrap();
        assert_eq!(post.related("tags"), Some(&Related::Many(Vec::new())));
    }
}
