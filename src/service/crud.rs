//! Read and write paths of one table: validate, store, link, fetch, project.

use crate::config::{FieldType, SchemaRegistry, TableDescriptor};
use crate::entity::Entity;
use crate::error::AppError;
use crate::service::fetch::FetchEngine;
use crate::service::many::ManyToManyMutator;
use crate::service::projection::project;
use crate::service::validation::ValueValidator;
use crate::store::{Record, Store};
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct EntityService<'a> {
    store: &'a dyn Store,
    registry: &'a SchemaRegistry,
}

impl<'a> EntityService<'a> {
    pub fn new(store: &'a dyn Store, registry: &'a SchemaRegistry) -> Self {
        EntityService { store, registry }
    }

    fn table(&self, name: &str) -> Result<Arc<TableDescriptor>, AppError> {
        Ok(Arc::clone(self.registry.require(name)?))
    }

    /// Every row, each fetched with the table's default policy and projected.
    pub async fn list(&self, table: &str) -> Result<Vec<Map<String, Value>>, AppError> {
        let desc = self.table(table)?;
        let engine = FetchEngine::new(self.store, self.registry);
        let rows = self.store.find_all(table).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let entity = engine
                .fetch(Entity::new(Arc::clone(&desc), row), &desc.api.fetchable)
                .await?;
            out.push(project(&entity));
        }
        Ok(out)
    }

    pub async fn read(&self, table: &str, id: &Value) -> Result<Map<String, Value>, AppError> {
        let desc = self.table(table)?;
        let row = self.find(&desc, id).await?;
        let entity = FetchEngine::new(self.store, self.registry)
            .fetch(Entity::new(Arc::clone(&desc), row), &desc.api.fetchable)
            .await?;
        Ok(project(&entity))
    }

    /// Validate, insert the fillable inputs (defaults and generated key
    /// filled in), then rewrite many-to-many links.
    pub async fn create(&self, table: &str, inputs: &Record) -> Result<Map<String, Value>, AppError> {
        let desc = self.table(table)?;
        let violations = ValueValidator::new(self.store, self.registry)
            .validate(&desc, inputs, false)
            .await?;
        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }

        let mut data = Record::new();
        for field in &desc.fields {
            if field.is_primary() && field.field_type == FieldType::Uuid {
                data.insert(field.name.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
            } else if desc.fillable.contains(&field.name) {
                match (inputs.get(&field.name), &field.default) {
                    (Some(v), _) => {
                        data.insert(field.name.clone(), v.clone());
                    }
                    (None, Some(default)) => {
                        data.insert(field.name.clone(), default.clone());
                    }
                    (None, None) => {}
                }
            }
        }

        let record = self.store.insert(table, &data).await?;
        tracing::info!(table = %table, "created");
        let mut entity = Entity::new(Arc::clone(&desc), record);
        ManyToManyMutator::new(self.store, self.registry)
            .reconcile(&mut entity, inputs)
            .await?;
        if desc.api.fetch_on_store {
            entity = FetchEngine::new(self.store, self.registry)
                .fetch(entity, &desc.api.fetchable)
                .await?;
        }
        Ok(project(&entity))
    }

    /// Validate as an update, write the fillable inputs present, then rewrite
    /// many-to-many links.
    pub async fn update(&self, table: &str, id: &Value, inputs: &Record) -> Result<Map<String, Value>, AppError> {
        let desc = self.table(table)?;
        let violations = ValueValidator::new(self.store, self.registry)
            .validate(&desc, inputs, true)
            .await?;
        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }
        let mut record = self.find(&desc, id).await?;

        let changes: Record = desc
            .fillable_fields()
            .filter(|f| !f.is_primary())
            .filter_map(|f| inputs.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect();
        self.store
            .update_by_predicate(table, desc.primary_key(), id, &changes)
            .await?;
        tracing::info!(table = %table, fields = changes.len(), "updated");
        record.extend(changes);

        let mut entity = Entity::new(Arc::clone(&desc), record);
        ManyToManyMutator::new(self.store, self.registry)
            .reconcile(&mut entity, inputs)
            .await?;
        if desc.api.fetch_on_update {
            entity = FetchEngine::new(self.store, self.registry)
                .fetch(entity, &desc.api.fetchable)
                .await?;
        }
        Ok(project(&entity))
    }

    pub async fn delete(&self, table: &str, id: &Value) -> Result<(), AppError> {
        let desc = self.table(table)?;
        self.find(&desc, id).await?;
        self.store
            .delete_by_predicate(table, desc.primary_key(), id)
            .await?;
        tracing::info!(table = %table, id = %id, "deleted");
        Ok(())
    }

    async fn find(&self, desc: &TableDescriptor, id: &Value) -> Result<Record, AppError> {
        self.store
            .find_by_predicate(&desc.name, desc.primary_key(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", desc.name, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (SchemaRegistry, MemoryStore) {
        let load = load_from_str(
            &json!({ "tables": {
                "users": {
                    "fields": {
                        "id": "uuid|primary",
                        "name": "string|required|min:2",
                        "role": "string|default:member",
                        "password": "string|omit",
                        "groups": "many-to-many:groups"
                    },
                    "api": { "fetchOnStore": true }
                },
                "groups": { "fields": { "id": "increments", "title": "string" } }
            } })
            .to_string(),
        )
        .unwrap();
        assert!(load.is_clean(), "{:?}", load.failures);
        let store = MemoryStore::from_registry(&load.registry);
        (load.registry, store)
    }

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    #[tokio::test]
    async fn create_fills_key_defaults_and_links() {
        let (registry, store) = setup();
        store.seed("groups", [rec(json!({ "id": 1, "title": "admins" }))]).unwrap();
        let service = EntityService::new(&store, &registry);

        let out = service
            .create("users", &rec(json!({ "name": "ann", "password": "pw", "groups": [1], "bogus": true })))
            .await
            .unwrap();
        let id = out["id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(out["role"], json!("member"));
        assert_eq!(out["groups"], json!([{ "id": 1, "title": "admins" }]));
        assert!(!out.contains_key("password"));
        assert!(!store.rows("users")[0].contains_key("bogus"));
        assert_eq!(store.rows("users_groups_link").len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_violations() {
        let (registry, store) = setup();
        let service = EntityService::new(&store, &registry);
        let err = service.create("users", &rec(json!({ "name": "a" }))).await.unwrap_err();
        match err {
            AppError::Validation(v) => assert_eq!(v[0].kind.tag(), "error-minimum-value"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.rows("users").is_empty());
    }

    #[tokio::test]
    async fn update_read_delete() {
        let (registry, store) = setup();
        let service = EntityService::new(&store, &registry);
        let created = service.create("users", &rec(json!({ "name": "ann" }))).await.unwrap();
        let id = created["id"].clone();

        let updated = service
            .update("users", &id, &rec(json!({ "name": "anna", "id": "ignored" })))
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("anna"));
        assert_eq!(updated["id"], id);

        let read = service.read("users", &id).await.unwrap();
        assert_eq!(read["name"], json!("anna"));
        assert_eq!(read["groups"], json!([]));
        assert_eq!(service.list("users").await.unwrap().len(), 1);

        service.delete("users", &id).await.unwrap();
        assert!(matches!(service.read("users", &id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete("users", &id).await, Err(AppError::NotFound(_))));
    }
}
