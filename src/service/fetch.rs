//! Relation hydration bounded by a [`FetchPolicy`].

use crate::config::{RelationKind, SchemaRegistry, TableDescriptor};
use crate::entity::{Entity, FetchPolicy, Related};
use crate::error::AppError;
use crate::store::{LinkJoin, Record, Store};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type Hydrating<'s> = Pin<Box<dyn Future<Output = Result<Entity, AppError>> + Send + 's>>;

pub struct FetchEngine<'a> {
    store: &'a dyn Store,
    registry: &'a SchemaRegistry,
}

impl<'a> FetchEngine<'a> {
    pub fn new(store: &'a dyn Store, registry: &'a SchemaRegistry) -> Self {
        FetchEngine { store, registry }
    }

    /// Hydrate the relations of `entity` that `policy` asks for, recursively.
    pub async fn fetch(&self, entity: Entity, policy: &FetchPolicy) -> Result<Entity, AppError> {
        self.hydrate(entity, policy).await
    }

    fn hydrate<'s>(&'s self, mut entity: Entity, policy: &'s FetchPolicy) -> Hydrating<'s> {
        Box::pin(async move {
            if policy.is_nothing() {
                return Ok(entity);
            }
            let table = Arc::clone(entity.table());
            for (field, relation) in table.relation_fields() {
                match relation {
                    RelationKind::OneToOne {
                        table: target,
                        field: target_field,
                        alias,
                    } => {
                        // Only aliased bindings have a slot to hydrate into.
                        let Some(alias) = alias else { continue };
                        let Some(nested) = policy.for_relation(alias) else {
                            continue;
                        };
                        let value = entity.get(&field.name).cloned().unwrap_or(Value::Null);
                        let related = if value.is_null() {
                            None
                        } else {
                            let target_desc = Arc::clone(self.registry.require(target)?);
                            match self.store.find_by_predicate(target, target_field, &value).await? {
                                Some(record) => Some(Box::new(
                                    self.hydrate(Entity::new(target_desc, record), nested).await?,
                                )),
                                None => None,
                            }
                        };
                        entity.set_related(alias, Related::One(related));
                    }
                    RelationKind::OneToMany {
                        table: target,
                        field: join,
                    } => {
                        let Some(nested) = policy.for_relation(&field.name) else {
                            continue;
                        };
                        let Some(key) = entity.primary_value().cloned() else {
                            continue;
                        };
                        let target_desc = Arc::clone(self.registry.require(target)?);
                        let rows = self.store.find_all_by_predicate(target, join, &key).await?;
                        let children = self.hydrate_all(&target_desc, rows, nested).await?;
                        entity.set_related(&field.name, Related::Many(children));
                    }
                    RelationKind::ManyToMany {
                        table: target,
                        field: target_field,
                        link,
                    } => {
                        let Some(nested) = policy.for_relation(&field.name) else {
                            continue;
                        };
                        let Some(key) = entity.primary_value().cloned() else {
                            continue;
                        };
                        let target_desc = Arc::clone(self.registry.require(target)?);
                        let join = LinkJoin {
                            link_table: &link.table,
                            target_table: target,
                            source_column: &link.source_column,
                            target_column: &link.target_column,
                            target_field: self.registry.target_join_field(target, target_field.as_ref())?,
                        };
                        let rows = self.store.join_select(&join, &key).await?;
                        let children = self.hydrate_all(&target_desc, rows, nested).await?;
                        entity.set_related(&field.name, Related::Many(children));
                    }
                }
            }
            Ok(entity)
        })
    }

    async fn hydrate_all(
        &self,
        table: &Arc<TableDescriptor>,
        rows: Vec<Record>,
        policy: &FetchPolicy,
    ) -> Result<Vec<Entity>, AppError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(Entity::new(Arc::clone(table), row), policy).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn blog() -> SchemaRegistry {
        let load = load_from_str(
            &json!({ "tables": {
                "companies": { "fields": { "id": "increments", "name": "string" } },
                "users": { "fields": {
                    "id": "increments",
                    "name": "string",
                    "company_id": "integer|nullable|one-to-one:companies:id|as:company"
                } },
                "posts": { "fields": {
                    "id": "increments",
                    "title": "string",
                    "author_id": "integer|nullable|one-to-one:users:id|as:author",
                    "comments": "one-to-many:comments:post_id",
                    "tags": "many-to-many:tags"
                } },
                "comments": { "fields": { "id": "increments", "post_id": "integer", "body": "text" } },
                "tags": { "fields": { "id": "increments", "label": "string" } }
            } })
            .to_string(),
        )
        .unwrap();
        assert!(load.is_clean(), "{:?}", load.failures);
        load.registry
    }

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed("companies", [rec(json!({ "id": 1, "name": "acme" }))]).unwrap();
        store
            .seed("users", [rec(json!({ "id": 1, "name": "ann", "company_id": 1 }))])
            .unwrap();
        store
            .seed(
                "posts",
                [
                    rec(json!({ "id": 1, "title": "hello", "author_id": 1 })),
                    rec(json!({ "id": 2, "title": "orphan", "author_id": null })),
                ],
            )
            .unwrap();
        store
            .seed(
                "comments",
                [
                    rec(json!({ "id": 1, "post_id": 1, "body": "first" })),
                    rec(json!({ "id": 2, "post_id": 1, "body": "second" })),
                    rec(json!({ "id": 3, "post_id": 2, "body": "elsewhere" })),
                ],
            )
            .unwrap();
        store.seed("tags", [rec(json!({ "id": 5, "label": "rust" }))]).unwrap();
        store
            .seed("posts_tags_link", [rec(json!({ "posts_id": 1, "tags_id": 5 }))])
            .unwrap();
        store
    }

    fn post(registry: &SchemaRegistry, store: &MemoryStore, id: i64) -> Entity {
        let row = store
            .rows("posts")
            .into_iter()
            .find(|r| r["id"] == json!(id))
            .unwrap();
        Entity::new(Arc::clone(registry.get("posts").unwrap()), row)
    }

    #[tokio::test]
    async fn nothing_leaves_relations_unhydrated() {
        let registry = blog();
        let store = seeded();
        let engine = FetchEngine::new(&store, &registry);
        let entity = engine.fetch(post(&registry, &store, 1), &FetchPolicy::Nothing).await.unwrap();
        assert_eq!(entity.hydrated_count(), 0);
    }

    #[tokio::test]
    async fn everything_hydrates_one_level() {
        let registry = blog();
        let store = seeded();
        let engine = FetchEngine::new(&store, &registry);
        let entity = engine.fetch(post(&registry, &store, 1), &FetchPolicy::Everything).await.unwrap();

        let Some(Related::One(Some(author))) = entity.related("author") else {
            panic!("author not hydrated");
        };
        assert_eq!(author.get("name"), Some(&json!("ann")));
        assert!(!author.is_hydrated("company"));

        let Some(Related::Many(comments)) = entity.related("comments") else {
            panic!("comments not hydrated");
        };
        assert_eq!(comments.len(), 2);

        let Some(Related::Many(tags)) = entity.related("tags") else {
            panic!("tags not hydrated");
        };
        assert_eq!(tags[0].get("label"), Some(&json!("rust")));
    }

    #[tokio::test]
    async fn named_field_goes_no_deeper() {
        let registry = blog();
        let store = seeded();
        let engine = FetchEngine::new(&store, &registry);
        let entity = engine
            .fetch(post(&registry, &store, 1), &FetchPolicy::only("author"))
            .await
            .unwrap();
        assert_eq!(entity.hydrated_count(), 1);
        let Some(Related::One(Some(author))) = entity.related("author") else {
            panic!("author not hydrated");
        };
        assert_eq!(author.hydrated_count(), 0);
    }

    #[tokio::test]
    async fn nested_policy_goes_deeper() {
        let registry = blog();
        let store = seeded();
        let engine = FetchEngine::new(&store, &registry);
        let policy = FetchPolicy::from_json(&json!({ "author": { "company": true } }));
        let entity = engine.fetch(post(&registry, &store, 1), &policy).await.unwrap();
        let Some(Related::One(Some(author))) = entity.related("author") else {
            panic!("author not hydrated");
        };
        let Some(Related::One(Some(company))) = author.related("company") else {
            panic!("company not hydrated");
        };
        assert_eq!(company.get("name"), Some(&json!("acme")));
    }

    #[tokio::test]
    async fn null_foreign_value_is_absent() {
        let registry = blog();
        let store = seeded();
        let engine = FetchEngine::new(&store, &registry);
        let entity = engine.fetch(post(&registry, &store, 2), &FetchPolicy::Everything).await.unwrap();
        assert_eq!(entity.related("author"), Some(&Related::One(None)));
        let Some(Related::Many(comments)) = entity.related("comments") else {
            panic!("comments not hydrated");
        };
        assert_eq!(comments.len(), 1);
    }
}
