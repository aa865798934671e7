//! Build table descriptors from the schema document and collect them into a registry.

use crate::config::registry::Registries;
use crate::config::resolved::{ApiSettings, FieldDescriptor, FieldType, SchemaRegistry, TableDescriptor};
use crate::config::types::{ApiConfig, RawTable, SchemaDocument};
use crate::config::validator::build_field;
use crate::entity::FetchPolicy;
use crate::error::{ConfigError, DescriptorError, DescriptorErrorKind};
use crate::naming::default_endpoint;
use serde_json::Value;
use std::path::Path;

/// Outcome of loading a schema: usable tables, plus the tables that failed.
#[derive(Debug, Default)]
pub struct SchemaLoad {
    pub registry: SchemaRegistry,
    pub failures: Vec<ConfigError>,
}

impl SchemaLoad {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Build one table descriptor with the standard registries.
pub fn build_table_descriptor(name: &str, raw: &Value) -> Result<TableDescriptor, ConfigError> {
    build_table_descriptor_with(&Registries::STANDARD, name, raw)
}

pub fn build_table_descriptor_with(
    registries: &Registries,
    name: &str,
    raw: &Value,
) -> Result<TableDescriptor, ConfigError> {
    let fail = |errors: Vec<DescriptorError>| ConfigError::Table {
        table: name.to_string(),
        errors,
    };
    let table: RawTable = serde_json::from_value(raw.clone()).map_err(|e| {
        tracing::error!(table = %name, error = %e, "malformed table");
        fail(vec![DescriptorError::table(name, DescriptorErrorKind::NoFields)])
    })?;

    let raw_fields = match &table.fields {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => {
            tracing::error!(table = %name, "no fields in table");
            return Err(fail(vec![DescriptorError::table(name, DescriptorErrorKind::NoFields)]));
        }
    };

    let mut errors = Vec::new();
    let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(raw_fields.len());
    for (field_name, spec) in raw_fields {
        let Some(spec) = spec.as_str() else {
            tracing::error!(table = %name, field = %field_name, "field options must be a string");
            errors.push(DescriptorError::field(field_name, DescriptorErrorKind::MalformedField).in_table(name));
            continue;
        };
        match build_field(registries, name, field_name, spec) {
            Ok(field) => fields.push(field),
            Err(mut field_errors) => errors.append(&mut field_errors),
        }
    }

    if fields.is_empty() {
        tracing::error!(table = %name, "no valid fields in table");
        errors.push(DescriptorError::table(name, DescriptorErrorKind::NoValidFields));
        return Err(fail(errors));
    }
    if !errors.is_empty() {
        return Err(fail(errors));
    }

    let primary = match primary_field(name, &fields) {
        Some(p) => p,
        None => {
            tracing::error!(table = %name, "no primary field in table");
            return Err(fail(vec![DescriptorError::table(name, DescriptorErrorKind::NoPrimary)]));
        }
    };

    let mut indexed = vec![primary.clone()];
    indexed.extend(
        fields
            .iter()
            .filter(|f| f.is_indexed() && f.name != primary)
            .map(|f| f.name.clone()),
    );

    let uuid_primary = fields
        .iter()
        .any(|f| f.name == primary && f.field_type == FieldType::Uuid);
    let fillable = fields
        .iter()
        .filter(|f| !matches!(f.field_type, FieldType::Increments | FieldType::OneToMany | FieldType::ManyToMany))
        .filter(|f| !(uuid_primary && f.name == primary))
        .map(|f| f.name.clone())
        .collect();

    Ok(TableDescriptor {
        name: name.to_string(),
        fields,
        primary,
        indexed,
        fillable,
        sort: table.sort.unwrap_or_default(),
        api: api_settings(name, table.api.unwrap_or_default()),
    })
}

/// First field carrying `primary`; an auto-increment field stands in when none does.
fn primary_field(table: &str, fields: &[FieldDescriptor]) -> Option<String> {
    let mut primaries = fields.iter().filter(|f| f.is_primary());
    if let Some(first) = primaries.next() {
        for extra in primaries {
            tracing::warn!(table = %table, field = %extra.name, "additional primary field ignored");
        }
        return Some(first.name.clone());
    }
    fields
        .iter()
        .find(|f| f.field_type == FieldType::Increments)
        .map(|f| f.name.clone())
}

fn api_settings(table: &str, api: ApiConfig) -> ApiSettings {
    ApiSettings {
        prefix: api.prefix.unwrap_or_default(),
        endpoint: api.endpoint.unwrap_or_else(|| default_endpoint(table)),
        methods: api
            .methods
            .unwrap_or_else(|| ["GET", "POST", "PUT", "DELETE"].map(String::from).to_vec()),
        middleware: api.middleware.unwrap_or_else(|| "api".into()),
        fetchable: api
            .fetchable
            .as_ref()
            .map(FetchPolicy::from_json)
            .unwrap_or(FetchPolicy::Everything),
        fetch_on_store: api.fetch_on_store,
        fetch_on_update: api.fetch_on_update,
        allowed_origin: api.allowed_origin.unwrap_or_else(|| "*".into()),
        allowed_methods: api.allowed_methods.unwrap_or_else(|| "*".into()),
    }
}

/// Build every table of the document. Tables that fail are reported in
/// [`SchemaLoad::failures`] and left out of the registry.
pub fn resolve(document: &SchemaDocument) -> Result<SchemaLoad, ConfigError> {
    resolve_with(&Registries::STANDARD, document)
}

pub fn resolve_with(registries: &Registries, document: &SchemaDocument) -> Result<SchemaLoad, ConfigError> {
    if document.tables.is_empty() {
        return Err(ConfigError::Load("no tables in schema".into()));
    }
    tracing::debug!(count = document.tables.len(), "parsing tables");

    let mut load = SchemaLoad::default();
    for (index, (name, raw)) in document.tables.iter().enumerate() {
        tracing::debug!(table = %name, "parsing table");
        match build_table_descriptor_with(registries, name, raw) {
            Ok(mut table) => {
                let explicit_sort = raw.get("sort").is_some_and(|s| !s.is_null());
                if !explicit_sort {
                    table.sort = index as i64 + 1;
                }
                load.registry.insert(table);
            }
            Err(e) => {
                tracing::error!(table = %name, error = %e, "table has errors");
                load.failures.push(e);
            }
        }
    }

    warn_dangling_relations(&load.registry);
    tracing::info!(
        loaded = load.registry.len(),
        failed = load.failures.len(),
        "schema loaded"
    );
    Ok(load)
}

fn warn_dangling_relations(registry: &SchemaRegistry) {
    for table in registry.tables() {
        for (field, relation) in table.relation_fields() {
            if registry.get(relation.target_table()).is_none() {
                tracing::warn!(
                    table = %table.name,
                    field = %field.name,
                    target = %relation.target_table(),
                    "relation targets a table that is not loaded"
                );
            }
        }
        for field in &table.fields {
            if let (Some(foreign), None) = (&field.foreign, &field.relation) {
                if registry.get(&foreign.table).is_none() {
                    tracing::warn!(table = %table.name, field = %field.name, target = %foreign.table, "foreign table is not loaded");
                }
            }
        }
    }
}

pub fn load_from_str(json: &str) -> Result<SchemaLoad, ConfigError> {
    let document: SchemaDocument = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    resolve(&document)
}

pub async fn load_from_path(path: impl AsRef<Path>) -> Result<SchemaLoad, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening schema document");
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(err: &ConfigError) -> Vec<&'static str> {
        match err {
            ConfigError::Table { errors, .. } => errors.iter().map(|e| e.kind.tag()).collect(),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn derives_primary_indexed_and_fillable() {
        let table = build_table_descriptor(
            "posts",
            &json!({
                "fields": {
                    "id": "uuid|primary",
                    "title": "string:120|index",
                    "author_id": "uuid|one-to-one:users:id|as:author",
                    "comments": "one-to-many:comments:post_id",
                    "tags": "many-to-many:tags"
                }
            }),
        )
        .unwrap();
        assert_eq!(table.primary, "id");
        assert_eq!(table.indexed, vec!["id", "title"]);
        assert_eq!(table.fillable, vec!["title", "author_id"]);
        assert_eq!(table.field("author_id").unwrap().alias(), Some("author"));
    }

    #[test]
    fn non_uuid_primary_is_fillable() {
        let table = build_table_descriptor(
            "countries",
            &json!({ "fields": { "code": "string:2|primary", "name": "string" } }),
        )
        .unwrap();
        assert_eq!(table.fillable, vec!["code", "name"]);
    }

    #[test]
    fn increments_stands_in_for_primary() {
        let table = build_table_descriptor(
            "logs",
            &json!({ "fields": { "id": "increments", "line": "text" } }),
        )
        .unwrap();
        assert_eq!(table.primary, "id");
        assert_eq!(table.fillable, vec!["line"]);
    }

    #[test]
    fn empty_or_malformed_fields_fail() {
        let err = build_table_descriptor("t", &json!({ "fields": {} })).unwrap_err();
        assert_eq!(kinds(&err), vec!["error-no-fields"]);
        let err = build_table_descriptor("t", &json!({ "fields": ["id"] })).unwrap_err();
        assert_eq!(kinds(&err), vec!["error-no-fields"]);
        let err = build_table_descriptor("t", &json!({})).unwrap_err();
        assert_eq!(kinds(&err), vec!["error-no-fields"]);
    }

    #[test]
    fn one_bad_field_fails_the_table() {
        let err = build_table_descriptor(
            "t",
            &json!({ "fields": { "id": "increments", "name": "string|bogus" } }),
        )
        .unwrap_err();
        assert_eq!(kinds(&err), vec!["error-unknown-option"]);
    }

    #[test]
    fn zero_valid_fields_is_reported() {
        let err = build_table_descriptor("t", &json!({ "fields": { "a": "", "b": 3 } })).unwrap_err();
        assert_eq!(
            kinds(&err),
            vec!["error-no-options", "error-malformed-field", "error-no-valid-fields"]
        );
    }

    #[test]
    fn missing_primary_fails() {
        let err = build_table_descriptor("t", &json!({ "fields": { "name": "string" } })).unwrap_err();
        assert_eq!(kinds(&err), vec!["error-no-primary"]);
    }

    #[test]
    fn api_defaults() {
        let table = build_table_descriptor("blog_post", &json!({ "fields": { "id": "increments" } })).unwrap();
        assert_eq!(table.api.endpoint, "blogpost");
        assert_eq!(table.api.collection_path(), "/blogpost");
        assert!(table.api.allows("delete"));
        assert_eq!(table.api.middleware, "api");
        assert_eq!(table.api.fetchable, FetchPolicy::Everything);
        assert!(!table.api.fetch_on_store);
        assert_eq!(table.api.allowed_origin, "*");
        assert_eq!(table.api.allowed_methods, "*");
    }

    #[test]
    fn api_section_is_read() {
        let table = build_table_descriptor(
            "posts",
            &json!({
                "fields": { "id": "increments" },
                "api": {
                    "prefix": "v1",
                    "endpoint": "articles",
                    "methods": ["GET"],
                    "fetchable": { "author": true },
                    "fetchOnStore": true,
                    "allowedOrigin": "https://blog.example",
                    "allowedMethods": "GET, OPTIONS"
                }
            }),
        )
        .unwrap();
        assert_eq!(table.api.collection_path(), "/v1/articles");
        assert!(table.api.allows("GET"));
        assert!(!table.api.allows("POST"));
        assert!(table.api.fetch_on_store);
        assert_eq!(table.api.fetchable, FetchPolicy::from_json(&json!({ "author": true })));
        assert_eq!(table.api.allowed_origin, "https://blog.example");
        assert_eq!(table.api.allowed_methods, "GET, OPTIONS");
    }

    #[test]
    fn resolve_excludes_failed_tables_and_defaults_sort() {
        let load = load_from_str(
            r#"{
                "tables": {
                    "users": { "fields": { "id": "uuid|primary", "name": "string" } },
                    "broken": { "fields": { "id": "string|integer" } },
                    "posts": { "fields": { "id": "increments" }, "sort": 0 }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(load.registry.len(), 2);
        assert!(load.registry.get("broken").is_none());
        assert_eq!(load.failures.len(), 1);
        assert_eq!(load.registry.get("users").unwrap().sort, 1);
        assert_eq!(load.registry.get("posts").unwrap().sort, 0);
        let order: Vec<&str> = load.registry.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(order, vec!["posts", "users"]);
    }

    #[test]
    fn document_without_tables_is_a_load_error() {
        assert!(matches!(load_from_str(r#"{ "tables": {} }"#), Err(ConfigError::Load(_))));
        assert!(matches!(load_from_str("not json"), Err(ConfigError::Load(_))));
    }
}
