//! In-process store: one vector of records per table.

use super::{value_eq, LinkJoin, Record, Store};
use crate::config::{FieldType, SchemaRegistry};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Record>>,
    /// table -> (auto-increment column, last value)
    sequences: HashMap<String, (String, i64)>,
}

/// Store kept in memory. Used by tests and for running without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Store that numbers every `increments` column declared in `registry`.
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        let store = MemoryStore::new();
        for table in registry.tables() {
            if let Some(field) = table.fields.iter().find(|f| f.field_type == FieldType::Increments) {
                store.add_sequence(&table.name, &field.name);
            }
        }
        store
    }

    /// Number `column` of `table` on insert when the value is missing.
    pub fn with_sequence(self, table: &str, column: &str) -> Self {
        self.add_sequence(table, column);
        self
    }

    fn add_sequence(&self, table: &str, column: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.sequences.insert(table.to_string(), (column.to_string(), 0));
        }
    }

    /// Seed rows as is, without numbering.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Record>) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.rows.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    /// Snapshot of every row of `table`.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.rows.get(table).cloned())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Failure("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Failure("memory store lock poisoned".into()))
    }

    fn matching(&self, table: &str, field: &str, value: &Value) -> Result<Vec<Record>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .rows
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.get(field).is_some_and(|v| value_eq(v, value)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<Option<Record>, StoreError> {
        Ok(self.matching(table, field, value)?.into_iter().next())
    }

    async fn find_all_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<Vec<Record>, StoreError> {
        self.matching(table, field, value)
    }

    async fn find_all(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self.read()?.rows.get(table).cloned().unwrap_or_default())
    }

    async fn insert(&self, table: &str, values: &Record) -> Result<Record, StoreError> {
        let mut inner = self.write()?;
        let mut record = values.clone();
        if let Some((column, last)) = inner.sequences.get_mut(table) {
            match record.get(column.as_str()) {
                None | Some(Value::Null) => {
                    *last += 1;
                    record.insert(column.clone(), Value::from(*last));
                }
                Some(v) => {
                    if let Some(n) = v.as_i64() {
                        *last = (*last).max(n);
                    }
                }
            }
        }
        inner.rows.entry(table.to_string()).or_default().push(record.clone());
        Ok(record)
    }

    async fn update_by_predicate(&self, table: &str, field: &str, value: &Value, values: &Record) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let mut touched = 0;
        if let Some(rows) = inner.rows.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|r| r.get(field).is_some_and(|v| value_eq(v, value)))
            {
                for (k, v) in values {
                    row.insert(k.clone(), v.clone());
                }
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let Some(rows) = inner.rows.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !r.get(field).is_some_and(|v| value_eq(v, value)));
        Ok((before - rows.len()) as u64)
    }

    async fn join_select(&self, join: &LinkJoin<'_>, source_value: &Value) -> Result<Vec<Record>, StoreError> {
        let inner = self.read()?;
        let links = inner.rows.get(join.link_table).map(Vec::as_slice).unwrap_or_default();
        let targets = inner.rows.get(join.target_table).map(Vec::as_slice).unwrap_or_default();
        let mut out = Vec::new();
        for link in links
            .iter()
            .filter(|l| l.get(join.source_column).is_some_and(|v| value_eq(v, source_value)))
        {
            let Some(key) = link.get(join.target_column) else {
                continue;
            };
            out.extend(
                targets
                    .iter()
                    .filter(|t| t.get(join.target_field).is_some_and(|v| value_eq(v, key)))
                    .cloned(),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    #[tokio::test]
    async fn predicates_and_sequence() {
        let store = MemoryStore::new().with_sequence("users", "id");
        let a = store.insert("users", &record(json!({ "name": "ann" }))).await.unwrap();
        let b = store.insert("users", &record(json!({ "name": "bob" }))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));

        let found = store.find_by_predicate("users", "id", &json!("2")).await.unwrap();
        assert_eq!(found.unwrap()["name"], json!("bob"));
        assert!(store.find_by_predicate("users", "id", &json!(9)).await.unwrap().is_none());
        assert!(store.find_all("missing").await.unwrap().is_empty());

        let n = store
            .update_by_predicate("users", "id", &json!(1), &record(json!({ "name": "anna" })))
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.rows("users")[0]["name"], json!("anna"));

        assert_eq!(store.delete_by_predicate("users", "name", &json!("bob")).await.unwrap(), 1);
        assert_eq!(store.rows("users").len(), 1);
    }

    #[tokio::test]
    async fn join_select_follows_links() {
        let store = MemoryStore::new();
        store
            .seed("tags", [record(json!({ "id": 1, "label": "a" })), record(json!({ "id": 2, "label": "b" }))])
            .unwrap();
        store
            .seed(
                "posts_tags_link",
                [
                    record(json!({ "posts_id": 10, "tags_id": 2 })),
                    record(json!({ "posts_id": 11, "tags_id": 1 })),
                ],
            )
            .unwrap();
        let join = LinkJoin {
            link_table: "posts_tags_link",
            target_table: "tags",
            source_column: "posts_id",
            target_column: "tags_id",
            target_field: "id",
        };
        let rows = store.join_select(&join, &json!(10)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["label"], json!("b"));
    }
}
