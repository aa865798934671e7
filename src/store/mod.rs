//! Persistence collaborator. The engine reads and writes records only through
//! [`Store`]; backends are [`MemoryStore`] and [`PgStore`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored row, column name -> value.
pub type Record = Map<String, Value>;

/// Join through a many-to-many link table:
/// `target_table.target_field = link_table.target_column AND link_table.source_column = ?`.
#[derive(Clone, Copy, Debug)]
pub struct LinkJoin<'a> {
    pub link_table: &'a str,
    pub target_table: &'a str,
    pub source_column: &'a str,
    pub target_column: &'a str,
    pub target_field: &'a str,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// First record of `table` whose `field` equals `value`.
    async fn find_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<Option<Record>, StoreError>;

    async fn find_all_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<Vec<Record>, StoreError>;

    async fn find_all(&self, table: &str) -> Result<Vec<Record>, StoreError>;

    /// Insert and return the stored record, generated columns included.
    async fn insert(&self, table: &str, values: &Record) -> Result<Record, StoreError>;

    /// Set `values` on every record matching the predicate. Returns rows touched.
    async fn update_by_predicate(&self, table: &str, field: &str, value: &Value, values: &Record) -> Result<u64, StoreError>;

    async fn delete_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<u64, StoreError>;

    /// Target records linked to `source_value`.
    async fn join_select(&self, join: &LinkJoin<'_>, source_value: &Value) -> Result<Vec<Record>, StoreError>;
}

/// Loose equality used for predicates: numbers compare numerically, and a
/// numeric string matches the number it spells.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}
