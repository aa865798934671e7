//! Builds parameterized INSERT, SELECT, UPDATE, DELETE for single-column predicates.

use crate::store::{LinkJoin, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Cast for a bound value compared against or stored into `column`.
pub trait ColumnCast {
    fn cast(&self, table: &str, column: &str) -> Option<&'static str>;
}

impl<F> ColumnCast for F
where
    F: Fn(&str, &str) -> Option<&'static str>,
{
    fn cast(&self, table: &str, column: &str) -> Option<&'static str> {
        self(table, column)
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Bind `v` and return its placeholder, cast when the column type is known.
    fn placeholder(&mut self, v: Value, cast: Option<&str>) -> String {
        let n = self.push_param(v);
        cast.map(|t| format!("${}::{}", n, t))
            .unwrap_or_else(|| format!("${}", n))
    }
}

/// SELECT * WHERE field = $1.
pub fn select_by_field(schema: &str, table: &str, field: &str, value: &Value, casts: &dyn ColumnCast) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(value.clone(), casts.cast(table, field));
    q.sql = format!(
        "SELECT * FROM {} WHERE {} = {}",
        qualified_table(schema, table),
        quoted(field),
        ph
    );
    q
}

/// SELECT * ORDER BY `order_by`.
pub fn select_all(schema: &str, table: &str, order_by: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT * FROM {} ORDER BY {}",
        qualified_table(schema, table),
        quoted(order_by)
    );
    q
}

/// INSERT the given columns, RETURNING the stored row. An empty record inserts defaults.
pub fn insert(schema: &str, table: &str, values: &Record, casts: &dyn ColumnCast) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table);
    if values.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING *", target);
        return q;
    }
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (name, val) in values {
        placeholders.push(q.placeholder(val.clone(), casts.cast(table, name)));
        cols.push(quoted(name));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        target,
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// UPDATE SET the given columns WHERE field = value. Returns `None` when there is nothing to set.
pub fn update_by_field(
    schema: &str,
    table: &str,
    field: &str,
    value: &Value,
    values: &Record,
    casts: &dyn ColumnCast,
) -> Option<QueryBuf> {
    if values.is_empty() {
        return None;
    }
    let mut q = QueryBuf::new();
    let sets: Vec<String> = values
        .iter()
        .map(|(k, v)| format!("{} = {}", quoted(k), q.placeholder(v.clone(), casts.cast(table, k))))
        .collect();
    let ph = q.placeholder(value.clone(), casts.cast(table, field));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        qualified_table(schema, table),
        sets.join(", "),
        quoted(field),
        ph
    );
    Some(q)
}

/// DELETE WHERE field = $1.
pub fn delete_by_field(schema: &str, table: &str, field: &str, value: &Value, casts: &dyn ColumnCast) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(value.clone(), casts.cast(table, field));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(schema, table),
        quoted(field),
        ph
    );
    q
}

/// Target rows reachable from `source_value` through a link table.
pub fn join_select(schema: &str, join: &LinkJoin<'_>, source_value: &Value, casts: &dyn ColumnCast) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(source_value.clone(), casts.cast(join.link_table, join.source_column));
    q.sql = format!(
        "SELECT target.* FROM {} target INNER JOIN {} link ON target.{} = link.{} WHERE link.{} = {}",
        qualified_table(schema, join.target_table),
        qualified_table(schema, join.link_table),
        quoted(join.target_field),
        quoted(join.target_column),
        quoted(join.source_column),
        ph
    );
    q
}
