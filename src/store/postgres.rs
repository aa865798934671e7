//! PostgreSQL store: queries from `crate::sql`, rows decoded into JSON records.

use super::{LinkJoin, Record, Store};
use crate::config::SchemaRegistry;
use crate::error::StoreError;
use crate::sql::{self, ColumnCast, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::sync::Arc;

/// Store backed by a pool. Tables live in `schema` (default `public`);
/// column types come from the registry so bound values are cast to match.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        PgStore {
            pool,
            registry,
            schema: "public".into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn casts(&self) -> impl ColumnCast + '_ {
        |table: &str, column: &str| self.registry.column_cast(table, column)
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<Option<Record>, StoreError> {
        let mut q = sql::select_by_field(&self.schema, table, field, value, &self.casts());
        q.sql.push_str(" LIMIT 1");
        match self.query_optional(&q).await {
            Err(StoreError::Db(e)) if is_rejected_cast(&e) => {
                tracing::debug!(table = %table, field = %field, error = %e, "predicate value does not fit column");
                Ok(None)
            }
            other => other,
        }
    }

    async fn find_all_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<Vec<Record>, StoreError> {
        let q = sql::select_by_field(&self.schema, table, field, value, &self.casts());
        match self.query_many(&q).await {
            Err(StoreError::Db(e)) if is_rejected_cast(&e) => Ok(Vec::new()),
            other => other,
        }
    }

    async fn find_all(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let order_by = self
            .registry
            .get(table)
            .map(|t| t.primary_key().to_string())
            .ok_or_else(|| StoreError::Failure(format!("unknown table '{}'", table)))?;
        let q = sql::select_all(&self.schema, table, &order_by);
        self.query_many(&q).await
    }

    async fn insert(&self, table: &str, values: &Record) -> Result<Record, StoreError> {
        let q = sql::insert(&self.schema, table, values, &self.casts());
        self.query_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Db(sqlx::Error::RowNotFound))
    }

    async fn update_by_predicate(&self, table: &str, field: &str, value: &Value, values: &Record) -> Result<u64, StoreError> {
        let query = sql::update_by_field(&self.schema, table, field, value, values, &self.casts());
        match query {
            Some(q) => self.execute(&q).await,
            None => Ok(0),
        }
    }

    async fn delete_by_predicate(&self, table: &str, field: &str, value: &Value) -> Result<u64, StoreError> {
        let q = sql::delete_by_field(&self.schema, table, field, value, &self.casts());
        self.execute(&q).await
    }

    async fn join_select(&self, join: &LinkJoin<'_>, source_value: &Value) -> Result<Vec<Record>, StoreError> {
        let q = sql::join_select(&self.schema, join, source_value, &self.casts());
        self.query_many(&q).await
    }
}

/// SQLSTATEs raised when a bound predicate cannot be cast to the column type:
/// invalid text representation, numeric out of range, datetime format and
/// field overflow, and cannot coerce.
const REJECTED_CAST_CODES: [&str; 5] = ["22P02", "22003", "22007", "22008", "42846"];

/// A lookup whose value Postgres refuses to cast matches no row.
fn is_rejected_cast(err: &sqlx::Error) -> bool {
    rejected_cast_code(err.as_database_error().and_then(|db| db.code()).as_deref())
}

fn rejected_cast_code(code: Option<&str>) -> bool {
    code.is_some_and(|c| REJECTED_CAST_CODES.contains(&c))
}

fn row_to_json(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

/// Decode one cell by trying the column types the schema can produce.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
