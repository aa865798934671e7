//! Candidate values checked against field descriptors before create/update.

use crate::config::{FieldDescriptor, FieldType, SchemaRegistry, TableDescriptor};
use crate::error::AppError;
use crate::store::{Record, Store};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// One failed check on one field. Serializes flat:
/// `{ "name": "title", "value": "ab", "type": "error-minimum-value", "min": 3 }`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub name: String,
    pub value: Value,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ViolationKind {
    #[serde(rename = "error-not-unique")]
    NotUnique,
    #[serde(rename = "error-minimum-value")]
    Minimum { min: i64 },
    #[serde(rename = "error-maximum-value")]
    Maximum { max: i64 },
    #[serde(rename = "error-required")]
    Required,
    #[serde(rename = "error-invalid-uuid")]
    InvalidUuid,
    #[serde(rename = "error-invalid-type")]
    InvalidType { expected: String, found: String },
    #[serde(rename = "error-invalid-foreign-id")]
    InvalidForeignId,
}

impl ViolationKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ViolationKind::NotUnique => "error-not-unique",
            ViolationKind::Minimum { .. } => "error-minimum-value",
            ViolationKind::Maximum { .. } => "error-maximum-value",
            ViolationKind::Required => "error-required",
            ViolationKind::InvalidUuid => "error-invalid-uuid",
            ViolationKind::InvalidType { .. } => "error-invalid-type",
            ViolationKind::InvalidForeignId => "error-invalid-foreign-id",
        }
    }
}

pub struct ValueValidator<'a> {
    store: &'a dyn Store,
    registry: &'a SchemaRegistry,
}

impl<'a> ValueValidator<'a> {
    pub fn new(store: &'a dyn Store, registry: &'a SchemaRegistry) -> Self {
        ValueValidator { store, registry }
    }

    /// Check every fillable field of `table`. All violations are returned
    /// together; only store failures abort the pass.
    pub async fn validate(
        &self,
        table: &TableDescriptor,
        values: &Record,
        is_update: bool,
    ) -> Result<Vec<Violation>, AppError> {
        let mut violations = Vec::new();
        for field in table.fillable_fields() {
            let value = values.get(&field.name).cloned().unwrap_or(Value::Null);
            for kind in self.check_field(table, field, &value, is_update).await? {
                violations.push(Violation {
                    name: field.name.clone(),
                    value: value.clone(),
                    kind,
                });
            }
        }
        if !violations.is_empty() {
            tracing::debug!(table = %table.name, count = violations.len(), "validation failed");
        }
        Ok(violations)
    }

    async fn check_field(
        &self,
        table: &TableDescriptor,
        field: &FieldDescriptor,
        value: &Value,
        is_update: bool,
    ) -> Result<Vec<ViolationKind>, AppError> {
        let mut found = Vec::new();

        if !is_update
            && (field.is_unique() || field.is_primary())
            && !value.is_null()
            && field.field_type.can_hold(value)
        {
            let existing = self
                .store
                .find_by_predicate(&table.name, &field.name, value)
                .await?;
            if existing.is_some() {
                found.push(ViolationKind::NotUnique);
            }
        }

        if let Some(min) = field.min() {
            if !at_least(value, min) {
                found.push(ViolationKind::Minimum { min });
            }
        }

        if let Some(max) = field.max() {
            if !value.is_null() && !at_most(value, max) {
                found.push(ViolationKind::Maximum { max });
            }
        }

        let implicit = field.is_primary() && !field.is_generated_key() && !is_update;
        if (field.is_required() || implicit) && !is_present(value) {
            found.push(ViolationKind::Required);
        }

        if field.field_type == FieldType::Uuid && !field.is_primary() {
            let skip = value.is_null() && field.is_nullable();
            if !skip && !is_valid_uuid(value) {
                found.push(ViolationKind::InvalidUuid);
            }
        }

        if let Some(expected) = &field.expected {
            if !value.is_null() && !expected.matches(value) {
                found.push(ViolationKind::InvalidType {
                    expected: expected.name().to_string(),
                    found: kind_name(value).to_string(),
                });
            }
        }

        if let Some(foreign) = &field.foreign {
            if value.is_null() {
                if !field.is_nullable() {
                    found.push(ViolationKind::InvalidForeignId);
                }
            } else {
                let target = self.registry.require(&foreign.table)?;
                let key = foreign.field.as_deref().unwrap_or(target.primary_key());
                let castable = target.field(key).map_or(true, |f| f.field_type.can_hold(value));
                let exists = castable
                    && self
                        .store
                        .find_by_predicate(&target.name, key, value)
                        .await?
                        .is_some();
                if !exists {
                    found.push(ViolationKind::InvalidForeignId);
                }
            }
        }

        Ok(found)
    }
}

/// Size of a value for min/max: characters, magnitude, or element count.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        _ => None,
    }
}

fn at_least(value: &Value, min: i64) -> bool {
    measure(value).is_some_and(|m| m >= min as f64)
}

fn at_most(value: &Value, max: i64) -> bool {
    measure(value).is_some_and(|m| m <= max as f64)
}

/// Truthy-only presence: `0`, `false`, `""` and empty collections are absent.
/// Negative numbers count as present.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// 8-4-4-4-12 hex with the variant nibble in 8/9/A/B; any version nibble.
fn uuid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^[0-9A-F]{8}-[0-9A-F]{4}-[0-9A-F]{4}-[89AB][0-9A-F]{3}-[0-9A-F]{12}$").ok()
        })
        .as_ref()
}

fn is_valid_uuid(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    uuid_pattern().is_some_and(|re| re.is_match(s))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
