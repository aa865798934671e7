//! Resolved descriptors: option strings validated and flattened for runtime use.

use crate::entity::FetchPolicy;
use crate::error::ConfigError;
use crate::naming::{join_column, link_table_name};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage or relation type of a field. Exactly one per field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Uuid,
    String,
    Integer,
    Float,
    Boolean,
    Text,
    Date,
    DateTime,
    Increments,
    OneToMany,
    ManyToMany,
}

impl FieldType {
    /// Resolve a type option name, normalizing `int` and `bool`.
    pub fn from_option(name: &str) -> Option<Self> {
        Some(match name {
            "uuid" => FieldType::Uuid,
            "string" => FieldType::String,
            "int" | "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "bool" | "boolean" => FieldType::Boolean,
            "text" => FieldType::Text,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "increments" => FieldType::Increments,
            "one-to-many" => FieldType::OneToMany,
            "many-to-many" => FieldType::ManyToMany,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Uuid => "uuid",
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Increments => "increments",
            FieldType::OneToMany => "one-to-many",
            FieldType::ManyToMany => "many-to-many",
        }
    }

    /// Relation markers have no column of their own.
    pub fn is_relation(&self) -> bool {
        matches!(self, FieldType::OneToMany | FieldType::ManyToMany)
    }

    /// PostgreSQL cast applied to bound values for this column type.
    pub fn pg_cast(&self) -> Option<&'static str> {
        match self {
            FieldType::Uuid => Some("uuid"),
            FieldType::String | FieldType::Text => Some("text"),
            FieldType::Integer | FieldType::Increments => Some("bigint"),
            FieldType::Float => Some("double precision"),
            FieldType::Boolean => Some("boolean"),
            FieldType::Date => Some("date"),
            FieldType::DateTime => Some("timestamp"),
            FieldType::OneToMany | FieldType::ManyToMany => None,
        }
    }

    /// Whether `value` can be compared against a column of this type without
    /// a failed cast. Relation types have no column and hold nothing.
    pub fn can_hold(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::OneToMany | FieldType::ManyToMany, _) => false,
            (_, Value::Array(_) | Value::Object(_)) => false,
            (FieldType::Integer | FieldType::Increments, Value::Number(n)) => n.is_i64(),
            (FieldType::Integer | FieldType::Increments, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Float, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (FieldType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s).is_ok(),
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Date | FieldType::DateTime, Value::String(_)) => true,
            (FieldType::String | FieldType::Text, _) => true,
            _ => false,
        }
    }
}

/// Typed option parameter, resolved once from the registry's declared kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Integer(i64),
    Text(String),
}

impl Param {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Param::Integer(n) => Some(*n),
            Param::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Text(s) => Some(s.as_str()),
            Param::Integer(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldOption {
    pub name: String,
    pub params: Vec<Param>,
}

/// Link table of a many-to-many relation: `<source>_<target>_link` with
/// `<source>_id` / `<target>_id` join columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkTable {
    pub table: String,
    pub source_column: String,
    pub target_column: String,
}

impl LinkTable {
    pub fn between(source: &str, target: &str) -> Self {
        LinkTable {
            table: link_table_name(source, target),
            source_column: join_column(source),
            target_column: join_column(target),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationKind {
    /// This column holds a value of `table.field`; hydrated under `alias`.
    OneToOne {
        table: String,
        field: String,
        alias: Option<String>,
    },
    /// Records of `table` whose `field` equals our primary key.
    OneToMany { table: String, field: String },
    /// Records of `table` linked through `link`. `field` is the target join
    /// column; the target's primary key when absent.
    ManyToMany {
        table: String,
        field: Option<String>,
        link: LinkTable,
    },
}

impl RelationKind {
    pub fn target_table(&self) -> &str {
        match self {
            RelationKind::OneToOne { table, .. }
            | RelationKind::OneToMany { table, .. }
            | RelationKind::ManyToMany { table, .. } => table,
        }
    }
}

/// Reference checked by the foreign-existence rule. `field: None` means the
/// target table's primary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignRef {
    pub table: String,
    pub field: Option<String>,
}

/// Runtime kind demanded by the `type` option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpectedKind {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    Array,
    /// Unrecognized kind name; no value ever matches it.
    Other(String),
}

impl ExpectedKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "string" => ExpectedKind::String,
            "integer" | "int" => ExpectedKind::Integer,
            "float" => ExpectedKind::Float,
            "decimal" => ExpectedKind::Decimal,
            "boolean" | "bool" => ExpectedKind::Boolean,
            "array" => ExpectedKind::Array,
            other => ExpectedKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExpectedKind::String => "string",
            ExpectedKind::Integer => "integer",
            ExpectedKind::Float => "float",
            ExpectedKind::Decimal => "decimal",
            ExpectedKind::Boolean => "boolean",
            ExpectedKind::Array => "array",
            ExpectedKind::Other(name) => name,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ExpectedKind::String => value.is_string(),
            ExpectedKind::Integer => value.is_i64() || value.is_u64(),
            ExpectedKind::Float | ExpectedKind::Decimal => value.is_number(),
            ExpectedKind::Boolean => value.is_boolean(),
            ExpectedKind::Array => value.is_array() || value.is_object(),
            ExpectedKind::Other(_) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub options: Vec<FieldOption>,
    pub field_type: FieldType,
    /// Parameters of the type option itself (e.g. string length).
    pub type_params: Vec<Param>,
    pub relation: Option<RelationKind>,
    pub foreign: Option<ForeignRef>,
    pub expected: Option<ExpectedKind>,
    /// `default` literal resolved against the field type.
    pub default: Option<Value>,
}

impl FieldDescriptor {
    pub fn option(&self, name: &str) -> Option<&FieldOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.option(name).is_some()
    }

    fn int_param(&self, name: &str) -> Option<i64> {
        self.option(name)
            .and_then(|o| o.params.first())
            .and_then(Param::as_i64)
    }

    pub fn min(&self) -> Option<i64> {
        self.int_param("min")
    }

    pub fn max(&self) -> Option<i64> {
        self.int_param("max")
    }

    pub fn string_length(&self) -> Option<i64> {
        self.type_params.first().and_then(Param::as_i64)
    }

    pub fn is_primary(&self) -> bool {
        self.has_option("primary")
    }

    pub fn is_unique(&self) -> bool {
        self.has_option("unique")
    }

    pub fn is_required(&self) -> bool {
        self.has_option("required")
    }

    pub fn is_nullable(&self) -> bool {
        self.has_option("nullable")
    }

    pub fn is_omitted(&self) -> bool {
        self.has_option("omit")
    }

    pub fn is_indexed(&self) -> bool {
        self.has_option("index")
    }

    /// Name under which a one-to-one relation is exposed.
    pub fn alias(&self) -> Option<&str> {
        match &self.relation {
            Some(RelationKind::OneToOne { alias, .. }) => alias.as_deref(),
            _ => None,
        }
    }

    /// Primary key filled in by the system (auto-increment or generated uuid).
    pub fn is_generated_key(&self) -> bool {
        self.field_type == FieldType::Increments
            || (self.is_primary() && self.field_type == FieldType::Uuid)
    }
}

/// `api` section of a table, with defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiSettings {
    pub prefix: String,
    pub endpoint: String,
    pub methods: Vec<String>,
    pub middleware: String,
    /// Default fetch policy for reads of this table.
    pub fetchable: FetchPolicy,
    pub fetch_on_store: bool,
    pub fetch_on_update: bool,
    pub allowed_origin: String,
    pub allowed_methods: String,
}

impl ApiSettings {
    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Route of the collection, e.g. `/v1/posts`.
    pub fn collection_path(&self) -> String {
        let prefix = self.prefix.trim_matches('/');
        let endpoint = self.endpoint.trim_matches('/');
        if prefix.is_empty() {
            format!("/{}", endpoint)
        } else {
            format!("/{}/{}", prefix, endpoint)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    /// Valid fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    pub primary: String,
    pub indexed: Vec<String>,
    /// Fields settable from caller input.
    pub fillable: Vec<String>,
    pub sort: i64,
    pub api: ApiSettings,
}

impl TableDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_field(&self) -> Option<&FieldDescriptor> {
        self.field(&self.primary)
    }

    pub fn primary_key(&self) -> &str {
        &self.primary
    }

    pub fn fillable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fillable.iter().filter_map(|name| self.field(name))
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &RelationKind)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation.as_ref().map(|r| (f, r)))
    }

    pub fn many_to_many_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &String, Option<&String>, &LinkTable)> {
        self.fields.iter().filter_map(|f| match &f.relation {
            Some(RelationKind::ManyToMany { table, field, link }) => Some((f, table, field.as_ref(), link)),
            _ => None,
        })
    }
}

/// Table name → descriptor. Built once at schema load, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, Arc<TableDescriptor>>,
    order: Vec<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    /// Add a table, keeping iteration ordered by sort rank then name.
    pub fn insert(&mut self, table: TableDescriptor) {
        let name = table.name.clone();
        if self.tables.insert(name.clone(), Arc::new(table)).is_none() {
            self.order.push(name);
        }
        let tables = &self.tables;
        self.order
            .sort_by_key(|n| (tables.get(n).map(|t| t.sort).unwrap_or_default(), n.clone()));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableDescriptor>> {
        self.tables.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Arc<TableDescriptor>, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::MissingTable(name.to_string()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDescriptor>> {
        self.order.iter().filter_map(|n| self.tables.get(n))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Join column on the target of a many-to-many relation.
    pub fn target_join_field<'a>(&'a self, table: &'a str, field: Option<&'a String>) -> Result<&'a str, ConfigError> {
        match field {
            Some(f) => Ok(f.as_str()),
            None => Ok(self.require(table)?.primary_key()),
        }
    }

    /// Cast for a bound value compared against `table.column`, link tables included.
    pub fn column_cast(&self, table: &str, column: &str) -> Option<&'static str> {
        if let Some(desc) = self.get(table) {
            return desc.field(column).and_then(|f| f.field_type.pg_cast());
        }
        self.tables().find_map(|desc| {
            desc.many_to_many_fields().find_map(|(_, target, _, link)| {
                if link.table != table {
                    return None;
                }
                let side = if column == link.source_column {
                    Some(&**desc)
                } else if column == link.target_column {
                    self.get(target).map(|t| &**t)
                } else {
                    None
                };
                side.and_then(|t| t.primary_field()).and_then(|f| f.field_type.pg_cast())
            })
        })
    }
}
