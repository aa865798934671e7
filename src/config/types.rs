//! Raw schema document types, as read from JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level schema document: `{ "tables": { "<name>": { ... } } }`.
///
/// Tables are kept as raw JSON so that one malformed table fails on its own
/// instead of rejecting the whole document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub tables: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawTable {
    /// Field name -> option string. Anything but an object of strings is malformed.
    #[serde(default)]
    pub fields: Option<Value>,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub sort: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub methods: Option<Vec<String>>,
    #[serde(default)]
    pub middleware: Option<String>,
    /// `true`, `false`, or a nested object of per-relation policies.
    #[serde(default)]
    pub fetchable: Option<Value>,
    #[serde(default)]
    pub fetch_on_store: bool,
    #[serde(default)]
    pub fetch_on_update: bool,
    /// CORS origin(s): `"*"` or a comma-separated list.
    #[serde(default)]
    pub allowed_origin: Option<String>,
    /// CORS methods: `"*"` or a comma-separated list.
    #[serde(default)]
    pub allowed_methods: Option<String>,
}
