//! Typed errors and HTTP mapping.

use crate::service::Violation;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// What is wrong with one field or table descriptor.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DescriptorErrorKind {
    #[error("error-no-options")]
    #[serde(rename = "error-no-options")]
    NoOptions,
    #[error("error-unknown-option")]
    #[serde(rename = "error-unknown-option")]
    UnknownOption,
    #[error("error-too-few-params (minimum {min}, found {found})")]
    #[serde(rename = "error-too-few-params")]
    TooFewParams { min: usize, found: usize },
    #[error("error-too-many-params (maximum {max}, found {found})")]
    #[serde(rename = "error-too-many-params")]
    TooManyParams { max: usize, found: usize },
    #[error("error-no-type")]
    #[serde(rename = "error-no-type")]
    NoType,
    #[error("error-too-many-types ({})", .types.join(", "))]
    #[serde(rename = "error-too-many-types")]
    TooManyTypes { types: Vec<String> },
    #[error("error-malformed-field")]
    #[serde(rename = "error-malformed-field")]
    MalformedField,
    #[error("error-no-fields")]
    #[serde(rename = "error-no-fields")]
    NoFields,
    #[error("error-no-valid-fields")]
    #[serde(rename = "error-no-valid-fields")]
    NoValidFields,
    #[error("error-no-primary")]
    #[serde(rename = "error-no-primary")]
    NoPrimary,
}

impl DescriptorErrorKind {
    pub fn tag(&self) -> &'static str {
        match self {
            DescriptorErrorKind::NoOptions => "error-no-options",
            DescriptorErrorKind::UnknownOption => "error-unknown-option",
            DescriptorErrorKind::TooFewParams { .. } => "error-too-few-params",
            DescriptorErrorKind::TooManyParams { .. } => "error-too-many-params",
            DescriptorErrorKind::NoType => "error-no-type",
            DescriptorErrorKind::TooManyTypes { .. } => "error-too-many-types",
            DescriptorErrorKind::MalformedField => "error-malformed-field",
            DescriptorErrorKind::NoFields => "error-no-fields",
            DescriptorErrorKind::NoValidFields => "error-no-valid-fields",
            DescriptorErrorKind::NoPrimary => "error-no-primary",
        }
    }
}

/// One structured descriptor error. Table-level errors carry no field name.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[error("{kind}{}", location(.table, .field, .option))]
pub struct DescriptorError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    #[serde(flatten)]
    pub kind: DescriptorErrorKind,
}

impl DescriptorError {
    pub fn field(field: &str, kind: DescriptorErrorKind) -> Self {
        DescriptorError {
            table: None,
            field: Some(field.to_string()),
            option: None,
            kind,
        }
    }

    pub fn option(field: &str, option: &str, kind: DescriptorErrorKind) -> Self {
        DescriptorError {
            table: None,
            field: Some(field.to_string()),
            option: Some(option.to_string()),
            kind,
        }
    }

    pub fn table(table: &str, kind: DescriptorErrorKind) -> Self {
        DescriptorError {
            table: Some(table.to_string()),
            field: None,
            option: None,
            kind,
        }
    }

    pub fn in_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }
}

fn location(table: &Option<String>, field: &Option<String>, option: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(table) = table {
        out.push_str(&format!(" table '{}'", table));
    }
    if let Some(field) = field {
        out.push_str(&format!(" field '{}'", field));
    }
    if let Some(option) = option {
        out.push_str(&format!(" option '{}'", option));
    }
    out
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("schema load: {0}")]
    Load(String),
    #[error("table '{table}' has {} descriptor error(s)", .errors.len())]
    Table { table: String, errors: Vec<DescriptorError> },
    #[error("unknown table: {0}")]
    MissingTable(String),
}

/// Failures raised by the persistence collaborator. A missing record is not an
/// error at this level; lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: {0}")]
    Failure(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {} violation(s)", .0.len())]
    Validation(Vec<Violation>),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        let details = match &self {
            AppError::Validation(violations) => serde_json::to_value(violations).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
