//! Entity CRUD handlers. Each route carries its table in a [`TableRoute`] extension.

use crate::config::{FieldType, TableDescriptor};
use crate::error::AppError;
use crate::response::{success_created, success_many, success_one};
use crate::service::EntityService;
use crate::state::AppState;
use crate::store::Record;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::Value;
use std::sync::Arc;

/// Table served by the matched route.
#[derive(Clone, Debug)]
pub struct TableRoute(pub Arc<str>);

fn table<'s>(state: &'s AppState, route: &TableRoute) -> Result<&'s Arc<TableDescriptor>, AppError> {
    Ok(state.registry.require(&route.0)?)
}

fn parse_id(id_str: &str, table: &TableDescriptor) -> Result<Value, AppError> {
    let field_type = table.primary_field().map(|f| f.field_type);
    Ok(match field_type {
        Some(FieldType::Uuid) => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        Some(FieldType::Integer | FieldType::Increments) => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        _ => Value::String(id_str.to_string()),
    })
}

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(route): Extension<TableRoute>,
) -> Result<impl IntoResponse, AppError> {
    let rows = EntityService::new(state.store.as_ref(), &state.registry)
        .list(&route.0)
        .await?;
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(route): Extension<TableRoute>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let inputs = body_to_record(body)?;
    let row = EntityService::new(state.store.as_ref(), &state.registry)
        .create(&route.0, &inputs)
        .await?;
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Extension(route): Extension<TableRoute>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str, table(&state, &route)?)?;
    let row = EntityService::new(state.store.as_ref(), &state.registry)
        .read(&route.0, &id)
        .await?;
    Ok(success_one(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(route): Extension<TableRoute>,
    Path(id_str): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str, table(&state, &route)?)?;
    let inputs = body_to_record(body)?;
    let row = EntityService::new(state.store.as_ref(), &state.registry)
        .update(&route.0, &id, &inputs)
        .await?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(route): Extension<TableRoute>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str, table(&state, &route)?)?;
    EntityService::new(state.store.as_ref(), &state.registry)
        .delete(&route.0, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
