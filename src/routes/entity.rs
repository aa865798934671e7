//! Entity CRUD routes built from the schema registry.
//! Each table gets `{prefix}/{endpoint}` and `{prefix}/{endpoint}/:id`, limited to its `api.methods`.

use crate::config::ApiSettings;
use crate::handlers::entity::{create, delete as delete_handler, list, read, update, TableRoute};
use crate::state::AppState;
use axum::http::{HeaderValue, Method};
use axum::{routing::MethodRouter, Extension, Router};
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::cors::{AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this size are rejected with 413.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

pub fn entity_routes(state: AppState) -> Router {
    entity_routes_with_limit(state, DEFAULT_BODY_LIMIT)
}

pub fn entity_routes_with_limit(state: AppState, body_limit: usize) -> Router {
    let mut router = Router::new();
    let mut seen = HashSet::new();
    for table in state.registry.tables() {
        let api = &table.api;
        let path = api.collection_path();
        if !seen.insert(path.clone()) {
            tracing::warn!(table = %table.name, path = %path, "route already taken; table not served");
            continue;
        }
        let route = TableRoute(Arc::from(table.name.as_str()));

        let mut collection: MethodRouter<AppState> = MethodRouter::new();
        if api.allows("GET") {
            collection = collection.get(list);
        }
        if api.allows("POST") {
            collection = collection.post(create);
        }
        let mut member: MethodRouter<AppState> = MethodRouter::new();
        if api.allows("GET") {
            member = member.get(read);
        }
        if api.allows("PUT") {
            member = member.put(update);
        }
        if api.allows("DELETE") {
            member = member.delete(delete_handler);
        }

        tracing::debug!(table = %table.name, path = %path, methods = ?api.methods, "serving table");
        let cors = cors_layer(&table.name, api);
        let collection: MethodRouter<AppState> = collection.layer(Extension(route.clone()));
        let member: MethodRouter<AppState> = member.layer(Extension(route));
        router = router
            .route(&path, collection.layer(cors.clone()))
            .route(&format!("{}/:id", path), member.layer(cors));
    }
    router
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// CORS for one table from its `allowedOrigin` and `allowedMethods`.
/// Entries that are not valid header values are skipped with a warning.
fn cors_layer(table: &str, api: &ApiSettings) -> CorsLayer {
    let origin = if split_list(&api.allowed_origin).any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = split_list(&api.allowed_origin)
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(table = %table, origin = %o, "invalid CORS origin ignored");
                    None
                }
            })
            .collect();
        match <[HeaderValue; 1]>::try_from(origins) {
            Ok([single]) => AllowOrigin::exact(single),
            Err(many) => AllowOrigin::list(many),
        }
    };
    let methods = if split_list(&api.allowed_methods).any(|m| m == "*") {
        AllowMethods::any()
    } else {
        let methods: Vec<Method> = split_list(&api.allowed_methods)
            .filter_map(|m| match Method::from_bytes(m.to_ascii_uppercase().as_bytes()) {
                Ok(method) => Some(method),
                Err(_) => {
                    tracing::warn!(table = %table, method = %m, "invalid CORS method ignored");
                    None
                }
            })
            .collect();
        AllowMethods::list(methods)
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(Any)
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}
