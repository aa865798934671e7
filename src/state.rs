//! Shared application state for all routes.

use crate::config::SchemaRegistry;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Built once at startup; read-only afterwards.
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, registry: Arc<SchemaRegistry>) -> Self {
        AppState { store, registry }
    }
}
