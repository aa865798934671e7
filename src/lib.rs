//! Entity engine: schema-driven tables with a terse field grammar, value
//! validation, policy-bounded relation fetch and projection, served over HTTP.

pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod naming;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{
    build_table_descriptor, load_from_path, load_from_str, parse_field, FieldDescriptor, FieldOptions, Registries,
    SchemaLoad, SchemaRegistry, TableDescriptor,
};
pub use entity::{Entity, FetchPolicy, Related};
pub use error::{AppError, ConfigError, DescriptorError, DescriptorErrorKind, StoreError};
pub use routes::{common_routes, entity_routes};
pub use service::{project, EntityService, FetchEngine, ManyToManyMutator, ValueValidator, Violation, ViolationKind};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Record, Store};
