//! Example consumer: loads a schema document and serves its tables from PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use entity_engine::{common_routes, entity_routes, load_from_path, AppState, PgStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entity_engine=info")),
        )
        .init();

    let schema_path = std::env::var("SCHEMA_PATH").unwrap_or_else(|_| "schema.json".into());
    let load = load_from_path(&schema_path).await?;
    for failure in &load.failures {
        tracing::error!(error = %failure, "table skipped");
    }
    let registry = Arc::new(load.registry);

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/entities".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    let store = PgStore::new(pool, Arc::clone(&registry));
    let state = AppState::new(Arc::new(store), registry);

    let app = common_routes().merge(entity_routes(state));
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
