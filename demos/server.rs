//! Example server: loads resource schemas from `SCHEMA_PATH`, serves them over PostgreSQL when
//! `DATABASE_URL` is set and over the in-memory store otherwise.

use schema_rest::{app, ensure_database_exists, load_from_path, resolve, AppState, DocumentStore, MemoryStore, PgDocumentStore, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("schema_rest=info".parse()?))
        .init();

    let schema_path = std::env::var("SCHEMA_PATH").unwrap_or_else(|_| "demos/schemas.json".into());
    let registry = resolve(&load_from_path(&schema_path).await?)?;

    let store: Arc<dyn DocumentStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            ensure_database_exists(&database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            let store = PgDocumentStore::new(pool);
            store.ensure_tables().await?;
            Arc::new(store)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let settings = Settings::from_env();
    tracing::info!(resources = registry.resources.len(), prefix = %settings.prefix, "schemas loaded");
    let state = AppState::new(registry, store, settings);

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
