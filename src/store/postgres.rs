//! PostgreSQL document store: one JSONB `documents` table keyed by (collection, id).

use crate::error::StoreError;
use crate::query::Condition;
use crate::sql::{self, bind_params, bind_params_as, bind_params_scalar, QueryBuf};
use crate::store::{document_id, project, Document, DocumentStore, FindOptions};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

/// Schema holding the documents table. From env `SCHEMA_REST_STORE_SCHEMA`, default `schema_rest`.
pub fn store_schema() -> String {
    std::env::var("SCHEMA_REST_STORE_SCHEMA").unwrap_or_else(|_| "schema_rest".into())
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
    table: String,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, &store_schema())
    }

    pub fn with_schema(pool: PgPool, schema: &str) -> Self {
        PgDocumentStore {
            pool,
            schema: schema.to_string(),
            table: sql::qualified_table(schema, "documents"),
        }
    }

    /// Create the schema and documents table if missing.
    pub async fn ensure_tables(&self) -> Result<(), StoreError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema.replace('"', "\"\"")))
            .execute(&self.pool)
            .await?;
        sqlx::query(&sql::create_documents_table(&self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_docs(&self, q: &QueryBuf) -> Result<Vec<Document>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows: Vec<(Json<Value>,)> = bind_params_as(sqlx::query_as(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(|(Json(v),)| into_document(v)).collect())
    }

    async fn fetch_optional_doc(&self, q: &QueryBuf) -> Result<Option<Document>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row: Option<(Json<Value>,)> = bind_params_as(sqlx::query_as(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(Json(v),)| into_document(v)))
    }

    async fn execute(&self, q: &QueryBuf) -> Result<(), StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        bind_params(sqlx::query(&q.sql), &q.params).execute(&self.pool).await?;
        Ok(())
    }
}

fn into_document(v: Value) -> Option<Document> {
    match v {
        Value::Object(m) => Some(m),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(
        &self,
        collection: &str,
        condition: &Condition,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let q = sql::select(&self.table, collection, condition, options)?;
        let docs = self.fetch_docs(&q).await?;
        Ok(docs
            .into_iter()
            .map(|d| project(d, options.fields.as_deref()))
            .collect())
    }

    async fn count(&self, collection: &str, condition: &Condition) -> Result<u64, StoreError> {
        let q = sql::count(&self.table, collection, condition)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let n: i64 = bind_params_scalar(sqlx::query_scalar(&q.sql), &q.params)
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn find_one(
        &self,
        collection: &str,
        condition: &Condition,
        fields: Option<&[String]>,
    ) -> Result<Option<Document>, StoreError> {
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::default()
        };
        let q = sql::select(&self.table, collection, condition, &options)?;
        Ok(self.fetch_optional_doc(&q).await?.map(|d| project(d, fields)))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        condition: &Condition,
        patch: &Document,
    ) -> Result<Option<Document>, StoreError> {
        let q = sql::update_first(&self.table, collection, condition, patch)?;
        self.fetch_optional_doc(&q).await
    }

    async fn find_one_and_remove(&self, collection: &str, condition: &Condition) -> Result<Option<Document>, StoreError> {
        let q = sql::delete_first(&self.table, collection, condition)?;
        self.fetch_optional_doc(&q).await
    }

    async fn save(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let id = document_id(&document)?;
        let q = sql::upsert(&self.table, collection, id, &document);
        self.execute(&q).await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let q = sql::delete_by_id(&self.table, collection, id);
        self.execute(&q).await
    }
}

/// Create the database named in `database_url` when it does not exist yet.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::InvalidQuery("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
