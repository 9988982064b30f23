use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use super::backend::{DatabaseBackend, UpdateOptions, UpdateOutcome};
use super::sanitize::{validate_collection_name, validate_identifier};
use crate::types::Document;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    collection VARCHAR(255) NOT NULL,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, created_at);
CREATE INDEX IF NOT EXISTS idx_documents_data ON documents USING GIN(data);
"#;

const RETURNING_DOC: &str = "RETURNING id, collection, data, created_at, updated_at";
const SELECT_DOC: &str = "SELECT id, collection, data, created_at, updated_at FROM documents";

/// Serializes writers of one collection for the rest of the transaction.
const LOCK_COLLECTION: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

pub struct PostgresBackend {
  pool: Pool,
}

impl PostgresBackend {
  pub fn new(url: &str, max_connections: usize) -> Result<Self, anyhow::Error> {
    let mut cfg = Config::new();
    cfg.url = Some(url.into());
    cfg.manager = Some(ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_connections));
    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
    Ok(Self { pool })
  }
}

fn row_to_doc(r: Row) -> Document {
  Document {
    id: r.get(0),
    collection: r.get(1),
    data: r.get(2),
    created_at: r.get(3),
    updated_at: r.get(4),
  }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
  fn name(&self) -> &'static str {
    "postgres"
  }

  async fn init_schema(&self) -> Result<(), anyhow::Error> {
    self.pool.get().await?.batch_execute(SCHEMA).await?;
    tracing::info!("PostgreSQL schema initialized");
    Ok(())
  }

  async fn ping(&self) -> Result<(), anyhow::Error> {
    self.pool.get().await?.simple_query("SELECT 1").await?;
    Ok(())
  }

  async fn insert(
    &self,
    collection: &str,
    data: serde_json::Value,
    unique: Option<&str>,
  ) -> Result<Option<Document>, anyhow::Error> {
    validate_collection_name(collection)?;
    if let Some(field) = unique {
      validate_identifier(field)?;
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    let mut client = self.pool.get().await?;
    let tx = client.transaction().await?;
    tx.execute(LOCK_COLLECTION, &[&collection]).await?;

    if let Some(field) = unique {
      let key = data.get(field).cloned().unwrap_or(serde_json::Value::Null);
      let taken = tx
        .query_opt(
          "SELECT 1 FROM documents WHERE collection = $1 AND data -> $2::text = $3::jsonb LIMIT 1",
          &[&collection, &field, &key],
        )
        .await?
        .is_some();
      if taken {
        tx.rollback().await?;
        return Ok(None);
      }
    }

    let row = tx
      .query_one(
        &format!(
          "INSERT INTO documents (id, collection, data, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) {}",
          RETURNING_DOC
        ),
        &[&id, &collection, &data, &now],
      )
      .await?;
    tx.commit().await?;
    Ok(Some(row_to_doc(row)))
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, anyhow::Error> {
    validate_collection_name(collection)?;

    let row = self
      .pool
      .get()
      .await?
      .query_opt(
        &format!("{} WHERE collection = $1 AND id = $2", SELECT_DOC),
        &[&collection, &id],
      )
      .await?;
    Ok(row.map(row_to_doc))
  }

  async fn find_by_field(
    &self,
    collection: &str,
    field: &str,
    value: &serde_json::Value,
  ) -> Result<Vec<Document>, anyhow::Error> {
    validate_collection_name(collection)?;
    validate_identifier(field)?;

    let rows = self
      .pool
      .get()
      .await?
      .query(
        &format!(
          "{} WHERE collection = $1 AND data -> $2::text = $3::jsonb ORDER BY created_at",
          SELECT_DOC
        ),
        &[&collection, &field, value],
      )
      .await?;
    Ok(rows.into_iter().map(row_to_doc).collect())
  }

  async fn update(
    &self,
    collection: &str,
    id: Uuid,
    data: serde_json::Value,
    opts: UpdateOptions<'_>,
  ) -> Result<UpdateOutcome, anyhow::Error> {
    validate_collection_name(collection)?;
    for field in [opts.unique, opts.keep].into_iter().flatten() {
      validate_identifier(field)?;
    }

    let now = Utc::now();
    let mut client = self.pool.get().await?;
    let tx = client.transaction().await?;
    tx.execute(LOCK_COLLECTION, &[&collection]).await?;

    let exists = tx
      .query_opt(
        "SELECT 1 FROM documents WHERE collection = $1 AND id = $2",
        &[&collection, &id],
      )
      .await?
      .is_some();
    if !exists {
      tx.rollback().await?;
      return Ok(UpdateOutcome::NotFound);
    }

    if let Some(field) = opts.unique {
      let key = data.get(field).cloned().unwrap_or(serde_json::Value::Null);
      let taken = tx
        .query_opt(
          "SELECT 1 FROM documents WHERE collection = $1 AND id <> $2 AND data -> $3::text = $4::jsonb LIMIT 1",
          &[&collection, &id, &field, &key],
        )
        .await?
        .is_some();
      if taken {
        tx.rollback().await?;
        return Ok(UpdateOutcome::Conflict);
      }
    }

    let row = match opts.keep {
      Some(field) => {
        tx.query_one(
          &format!(
            "UPDATE documents
             SET data = COALESCE(jsonb_set($1::jsonb, ARRAY[$5::text], data -> $5::text), $1::jsonb),
                 updated_at = $2
             WHERE collection = $3 AND id = $4 {}",
            RETURNING_DOC
          ),
          &[&data, &now, &collection, &id, &field],
        )
        .await?
      }
      None => {
        tx.query_one(
          &format!(
            "UPDATE documents SET data = $1, updated_at = $2 WHERE collection = $3 AND id = $4 {}",
            RETURNING_DOC
          ),
          &[&data, &now, &collection, &id],
        )
        .await?
      }
    };
    tx.commit().await?;
    Ok(UpdateOutcome::Updated(row_to_doc(row)))
  }

  async fn delete(&self, collection: &str, id: Uuid) -> Result<u64, anyhow::Error> {
    validate_collection_name(collection)?;

    let removed = self
      .pool
      .get()
      .await?
      .execute(
        "DELETE FROM documents WHERE collection = $1 AND id = $2",
        &[&collection, &id],
      )
      .await?;
    Ok(removed)
  }

  async fn list(
    &self,
    collection: &str,
    projection: Option<&[&str]>,
  ) -> Result<Vec<Document>, anyhow::Error> {
    validate_collection_name(collection)?;

    let rows = self
      .pool
      .get()
      .await?
      .query(
        &format!("{} WHERE collection = $1 ORDER BY created_at", SELECT_DOC),
        &[&collection],
      )
      .await?;

    let docs = rows.into_iter().map(row_to_doc);
    Ok(match projection {
      Some(fields) => docs.map(|d| d.project(fields)).collect(),
      None => docs.collect(),
    })
  }

  async fn set_exclusive_flag(
    &self,
    collection: &str,
    id: Uuid,
    field: &str,
  ) -> Result<bool, anyhow::Error> {
    validate_collection_name(collection)?;
    validate_identifier(field)?;

    let now = Utc::now();
    let mut client = self.pool.get().await?;
    let tx = client.transaction().await?;
    tx.execute(LOCK_COLLECTION, &[&collection]).await?;

    let changed = tx
      .execute(
        "UPDATE documents
         SET data = jsonb_set(data, ARRAY[$3::text], to_jsonb(id = $2)), updated_at = $4
         WHERE collection = $1
           AND EXISTS (SELECT 1 FROM documents WHERE collection = $1 AND id = $2)",
        &[&collection, &id, &field, &now],
      )
      .await?;
    tx.commit().await?;
    Ok(changed > 0)
  }
}
