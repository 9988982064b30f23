use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, TransactionBehavior};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use super::backend::{DatabaseBackend, UpdateOptions, UpdateOutcome};
use super::sanitize::{validate_collection_name, validate_identifier};
use crate::types::Document;

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
PRAGMA busy_timeout = 5000;
"#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, created_at);
"#;

const SELECT_DOC: &str = "SELECT id, collection, data, created_at, updated_at FROM documents";

pub struct SqliteBackend {
  conn: Connection,
}

impl SqliteBackend {
  pub async fn new(path: &str) -> Result<Self, anyhow::Error> {
    let conn = if path == ":memory:" {
      Connection::open_in_memory().await?
    } else {
      Connection::open(path).await?
    };

    conn
      .call(|conn| conn.execute_batch(PRAGMAS).map_err(|e| e.into()))
      .await?;

    Ok(Self { conn })
  }

  pub async fn in_memory() -> Result<Self, anyhow::Error> {
    Self::new(":memory:").await
  }
}

/// JSON path for a validated top-level field.
fn field_path(field: &str) -> Result<String, anyhow::Error> {
  validate_identifier(field)?;
  Ok(format!("$.{}", field))
}

/// JSON text of `data[field]`, compared through `json_extract(?, '$')`.
fn json_key(data: &serde_json::Value, field: &str) -> Result<String, serde_json::Error> {
  serde_json::to_string(data.get(field).unwrap_or(&serde_json::Value::Null))
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
  fn name(&self) -> &'static str {
    "sqlite"
  }

  async fn init_schema(&self) -> Result<(), anyhow::Error> {
    self
      .conn
      .call(|conn| conn.execute_batch(SCHEMA).map_err(|e| e.into()))
      .await?;
    tracing::info!("SQLite schema initialized");
    Ok(())
  }

  async fn ping(&self) -> Result<(), anyhow::Error> {
    self
      .conn
      .call(|conn| {
        conn
          .query_row("SELECT 1", [], |_| Ok(()))
          .map_err(|e| e.into())
      })
      .await?;
    Ok(())
  }

  async fn insert(
    &self,
    collection: &str,
    data: serde_json::Value,
    unique: Option<&str>,
  ) -> Result<Option<Document>, anyhow::Error> {
    validate_collection_name(collection)?;
    let unique = match unique {
      Some(field) => Some((field_path(field)?, json_key(&data, field)?)),
      None => None,
    };

    let doc = new_document(collection, data);
    let row = DocRow::from_doc(&doc)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some((path, key)) = &unique {
          let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND json_extract(data, ?2) = json_extract(?3, '$'))",
            params![row.collection, path, key],
            |r| r.get(0),
          )?;
          if taken {
            return Ok(false);
          }
        }
        row.insert(&tx)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(inserted.then_some(doc))
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, anyhow::Error> {
    validate_collection_name(collection)?;

    let col = collection.to_string();
    let id_str = id.to_string();

    let doc = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "{} WHERE collection = ?1 AND id = ?2",
          SELECT_DOC
        ))?;
        let mut rows = stmt.query(params![col, id_str])?;
        match rows.next()? {
          Some(row) => Ok(Some(row_to_doc(row)?)),
          None => Ok(None),
        }
      })
      .await?;
    Ok(doc)
  }

  async fn find_by_field(
    &self,
    collection: &str,
    field: &str,
    value: &serde_json::Value,
  ) -> Result<Vec<Document>, anyhow::Error> {
    validate_collection_name(collection)?;
    let path = field_path(field)?;
    let key = serde_json::to_string(value)?;
    let col = collection.to_string();

    let docs = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "{} WHERE collection = ?1 AND json_extract(data, ?2) = json_extract(?3, '$') ORDER BY created_at",
          SELECT_DOC
        ))?;
        let mut rows = stmt.query(params![col, path, key])?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
          docs.push(row_to_doc(row)?);
        }
        Ok(docs)
      })
      .await?;
    Ok(docs)
  }

  async fn update(
    &self,
    collection: &str,
    id: Uuid,
    data: serde_json::Value,
    opts: UpdateOptions<'_>,
  ) -> Result<UpdateOutcome, anyhow::Error> {
    validate_collection_name(collection)?;
    let unique = match opts.unique {
      Some(field) => Some((field_path(field)?, json_key(&data, field)?)),
      None => None,
    };
    let keep = opts.keep.map(field_path).transpose()?;

    let col = collection.to_string();
    let id_str = id.to_string();
    let data_str = serde_json::to_string(&data)?;
    let now_str = Utc::now().to_rfc3339();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: bool = tx.query_row(
          "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2)",
          params![col, id_str],
          |r| r.get(0),
        )?;
        if !exists {
          return Ok(UpdateOutcome::NotFound);
        }

        if let Some((path, key)) = &unique {
          let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id != ?2 AND json_extract(data, ?3) = json_extract(?4, '$'))",
            params![col, id_str, path, key],
            |r| r.get(0),
          )?;
          if taken {
            return Ok(UpdateOutcome::Conflict);
          }
        }

        match &keep {
          Some(path) => tx.execute(
            "UPDATE documents
             SET data = CASE WHEN json_type(data, ?5) IS NULL THEN ?1 ELSE json_set(?1, ?5, json(data -> ?5)) END,
                 updated_at = ?2
             WHERE collection = ?3 AND id = ?4",
            params![data_str, now_str, col, id_str, path],
          )?,
          None => tx.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![data_str, now_str, col, id_str],
          )?,
        };

        let doc = tx.query_row(
          &format!("{} WHERE id = ?1", SELECT_DOC),
          params![id_str],
          row_to_doc,
        )?;
        tx.commit()?;
        Ok(UpdateOutcome::Updated(doc))
      })
      .await?;
    Ok(outcome)
  }

  async fn delete(&self, collection: &str, id: Uuid) -> Result<u64, anyhow::Error> {
    validate_collection_name(collection)?;

    let col = collection.to_string();
    let id_str = id.to_string();

    let removed = self
      .conn
      .call(move |conn| {
        conn
          .execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![col, id_str],
          )
          .map_err(|e| e.into())
      })
      .await?;
    Ok(removed as u64)
  }

  async fn list(
    &self,
    collection: &str,
    projection: Option<&[&str]>,
  ) -> Result<Vec<Document>, anyhow::Error> {
    validate_collection_name(collection)?;

    let col = collection.to_string();
    let docs = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "{} WHERE collection = ?1 ORDER BY created_at",
          SELECT_DOC
        ))?;
        let mut rows = stmt.query(params![col])?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
          docs.push(row_to_doc(row)?);
        }
        Ok(docs)
      })
      .await?;

    Ok(match projection {
      Some(fields) => docs.into_iter().map(|d| d.project(fields)).collect(),
      None => docs,
    })
  }

  async fn set_exclusive_flag(
    &self,
    collection: &str,
    id: Uuid,
    field: &str,
  ) -> Result<bool, anyhow::Error> {
    validate_collection_name(collection)?;
    let path = field_path(field)?;

    let col = collection.to_string();
    let id_str = id.to_string();
    let now_str = Utc::now().to_rfc3339();

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: bool = tx.query_row(
          "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2)",
          params![col, id_str],
          |r| r.get(0),
        )?;
        if !exists {
          return Ok(false);
        }
        tx.execute(
          "UPDATE documents
           SET data = json_set(data, ?3, json(CASE WHEN id = ?2 THEN 'true' ELSE 'false' END)),
               updated_at = ?4
           WHERE collection = ?1",
          params![col, id_str, path, now_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(found)
  }
}

fn new_document(collection: &str, data: serde_json::Value) -> Document {
  let now = Utc::now();
  Document {
    id: Uuid::new_v4(),
    collection: collection.into(),
    data,
    created_at: now,
    updated_at: now,
  }
}

/// Owned column values of a document, movable into a connection call.
struct DocRow {
  id: String,
  collection: String,
  data: String,
  created_at: String,
  updated_at: String,
}

impl DocRow {
  fn from_doc(doc: &Document) -> Result<Self, serde_json::Error> {
    Ok(Self {
      id: doc.id.to_string(),
      collection: doc.collection.clone(),
      data: serde_json::to_string(&doc.data)?,
      created_at: doc.created_at.to_rfc3339(),
      updated_at: doc.updated_at.to_rfc3339(),
    })
  }

  fn insert(&self, conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
      "INSERT INTO documents (id, collection, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
      params![self.id, self.collection, self.data, self.created_at, self.updated_at],
    )?;
    Ok(())
  }
}

fn row_to_doc(row: &rusqlite::Row) -> Result<Document, rusqlite::Error> {
  let id_str: String = row.get(0)?;
  let data_str: String = row.get(2)?;
  let created_str: String = row.get(3)?;
  let updated_str: String = row.get(4)?;
  Ok(Document {
    id: id_str.parse().unwrap_or_default(),
    collection: row.get(1)?,
    data: serde_json::from_str(&data_str).unwrap_or(serde_json::Value::Null),
    created_at: chrono::DateTime::parse_from_rfc3339(&created_str)
      .map(|d| d.with_timezone(&Utc))
      .unwrap_or_else(|_| Utc::now()),
    updated_at: chrono::DateTime::parse_from_rfc3339(&updated_str)
      .map(|d| d.with_timezone(&Utc))
      .unwrap_or_else(|_| Utc::now()),
  })
}
