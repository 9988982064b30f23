use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{Crud, StoreError};
use crate::db::{DatabaseBackend, UpdateOptions, UpdateOutcome};
use crate::types::Config;

/// Collection holding every config document.
pub const CONFIG_COLLECTION: &str = "config";

/// Deadlines applied to each backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
  /// Single-document reads and all writes.
  pub point: Duration,
  /// Collection listings.
  pub list: Duration,
}

impl Default for StoreTimeouts {
  fn default() -> Self {
    Self {
      point: Duration::from_secs(5),
      list: Duration::from_secs(15),
    }
  }
}

/// Config persistence with name uniqueness and the single-active rule.
pub struct ConfigStore {
  backend: Arc<dyn DatabaseBackend>,
  timeouts: StoreTimeouts,
}

async fn bounded<T>(
  limit: Duration,
  fut: impl Future<Output = Result<T, anyhow::Error>>,
) -> Result<T, StoreError> {
  match tokio::time::timeout(limit, fut).await {
    Ok(res) => res.map_err(StoreError::Backend),
    Err(_) => Err(StoreError::Timeout(limit)),
  }
}

fn parse_id(id: &str) -> Result<Uuid, StoreError> {
  Uuid::parse_str(id).map_err(|_| StoreError::InvalidIdentifier(id.to_string()))
}

fn not_found(id: impl std::fmt::Display) -> StoreError {
  StoreError::NotFound(format!("config {}", id))
}

impl ConfigStore {
  pub fn new(backend: Arc<dyn DatabaseBackend>) -> Self {
    Self {
      backend,
      timeouts: StoreTimeouts::default(),
    }
  }

  pub fn with_timeouts(mut self, timeouts: StoreTimeouts) -> Self {
    self.timeouts = timeouts;
    self
  }

  pub fn timeouts(&self) -> StoreTimeouts {
    self.timeouts
  }

  /// Make `id` the only active config.
  ///
  /// Clearing every other config and setting this one happen in a single
  /// backend write. An unknown id fails with `NotFound` before anything is
  /// written, so the previous active config stays active.
  pub async fn activate(&self, id: &str) -> Result<(), StoreError> {
    let uuid = parse_id(id)?;
    let found = bounded(
      self.timeouts.point,
      self
        .backend
        .set_exclusive_flag(CONFIG_COLLECTION, uuid, Config::ACTIVE_FIELD),
    )
    .await?;
    if !found {
      return Err(not_found(uuid));
    }
    tracing::info!(config = %uuid, "Config activated");
    Ok(())
  }

  /// The config currently marked active, if any.
  pub async fn active(&self) -> Result<Option<Config>, StoreError> {
    let docs = bounded(
      self.timeouts.point,
      self
        .backend
        .find_by_field(CONFIG_COLLECTION, Config::ACTIVE_FIELD, &Value::Bool(true)),
    )
    .await?;
    if docs.len() > 1 {
      tracing::warn!(count = docs.len(), "More than one config is marked active");
    }
    match docs.into_iter().next() {
      Some(doc) => Ok(Some(Config::from_document(doc)?)),
      None => Ok(None),
    }
  }

  /// Round trip to the backing store.
  pub async fn ping(&self) -> Result<(), StoreError> {
    bounded(self.timeouts.point, self.backend.ping()).await
  }
}

#[async_trait]
impl Crud<Config, String> for ConfigStore {
  /// New configs are always stored inactive; caller ids are discarded.
  async fn create(&self, mut conf: Config) -> Result<String, StoreError> {
    conf.id = None;
    conf.active = false;
    let data = conf.to_document_data()?;

    let inserted = bounded(
      self.timeouts.point,
      self
        .backend
        .insert(CONFIG_COLLECTION, data, Some(Config::NAME_FIELD)),
    )
    .await?;

    match inserted {
      Some(doc) => {
        tracing::info!(config = %doc.id, name = %conf.name, "Config created");
        Ok(doc.id.to_string())
      }
      None => Err(StoreError::Duplicate {
        entity: "config",
        reason: format!("document with {} already exists", conf.name),
      }),
    }
  }

  async fn read_one(&self, id: String) -> Result<Config, StoreError> {
    let uuid = parse_id(&id)?;
    let doc = bounded(
      self.timeouts.point,
      self.backend.get(CONFIG_COLLECTION, uuid),
    )
    .await?
    .ok_or_else(|| not_found(uuid))?;
    Ok(Config::from_document(doc)?)
  }

  /// Listing projected to `_id`, `name` and `active`.
  async fn read_many(&self) -> Result<Vec<Config>, StoreError> {
    let docs = bounded(
      self.timeouts.list,
      self
        .backend
        .list(CONFIG_COLLECTION, Some(&Config::SUMMARY_FIELDS[..])),
    )
    .await?;
    docs
      .into_iter()
      .map(|doc| Config::from_document(doc).map_err(StoreError::from))
      .collect()
  }

  /// Replace the config named by `conf.id`.
  ///
  /// The stored `active` flag is kept regardless of `conf.active`; only
  /// `activate` changes it. Renaming onto another config's name is a
  /// `Duplicate`.
  async fn update(&self, mut conf: Config) -> Result<(), StoreError> {
    let raw = conf.id.take().unwrap_or_default();
    let uuid = parse_id(&raw)?;
    let data = conf.to_document_data()?;

    let outcome = bounded(
      self.timeouts.point,
      self.backend.update(
        CONFIG_COLLECTION,
        uuid,
        data,
        UpdateOptions {
          unique: Some(Config::NAME_FIELD),
          keep: Some(Config::ACTIVE_FIELD),
        },
      ),
    )
    .await?;

    match outcome {
      UpdateOutcome::Updated(_) => {
        tracing::info!(config = %uuid, "Config updated");
        Ok(())
      }
      UpdateOutcome::NotFound => Err(not_found(uuid)),
      UpdateOutcome::Conflict => Err(StoreError::Duplicate {
        entity: "config",
        reason: format!("another document is already named {}", conf.name),
      }),
    }
  }

  async fn delete(&self, id: String) -> Result<u64, StoreError> {
    let uuid = parse_id(&id)?;
    let removed = bounded(
      self.timeouts.point,
      self.backend.delete(CONFIG_COLLECTION, uuid),
    )
    .await?;
    tracing::info!(config = %uuid, removed, "Deleted {} docs", removed);
    Ok(removed)
  }
}
