use async_trait::async_trait;
use uuid::Uuid;

use crate::types::Document;

/// Constraints checked by `DatabaseBackend::update` inside its transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions<'a> {
  /// Reject the write if another document holds the new value at this field.
  pub unique: Option<&'a str>,
  /// Field whose stored value survives the replacement.
  pub keep: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
  Updated(Document),
  NotFound,
  /// The `unique` field value belongs to another document; nothing written.
  Conflict,
}

/// Abstract document-collection store.
///
/// Every document lives in a named collection and is keyed by a UUID the
/// backend assigns on insert. Field arguments name top-level keys of the
/// document body and must pass `sanitize::validate_identifier`.
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
  /// Short backend name for logs.
  fn name(&self) -> &'static str;

  async fn init_schema(&self) -> Result<(), anyhow::Error>;

  /// Cheap round trip used by readiness probes.
  async fn ping(&self) -> Result<(), anyhow::Error>;

  /// Insert a new document.
  ///
  /// With `unique`, returns `None` without writing when another document
  /// already holds the same value at that field. The check and the insert
  /// run in one transaction.
  async fn insert(
    &self,
    collection: &str,
    data: serde_json::Value,
    unique: Option<&str>,
  ) -> Result<Option<Document>, anyhow::Error>;

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, anyhow::Error>;

  async fn find_by_field(
    &self,
    collection: &str,
    field: &str,
    value: &serde_json::Value,
  ) -> Result<Vec<Document>, anyhow::Error>;

  /// Replace the body of `id`, honouring `opts` atomically.
  async fn update(
    &self,
    collection: &str,
    id: Uuid,
    data: serde_json::Value,
    opts: UpdateOptions<'_>,
  ) -> Result<UpdateOutcome, anyhow::Error>;

  /// Remove `id`, returning the number of documents removed.
  async fn delete(&self, collection: &str, id: Uuid) -> Result<u64, anyhow::Error>;

  /// All documents of a collection in creation order. With a projection only
  /// the listed top-level keys are kept in each body.
  async fn list(
    &self,
    collection: &str,
    projection: Option<&[&str]>,
  ) -> Result<Vec<Document>, anyhow::Error>;

  /// Set boolean `field` to true on `id` and to false on every other
  /// document of the collection, as a single atomic write.
  ///
  /// Returns `false` without writing anything when `id` does not exist.
  async fn set_exclusive_flag(
    &self,
    collection: &str,
    id: Uuid,
    field: &str,
  ) -> Result<bool, anyhow::Error>;
}
