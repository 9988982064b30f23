use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A JSON document as held by a backend collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub id: Uuid,
  pub collection: String,
  pub data: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Document {
  /// Keep only the listed top-level keys of `data`.
  pub fn project(mut self, fields: &[&str]) -> Self {
    if let serde_json::Value::Object(map) = &mut self.data {
      map.retain(|key, _| fields.contains(&key.as_str()));
    }
    self
  }
}
