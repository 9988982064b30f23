use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Document;

/// A named set of controller tuning parameters.
///
/// Field names on the wire match the stored document shape
/// (`setpoint`, `tempdifferential`, ...). Tuning values are opaque to the
/// store and omitted from JSON when zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  /// Store-assigned identifier, canonical UUID string.
  #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub active: bool,
  #[serde(rename = "setpoint", default, skip_serializing_if = "is_zero")]
  pub set_point: i32,
  #[serde(rename = "tempdifferential", default, skip_serializing_if = "is_zero")]
  pub temp_differential: i32,
  #[serde(rename = "aparam", default, skip_serializing_if = "is_zero")]
  pub a_param: i32,
  #[serde(rename = "bparam", default, skip_serializing_if = "is_zero")]
  pub b_param: i32,
  #[serde(rename = "cparam", default, skip_serializing_if = "is_zero")]
  pub c_param: i32,
  #[serde(default, skip_serializing_if = "is_zero")]
  pub scale: u8,
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
  *value == T::default()
}

impl Config {
  /// Name of the document field that must be unique across the collection.
  pub const NAME_FIELD: &'static str = "name";
  /// Name of the document field carrying the single-active flag.
  pub const ACTIVE_FIELD: &'static str = "active";
  /// Fields returned by listings.
  pub const SUMMARY_FIELDS: [&'static str; 2] = [Self::NAME_FIELD, Self::ACTIVE_FIELD];

  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  /// Decode a stored document, taking the identifier from the document key.
  pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
    let mut conf: Config = serde_json::from_value(doc.data)?;
    conf.id = Some(doc.id.to_string());
    Ok(conf)
  }

  /// Body persisted for this config. Never carries `_id`.
  pub fn to_document_data(&self) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(self)?;
    if let Value::Object(map) = &mut value {
      map.remove("_id");
    }
    Ok(value)
  }

  /// Overlay the top-level keys of a JSON object onto this config.
  ///
  /// Keys absent from `patch` keep their current value.
  pub fn merged_with(&self, patch: &Value) -> Result<Self, serde_json::Error> {
    let Value::Object(patch) = patch else {
      return Err(serde::de::Error::custom("config patch must be a JSON object"));
    };
    let mut base = serde_json::to_value(self)?;
    if let Value::Object(map) = &mut base {
      for (key, value) in patch {
        map.insert(key.clone(), value.clone());
      }
    }
    serde_json::from_value(base)
  }
}
