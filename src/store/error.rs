use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Cannot perform operation on {entity} because it is considered duplication due to: {reason}")]
  Duplicate { entity: &'static str, reason: String },

  #[error("{0} not found")]
  NotFound(String),

  #[error("Invalid identifier: {0:?}")]
  InvalidIdentifier(String),

  #[error("Backing store did not answer within {0:?}")]
  Timeout(Duration),

  #[error("Backing store error: {0}")]
  Backend(#[source] anyhow::Error),

  #[error("Malformed document: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl StoreError {
  /// Errors caused by the request rather than by the service.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      Self::Duplicate { .. } | Self::NotFound(_) | Self::InvalidIdentifier(_)
    )
  }
}
