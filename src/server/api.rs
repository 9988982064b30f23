use axum::{
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::controller::ReloadNotifier;
use crate::store::{ConfigStore, Crud, StoreError};
use crate::types::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<ConfigStore>,
  pub notifier: Arc<dyn ReloadNotifier>,
  pub start_time: std::time::Instant,
}

impl AppState {
  pub fn new(store: Arc<ConfigStore>, notifier: Arc<dyn ReloadNotifier>) -> Self {
    Self {
      store,
      notifier,
      start_time: std::time::Instant::now(),
    }
  }
}

/// Build the HTTP router.
///
/// An empty `cors_origins`, or one containing `*`, allows any origin.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
  let cors = if cors_origins.is_empty() || cors_origins.iter().any(|o| o == "*") {
    CorsLayer::permissive()
  } else {
    let origins: Vec<_> = cors_origins
      .iter()
      .filter_map(|o| o.parse().ok())
      .collect();
    CorsLayer::new()
      .allow_origin(origins)
      .allow_methods(Any)
      .allow_headers(Any)
  };

  Router::new()
    .route("/config", get(list_configs).post(create_config))
    .route("/config/active", get(get_active_config))
    .route(
      "/config/{id}",
      get(get_config).put(update_config).delete(delete_config),
    )
    .route("/config/activate/{id}", post(activate_config))
    .route("/health", get(health))
    .route("/ready", get(ready))
    .layer(cors)
    .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
  Json(json!({
    "status": "ok",
    "uptime_secs": state.start_time.elapsed().as_secs(),
  }))
}

async fn ready(State(state): State<AppState>) -> Response {
  match state.store.ping().await {
    Ok(()) => Json(json!({ "status": "ready" })).into_response(),
    Err(e) => {
      tracing::warn!("Readiness check failed: {}", e);
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable", "error": e.to_string() })),
      )
        .into_response()
    }
  }
}

async fn list_configs(State(state): State<AppState>) -> Result<Json<Vec<Config>>, AppError> {
  Ok(Json(state.store.read_many().await?))
}

async fn get_active_config(State(state): State<AppState>) -> Result<Json<Config>, AppError> {
  state
    .store
    .active()
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound("no config is active".into()))
}

async fn get_config(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Config>, AppError> {
  Ok(Json(state.store.read_one(id).await?))
}

/// Responds with the new id as plain text.
async fn create_config(State(state): State<AppState>, body: Bytes) -> Result<String, AppError> {
  let conf: Config = parse_body(&body)?;
  Ok(state.store.create(conf).await?)
}

async fn activate_config(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
  state.store.activate(&id).await?;
  state.notifier.notify(&id);
  Ok(StatusCode::ACCEPTED)
}

async fn update_config(
  State(state): State<AppState>,
  Path(id): Path<String>,
  body: Bytes,
) -> Result<StatusCode, AppError> {
  let patch: Value = parse_body(&body)?;
  let existing = state.store.read_one(id.clone()).await?;
  let mut merged = existing
    .merged_with(&patch)
    .map_err(|e| AppError::BadRequest(e.to_string()))?;
  merged.id = Some(id);
  state.store.update(merged).await?;
  Ok(StatusCode::CREATED)
}

async fn delete_config(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
  state.store.delete(id).await?;
  Ok(StatusCode::ACCEPTED)
}

/// Bodies are read as raw bytes so a missing content type is not an error.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
  serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e)))
}

// Error handling
pub enum AppError {
  Store(StoreError),
  NotFound(String),
  BadRequest(String),
}

impl From<StoreError> for AppError {
  fn from(e: StoreError) -> Self {
    Self::Store(e)
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, msg) = match self {
      Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      Self::Store(e) => {
        let status = match &e {
          StoreError::Duplicate { .. } => StatusCode::CONFLICT,
          StoreError::NotFound(_) => StatusCode::NOT_FOUND,
          StoreError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
          StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
          StoreError::Backend(_) | StoreError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
          }
        };
        if e.is_client_error() {
          tracing::debug!("Request rejected: {}", e);
        } else {
          tracing::error!("Request failed: {:#}", e);
        }
        (status, e.to_string())
      }
    };
    (status, Json(json!({ "error": msg }))).into_response()
  }
}
