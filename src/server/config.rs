use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::store::StoreTimeouts;

/// Expand environment variables in a string.
/// Supports $VAR_NAME and ${VAR_NAME} syntax.
fn expand_env_vars(input: &str) -> String {
  let mut result = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(pos) = rest.find('$') {
    result.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if let Some(braced) = after.strip_prefix('{') {
      if let Some(end) = braced.find('}') {
        result.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
        rest = &braced[end + 1..];
        continue;
      }
      result.push('$');
      rest = after;
      continue;
    }

    let len = after
      .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
      .unwrap_or(after.len());
    if len == 0 {
      result.push('$');
    } else {
      result.push_str(&std::env::var(&after[..len]).unwrap_or_default());
    }
    rest = &after[len..];
  }

  result.push_str(rest);
  result
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
  Postgres,
  #[default]
  Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default)]
  pub server: ServerSection,
  #[serde(default)]
  pub backend: BackendType,
  #[serde(default)]
  pub postgres: PostgresSection,
  #[serde(default)]
  pub sqlite: SqliteSection,
  #[serde(default)]
  pub logging: LoggingSection,
  #[serde(default)]
  pub timeouts: TimeoutsSection,
  #[serde(default)]
  pub controller: ControllerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  /// CORS allowed origins.
  /// Use ["*"] (or leave empty) for permissive mode, or list origins like ["http://localhost:3000"]
  #[serde(default = "default_cors_origins")]
  pub cors_origins: Vec<String>,
}

fn default_host() -> String {
  "0.0.0.0".into()
}
fn default_port() -> u16 {
  8080
}
fn default_cors_origins() -> Vec<String> {
  vec!["*".to_string()]
}

impl Default for ServerSection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      cors_origins: default_cors_origins(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSection {
  #[serde(default = "default_pg_url")]
  pub url: String,
  #[serde(default = "default_max_conn")]
  pub max_connections: usize,
}
fn default_pg_url() -> String {
  "postgres://localhost/heatpump".into()
}
fn default_max_conn() -> usize {
  8
}
impl Default for PostgresSection {
  fn default() -> Self {
    Self {
      url: default_pg_url(),
      max_connections: default_max_conn(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteSection {
  #[serde(default = "default_sqlite_path")]
  pub path: String,
}
fn default_sqlite_path() -> String {
  "heatpump.db".into()
}
impl Default for SqliteSection {
  fn default() -> Self {
    Self {
      path: default_sqlite_path(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
  #[serde(default = "default_level")]
  pub level: String,
}
fn default_level() -> String {
  "info".into()
}
impl Default for LoggingSection {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

/// Per-call deadlines for the config store, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsSection {
  /// Single-document reads and writes
  #[serde(default = "default_point_ms")]
  pub point_ms: u64,
  /// Listings
  #[serde(default = "default_list_ms")]
  pub list_ms: u64,
}
fn default_point_ms() -> u64 {
  5000
}
fn default_list_ms() -> u64 {
  15000
}
impl Default for TimeoutsSection {
  fn default() -> Self {
    Self {
      point_ms: default_point_ms(),
      list_ms: default_list_ms(),
    }
  }
}

impl From<&TimeoutsSection> for StoreTimeouts {
  fn from(t: &TimeoutsSection) -> Self {
    Self {
      point: Duration::from_millis(t.point_ms),
      list: Duration::from_millis(t.list_ms),
    }
  }
}

/// How the controller process is told to reload after an activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSection {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_process_name")]
  pub process_name: String,
  #[serde(default = "default_signal")]
  pub signal: String,
}
fn default_true() -> bool {
  true
}
fn default_process_name() -> String {
  "heatpump-controller".into()
}
fn default_signal() -> String {
  "INT".into()
}
impl Default for ControllerSection {
  fn default() -> Self {
    Self {
      enabled: true,
      process_name: default_process_name(),
      signal: default_signal(),
    }
  }
}

impl ServerConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self, anyhow::Error> {
    let expanded = expand_env_vars(content);
    Ok(serde_yaml::from_str(&expanded)?)
  }

  pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
    for p in ["hpconfd.yaml", "hpconfd.yml"] {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }

  pub fn address(&self) -> String {
    format!("{}:{}", self.server.host, self.server.port)
  }
}
