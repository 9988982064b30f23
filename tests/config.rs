//! Server configuration loading

use hpconfd::server::{BackendType, ServerConfig};
use hpconfd::store::StoreTimeouts;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults() {
  let config = ServerConfig::default();
  assert_eq!(config.backend, BackendType::Sqlite);
  assert_eq!(config.server.port, 8080);
  assert_eq!(config.address(), "0.0.0.0:8080");
  assert_eq!(config.server.cors_origins, ["*"]);
  assert_eq!(config.logging.level, "info");
  assert!(config.controller.enabled);
  assert_eq!(config.controller.process_name, "heatpump-controller");
  assert_eq!(config.controller.signal, "INT");
  assert_eq!(StoreTimeouts::from(&config.timeouts), StoreTimeouts::default());
}

#[test]
fn test_empty_yaml_uses_defaults() {
  let config = ServerConfig::from_yaml("{}").unwrap();
  assert_eq!(config.server.port, 8080);
  assert_eq!(config.backend, BackendType::Sqlite);
}

#[test]
fn test_partial_sections() {
  let yaml = r#"
server:
  port: 9000
controller:
  enabled: false
timeouts:
  list_ms: 30000
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.server.port, 9000);
  assert_eq!(config.server.host, "0.0.0.0");
  assert!(!config.controller.enabled);
  assert_eq!(config.controller.process_name, "heatpump-controller");

  let timeouts = StoreTimeouts::from(&config.timeouts);
  assert_eq!(timeouts.point, Duration::from_secs(5));
  assert_eq!(timeouts.list, Duration::from_secs(30));
}

#[test]
fn test_postgres_backend() {
  let yaml = r#"
backend: postgres
postgres:
  url: postgres://hp:secret@db/heatpump
  max_connections: 4
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.backend, BackendType::Postgres);
  assert_eq!(config.postgres.url, "postgres://hp:secret@db/heatpump");
  assert_eq!(config.postgres.max_connections, 4);
}

#[test]
fn test_unknown_backend_rejected() {
  assert!(ServerConfig::from_yaml("backend: mongodb").is_err());
}

#[test]
fn test_env_expansion() {
  std::env::set_var("HPCONFD_TEST_CONTROLLER", "hp-ctl");
  let yaml = r#"
controller:
  process_name: ${HPCONFD_TEST_CONTROLLER}
  signal: HUP
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.controller.process_name, "hp-ctl");
  assert_eq!(config.controller.signal, "HUP");
}

#[test]
fn test_cors_origins_list() {
  let yaml = r#"
server:
  cors_origins:
    - http://localhost:3000
    - https://panel.local
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.server.cors_origins.len(), 2);
}

#[test]
fn test_from_file() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(file, "sqlite:\n  path: /var/lib/hpconfd/configs.db").unwrap();
  writeln!(file, "logging:\n  level: debug").unwrap();

  let config = ServerConfig::from_file(file.path()).unwrap();
  assert_eq!(config.sqlite.path, "/var/lib/hpconfd/configs.db");
  assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_from_missing_file() {
  let dir = tempfile::tempdir().unwrap();
  assert!(ServerConfig::from_file(dir.path().join("absent.yaml")).is_err());
}
