mod api;
mod config;
mod daemon;

pub use api::{router, AppError, AppState};
pub use config::{
  BackendType, ControllerSection, LoggingSection, PostgresSection, ServerConfig, ServerSection,
  SqliteSection, TimeoutsSection,
};
pub use daemon::Daemon;
