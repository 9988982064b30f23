use std::sync::Arc;
use tokio::sync::broadcast;

use super::{router, AppState, ServerConfig};
use crate::controller::{NoopNotifier, ReloadNotifier, SignalNotifier};
use crate::db::DatabaseBackend;
use crate::store::{ConfigStore, StoreTimeouts};

pub struct Daemon {
  config: ServerConfig,
  backend: Arc<dyn DatabaseBackend>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
  pub fn new(config: ServerConfig, backend: Arc<dyn DatabaseBackend>) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      config,
      backend,
      shutdown_tx,
    }
  }

  /// Trigger graceful shutdown of the HTTP server
  pub fn shutdown(&self) {
    tracing::info!("Initiating graceful shutdown...");
    let _ = self.shutdown_tx.send(());
  }

  fn notifier(&self) -> Arc<dyn ReloadNotifier> {
    let ctl = &self.config.controller;
    if ctl.enabled {
      tracing::info!(
        "Controller reloads go to '{}' via SIG{}",
        ctl.process_name,
        ctl.signal.trim_start_matches("SIG")
      );
      Arc::new(SignalNotifier::new(&ctl.process_name, &ctl.signal))
    } else {
      tracing::info!("Controller notifications disabled");
      Arc::new(NoopNotifier)
    }
  }

  pub async fn run(&self) -> Result<(), anyhow::Error> {
    tracing::info!("Initializing {} schema...", self.backend.name());
    self.backend.init_schema().await?;

    let timeouts = StoreTimeouts::from(&self.config.timeouts);
    let store = ConfigStore::new(self.backend.clone()).with_timeouts(timeouts);
    let state = AppState::new(Arc::new(store), self.notifier());
    let app = router(state, &self.config.server.cors_origins);

    let addr = self.config.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("hpconfd listening on {}", addr);

    let mut shutdown_rx = self.shutdown_tx.subscribe();
    axum::serve(listener, app.into_make_service())
      .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        tracing::info!("HTTP server shutting down");
      })
      .await?;
    Ok(())
  }
}
