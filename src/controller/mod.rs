//! Reload notifications for the running controller process.
//!
//! Notifications are fire-and-forget: delivery problems are logged and never
//! reach the caller.

use std::process::Stdio;

use tokio::process::Command;

/// Kernel process names are truncated to this many bytes.
const COMM_LEN: usize = 15;

/// Tells the controller that the active configuration changed.
pub trait ReloadNotifier: Send + Sync {
  fn notify(&self, config_id: &str);
}

/// Used when controller integration is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
  fn notify(&self, config_id: &str) {
    tracing::debug!(config = config_id, "Controller notification disabled");
  }
}

/// Signals the controller process by exact name via `pkill`.
#[derive(Debug, Clone)]
pub struct SignalNotifier {
  process_name: String,
  signal: String,
}

impl SignalNotifier {
  pub fn new(process_name: impl Into<String>, signal: impl Into<String>) -> Self {
    Self {
      process_name: process_name.into(),
      signal: signal.into(),
    }
  }

  /// Name as `pkill -x` sees it.
  fn comm(&self) -> &str {
    let mut end = self.process_name.len().min(COMM_LEN);
    while !self.process_name.is_char_boundary(end) {
      end -= 1;
    }
    &self.process_name[..end]
  }

  fn command(&self) -> Command {
    let mut cmd = Command::new("pkill");
    cmd
      .arg(format!("-{}", self.signal.trim_start_matches("SIG")))
      .arg("-x")
      .arg(self.comm())
      .stdout(Stdio::null())
      .stderr(Stdio::piped());
    cmd
  }

  /// Send the signal and wait for `pkill` to finish.
  pub async fn send(&self) -> Result<(), anyhow::Error> {
    let output = self.command().output().await?;
    match output.status.code() {
      Some(0) => Ok(()),
      Some(1) => anyhow::bail!("no process named {} is running", self.process_name),
      _ => anyhow::bail!(
        "pkill failed ({}): {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      ),
    }
  }
}

impl ReloadNotifier for SignalNotifier {
  fn notify(&self, config_id: &str) {
    let notifier = self.clone();
    let config_id = config_id.to_string();
    tokio::spawn(async move {
      match notifier.send().await {
        Ok(()) => tracing::info!(
          config = %config_id,
          process = %notifier.process_name,
          signal = %notifier.signal,
          "Controller signalled to reload"
        ),
        Err(e) => tracing::warn!(
          config = %config_id,
          process = %notifier.process_name,
          "Failed to signal controller: {}",
          e
        ),
      }
    });
  }
}
