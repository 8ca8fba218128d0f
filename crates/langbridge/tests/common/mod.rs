//! Shared setup for the integration tests in this directory. Spawns the
//! `fake_lsp_server` test binary (see `tests/support/fake_lsp_server.rs`)
//! as a real child process over real stdio pipes, so these tests exercise
//! the full transport/rpc/connection stack rather than a synthetic duplex.

#![allow(dead_code)]

use langbridge::config::{Language, LanguageServerConfig};
use langbridge::connection::ServerConnection;
use langbridge::profile;
use std::path::Path;
use std::time::Duration;

pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn a `ServerConnection` backed by the fake server running in `mode`,
/// rooted at `workspace_root`.
pub async fn spawn_fake(workspace_root: &Path, mode: &str) -> ServerConnection {
  let command = env!("CARGO_BIN_EXE_fake_lsp_server").to_string();
  let config = LanguageServerConfig::new(Language::Rust, command, workspace_root.to_path_buf())
    .with_extra_args([mode.to_string(), workspace_root.to_string_lossy().to_string()]);

  ServerConnection::spawn(&config, profile::RUST, STARTUP_TIMEOUT)
    .await
    .expect("fake server should initialize")
}
