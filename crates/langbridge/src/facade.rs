//! Sync Facade (C10)
//!
//! Exposes a blocking API over the async `ServerConnection`. Owns a
//! dedicated single-threaded `tokio::runtime::Runtime`: the whole async
//! engine runs on this private runtime, so every public method here is a
//! plain blocking function any caller thread can call, via
//! `Runtime::block_on`.

use langbridge_core::{Error, Result};
use lsp_types::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::LanguageServerConfig;
use crate::connection::ServerConnection;
use crate::diagnostics::NormalizedDiagnostic;
use crate::profile::Profile;
use crate::symbols::{SymbolNode, TreeNode};

/// A blocking handle to one language server, backed by its own private
/// Tokio runtime. Safe to share across threads (`Arc`-wrapped internally);
/// each call blocks the calling thread only, never the runtime's worker.
pub struct SyncFacade {
  runtime: tokio::runtime::Runtime,
  connection: Arc<ServerConnection>,
  startup_timeout: Duration,
  request_timeout: Duration,
}

impl SyncFacade {
  /// `create(config, profile, settings)`: spawns the server and blocks
  /// until `Ready` or `startup_timeout` elapses.
  pub fn create(config: LanguageServerConfig, profile: Profile, startup_timeout: Duration) -> Result<Self> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .worker_threads(1)
      .enable_all()
      .build()
      .map_err(Error::Io)?;

    let connection = runtime.block_on(ServerConnection::spawn(&config, profile, startup_timeout))?;

    Ok(Self {
      runtime,
      connection: Arc::new(connection),
      startup_timeout,
      request_timeout: Duration::from_millis(langbridge_core::constants::DEFAULT_REQUEST_TIMEOUT_MS),
    })
  }

  pub fn is_running(&self) -> bool {
    self.connection.is_running()
  }

  pub fn is_ignored_dirname(&self, name: &str) -> bool {
    self.connection.profile.is_ignored_dirname(name)
  }

  fn block_with_readiness<F, T>(&self, fut: F) -> Result<T>
  where
    F: std::future::Future<Output = Result<T>>,
  {
    self.runtime.block_on(async {
      self.connection.wait_ready(self.startup_timeout).await?;
      tokio::time::timeout(self.request_timeout, fut)
        .await
        .map_err(|_| Error::Timeout { method: "facade call".to_string(), elapsed: self.request_timeout })?
    })
  }

  pub fn request_document_symbols(&self, path: &Path) -> Result<(Vec<SymbolNode>, Vec<SymbolNode>)> {
    self.block_with_readiness(self.connection.request_document_symbols(path))
  }

  pub fn request_full_symbol_tree(&self) -> Result<Vec<TreeNode>> {
    self.block_with_readiness(self.connection.request_full_symbol_tree())
  }

  pub fn request_document_overview(&self, path: &Path) -> Result<Vec<SymbolNode>> {
    self.block_with_readiness(self.connection.request_document_overview(path))
  }

  pub fn request_dir_overview(&self, rel_dir: &Path) -> Result<Vec<(PathBuf, Vec<SymbolNode>)>> {
    self.block_with_readiness(self.connection.request_dir_overview(rel_dir))
  }

  pub fn request_references(&self, path: &Path, line: u32, col: u32) -> Result<Vec<Location>> {
    self.block_with_readiness(self.connection.request_references(path, line, col))
  }

  pub fn request_definition(&self, path: &Path, line: u32, col: u32) -> Result<Vec<Location>> {
    self.block_with_readiness(self.connection.request_definition(path, line, col))
  }

  pub fn request_declaration(&self, path: &Path, line: u32, col: u32) -> Result<Vec<Location>> {
    self.block_with_readiness(self.connection.request_declaration(path, line, col))
  }

  pub fn request_containing_symbol(&self, path: &Path, line: u32, col: u32) -> Result<Option<SymbolNode>> {
    self.block_with_readiness(self.connection.request_containing_symbol(path, line, col))
  }

  pub fn request_text_document_diagnostics(&self, path: &Path) -> Result<Vec<NormalizedDiagnostic>> {
    self.block_with_readiness(self.connection.request_text_document_diagnostics(path))
  }

  /// `shutdown(timeout)`: sends `shutdown`, waits for the response, sends
  /// `exit`, joins the process. On timeout, terminates the process
  /// outright and marks the connection `Exited`.
  pub fn shutdown(&self, timeout: Duration) -> Result<()> {
    self.runtime.block_on(async {
      if let Err(e) = self.connection.shutdown(timeout).await {
        warn!(error = %e, "shutdown did not complete cleanly");
      }
      Ok(())
    })
  }
}
