//! Manager (C12)
//!
//! `LanguageServerManager` is the multi-language registry: one
//! `SyncFacade` per `(language, workspace_root)` pair, backed by
//! `built_in_profiles()`. No extension→language lookup table is kept;
//! callers name the `Language` explicitly via `LanguageServerConfig`.

use dashmap::DashMap;
use langbridge_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Language, LanguageServerConfig};
use crate::facade::SyncFacade;
use crate::profile::{self, Profile};

/// One `Profile` per supported language: Python, Go, Rust, F#, Elixir,
/// PowerShell, TOML, Clojure, Java.
pub fn built_in_profiles() -> Vec<(Language, Profile)> {
  vec![
    (Language::Python, profile::PYTHON),
    (Language::Go, profile::GO),
    (Language::Rust, profile::RUST),
    (Language::FSharp, profile::FSHARP),
    (Language::Elixir, profile::ELIXIR),
    (Language::PowerShell, profile::POWERSHELL),
    (Language::Toml, profile::TOML),
    (Language::Clojure, profile::CLOJURE),
    (Language::Java, profile::JAVA),
  ]
}

fn profile_for(language: Language) -> Option<Profile> {
  built_in_profiles().into_iter().find(|(l, _)| *l == language).map(|(_, p)| p)
}

#[derive(Hash, Eq, PartialEq, Clone)]
struct ConnectionKey {
  language: Language,
  workspace_root: PathBuf,
}

/// Registry of running language servers, one `SyncFacade` per
/// `(language, workspace_root)` pair, started on first use and reused
/// across calls.
pub struct LanguageServerManager {
  connections: DashMap<ConnectionKey, Arc<SyncFacade>>,
  startup_timeout: Duration,
}

impl LanguageServerManager {
  pub fn new() -> Self {
    Self {
      connections: DashMap::new(),
      startup_timeout: Duration::from_millis(langbridge_core::constants::DEFAULT_STARTUP_TIMEOUT_MS),
    }
  }

  /// Start (or reuse) the server for `config.language` rooted at
  /// `config.workspace_root`.
  pub fn start(&self, config: LanguageServerConfig) -> Result<Arc<SyncFacade>> {
    let key = ConnectionKey { language: config.language, workspace_root: config.workspace_root.clone() };

    if let Some(existing) = self.connections.get(&key) {
      if existing.is_running() {
        return Ok(existing.clone());
      }
    }

    let profile = profile_for(config.language)
      .ok_or_else(|| Error::NoLanguageServer { language: config.language.to_string() })?;

    info!(language = %config.language, command = %config.command, "starting language server");
    let facade = Arc::new(SyncFacade::create(config, profile, self.startup_timeout)?);
    self.connections.insert(key, facade.clone());
    Ok(facade)
  }

  pub fn get(&self, language: Language, workspace_root: &std::path::Path) -> Option<Arc<SyncFacade>> {
    let key = ConnectionKey { language, workspace_root: workspace_root.to_path_buf() };
    self.connections.get(&key).map(|e| e.clone())
  }

  pub fn is_running(&self, language: Language, workspace_root: &std::path::Path) -> bool {
    self.get(language, workspace_root).map(|f| f.is_running()).unwrap_or(false)
  }

  pub fn stop(&self, language: Language, workspace_root: &std::path::Path, timeout: Duration) -> Result<()> {
    let key = ConnectionKey { language, workspace_root: workspace_root.to_path_buf() };
    if let Some((_, facade)) = self.connections.remove(&key) {
      facade.shutdown(timeout)?;
    }
    Ok(())
  }

  /// Stop every running server, logging (not failing) on individual
  /// shutdown errors so one stuck server doesn't block the rest.
  pub fn stop_all(&self, timeout: Duration) {
    let keys: Vec<ConnectionKey> = self.connections.iter().map(|e| e.key().clone()).collect();
    for key in keys {
      if let Some((_, facade)) = self.connections.remove(&key) {
        if let Err(e) = facade.shutdown(timeout) {
          warn!(language = %key.language, "failed to stop language server: {e}");
        }
      }
    }
  }
}

impl Default for LanguageServerManager {
  fn default() -> Self {
    Self::new()
  }
}
