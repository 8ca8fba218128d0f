//! Server Connection (C11)
//!
//! `ServerConnection` owns one child process, its framed transport, its
//! JSON-RPC `Engine`, and its `DocumentSession`, and drives the lifecycle
//! state machine:
//!
//! ```text
//! Spawned ── send initialize ──▶ Initializing
//! Initializing ── initialize response OK ──▶ (send initialized) ──▶ Ready
//! Initializing ── timeout / error ──▶ Crashed
//! Ready ── shutdown request OK ──▶ ShuttingDown ── exit notif ──▶ Exited
//! Any ── transport closed / process exit ──▶ Crashed (before Ready) / Exited (after ShuttingDown)
//! ```
//!
//! Before `Ready`, only `initialize`/`initialized`/`$/progress` travel on
//! the wire; every other API call blocks on the readiness latch.

use langbridge_core::{ConnectionId, Error, Result};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::LanguageServerConfig;
use crate::document::DocumentSession;
use crate::process::ProcessHandle;
use crate::profile::{self, Profile};
use crate::references::CrossFileLatch;
use crate::rpc::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Spawned,
  Initializing,
  Ready,
  ShuttingDown,
  Exited,
  Crashed,
}

/// A single language server's full runtime: process, transport, RPC engine
/// and document session, bound together by the lifecycle state machine.
pub struct ServerConnection {
  id: ConnectionId,
  pub(crate) engine: Engine,
  pub(crate) documents: DocumentSession,
  pub(crate) profile: Profile,
  pub(crate) workspace_root: PathBuf,
  pub(crate) cross_file_latch: CrossFileLatch,
  state: Arc<RwLock<ConnectionState>>,
  ready_rx: watch::Receiver<bool>,
  process: Arc<tokio::sync::Mutex<ProcessHandle>>,
}

impl ServerConnection {
  /// Spawn the server process, send `initialize`, and (on success) send
  /// `initialized` and transition to `Ready`. Blocks until that sequence
  /// completes or `startup_timeout` elapses.
  pub async fn spawn(
    config: &LanguageServerConfig,
    profile: Profile,
    startup_timeout: Duration,
  ) -> Result<Self> {
    let argv = (profile.launch_argv)(config)?;
    let (process, stdio) =
      ProcessHandle::spawn(&config.command, &argv, Some(&config.workspace_root))?;
    let engine = Engine::spawn(stdio.stdout, stdio.stdin, startup_timeout, config.trace_lsp_communication);
    register_server_request_handlers(&engine);
    register_server_notification_handlers(&engine, profile.language.to_string());

    let state = Arc::new(RwLock::new(ConnectionState::Spawned));
    let (ready_tx, ready_rx) = watch::channel(false);

    *state.write() = ConnectionState::Initializing;

    let params =
      profile::build_initialize_params(&profile, &config.workspace_root, Some(std::process::id()));
    let init_result = tokio::time::timeout(
      startup_timeout,
      engine.request("initialize", serde_json::to_value(&params)?),
    )
    .await;

    match init_result {
      Ok(Ok(_capabilities)) => {},
      Ok(Err(e)) => {
        *state.write() = ConnectionState::Crashed;
        error!(language = %profile.language, error = %e, "initialize failed");
        return Err(Error::ServerStartupFailed { reason: e.to_string() });
      },
      Err(_) => {
        *state.write() = ConnectionState::Crashed;
        return Err(Error::ServerStartupFailed {
          reason: format!("initialize timed out after {startup_timeout:?}"),
        });
      },
    };

    engine.send_notification("initialized", serde_json::json!({}))?;
    *state.write() = ConnectionState::Ready;
    let _ = ready_tx.send(true);
    let id = ConnectionId::new();
    info!(%id, language = %profile.language, "language server ready");

    spawn_crash_watcher(id, engine.clone(), state.clone(), profile.language.to_string());

    let documents = DocumentSession::new(engine.clone(), profile.language.language_id());

    Ok(Self {
      id,
      engine,
      documents,
      profile,
      workspace_root: config.workspace_root.clone(),
      cross_file_latch: CrossFileLatch::default(),
      state,
      ready_rx,
      process: Arc::new(tokio::sync::Mutex::new(process)),
    })
  }

  /// Identifies this particular connection instance across log lines and
  /// crash reports, distinct from the `(language, workspace_root)` pair a
  /// `LanguageServerManager` keys its registry by.
  pub fn id(&self) -> ConnectionId {
    self.id
  }

  pub fn state(&self) -> ConnectionState {
    *self.state.read()
  }

  pub fn is_running(&self) -> bool {
    matches!(self.state(), ConnectionState::Ready)
  }

  /// Block until the connection reaches `Ready`, or fail immediately if it
  /// has already crashed/exited.
  pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
    match self.state() {
      ConnectionState::Ready => return Ok(()),
      ConnectionState::Crashed => {
        return Err(Error::ServerCrashed { language: self.profile.language.to_string() });
      },
      ConnectionState::Exited | ConnectionState::ShuttingDown => {
        return Err(Error::ServerShuttingDown);
      },
      _ => {},
    }

    let mut rx = self.ready_rx.clone();
    tokio::time::timeout(timeout, rx.wait_for(|ready| *ready))
      .await
      .map_err(|_| Error::Timeout { method: "initialize".to_string(), elapsed: timeout })?
      .map_err(|_| Error::ServerCrashed { language: self.profile.language.to_string() })?;
    Ok(())
  }

  /// Graceful shutdown: `shutdown` request, `exit` notification, join the
  /// process. Cancels every pending request with `ServerShuttingDown`
  /// first. On timeout, kills the process outright and marks `Exited`.
  pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
    *self.state.write() = ConnectionState::ShuttingDown;

    let shutdown_result =
      tokio::time::timeout(timeout, self.engine.request("shutdown", serde_json::json!(null))).await;

    if shutdown_result.is_err() {
      warn!(language = %self.profile.language, "shutdown request timed out, killing process");
    } else {
      let _ = self.engine.send_notification("exit", serde_json::json!(null));
    }

    let mut process = self.process.lock().await;
    let _ = process.kill().await;
    *self.state.write() = ConnectionState::Exited;
    Ok(())
  }

  /// Mark the connection `Crashed` out-of-band (e.g. the process exited
  /// unexpectedly, observed by a supervising task). All subsequent API
  /// calls through this connection fail with `ServerCrashed`.
  pub fn mark_crashed(&self) {
    let mut state = self.state.write();
    if *state != ConnectionState::Exited && *state != ConnectionState::ShuttingDown {
      error!(language = %self.profile.language, "language server crashed");
      *state = ConnectionState::Crashed;
    }
  }

  /// Guard used before any API call other than initialize/initialized:
  /// translates a non-`Ready` state into the appropriate fatal error.
  pub fn require_ready(&self) -> Result<()> {
    match self.state() {
      ConnectionState::Ready => Ok(()),
      ConnectionState::Crashed => Err(Error::ServerCrashed { language: self.profile.language.to_string() }),
      ConnectionState::ShuttingDown | ConnectionState::Exited => Err(Error::ServerShuttingDown),
      ConnectionState::Spawned | ConnectionState::Initializing => {
        Err(Error::Internal("connection not yet ready".to_string()))
      },
    }
  }
}

/// Watches the engine's transport for an unexpected close and flips the
/// connection to `Crashed` as soon as it's observed, so a caller's next API
/// call sees `ServerCrashed` instead of racing the reader task's own
/// per-request `TransportClosed` failures. Exits once the connection leaves
/// `Ready` for any reason (including a clean `shutdown()`).
fn spawn_crash_watcher(id: ConnectionId, engine: Engine, state: Arc<RwLock<ConnectionState>>, language: String) {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    loop {
      interval.tick().await;
      let current = *state.read();
      if current != ConnectionState::Ready {
        return;
      }
      if engine.is_closed() {
        error!(%id, language = %language, "language server crashed");
        *state.write() = ConnectionState::Crashed;
        return;
      }
    }
  });
}

/// Register the server→client requests every profile answers the same
/// way: `workspace/configuration` gets one `null` per requested item,
/// capability (un)registration and progress-token creation are acked
/// with `null`.
fn register_server_request_handlers(engine: &Engine) {
  engine.on_request(
    "workspace/configuration",
    Arc::new(|params: serde_json::Value| {
      Box::pin(async move {
        let len = params.get("items").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
        Ok(serde_json::Value::Array(vec![serde_json::Value::Null; len]))
      }) as futures::future::BoxFuture<'static, std::result::Result<serde_json::Value, crate::protocol::RpcError>>
    }),
  );
  for method in ["client/registerCapability", "client/unregisterCapability", "window/workDoneProgress/create"] {
    engine.on_request(
      method,
      Arc::new(|_params: serde_json::Value| {
        Box::pin(async move { Ok(serde_json::Value::Null) })
          as futures::future::BoxFuture<'static, std::result::Result<serde_json::Value, crate::protocol::RpcError>>
      }),
    );
  }
}

/// `window/logMessage` and `window/showMessage` are logged at a level
/// mapped from the LSP `MessageType` rather than surfaced to callers.
fn register_server_notification_handlers(engine: &Engine, language: String) {
  for method in ["window/logMessage", "window/showMessage"] {
    let language = language.clone();
    engine.on_notification(
      method,
      Arc::new(move |params: serde_json::Value| {
        let message_type = params.get("type").and_then(|v| v.as_i64()).unwrap_or(4);
        let message = params.get("message").and_then(|v| v.as_str()).unwrap_or("");
        match message_type {
          1 => error!(language = %language, "{message}"),
          2 => warn!(language = %language, "{message}"),
          3 => info!(language = %language, "{message}"),
          _ => tracing::debug!(language = %language, "{message}"),
        }
      }),
    );
  }
}
