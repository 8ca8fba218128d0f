//! JSON-RPC Engine (C2)
//!
//! Multiplexes outbound requests/notifications over a single writer task and
//! dispatches inbound responses/requests/notifications from a single reader
//! task, handling request/response correlation, notification ordering, and
//! cancellation.

use crate::protocol::{self, Envelope, RpcError};
use crate::transport::{FrameReader, FrameWriter};
use dashmap::DashMap;
use futures::future::BoxFuture;
use langbridge_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Weak;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

/// A callback invoked for every inbound notification of a given method.
/// Runs on the reader task itself (never spawned) so that notifications for
/// the same method are always observed in arrival order; handlers must
/// therefore be cheap and non-blocking (push to a queue, update an atomic,
/// log) and never await.
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// A callback invoked for an inbound server->client request. Unlike
/// notification handlers, these run on a spawned task since they may need
/// to do real (async) work before answering; that means two concurrent
/// inbound requests for different methods may be answered out of order,
/// which the protocol permits (they are correlated by `id`, not order).
pub type RequestHandler =
  Arc<dyn Fn(Value) -> BoxFuture<'static, std::result::Result<Value, RpcError>> + Send + Sync>;

enum PendingResolution {
  Ok(Value),
  RpcError(RpcError),
  Cancelled,
  TransportClosed,
}

struct Pending {
  method: String,
  tx: oneshot::Sender<PendingResolution>,
}

struct EngineState {
  pending: DashMap<i64, Pending>,
  notification_handlers: DashMap<String, NotificationHandler>,
  request_handlers: DashMap<String, RequestHandler>,
  outbound_tx: mpsc::UnboundedSender<Value>,
  closed: AtomicBool,
  trace_frames: bool,
}

impl EngineState {
  fn fail_all_pending(&self, reason: &str) {
    warn!(reason, "failing all pending requests: transport closed");
    self.closed.store(true, Ordering::SeqCst);
    let ids: Vec<i64> = self.pending.iter().map(|e| *e.key()).collect();
    for id in ids {
      if let Some((_, pending)) = self.pending.remove(&id) {
        let _ = pending.tx.send(PendingResolution::TransportClosed);
      }
    }
  }
}

/// The JSON-RPC engine for a single server connection. Cheap to clone (it is
/// a thin handle around an `Arc`); the reader/writer tasks are owned by the
/// `Arc<EngineState>` and keep running until the transport closes.
#[derive(Clone)]
pub struct Engine {
  state: Arc<EngineState>,
  next_id: Arc<AtomicI64>,
  default_timeout: Duration,
  method_timeouts: Arc<DashMap<&'static str, Duration>>,
}

/// A pending request. Await `wait()` to block on the response.
pub struct RequestHandle {
  id: i64,
  method: String,
  engine: Weak<EngineState>,
  outbound: mpsc::UnboundedSender<Value>,
  rx: oneshot::Receiver<PendingResolution>,
}

impl RequestHandle {
  /// The JSON-RPC id allocated for this request.
  pub fn id(&self) -> i64 {
    self.id
  }

  /// Cancel this request: resolves it immediately with `Error::Cancelled`,
  /// informs the server via `$/cancelRequest`, and discards any response
  /// that arrives later.
  pub fn cancel(&self) {
    if let Some(state) = self.engine.upgrade() {
      if let Some((_, pending)) = state.pending.remove(&self.id) {
        let _ = pending.tx.send(PendingResolution::Cancelled);
      }
    }
    let _ = self.outbound.send(protocol::build_cancel_notification(self.id));
  }

  /// Block on the response, failing with `Error::Timeout` if `timeout`
  /// elapses first. On timeout the pending slot is intentionally left in
  /// place so a late response can still be observed and cleaned up by the
  /// reader task; a `$/cancelRequest` is sent so well-behaved servers stop
  /// working on it.
  pub async fn wait(self, timeout: Duration) -> Result<Value> {
    match tokio::time::timeout(timeout, self.rx).await {
      Ok(Ok(PendingResolution::Ok(v))) => Ok(v),
      Ok(Ok(PendingResolution::RpcError(e))) if e.code == protocol::METHOD_NOT_FOUND => {
        Err(Error::Unsupported { method: self.method })
      },
      Ok(Ok(PendingResolution::RpcError(e))) => Err(Error::ServerError {
        method: self.method,
        code: e.code,
        message: e.message,
      }),
      Ok(Ok(PendingResolution::Cancelled)) => Err(Error::Cancelled { method: self.method }),
      Ok(Ok(PendingResolution::TransportClosed)) => {
        Err(Error::TransportClosed { reason: format!("{} never answered", self.method) })
      },
      Ok(Err(_)) => Err(Error::TransportClosed {
        reason: format!("response channel for {} dropped", self.method),
      }),
      Err(_elapsed) => {
        let _ = self.outbound.send(protocol::build_cancel_notification(self.id));
        Err(Error::Timeout { method: self.method, elapsed: timeout })
      },
    }
  }
}

impl Engine {
  /// Spawn the reader and writer tasks over the given transport halves and
  /// return a handle to the engine. `default_timeout` is used for any
  /// request whose method has no entry in `method_timeouts`. When
  /// `trace_frames` is set, every frame is additionally logged in full at
  /// `trace` level (a caller-opt-in verbosity, separate from the terse
  /// `debug` line emitted unconditionally).
  pub fn spawn<R, W>(reader: R, writer: W, default_timeout: Duration, trace_frames: bool) -> Self
  where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
  {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let state = Arc::new(EngineState {
      pending: DashMap::new(),
      notification_handlers: DashMap::new(),
      request_handlers: DashMap::new(),
      outbound_tx: outbound_tx.clone(),
      closed: AtomicBool::new(false),
      trace_frames,
    });

    tokio::spawn(Self::writer_loop(FrameWriter::new(writer), outbound_rx, trace_frames));
    tokio::spawn(Self::reader_loop(FrameReader::new(reader), state.clone()));

    Self {
      state,
      next_id: Arc::new(AtomicI64::new(1)),
      default_timeout,
      method_timeouts: Arc::new(DashMap::new()),
    }
  }

  /// Override the timeout used for a specific outbound method.
  pub fn set_method_timeout(&self, method: &'static str, timeout: Duration) {
    self.method_timeouts.insert(method, timeout);
  }

  fn timeout_for(&self, method: &str) -> Duration {
    self
      .method_timeouts
      .iter()
      .find(|e| *e.key() == method)
      .map(|e| *e.value())
      .unwrap_or(self.default_timeout)
  }

  /// Whether the underlying transport has been observed to close.
  pub fn is_closed(&self) -> bool {
    self.state.closed.load(Ordering::SeqCst)
  }

  /// Register a handler for an inbound notification of `method`. Replaces
  /// any previously registered handler for the same method.
  pub fn on_notification(&self, method: impl Into<String>, handler: NotificationHandler) {
    self.state.notification_handlers.insert(method.into(), handler);
  }

  /// Register a handler that computes a result for an inbound server->client
  /// request of `method`. Replaces any previously registered handler.
  pub fn on_request(&self, method: impl Into<String>, handler: RequestHandler) {
    self.state.request_handlers.insert(method.into(), handler);
  }

  /// Issue a request and return a handle; call `.wait(timeout)` on it.
  /// Fails immediately with `Error::TransportClosed` if the transport has
  /// already closed (no frame is written).
  pub fn send_request(&self, method: &str, params: Value) -> Result<RequestHandle> {
    if self.is_closed() {
      return Err(Error::TransportClosed { reason: "engine already closed".to_string() });
    }

    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = oneshot::channel();
    self.state.pending.insert(id, Pending { method: method.to_string(), tx });

    let frame = protocol::build_request(id, method, params);
    if self.state.outbound_tx.send(frame).is_err() {
      self.state.pending.remove(&id);
      return Err(Error::TransportClosed { reason: "writer task gone".to_string() });
    }

    Ok(RequestHandle {
      id,
      method: method.to_string(),
      engine: Arc::downgrade(&self.state),
      outbound: self.state.outbound_tx.clone(),
      rx,
    })
  }

  /// Convenience: issue a request and wait for it using the method's
  /// configured (or default) timeout.
  pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
    let timeout = self.timeout_for(method);
    self.send_request(method, params)?.wait(timeout).await
  }

  /// Fire-and-forget notification. Never resolves; fails only if the
  /// transport is already known to be closed.
  pub fn send_notification(&self, method: &str, params: Value) -> Result<()> {
    if self.is_closed() {
      return Err(Error::TransportClosed { reason: "engine already closed".to_string() });
    }
    let frame = protocol::build_notification(method, params);
    self
      .state
      .outbound_tx
      .send(frame)
      .map_err(|_| Error::TransportClosed { reason: "writer task gone".to_string() })
  }

  async fn writer_loop<W>(mut writer: FrameWriter<W>, mut rx: mpsc::UnboundedReceiver<Value>, trace_frames: bool)
  where
    W: AsyncWrite + Unpin,
  {
    while let Some(value) = rx.recv().await {
      let method = value.get("method").and_then(Value::as_str).unwrap_or("<response>");
      debug!(target: "langbridge::rpc", method, "write");
      if trace_frames {
        trace!(target: "langbridge::rpc", frame = %value, "write");
      }
      if let Err(e) = writer.write_message(&value).await {
        error!(error = %e, "LSP transport write failed, writer task exiting");
        break;
      }
    }
  }

  async fn reader_loop<R>(mut reader: FrameReader<R>, state: Arc<EngineState>)
  where
    R: AsyncBufRead + Unpin,
  {
    loop {
      match reader.read_message().await {
        Ok(Some(raw)) => {
          let method = raw.get("method").and_then(Value::as_str).unwrap_or("<response>");
          debug!(target: "langbridge::rpc", method, "read");
          if state.trace_frames {
            trace!(target: "langbridge::rpc", frame = %raw, "read");
          }
          match Envelope::parse(raw) {
            Ok(Envelope::Response { id, outcome }) => {
              if let Some((_, pending)) = state.pending.remove(&id) {
                let resolution = match outcome {
                  Ok(v) => PendingResolution::Ok(v),
                  Err(e) => PendingResolution::RpcError(e),
                };
                let _ = pending.tx.send(resolution);
              }
            },
            Ok(Envelope::Notification { method, params }) => {
              if let Some(handler) = state.notification_handlers.get(&method) {
                handler.value()(params);
              }
            },
            Ok(Envelope::Request { id, method, params }) => {
              if let Some(handler) = state.request_handlers.get(&method) {
                let handler = handler.value().clone();
                let outbound = state.outbound_tx.clone();
                tokio::spawn(async move {
                  match handler(params).await {
                    Ok(result) => {
                      let _ = outbound.send(protocol::build_response(id, result));
                    },
                    Err(e) => {
                      let _ = outbound.send(protocol::build_error_response(id, e.code, &e.message));
                    },
                  }
                });
              } else {
                let _ = state.outbound_tx.send(protocol::build_error_response(
                  id,
                  protocol::METHOD_NOT_FOUND,
                  &format!("method not found: {method}"),
                ));
              }
            },
            Err(e) => {
              warn!(error = %e, "dropping malformed inbound message");
            },
          }
        },
        Ok(None) => {
          state.fail_all_pending("clean EOF");
          break;
        },
        Err(e) => {
          state.fail_all_pending(&e.to_string());
          break;
        },
      }
    }
  }
}
