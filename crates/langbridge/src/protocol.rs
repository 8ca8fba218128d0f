//! JSON-RPC 2.0 envelope classification and wire-message construction.
//!
//! LSP messages are JSON-RPC 2.0 framed over stdio (see `transport`). This
//! module only deals with the JSON-RPC envelope shape; it never touches the
//! `Content-Length` framing itself.

use serde_json::{Value, json};
use std::fmt;

/// A structured JSON-RPC error as received in a `{"error": {...}}` member.
#[derive(Debug, Clone)]
pub struct RpcError {
  pub code: i64,
  pub message: String,
  pub data: Option<Value>,
}

impl fmt::Display for RpcError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}) {}", self.code, self.message)
  }
}

/// Standard JSON-RPC error code for an unrecognized inbound method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Generic internal-error code used when a registered handler fails.
pub const INTERNAL_ERROR: i64 = -32603;

/// A classified inbound message. Distinguishes the three JSON-RPC message
/// shapes: a response carries only `id`, a server->client request carries
/// both `id` and `method`, and a notification carries only `method`.
#[derive(Debug)]
pub enum Envelope {
  /// A response to a request we issued. `id` is always the integer id we
  /// allocated in `rpc::Engine::send_request` — we never emit non-integer
  /// ids ourselves, so a response missing an integer `id` is a protocol
  /// error rather than a message we can correlate.
  Response { id: i64, outcome: Result<Value, RpcError> },
  /// A request issued BY the server that we must answer. `id` is echoed
  /// back verbatim (JSON-RPC allows a string or number) so it is kept as
  /// a raw `Value`.
  Request { id: Value, method: String, params: Value },
  /// A one-way message with no response expected.
  Notification { method: String, params: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolParseError {
  #[error("message has neither `id` nor `method`")]
  MissingIdAndMethod,
  #[error("response `id` is not an integer: {0}")]
  NonIntegerResponseId(Value),
}

impl Envelope {
  /// Classify a raw decoded JSON-RPC message.
  pub fn parse(raw: Value) -> Result<Self, ProtocolParseError> {
    let id = raw.get("id").cloned();
    let method = raw
      .get("method")
      .and_then(Value::as_str)
      .map(str::to_string);
    let params = || raw.get("params").cloned().unwrap_or(Value::Null);

    match (id, method) {
      (Some(id), Some(method)) => Ok(Envelope::Request { id, method, params: params() }),
      (Some(id), None) => {
        let int_id = id.as_i64().ok_or(ProtocolParseError::NonIntegerResponseId(id))?;
        let outcome = if let Some(error) = raw.get("error") {
          Err(RpcError {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            message: error
              .get("message")
              .and_then(Value::as_str)
              .unwrap_or("")
              .to_string(),
            data: error.get("data").cloned(),
          })
        } else {
          Ok(raw.get("result").cloned().unwrap_or(Value::Null))
        };
        Ok(Envelope::Response { id: int_id, outcome })
      },
      (None, Some(method)) => Ok(Envelope::Notification { method, params: params() }),
      (None, None) => Err(ProtocolParseError::MissingIdAndMethod),
    }
  }
}

/// Build an outbound client->server request frame.
pub fn build_request(id: i64, method: &str, params: Value) -> Value {
  json!({
      "jsonrpc": "2.0",
      "id": id,
      "method": method,
      "params": params,
  })
}

/// Build an outbound notification frame (no `id`).
pub fn build_notification(method: &str, params: Value) -> Value {
  json!({
      "jsonrpc": "2.0",
      "method": method,
      "params": params,
  })
}

/// Build an outbound success response to a server-issued request.
pub fn build_response(id: Value, result: Value) -> Value {
  json!({
      "jsonrpc": "2.0",
      "id": id,
      "result": result,
  })
}

/// Build an outbound error response to a server-issued request.
pub fn build_error_response(id: Value, code: i64, message: &str) -> Value {
  json!({
      "jsonrpc": "2.0",
      "id": id,
      "error": { "code": code, "message": message },
  })
}

/// Build the `$/cancelRequest` notification for a client-issued request id.
pub fn build_cancel_notification(id: i64) -> Value {
  build_notification("$/cancelRequest", json!({ "id": id }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_response() {
    let raw = json!({"jsonrpc": "2.0", "id": 7, "result": {"ok": true}});
    match Envelope::parse(raw).unwrap() {
      Envelope::Response { id, outcome } => {
        assert_eq!(id, 7);
        assert_eq!(outcome.unwrap()["ok"], true);
      },
      other => panic!("expected Response, got {other:?}"),
    }
  }

  #[test]
  fn classifies_error_response() {
    let raw = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32600, "message": "bad"}});
    match Envelope::parse(raw).unwrap() {
      Envelope::Response { outcome, .. } => {
        let err = outcome.unwrap_err();
        assert_eq!(err.code, -32600);
        assert_eq!(err.message, "bad");
      },
      other => panic!("expected Response, got {other:?}"),
    }
  }

  #[test]
  fn classifies_inbound_request() {
    let raw = json!({"jsonrpc": "2.0", "id": 3, "method": "workspace/configuration", "params": {}});
    match Envelope::parse(raw).unwrap() {
      Envelope::Request { method, .. } => assert_eq!(method, "workspace/configuration"),
      other => panic!("expected Request, got {other:?}"),
    }
  }

  #[test]
  fn classifies_notification() {
    let raw = json!({"jsonrpc": "2.0", "method": "window/logMessage", "params": {"type": 3, "message": "hi"}});
    match Envelope::parse(raw).unwrap() {
      Envelope::Notification { method, .. } => assert_eq!(method, "window/logMessage"),
      other => panic!("expected Notification, got {other:?}"),
    }
  }

  #[test]
  fn rejects_message_without_id_or_method() {
    let raw = json!({"jsonrpc": "2.0"});
    assert!(matches!(
      Envelope::parse(raw),
      Err(ProtocolParseError::MissingIdAndMethod)
    ));
  }
}
