//! A tiny synthetic language server used only by the integration tests in
//! this crate's `tests/` directory. Speaks real `Content-Length` framed
//! JSON-RPC over stdio so the tests exercise the exact transport/rpc code
//! paths a real server would, without depending on any external binary
//! being installed. Spawned via `CARGO_BIN_EXE_fake_lsp_server`.
//!
//! Mode is selected by the first argv entry, the workspace root (used to
//! build absolute URIs in the `textDocument/references` fixture) by the
//! second, both wired through as a profile's `extra_args`:
//!   (none) / "normal"    — answers every request with a canned fixture.
//!   "crash_after_init"   — answers `initialize`, then exits immediately.

use langbridge::transport::{FrameReader, FrameWriter};
use serde_json::{Value, json};
use tokio::io::{stdin, stdout};

#[tokio::main(flavor = "current_thread")]
async fn main() {
  let mode = std::env::args().nth(1).unwrap_or_else(|| "normal".to_string());
  let workspace_root = std::env::args().nth(2).unwrap_or_default();

  let mut reader = FrameReader::new(stdin());
  let mut writer = FrameWriter::new(stdout());

  loop {
    let message = match reader.read_message().await {
      Ok(Some(m)) => m,
      Ok(None) | Err(_) => return,
    };

    let id = message.get("id").cloned();
    let method = message.get("method").and_then(Value::as_str).unwrap_or("").to_string();

    match (method.as_str(), id) {
      ("initialize", Some(id)) => {
        let result = json!({"capabilities": {}});
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":result})).await.unwrap();
        if mode == "crash_after_init" {
          return;
        }
      },
      ("shutdown", Some(id)) => {
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":null})).await.unwrap();
      },
      ("exit", None) => return,
      ("initialized", None) | ("textDocument/didOpen", None) | ("textDocument/didChange", None)
      | ("textDocument/didClose", None) | ("$/cancelRequest", None) => {
        // no response expected
      },
      ("textDocument/diagnostic", Some(id)) => {
        let result = json!({
          "kind": "full",
          "items": [
            {"severity": 1, "message": "an error", "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}}},
            {"severity": 2, "message": "a warning", "range": {"start": {"line": 1, "character": 0}, "end": {"line": 1, "character": 1}}},
            {"severity": 3, "message": "an info", "range": {"start": {"line": 2, "character": 0}, "end": {"line": 2, "character": 1}}},
            {"severity": 4, "message": "a hint", "range": {"start": {"line": 3, "character": 0}, "end": {"line": 3, "character": 1}}},
            {"message": "no severity given", "range": {"start": {"line": 4, "character": 0}, "end": {"line": 4, "character": 1}}},
            {"severity": 99, "message": "weird severity", "range": {"start": {"line": 5, "character": 0}, "end": {"line": 5, "character": 1}}}
          ]
        });
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":result})).await.unwrap();
      },
      ("textDocument/references", Some(id)) => {
        let result = json!([
          {"uri": format!("file://{workspace_root}/lib/a.rs"), "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}}},
          {"uri": format!("file://{workspace_root}/target/generated.rs"), "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}}}
        ]);
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":result})).await.unwrap();
      },
      ("textDocument/definition", Some(id)) | ("textDocument/declaration", Some(id)) => {
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":null})).await.unwrap();
      },
      ("textDocument/documentSymbol", Some(id)) => {
        // Deliberately unsupported: a null result.
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":null})).await.unwrap();
      },
      (_, Some(id)) => {
        writer.write_message(&json!({"jsonrpc":"2.0","id":id,"result":null})).await.unwrap();
      },
      (_, None) => {},
    }
  }
}
