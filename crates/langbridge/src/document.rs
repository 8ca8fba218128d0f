//! Document Session (C5)
//!
//! Tracks each open file's LSP version counter and drives the
//! `didOpen`/`didChange`/`didClose` notification sequence. A per-path
//! `tokio::sync::Mutex` guarantees two concurrent callers touching the same
//! file never interleave their notifications or diverge on the version
//! counter (§5's per-path serialization guarantee).

use dashmap::DashMap;
use langbridge_core::{Error, Result};
use lsp_types::{
  DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
  TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem, Uri,
  VersionedTextDocumentIdentifier,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::rpc::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
  Closed,
  Open,
}

struct DocumentState {
  state: DocState,
  version: i32,
}

/// Per-workspace table of document sync state, one entry per path that has
/// ever been opened through this session.
pub struct DocumentSession {
  engine: Engine,
  language_id: &'static str,
  docs: DashMap<PathBuf, Arc<AsyncMutex<DocumentState>>>,
}

fn path_to_uri(path: &Path) -> Result<Uri> {
  format!("file://{}", path.to_string_lossy())
    .parse()
    .map_err(|_| Error::Internal(format!("path is not a valid file URI: {}", path.display())))
}

impl DocumentSession {
  pub fn new(engine: Engine, language_id: &'static str) -> Self {
    Self { engine, language_id, docs: DashMap::new() }
  }

  fn entry(&self, path: &Path) -> Arc<AsyncMutex<DocumentState>> {
    self
      .docs
      .entry(path.to_path_buf())
      .or_insert_with(|| Arc::new(AsyncMutex::new(DocumentState { state: DocState::Closed, version: 0 })))
      .value()
      .clone()
  }

  /// Ensure `path` is open at the server, sending `didOpen` if this is the
  /// first time we've seen it (or it was previously closed). Returns the
  /// file's current text. Reads the file via `tokio::fs`; a non-UTF8 file
  /// surfaces `Error::InvalidEncoding` before any wire traffic.
  pub async fn ensure_open(&self, path: &Path) -> Result<String> {
    let slot = self.entry(path);
    let mut doc = slot.lock().await;

    let bytes = tokio::fs::read(path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        Error::FileNotFound { path: path.to_path_buf() }
      } else {
        Error::Io(e)
      }
    })?;
    let text = String::from_utf8(bytes)
      .map_err(|_| Error::InvalidEncoding { path: path.to_path_buf() })?;

    if doc.state == DocState::Closed {
      let uri = path_to_uri(path)?;
      doc.version = 1;
      self.engine.send_notification(
        "textDocument/didOpen",
        serde_json::to_value(DidOpenTextDocumentParams {
          text_document: TextDocumentItem {
            uri,
            language_id: self.language_id.to_string(),
            version: doc.version,
            text: text.clone(),
          },
        })?,
      )?;
      doc.state = DocState::Open;
    }

    Ok(text)
  }

  /// Notify the server of a full-text replacement for an already-open
  /// document, bumping its version. Opens the document first if needed.
  pub async fn notify_change(&self, path: &Path, new_text: &str) -> Result<()> {
    let slot = self.entry(path);
    let mut doc = slot.lock().await;

    if doc.state == DocState::Closed {
      drop(doc);
      self.ensure_open(path).await?;
      doc = slot.lock().await;
    }

    doc.version += 1;
    let uri = path_to_uri(path)?;
    self.engine.send_notification(
      "textDocument/didChange",
      serde_json::to_value(DidChangeTextDocumentParams {
        text_document: VersionedTextDocumentIdentifier { uri, version: doc.version },
        content_changes: vec![TextDocumentContentChangeEvent {
          range: None,
          range_length: None,
          text: new_text.to_string(),
        }],
      })?,
    )?;
    Ok(())
  }

  /// Notify the server a document is no longer open. A no-op if the
  /// document was never opened or is already closed.
  pub async fn close(&self, path: &Path) -> Result<()> {
    let slot = self.entry(path);
    let mut doc = slot.lock().await;
    if doc.state == DocState::Closed {
      return Ok(());
    }

    let uri = path_to_uri(path)?;
    self.engine.send_notification(
      "textDocument/didClose",
      serde_json::to_value(DidCloseTextDocumentParams {
        text_document: TextDocumentIdentifier { uri },
      })?,
    )?;
    doc.state = DocState::Closed;
    Ok(())
  }

  /// Whether `path` is currently tracked as open.
  pub async fn is_open(&self, path: &Path) -> bool {
    match self.docs.get(path) {
      Some(slot) => slot.lock().await.state == DocState::Open,
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::io::duplex;

  fn test_engine() -> (Engine, tokio::io::DuplexStream) {
    let (client, server) = duplex(64 * 1024);
    let (read_half, write_half) = tokio::io::split(client);
    (Engine::spawn(read_half, write_half, Duration::from_secs(5), false), server)
  }

  #[tokio::test]
  async fn ensure_open_sends_did_open_once() {
    let (engine, mut server) = test_engine();
    let session = DocumentSession::new(engine, "rust");
    let file = tempfile::NamedTempFile::new().unwrap();
    tokio::fs::write(file.path(), "fn main() {}").await.unwrap();

    let text = session.ensure_open(file.path()).await.unwrap();
    assert_eq!(text, "fn main() {}");

    let mut reader = crate::transport::FrameReader::new(&mut server);
    let msg = reader.read_message().await.unwrap().unwrap();
    assert_eq!(msg["method"], "textDocument/didOpen");
    assert_eq!(msg["params"]["textDocument"]["version"], 1);

    // Second call must not re-send didOpen.
    session.ensure_open(file.path()).await.unwrap();
    assert!(session.is_open(file.path()).await);
  }

  #[tokio::test]
  async fn notify_change_bumps_version() {
    let (engine, mut server) = test_engine();
    let session = DocumentSession::new(engine, "rust");
    let file = tempfile::NamedTempFile::new().unwrap();
    tokio::fs::write(file.path(), "a").await.unwrap();

    session.ensure_open(file.path()).await.unwrap();
    session.notify_change(file.path(), "b").await.unwrap();

    let mut reader = crate::transport::FrameReader::new(&mut server);
    let _open = reader.read_message().await.unwrap().unwrap();
    let change = reader.read_message().await.unwrap().unwrap();
    assert_eq!(change["method"], "textDocument/didChange");
    assert_eq!(change["params"]["textDocument"]["version"], 2);
  }

  #[tokio::test]
  async fn missing_file_surfaces_file_not_found() {
    let (engine, _server) = test_engine();
    let session = DocumentSession::new(engine, "rust");
    let err = session.ensure_open(Path::new("/no/such/file.rs")).await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
  }
}
