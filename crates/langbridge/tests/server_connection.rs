//! End-to-end tests driving a real `fake_lsp_server` child process through
//! `ServerConnection`'s public API. Cancellation/timeout mechanics already
//! get exhaustive coverage against a synthetic duplex transport in
//! `rpc.rs`'s own unit tests; these tests focus on what only a real spawned
//! process and a real workspace directory can exercise: startup, crash
//! detection, and the path/ignore-filter logic layered on top of the wire.

mod common;

use common::spawn_fake;
use langbridge::connection::ConnectionState;
use std::time::Duration;

#[tokio::test]
async fn spawns_and_initializes_within_the_startup_timeout() {
  let dir = tempfile::tempdir().unwrap();
  let connection = spawn_fake(dir.path(), "normal").await;
  assert_eq!(connection.state(), ConnectionState::Ready);
  assert!(connection.is_running());
}

#[tokio::test]
async fn diagnostics_fail_fast_on_a_missing_path_with_no_wire_traffic() {
  let dir = tempfile::tempdir().unwrap();
  let connection = spawn_fake(dir.path(), "normal").await;

  let missing = dir.path().join("does-not-exist.rs");
  let result = connection.request_text_document_diagnostics(&missing).await;
  assert!(matches!(result, Err(langbridge_core::Error::FileNotFound { .. })));
}

#[tokio::test]
async fn diagnostics_normalize_every_severity_variant() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("lib.rs");
  std::fs::write(&file, "fn main() {}\n").unwrap();

  let connection = spawn_fake(dir.path(), "normal").await;
  let diagnostics = connection.request_text_document_diagnostics(&file).await.unwrap();

  let names: Vec<&str> = diagnostics.iter().map(|d| d.severity_name.as_str()).collect();
  assert_eq!(names, vec!["error", "warning", "information", "hint", "unknown", "unknown(99)"]);
}

#[tokio::test]
async fn references_outside_the_workspace_ignore_rules_are_filtered() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::create_dir_all(dir.path().join("lib")).unwrap();
  std::fs::create_dir_all(dir.path().join("target")).unwrap();
  let file = dir.path().join("lib/a.rs");
  std::fs::write(&file, "fn main() {}\n").unwrap();

  let connection = spawn_fake(dir.path(), "normal").await;
  let locations = connection.request_references(&file, 0, 0).await.unwrap();

  // The fixture server returns one location under `lib/` and one under
  // `target/`; Rust's built-in profile ignores `target`.
  assert_eq!(locations.len(), 1);
  assert!(locations[0].uri.to_string().ends_with("lib/a.rs"));
}

#[tokio::test]
async fn containing_symbol_is_none_when_the_server_cannot_answer_document_symbol() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("config.toml");
  std::fs::write(&file, "key = 1\n").unwrap();

  let connection = spawn_fake(dir.path(), "normal").await;
  let containing = connection.request_containing_symbol(&file, 0, 0).await.unwrap();
  assert!(containing.is_none());
}

#[tokio::test]
async fn an_unexpected_process_exit_is_observed_as_a_crash() {
  let dir = tempfile::tempdir().unwrap();
  let connection = spawn_fake(dir.path(), "crash_after_init").await;
  assert_eq!(connection.state(), ConnectionState::Ready);

  // The fake server exits right after answering `initialize`; give the
  // crash watcher a few poll intervals to observe the closed transport.
  tokio::time::sleep(Duration::from_millis(500)).await;

  assert_eq!(connection.state(), ConnectionState::Crashed);
  assert!(matches!(
    connection.require_ready(),
    Err(langbridge_core::Error::ServerCrashed { .. })
  ));
}
