//! Diagnostic Service (C9)
//!
//! Pull-model `textDocument/diagnostic`. Fails fast — before any wire
//! traffic — when `path` doesn't exist, isn't a file, or resolves outside
//! the workspace root; otherwise normalizes the server's raw severity
//! integers into a stable `severity_name`.

use langbridge_core::{Error, Result};
use lsp_types::{DocumentDiagnosticParams, Range, TextDocumentIdentifier};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::connection::ServerConnection;

/// A normalized diagnostic item, independent of whether the server replied
/// with a full or unchanged report, or a plain array (some servers predate
/// the full pull-diagnostics report envelope).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedDiagnostic {
  pub severity: Option<i64>,
  pub severity_name: String,
  pub message: String,
  pub code: String,
  pub source: String,
  pub range: Range,
}

/// `1→error, 2→warning, 3→information, 4→hint, missing→"unknown",
/// unknown-integer→"unknown(<n>)"`.
pub fn severity_name(severity: Option<i64>) -> String {
  match severity {
    Some(1) => "error".to_string(),
    Some(2) => "warning".to_string(),
    Some(3) => "information".to_string(),
    Some(4) => "hint".to_string(),
    None => "unknown".to_string(),
    Some(n) => format!("unknown({n})"),
  }
}

fn normalize_one(raw: &Value) -> NormalizedDiagnostic {
  let severity = raw.get("severity").and_then(Value::as_i64);
  let message = raw.get("message").and_then(Value::as_str).unwrap_or("").to_string();
  let code = raw
    .get("code")
    .map(|c| match c {
      Value::String(s) => s.clone(),
      Value::Number(n) => n.to_string(),
      _ => String::new(),
    })
    .unwrap_or_default();
  let source = raw.get("source").and_then(Value::as_str).unwrap_or("").to_string();
  let range: Range = raw
    .get("range")
    .and_then(|r| serde_json::from_value(r.clone()).ok())
    .unwrap_or(Range {
      start: lsp_types::Position { line: 0, character: 0 },
      end: lsp_types::Position { line: 0, character: 0 },
    });

  NormalizedDiagnostic { severity_name: severity_name(severity), severity, message, code, source, range }
}

fn extract_items(response: &Value) -> Vec<Value> {
  // A full report carries `{kind: "full", items: [...]}`; some servers
  // reply with a bare array instead.
  if let Some(items) = response.get("items").and_then(Value::as_array) {
    return items.clone();
  }
  if let Some(items) = response.as_array() {
    return items.clone();
  }
  Vec::new()
}

impl ServerConnection {
  pub async fn request_text_document_diagnostics(&self, path: &Path) -> Result<Vec<NormalizedDiagnostic>> {
    self.require_ready()?;

    if !path.exists() {
      return Err(Error::FileNotFound { path: path.to_path_buf() });
    }
    if !path.is_file() {
      return Err(Error::ExpectedFile { path: path.to_path_buf() });
    }
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let canonical_root = self.workspace_root.canonicalize().unwrap_or_else(|_| self.workspace_root.clone());
    if !canonical.starts_with(&canonical_root) {
      return Err(Error::Internal(format!(
        "{} resolves outside the workspace root {}",
        path.display(),
        self.workspace_root.display()
      )));
    }

    self.documents.ensure_open(path).await?;
    let uri = format!("file://{}", path.to_string_lossy())
      .parse()
      .map_err(|_| Error::Internal(format!("path is not a valid file URI: {}", path.display())))?;

    let params = DocumentDiagnosticParams {
      text_document: TextDocumentIdentifier { uri },
      identifier: None,
      previous_result_id: None,
      work_done_progress_params: Default::default(),
      partial_result_params: Default::default(),
    };
    let response = self.engine.request("textDocument/diagnostic", serde_json::to_value(params)?).await?;

    Ok(extract_items(&response).iter().map(normalize_one).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn severity_mapping_covers_every_known_and_unknown_case() {
    assert_eq!(severity_name(Some(1)), "error");
    assert_eq!(severity_name(Some(2)), "warning");
    assert_eq!(severity_name(Some(3)), "information");
    assert_eq!(severity_name(Some(4)), "hint");
    assert_eq!(severity_name(None), "unknown");
    assert_eq!(severity_name(Some(9)), "unknown(9)");
  }

  #[test]
  fn normalizes_a_synthetic_server_response() {
    let raw = serde_json::json!({
      "severity": 1,
      "message": "m",
      "range": {"start": {"line": 10, "character": 5}, "end": {"line": 10, "character": 8}}
    });
    let item = normalize_one(&raw);
    assert_eq!(item.severity_name, "error");
    assert_eq!(item.code, "");
    assert_eq!(item.source, "");
    assert_eq!(item.range.start.line, 10);
  }

  #[test]
  fn extracts_items_from_full_report_or_bare_array() {
    let full = serde_json::json!({"kind": "full", "items": [{"message": "a"}]});
    assert_eq!(extract_items(&full).len(), 1);

    let bare = serde_json::json!([{"message": "a"}, {"message": "b"}]);
    assert_eq!(extract_items(&bare).len(), 2);
  }

  use proptest::prelude::*;

  proptest! {
    /// Every integer outside 1..=4 normalizes to `unknown(<n>)` with that
    /// exact integer recoverable from the formatted string, and the
    /// mapping never panics regardless of how large or negative the raw
    /// severity is.
    #[test]
    fn unknown_severities_round_trip_through_their_formatted_name(n in any::<i64>()) {
      if (1..=4).contains(&n) {
        return Ok(());
      }
      let name = severity_name(Some(n));
      let recovered: i64 = name
        .strip_prefix("unknown(")
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.parse().ok())
        .expect("unknown severity name should carry the integer back out");
      prop_assert_eq!(recovered, n);
    }
  }
}
