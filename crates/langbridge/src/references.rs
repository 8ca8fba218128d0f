//! Reference/Definition/Declaration Service (C8)
//!
//! Shares one readiness/filtering path across `references`, `definition`
//! and `declaration`: ensure the file is open, wait out the profile's
//! cross-file grace period on the first cross-file query, then post-filter
//! results by the Ignore Filter on each location's relative path.

use langbridge_core::Result;
use lsp_types::{
  GotoDefinitionParams, GotoDefinitionResponse, Location, Position, ReferenceContext, ReferenceParams,
  TextDocumentIdentifier, TextDocumentPositionParams,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connection::ServerConnection;
use crate::ignore_filter::IgnoreFilter;

/// Tracks whether the first cross-file query since startup has already
/// paid the profile's `cross_file_wait` grace period, so subsequent calls
/// don't re-pay it.
#[derive(Default)]
pub struct CrossFileLatch {
  waited: AtomicBool,
}

impl CrossFileLatch {
  pub async fn wait_once(&self, wait: std::time::Duration) {
    if self.waited.swap(true, Ordering::SeqCst) {
      return;
    }
    tokio::time::sleep(wait).await;
  }
}

fn path_to_uri(path: &Path) -> Result<lsp_types::Uri> {
  format!("file://{}", path.to_string_lossy())
    .parse()
    .map_err(|_| langbridge_core::Error::Internal(format!("path is not a valid file URI: {}", path.display())))
}

fn uri_to_relative(uri: &lsp_types::Uri, workspace_root: &Path) -> std::path::PathBuf {
  let as_str = uri.to_string();
  let path_str = as_str.strip_prefix("file://").unwrap_or(&as_str);
  let path = Path::new(path_str);
  path.strip_prefix(workspace_root).unwrap_or(path).to_path_buf()
}

fn filter_locations(
  locations: Vec<Location>,
  filter: &IgnoreFilter,
  workspace_root: &Path,
) -> Vec<Location> {
  locations
    .into_iter()
    .filter(|loc| {
      let rel = uri_to_relative(&loc.uri, workspace_root);
      !filter.is_ignored_path(&rel, false)
    })
    .collect()
}

impl ServerConnection {
  async fn goto_position_params(&self, path: &Path, line: u32, col: u32) -> Result<TextDocumentPositionParams> {
    self.documents.ensure_open(path).await?;
    self.cross_file_latch.wait_once(self.profile.cross_file_wait).await;
    let uri = path_to_uri(path)?;
    Ok(TextDocumentPositionParams {
      text_document: TextDocumentIdentifier { uri },
      position: Position { line, character: col },
    })
  }

  async fn filtered(&self, locations: Vec<Location>) -> Result<Vec<Location>> {
    let filter = IgnoreFilter::build(&self.workspace_root, &self.profile, &[])?;
    Ok(filter_locations(locations, &filter, &self.workspace_root))
  }

  pub async fn request_references(&self, path: &Path, line: u32, col: u32) -> Result<Vec<Location>> {
    self.require_ready()?;
    let position = self.goto_position_params(path, line, col).await?;
    let params = ReferenceParams {
      text_document_position: position,
      work_done_progress_params: Default::default(),
      partial_result_params: Default::default(),
      context: ReferenceContext { include_declaration: true },
    };
    let response = self.engine.request("textDocument/references", serde_json::to_value(params)?).await?;
    let locations: Vec<Location> = serde_json::from_value(response).unwrap_or_default();
    self.filtered(locations).await
  }

  pub async fn request_definition(&self, path: &Path, line: u32, col: u32) -> Result<Vec<Location>> {
    self.require_ready()?;
    let position = self.goto_position_params(path, line, col).await?;
    let params = GotoDefinitionParams {
      text_document_position_params: position,
      work_done_progress_params: Default::default(),
      partial_result_params: Default::default(),
    };
    let response = self.engine.request("textDocument/definition", serde_json::to_value(params)?).await?;
    let locations = flatten_goto_response(response);
    self.filtered(locations).await
  }

  pub async fn request_declaration(&self, path: &Path, line: u32, col: u32) -> Result<Vec<Location>> {
    self.require_ready()?;
    let position = self.goto_position_params(path, line, col).await?;
    let params = GotoDefinitionParams {
      text_document_position_params: position,
      work_done_progress_params: Default::default(),
      partial_result_params: Default::default(),
    };
    let response = self.engine.request("textDocument/declaration", serde_json::to_value(params)?).await?;
    let locations = flatten_goto_response(response);
    self.filtered(locations).await
  }
}

fn flatten_goto_response(response: serde_json::Value) -> Vec<Location> {
  let parsed: Option<GotoDefinitionResponse> = serde_json::from_value(response).ok();
  match parsed {
    None => Vec::new(),
    Some(GotoDefinitionResponse::Scalar(loc)) => vec![loc],
    Some(GotoDefinitionResponse::Array(locs)) => locs,
    Some(GotoDefinitionResponse::Link(links)) => links
      .into_iter()
      .map(|link| Location { uri: link.target_uri, range: link.target_range })
      .collect(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::profile::RUST;
  use lsp_types::Range;

  #[test]
  fn filters_out_ignored_locations() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("lib")).unwrap();
    std::fs::create_dir_all(dir.path().join("scripts")).unwrap();
    let filter =
      IgnoreFilter::build(dir.path(), &RUST, &["scripts".to_string(), "ignored_dir".to_string()]).unwrap();

    let uri_for = |rel: &str| -> lsp_types::Uri {
      format!("file://{}", dir.path().join(rel).to_string_lossy()).parse().unwrap()
    };
    let zero = Position { line: 0, character: 0 };
    let locations = vec![
      Location { uri: uri_for("lib/a.rs"), range: Range { start: zero, end: zero } },
      Location { uri: uri_for("scripts/b.rs"), range: Range { start: zero, end: zero } },
      Location { uri: uri_for("ignored_dir/c.rs"), range: Range { start: zero, end: zero } },
    ];

    let filtered = filter_locations(locations, &filter, dir.path());
    assert_eq!(filtered.len(), 1);
    assert!(filtered[0].uri.to_string().ends_with("lib/a.rs"));
  }
}
