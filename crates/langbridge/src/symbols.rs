//! Symbol Service (C7)
//!
//! `documentSymbol` queries, flattened/hierarchical symbol trees, and the
//! workspace-wide aggregations (`full_symbol_tree`, `dir_overview`,
//! `document_overview`, `containing_symbol`). A single UTF-16 coordinate
//! conversion routine (`slice_utf16`) backs every place that needs to turn
//! an LSP `Range` into source text, so the coordinate math is never
//! duplicated per operation.

use ignore::WalkBuilder;
use langbridge_core::Result;
use lsp_types::{DocumentSymbol, DocumentSymbolResponse, Position, Range, SymbolKind};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::connection::ServerConnection;
use crate::ignore_filter::IgnoreFilter;

/// A uniform symbol node, independent of the server's raw wire shape
/// (`DocumentSymbolResponse` may be either a flat `SymbolInformation` list
/// or a `DocumentSymbol` tree; every profile we ship asks for and gets the
/// hierarchical shape, so this is what we normalize to).
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolNode {
  pub name: String,
  pub kind: SymbolKind,
  pub range: Range,
  pub selection_range: Range,
  pub children: Vec<SymbolNode>,
  pub body: Option<String>,
  pub relative_path: Option<PathBuf>,
}

fn from_document_symbol(sym: DocumentSymbol, text: Option<&str>) -> SymbolNode {
  let body = text.map(|t| slice_utf16(t, sym.range));
  SymbolNode {
    name: sym.name,
    kind: sym.kind,
    range: sym.range,
    selection_range: sym.selection_range,
    children: sym
      .children
      .unwrap_or_default()
      .into_iter()
      .map(|c| from_document_symbol(c, text))
      .collect(),
    body,
    relative_path: None,
  }
}

/// `null`/absent `documentSymbol` responses are treated as an empty list,
/// never an error.
fn normalize_response(response: Option<DocumentSymbolResponse>, text: Option<&str>) -> Vec<SymbolNode> {
  match response {
    None => Vec::new(),
    Some(DocumentSymbolResponse::Nested(symbols)) => {
      symbols.into_iter().map(|s| from_document_symbol(s, text)).collect()
    },
    Some(DocumentSymbolResponse::Flat(infos)) => infos
      .into_iter()
      .map(|info| SymbolNode {
        name: info.name,
        kind: info.kind,
        range: info.location.range,
        selection_range: info.location.range,
        children: Vec::new(),
        body: text.map(|t| slice_utf16(t, info.location.range)),
        relative_path: None,
      })
      .collect(),
  }
}

/// Slice `text` to the UTF-16 code-unit range described by `range`. LSP
/// positions are always UTF-16 code units, never bytes or chars, so this
/// walks characters while tracking their UTF-16 width rather than indexing
/// by byte or `char` offset directly.
pub fn slice_utf16(text: &str, range: Range) -> String {
  let start = position_to_byte_offset(text, range.start);
  let end = position_to_byte_offset(text, range.end);
  if start > end || end > text.len() {
    return String::new();
  }
  text[start..end].to_string()
}

fn position_to_byte_offset(text: &str, pos: Position) -> usize {
  let mut lines = text.split_inclusive('\n');
  let mut offset = 0usize;
  for _ in 0..pos.line {
    match lines.next() {
      Some(line) => offset += line.len(),
      None => return text.len(),
    }
  }
  let line = lines.next().unwrap_or("");
  let mut units = 0u32;
  let mut byte_offset = 0usize;
  for ch in line.chars() {
    if units >= pos.character {
      break;
    }
    units += ch.encode_utf16(&mut [0u16; 2]).len() as u32;
    byte_offset += ch.len_utf8();
  }
  offset + byte_offset
}

fn range_contains(outer: Range, point: Position) -> bool {
  let after_start = point.line > outer.start.line
    || (point.line == outer.start.line && point.character >= outer.start.character);
  let before_end = point.line < outer.end.line
    || (point.line == outer.end.line && point.character <= outer.end.character);
  after_start && before_end
}

fn range_size(r: Range) -> (u32, u32) {
  let lines = r.end.line.saturating_sub(r.start.line);
  let chars = if lines == 0 { r.end.character.saturating_sub(r.start.character) } else { u32::MAX };
  (lines, chars)
}

/// Find the innermost symbol containing `pos`, tie-broken by smallest
/// range then by deepest tree depth.
pub fn find_containing(nodes: &[SymbolNode], pos: Position) -> Option<&SymbolNode> {
  fn walk<'a>(nodes: &'a [SymbolNode], pos: Position, depth: u32) -> Option<(&'a SymbolNode, (u32, u32), u32)> {
    let mut best: Option<(&SymbolNode, (u32, u32), u32)> = None;
    for node in nodes {
      if !range_contains(node.range, pos) {
        continue;
      }
      let candidate = (node, range_size(node.range), depth);
      let child_best = walk(&node.children, pos, depth + 1);
      let winner = match child_best {
        Some(child) if is_better(child, candidate) => child,
        _ => candidate,
      };
      best = match best {
        Some(current) if is_better(current, winner) => Some(current),
        _ => Some(winner),
      };
    }
    best
  }

  fn is_better(a: (&SymbolNode, (u32, u32), u32), b: (&SymbolNode, (u32, u32), u32)) -> bool {
    // Smaller range wins; ties broken by greater depth.
    (a.1, std::cmp::Reverse(a.2)) < (b.1, std::cmp::Reverse(b.2))
  }

  walk(nodes, pos, 0).map(|(node, _, _)| node)
}

impl ServerConnection {
  /// `document_symbols(path)`: returns `(all_symbols flattened, root_symbols)`.
  pub async fn request_document_symbols(&self, path: &Path) -> Result<(Vec<SymbolNode>, Vec<SymbolNode>)> {
    self.require_ready()?;
    let text = self.documents.ensure_open(path).await?;
    let uri = path_to_uri(path)?;

    let response = self
      .engine
      .request(
        "textDocument/documentSymbol",
        serde_json::to_value(lsp_types::DocumentSymbolParams {
          text_document: lsp_types::TextDocumentIdentifier { uri },
          work_done_progress_params: Default::default(),
          partial_result_params: Default::default(),
        })?,
      )
      .await?;

    let parsed: Option<DocumentSymbolResponse> = serde_json::from_value(response).ok();
    let roots = normalize_response(parsed, Some(&text));
    let all = flatten(&roots);
    Ok((all, roots))
  }

  /// Top-level symbol list for one file (no nested children expanded
  /// beyond what the server itself reports as children).
  pub async fn request_document_overview(&self, path: &Path) -> Result<Vec<SymbolNode>> {
    let (_, roots) = self.request_document_symbols(path).await?;
    Ok(roots)
  }

  /// Mapping from file path to its top-level symbol list, for every
  /// non-ignored file directly inside `rel_dir`.
  pub async fn request_dir_overview(&self, rel_dir: &Path) -> Result<Vec<(PathBuf, Vec<SymbolNode>)>> {
    self.require_ready()?;
    let dir = self.workspace_root.join(rel_dir);
    let filter = IgnoreFilter::build(&self.workspace_root, &self.profile, &[])?;

    let mut overview = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if !path.is_file() {
        continue;
      }
      let rel = path.strip_prefix(&self.workspace_root).unwrap_or(&path);
      if filter.is_ignored_path(rel, false) {
        continue;
      }
      let symbols = self.request_document_overview(&path).await.unwrap_or_default();
      overview.push((path, symbols));
    }
    Ok(overview)
  }

  /// Walk the whole workspace (honoring the Ignore Filter) and compose a
  /// nested directory tree whose leaves are files, each carrying its
  /// per-file symbol forest. Directory nodes carry their bare basename;
  /// file nodes carry their basename with extension.
  pub async fn request_full_symbol_tree(&self) -> Result<Vec<TreeNode>> {
    self.require_ready()?;
    let filter = IgnoreFilter::build(&self.workspace_root, &self.profile, &[])?;
    let root = self.workspace_root.clone();

    // standard_filters off: the Ignore Filter is the single pruning
    // predicate, applied uniformly below rather than relying on the
    // walker's own (git-only) rules.
    let mut builder = WalkBuilder::new(&root);
    builder.standard_filters(false).hidden(false);

    let mut files = Vec::new();
    for entry in builder.build() {
      let entry = match entry {
        Ok(e) => e,
        Err(_) => continue,
      };
      let path = entry.path();
      let rel = path.strip_prefix(&root).unwrap_or(path);
      if rel.as_os_str().is_empty() {
        continue;
      }
      let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
      if filter.is_ignored_path(rel, is_dir) {
        continue;
      }
      if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
        files.push(path.to_path_buf());
      }
    }

    // Two relative paths can resolve to the same canonical file (a
    // symlinked directory re-exposing an already-walked tree), so the walk
    // memoizes one `documentSymbol` request per canonical path rather than
    // re-requesting it for every relative path that reaches it. The cache
    // lives only for this one walk, never across calls.
    let mut cache: HashMap<TreeCacheKey, Vec<SymbolNode>> = HashMap::new();
    let mut entries = Vec::new();
    for path in files {
      let rel = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
      let key = TreeCacheKey::new(&path);
      let symbols = match cache.get(&key) {
        Some(cached) => cached.clone(),
        None => {
          let symbols = self.request_document_overview(&path).await.unwrap_or_default();
          cache.insert(key, symbols.clone());
          symbols
        },
      };
      entries.push((rel, symbols));
    }
    Ok(build_tree(entries))
  }

  /// The innermost symbol containing `(line, col)`, or `None` if the
  /// server doesn't support `documentSymbol` meaningfully (e.g. a
  /// configuration-format server) — never an error.
  pub async fn request_containing_symbol(
    &self,
    path: &Path,
    line: u32,
    col: u32,
  ) -> Result<Option<SymbolNode>> {
    let (_, roots) = self.request_document_symbols(path).await?;
    if roots.is_empty() {
      return Ok(None);
    }
    let pos = Position { line, character: col };
    Ok(find_containing(&roots, pos).cloned())
  }
}

/// A node in the nested tree `request_full_symbol_tree` returns: either a
/// directory (named by its bare basename) or a file (named by its basename
/// with extension, carrying its symbol forest).
#[derive(Debug, Clone)]
pub enum TreeNode {
  Dir { name: String, children: Vec<TreeNode> },
  File { name: String, symbols: Vec<SymbolNode> },
}

/// Identifies one file within a single `request_full_symbol_tree` walk, so
/// a canonical path reached through two different relative paths (a
/// symlinked directory) is requested once rather than once per path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TreeCacheKey(PathBuf);

impl TreeCacheKey {
  fn new(path: &Path) -> Self {
    Self(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
  }
}

/// Assemble a flat `(relative_path, symbols)` list into a nested directory
/// tree, grouping by path component and sorting entries alphabetically at
/// each level for a deterministic traversal order.
fn build_tree(files: Vec<(PathBuf, Vec<SymbolNode>)>) -> Vec<TreeNode> {
  enum Building {
    Dir(BTreeMap<String, Building>),
    File(Vec<SymbolNode>),
  }

  let mut root: BTreeMap<String, Building> = BTreeMap::new();
  for (rel, symbols) in files {
    let components: Vec<String> =
      rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    let Some((file_name, dirs)) = components.split_last() else { continue };

    let mut cursor = &mut root;
    for name in dirs {
      let entry = cursor.entry(name.clone()).or_insert_with(|| Building::Dir(BTreeMap::new()));
      if matches!(entry, Building::File(_)) {
        *entry = Building::Dir(BTreeMap::new());
      }
      cursor = match entry {
        Building::Dir(children) => children,
        Building::File(_) => unreachable!("just normalized to Dir above"),
      };
    }
    cursor.insert(file_name.clone(), Building::File(symbols));
  }

  fn into_nodes(map: BTreeMap<String, Building>) -> Vec<TreeNode> {
    map
      .into_iter()
      .map(|(name, node)| match node {
        Building::Dir(children) => TreeNode::Dir { name, children: into_nodes(children) },
        Building::File(symbols) => TreeNode::File { name, symbols },
      })
      .collect()
  }

  into_nodes(root)
}

fn flatten(roots: &[SymbolNode]) -> Vec<SymbolNode> {
  let mut out = Vec::new();
  fn walk(node: &SymbolNode, out: &mut Vec<SymbolNode>) {
    out.push(node.clone());
    for child in &node.children {
      walk(child, out);
    }
  }
  for root in roots {
    walk(root, &mut out);
  }
  out
}

fn path_to_uri(path: &Path) -> Result<lsp_types::Uri> {
  format!("file://{}", path.to_string_lossy())
    .parse()
    .map_err(|_| langbridge_core::Error::Internal(format!("path is not a valid file URI: {}", path.display())))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pos(line: u32, character: u32) -> Position {
    Position { line, character }
  }

  fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
    Range { start: pos(sl, sc), end: pos(el, ec) }
  }

  #[test]
  fn slice_utf16_extracts_ascii_range() {
    let text = "fn main() {\n    println!(\"hi\");\n}\n";
    let extracted = slice_utf16(text, range(0, 0, 2, 1));
    assert_eq!(extracted, "fn main() {\n    println!(\"hi\");\n}");
  }

  #[test]
  fn slice_utf16_accounts_for_multibyte_chars() {
    // "héllo" — 'é' is one UTF-16 unit but two UTF-8 bytes.
    let text = "héllo world";
    let extracted = slice_utf16(text, range(0, 0, 0, 5));
    assert_eq!(extracted, "héllo");
  }

  fn leaf(name: &str, r: Range) -> SymbolNode {
    SymbolNode {
      name: name.to_string(),
      kind: SymbolKind::FUNCTION,
      range: r,
      selection_range: r,
      children: Vec::new(),
      body: None,
      relative_path: None,
    }
  }

  #[test]
  fn find_containing_prefers_smallest_enclosing_range() {
    let outer = SymbolNode {
      children: vec![leaf("inner", range(1, 0, 1, 10))],
      ..leaf("outer", range(0, 0, 5, 0))
    };
    let found = find_containing(std::slice::from_ref(&outer), pos(1, 5)).unwrap();
    assert_eq!(found.name, "inner");
  }

  #[test]
  fn find_containing_returns_none_outside_any_range() {
    let outer = leaf("outer", range(0, 0, 5, 0));
    assert!(find_containing(std::slice::from_ref(&outer), pos(10, 0)).is_none());
  }

  #[test]
  fn null_document_symbol_response_normalizes_to_empty() {
    assert_eq!(normalize_response(None, None), Vec::new());
  }

  #[test]
  fn build_tree_nests_files_under_their_directories() {
    let files = vec![
      (PathBuf::from("src/main.rs"), vec![leaf("main", range(0, 0, 0, 0))]),
      (PathBuf::from("src/lib.rs"), Vec::new()),
      (PathBuf::from("README.md"), Vec::new()),
    ];
    let tree = build_tree(files);

    // Alphabetical at each level: "README.md" before the "src" dir.
    assert_eq!(tree.len(), 2);
    match &tree[0] {
      TreeNode::File { name, .. } => assert_eq!(name, "README.md"),
      TreeNode::Dir { .. } => panic!("expected README.md first"),
    }
    match &tree[1] {
      TreeNode::Dir { name, children } => {
        assert_eq!(name, "src");
        assert_eq!(children.len(), 2);
        match &children[0] {
          TreeNode::File { name, .. } => assert_eq!(name, "lib.rs"),
          TreeNode::Dir { .. } => panic!("expected lib.rs first"),
        }
        match &children[1] {
          TreeNode::File { name, symbols } => {
            assert_eq!(name, "main.rs");
            assert_eq!(symbols.len(), 1);
          },
          TreeNode::Dir { .. } => panic!("expected main.rs second"),
        }
      },
      TreeNode::File { .. } => panic!("expected src dir second"),
    }
  }

  use proptest::prelude::*;

  fn arb_range() -> impl Strategy<Value = Range> {
    (0u32..50, 0u32..50, 0u32..50, 0u32..50).prop_map(|(a, b, c, d)| {
      let (sl, el) = if a <= c { (a, c) } else { (c, a) };
      let (sc, ec) = if sl == el { (b.min(d), b.max(d)) } else { (b, d) };
      range(sl, sc, el, ec)
    })
  }

  proptest! {
    /// Whatever `find_containing` returns, `pos` must actually lie within
    /// that node's own range — the tie-break never hands back a node that
    /// doesn't contain the query point.
    #[test]
    fn find_containing_result_always_contains_the_query_point(
      ranges in proptest::collection::vec(arb_range(), 0..8),
      pos in (0u32..50, 0u32..50).prop_map(|(l, c)| pos(l, c)),
    ) {
      let nodes: Vec<SymbolNode> = ranges.into_iter().map(|r| leaf("n", r)).collect();
      if let Some(found) = find_containing(&nodes, pos) {
        prop_assert!(range_contains(found.range, pos));
      }
    }
  }
}
