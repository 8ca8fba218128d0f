//! Ignore Filter (C6)
//!
//! A single pruning predicate shared by every workspace-wide operation
//! (symbol tree walks, reference/definition post-filtering): a language's
//! built-in `ignored_dirnames`, the caller's `ignored_paths`, and a
//! `.gitignore` at the workspace root, all compiled into one
//! `ignore::gitignore::Gitignore` matcher. The hidden-dir rule
//! (`name.starts_with('.')`) is checked separately since `Gitignore` alone
//! cannot express "any dotdir" without enumerating every one.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use langbridge_core::{Error, Result};
use std::path::Path;

use crate::profile::Profile;

pub struct IgnoreFilter {
  matcher: Gitignore,
  ignored_dirnames: &'static [&'static str],
}

impl IgnoreFilter {
  /// Build the filter for one workspace: combines `profile.ignored_dirnames`
  /// and `caller_ignored_paths` as literal glob lines, then layers a
  /// `.gitignore` at `workspace_root` on top if one exists.
  pub fn build(
    workspace_root: &Path,
    profile: &Profile,
    caller_ignored_paths: &[String],
  ) -> Result<Self> {
    let mut builder = GitignoreBuilder::new(workspace_root);

    for dirname in profile.ignored_dirnames {
      builder
        .add_line(None, &format!("{dirname}/"))
        .map_err(|e| Error::Internal(format!("invalid builtin ignore glob {dirname}: {e}")))?;
    }
    for pattern in caller_ignored_paths {
      builder
        .add_line(None, pattern)
        .map_err(|e| Error::Internal(format!("invalid ignored_paths glob {pattern}: {e}")))?;
    }

    let gitignore_path = workspace_root.join(".gitignore");
    if gitignore_path.is_file() {
      if let Some(err) = builder.add(&gitignore_path) {
        tracing::warn!(error = %err, "failed to parse workspace .gitignore, ignoring it");
      }
    }

    let matcher = builder
      .build()
      .map_err(|e| Error::Internal(format!("failed to compile ignore patterns: {e}")))?;

    Ok(Self { matcher, ignored_dirnames: profile.ignored_dirnames })
  }

  /// Whether a bare directory basename (no path components) should be
  /// pruned: either the profile's static list, or the universal hidden-dir
  /// rule. Kept independent of the compiled `Gitignore` matcher since a
  /// matcher alone cannot express "any dotdir" without enumerating one.
  pub fn is_ignored_dirname(&self, dirname: &str) -> bool {
    self.is_hidden(std::ffi::OsStr::new(dirname)) || self.ignored_dirnames.contains(&dirname)
  }

  /// Whether `rel_path` (relative to the workspace root) is ignored,
  /// honoring `.gitignore`-style parent-directory matches.
  pub fn is_ignored_path(&self, rel_path: &Path, is_dir: bool) -> bool {
    if rel_path
      .components()
      .any(|c| matches!(c, std::path::Component::Normal(n) if self.is_hidden(n)))
    {
      return true;
    }
    self.matcher.matched_path_or_any_parents(rel_path, is_dir).is_ignore()
  }

  fn is_hidden(&self, name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.') && s != "." && s != "..").unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::profile::RUST;
  use std::io::Write;

  #[test]
  fn ignores_profile_dirnames() {
    let dir = tempfile::tempdir().unwrap();
    let filter = IgnoreFilter::build(dir.path(), &RUST, &[]).unwrap();
    assert!(filter.is_ignored_path(Path::new("target/debug/build.rs"), false));
    assert!(!filter.is_ignored_path(Path::new("src/main.rs"), false));
  }

  #[test]
  fn ignores_hidden_directories() {
    let dir = tempfile::tempdir().unwrap();
    let filter = IgnoreFilter::build(dir.path(), &RUST, &[]).unwrap();
    assert!(filter.is_ignored_path(Path::new(".git/HEAD"), false));
    assert!(filter.is_ignored_dirname(".git"));
    assert!(!filter.is_ignored_dirname("src"));
  }

  #[test]
  fn honors_caller_ignored_paths() {
    let dir = tempfile::tempdir().unwrap();
    let filter =
      IgnoreFilter::build(dir.path(), &RUST, &["generated/".to_string()]).unwrap();
    assert!(filter.is_ignored_path(Path::new("generated/schema.rs"), false));
  }

  #[test]
  fn honors_workspace_gitignore() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join(".gitignore")).unwrap();
    writeln!(f, "*.log").unwrap();

    let filter = IgnoreFilter::build(dir.path(), &RUST, &[]).unwrap();
    assert!(filter.is_ignored_path(Path::new("server.log"), false));
    assert!(!filter.is_ignored_path(Path::new("server.rs"), false));
  }

  use proptest::prelude::*;

  fn arb_component() -> impl Strategy<Value = String> {
    prop_oneof![
      "[a-z][a-z0-9_]{0,8}",
      "\\.[a-z][a-z0-9_]{0,8}",
    ]
  }

  proptest! {
    /// A relative path is never reported ignored unless at least one of
    /// its own components is the universal hidden-dir rule, a profile
    /// dirname, or matched by the compiled `.gitignore`/caller pattern
    /// set — i.e. `is_ignored_path` never prunes a path for no reason.
    #[test]
    fn a_path_with_no_hidden_or_builtin_component_is_never_ignored(
      components in proptest::collection::vec(arb_component(), 1..5),
    ) {
      const BUILTIN: &[&str] = &["target", ".cargo", "_build", "deps", "bin", "obj", "node_modules"];
      prop_assume!(!components.iter().any(|c| BUILTIN.contains(&c.as_str())));
      let dir = tempfile::tempdir().unwrap();
      let filter = IgnoreFilter::build(dir.path(), &RUST, &[]).unwrap();
      let rel: std::path::PathBuf = components.iter().collect();
      let has_hidden = components.iter().any(|c| c.starts_with('.'));
      if !has_hidden {
        prop_assert!(!filter.is_ignored_path(&rel, false));
      }
    }
  }
}
