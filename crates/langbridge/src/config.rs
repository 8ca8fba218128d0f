//! Per-language server configuration.
//!
//! `LanguageServerConfig` is the caller-supplied half of what a `Profile`
//! needs to build a launch command; `Profile` (see `profile`) supplies the
//! language-specific defaults (capabilities, ignored dirnames, timeouts).

use std::path::PathBuf;

/// The nine languages this crate ships a built-in `Profile` for, plus an
/// escape hatch for a caller-supplied language with no built-in `Profile`
/// (a `LanguageServerManager::start` call for one always fails with
/// `Error::NoLanguageServer`; `Custom` only exists so a caller assembling a
/// `ServerConnection` directly, with its own `Profile`, isn't restricted to
/// the nine names below).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Language {
  Python,
  Go,
  Rust,
  FSharp,
  Elixir,
  PowerShell,
  Toml,
  Clojure,
  Java,
  Custom(String),
}

impl Language {
  /// The LSP `languageId` string for this language.
  pub fn language_id(&self) -> &str {
    match self {
      Language::Python => "python",
      Language::Go => "go",
      Language::Rust => "rust",
      Language::FSharp => "fsharp",
      Language::Elixir => "elixir",
      Language::PowerShell => "powershell",
      Language::Toml => "toml",
      Language::Clojure => "clojure",
      Language::Java => "java",
      Language::Custom(id) => id,
    }
  }
}

impl std::fmt::Display for Language {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.language_id())
  }
}

/// Caller-supplied configuration for starting one language's server.
/// `command` must already be resolved to an executable name or absolute
/// path — locating `gopls`/`rust-analyzer`/etc. on `PATH` is out of scope
/// (see `profile` module docs).
#[derive(Debug, Clone)]
pub struct LanguageServerConfig {
  pub language: Language,
  pub command: String,
  /// Extra caller-supplied arguments appended after the profile's own
  /// fixed flags (e.g. an F# profile's `--background-service-enabled`).
  pub extra_args: Vec<String>,
  pub workspace_root: PathBuf,
  /// Additional paths/globs to ignore on top of the language's built-in
  /// `ignored_dirnames`, merged by the Ignore Filter (C6).
  pub ignored_paths: Vec<String>,
  /// When set, every JSON-RPC frame is logged at `trace` level in addition
  /// to the terse `debug` line emitted unconditionally. Off by default: a
  /// full frame dump is verbose enough that a caller should opt in.
  pub trace_lsp_communication: bool,
  /// Reserved for a future runtime dependency installer; unused by this
  /// crate's own request/response handling.
  pub cache_dir: Option<PathBuf>,
}

impl LanguageServerConfig {
  pub fn new(language: Language, command: impl Into<String>, workspace_root: PathBuf) -> Self {
    Self {
      language,
      command: command.into(),
      extra_args: Vec::new(),
      workspace_root,
      ignored_paths: Vec::new(),
      trace_lsp_communication: false,
      cache_dir: None,
    }
  }

  pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
    self.extra_args.extend(args);
    self
  }

  pub fn with_ignored_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
    self.ignored_paths.extend(paths);
    self
  }

  pub fn with_trace_lsp_communication(mut self, trace: bool) -> Self {
    self.trace_lsp_communication = trace;
    self
  }

  pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
    self.cache_dir = Some(cache_dir);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_accumulates_extra_args_and_ignores() {
    let cfg = LanguageServerConfig::new(Language::Rust, "rust-analyzer", PathBuf::from("/ws"))
      .with_extra_args(["--log-file".to_string(), "/tmp/ra.log".to_string()])
      .with_ignored_paths(["vendor/".to_string()]);

    assert_eq!(cfg.extra_args, vec!["--log-file", "/tmp/ra.log"]);
    assert_eq!(cfg.ignored_paths, vec!["vendor/"]);
    assert_eq!(cfg.language.language_id(), "rust");
  }
}
