//! Capability & Init Profile (C4)
//!
//! A `Profile` is plain data, not a trait object: one `Profile` value per
//! language, selected by `manager::built_in_profiles()`. This keeps adding a
//! language a matter of appending a struct literal rather than writing a new
//! impl block, and lets every language share the exact same driving code in
//! `connection`/`rpc`.
//!
//! Locating the actual server binary (`gopls`, `rust-analyzer`, ...) on the
//! caller's machine is out of scope here; `launch_argv` only shapes argv
//! from an already-resolved `LanguageServerConfig::command`.

use crate::config::{Language, LanguageServerConfig};
use langbridge_core::Result;
use lsp_types::{
  ClientCapabilities, GeneralClientCapabilities, PositionEncodingKind, TextDocumentClientCapabilities,
  TextDocumentSyncClientCapabilities, WorkspaceClientCapabilities,
};
use std::time::Duration;

/// Generic directories skipped in every language unless overridden.
const GENERIC_IGNORED_DIRNAMES: &[&str] =
  &["target", ".cargo", "_build", "deps", "bin", "obj", "node_modules"];

/// Per-language capability and initialization behavior.
#[derive(Clone)]
pub struct Profile {
  pub language: Language,
  pub ignored_dirnames: &'static [&'static str],
  pub cross_file_wait: Duration,
  pub initialization_options: fn() -> Option<serde_json::Value>,
  pub client_capabilities: fn() -> ClientCapabilities,
  pub launch_argv: fn(&LanguageServerConfig) -> Result<Vec<String>>,
}

impl Profile {
  /// Whether `dirname` (a bare directory basename, not a path) should be
  /// skipped by workspace-wide operations for this language. Callers
  /// combine this with the universal hidden-dir rule in `ignore_filter`.
  pub fn is_ignored_dirname(&self, dirname: &str) -> bool {
    self.ignored_dirnames.contains(&dirname)
  }
}

fn default_capabilities() -> ClientCapabilities {
  ClientCapabilities {
    text_document: Some(TextDocumentClientCapabilities {
      synchronization: Some(TextDocumentSyncClientCapabilities {
        dynamic_registration: Some(false),
        will_save: Some(false),
        will_save_wait_until: Some(false),
        did_save: Some(true),
      }),
      ..Default::default()
    }),
    workspace: Some(WorkspaceClientCapabilities {
      workspace_folders: Some(true),
      configuration: Some(true),
      ..Default::default()
    }),
    general: Some(GeneralClientCapabilities {
      position_encodings: Some(vec![PositionEncodingKind::UTF16]),
      ..Default::default()
    }),
    ..Default::default()
  }
}

fn no_init_options() -> Option<serde_json::Value> {
  None
}

fn simple_argv(cfg: &LanguageServerConfig) -> Result<Vec<String>> {
  Ok(cfg.extra_args.clone())
}

fn stdio_flag_argv(cfg: &LanguageServerConfig) -> Result<Vec<String>> {
  let mut args = vec!["--stdio".to_string()];
  args.extend(cfg.extra_args.iter().cloned());
  Ok(args)
}

/// Python (`pyright-langserver --stdio`, or similar).
pub const PYTHON: Profile = Profile {
  language: Language::Python,
  ignored_dirnames: &[
    "target", ".cargo", "_build", "deps", "bin", "obj", "node_modules", "__pycache__", ".venv",
    "venv", ".mypy_cache", ".pytest_cache", "*.egg-info",
  ],
  cross_file_wait: Duration::from_secs(5),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: stdio_flag_argv,
};

/// Go (`gopls`).
pub const GO: Profile = Profile {
  language: Language::Go,
  ignored_dirnames: GENERIC_IGNORED_DIRNAMES,
  cross_file_wait: Duration::from_secs(5),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: simple_argv,
};

/// Rust (`rust-analyzer`).
pub const RUST: Profile = Profile {
  language: Language::Rust,
  ignored_dirnames: GENERIC_IGNORED_DIRNAMES,
  cross_file_wait: Duration::from_secs(5),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: simple_argv,
};

/// F# (`fsautocomplete`). Indexing a `.fsproj`/`.sln` graph is slow, so
/// cross-file lookups get a longer grace period, and dirnames come from
/// the Paket/Fake/Ionide ecosystem rather than the generic defaults.
pub const FSHARP: Profile = Profile {
  language: Language::FSharp,
  ignored_dirnames: &["bin", "obj", "packages", ".paket", "paket-files", ".fake", ".ionide"],
  cross_file_wait: Duration::from_secs(15),
  initialization_options: || Some(serde_json::json!({"AutomaticWorkspaceInit": true})),
  client_capabilities: default_capabilities,
  launch_argv: |cfg| {
    // argv is pre-split here, at profile-definition time, never
    // assembled into a shell string and re-split later.
    let mut args = vec!["--background-service-enabled".to_string()];
    args.extend(cfg.extra_args.iter().cloned());
    Ok(args)
  },
};

/// Elixir (`elixir-ls` / `expert`).
pub const ELIXIR: Profile = Profile {
  language: Language::Elixir,
  ignored_dirnames: &[
    "_build", "deps", ".elixir_ls", "cover", "target", ".cargo", "bin", "obj", "node_modules",
  ],
  cross_file_wait: Duration::from_secs(8),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: simple_argv,
};

/// PowerShell (`PowerShellEditorServices`).
pub const POWERSHELL: Profile = Profile {
  language: Language::PowerShell,
  ignored_dirnames: GENERIC_IGNORED_DIRNAMES,
  cross_file_wait: Duration::from_secs(5),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: stdio_flag_argv,
};

/// TOML (`taplo lsp stdio`).
pub const TOML: Profile = Profile {
  language: Language::Toml,
  ignored_dirnames: GENERIC_IGNORED_DIRNAMES,
  cross_file_wait: Duration::from_secs(5),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: |cfg| {
    let mut args = vec!["lsp".to_string(), "stdio".to_string()];
    args.extend(cfg.extra_args.iter().cloned());
    Ok(args)
  },
};

/// Clojure (`clojure-lsp`).
pub const CLOJURE: Profile = Profile {
  language: Language::Clojure,
  ignored_dirnames: &["target", ".cargo", "_build", "deps", "bin", "obj", "node_modules", ".cpcache"],
  cross_file_wait: Duration::from_secs(8),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: simple_argv,
};

/// Java (`jdtls`), which is slow to index a project graph on first start.
pub const JAVA: Profile = Profile {
  language: Language::Java,
  ignored_dirnames: &[
    "target", ".cargo", "_build", "deps", "bin", "obj", "node_modules", ".gradle", "build",
  ],
  cross_file_wait: Duration::from_secs(15),
  initialization_options: no_init_options,
  client_capabilities: default_capabilities,
  launch_argv: simple_argv,
};

/// Assemble the `initialize` request body shared by every language: the
/// only per-language variance is `capabilities`/`initialization_options`,
/// everything else is identical across profiles.
pub fn build_initialize_params(
  profile: &Profile,
  workspace_root: &std::path::Path,
  process_id: Option<u32>,
) -> lsp_types::InitializeParams {
  let root_uri: Option<lsp_types::Uri> =
    format!("file://{}", workspace_root.to_string_lossy()).parse().ok();
  let workspace_name = workspace_root
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| "workspace".to_string());

  #[allow(deprecated)]
  lsp_types::InitializeParams {
    process_id,
    root_path: None,
    root_uri: root_uri.clone(),
    initialization_options: (profile.initialization_options)(),
    capabilities: (profile.client_capabilities)(),
    trace: Some(lsp_types::TraceValue::Off),
    workspace_folders: root_uri.map(|uri| {
      vec![lsp_types::WorkspaceFolder { uri, name: workspace_name }]
    }),
    client_info: None,
    locale: None,
    ..Default::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn fsharp_has_longer_cross_file_wait_than_default() {
    assert!(FSHARP.cross_file_wait > RUST.cross_file_wait);
  }

  #[test]
  fn fsharp_launch_argv_is_pre_split_not_a_shell_string() {
    let cfg = LanguageServerConfig::new(
      Language::FSharp,
      "fsautocomplete",
      PathBuf::from("/ws"),
    )
    .with_extra_args(["--verbose".to_string()]);

    let argv = (FSHARP.launch_argv)(&cfg).unwrap();
    assert_eq!(argv, vec!["--background-service-enabled", "--verbose"]);
    assert!(argv.iter().all(|a| !a.contains(' ') || a == "--verbose"));
  }

  #[test]
  fn python_ignores_venvs() {
    assert!(PYTHON.is_ignored_dirname(".venv"));
    assert!(PYTHON.is_ignored_dirname("__pycache__"));
    assert!(!PYTHON.is_ignored_dirname("src"));
  }

  #[test]
  fn build_initialize_params_sets_workspace_folder() {
    let dir = tempfile::tempdir().unwrap();
    let params = build_initialize_params(&RUST, dir.path(), Some(123));
    assert_eq!(params.process_id, Some(123));
    assert_eq!(params.workspace_folders.unwrap().len(), 1);
    assert!(params.root_uri.is_some());
  }
}
