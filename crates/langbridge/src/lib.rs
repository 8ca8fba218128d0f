//! langbridge
//!
//! A unified Language Server Protocol client runtime: asynchronous
//! JSON-RPC transport and correlation, per-language capability/init
//! overlays, document synchronization, and workspace-aware symbol,
//! reference and diagnostic operations, exposed through a blocking
//! façade so callers never have to propagate async through their own
//! APIs.

pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod document;
pub mod facade;
pub mod ignore_filter;
pub mod manager;
pub mod process;
pub mod profile;
pub mod protocol;
pub mod references;
pub mod rpc;
pub mod symbols;
pub mod transport;

pub use config::{Language, LanguageServerConfig};
pub use connection::{ConnectionState, ServerConnection};
pub use diagnostics::NormalizedDiagnostic;
pub use facade::SyncFacade;
pub use manager::{LanguageServerManager, built_in_profiles};
pub use profile::Profile;
pub use symbols::{SymbolNode, TreeNode};
