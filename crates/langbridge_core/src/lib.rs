//! langbridge core
//!
//! Shared error handling, strongly-typed identifiers, and telemetry used by
//! the `langbridge` LSP client runtime. Factored out so the ambient
//! concerns stay in one place instead of being duplicated per module.

pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;

// Re-exports for convenience
pub use error::{Error, ErrorContext, ErrorKind};
pub use id::ConnectionId;
pub use result::Result;

/// Application-wide constants
pub mod constants {
  /// Default per-request timeout when a Profile/method override is absent.
  pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

  /// Default readiness-latch timeout (spawn through `initialize` response).
  pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;

  /// Default wait before the first cross-file reference/definition query,
  /// giving lazily-indexing servers a chance to finish loading the project
  /// graph. Individual Profiles may raise this (see `langbridge::profile`).
  pub const DEFAULT_CROSS_FILE_WAIT_MS: u64 = 5_000;

  /// Capacity of the bounded stderr ring buffer kept per server connection.
  pub const STDERR_RING_CAPACITY: usize = 200;
}

/// Prelude module for common imports
pub mod prelude {
  pub use crate::error::{Error, ErrorContext, ErrorKind};
  pub use crate::id::*;
  pub use crate::result::Result;
  pub use anyhow::Context as AnyhowContext;
  pub use tracing::{debug, error, info, instrument, trace, warn};
}
