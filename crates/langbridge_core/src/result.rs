//! Result type alias for langbridge operations

use crate::error::Error;

/// A specialized Result type for langbridge operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
