//! # Cache Error Types
//!
//! All errors that can occur while acquiring or releasing cached resources.

use thiserror::Error;

/// Errors that can occur in a resource cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache was configured with zero capacity.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    /// Every slot holds a live resource.
    #[error("cache cannot hold more than {max_count} resources, '{name}' was not loaded")]
    CapacityExhausted {
        /// Name of the resource that did not fit.
        name: String,
        /// Configured capacity.
        max_count: u32,
    },

    /// Release of a name that holds no references.
    #[error("resource not found: '{0}'")]
    NotFound(String),

    /// The handle's slot was evicted (and possibly reused) since it was issued.
    #[error("stale handle for slot {index} (generation {generation})")]
    StaleHandle {
        /// Slot index the handle points at.
        index: u32,
        /// Generation the handle was issued for.
        generation: u64,
    },

    /// The backend failed to create the resource.
    #[error("backend failed to create '{name}': {reason}")]
    Backend {
        /// Name of the resource.
        name: String,
        /// Backend error message.
        reason: String,
    },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
