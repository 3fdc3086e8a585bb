//! # Memory Error Types
//!
//! All errors that can occur while tracking or sub-allocating an arena.

use thiserror::Error;

/// Errors that can occur in the memory subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Invalid configuration (zero-sized arena, zero capacity, bad config file).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No free range is large enough for the request.
    #[error("no block with enough free space: requested {requested}B, available {available}B")]
    NoSpace {
        /// Bytes requested.
        requested: u64,
        /// Total free bytes at the time of the request.
        available: u64,
    },

    /// Every bookkeeping node is in use; the range could not be tracked.
    #[error("free list node pool exhausted ({max_entries} entries)")]
    NodesExhausted {
        /// Size of the node pool.
        max_entries: usize,
    },

    /// Zero-byte allocations and frees are rejected.
    #[error("zero-sized block")]
    ZeroSize,

    /// The range does not lie inside the arena.
    #[error("range {offset}+{size} lies outside the arena of {total_size}B")]
    OutOfRange {
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        size: u64,
        /// Arena size.
        total_size: u64,
    },

    /// Resizing may only grow the arena.
    #[error("resize to {requested}B must exceed the current {current}B")]
    InvalidResize {
        /// Current arena size.
        current: u64,
        /// Requested arena size.
        requested: u64,
    },

    /// A freed range overlaps a range that is already free.
    #[error("range {offset}+{size} overlaps a free range, possible double free")]
    Corruption {
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        size: u64,
    },
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
