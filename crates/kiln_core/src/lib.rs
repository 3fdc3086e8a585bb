//! # KILN Core
//!
//! Memory bookkeeping shared by every engine subsystem:
//! - Free-range tracking for one arena, with coalescing
//! - Variable-size sub-allocation of an owned arena
//! - Generational slot pools for runtime-created resources
//!
//! ## Architecture Rules
//!
//! 1. **Sized at startup** - Capacities come from configuration, not growth
//! 2. **Errors are values** - Exhaustion and misuse are returned, never panics
//! 3. **No globals** - Every allocator is an owned instance
//!
//! ## Example
//!
//! ```rust
//! use kiln_core::{DynamicAllocator, MemoryConfig};
//!
//! let config = MemoryConfig::from_toml_str("[arenas.vertices]\ntotal_size = 65536\n").unwrap();
//! let mut vertices = DynamicAllocator::from_config(&config.arena("vertices").unwrap()).unwrap();
//! let block = vertices.allocate(1024).unwrap();
//! assert_eq!(block.offset(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;

pub use config::{ArenaConfig, CacheConfig, MemoryConfig};
pub use error::{MemoryError, MemoryResult};
pub use memory::{Block, DynamicAllocator, FreeList, FreeRange, PoolHandle, SlotPool};
