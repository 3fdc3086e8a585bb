//! # Memory Management
//!
//! Bookkeeping for memory the engine carves up at runtime.
//!
//! ## Design Philosophy
//!
//! Every structure here is sized once, when it is created:
//! - Free lists track holes with a fixed node pool
//! - Slot pools hold a fixed number of resources
//! - Running out is an error the caller handles, never a hidden reallocation

mod dynamic;
mod freelist;
mod pool;

pub use dynamic::{Block, DynamicAllocator};
pub use freelist::{FreeList, FreeRange, Ranges};
pub use pool::{PoolHandle, SlotPool};
