//! # KILN Resources
//!
//! Named, reference-counted caches for runtime resources (textures,
//! materials, geometries, shaders).
//!
//! - Acquiring a name that is not resident asks the backend to create it
//! - Acquiring it again returns the same handle and bumps its count
//! - Releasing the last reference destroys it, unless it was acquired with
//!   `auto_release = false`, in which case it stays resident
//! - The name `"default"` always maps to a fallback resource that is never
//!   counted or evicted
//!
//! ## Architecture Rules
//!
//! 1. **Fixed capacity** - Slot count comes from [`CacheConfig`]
//! 2. **Generational handles** - A handle outliving its resource stops
//!    resolving; it never aliases the slot's next occupant
//! 3. **Backend owns materialization** - The cache only bookkeeps
//!
//! ## Example
//!
//! ```rust
//! use kiln_resources::{CacheConfig, ResourceBackend, ResourceCache, ResourceHandle};
//!
//! struct Textures;
//!
//! impl ResourceBackend for Textures {
//!     type Resource = Vec<u8>;
//!     type Params = (u32, u32);
//!     type Error = std::io::Error;
//!
//!     fn create(&mut self, _name: &str, &(w, h): &(u32, u32)) -> std::io::Result<Vec<u8>> {
//!         Ok(vec![0; (w * h * 4) as usize])
//!     }
//!     fn create_default(&mut self) -> std::io::Result<Vec<u8>> {
//!         Ok(vec![255; 4])
//!     }
//!     fn destroy(&mut self, _texture: Vec<u8>) {}
//! }
//!
//! let mut textures = ResourceCache::new(CacheConfig::new(64), Textures).unwrap();
//! let brick = textures.acquire("brick", &(16, 16), true).unwrap();
//! assert_eq!(textures.get(brick).unwrap().len(), 1024);
//! assert_eq!(textures.acquire("default", &(1, 1), true).unwrap(), ResourceHandle::Default);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod cache;
pub mod error;
pub mod handle;
pub mod sync;
pub mod table;

pub use backend::ResourceBackend;
pub use cache::{is_default_name, CacheStats, ReleaseOutcome, ResourceCache, DEFAULT_RESOURCE_NAME};
pub use error::{CacheError, CacheResult};
pub use handle::ResourceHandle;
pub use kiln_core::CacheConfig;
pub use sync::SharedResourceCache;
pub use table::{RefEntry, RefTable};
