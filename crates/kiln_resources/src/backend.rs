//! # Resource Backend
//!
//! The capability a cache delegates materialization to. One implementation
//! per resource kind: a texture backend decodes and uploads images, a
//! material backend resolves shaders and maps, and so on.

use std::fmt::Display;

/// Creates and destroys resources of one kind.
///
/// Only the owning cache calls these. Both calls are synchronous; `create`
/// may block on disk I/O or a GPU upload.
pub trait ResourceBackend {
    /// The materialized resource.
    type Resource;

    /// Extra input needed to build a resource beyond its name.
    type Params: ?Sized;

    /// Failure reported by [`ResourceBackend::create`].
    type Error: Display;

    /// Materializes the resource called `name`.
    ///
    /// # Errors
    ///
    /// Any backend failure. The cache rolls the acquire back.
    fn create(&mut self, name: &str, params: &Self::Params) -> Result<Self::Resource, Self::Error>;

    /// Builds the cache's "default" resource. Called once, when the cache is
    /// created.
    ///
    /// # Errors
    ///
    /// Any backend failure. The cache refuses to start.
    fn create_default(&mut self) -> Result<Self::Resource, Self::Error>;

    /// Releases everything a resource holds.
    fn destroy(&mut self, resource: Self::Resource);
}
