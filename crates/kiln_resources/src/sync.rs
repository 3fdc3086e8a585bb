//! # Shared Cache
//!
//! A [`ResourceCache`] behind `Arc<parking_lot::Mutex<_>>`.
//!
//! Every call takes the lock for its whole duration, backend work included.
//! Two threads acquiring the same missing name therefore never create it
//! twice: the second one waits, then finds it resident.

use std::sync::Arc;

use kiln_core::CacheConfig;
use parking_lot::{Mutex, MutexGuard};

use crate::backend::ResourceBackend;
use crate::cache::{CacheStats, ReleaseOutcome, ResourceCache};
use crate::error::CacheResult;
use crate::handle::ResourceHandle;

/// Cloneable, thread-safe front for a [`ResourceCache`].
///
/// # Thread Safety
///
/// `Send + Sync` whenever the backend and its resources are `Send`.
pub struct SharedResourceCache<B: ResourceBackend> {
    inner: Arc<Mutex<ResourceCache<B>>>,
}

impl<B: ResourceBackend> Clone for SharedResourceCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: ResourceBackend> SharedResourceCache<B> {
    /// Creates a cache and wraps it.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceCache::new`].
    pub fn new(config: CacheConfig, backend: B) -> CacheResult<Self> {
        ResourceCache::new(config, backend).map(Self::from_cache)
    }

    /// Wraps an existing cache.
    #[must_use]
    pub fn from_cache(cache: ResourceCache<B>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// See [`ResourceCache::acquire`].
    ///
    /// # Errors
    ///
    /// Same as [`ResourceCache::acquire`].
    pub fn acquire(
        &self,
        name: &str,
        params: &B::Params,
        auto_release: bool,
    ) -> CacheResult<ResourceHandle> {
        self.inner.lock().acquire(name, params, auto_release)
    }

    /// See [`ResourceCache::acquire_handle`].
    ///
    /// # Errors
    ///
    /// Same as [`ResourceCache::acquire_handle`].
    pub fn acquire_handle(&self, handle: ResourceHandle) -> CacheResult<ResourceHandle> {
        self.inner.lock().acquire_handle(handle)
    }

    /// See [`ResourceCache::release`].
    ///
    /// # Errors
    ///
    /// Same as [`ResourceCache::release`].
    pub fn release(&self, name: &str) -> CacheResult<ReleaseOutcome> {
        self.inner.lock().release(name)
    }

    /// See [`ResourceCache::release_handle`].
    ///
    /// # Errors
    ///
    /// Same as [`ResourceCache::release_handle`].
    pub fn release_handle(&self, handle: ResourceHandle) -> CacheResult<ReleaseOutcome> {
        self.inner.lock().release_handle(handle)
    }

    /// Runs `f` on the resource behind `handle` while holding the lock.
    ///
    /// Returns `None` if the handle no longer resolves.
    pub fn with_resource<R>(
        &self,
        handle: ResourceHandle,
        f: impl FnOnce(&B::Resource) -> R,
    ) -> Option<R> {
        self.inner.lock().get(handle).map(f)
    }

    /// Runs `f` on the default resource while holding the lock.
    pub fn with_default<R>(&self, f: impl FnOnce(&B::Resource) -> R) -> R {
        f(self.inner.lock().default_resource())
    }

    /// See [`ResourceCache::ref_count`].
    #[must_use]
    pub fn ref_count(&self, name: &str) -> u64 {
        self.inner.lock().ref_count(name)
    }

    /// See [`ResourceCache::stats`].
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    /// Locks the cache for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, ResourceCache<B>> {
        self.inner.lock()
    }

    /// Shuts the cache down if this is the last clone.
    ///
    /// # Errors
    ///
    /// Hands `self` back while other clones are alive.
    pub fn shutdown(self) -> Result<B, Self> {
        Arc::try_unwrap(self.inner)
            .map(|cache| cache.into_inner().shutdown())
            .map_err(|inner| Self { inner })
    }
}
