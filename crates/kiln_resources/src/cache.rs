//! # Resource Cache
//!
//! Named, reference-counted storage for one kind of resource.
//!
//! ## Lifecycle of a name
//!
//! ```text
//!              acquire                       acquire
//!   Absent ─────────────> Active(1) ──────────────────> Active(n+1)
//!     ▲   (backend fails)     │ release                      │
//!     └───────────────────────┤                              │
//!     ▲                       ▼                              │
//!     │ auto_release    ref_count == 0 ◄─────────────────────┘
//!     └───────────────────────┤
//!                             │ !auto_release
//!                             ▼
//!                        Pinned(0) ── acquire ──> Active(1), same slot
//! ```
//!
//! The first acquire of a name (while its count is zero) decides whether it
//! is auto-released. Later acquires with a different flag do not change it.
//!
//! ## Default resource
//!
//! Every cache owns a "default" resource, created together with the cache.
//! It lives outside the slot pool, is returned for the name `"default"`
//! (any case), and is ignored by every counting operation.

use kiln_core::{CacheConfig, PoolHandle, SlotPool};

use crate::backend::ResourceBackend;
use crate::error::{CacheError, CacheResult};
use crate::handle::ResourceHandle;
use crate::table::{RefEntry, RefTable};

/// Name of the reserved default resource.
pub const DEFAULT_RESOURCE_NAME: &str = "default";

/// Returns true if `name` refers to the default resource.
#[inline]
#[must_use]
pub fn is_default_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(DEFAULT_RESOURCE_NAME)
}

/// What a release did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Release of the default resource; nothing changed.
    Ignored,
    /// References remain.
    Retained {
        /// References left after this release.
        ref_count: u64,
    },
    /// No references remain, resource kept because auto-release is off.
    Pinned,
    /// No references remain, resource destroyed and slot freed.
    Evicted,
}

/// Snapshot of cache occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Configured slot count.
    pub capacity: u32,
    /// Slots holding a resource.
    pub resident: usize,
    /// Names with at least one reference.
    pub referenced: usize,
    /// Resident names with zero references.
    pub pinned: usize,
    /// Sum of all reference counts.
    pub total_references: u64,
}

#[derive(Debug)]
struct Resident<T> {
    name: String,
    resource: T,
}

/// A fixed-capacity cache of named resources.
///
/// # Thread Safety
///
/// NOT thread-safe; every operation takes `&mut self`. Share across threads
/// with [`SharedResourceCache`](crate::SharedResourceCache).
///
/// # Example
///
/// ```rust
/// use kiln_core::CacheConfig;
/// use kiln_resources::{ReleaseOutcome, ResourceBackend, ResourceCache};
///
/// struct Names;
///
/// impl ResourceBackend for Names {
///     type Resource = String;
///     type Params = ();
///     type Error = String;
///
///     fn create(&mut self, name: &str, _: &()) -> Result<String, String> {
///         Ok(name.to_uppercase())
///     }
///     fn create_default(&mut self) -> Result<String, String> {
///         Ok("DEFAULT".into())
///     }
///     fn destroy(&mut self, _: String) {}
/// }
///
/// let mut cache = ResourceCache::new(CacheConfig::new(8), Names).unwrap();
/// let handle = cache.acquire("brick", &(), true).unwrap();
/// assert_eq!(cache.get(handle).map(String::as_str), Some("BRICK"));
/// assert_eq!(cache.release("brick").unwrap(), ReleaseOutcome::Evicted);
/// assert!(cache.get(handle).is_none());
/// ```
pub struct ResourceCache<B: ResourceBackend> {
    config: CacheConfig,
    backend: B,
    slots: SlotPool<Resident<B::Resource>>,
    table: RefTable,
    default: B::Resource,
}

impl<B: ResourceBackend> ResourceCache<B> {
    /// Creates a cache and its default resource.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Configuration`] if `config.max_count` is zero
    /// - [`CacheError::Backend`] if the default resource cannot be created
    pub fn new(config: CacheConfig, mut backend: B) -> CacheResult<Self> {
        if config.max_count == 0 {
            tracing::error!("ResourceCache::new - config.max_count must be > 0.");
            return Err(CacheError::Configuration("max_count must be > 0".into()));
        }

        tracing::trace!("Creating default resource...");
        let default = backend.create_default().map_err(|e| {
            tracing::error!("Failed to create default resource: {}", e);
            CacheError::Backend {
                name: DEFAULT_RESOURCE_NAME.into(),
                reason: e.to_string(),
            }
        })?;

        let mut table = RefTable::new(config.max_count);
        table.fill(RefEntry::ABSENT);

        Ok(Self {
            config,
            backend,
            slots: SlotPool::new(config.max_count),
            table,
            default,
        })
    }

    /// Takes a reference to `name`, creating the resource if none is resident.
    ///
    /// `auto_release` only takes effect when the name has no references.
    /// Acquiring `"default"` returns [`ResourceHandle::Default`] uncounted.
    ///
    /// # Errors
    ///
    /// - [`CacheError::CapacityExhausted`] if a new resource is needed and
    ///   every slot is taken
    /// - [`CacheError::Backend`] if the backend fails; nothing is counted
    pub fn acquire(
        &mut self,
        name: &str,
        params: &B::Params,
        auto_release: bool,
    ) -> CacheResult<ResourceHandle> {
        if is_default_name(name) {
            tracing::warn!(
                "ResourceCache::acquire called for '{}'. Use default_resource() instead.",
                name
            );
            return Ok(ResourceHandle::Default);
        }

        let mut entry = self.table.get(name);
        // Only the first acquire decides auto-release.
        if entry.ref_count == 0 {
            entry.auto_release = auto_release;
        }
        entry.ref_count += 1;

        let (handle, created) = match entry.handle {
            Some(handle) => (handle, false),
            None => (self.materialize(name, params)?, true),
        };
        entry.handle = Some(handle);

        if let Err(e) = self.table.set(name, entry) {
            if created {
                self.evict(handle);
            }
            return Err(e);
        }

        if created {
            tracing::trace!(
                "Resource '{}' does not yet exist. Created, and ref_count is now {}.",
                name,
                entry.ref_count
            );
        }
        Ok(ResourceHandle::Slot(handle))
    }

    /// Takes another reference through an existing handle.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::StaleHandle`] if the handle's resource was evicted.
    pub fn acquire_handle(&mut self, handle: ResourceHandle) -> CacheResult<ResourceHandle> {
        let ResourceHandle::Slot(slot) = handle else {
            return Ok(ResourceHandle::Default);
        };
        let name = self.resident(slot)?.name.clone();

        let mut entry = self.table.get(&name);
        entry.ref_count += 1;
        self.table.set(&name, entry)?;
        Ok(handle)
    }

    /// Drops a reference to `name`.
    ///
    /// At zero references the resource is destroyed if the name is
    /// auto-released, otherwise it stays resident (pinned).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] if `name` holds no references.
    pub fn release(&mut self, name: &str) -> CacheResult<ReleaseOutcome> {
        if is_default_name(name) {
            return Ok(ReleaseOutcome::Ignored);
        }

        let mut entry = self.table.get(name);
        if entry.ref_count == 0 {
            tracing::warn!("Tried to release non-existent resource: '{}'", name);
            return Err(CacheError::NotFound(name.to_owned()));
        }

        entry.ref_count -= 1;
        let outcome = if entry.ref_count > 0 {
            ReleaseOutcome::Retained {
                ref_count: entry.ref_count,
            }
        } else if entry.auto_release {
            if let Some(handle) = entry.handle.take() {
                self.evict(handle);
            }
            entry.auto_release = false;
            ReleaseOutcome::Evicted
        } else {
            ReleaseOutcome::Pinned
        };

        if outcome == ReleaseOutcome::Evicted {
            tracing::trace!(
                "Released resource '{}'. Unloaded because reference count = 0 and auto_release = true.",
                name
            );
        } else {
            tracing::trace!(
                "Released resource '{}', now has a reference count of {} (auto_release={}).",
                name,
                entry.ref_count,
                entry.auto_release
            );
        }

        self.table.set(name, entry)?;
        Ok(outcome)
    }

    /// Drops a reference through a handle.
    ///
    /// # Errors
    ///
    /// - [`CacheError::StaleHandle`] if the handle's resource was evicted
    /// - [`CacheError::NotFound`] if the resource holds no references
    pub fn release_handle(&mut self, handle: ResourceHandle) -> CacheResult<ReleaseOutcome> {
        let ResourceHandle::Slot(slot) = handle else {
            return Ok(ReleaseOutcome::Ignored);
        };
        let name = self.resident(slot)?.name.clone();
        self.release(&name)
    }

    /// The resource a handle refers to, `None` if it was evicted.
    #[must_use]
    pub fn get(&self, handle: ResourceHandle) -> Option<&B::Resource> {
        match handle {
            ResourceHandle::Default => Some(&self.default),
            ResourceHandle::Slot(slot) => self.slots.get(slot).map(|r| &r.resource),
        }
    }

    /// Mutable variant of [`ResourceCache::get`].
    pub fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut B::Resource> {
        match handle {
            ResourceHandle::Default => Some(&mut self.default),
            ResourceHandle::Slot(slot) => self.slots.get_mut(slot).map(|r| &mut r.resource),
        }
    }

    /// The default resource.
    #[inline]
    #[must_use]
    pub const fn default_resource(&self) -> &B::Resource {
        &self.default
    }

    /// Returns true if the handle still resolves.
    #[must_use]
    pub fn is_valid(&self, handle: ResourceHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Name a handle was acquired under, `None` if it was evicted.
    #[must_use]
    pub fn name_of(&self, handle: ResourceHandle) -> Option<&str> {
        match handle {
            ResourceHandle::Default => Some(DEFAULT_RESOURCE_NAME),
            ResourceHandle::Slot(slot) => self.slots.get(slot).map(|r| r.name.as_str()),
        }
    }

    /// Handle of the resident resource for `name`, without taking a reference.
    #[must_use]
    pub fn handle_of(&self, name: &str) -> Option<ResourceHandle> {
        if is_default_name(name) {
            return Some(ResourceHandle::Default);
        }
        self.table.get(name).handle.map(ResourceHandle::Slot)
    }

    /// Reference entry for `name`. The default resource reads as absent.
    #[must_use]
    pub fn entry(&self, name: &str) -> RefEntry {
        if is_default_name(name) {
            return RefEntry::ABSENT;
        }
        self.table.get(name)
    }

    /// Outstanding references to `name`.
    #[must_use]
    pub fn ref_count(&self, name: &str) -> u64 {
        self.entry(name).ref_count
    }

    /// Number of resident resources, the default excluded.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no resource besides the default is resident.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupancy snapshot. Walks every entry.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            capacity: self.config.max_count,
            resident: self.slots.len(),
            ..CacheStats::default()
        };
        for (_, entry) in self.table.iter() {
            if entry.ref_count > 0 {
                stats.referenced += 1;
            }
            if entry.is_pinned() {
                stats.pinned += 1;
            }
            stats.total_references += entry.ref_count;
        }
        stats
    }

    /// The configuration this cache was created with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> CacheConfig {
        self.config
    }

    /// The backend.
    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Destroys every resident resource and the default, then hands the
    /// backend back.
    pub fn shutdown(self) -> B {
        let Self {
            mut backend,
            mut slots,
            default,
            ..
        } = self;

        let resident = slots.drain();
        tracing::trace!("Shutting down resource cache, destroying {} resources.", resident.len());
        for entry in resident {
            backend.destroy(entry.resource);
        }
        backend.destroy(default);
        backend
    }

    fn materialize(&mut self, name: &str, params: &B::Params) -> CacheResult<PoolHandle> {
        if self.slots.is_full() {
            return Err(self.capacity_exhausted(name));
        }

        let resource = self.backend.create(name, params).map_err(|e| {
            tracing::error!("Failed to create resource '{}': {}", name, e);
            CacheError::Backend {
                name: name.to_owned(),
                reason: e.to_string(),
            }
        })?;

        match self.slots.insert(Resident {
            name: name.to_owned(),
            resource,
        }) {
            Ok(handle) => Ok(handle),
            Err(rejected) => {
                self.backend.destroy(rejected.resource);
                Err(self.capacity_exhausted(name))
            }
        }
    }

    fn evict(&mut self, handle: PoolHandle) {
        if let Some(resident) = self.slots.remove(handle.index()) {
            self.backend.destroy(resident.resource);
        }
    }

    fn resident(&self, slot: PoolHandle) -> CacheResult<&Resident<B::Resource>> {
        self.slots.get(slot).ok_or(CacheError::StaleHandle {
            index: slot.index(),
            generation: slot.generation(),
        })
    }

    fn capacity_exhausted(&self, name: &str) -> CacheError {
        tracing::error!(
            "Resource cache cannot hold any more resources ('{}' rejected). Adjust configuration to allow more.",
            name
        );
        CacheError::CapacityExhausted {
            name: name.to_owned(),
            max_count: self.config.max_count,
        }
    }
}
