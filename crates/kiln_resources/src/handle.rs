//! # Resource Handles
//!
//! A handle names either the cache's default resource or one slot at one
//! generation. Handles are `Copy` and stay cheap to compare; a handle kept
//! after its resource was evicted simply stops resolving.

use kiln_core::PoolHandle;

/// Identifies a resource inside a [`ResourceCache`](crate::ResourceCache).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    /// The cache's default resource. Never counted, never evicted.
    #[default]
    Default,
    /// A resource living in a slot.
    Slot(PoolHandle),
}

impl ResourceHandle {
    /// Checks if this is the default resource.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// Slot index, `None` for the default resource.
    #[inline]
    #[must_use]
    pub const fn index(self) -> Option<u32> {
        match self {
            Self::Default => None,
            Self::Slot(handle) => Some(handle.index()),
        }
    }

    /// Slot generation, `None` for the default resource.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> Option<u64> {
        match self {
            Self::Default => None,
            Self::Slot(handle) => Some(handle.generation()),
        }
    }
}

impl From<PoolHandle> for ResourceHandle {
    fn from(handle: PoolHandle) -> Self {
        Self::Slot(handle)
    }
}
