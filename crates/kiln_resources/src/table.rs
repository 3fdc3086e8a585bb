//! # Reference Table
//!
//! Fixed-capacity map from resource name to its reference entry.
//!
//! Lookups never miss: a name that was never stored reads back as the fill
//! value ([`RefEntry::ABSENT`] unless changed with [`RefTable::fill`]).
//! Storing the fill value removes the name again, so only names that hold a
//! resource occupy capacity.

use std::collections::HashMap;

use kiln_core::PoolHandle;

use crate::error::{CacheError, CacheResult};

/// Per-name bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefEntry {
    /// Outstanding acquires.
    pub ref_count: u64,
    /// Slot holding the resource, `None` if nothing is resident.
    pub handle: Option<PoolHandle>,
    /// Destroy the resource once `ref_count` drops to zero.
    pub auto_release: bool,
}

impl RefEntry {
    /// The entry every unseen name starts as.
    pub const ABSENT: Self = Self {
        ref_count: 0,
        handle: None,
        auto_release: false,
    };

    /// A resource is resident for this name.
    #[inline]
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.handle.is_some()
    }

    /// Resident with no references: kept alive because auto-release is off.
    #[inline]
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.ref_count == 0 && self.handle.is_some()
    }
}

/// Name → [`RefEntry`] map with a fixed capacity.
#[derive(Debug)]
pub struct RefTable {
    entries: HashMap<String, RefEntry>,
    capacity: u32,
    fill: RefEntry,
}

impl RefTable {
    /// Creates a table holding at most `capacity` names.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity as usize),
            capacity,
            fill: RefEntry::ABSENT,
        }
    }

    /// Resets every name to `value`.
    pub fn fill(&mut self, value: RefEntry) {
        self.entries.clear();
        self.fill = value;
    }

    /// Entry for `name`, or the fill value.
    #[must_use]
    pub fn get(&self, name: &str) -> RefEntry {
        self.entries.get(name).copied().unwrap_or(self.fill)
    }

    /// Stores `entry` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CapacityExhausted`] when `name` is new and the
    /// table is full.
    pub fn set(&mut self, name: &str, entry: RefEntry) -> CacheResult<()> {
        if entry == self.fill {
            self.entries.remove(name);
            return Ok(());
        }
        if let Some(slot) = self.entries.get_mut(name) {
            *slot = entry;
            return Ok(());
        }
        if self.entries.len() >= self.capacity as usize {
            return Err(CacheError::CapacityExhausted {
                name: name.to_owned(),
                max_count: self.capacity,
            });
        }
        self.entries.insert(name.to_owned(), entry);
        Ok(())
    }

    /// Number of names holding something other than the fill value.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if every name reads as the fill value.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of stored names.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Iterates the stored names and their entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RefEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}
