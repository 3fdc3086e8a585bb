//! # Slot Pool
//!
//! Fixed-capacity generational storage for objects that are created and
//! evicted at runtime (textures, materials, geometry records).

/// Handle to an occupied slot.
///
/// Holds the slot index and the generation the slot was filled at, so a
/// handle kept past eviction never resolves to the slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u64,
}

impl PoolHandle {
    /// Index into the pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    /// `None` until the slot is used for the first time.
    generation: Option<u64>,
    value: Option<T>,
}

/// A generational pool of `T`.
///
/// Slots are recycled through a free-index stack: O(1) insert and remove,
/// no scanning. A fresh pool fills indices in ascending order; after that the
/// most recently freed slot is reused first. Each time a slot is refilled
/// its generation goes up by one (it starts at 0 on first use).
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust
/// use kiln_core::SlotPool;
///
/// let mut pool: SlotPool<&str> = SlotPool::new(4);
/// let first = pool.insert("brick").unwrap();
/// pool.remove(first.index());
///
/// let second = pool.insert("grass").unwrap();
/// assert_eq!(second.index(), first.index());
/// assert_eq!(second.generation(), first.generation() + 1);
/// assert!(pool.get(first).is_none());
/// ```
#[derive(Debug)]
pub struct SlotPool<T> {
    /// The storage array.
    slots: Box<[Slot<T>]>,
    /// Indices of empty slots; the next insert pops from the back.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    allocated_count: usize,
}

impl<T> SlotPool<T> {
    /// Creates a pool with `capacity` slots, all allocated upfront.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|_| Slot {
                generation: None,
                value: None,
            })
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            free_list: (0..capacity).rev().collect(),
            allocated_count: 0,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.allocated_count
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Returns true if every slot is occupied.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free_list.is_empty()
    }

    /// Stores `value` in a free slot.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the pool is full.
    pub fn insert(&mut self, value: T) -> Result<PoolHandle, T> {
        let Some(index) = self.free_list.pop() else {
            return Err(value);
        };

        let slot = &mut self.slots[index as usize];
        let generation = slot.generation.map_or(0, |g| g.wrapping_add(1));
        slot.generation = Some(generation);
        slot.value = Some(value);
        self.allocated_count += 1;

        Ok(PoolHandle { index, generation })
    }

    /// Empties a slot and returns its value. The slot keeps its generation
    /// until it is refilled.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let value = self.slots.get_mut(index as usize)?.value.take()?;
        self.free_list.push(index);
        self.allocated_count -= 1;
        Some(value)
    }

    /// Gets the value a handle refers to, if the slot still holds it.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != Some(handle.generation) {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable variant of [`SlotPool::get`].
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != Some(handle.generation) {
            return None;
        }
        slot.value.as_mut()
    }

    /// Current generation of a slot, `None` if it was never used.
    #[inline]
    #[must_use]
    pub fn generation(&self, index: u32) -> Option<u64> {
        self.slots.get(index as usize)?.generation
    }

    /// Returns true if the handle still refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Iterates over all occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            let handle = PoolHandle {
                index: u32::try_from(index).ok()?,
                generation: slot.generation?,
            };
            Some((handle, value))
        })
    }

    /// Empties every slot and returns the values. Generations are kept.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.allocated_count);
        for index in 0..self.slots.len() {
            if let Some(value) = self.slots[index].value.take() {
                values.push(value);
            }
        }
        let capacity = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.free_list.clear();
        self.free_list.extend((0..capacity).rev());
        self.allocated_count = 0;
        values
    }
}
