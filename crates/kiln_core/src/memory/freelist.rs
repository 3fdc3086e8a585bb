//! # Free List
//!
//! Tracks the free byte ranges of one fixed-size arena.
//!
//! The list never touches the arena itself. It only hands out offsets, so the
//! same structure serves CPU-side buffers ([`DynamicAllocator`]) and GPU
//! buffers whose memory lives on the other side of the driver.
//!
//! ## Layout
//!
//! ```text
//!   arena:  [ used ][ free ][ used ][     free     ]
//!                    ▲               ▲
//!   head ──> {64, 32} ────────────> {128, 896} ──> None
//! ```
//!
//! Nodes are kept in offset order and adjacent free ranges are always merged,
//! so the list length is the number of holes in the arena.
//!
//! [`DynamicAllocator`]: super::DynamicAllocator

use std::collections::TryReserveError;
use std::mem::size_of;

use crate::config::ArenaConfig;
use crate::error::{MemoryError, MemoryResult};

/// Arenas below this many nodes' worth of memory are warned about.
const INEFFICIENT_NODE_COUNT: u64 = 8;

/// Smallest node pool a list is ever given.
const MIN_ENTRIES: usize = 8;

/// Largest node pool derived from an arena size (32 MiB of nodes). Bigger
/// pools have to be asked for with [`FreeList::with_max_entries`].
const MAX_DERIVED_ENTRIES: usize = 1 << 20;

/// One contiguous free range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeRange {
    /// Offset of the first free byte.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
}

impl FreeRange {
    /// One past the last free byte.
    #[inline]
    #[must_use]
    pub const fn end(self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Clone, Copy, Debug)]
struct FreeNode {
    range: FreeRange,
    next: Option<usize>,
}

impl FreeNode {
    const UNUSED: Self = Self {
        range: FreeRange { offset: 0, size: 0 },
        next: None,
    };
}

/// Free-range tracker for a single arena.
///
/// First-fit in offset order. Freed ranges are coalesced with both
/// neighbours. Bookkeeping lives in a fixed node pool sized when the list is
/// created (or resized), so tracking never allocates.
///
/// # Thread Safety
///
/// This list is NOT thread-safe. Use one list per owning buffer.
///
/// # Example
///
/// ```rust
/// use kiln_core::FreeList;
///
/// let mut list = FreeList::new(1024).unwrap();
/// let a = list.allocate_block(256).unwrap();
/// let b = list.allocate_block(256).unwrap();
/// assert_eq!((a, b), (0, 256));
///
/// list.free_block(256, a).unwrap();
/// assert_eq!(list.allocate_block(128).unwrap(), 0);
/// assert_eq!(list.free_space(), 1024 - 384);
/// ```
#[derive(Debug)]
pub struct FreeList {
    /// Arena size in bytes.
    total_size: u64,
    /// Node pool. Only nodes reachable from `head` are meaningful.
    nodes: Box<[FreeNode]>,
    /// Indices of pool nodes not linked into the list.
    spare: Vec<usize>,
    /// First free range, `None` when the whole arena is allocated.
    head: Option<usize>,
}

impl FreeList {
    /// Node pool size used for an arena of `total_size` bytes.
    ///
    /// Grows with the arena up to a fixed cap, so huge address ranges do not
    /// get billions of nodes up front.
    #[must_use]
    pub fn entries_for(total_size: u64) -> usize {
        let stride = (size_of::<usize>() * size_of::<FreeNode>()) as u64;
        usize::try_from(total_size / stride)
            .unwrap_or(usize::MAX)
            .clamp(MIN_ENTRIES, MAX_DERIVED_ENTRIES)
            .min(Self::max_useful_entries(total_size))
    }

    /// Most nodes an arena of `total_size` bytes can ever need: one per
    /// hole, and holes are separated by at least one allocated byte.
    #[must_use]
    pub fn max_useful_entries(total_size: u64) -> usize {
        usize::try_from(total_size / 2 + 1).unwrap_or(usize::MAX)
    }

    /// Bytes of bookkeeping a list for `total_size` bytes occupies.
    ///
    /// The pool is allocated eagerly when the list is created.
    #[must_use]
    pub fn memory_requirement(total_size: u64) -> u64 {
        (size_of::<Self>() + Self::entries_for(total_size) * size_of::<FreeNode>()) as u64
    }

    /// Creates a list covering `[0, total_size)` with a derived node pool.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if `total_size` is zero.
    pub fn new(total_size: u64) -> MemoryResult<Self> {
        Self::with_max_entries(total_size, Self::entries_for(total_size))
    }

    /// Creates a list covering `[0, total_size)` with `max_entries` nodes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if either argument is zero,
    /// if `max_entries` exceeds [`FreeList::max_useful_entries`], or if the
    /// node pool cannot be allocated.
    pub fn with_max_entries(total_size: u64, max_entries: usize) -> MemoryResult<Self> {
        if total_size == 0 {
            tracing::error!("FreeList cannot track an arena of 0 bytes.");
            return Err(MemoryError::Configuration("free list total_size must be > 0".into()));
        }
        if max_entries == 0 {
            tracing::error!("FreeList needs at least one node.");
            return Err(MemoryError::Configuration("free list max_entries must be > 0".into()));
        }
        let useful = Self::max_useful_entries(total_size);
        if max_entries > useful {
            tracing::error!(
                "FreeList max_entries {} exceeds the {} nodes a {}B arena can use.",
                max_entries,
                useful,
                total_size
            );
            return Err(MemoryError::Configuration(format!(
                "free list max_entries {max_entries} exceeds {useful} for a {total_size}B arena"
            )));
        }

        let min_size = (size_of::<Self>() + size_of::<FreeNode>()) as u64 * INEFFICIENT_NODE_COUNT;
        if total_size < min_size {
            tracing::warn!(
                "Free lists are very inefficient with arenas smaller than {}B (got {}B).",
                min_size,
                total_size
            );
        }

        let pool_error = |e: TryReserveError| {
            tracing::error!("FreeList node pool of {} entries cannot be allocated: {}", max_entries, e);
            MemoryError::Configuration(format!(
                "free list node pool of {max_entries} entries cannot be allocated: {e}"
            ))
        };
        let mut nodes = Vec::new();
        nodes.try_reserve_exact(max_entries).map_err(pool_error)?;
        nodes.resize(max_entries, FreeNode::UNUSED);
        let mut spare = Vec::new();
        spare.try_reserve_exact(max_entries).map_err(pool_error)?;

        let mut list = Self {
            total_size,
            nodes: nodes.into_boxed_slice(),
            spare,
            head: None,
        };
        list.clear();
        Ok(list)
    }

    /// Creates a list from an arena config.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] for a zero size or node pool.
    pub fn from_config(config: &ArenaConfig) -> MemoryResult<Self> {
        match config.max_entries {
            Some(max_entries) => Self::with_max_entries(config.total_size, max_entries),
            None => Self::new(config.total_size),
        }
    }

    /// Arena size in bytes.
    #[inline]
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Size of the node pool.
    #[inline]
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.nodes.len()
    }

    /// Finds room for `size` bytes and returns its offset.
    ///
    /// First fit in offset order: an exact-size range is unlinked entirely,
    /// otherwise the first larger range is shrunk from the front.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroSize`] for `size == 0`
    /// - [`MemoryError::NoSpace`] if no range is large enough
    pub fn allocate_block(&mut self, size: u64) -> MemoryResult<u64> {
        if size == 0 {
            return Err(MemoryError::ZeroSize);
        }

        let mut previous: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = self.nodes[index];
            if node.range.size == size {
                match previous {
                    Some(prev) => self.nodes[prev].next = node.next,
                    None => self.head = node.next,
                }
                self.recycle(index);
                return Ok(node.range.offset);
            } else if node.range.size > size {
                let range = &mut self.nodes[index].range;
                range.offset += size;
                range.size -= size;
                return Ok(node.range.offset);
            }

            previous = cursor;
            cursor = node.next;
        }

        let available = self.free_space();
        tracing::warn!(
            "FreeList::allocate_block, no block with enough free space found (requested: {}B, available: {}B)",
            size,
            available
        );
        Err(MemoryError::NoSpace {
            requested: size,
            available,
        })
    }

    /// Returns `[offset, offset + size)` to the free list.
    ///
    /// The range is linked in offset order and merged with whichever
    /// neighbours it touches. On error the list is left unmodified.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroSize`] for `size == 0`
    /// - [`MemoryError::OutOfRange`] if the range extends past the arena
    /// - [`MemoryError::Corruption`] if the range overlaps a free range
    /// - [`MemoryError::NodesExhausted`] if a new node is needed and none is left
    pub fn free_block(&mut self, size: u64, offset: u64) -> MemoryResult<()> {
        if size == 0 {
            return Err(MemoryError::ZeroSize);
        }
        let end = match offset.checked_add(size) {
            Some(end) if end <= self.total_size => end,
            _ => {
                tracing::warn!(
                    "FreeList::free_block, range {}+{} is outside the {}B arena.",
                    offset,
                    size,
                    self.total_size
                );
                return Err(MemoryError::OutOfRange {
                    offset,
                    size,
                    total_size: self.total_size,
                });
            }
        };

        let Some(head) = self.head else {
            // Everything was allocated: the freed range becomes the only node.
            let index = self.take_node()?;
            self.nodes[index] = FreeNode {
                range: FreeRange { offset, size },
                next: None,
            };
            self.head = Some(index);
            return Ok(());
        };

        // `previous` ends up on the last range starting before `offset`,
        // `cursor` on the first range starting at or after it.
        let mut previous: Option<usize> = None;
        let mut cursor = Some(head);
        while let Some(index) = cursor {
            let node = self.nodes[index];
            if node.range.offset >= offset {
                break;
            }
            previous = cursor;
            cursor = node.next;
        }

        let prev_range = previous.map(|index| self.nodes[index].range);
        let next_range = cursor.map(|index| self.nodes[index].range);
        if prev_range.is_some_and(|r| r.end() > offset) || next_range.is_some_and(|r| r.offset < end) {
            tracing::warn!(
                "Unable to reconcile freed block {}+{} with the free list. Corruption possible?",
                offset,
                size
            );
            return Err(MemoryError::Corruption { offset, size });
        }

        let joins_prev = previous.filter(|_| prev_range.is_some_and(|r| r.end() == offset));
        let joins_next = cursor.filter(|_| next_range.is_some_and(|r| r.offset == end));
        match (joins_prev, joins_next) {
            (Some(prev), Some(next)) => {
                let absorbed = self.nodes[next];
                let node = &mut self.nodes[prev];
                node.range.size += size + absorbed.range.size;
                node.next = absorbed.next;
                self.recycle(next);
            }
            (Some(prev), None) => self.nodes[prev].range.size += size,
            (None, Some(next)) => {
                let range = &mut self.nodes[next].range;
                range.offset = offset;
                range.size += size;
            }
            (None, None) => {
                let index = self.take_node()?;
                self.nodes[index] = FreeNode {
                    range: FreeRange { offset, size },
                    next: cursor,
                };
                match previous {
                    Some(prev) => self.nodes[prev].next = Some(index),
                    None => self.head = Some(index),
                }
            }
        }

        Ok(())
    }

    /// Grows the arena to `new_size` bytes.
    ///
    /// Existing ranges are copied into a node pool sized for the new arena.
    /// The new tail is merged into the last range when that range touches
    /// the old end, and appended as its own range otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidResize`] unless `new_size > total_size()`.
    pub fn resize(&mut self, new_size: u64) -> MemoryResult<()> {
        let old_size = self.total_size;
        if new_size <= old_size {
            tracing::warn!("FreeList::resize, {}B does not grow a {}B arena.", new_size, old_size);
            return Err(MemoryError::InvalidResize {
                current: old_size,
                requested: new_size,
            });
        }
        let delta = new_size - old_size;

        let ranges: Vec<FreeRange> = self.ranges().collect();
        let max_entries = Self::entries_for(new_size)
            .max(self.nodes.len())
            .max(ranges.len() + 1);

        let mut nodes = vec![FreeNode::UNUSED; max_entries];
        for (index, range) in ranges.iter().enumerate() {
            nodes[index].range = *range;
            if index > 0 {
                nodes[index - 1].next = Some(index);
            }
        }

        let mut count = ranges.len();
        match count.checked_sub(1) {
            Some(last) if nodes[last].range.end() == old_size => nodes[last].range.size += delta,
            last => {
                nodes[count].range = FreeRange {
                    offset: old_size,
                    size: delta,
                };
                if let Some(last) = last {
                    nodes[last].next = Some(count);
                }
                count += 1;
            }
        }

        self.nodes = nodes.into_boxed_slice();
        self.spare = (count..max_entries).rev().collect();
        self.head = Some(0);
        self.total_size = new_size;
        Ok(())
    }

    /// Resets to a single free range spanning the whole arena.
    pub fn clear(&mut self) {
        self.nodes.fill(FreeNode::UNUSED);
        self.nodes[0].range = FreeRange {
            offset: 0,
            size: self.total_size,
        };
        self.spare.clear();
        self.spare.extend((1..self.nodes.len()).rev());
        self.head = Some(0);
    }

    /// Total free bytes.
    ///
    /// Walks the whole list, O(n). Use sparingly.
    #[must_use]
    pub fn free_space(&self) -> u64 {
        self.ranges().map(|range| range.size).sum()
    }

    /// Size of the largest free range, the biggest request that can succeed.
    #[must_use]
    pub fn largest_free_block(&self) -> u64 {
        self.ranges().map(|range| range.size).max().unwrap_or(0)
    }

    /// Number of free ranges (holes) in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.ranges().count()
    }

    /// Iterates the free ranges in offset order.
    #[must_use]
    pub fn ranges(&self) -> Ranges<'_> {
        Ranges {
            list: self,
            cursor: self.head,
        }
    }

    fn take_node(&mut self) -> MemoryResult<usize> {
        self.spare.pop().ok_or_else(|| {
            tracing::warn!("FreeList node pool exhausted ({} entries).", self.nodes.len());
            MemoryError::NodesExhausted {
                max_entries: self.nodes.len(),
            }
        })
    }

    fn recycle(&mut self, index: usize) {
        self.nodes[index] = FreeNode::UNUSED;
        self.spare.push(index);
    }
}

/// Iterator over the free ranges of a [`FreeList`], in offset order.
#[derive(Debug)]
pub struct Ranges<'a> {
    list: &'a FreeList,
    cursor: Option<usize>,
}

impl Iterator for Ranges<'_> {
    type Item = FreeRange;

    fn next(&mut self) -> Option<FreeRange> {
        let node = self.list.nodes[self.cursor?];
        self.cursor = node.next;
        Some(node.range)
    }
}
