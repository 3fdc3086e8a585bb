//! # Dynamic Allocator
//!
//! Variable-size sub-allocation of one owned arena, backed by a [`FreeList`].
//!
//! Used to pack many small resources (vertex runs, uniform blocks, string
//! tables) into one large buffer that is uploaded or mapped as a whole.

use bytemuck::Pod;

use crate::config::ArenaConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::freelist::FreeList;

/// A range handed out by a [`DynamicAllocator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    offset: u64,
    size: u64,
}

impl Block {
    /// Byte offset from the start of the arena.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.offset
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> u64 {
        self.size
    }
}

/// An arena that owns its bytes and tracks them with a free list.
///
/// # Example
///
/// ```rust
/// use kiln_core::DynamicAllocator;
///
/// let mut arena = DynamicAllocator::new(4096).unwrap();
/// let block = arena.allocate(16).unwrap();
/// arena.write_pod(block, &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
/// assert_eq!(arena.read_pod::<f32>(block).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
/// arena.free(block).unwrap();
/// ```
#[derive(Debug)]
pub struct DynamicAllocator {
    list: FreeList,
    memory: Box<[u8]>,
}

impl DynamicAllocator {
    /// Creates an arena of `total_size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] if `total_size` is zero or does
    /// not fit in memory.
    pub fn new(total_size: u64) -> MemoryResult<Self> {
        Self::from_config(&ArenaConfig::new(total_size))
    }

    /// Creates an arena from a config entry.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Configuration`] for a zero or oversized arena.
    pub fn from_config(config: &ArenaConfig) -> MemoryResult<Self> {
        let len = usize::try_from(config.total_size).map_err(|_| {
            MemoryError::Configuration(format!(
                "arena of {}B does not fit in the address space",
                config.total_size
            ))
        })?;
        let list = FreeList::from_config(config)?;
        Ok(Self {
            list,
            memory: vec![0u8; len].into_boxed_slice(),
        })
    }

    /// Arena size in bytes.
    #[inline]
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.list.total_size()
    }

    /// Total free bytes. O(n) in the number of holes.
    #[must_use]
    pub fn free_space(&self) -> u64 {
        self.list.free_space()
    }

    /// The free list tracking this arena.
    #[inline]
    #[must_use]
    pub const fn free_list(&self) -> &FreeList {
        &self.list
    }

    /// Reserves `size` bytes.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroSize`] for `size == 0`
    /// - [`MemoryError::NoSpace`] if no free range is large enough
    pub fn allocate(&mut self, size: u64) -> MemoryResult<Block> {
        match self.list.allocate_block(size) {
            Ok(offset) => Ok(Block { offset, size }),
            Err(e) => {
                tracing::error!("DynamicAllocator::allocate failed for {}B: {}", size, e);
                Err(e)
            }
        }
    }

    /// Returns a block to the arena.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::OutOfRange`] if the block is not inside this arena
    /// - [`MemoryError::Corruption`] if the block is already free
    pub fn free(&mut self, block: Block) -> MemoryResult<()> {
        self.list.free_block(block.size, block.offset).map_err(|e| {
            tracing::error!(
                "DynamicAllocator::free failed for block {}+{}: {}",
                block.offset,
                block.size,
                e
            );
            e
        })
    }

    /// Bytes of a block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] if the block is not inside this arena.
    pub fn bytes(&self, block: Block) -> MemoryResult<&[u8]> {
        let range = self.byte_range(block)?;
        Ok(&self.memory[range])
    }

    /// Mutable bytes of a block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] if the block is not inside this arena.
    pub fn bytes_mut(&mut self, block: Block) -> MemoryResult<&mut [u8]> {
        let range = self.byte_range(block)?;
        Ok(&mut self.memory[range])
    }

    /// Copies `values` to the start of a block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] if the values do not fit the block.
    pub fn write_pod<T: Pod>(&mut self, block: Block, values: &[T]) -> MemoryResult<()> {
        let src: &[u8] = bytemuck::cast_slice(values);
        let dst = self.bytes_mut(block)?;
        let Some(dst) = dst.get_mut(..src.len()) else {
            return Err(MemoryError::OutOfRange {
                offset: block.offset,
                size: src.len() as u64,
                total_size: block.size,
            });
        };
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Reads a block back as values of `T`. Trailing bytes that do not fill
    /// a whole `T` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] if the block is not inside this arena.
    pub fn read_pod<T: Pod>(&self, block: Block) -> MemoryResult<Vec<T>> {
        let bytes = self.bytes(block)?;
        let stride = std::mem::size_of::<T>();
        if stride == 0 {
            return Ok(Vec::new());
        }
        Ok(bytes
            .chunks_exact(stride)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Grows the arena. Existing blocks keep their offsets and contents.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidResize`] unless the arena grows.
    pub fn resize(&mut self, new_size: u64) -> MemoryResult<()> {
        let len = usize::try_from(new_size).map_err(|_| MemoryError::InvalidResize {
            current: self.total_size(),
            requested: new_size,
        })?;
        self.list.resize(new_size)?;
        let mut memory = vec![0u8; len];
        memory[..self.memory.len()].copy_from_slice(&self.memory);
        self.memory = memory.into_boxed_slice();
        Ok(())
    }

    /// Frees every block at once. Contents are left in place.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    fn byte_range(&self, block: Block) -> MemoryResult<std::ops::Range<usize>> {
        let out_of_range = || MemoryError::OutOfRange {
            offset: block.offset,
            size: block.size,
            total_size: self.total_size(),
        };
        let start = usize::try_from(block.offset).map_err(|_| out_of_range())?;
        let len = usize::try_from(block.size).map_err(|_| out_of_range())?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > self.memory.len() {
            return Err(out_of_range());
        }
        Ok(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_free() {
        let mut arena = DynamicAllocator::new(1024).unwrap();
        let a = arena.allocate(100).unwrap();
        let b = arena.allocate(200).unwrap();
        assert_eq!((a.offset(), b.offset()), (0, 100));
        assert_eq!(arena.free_space(), 724);

        arena.free(a).unwrap();
        arena.free(b).unwrap();
        assert_eq!(arena.free_space(), 1024);
        assert_eq!(arena.free_list().node_count(), 1);
    }

    #[test]
    fn test_zero_arena_rejected() {
        assert!(matches!(
            DynamicAllocator::new(0),
            Err(MemoryError::Configuration(_))
        ));
    }

    #[test]
    fn test_double_free_rejected() {
        let mut arena = DynamicAllocator::new(1024).unwrap();
        let a = arena.allocate(64).unwrap();
        arena.allocate(64).unwrap();
        arena.free(a).unwrap();
        assert!(matches!(arena.free(a), Err(MemoryError::Corruption { .. })));
    }

    #[test]
    fn test_pod_roundtrip() {
        let mut arena = DynamicAllocator::new(256).unwrap();
        let _pad = arena.allocate(3).unwrap();
        let block = arena.allocate(12).unwrap();
        arena.write_pod(block, &[7u32, 8, 9]).unwrap();
        assert_eq!(arena.read_pod::<u32>(block).unwrap(), vec![7, 8, 9]);
        assert_eq!(&arena.bytes(block).unwrap()[..4], &7u32.to_ne_bytes());
    }

    #[test]
    fn test_write_too_large() {
        let mut arena = DynamicAllocator::new(256).unwrap();
        let block = arena.allocate(4).unwrap();
        assert!(matches!(
            arena.write_pod(block, &[1u32, 2]),
            Err(MemoryError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_resize_keeps_contents() {
        let mut arena = DynamicAllocator::new(64).unwrap();
        let block = arena.allocate(64).unwrap();
        arena.bytes_mut(block).unwrap().fill(0xAB);

        arena.resize(128).unwrap();
        assert_eq!(arena.total_size(), 128);
        assert_eq!(arena.free_space(), 64);
        assert!(arena.bytes(block).unwrap().iter().all(|&b| b == 0xAB));

        let tail = arena.allocate(64).unwrap();
        assert_eq!(tail.offset(), 64);
    }

    #[test]
    fn test_clear() {
        let mut arena = DynamicAllocator::new(512).unwrap();
        arena.allocate(100).unwrap();
        arena.allocate(100).unwrap();
        arena.clear();
        assert_eq!(arena.free_space(), 512);
    }
}
