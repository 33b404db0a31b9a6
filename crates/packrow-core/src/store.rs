//! Growable block stores
//!
//! A block store is a vector of fixed-size, power-of-two chunks addressed by
//! a flat slot index: `chunk = index >> index_bits`, `offset = index & mask`.
//! Writes allocate every chunk up to the one they touch; reads never allocate
//! and fail past the last allocated chunk. Stores never shrink.
//!
//! `WordStore` holds the packed 32-bit words of all bit fields, `ObjectStore`
//! holds one optional object per slot.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Smallest accepted block size
pub const MIN_BLOCK_SIZE: usize = 1024;

/// Largest accepted block size
pub const MAX_BLOCK_SIZE: usize = 33_554_432;

/// Store of 32-bit words
pub type WordStore = BlockStore<u32>;

/// Store of optional objects, one per slot
pub type ObjectStore<T> = BlockStore<Option<T>>;

/// Chunked array indexed by slot, grown on write.
#[derive(Clone)]
pub struct BlockStore<T> {
    blocks: Vec<Box<[T]>>,
    index_bits: u32,
    block_size: usize,
    index_mask: u64,
}

impl<T: Default> BlockStore<T> {
    /// Create a store whose chunks hold `min_block_size` slots, rounded up to
    /// the next power of two.
    pub fn new(min_block_size: usize) -> StoreResult<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&min_block_size) {
            return Err(StoreError::InvalidBlockSize {
                requested: min_block_size,
                min: MIN_BLOCK_SIZE,
                max: MAX_BLOCK_SIZE,
            });
        }

        let block_size = min_block_size.next_power_of_two();
        Ok(Self {
            blocks: Vec::new(),
            index_bits: block_size.trailing_zeros(),
            block_size,
            index_mask: block_size as u64 - 1,
        })
    }

    /// Create a store with the default 128K-slot chunks.
    pub fn with_default_block_size() -> Self {
        Self {
            blocks: Vec::new(),
            index_bits: crate::config::DEFAULT_BLOCK_SIZE.trailing_zeros(),
            block_size: crate::config::DEFAULT_BLOCK_SIZE,
            index_mask: crate::config::DEFAULT_BLOCK_SIZE as u64 - 1,
        }
    }

    /// Write a value, allocating chunks as needed.
    pub fn set(&mut self, index: u64, value: T) {
        let (block, element) = self.split(index);
        self.ensure_block(block);
        self.blocks[block][element] = value;
    }

    /// Read a value. Slots inside allocated chunks that were never written
    /// hold `T::default()`.
    pub fn get(&self, index: u64) -> StoreResult<&T> {
        let (block, element) = self.split(index);
        self.blocks
            .get(block)
            .map(|b| &b[element])
            .ok_or(StoreError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            })
    }

    /// Mutable access to an allocated slot.
    pub fn get_mut(&mut self, index: u64) -> StoreResult<&mut T> {
        let capacity = self.capacity();
        let (block, element) = self.split(index);
        self.blocks
            .get_mut(block)
            .map(|b| &mut b[element])
            .ok_or(StoreError::IndexOutOfRange { index, capacity })
    }

    /// Slots per chunk.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of low index bits that address a slot inside a chunk.
    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    /// Mask selecting the in-chunk offset of an index.
    pub fn index_mask(&self) -> u64 {
        self.index_mask
    }

    /// Number of allocated chunks.
    pub fn blocks_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of allocated slots.
    pub fn capacity(&self) -> u64 {
        self.block_size as u64 * self.blocks.len() as u64
    }

    /// Allocated chunks in order. Used by persistence collaborators.
    pub fn blocks(&self) -> impl Iterator<Item = &[T]> {
        self.blocks.iter().map(|b| &b[..])
    }

    fn split(&self, index: u64) -> (usize, usize) {
        (
            (index >> self.index_bits) as usize,
            (index & self.index_mask) as usize,
        )
    }

    fn ensure_block(&mut self, block: usize) {
        while self.blocks.len() <= block {
            let chunk: Box<[T]> = std::iter::repeat_with(T::default)
                .take(self.block_size)
                .collect();
            self.blocks.push(chunk);
        }
    }
}

impl BlockStore<u32> {
    /// Read one word.
    pub fn get_int(&self, index: u64) -> StoreResult<u32> {
        self.get(index).copied()
    }

    /// Overwrite one word.
    pub fn set_int(&mut self, index: u64, value: u32) {
        self.set(index, value);
    }

    /// Masked read-modify-write: `stored = (value & mask) | (stored & !mask)`.
    pub fn set_partial_int(&mut self, index: u64, value: u32, mask: u32) {
        let (block, element) = self.split(index);
        self.ensure_block(block);
        let slot = &mut self.blocks[block][element];
        *slot = (value & mask) | (*slot & !mask);
    }

    /// Read a 64-bit value spread over two consecutive words, high word first.
    pub fn get_long(&self, index: u64) -> StoreResult<u64> {
        let high = self.get_int(index)?;
        let low = self.get_int(self.next_index(index)?)?;
        Ok(build_long(high, low))
    }

    /// Write a 64-bit value over two consecutive words, high word first. The
    /// low word lands in slot 0 of the next chunk when the high word takes the
    /// last slot of a chunk.
    pub fn set_long(&mut self, index: u64, value: u64) -> StoreResult<()> {
        let low_index = self.next_index(index)?;
        let (last_block, _) = self.split(low_index);
        self.ensure_block(last_block);

        self.set(index, (value >> 32) as u32);
        self.set(low_index, value as u32);
        Ok(())
    }

    fn next_index(&self, index: u64) -> StoreResult<u64> {
        index.checked_add(1).ok_or(StoreError::IndexOutOfRange {
            index,
            capacity: self.capacity(),
        })
    }
}

impl<T> fmt::Debug for BlockStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStore")
            .field("block_size", &self.block_size)
            .field("blocks_count", &self.blocks.len())
            .finish()
    }
}

impl<T: Default> Default for BlockStore<T> {
    fn default() -> Self {
        Self::with_default_block_size()
    }
}

/// Join two words into one 64-bit value.
pub fn build_long(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}
