//! Configuration management for packrow
//!
//! Provides block size presets for different table cardinalities
//! and validation of custom configurations.

use crate::error::{StoreError, StoreResult};
use crate::store::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Default block size in slots (128K)
pub const DEFAULT_BLOCK_SIZE: usize = 131_072;

/// Store sizing used by the default store factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Minimal number of words per word store chunk, rounded up to a power of two
    pub word_block_size: usize,
    /// Minimal number of slots per object store chunk, rounded up to a power of two
    pub object_block_size: usize,
}

impl StoreConfig {
    /// Large tables: 128K slots per chunk
    pub fn large() -> Self {
        Self {
            word_block_size: DEFAULT_BLOCK_SIZE,
            object_block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Mid-sized tables: 16K slots per chunk
    pub fn medium() -> Self {
        Self {
            word_block_size: 16_384,
            object_block_size: 16_384,
        }
    }

    /// Small tables: smallest chunk the stores accept
    pub fn compact() -> Self {
        Self {
            word_block_size: MIN_BLOCK_SIZE,
            object_block_size: MIN_BLOCK_SIZE,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.word_block_size) {
            return Err(StoreError::InvalidConfig {
                reason: format!(
                    "word_block_size must be in [{}, {}]",
                    MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
                ),
            });
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.object_block_size) {
            return Err(StoreError::InvalidConfig {
                reason: format!(
                    "object_block_size must be in [{}, {}]",
                    MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
                ),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self { Self::large() }
}
