//! Memory layout builders
//!
//! A memory layout assigns every bit header of a table a `MemoryPosition`
//! (word inside the record, first bit inside that word) and fixes the record
//! size in words.
//!
//! - `AutomaticLayoutBuilder` packs headers with a greedy heuristic
//! - `CustomLayoutBuilder` replays an explicit placement, with or without
//!   an overlap check
//! - `RecordedLayoutBuilder` replays a previously computed layout, keyed by
//!   header name and optionally guarded by its checksum
//!
//! ## Automatic packing
//!
//! Headers are taken widest first. Each goes to the first word where it
//! fits: it may start in the free tail of a partially filled word, but any
//! further word it spills into must be completely free, and it may not end
//! past its own max last bit.
//!
//! ```text
//!  int32, short16, byte8, bool
//!  word 0 | int32                            |
//!  word 1 | short16        | byte8  |b|      |
//! ```

use std::collections::BTreeMap;

use hashbrown::HashSet;
use tracing::{trace, warn};

use crate::error::{StoreError, StoreResult};
use crate::field::WORD_SIZE;
use crate::header::BitSchema;

/// Placement of one bit header inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryPosition {
    /// Word of the record the field starts in
    pub word_offset: u32,
    /// First bit of the field inside that word
    pub bit_shift: u32,
}

impl MemoryPosition {
    pub fn new(word_offset: u32, bit_shift: u32) -> Self {
        Self {
            word_offset,
            bit_shift,
        }
    }
}

/// Record size and the position of every bit header, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLayout {
    record_size: u32,
    positions: BTreeMap<String, MemoryPosition>,
}

impl MemoryLayout {
    /// Layout from already computed parts.
    pub fn new(record_size: u32, positions: BTreeMap<String, MemoryPosition>) -> Self {
        Self {
            record_size,
            positions,
        }
    }

    /// Words per record.
    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Position of a header, if the layout places it.
    pub fn position_for(&self, name: &str) -> Option<MemoryPosition> {
        self.positions.get(name).copied()
    }

    /// All placements, ordered by header name.
    pub fn positions(&self) -> impl Iterator<Item = (&str, MemoryPosition)> {
        self.positions.iter().map(|(name, position)| (name.as_str(), *position))
    }

    /// Number of placed headers.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if no header is placed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// CRC32C fingerprint of the record size and every placement.
    ///
    /// Two layouts with equal checksums place the same header names at the
    /// same positions, so a stored checksum detects a layout that was edited
    /// or recorded for a different schema.
    pub fn checksum(&self) -> u32 {
        let mut payload = Vec::with_capacity(4 + self.positions.len() * 24);
        payload.extend_from_slice(&self.record_size.to_le_bytes());
        for (name, position) in &self.positions {
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(&position.word_offset.to_le_bytes());
            payload.extend_from_slice(&position.bit_shift.to_le_bytes());
        }
        crc32c::crc32c(&payload)
    }
}

/// Strategy computing the layout of a table's bit headers.
pub trait MemoryLayoutBuilder {
    /// Place every header in `headers` into records of `word_size`-bit words.
    fn compute(&self, word_size: u32, headers: &[BitSchema]) -> StoreResult<MemoryLayout>;
}

/// Greedy packer. Deterministic, not optimal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomaticLayoutBuilder;

impl MemoryLayoutBuilder for AutomaticLayoutBuilder {
    fn compute(&self, word_size: u32, headers: &[BitSchema]) -> StoreResult<MemoryLayout> {
        let mut sorted: Vec<&BitSchema> = headers.iter().collect();
        sorted.sort_by(|a, b| b.bits_count().cmp(&a.bits_count()));

        let mut words = Words::new(word_size);
        let mut positions = BTreeMap::new();
        for header in sorted {
            let position = words.place(header)?;
            trace!(
                header = header.name(),
                word = position.word_offset,
                shift = position.bit_shift,
                "placed header"
            );
            positions.insert(header.name().to_string(), position);
        }

        Ok(MemoryLayout::new(words.len(), positions))
    }
}

/// Filled bits of every word of the record being packed.
struct Words {
    word_size: u32,
    filled: Vec<u32>,
}

impl Words {
    fn new(word_size: u32) -> Self {
        Self {
            word_size,
            filled: Vec::new(),
        }
    }

    fn len(&self) -> u32 {
        self.filled.len() as u32
    }

    fn filled_bits(&self, word: usize) -> u32 {
        self.filled.get(word).copied().unwrap_or(0)
    }

    fn free_bits(&self, word: usize) -> u32 {
        self.word_size - self.filled_bits(word)
    }

    fn place(&mut self, header: &BitSchema) -> StoreResult<MemoryPosition> {
        for word in 0..=self.filled.len() {
            if self.fits(header, word) {
                return Ok(self.fill(header, word));
            }
        }

        warn!(header = header.name(), "header does not fit into memory layout");
        Err(StoreError::UnfitHeader {
            name: header.name().to_string(),
        })
    }

    fn fits(&self, header: &BitSchema, first_word: usize) -> bool {
        let mut remaining = header.bits_count() as i64;
        let mut word = first_word;
        let mut last_bit = self.word_size;

        while last_bit <= header.max_last_bit() {
            let free = self.free_bits(word);
            if free == 0 {
                return false;
            }
            // continuation words must be empty
            if word != first_word && free != self.word_size {
                return false;
            }

            remaining -= free as i64;
            if remaining <= 0 {
                return true;
            }

            last_bit += self.word_size;
            word += 1;
        }

        false
    }

    fn fill(&mut self, header: &BitSchema, first_word: usize) -> MemoryPosition {
        let position = MemoryPosition::new(first_word as u32, self.filled_bits(first_word));

        let mut remaining = header.bits_count();
        let mut word = first_word;
        while remaining > 0 {
            if word >= self.filled.len() {
                self.filled.push(0);
            }
            let free = self.free_bits(word);
            let taken = free.min(remaining);
            self.filled[word] += taken;
            remaining -= taken;
            word += 1;
        }

        position
    }
}

/// Whether a custom layout may place two headers on the same bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Every physical bit belongs to at most one header
    Reject,
    /// Headers may alias each other, for union-like records
    Allow,
}

/// Explicit header placement, validated when the builder is created.
#[derive(Debug, Clone)]
pub struct CustomLayoutBuilder {
    word_size: u32,
    record_size: u32,
    positions: BTreeMap<String, (BitSchema, MemoryPosition)>,
}

impl CustomLayoutBuilder {
    /// Placement over 32-bit words where no two headers share a bit.
    pub fn non_overlapping(
        record_size: u32,
        positions: impl IntoIterator<Item = (BitSchema, MemoryPosition)>,
    ) -> StoreResult<Self> {
        Self::with_word_size(WORD_SIZE, record_size, OverlapPolicy::Reject, positions)
    }

    /// Placement over 32-bit words where headers may alias each other.
    pub fn overlapping(
        record_size: u32,
        positions: impl IntoIterator<Item = (BitSchema, MemoryPosition)>,
    ) -> StoreResult<Self> {
        Self::with_word_size(WORD_SIZE, record_size, OverlapPolicy::Allow, positions)
    }

    /// Placement over words of any size.
    pub fn with_word_size(
        word_size: u32,
        record_size: u32,
        policy: OverlapPolicy,
        positions: impl IntoIterator<Item = (BitSchema, MemoryPosition)>,
    ) -> StoreResult<Self> {
        if word_size == 0 {
            return Err(StoreError::InvalidBound {
                what: "Word Size",
                value: 0,
                min: 1,
                max: u32::MAX as i64,
            });
        }
        if record_size == 0 {
            return Err(StoreError::InvalidBound {
                what: "Record Size",
                value: 0,
                min: 1,
                max: u32::MAX as i64,
            });
        }

        let mut placed = BTreeMap::new();
        for (header, position) in positions {
            if placed.contains_key(header.name()) {
                return Err(StoreError::DuplicateHeader {
                    name: header.name().to_string(),
                });
            }
            placed.insert(header.name().to_string(), (header, position));
        }

        let builder = Self {
            word_size,
            record_size,
            positions: placed,
        };
        for (header, position) in builder.positions.values() {
            builder.validate_position(header, position)?;
        }
        if policy == OverlapPolicy::Reject {
            builder.validate_not_overlapping()?;
        }

        Ok(builder)
    }

    /// Words per record.
    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Word size the placement was written for.
    pub fn word_size(&self) -> u32 {
        self.word_size
    }

    fn words_taken(&self, header: &BitSchema, position: &MemoryPosition) -> u32 {
        (position.bit_shift + header.bits_count()).div_ceil(self.word_size)
    }

    fn validate_position(&self, header: &BitSchema, position: &MemoryPosition) -> StoreResult<()> {
        if position.bit_shift >= self.word_size {
            return Err(StoreError::InvalidPosition {
                name: header.name().to_string(),
                reason: format!("bit shift {} is outside of the word", position.bit_shift),
            });
        }

        let words_taken = self.words_taken(header, position);
        if position.word_offset as u64 + words_taken as u64 > self.record_size as u64 {
            return Err(StoreError::InvalidPosition {
                name: header.name().to_string(),
                reason: "It will not fit into defined Record Size".into(),
            });
        }
        if words_taken as u64 * self.word_size as u64 > header.max_last_bit() as u64 {
            return Err(StoreError::InvalidPosition {
                name: header.name().to_string(),
                reason: "Maximum Last Bit for this header is violated".into(),
            });
        }
        Ok(())
    }

    fn validate_not_overlapping(&self) -> StoreResult<()> {
        let mut taken: HashSet<(u32, u32)> = HashSet::new();
        for (header, position) in self.positions.values() {
            let mut word = position.word_offset;
            let mut shift = position.bit_shift;
            let mut remaining = header.bits_count();
            while remaining > 0 {
                let count = remaining.min(self.word_size - shift);
                for bit in shift..shift + count {
                    if !taken.insert((word, bit)) {
                        warn!(header = header.name(), word, bit, "headers overlap");
                        return Err(StoreError::OverlappingHeaders {
                            name: header.name().to_string(),
                            word,
                            bit,
                        });
                    }
                }
                remaining -= count;
                shift = 0;
                word += 1;
            }
        }
        Ok(())
    }
}

impl MemoryLayoutBuilder for CustomLayoutBuilder {
    fn compute(&self, word_size: u32, headers: &[BitSchema]) -> StoreResult<MemoryLayout> {
        if word_size != self.word_size {
            return Err(StoreError::WordSizeMismatch {
                expected: self.word_size,
                requested: word_size,
            });
        }

        let mut positions = BTreeMap::new();
        for header in headers {
            let position = match self.positions.get(header.name()) {
                Some((placed, position)) if placed == header => *position,
                _ => {
                    return Err(StoreError::MissingPosition {
                        name: header.name().to_string(),
                    })
                }
            };
            positions.insert(header.name().to_string(), position);
        }

        Ok(MemoryLayout::new(self.record_size, positions))
    }
}

/// Replays a layout computed earlier, for example one restored together
/// with a table's stores.
#[derive(Debug, Clone)]
pub struct RecordedLayoutBuilder {
    layout: MemoryLayout,
    checksum: Option<u32>,
}

impl RecordedLayoutBuilder {
    /// Replay `layout` as is.
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            layout,
            checksum: None,
        }
    }

    /// Replay `layout` only if it still matches the checksum recorded with it.
    pub fn verified(layout: MemoryLayout, checksum: u32) -> Self {
        Self {
            layout,
            checksum: Some(checksum),
        }
    }

    /// Recorded layout.
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }
}

impl MemoryLayoutBuilder for RecordedLayoutBuilder {
    fn compute(&self, word_size: u32, headers: &[BitSchema]) -> StoreResult<MemoryLayout> {
        if let Some(expected) = self.checksum {
            let actual = self.layout.checksum();
            if actual != expected {
                warn!(expected, actual, "recorded layout checksum mismatch");
                return Err(StoreError::ChecksumMismatch { expected, actual });
            }
        }
        if word_size != WORD_SIZE {
            return Err(StoreError::WordSizeMismatch {
                expected: WORD_SIZE,
                requested: word_size,
            });
        }
        if headers.is_empty() {
            return Ok(MemoryLayout::default());
        }

        let mut placed = Vec::with_capacity(headers.len());
        for header in headers {
            let position = self
                .layout
                .position_for(header.name())
                .ok_or_else(|| StoreError::MissingPosition {
                    name: header.name().to_string(),
                })?;
            placed.push((header.clone(), position));
        }

        // replayed positions get the same checks as a hand-written layout
        CustomLayoutBuilder::non_overlapping(self.layout.record_size(), placed)?
            .compute(word_size, headers)
    }
}
