//! Bit field geometry and masked access
//!
//! A `BitConfig` places one field inside a record: the record is
//! `record_size` words long, the field starts at word `word_offset`, bit
//! `bit_shift`, and spans `bits_count` bits. Record `p` starts at word
//! `p * record_size` of the shared word store.
//!
//! ```text
//!  record (record_size = 4)
//!  | word 0 | word 1                          | word 2 | word 3 |
//!           |<- 12 bits ->|<- 5 bits ->|<- 15 ->|
//!                          field: word_offset = 1, bit_shift = 12, bits_count = 5
//! ```
//!
//! `BitField` is a validated config. Every write goes through
//! `WordStore::set_partial_int`, so fields sharing a word only stay intact as
//! long as their masks are disjoint.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{StoreError, StoreResult};
use crate::header::{BitSchema, CodecKind};
use crate::store::WordStore;

/// Bits per word
pub const WORD_SIZE: u32 = 32;

/// Word store shared by every bit field of a table
pub type SharedWordStore = Rc<RefCell<WordStore>>;

/// Placement of one bit field inside a record.
#[derive(Debug, Clone)]
pub struct BitConfig {
    store: SharedWordStore,
    record_size: u32,
    word_offset: u32,
    bit_shift: u32,
    bits_count: u32,
}

impl BitConfig {
    /// Validate and build a field placement.
    pub fn new(
        store: SharedWordStore,
        record_size: u32,
        word_offset: u32,
        bit_shift: u32,
        bits_count: u32,
    ) -> StoreResult<Self> {
        if record_size == 0 {
            return Err(StoreError::InvalidGeometry {
                reason: "Record size must be greater than 0".into(),
            });
        }
        if bits_count == 0 {
            return Err(StoreError::InvalidGeometry {
                reason: "Bits count must be greater than 0".into(),
            });
        }

        let end = word_offset as u64 * WORD_SIZE as u64 + bit_shift as u64 + bits_count as u64;
        if end > record_size as u64 * WORD_SIZE as u64 {
            return Err(StoreError::InvalidGeometry {
                reason: format!(
                    "field ending at bit {} will not fit into record of {} words",
                    end, record_size
                ),
            });
        }

        Ok(Self {
            store,
            record_size,
            word_offset,
            bit_shift,
            bits_count,
        })
    }

    /// Store holding the field.
    pub fn store(&self) -> &SharedWordStore {
        &self.store
    }

    /// Words per record.
    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// First word of the record occupied by the field.
    pub fn word_offset(&self) -> u32 {
        self.word_offset
    }

    /// First bit of the first word occupied by the field.
    pub fn bit_shift(&self) -> u32 {
        self.bit_shift
    }

    /// Width of the field.
    pub fn bits_count(&self) -> u32 {
        self.bits_count
    }
}

impl PartialEq for BitConfig {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
            && self.record_size == other.record_size
            && self.word_offset == other.word_offset
            && self.bit_shift == other.bit_shift
            && self.bits_count == other.bits_count
    }
}

impl Eq for BitConfig {}

/// Field kind that can be bound to a `BitConfig`.
///
/// Implemented by every value conversion strategy (through `ValueCodec`) and
/// by the flag-set and list kinds, which expose their own encoder types.
pub trait FieldCodec: Clone + 'static {
    /// Accessor produced by `bind`
    type Encoder;

    /// Smallest supported width
    const MIN_BITS: u32;

    /// Largest supported width
    const MAX_BITS: u32;

    /// Limit on `bit_shift + bits_count` for a field of the given width.
    fn max_last_bit(bits_count: u32) -> u32;

    /// Schema tag of this kind.
    fn kind(&self) -> CodecKind;

    /// Wrap a validated field into this kind's encoder.
    fn bind(&self, field: BitField) -> Self::Encoder;

    /// Validate the config for this kind and build its encoder.
    fn encoder(&self, config: BitConfig) -> StoreResult<Self::Encoder> {
        Ok(self.bind(BitField::new::<Self>(config)?))
    }
}

/// Field placement validated against one codec's bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitField {
    config: BitConfig,
    mask: u32,
}

impl BitField {
    /// Check the config against the bounds of `C`.
    pub fn new<C: FieldCodec>(config: BitConfig) -> StoreResult<Self> {
        let max_last_bit = C::max_last_bit(config.bits_count());
        Self::checked(config, C::MIN_BITS, C::MAX_BITS, max_last_bit)
    }

    /// Check the config against an untyped bit header: same width, and no
    /// further than the header's max last bit.
    pub fn for_schema(config: BitConfig, schema: &BitSchema) -> StoreResult<Self> {
        let bits_count = schema.bits_count();
        Self::checked(config, bits_count, bits_count, schema.max_last_bit())
    }

    fn checked(
        config: BitConfig,
        min_bits: u32,
        max_bits: u32,
        max_last_bit: u32,
    ) -> StoreResult<Self> {
        let bits_count = config.bits_count();
        if bits_count < min_bits || bits_count > max_bits {
            return Err(StoreError::BitsOutOfBounds {
                bits_count,
                min: min_bits,
                max: max_bits,
            });
        }

        let last_bit = config.bit_shift() + bits_count;
        if last_bit > max_last_bit {
            return Err(StoreError::LastBitExceeded {
                last_bit,
                max_last_bit,
            });
        }

        let mask = if last_bit <= WORD_SIZE {
            (((1u64 << bits_count) - 1) << config.bit_shift()) as u32
        } else {
            0
        };

        Ok(Self { config, mask })
    }

    /// Placement of this field.
    pub fn config(&self) -> &BitConfig {
        &self.config
    }

    /// Width of the field.
    pub fn bits_count(&self) -> u32 {
        self.config.bits_count
    }

    /// Mask of the field inside its word. Zero for fields wider than a word.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Word store index of the field's first word for a record. Fails when
    /// the index does not fit a `u64`.
    pub fn store_index(&self, position: u64) -> StoreResult<u64> {
        position
            .checked_mul(self.config.record_size as u64)
            .and_then(|start| start.checked_add(self.config.word_offset as u64))
            .ok_or_else(|| self.out_of_range(position))
    }

    /// Read a field that lives in a single word.
    pub fn read_bits(&self, position: u64) -> StoreResult<u32> {
        let index = self.store_index(position)?;
        let word = self.config.store.borrow().get_int(index)?;
        Ok((word & self.mask) >> self.config.bit_shift)
    }

    /// Write a field that lives in a single word. Bits of `raw` above the
    /// field width are dropped by the mask.
    pub fn write_bits(&self, position: u64, raw: u32) -> StoreResult<()> {
        let index = self.store_index(position)?;
        self.config
            .store
            .borrow_mut()
            .set_partial_int(index, raw << self.config.bit_shift, self.mask);
        Ok(())
    }

    /// Read a 64-bit field stored in two consecutive words.
    pub fn read_wide(&self, position: u64) -> StoreResult<u64> {
        let index = self.store_index(position)?;
        self.config.store.borrow().get_long(index)
    }

    /// Write a 64-bit field stored in two consecutive words.
    pub fn write_wide(&self, position: u64, raw: u64) -> StoreResult<()> {
        let index = self.store_index(position)?;
        self.config.store.borrow_mut().set_long(index, raw)
    }

    /// Read one flag of a flag set.
    pub fn read_flag(&self, position: u64, bit: u32) -> StoreResult<bool> {
        let (index, mask) = self.flag_address(position, bit)?;
        let word = self.config.store.borrow().get_int(index)?;
        Ok(word & mask != 0)
    }

    /// Write one flag of a flag set.
    pub fn write_flag(&self, position: u64, bit: u32, value: bool) -> StoreResult<()> {
        let (index, mask) = self.flag_address(position, bit)?;
        let raw = if value { u32::MAX } else { 0 };
        self.config.store.borrow_mut().set_partial_int(index, raw, mask);
        Ok(())
    }

    // each flag's word is recomputed, so flag sets may span any number of words
    fn flag_address(&self, position: u64, bit: u32) -> StoreResult<(u64, u32)> {
        if bit >= self.config.bits_count {
            return Err(StoreError::BitPositionOutOfRange {
                bit,
                max: self.config.bits_count - 1,
            });
        }

        let shifted = self.config.bit_shift + bit;
        let index = self
            .store_index(position)?
            .checked_add((shifted >> 5) as u64)
            .ok_or_else(|| self.out_of_range(position))?;
        Ok((index, 1 << (shifted & 0b11111)))
    }

    fn out_of_range(&self, position: u64) -> StoreError {
        StoreError::IndexOutOfRange {
            index: position,
            capacity: self.config.store.borrow().capacity(),
        }
    }
}
