//! Header construction catalog
//!
//! Shorthand constructors for every header kind. Each one checks its own
//! bound (bits count, number of values, pool size) and names that bound in
//! the returned error, before the header itself is built.
//!
//! ```
//! use packrow_core::catalog;
//!
//! let id = catalog::int32("id");
//! let age = catalog::int_range("age", 0, 150).unwrap();
//! assert_eq!(age.bits_count(), 8);
//! assert_eq!(id.bits_count(), 32);
//! ```

use std::hash::Hash;

use crate::codec::{
    BitSetCodec, BoolCodec, ByteCodec, CharCodec, DoubleCodec, EnumBitSetCodec, EnumCodec,
    Enumerated, FloatCodec, IntCodec, ListCodec, LongCodec, ShortCodec, SignedIntCodec,
    UnsignedIntCodec, MAX_BIT_SET_BITS,
};
use crate::error::{StoreError, StoreResult};
use crate::header::{BitHeader, ObjectHeader, PoolDefinition, PoolHeader};

/// Smallest width of the variable-width integer kinds
const MIN_BITS: u32 = 1;

/// Largest width of the variable-width integer kinds
const MAX_BITS: u32 = 31;

/// Number of bits needed to store `number_of_values` distinct values.
///
/// `number_of_values` must be at least 2.
pub fn count_bits(number_of_values: u64) -> u32 {
    64 - (number_of_values - 1).leading_zeros()
}

fn check_bits(bits_count: u32, min: u32, max: u32) -> StoreResult<()> {
    if bits_count < min || bits_count > max {
        return Err(StoreError::InvalidBound {
            what: "Bits Count",
            value: bits_count as i64,
            min: min as i64,
            max: max as i64,
        });
    }
    Ok(())
}

fn check_number_of_values(number_of_values: u64) -> StoreResult<()> {
    let min = 1u64 << MIN_BITS;
    let max = 1u64 << MAX_BITS;
    if number_of_values < min || number_of_values > max {
        return Err(StoreError::InvalidBound {
            what: "Number of possible values",
            value: number_of_values.min(i64::MAX as u64) as i64,
            min: min as i64,
            max: max as i64,
        });
    }
    Ok(())
}

/// One bit boolean.
pub fn bool(name: impl Into<String>) -> BitHeader<BoolCodec> {
    BitHeader::exact(name, BoolCodec)
}

/// Signed byte.
pub fn byte8(name: impl Into<String>) -> BitHeader<ByteCodec> {
    BitHeader::exact(name, ByteCodec)
}

/// Signed 16-bit integer.
pub fn short16(name: impl Into<String>) -> BitHeader<ShortCodec> {
    BitHeader::exact(name, ShortCodec)
}

/// 16-bit code unit.
pub fn char16(name: impl Into<String>) -> BitHeader<CharCodec> {
    BitHeader::exact(name, CharCodec)
}

/// Signed 32-bit integer.
pub fn int32(name: impl Into<String>) -> BitHeader<IntCodec> {
    BitHeader::exact(name, IntCodec)
}

/// Signed 64-bit integer, two words.
pub fn long64(name: impl Into<String>) -> BitHeader<LongCodec> {
    BitHeader::exact(name, LongCodec)
}

/// Single precision float.
pub fn float32(name: impl Into<String>) -> BitHeader<FloatCodec> {
    BitHeader::exact(name, FloatCodec)
}

/// Double precision float, two words.
pub fn double64(name: impl Into<String>) -> BitHeader<DoubleCodec> {
    BitHeader::exact(name, DoubleCodec)
}

/// Signed integer on `bits_count` bits, starting at `min_value`.
pub fn int_on_bits(
    name: impl Into<String>,
    min_value: i32,
    bits_count: u32,
) -> StoreResult<BitHeader<SignedIntCodec>> {
    check_bits(bits_count, MIN_BITS, MAX_BITS)?;
    BitHeader::new(name, bits_count, SignedIntCodec::new(min_value))
}

/// Signed integer accepting every value of `[min_value, max_value]`.
pub fn int_range(
    name: impl Into<String>,
    min_value: i32,
    max_value: i32,
) -> StoreResult<BitHeader<SignedIntCodec>> {
    let range = max_value as i64 - min_value as i64 + 1;
    check_number_of_values(range.max(0) as u64)?;
    BitHeader::new(name, count_bits(range as u64), SignedIntCodec::new(min_value))
}

/// Unsigned integer on `bits_count` bits.
pub fn unsigned_int_on_bits(
    name: impl Into<String>,
    bits_count: u32,
) -> StoreResult<BitHeader<UnsignedIntCodec>> {
    check_bits(bits_count, MIN_BITS, MAX_BITS)?;
    BitHeader::new(name, bits_count, UnsignedIntCodec)
}

/// Unsigned integer accepting every value of `[0, max_value]`.
pub fn unsigned_int_max_value(
    name: impl Into<String>,
    max_value: u32,
) -> StoreResult<BitHeader<UnsignedIntCodec>> {
    let min = (1u32 << MIN_BITS) - 1;
    let max = (1u32 << MAX_BITS) - 1;
    if max_value < min || max_value > max {
        return Err(StoreError::InvalidBound {
            what: "Max Value",
            value: max_value as i64,
            min: min as i64,
            max: max as i64,
        });
    }
    BitHeader::new(name, count_bits(max_value as u64 + 1), UnsignedIntCodec)
}

/// Enum stored as its ordinal, sized for all its variants.
pub fn enum_type<E: Enumerated>(name: impl Into<String>) -> StoreResult<BitHeader<EnumCodec<E>>> {
    enum_type_max_size(name, E::COUNT as u64, EnumCodec::ordinal())
}

/// Optional enum: `None` is index 0, variants follow.
pub fn nullable_enum_type<E: Enumerated>(
    name: impl Into<String>,
) -> StoreResult<BitHeader<EnumCodec<Option<E>>>> {
    enum_type_max_size(name, E::COUNT as u64 + 1, EnumCodec::nullable())
}

/// Enum with a custom mapping, sized for `enum_size` distinct indexes.
/// A size above the current variant count reserves room for later variants.
pub fn enum_type_max_size<V: 'static>(
    name: impl Into<String>,
    enum_size: u64,
    codec: EnumCodec<V>,
) -> StoreResult<BitHeader<EnumCodec<V>>> {
    check_number_of_values(enum_size)?;
    BitHeader::new(name, count_bits(enum_size), codec)
}

/// Enum with a custom mapping on an explicit width.
pub fn enum_type_on_bits<V: 'static>(
    name: impl Into<String>,
    bits_count: u32,
    codec: EnumCodec<V>,
) -> StoreResult<BitHeader<EnumCodec<V>>> {
    check_bits(bits_count, MIN_BITS, MAX_BITS)?;
    BitHeader::new(name, bits_count, codec)
}

/// `bits_count` independent flags.
pub fn bit_set(name: impl Into<String>, bits_count: u32) -> StoreResult<BitHeader<BitSetCodec>> {
    check_bits(bits_count, 1, MAX_BIT_SET_BITS)?;
    BitHeader::new(name, bits_count, BitSetCodec)
}

/// One flag per variant of `E`.
pub fn enum_bit_set<E: Enumerated>(
    name: impl Into<String>,
) -> StoreResult<BitHeader<EnumBitSetCodec<E>>> {
    check_bits(E::COUNT, 1, MAX_BIT_SET_BITS)?;
    BitHeader::new(name, E::COUNT, EnumBitSetCodec::ordinal())
}

/// List link addressing positions of `bits_count` bits.
pub fn list_on_bits(name: impl Into<String>, bits_count: u32) -> StoreResult<BitHeader<ListCodec>> {
    check_bits(bits_count, MIN_BITS, MAX_BITS)?;
    BitHeader::new(name, bits_count, ListCodec)
}

/// List link able to address `positions` distinct positions.
pub fn list_of_size(name: impl Into<String>, positions: u64) -> StoreResult<BitHeader<ListCodec>> {
    check_number_of_values(positions)?;
    BitHeader::new(name, count_bits(positions), ListCodec)
}

/// One object per record.
pub fn object<T: 'static>(name: impl Into<String>) -> ObjectHeader<T> {
    ObjectHeader::new(name)
}

/// Pool addressed by `pool_bits`-wide indexes.
pub fn pool_on_bits(name: impl Into<String>, pool_bits: u32) -> StoreResult<PoolDefinition> {
    check_bits(pool_bits, MIN_BITS, MAX_BITS)?;
    PoolDefinition::new(name, pool_bits)
}

/// Pool holding up to `size` distinct values.
pub fn pool_of_size(name: impl Into<String>, size: u64) -> StoreResult<PoolDefinition> {
    check_number_of_values(size)?;
    PoolDefinition::new(name, count_bits(size))
}

/// Values deduplicated into `pool`.
pub fn object_pool<T: Eq + Hash + Clone + 'static>(
    name: impl Into<String>,
    pool: PoolDefinition,
) -> StoreResult<PoolHeader<T>> {
    PoolHeader::new(name, pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::CodecKind;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Suit {
        Clubs,
        Diamonds,
        Hearts,
        Spades,
    }

    impl Enumerated for Suit {
        const COUNT: u32 = 4;

        fn ordinal(&self) -> u32 {
            *self as u32
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades]
                .get(ordinal as usize)
                .copied()
        }
    }

    #[test]
    fn test_count_bits() {
        assert_eq!(count_bits(2), 1);
        assert_eq!(count_bits(3), 2);
        assert_eq!(count_bits(4), 2);
        assert_eq!(count_bits(5), 3);
        assert_eq!(count_bits(1 << 31), 31);
    }

    #[test]
    fn test_fixed_widths() {
        assert_eq!(bool("a").bits_count(), 1);
        assert_eq!(byte8("a").bits_count(), 8);
        assert_eq!(short16("a").bits_count(), 16);
        assert_eq!(char16("a").bits_count(), 16);
        assert_eq!(int32("a").bits_count(), 32);
        assert_eq!(float32("a").bits_count(), 32);
        assert_eq!(long64("a").schema().max_last_bit(), 64);
        assert_eq!(double64("a").schema().codec(), CodecKind::Double);
    }

    #[test]
    fn test_int_range() {
        let header = int_range("a", -10, 5).unwrap();
        assert_eq!(header.bits_count(), 4);
        assert_eq!(header.codec().min_value(), -10);

        assert_eq!(int_range("a", i32::MIN, -1).unwrap().bits_count(), 31);
        assert!(int_range("a", 3, 3).is_err());
        assert!(int_range("a", 5, 3).is_err());
        assert_eq!(
            int_range("a", i32::MIN, 0).unwrap_err(),
            StoreError::InvalidBound {
                what: "Number of possible values",
                value: (1i64 << 31) + 1,
                min: 2,
                max: 1 << 31,
            }
        );
    }

    #[test]
    fn test_bits_count_bounds() {
        assert!(int_on_bits("a", 0, 31).is_ok());
        assert_eq!(
            int_on_bits("a", 0, 32).unwrap_err(),
            StoreError::InvalidBound { what: "Bits Count", value: 32, min: 1, max: 31 }
        );
        assert!(unsigned_int_on_bits("a", 0).is_err());
        assert!(list_on_bits("a", 31).is_ok());
        assert!(bit_set("a", 1024).is_ok());
        assert!(bit_set("a", 1025).is_err());
    }

    #[test]
    fn test_unsigned_max_value() {
        assert_eq!(unsigned_int_max_value("a", 1).unwrap().bits_count(), 1);
        assert_eq!(unsigned_int_max_value("a", 255).unwrap().bits_count(), 8);
        assert_eq!(unsigned_int_max_value("a", 256).unwrap().bits_count(), 9);
        assert!(unsigned_int_max_value("a", 0).is_err());
        assert!(unsigned_int_max_value("a", 1 << 31).is_err());
    }

    #[test]
    fn test_enum_headers() {
        assert_eq!(enum_type::<Suit>("suit").unwrap().bits_count(), 2);
        assert_eq!(nullable_enum_type::<Suit>("suit").unwrap().bits_count(), 3);
        assert_eq!(
            enum_type_max_size("suit", 100, EnumCodec::<Suit>::ordinal()).unwrap().bits_count(),
            7
        );
        assert!(enum_type_max_size("suit", 1, EnumCodec::<Suit>::ordinal()).is_err());
        assert_eq!(enum_bit_set::<Suit>("suits").unwrap().bits_count(), 4);
    }

    #[test]
    fn test_pools() {
        assert_eq!(pool_of_size("p", 256).unwrap().pool_bits(), 8);
        assert_eq!(pool_of_size("p", 257).unwrap().pool_bits(), 9);
        assert!(pool_of_size("p", 1).is_err());
        assert!(pool_on_bits("p", 0).is_err());

        let pool = pool_on_bits("p", 4).unwrap();
        let header: PoolHeader<String> = object_pool("name", pool).unwrap();
        assert_eq!(header.index_header().bits_count(), 4);
    }

    #[test]
    fn test_list_of_size() {
        assert_eq!(list_of_size("next", 1000).unwrap().bits_count(), 10);
        assert!(list_of_size("next", 0).is_err());
    }
}
