//! Value conversion strategies for bit fields
//!
//! A `ValueCodec` turns a Rust value into the raw bits of a field and back.
//! Every value codec is a `FieldCodec` whose encoder is the generic
//! `ValueEncoder<C>`, so one masked bit field type serves all numeric and
//! enum kinds. Flag sets and lists have their own encoders and implement
//! `FieldCodec` directly.
//!
//! | Codec              | Value       | Bits    | Max last bit  |
//! |--------------------|-------------|---------|---------------|
//! | `BoolCodec`        | `bool`      | 1       | 32            |
//! | `ByteCodec`        | `i8`        | 8       | 32            |
//! | `ShortCodec`       | `i16`       | 16      | 32            |
//! | `CharCodec`        | `u16`       | 16      | 32            |
//! | `IntCodec`         | `i32`       | 32      | 32            |
//! | `FloatCodec`       | `f32`       | 32      | 32            |
//! | `LongCodec`        | `i64`       | 64      | 64            |
//! | `DoubleCodec`      | `f64`       | 64      | 64            |
//! | `SignedIntCodec`   | `i32`       | 1..=31  | 32            |
//! | `UnsignedIntCodec` | `u32`       | 1..=31  | 32            |
//! | `EnumCodec<V>`     | `V`         | 1..=31  | 32            |
//! | `BitSetCodec`      | flags       | 1..=1024| bits + 32     |
//! | `EnumBitSetCodec`  | enum flags  | 1..=1024| bits + 32     |
//! | `ListCodec`        | next link   | 1..=31  | 32            |

use std::fmt;

use crate::encoder::{BitSetEncoder, EnumBitSetEncoder, ValueEncoder};
use crate::error::{StoreError, StoreResult};
use crate::field::{BitField, FieldCodec, WORD_SIZE};
use crate::header::{CodecKind, ValueType};
use crate::list::ListEncoder;

/// Largest width of a flag set
pub const MAX_BIT_SET_BITS: u32 = 1024;

/// Value <-> raw bits conversion of one field kind.
pub trait ValueCodec: Clone + 'static {
    /// Rust value read and written through the field
    type Value;

    /// Smallest supported width
    const MIN_BITS: u32;

    /// Largest supported width
    const MAX_BITS: u32;

    /// Limit on `bit_shift + bits_count`
    const MAX_LAST_BIT: u32;

    /// Schema tag of this codec.
    fn schema_kind(&self) -> CodecKind;

    /// Convert a value into the field's raw bits, rejecting values the field
    /// cannot represent.
    fn encode(&self, value: Self::Value, bits_count: u32) -> StoreResult<u64>;

    /// Convert raw field bits back into a value.
    fn decode(&self, raw: u64, bits_count: u32) -> StoreResult<Self::Value>;
}

impl<C: ValueCodec> FieldCodec for C {
    type Encoder = ValueEncoder<C>;

    const MIN_BITS: u32 = <C as ValueCodec>::MIN_BITS;
    const MAX_BITS: u32 = <C as ValueCodec>::MAX_BITS;

    fn max_last_bit(_bits_count: u32) -> u32 {
        <C as ValueCodec>::MAX_LAST_BIT
    }

    fn kind(&self) -> CodecKind {
        self.schema_kind()
    }

    fn bind(&self, field: BitField) -> Self::Encoder {
        ValueEncoder::from_field(field, self.clone())
    }
}

/// Largest raw value of a field narrower than a word.
fn max_raw(bits_count: u32) -> u64 {
    (1u64 << bits_count) - 1
}

macro_rules! fixed_width_codec {
    ($(#[$doc:meta])* $name:ident, $value:ty, $bits:expr, $last:expr, $kind:ident,
     |$enc:ident| $encode:expr, |$raw:ident| $decode:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl ValueCodec for $name {
            type Value = $value;

            const MIN_BITS: u32 = $bits;
            const MAX_BITS: u32 = $bits;
            const MAX_LAST_BIT: u32 = $last;

            fn schema_kind(&self) -> CodecKind {
                CodecKind::$kind
            }

            fn encode(&self, $enc: $value, _bits_count: u32) -> StoreResult<u64> {
                Ok($encode)
            }

            fn decode(&self, $raw: u64, _bits_count: u32) -> StoreResult<$value> {
                Ok($decode)
            }
        }
    };
}

fixed_width_codec!(
    /// Single bit boolean.
    BoolCodec, bool, 1, WORD_SIZE, Bool,
    |value| value as u64,
    |raw| raw != 0
);

fixed_width_codec!(
    /// Signed byte, two's complement bits.
    ByteCodec, i8, 8, WORD_SIZE, Byte,
    |value| value as u8 as u64,
    |raw| raw as u8 as i8
);

fixed_width_codec!(
    /// Signed 16-bit integer.
    ShortCodec, i16, 16, WORD_SIZE, Short,
    |value| value as u16 as u64,
    |raw| raw as u16 as i16
);

fixed_width_codec!(
    /// 16-bit code unit.
    CharCodec, u16, 16, WORD_SIZE, Char,
    |value| value as u64,
    |raw| raw as u16
);

fixed_width_codec!(
    /// Signed 32-bit integer taking a full word.
    IntCodec, i32, 32, WORD_SIZE, Int,
    |value| value as u32 as u64,
    |raw| raw as u32 as i32
);

fixed_width_codec!(
    /// Single precision float stored as its raw IEEE-754 bits.
    FloatCodec, f32, 32, WORD_SIZE, Float,
    |value| value.to_bits() as u64,
    |raw| f32::from_bits(raw as u32)
);

fixed_width_codec!(
    /// Signed 64-bit integer over two words, high word first.
    LongCodec, i64, 64, 2 * WORD_SIZE, Long,
    |value| value as u64,
    |raw| raw as i64
);

fixed_width_codec!(
    /// Double precision float over two words, stored as its raw bits.
    DoubleCodec, f64, 64, 2 * WORD_SIZE, Double,
    |value| value.to_bits(),
    |raw| f64::from_bits(raw)
);

/// Signed integer stored as its distance from `min_value`.
///
/// A field of N bits accepts `[min_value, min_value + 2^N - 1]`, with the
/// upper bound clamped to `i32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignedIntCodec {
    min_value: i32,
}

impl SignedIntCodec {
    /// Codec storing `min_value` as raw zero.
    pub fn new(min_value: i32) -> Self {
        Self { min_value }
    }

    /// Value stored as raw zero.
    pub fn min_value(&self) -> i32 {
        self.min_value
    }

    /// Largest value a field of the given width accepts.
    pub fn max_value(&self, bits_count: u32) -> i32 {
        let max = max_raw(bits_count) as i64 + self.min_value as i64;
        max.min(i32::MAX as i64) as i32
    }
}

impl ValueCodec for SignedIntCodec {
    type Value = i32;

    const MIN_BITS: u32 = 1;
    const MAX_BITS: u32 = 31;
    const MAX_LAST_BIT: u32 = WORD_SIZE;

    fn schema_kind(&self) -> CodecKind {
        CodecKind::SignedInt {
            min_value: self.min_value,
        }
    }

    fn encode(&self, value: i32, bits_count: u32) -> StoreResult<u64> {
        let max = self.max_value(bits_count);
        if value < self.min_value || value > max {
            return Err(StoreError::ValueOutOfRange {
                value: value as i64,
                min: self.min_value as i64,
                max: max as i64,
            });
        }
        Ok((value as i64 - self.min_value as i64) as u64)
    }

    fn decode(&self, raw: u64, _bits_count: u32) -> StoreResult<i32> {
        Ok((raw as i64 + self.min_value as i64) as i32)
    }
}

/// Unsigned integer in `[0, 2^N - 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UnsignedIntCodec;

impl ValueCodec for UnsignedIntCodec {
    type Value = u32;

    const MIN_BITS: u32 = 1;
    const MAX_BITS: u32 = 31;
    const MAX_LAST_BIT: u32 = WORD_SIZE;

    fn schema_kind(&self) -> CodecKind {
        CodecKind::UnsignedInt
    }

    fn encode(&self, value: u32, bits_count: u32) -> StoreResult<u64> {
        let max = max_raw(bits_count);
        if value as u64 > max {
            return Err(StoreError::ValueOutOfRange {
                value: value as i64,
                min: 0,
                max: max as i64,
            });
        }
        Ok(value as u64)
    }

    fn decode(&self, raw: u64, _bits_count: u32) -> StoreResult<u32> {
        Ok(raw as u32)
    }
}

/// Enum with a fixed, dense set of ordinals. Implemented by hand for enums
/// stored in bit fields.
///
/// ```
/// use packrow_core::Enumerated;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Color { Red, Green, Blue }
///
/// impl Enumerated for Color {
///     const COUNT: u32 = 3;
///
///     fn ordinal(&self) -> u32 {
///         *self as u32
///     }
///
///     fn from_ordinal(ordinal: u32) -> Option<Self> {
///         match ordinal {
///             0 => Some(Color::Red),
///             1 => Some(Color::Green),
///             2 => Some(Color::Blue),
///             _ => None,
///         }
///     }
/// }
///
/// assert_eq!(Color::from_ordinal(Color::Blue.ordinal()), Some(Color::Blue));
/// ```
pub trait Enumerated: Sized + 'static {
    /// Number of variants
    const COUNT: u32;

    /// Zero-based index of this variant.
    fn ordinal(&self) -> u32;

    /// Variant with the given index.
    fn from_ordinal(ordinal: u32) -> Option<Self>;
}

/// Enum-like value stored as an index computed by a pair of functions.
pub struct EnumCodec<V> {
    to_index: fn(&V) -> u32,
    from_index: fn(u32) -> Option<V>,
}

impl<V: 'static> EnumCodec<V> {
    /// Codec with a custom index mapping, for example one that reserves
    /// indexes for variants added later.
    pub fn new(to_index: fn(&V) -> u32, from_index: fn(u32) -> Option<V>) -> Self {
        Self {
            to_index,
            from_index,
        }
    }

    /// Index of a value.
    pub fn index_of(&self, value: &V) -> u32 {
        (self.to_index)(value)
    }

    /// Value of an index, if any.
    pub fn value_of(&self, index: u32) -> Option<V> {
        (self.from_index)(index)
    }
}

impl<E: Enumerated> EnumCodec<E> {
    /// Index is the variant ordinal.
    pub fn ordinal() -> Self {
        Self::new(ordinal_index::<E>, E::from_ordinal)
    }
}

impl<E: Enumerated> EnumCodec<Option<E>> {
    /// Index 0 holds `None`, every variant is stored as its ordinal plus one.
    pub fn nullable() -> Self {
        Self::new(nullable_index::<E>, nullable_value::<E>)
    }
}

fn ordinal_index<E: Enumerated>(value: &E) -> u32 {
    value.ordinal()
}

fn nullable_index<E: Enumerated>(value: &Option<E>) -> u32 {
    value.as_ref().map_or(0, |v| v.ordinal() + 1)
}

fn nullable_value<E: Enumerated>(index: u32) -> Option<Option<E>> {
    match index {
        0 => Some(None),
        i => E::from_ordinal(i - 1).map(Some),
    }
}

impl<V> Clone for EnumCodec<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for EnumCodec<V> {}

impl<V> fmt::Debug for EnumCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumCodec")
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}

impl<V: 'static> ValueCodec for EnumCodec<V> {
    type Value = V;

    const MIN_BITS: u32 = 1;
    const MAX_BITS: u32 = 31;
    const MAX_LAST_BIT: u32 = WORD_SIZE;

    fn schema_kind(&self) -> CodecKind {
        CodecKind::Enum(ValueType::of::<V>())
    }

    fn encode(&self, value: V, bits_count: u32) -> StoreResult<u64> {
        let index = self.index_of(&value) as u64;
        let max = max_raw(bits_count);
        if index > max {
            return Err(StoreError::ValueOutOfRange {
                value: index as i64,
                min: 0,
                max: max as i64,
            });
        }
        Ok(index)
    }

    fn decode(&self, raw: u64, _bits_count: u32) -> StoreResult<V> {
        let index = raw as u32;
        self.value_of(index)
            .ok_or(StoreError::UnknownEnumIndex { index })
    }
}

/// Independently addressed flags. The only kind that may span any number
/// of words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BitSetCodec;

impl FieldCodec for BitSetCodec {
    type Encoder = BitSetEncoder;

    const MIN_BITS: u32 = 1;
    const MAX_BITS: u32 = MAX_BIT_SET_BITS;

    fn max_last_bit(bits_count: u32) -> u32 {
        bits_count + WORD_SIZE
    }

    fn kind(&self) -> CodecKind {
        CodecKind::BitSet
    }

    fn bind(&self, field: BitField) -> BitSetEncoder {
        BitSetEncoder::new(field)
    }
}

/// Flags addressed by enum values instead of bit positions.
pub struct EnumBitSetCodec<E> {
    to_index: fn(&E) -> u32,
}

impl<E: 'static> EnumBitSetCodec<E> {
    /// Codec with a custom flag index mapping.
    pub fn new(to_index: fn(&E) -> u32) -> Self {
        Self { to_index }
    }
}

impl<E: Enumerated> EnumBitSetCodec<E> {
    /// One flag per variant, addressed by ordinal.
    pub fn ordinal() -> Self {
        Self::new(ordinal_index::<E>)
    }
}

impl<E> Clone for EnumBitSetCodec<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EnumBitSetCodec<E> {}

impl<E> fmt::Debug for EnumBitSetCodec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumBitSetCodec")
            .field("value", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E: 'static> FieldCodec for EnumBitSetCodec<E> {
    type Encoder = EnumBitSetEncoder<E>;

    const MIN_BITS: u32 = 1;
    const MAX_BITS: u32 = MAX_BIT_SET_BITS;

    fn max_last_bit(bits_count: u32) -> u32 {
        bits_count + WORD_SIZE
    }

    fn kind(&self) -> CodecKind {
        CodecKind::EnumBitSet(ValueType::of::<E>())
    }

    fn bind(&self, field: BitField) -> EnumBitSetEncoder<E> {
        EnumBitSetEncoder::new(field, self.to_index)
    }
}

/// "Next" pointer of an embedded circular list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListCodec;

impl FieldCodec for ListCodec {
    type Encoder = ListEncoder;

    const MIN_BITS: u32 = 1;
    const MAX_BITS: u32 = 31;

    fn max_last_bit(_bits_count: u32) -> u32 {
        WORD_SIZE
    }

    fn kind(&self) -> CodecKind {
        CodecKind::List
    }

    fn bind(&self, field: BitField) -> ListEncoder {
        ListEncoder::new(field)
    }
}
