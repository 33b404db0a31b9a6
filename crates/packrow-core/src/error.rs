//! Error types for packrow operations
//!
//! All packrow errors are represented by the StoreError enum. Every variant
//! carries the bound or name that was violated so the caller can report it
//! without re-deriving the check.

use thiserror::Error;

/// Packrow error types with detailed context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Read of a slot whose chunk was never allocated
    #[error("Index {index} is outside of allocated storage ({capacity} slots)")]
    IndexOutOfRange {
        /// Requested slot index
        index: u64,
        /// Number of slots currently allocated
        capacity: u64,
    },

    /// Block size outside of the supported range
    #[error("Block size must be between {min} and {max}, got {requested}")]
    InvalidBlockSize {
        /// Requested minimal block size
        requested: usize,
        /// Smallest supported block size
        min: usize,
        /// Largest supported block size
        max: usize,
    },

    /// Store configuration failed validation
    #[error("Invalid store configuration: {reason}")]
    InvalidConfig {
        /// Which setting is wrong and why
        reason: String,
    },

    /// Bit field geometry does not describe a valid region of the record
    #[error("Invalid bit field geometry: {reason}")]
    InvalidGeometry {
        /// Which part of the geometry is wrong
        reason: String,
    },

    /// Bits count outside of what the encoder supports
    #[error("Bits count {bits_count} outside of defined bounds [{min}, {max}]")]
    BitsOutOfBounds {
        /// Configured bits count
        bits_count: u32,
        /// Minimal supported bits count
        min: u32,
        /// Maximal supported bits count
        max: u32,
    },

    /// Field ends past the last bit the encoder can address
    #[error("Bit shift over a limit: field ends at bit {last_bit}, limit is {max_last_bit}")]
    LastBitExceeded {
        /// First bit after the field, counted from its first word
        last_bit: u32,
        /// Encoder limit
        max_last_bit: u32,
    },

    /// Value cannot be represented by the field
    #[error("Value {value} must be between [{min}, {max}]")]
    ValueOutOfRange {
        /// Rejected value
        value: i64,
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
    },

    /// Stored enum index does not map to any value
    #[error("Stored index {index} does not map to an enum value")]
    UnknownEnumIndex {
        /// Index read from the field
        index: u32,
    },

    /// Flag index outside of a bit set
    #[error("Bit position {bit} must be between [0, {max}]")]
    BitPositionOutOfRange {
        /// Requested flag index
        bit: u32,
        /// Largest valid flag index
        max: u32,
    },

    /// Header catalog bound violated
    #[error("{what} must be between {min} and {max}, got {value}")]
    InvalidBound {
        /// Name of the bounded quantity
        what: &'static str,
        /// Rejected value
        value: i64,
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
    },

    /// Two headers share a name
    #[error("Duplicated header name {name}")]
    DuplicateHeader {
        /// Header name
        name: String,
    },

    /// Two different pool definitions share a name
    #[error("Duplicated pool name {name}")]
    DuplicatePool {
        /// Pool name
        name: String,
    },

    /// Automatic layout found no place for a header
    #[error("Header {name} cannot be fitted into memory layout")]
    UnfitHeader {
        /// Header name
        name: String,
    },

    /// Custom layout places two headers on the same bit
    #[error("Incorrect configuration. Header {name} overlaps bit {bit} of word {word}")]
    OverlappingHeaders {
        /// Header registered second
        name: String,
        /// Word in the record
        word: u32,
        /// Bit in that word
        bit: u32,
    },

    /// Custom layout has no position for a requested header
    #[error("Cannot find Memory Position for header {name}")]
    MissingPosition {
        /// Header name
        name: String,
    },

    /// Layout was built for a different word size
    #[error("This memory layout supports {expected} word size, but {requested} requested")]
    WordSizeMismatch {
        /// Word size of the layout
        expected: u32,
        /// Word size asked for
        requested: u32,
    },

    /// Custom layout position does not fit the header
    #[error("Memory Position for header {name} is incorrect: {reason}")]
    InvalidPosition {
        /// Header name
        name: String,
        /// What the position violates
        reason: String,
    },

    /// Store factory produced no store for a header or pool
    #[error("Missing store for {name}")]
    MissingStore {
        /// Header or pool name
        name: String,
    },

    /// Store factory produced a store of the wrong value type
    #[error("Store for {name} does not hold values of type {expected}")]
    StoreTypeMismatch {
        /// Header or pool name
        name: String,
        /// Value type the header declares
        expected: &'static str,
    },

    /// Pool read at a slot that holds no value
    #[error("Pool index {index} is outside of pool with {len} elements")]
    PoolIndexOutOfRange {
        /// Requested pool slot
        index: u32,
        /// Number of pooled values
        len: usize,
    },

    /// Pool has no slot addressable by its index field
    #[error("Pool {name} is full: slot {index} exceeds index maximum {max}")]
    PoolFull {
        /// Pool name
        name: String,
        /// Slot the value would take
        index: u32,
        /// Largest slot the index field can address
        max: u32,
    },

    /// List iterator removal without a current element
    #[error("List iterator has no current element to remove")]
    NoCurrentElement,

    /// Recorded layout does not match its fingerprint
    #[error("Layout checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch {
        /// Recorded checksum
        expected: u32,
        /// Checksum of the layout being replayed
        actual: u32,
    },
}

/// Result type alias for packrow operations
pub type StoreResult<T> = Result<T, StoreError>;
