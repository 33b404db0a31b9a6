//! Packrow Core - Bit-Packed In-Memory Record Tables
//!
//! Stores large tables of fixed-width records struct-of-arrays style: every
//! bit field of a schema is packed into a dense run of 32-bit words per
//! record, with the field layout computed from the schema instead of written
//! by hand. Objects and deduplicated (pooled) objects are kept in side stores
//! addressed by the same record position.
//!
//! # Architecture
//!
//! - **Block stores**: growable chunked arrays of words or objects
//! - **Encoders**: masked accessors bound to a store and a bit placement
//! - **Layout builders**: automatic packing or validated manual placement
//! - **Table**: headers in, layout computed, stores allocated, encoders bound
//!
//! # Single Threaded
//!
//! Stores are shared through `Rc<RefCell<_>>` and every write is a plain
//! read-modify-write of one or two words. Tables are neither `Send` nor
//! `Sync`; callers that need concurrency wrap a table themselves.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod encoder;
pub mod error;
pub mod factory;
pub mod field;
pub mod header;
pub mod layout;
pub mod list;
pub mod pool;
pub mod store;
pub mod table;

// Re-export key types for convenience
pub use codec::{
    BitSetCodec, BoolCodec, ByteCodec, CharCodec, DoubleCodec, EnumBitSetCodec, EnumCodec,
    Enumerated, FloatCodec, IntCodec, ListCodec, LongCodec, ShortCodec, SignedIntCodec,
    UnsignedIntCodec, ValueCodec,
};
pub use config::StoreConfig;
pub use encoder::{BitSetEncoder, EnumBitSetEncoder, ObjectEncoder, PoolEncoder, ValueEncoder};
pub use error::{StoreError, StoreResult};
pub use factory::{AnyStore, DefaultStoreFactory, PreloadedStoreFactory, StoreFactory};
pub use field::{BitConfig, BitField, FieldCodec, SharedWordStore, WORD_SIZE};
pub use header::{
    BitHeader, BitSchema, CodecKind, Header, ObjectHeader, ObjectSchema, PoolDefinition,
    PoolHeader, PoolSchema, TypedHeader, ValueType,
};
pub use layout::{
    AutomaticLayoutBuilder, CustomLayoutBuilder, MemoryLayout, MemoryLayoutBuilder,
    MemoryPosition, OverlapPolicy, RecordedLayoutBuilder,
};
pub use list::{ListEncoder, ListIter};
pub use pool::PoolStore;
pub use store::{BlockStore, ObjectStore, WordStore};
pub use table::{Binding, Table};
