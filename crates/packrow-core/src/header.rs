//! Header model
//!
//! A header names one field of a table schema. Three kinds exist:
//!
//! - **bit** headers occupy a fixed number of bits in the packed word store
//! - **object** headers keep one object per record in their own object store
//! - **pool** headers keep a small index per record in the word store and the
//!   deduplicated value in a named pool
//!
//! `Header` is the untyped schema entry: a structurally comparable value
//! descriptor keyed by name. The typed handles (`BitHeader<C>`,
//! `ObjectHeader<T>`, `PoolHeader<T>`) remember the Rust value type and are
//! what callers use to obtain encoders from a `Table`.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::codec::UnsignedIntCodec;
use crate::config::StoreConfig;
use crate::encoder::{ObjectEncoder, PoolEncoder, ValueEncoder};
use crate::error::{StoreError, StoreResult};
use crate::factory::{
    is_object_store, is_pool_store, shared_object_store, shared_pool_store, AnyStore,
};
use crate::field::{BitConfig, FieldCodec};
use crate::pool::PoolStore;
use crate::store::ObjectStore;
use crate::table::Binding;

/// Name suffix of the index sub-header of a pool header
pub const POOL_INDEX_SUFFIX: &str = "-index";

/// Runtime identity of a Rust value type.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// Identity of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Rust type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Schema kind of a bit header: which conversion strategy reads its bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// One bit
    Bool,
    /// Signed 8-bit integer
    Byte,
    /// Signed 16-bit integer
    Short,
    /// 16-bit code unit
    Char,
    /// Signed 32-bit integer
    Int,
    /// Signed 64-bit integer over two words
    Long,
    /// IEEE-754 single, raw bits
    Float,
    /// IEEE-754 double, raw bits over two words
    Double,
    /// Signed integer biased by `min_value`
    SignedInt {
        /// Value stored as raw zero
        min_value: i32,
    },
    /// Unsigned integer
    UnsignedInt,
    /// Enum stored as its index
    Enum(ValueType),
    /// Independently addressed flags
    BitSet,
    /// Flags addressed by enum values
    EnumBitSet(ValueType),
    /// Next pointer of an embedded circular list
    List,
}

/// Untyped descriptor of a bit header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitSchema {
    name: String,
    bits_count: u32,
    max_last_bit: u32,
    codec: CodecKind,
}

impl BitSchema {
    /// Build a descriptor. `max_last_bit` is the encoder limit on
    /// `bit_shift + bits_count`.
    pub fn new(
        name: impl Into<String>,
        bits_count: u32,
        max_last_bit: u32,
        codec: CodecKind,
    ) -> StoreResult<Self> {
        if bits_count == 0 {
            return Err(StoreError::InvalidBound {
                what: "Bits Count",
                value: 0,
                min: 1,
                max: max_last_bit as i64,
            });
        }
        if max_last_bit < bits_count {
            return Err(StoreError::InvalidBound {
                what: "Max Last Bit",
                value: max_last_bit as i64,
                min: bits_count as i64,
                max: u32::MAX as i64,
            });
        }

        Ok(Self {
            name: name.into(),
            bits_count,
            max_last_bit,
            codec,
        })
    }

    /// Header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the field.
    pub fn bits_count(&self) -> u32 {
        self.bits_count
    }

    /// Limit on `bit_shift + bits_count`.
    pub fn max_last_bit(&self) -> u32 {
        self.max_last_bit
    }

    /// Conversion strategy tag.
    pub fn codec(&self) -> CodecKind {
        self.codec
    }
}

/// Untyped descriptor of an object header.
#[derive(Clone)]
pub struct ObjectSchema {
    name: String,
    value_type: ValueType,
    new_store: fn(&StoreConfig) -> StoreResult<AnyStore>,
    accepts: fn(&AnyStore) -> bool,
}

impl ObjectSchema {
    /// Header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the stored objects.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Allocate an empty object store of the right value type.
    pub fn new_store(&self, config: &StoreConfig) -> StoreResult<AnyStore> {
        (self.new_store)(config)
    }

    /// Whether `store` is an object store of this header's value type.
    pub fn accepts(&self, store: &AnyStore) -> bool {
        (self.accepts)(store)
    }
}

impl PartialEq for ObjectSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value_type == other.value_type
    }
}

impl Eq for ObjectSchema {}

impl Hash for ObjectSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.value_type.hash(state);
    }
}

impl fmt::Debug for ObjectSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSchema")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Named pool and the width of the indexes pointing into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolDefinition {
    name: String,
    pool_bits: u32,
}

impl PoolDefinition {
    /// Define a pool addressed by `pool_bits`-wide indexes.
    pub fn new(name: impl Into<String>, pool_bits: u32) -> StoreResult<Self> {
        if !(UnsignedIntCodec::MIN_BITS..=UnsignedIntCodec::MAX_BITS).contains(&pool_bits) {
            return Err(StoreError::InvalidBound {
                what: "Pool Bits Count",
                value: pool_bits as i64,
                min: UnsignedIntCodec::MIN_BITS as i64,
                max: UnsignedIntCodec::MAX_BITS as i64,
            });
        }

        Ok(Self {
            name: name.into(),
            pool_bits,
        })
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the pool indexes.
    pub fn pool_bits(&self) -> u32 {
        self.pool_bits
    }

    /// Largest slot the indexes can address.
    pub fn max_index(&self) -> u32 {
        ((1u64 << self.pool_bits) - 1) as u32
    }
}

/// Untyped descriptor of a pool header.
#[derive(Clone)]
pub struct PoolSchema {
    name: String,
    pool: PoolDefinition,
    value_type: ValueType,
    index: BitSchema,
    new_store: fn() -> AnyStore,
    accepts: fn(&AnyStore) -> bool,
}

impl PoolSchema {
    /// Header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pool the values go into.
    pub fn pool(&self) -> &PoolDefinition {
        &self.pool
    }

    /// Type of the pooled values.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Synthetic bit header holding the pool index of every record.
    pub fn index_header(&self) -> &BitSchema {
        &self.index
    }

    /// Allocate an empty pool store of the right value type.
    pub fn new_store(&self) -> AnyStore {
        (self.new_store)()
    }

    /// Whether `store` is a pool store of this header's value type.
    pub fn accepts(&self, store: &AnyStore) -> bool {
        (self.accepts)(store)
    }
}

impl PartialEq for PoolSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.pool == other.pool
            && self.value_type == other.value_type
            && self.index == other.index
    }
}

impl Eq for PoolSchema {}

impl Hash for PoolSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.pool.hash(state);
        self.value_type.hash(state);
    }
}

impl fmt::Debug for PoolSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSchema")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Schema entry of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Header {
    /// Fixed-width field in the word store
    Bit(BitSchema),
    /// One object per record
    Object(ObjectSchema),
    /// Pool index per record plus a shared pool of values
    Pool(PoolSchema),
}

impl Header {
    /// Header name, unique within a table.
    pub fn name(&self) -> &str {
        match self {
            Header::Bit(schema) => schema.name(),
            Header::Object(schema) => schema.name(),
            Header::Pool(schema) => schema.name(),
        }
    }
}

/// Typed handle that knows how to turn a table binding into its encoder.
pub trait TypedHeader {
    /// Accessor returned by `Table::encoder_for`
    type Encoder;

    /// Untyped schema entry of this handle.
    fn header(&self) -> Header;

    /// Build the encoder over a table binding, or `None` when the binding
    /// belongs to a different kind of header.
    fn bind(&self, binding: &Binding) -> Option<Self::Encoder>;
}

/// Bit header carrying its conversion strategy.
#[derive(Debug, Clone)]
pub struct BitHeader<C> {
    schema: BitSchema,
    codec: C,
}

impl<C: FieldCodec> BitHeader<C> {
    /// Declare a `bits_count`-wide field read through `codec`.
    pub fn new(name: impl Into<String>, bits_count: u32, codec: C) -> StoreResult<Self> {
        if !(C::MIN_BITS..=C::MAX_BITS).contains(&bits_count) {
            return Err(StoreError::BitsOutOfBounds {
                bits_count,
                min: C::MIN_BITS,
                max: C::MAX_BITS,
            });
        }

        let schema = BitSchema::new(name, bits_count, C::max_last_bit(bits_count), codec.kind())?;
        Ok(Self { schema, codec })
    }

    /// Header of a codec with a single supported width.
    pub(crate) fn exact(name: impl Into<String>, codec: C) -> Self {
        let bits_count = C::MAX_BITS;
        let schema = BitSchema {
            name: name.into(),
            bits_count,
            max_last_bit: C::max_last_bit(bits_count),
            codec: codec.kind(),
        };
        Self { schema, codec }
    }

    /// Untyped descriptor.
    pub fn schema(&self) -> &BitSchema {
        &self.schema
    }

    /// Header name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Width of the field.
    pub fn bits_count(&self) -> u32 {
        self.schema.bits_count()
    }

    /// Conversion strategy.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Build an encoder over an explicit placement, outside of any table.
    pub fn encoder(&self, config: BitConfig) -> StoreResult<C::Encoder> {
        self.codec.encoder(config)
    }
}

impl<C: FieldCodec> TypedHeader for BitHeader<C> {
    type Encoder = C::Encoder;

    fn header(&self) -> Header {
        Header::Bit(self.schema.clone())
    }

    fn bind(&self, binding: &Binding) -> Option<Self::Encoder> {
        match binding {
            Binding::Bit(field) => self.codec.encoder(field.config().clone()).ok(),
            _ => None,
        }
    }
}

/// Header of objects stored one per record.
pub struct ObjectHeader<T> {
    schema: ObjectSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ObjectHeader<T> {
    /// Declare an object field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: ObjectSchema {
                name: name.into(),
                value_type: ValueType::of::<T>(),
                new_store: new_object_store::<T>,
                accepts: is_object_store::<T>,
            },
            _marker: PhantomData,
        }
    }

    /// Untyped descriptor.
    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Header name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }
}

impl<T> Clone for ObjectHeader<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ObjectHeader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.schema.fmt(f)
    }
}

impl<T: 'static> TypedHeader for ObjectHeader<T> {
    type Encoder = ObjectEncoder<T>;

    fn header(&self) -> Header {
        Header::Object(self.schema.clone())
    }

    fn bind(&self, binding: &Binding) -> Option<Self::Encoder> {
        match binding {
            Binding::Object(store) => shared_object_store::<T>(store).map(ObjectEncoder::new),
            _ => None,
        }
    }
}

/// Header of values deduplicated into a named pool.
pub struct PoolHeader<T> {
    schema: PoolSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Eq + Hash + Clone + 'static> PoolHeader<T> {
    /// Declare a pooled field. Its index lives in a synthetic bit header
    /// named `<name>-index`.
    pub fn new(name: impl Into<String>, pool: PoolDefinition) -> StoreResult<Self> {
        let name = name.into();
        let index = BitSchema::new(
            format!("{}{}", name, POOL_INDEX_SUFFIX),
            pool.pool_bits(),
            UnsignedIntCodec::max_last_bit(pool.pool_bits()),
            CodecKind::UnsignedInt,
        )?;

        Ok(Self {
            schema: PoolSchema {
                name,
                pool,
                value_type: ValueType::of::<T>(),
                index,
                new_store: new_pool_store::<T>,
                accepts: is_pool_store::<T>,
            },
            _marker: PhantomData,
        })
    }

    /// Untyped descriptor.
    pub fn schema(&self) -> &PoolSchema {
        &self.schema
    }

    /// Header name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Pool the values go into.
    pub fn pool(&self) -> &PoolDefinition {
        self.schema.pool()
    }

    /// Synthetic bit header of the pool index.
    pub fn index_header(&self) -> &BitSchema {
        self.schema.index_header()
    }
}

impl<T> Clone for PoolHeader<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for PoolHeader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.schema.fmt(f)
    }
}

impl<T: Eq + Hash + Clone + 'static> TypedHeader for PoolHeader<T> {
    type Encoder = PoolEncoder<T>;

    fn header(&self) -> Header {
        Header::Pool(self.schema.clone())
    }

    fn bind(&self, binding: &Binding) -> Option<Self::Encoder> {
        match binding {
            Binding::Pool { store, index } => {
                let store = shared_pool_store::<T>(store)?;
                let index = ValueEncoder::new(index.config().clone(), UnsignedIntCodec).ok()?;
                Some(PoolEncoder::new(self.schema.pool.clone(), store, index))
            }
            _ => None,
        }
    }
}

impl<C: FieldCodec> From<&BitHeader<C>> for Header {
    fn from(header: &BitHeader<C>) -> Self {
        header.header()
    }
}

impl<T: 'static> From<&ObjectHeader<T>> for Header {
    fn from(header: &ObjectHeader<T>) -> Self {
        header.header()
    }
}

impl<T: Eq + Hash + Clone + 'static> From<&PoolHeader<T>> for Header {
    fn from(header: &PoolHeader<T>) -> Self {
        header.header()
    }
}

fn new_object_store<T: 'static>(config: &StoreConfig) -> StoreResult<AnyStore> {
    let store: ObjectStore<T> = ObjectStore::new(config.object_block_size)?;
    Ok(Rc::new(RefCell::new(store)))
}

fn new_pool_store<T: Eq + Hash + Clone + 'static>() -> AnyStore {
    Rc::new(RefCell::new(PoolStore::<T>::new()))
}
