//! Encoders: positional accessors bound to a store
//!
//! Bit field encoders wrap a validated `BitField` and read or write one
//! record position at a time. Object and pool encoders wrap the shared
//! object or pool store of their header. Encoders are cheap to clone and
//! hold no per-position state.

use std::cell::Ref;
use std::hash::Hash;

use crate::codec::{BoolCodec, UnsignedIntCodec, ValueCodec};
use crate::error::{StoreError, StoreResult};
use crate::factory::{SharedObjectStore, SharedPoolStore};
use crate::field::{BitConfig, BitField, FieldCodec, WORD_SIZE};
use crate::header::PoolDefinition;
use crate::pool::PoolStore;

/// Bit field read and written through a value codec.
#[derive(Debug, Clone)]
pub struct ValueEncoder<C> {
    field: BitField,
    codec: C,
}

impl<C: ValueCodec> ValueEncoder<C> {
    /// Validate `config` against the codec bounds and bind it.
    pub fn new(config: BitConfig, codec: C) -> StoreResult<Self> {
        codec.encoder(config)
    }

    pub(crate) fn from_field(field: BitField, codec: C) -> Self {
        Self { field, codec }
    }

    /// Value stored at a position.
    pub fn get(&self, position: u64) -> StoreResult<C::Value> {
        let bits_count = self.field.bits_count();
        let raw = if bits_count > WORD_SIZE {
            self.field.read_wide(position)?
        } else {
            self.field.read_bits(position)? as u64
        };
        self.codec.decode(raw, bits_count)
    }

    /// Store a value at a position. Out of range values leave the field
    /// untouched.
    pub fn set(&self, position: u64, value: C::Value) -> StoreResult<()> {
        let bits_count = self.field.bits_count();
        let raw = self.codec.encode(value, bits_count)?;
        if bits_count > WORD_SIZE {
            self.field.write_wide(position, raw)
        } else {
            self.field.write_bits(position, raw as u32)
        }
    }

    /// Underlying field.
    pub fn field(&self) -> &BitField {
        &self.field
    }

    /// Conversion strategy.
    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl ValueEncoder<BoolCodec> {
    /// Set the flag.
    pub fn set_true(&self, position: u64) -> StoreResult<()> {
        self.set(position, true)
    }

    /// Clear the flag.
    pub fn clear(&self, position: u64) -> StoreResult<()> {
        self.set(position, false)
    }
}

/// Flag set addressed by bit position.
#[derive(Debug, Clone)]
pub struct BitSetEncoder {
    field: BitField,
}

impl BitSetEncoder {
    pub(crate) fn new(field: BitField) -> Self {
        Self { field }
    }

    /// State of one flag.
    pub fn get(&self, position: u64, bit: u32) -> StoreResult<bool> {
        self.field.read_flag(position, bit)
    }

    /// Set or clear one flag.
    pub fn set(&self, position: u64, bit: u32, value: bool) -> StoreResult<()> {
        self.field.write_flag(position, bit, value)
    }

    /// Set one flag.
    pub fn set_true(&self, position: u64, bit: u32) -> StoreResult<()> {
        self.set(position, bit, true)
    }

    /// Clear one flag.
    pub fn clear(&self, position: u64, bit: u32) -> StoreResult<()> {
        self.set(position, bit, false)
    }

    /// Number of flags per record.
    pub fn len(&self) -> u32 {
        self.field.bits_count()
    }

    /// Always false, flag sets have at least one flag.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Flag set addressed by enum value.
pub struct EnumBitSetEncoder<E> {
    field: BitField,
    to_index: fn(&E) -> u32,
}

impl<E> EnumBitSetEncoder<E> {
    pub(crate) fn new(field: BitField, to_index: fn(&E) -> u32) -> Self {
        Self { field, to_index }
    }

    /// Whether the flag of `value` is set.
    pub fn get(&self, position: u64, value: &E) -> StoreResult<bool> {
        self.field.read_flag(position, (self.to_index)(value))
    }

    /// Set or clear the flag of `value`.
    pub fn set(&self, position: u64, value: &E, flag: bool) -> StoreResult<()> {
        self.field.write_flag(position, (self.to_index)(value), flag)
    }

    /// Set the flag of `value`.
    pub fn set_true(&self, position: u64, value: &E) -> StoreResult<()> {
        self.set(position, value, true)
    }

    /// Clear the flag of `value`.
    pub fn clear(&self, position: u64, value: &E) -> StoreResult<()> {
        self.set(position, value, false)
    }
}

impl<E> Clone for EnumBitSetEncoder<E> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            to_index: self.to_index,
        }
    }
}

impl<E> std::fmt::Debug for EnumBitSetEncoder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumBitSetEncoder")
            .field("field", &self.field)
            .finish()
    }
}

/// One object per record, stored in the header's object store.
pub struct ObjectEncoder<T> {
    store: SharedObjectStore<T>,
}

impl<T: 'static> ObjectEncoder<T> {
    pub(crate) fn new(store: SharedObjectStore<T>) -> Self {
        Self { store }
    }

    /// Run `f` over the object at a position without cloning it.
    pub fn with<R>(&self, position: u64, f: impl FnOnce(Option<&T>) -> R) -> StoreResult<R> {
        let store = self.store.borrow();
        let slot = store.get(position)?;
        Ok(f(slot.as_ref()))
    }

    /// Store an object at a position.
    pub fn set(&self, position: u64, value: T) {
        self.store.borrow_mut().set(position, Some(value));
    }

    /// Drop the object at a position.
    pub fn clear(&self, position: u64) {
        self.store.borrow_mut().set(position, None);
    }

    /// Shared store behind this encoder.
    pub fn store(&self) -> &SharedObjectStore<T> {
        &self.store
    }
}

impl<T: Clone + 'static> ObjectEncoder<T> {
    /// Copy of the object at a position, `None` when nothing was stored.
    pub fn get(&self, position: u64) -> StoreResult<Option<T>> {
        self.with(position, |value| value.cloned())
    }
}

impl<T> Clone for ObjectEncoder<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ObjectEncoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectEncoder")
            .field("store", &self.store)
            .finish()
    }
}

/// Pooled value per record: the pool slot lives in a bit field, the value in
/// the shared pool store.
pub struct PoolEncoder<T> {
    pool: PoolDefinition,
    store: SharedPoolStore<T>,
    index: ValueEncoder<UnsignedIntCodec>,
}

impl<T: Eq + Hash + Clone + 'static> PoolEncoder<T> {
    pub(crate) fn new(
        pool: PoolDefinition,
        store: SharedPoolStore<T>,
        index: ValueEncoder<UnsignedIntCodec>,
    ) -> Self {
        Self { pool, store, index }
    }

    /// Pool the value and store its slot at a position. A value that would
    /// need a slot the index field cannot address is rejected before it is
    /// pooled.
    pub fn set(&self, position: u64, value: T) -> StoreResult<()> {
        let slot = {
            let mut store = self.store.borrow_mut();
            match store.position_of(&value) {
                Some(slot) => slot,
                None => {
                    let next = store.len() as u64;
                    if next > self.pool.max_index() as u64 {
                        return Err(StoreError::PoolFull {
                            name: self.pool.name().to_string(),
                            index: next as u32,
                            max: self.pool.max_index(),
                        });
                    }
                    store.set(value)
                }
            }
        };
        self.index.set(position, slot)
    }

    /// Copy of the pooled value referenced at a position.
    pub fn get(&self, position: u64) -> StoreResult<T> {
        let slot = self.index.get(position)?;
        self.store.borrow().get(slot).cloned()
    }

    /// Pool slot stored at a position.
    pub fn slot(&self, position: u64) -> StoreResult<u32> {
        self.index.get(position)
    }

    /// Definition of the pool.
    pub fn pool(&self) -> &PoolDefinition {
        &self.pool
    }

    /// Read access to the pooled values.
    pub fn values(&self) -> Ref<'_, PoolStore<T>> {
        self.store.borrow()
    }
}

impl<T> Clone for PoolEncoder<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            store: self.store.clone(),
            index: self.index.clone(),
        }
    }
}

impl<T> std::fmt::Debug for PoolEncoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolEncoder")
            .field("pool", &self.pool)
            .field("index", &self.index)
            .finish()
    }
}
