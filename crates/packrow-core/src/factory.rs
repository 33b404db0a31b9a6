//! Store factories
//!
//! A table asks its factory for one word store, one object store per object
//! header and one pool store per pool. The default factory hands out empty
//! stores; a preloaded factory hands out stores restored from elsewhere, so
//! a table can be rebuilt around existing data.
//!
//! Object and pool stores are type-erased as `AnyStore` (an
//! `Rc<dyn Any>` over a `RefCell` of the concrete store) and recovered with
//! `shared_object_store` / `shared_pool_store`.

use std::any::Any;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::header::{ObjectSchema, PoolSchema};
use crate::pool::PoolStore;
use crate::store::{ObjectStore, WordStore};

/// Type-erased shared object or pool store
pub type AnyStore = Rc<dyn Any>;

/// Object store shared between a table and its encoders
pub type SharedObjectStore<T> = Rc<RefCell<ObjectStore<T>>>;

/// Pool store shared between a table and its encoders
pub type SharedPoolStore<T> = Rc<RefCell<PoolStore<T>>>;

/// Recover a typed object store.
pub fn shared_object_store<T: 'static>(store: &AnyStore) -> Option<SharedObjectStore<T>> {
    store.clone().downcast::<RefCell<ObjectStore<T>>>().ok()
}

/// Recover a typed pool store.
pub fn shared_pool_store<T: 'static>(store: &AnyStore) -> Option<SharedPoolStore<T>> {
    store.clone().downcast::<RefCell<PoolStore<T>>>().ok()
}

/// Whether `store` is an object store of `T`.
pub fn is_object_store<T: 'static>(store: &AnyStore) -> bool {
    store.is::<RefCell<ObjectStore<T>>>()
}

/// Whether `store` is a pool store of `T`.
pub fn is_pool_store<T: 'static>(store: &AnyStore) -> bool {
    store.is::<RefCell<PoolStore<T>>>()
}

/// Erase a typed object store.
pub fn erase_object_store<T: 'static>(store: ObjectStore<T>) -> AnyStore {
    Rc::new(RefCell::new(store))
}

/// Erase a typed pool store.
pub fn erase_pool_store<T: Eq + Hash + Clone + 'static>(store: PoolStore<T>) -> AnyStore {
    Rc::new(RefCell::new(store))
}

/// Source of the stores backing a table.
pub trait StoreFactory {
    /// Word store holding every bit header.
    fn build_word_store(&mut self) -> StoreResult<WordStore>;

    /// Object store of one object header. `None` means the factory has no
    /// store for it.
    fn build_object_store(&mut self, header: &ObjectSchema) -> StoreResult<Option<AnyStore>>;

    /// Pool store of the pool a pool header names. Called once per pool.
    fn build_pool_store(&mut self, header: &PoolSchema) -> StoreResult<Option<AnyStore>>;
}

/// Factory of empty stores sized by a `StoreConfig`.
#[derive(Debug, Clone, Default)]
pub struct DefaultStoreFactory {
    config: StoreConfig,
}

impl DefaultStoreFactory {
    /// Validate `config` and build a factory around it.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Sizing used for new stores.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl StoreFactory for DefaultStoreFactory {
    fn build_word_store(&mut self) -> StoreResult<WordStore> {
        WordStore::new(self.config.word_block_size)
    }

    fn build_object_store(&mut self, header: &ObjectSchema) -> StoreResult<Option<AnyStore>> {
        header.new_store(&self.config).map(Some)
    }

    fn build_pool_store(&mut self, header: &PoolSchema) -> StoreResult<Option<AnyStore>> {
        Ok(Some(header.new_store()))
    }
}

/// Factory handing out stores restored from elsewhere.
///
/// Object stores are keyed by header name, pool stores by pool name. A
/// header without a preloaded store gets none, which the table reports as
/// a missing store. Without a preloaded word store an empty one is built.
#[derive(Default)]
pub struct PreloadedStoreFactory {
    word_store: Option<WordStore>,
    object_stores: HashMap<String, AnyStore>,
    pool_stores: HashMap<String, AnyStore>,
}

impl PreloadedStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `store` as the table's word store.
    pub fn with_word_store(mut self, store: WordStore) -> Self {
        self.word_store = Some(store);
        self
    }

    /// Use `store` for the object header called `name`.
    pub fn with_object_store<T: 'static>(
        mut self,
        name: impl Into<String>,
        store: ObjectStore<T>,
    ) -> Self {
        self.object_stores.insert(name.into(), erase_object_store(store));
        self
    }

    /// Use `store` for the pool called `pool`.
    pub fn with_pool_store<T: Eq + Hash + Clone + 'static>(
        mut self,
        pool: impl Into<String>,
        store: PoolStore<T>,
    ) -> Self {
        self.pool_stores.insert(pool.into(), erase_pool_store(store));
        self
    }

    /// Use an already erased store for the object header called `name`.
    pub fn with_erased_object_store(mut self, name: impl Into<String>, store: AnyStore) -> Self {
        self.object_stores.insert(name.into(), store);
        self
    }

    /// Use an already erased store for the pool called `pool`.
    pub fn with_erased_pool_store(mut self, pool: impl Into<String>, store: AnyStore) -> Self {
        self.pool_stores.insert(pool.into(), store);
        self
    }
}

impl StoreFactory for PreloadedStoreFactory {
    fn build_word_store(&mut self) -> StoreResult<WordStore> {
        match self.word_store.take() {
            Some(store) => Ok(store),
            None => {
                debug!("no preloaded word store, building an empty one");
                Ok(WordStore::default())
            }
        }
    }

    fn build_object_store(&mut self, header: &ObjectSchema) -> StoreResult<Option<AnyStore>> {
        Ok(self.object_stores.remove(header.name()))
    }

    fn build_pool_store(&mut self, header: &PoolSchema) -> StoreResult<Option<AnyStore>> {
        Ok(self.pool_stores.remove(header.pool().name()))
    }
}
