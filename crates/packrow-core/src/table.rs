//! Table: headers, layout, stores and encoders in one place
//!
//! A table is built once from its headers. Construction:
//!
//! 1. Splits headers into bit, object and pool headers. Every pool header
//!    contributes its synthetic `<name>-index` bit header.
//! 2. Rejects duplicate header names and pools redefined under the same
//!    name, before anything is allocated.
//! 3. Computes one layout for all bit headers. A table without bit headers
//!    gets the empty layout and never consults its layout builder.
//! 4. Allocates one word store (if there are bit headers), one object store
//!    per object header and one pool store per pool name.
//! 5. Binds and caches one untyped `Binding` per header: the placed bit
//!    field, the object store, or the pool store with its index field.
//!
//! Encoders are retrieved with the typed header handle they were declared
//! with. The cache holds bindings rather than typed encoders, because one
//! table serves headers of many value types; `encoder_for` checks the handle
//! against the registered header and wraps the cached binding in a typed
//! view. Every view of a header shares the same stores and placement, so
//! two calls return interchangeable encoders.
//!
//! `headers()` lists the headers as declared. Pool index sub-headers are
//! internal to their pool header; their placement is visible through
//! `layout()` under `<name>-index`.
//!
//! ```
//! use packrow_core::{catalog, Header, Table};
//!
//! let id = catalog::int32("id");
//! let active = catalog::bool("active");
//! let table = Table::new([Header::from(&id), Header::from(&active)]).unwrap();
//!
//! let ids = table.encoder_for(&id).unwrap();
//! ids.set(3, 42).unwrap();
//! assert_eq!(ids.get(3).unwrap(), 42);
//! assert_eq!(table.record_size(), 2);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::factory::{
    shared_object_store, shared_pool_store, AnyStore, DefaultStoreFactory, SharedObjectStore,
    SharedPoolStore, StoreFactory,
};
use crate::field::{BitConfig, BitField, SharedWordStore, WORD_SIZE};
use crate::header::{BitSchema, Header, ObjectSchema, PoolSchema, TypedHeader};
use crate::layout::{AutomaticLayoutBuilder, MemoryLayout, MemoryLayoutBuilder};

/// Untyped encoder state cached per header. Typed encoders are cheap views
/// built from it by `Table::encoder_for`.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Placed bit field
    Bit(BitField),
    /// Object store of an object header
    Object(AnyStore),
    /// Pool store and pool index field of a pool header
    Pool {
        /// Shared pool store
        store: AnyStore,
        /// Placed pool index field
        index: BitField,
    },
}

/// Fixed schema of headers bound to their stores.
pub struct Table {
    headers: Vec<Header>,
    bindings: HashMap<String, Binding>,
    layout: MemoryLayout,
    word_store: Option<SharedWordStore>,
    object_stores: BTreeMap<String, AnyStore>,
    pool_stores: HashMap<String, AnyStore>,
}

impl Table {
    /// Table with an automatic layout and empty stores.
    pub fn new(headers: impl IntoIterator<Item = Header>) -> StoreResult<Self> {
        Self::with_layout(&AutomaticLayoutBuilder, headers)
    }

    /// Table with a custom layout and empty stores.
    pub fn with_layout(
        layout_builder: &dyn MemoryLayoutBuilder,
        headers: impl IntoIterator<Item = Header>,
    ) -> StoreResult<Self> {
        Self::with_parts(layout_builder, &mut DefaultStoreFactory::default(), headers)
    }

    /// Table with a custom layout and stores from `factory`.
    pub fn with_parts(
        layout_builder: &dyn MemoryLayoutBuilder,
        factory: &mut dyn StoreFactory,
        headers: impl IntoIterator<Item = Header>,
    ) -> StoreResult<Self> {
        let headers: Vec<Header> = headers.into_iter().collect();

        let mut bit_headers: Vec<BitSchema> = Vec::new();
        let mut object_headers: Vec<&ObjectSchema> = Vec::new();
        let mut pool_headers: Vec<&PoolSchema> = Vec::new();
        for header in &headers {
            match header {
                Header::Bit(schema) => bit_headers.push(schema.clone()),
                Header::Object(schema) => object_headers.push(schema),
                Header::Pool(schema) => pool_headers.push(schema),
            }
        }
        bit_headers.extend(pool_headers.iter().map(|h| h.index_header().clone()));

        validate_names(&headers, &pool_headers)?;

        let layout = if bit_headers.is_empty() {
            MemoryLayout::default()
        } else {
            layout_builder.compute(WORD_SIZE, &bit_headers)?
        };
        let mut bindings = HashMap::new();

        let word_store = if bit_headers.is_empty() {
            None
        } else {
            Some(Rc::new(RefCell::new(factory.build_word_store()?)))
        };
        let mut fields: HashMap<String, BitField> = HashMap::new();
        if let Some(store) = &word_store {
            for header in &bit_headers {
                let field = place(store, &layout, header)?;
                fields.insert(header.name().to_string(), field);
            }
        }

        let mut object_stores = BTreeMap::new();
        for header in &object_headers {
            let store = factory
                .build_object_store(header)?
                .ok_or_else(|| missing_store(header.name()))?;
            if !header.accepts(&store) {
                return Err(StoreError::StoreTypeMismatch {
                    name: header.name().to_string(),
                    expected: header.value_type().name(),
                });
            }
            object_stores.insert(header.name().to_string(), store.clone());
            bindings.insert(header.name().to_string(), Binding::Object(store));
        }

        let mut pool_stores: HashMap<String, AnyStore> = HashMap::new();
        for header in &pool_headers {
            let pool_name = header.pool().name();
            let store = match pool_stores.get(pool_name) {
                Some(store) => store.clone(),
                None => {
                    let store = factory
                        .build_pool_store(header)?
                        .ok_or_else(|| missing_store(pool_name))?;
                    if !header.accepts(&store) {
                        return Err(StoreError::StoreTypeMismatch {
                            name: pool_name.to_string(),
                            expected: header.value_type().name(),
                        });
                    }
                    pool_stores.insert(pool_name.to_string(), store.clone());
                    store
                }
            };
            let index = fields
                .remove(header.index_header().name())
                .ok_or_else(|| StoreError::MissingPosition {
                    name: header.index_header().name().to_string(),
                })?;
            bindings.insert(header.name().to_string(), Binding::Pool { store, index });
        }

        for (name, field) in fields {
            bindings.insert(name, Binding::Bit(field));
        }

        debug!(
            headers = headers.len(),
            record_size = layout.record_size(),
            object_stores = object_stores.len(),
            pool_stores = pool_stores.len(),
            "table built"
        );

        Ok(Self {
            headers,
            bindings,
            layout,
            word_store,
            object_stores,
            pool_stores,
        })
    }

    /// Typed encoder of a registered header, built over its cached binding.
    /// `None` when no header with the same name and definition was
    /// registered.
    pub fn encoder_for<H: TypedHeader>(&self, header: &H) -> Option<H::Encoder> {
        let untyped = header.header();
        let registered = self.header(untyped.name())?;
        if *registered != untyped {
            return None;
        }
        header.bind(self.bindings.get(untyped.name())?)
    }

    /// Registered headers in declaration order. Pool index sub-headers are
    /// not listed.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Registered header called `name`.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.name() == name)
    }

    /// Returns true if a header called `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Layout of the bit headers, including pool indexes.
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Words per record.
    pub fn record_size(&self) -> u32 {
        self.layout.record_size()
    }

    /// Word store of the bit headers. `None` for tables without bit headers.
    pub fn word_store(&self) -> Option<&SharedWordStore> {
        self.word_store.as_ref()
    }

    /// Object stores by header name.
    pub fn object_stores(&self) -> &BTreeMap<String, AnyStore> {
        &self.object_stores
    }

    /// Pool stores by pool name.
    pub fn pool_stores(&self) -> &HashMap<String, AnyStore> {
        &self.pool_stores
    }

    /// Typed object store of the object header called `name`.
    pub fn object_store<T: 'static>(&self, name: &str) -> Option<SharedObjectStore<T>> {
        shared_object_store(self.object_stores.get(name)?)
    }

    /// Typed pool store of the pool called `pool`.
    pub fn pool_store<T: 'static>(&self, pool: &str) -> Option<SharedPoolStore<T>> {
        shared_pool_store(self.pool_stores.get(pool)?)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("headers", &self.headers)
            .field("layout", &self.layout)
            .finish()
    }
}

fn missing_store(name: &str) -> StoreError {
    warn!(name, "store factory produced no store");
    StoreError::MissingStore {
        name: name.to_string(),
    }
}

fn validate_names(headers: &[Header], pool_headers: &[&PoolSchema]) -> StoreResult<()> {
    let mut names: HashSet<&str> = HashSet::new();
    let index_names = pool_headers.iter().map(|h| h.index_header().name());
    for name in headers.iter().map(Header::name).chain(index_names) {
        if !names.insert(name) {
            warn!(name, "duplicated header name");
            return Err(StoreError::DuplicateHeader {
                name: name.to_string(),
            });
        }
    }

    let mut pools: HashMap<&str, &PoolSchema> = HashMap::new();
    for header in pool_headers {
        let pool = header.pool();
        match pools.get(pool.name()) {
            Some(seen) if seen.pool() != pool || seen.value_type() != header.value_type() => {
                warn!(pool = pool.name(), "pool redefined");
                return Err(StoreError::DuplicatePool {
                    name: pool.name().to_string(),
                });
            }
            Some(_) => {}
            None => {
                pools.insert(pool.name(), header);
            }
        }
    }

    Ok(())
}

fn place(
    store: &SharedWordStore,
    layout: &MemoryLayout,
    header: &BitSchema,
) -> StoreResult<BitField> {
    let position = layout
        .position_for(header.name())
        .ok_or_else(|| StoreError::MissingPosition {
            name: header.name().to_string(),
        })?;
    let config = BitConfig::new(
        store.clone(),
        layout.record_size(),
        position.word_offset,
        position.bit_shift,
        header.bits_count(),
    )?;
    BitField::for_schema(config, header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::codec::{EnumCodec, Enumerated, IntCodec};
    use crate::header::{BitHeader, ObjectHeader, PoolHeader};
    use crate::layout::{CustomLayoutBuilder, MemoryPosition};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Shape {
        Circle,
        Square,
    }

    impl Enumerated for Shape {
        const COUNT: u32 = 2;

        fn ordinal(&self) -> u32 {
            *self as u32
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            match ordinal {
                0 => Some(Shape::Circle),
                1 => Some(Shape::Square),
                _ => None,
            }
        }
    }

    #[test]
    fn test_packed_record() {
        let int = catalog::int32("int");
        let byte = catalog::byte8("byte");
        let short = catalog::short16("short");
        let flag = catalog::bool("bool");
        let table = Table::new([
            Header::from(&int),
            Header::from(&byte),
            Header::from(&short),
            Header::from(&flag),
        ])
        .unwrap();

        assert_eq!(table.record_size(), 2);
        table.encoder_for(&int).unwrap().set(0, 12345).unwrap();
        table.encoder_for(&short).unwrap().set(0, 1234).unwrap();
        table.encoder_for(&byte).unwrap().set(0, 12).unwrap();
        table.encoder_for(&flag).unwrap().set(0, true).unwrap();

        let words = table.word_store().unwrap().borrow();
        assert_eq!(words.get_int(0).unwrap(), 12345);
        assert_eq!(words.get_int(1).unwrap(), 1234 | (12 << 16) | (1 << 24));
    }

    #[test]
    fn test_duplicate_header_names() {
        let a = catalog::int32("a");
        let b = catalog::byte8("a");
        assert_eq!(
            Table::new([Header::from(&a), Header::from(&b)]).unwrap_err(),
            StoreError::DuplicateHeader { name: "a".into() }
        );
    }

    #[test]
    fn test_pool_index_name_collides() {
        let pool = catalog::pool_on_bits("p", 4).unwrap();
        let city: PoolHeader<String> = catalog::object_pool("city", pool).unwrap();
        let clash = catalog::int32("city-index");
        assert_eq!(
            Table::new([Header::from(&city), Header::from(&clash)]).unwrap_err(),
            StoreError::DuplicateHeader { name: "city-index".into() }
        );
    }

    #[test]
    fn test_duplicate_pool_names() {
        let first: PoolHeader<String> =
            catalog::object_pool("a", catalog::pool_on_bits("p", 4).unwrap()).unwrap();
        let second: PoolHeader<String> =
            catalog::object_pool("b", catalog::pool_on_bits("p", 5).unwrap()).unwrap();
        assert_eq!(
            Table::new([Header::from(&first), Header::from(&second)]).unwrap_err(),
            StoreError::DuplicatePool { name: "p".into() }
        );

        let other_type: PoolHeader<u64> =
            catalog::object_pool("c", catalog::pool_on_bits("p", 4).unwrap()).unwrap();
        assert!(Table::new([Header::from(&first), Header::from(&other_type)]).is_err());
    }

    #[test]
    fn test_shared_pool() {
        let pool = catalog::pool_on_bits("names", 4).unwrap();
        let first: PoolHeader<String> = catalog::object_pool("first", pool.clone()).unwrap();
        let last: PoolHeader<String> = catalog::object_pool("last", pool).unwrap();
        let table = Table::new([Header::from(&first), Header::from(&last)]).unwrap();

        let firsts = table.encoder_for(&first).unwrap();
        let lasts = table.encoder_for(&last).unwrap();
        firsts.set(0, "Morgan".into()).unwrap();
        lasts.set(0, "Morgan".into()).unwrap();
        lasts.set(1, "Reese".into()).unwrap();

        assert_eq!(table.pool_stores().len(), 1);
        assert_eq!(table.pool_store::<String>("names").unwrap().borrow().len(), 2);
        assert_eq!(firsts.slot(0).unwrap(), lasts.slot(0).unwrap());
        assert_eq!(lasts.get(1).unwrap(), "Reese");
        assert!(table.layout().position_for("first-index").is_some());
    }

    #[test]
    fn test_object_headers() {
        let blob: ObjectHeader<Vec<u8>> = catalog::object("blob");
        let table = Table::new([Header::from(&blob)]).unwrap();

        assert!(table.word_store().is_none());
        assert_eq!(table.record_size(), 0);

        let blobs = table.encoder_for(&blob).unwrap();
        blobs.set(7, vec![1, 2, 3]);
        assert_eq!(blobs.get(7).unwrap(), Some(vec![1, 2, 3]));
        assert!(table.object_store::<Vec<u8>>("blob").is_some());
        assert!(table.object_store::<String>("blob").is_none());
    }

    #[test]
    fn test_unregistered_header() {
        let a = catalog::int32("a");
        let table = Table::new([Header::from(&a)]).unwrap();

        assert!(table.encoder_for(&catalog::int32("b")).is_none());
        assert!(table.encoder_for(&catalog::float32("a")).is_none());
        assert!(table.contains("a"));
        assert!(!table.contains("b"));
        assert_eq!(table.headers().len(), 1);
    }

    #[test]
    fn test_encoder_views_share_binding() {
        let count = catalog::unsigned_int_on_bits("count", 12).unwrap();
        let city: PoolHeader<String> =
            catalog::object_pool("city", catalog::pool_on_bits("cities", 3).unwrap()).unwrap();
        let table = Table::new([Header::from(&count), Header::from(&city)]).unwrap();

        let writer = table.encoder_for(&count).unwrap();
        let reader = table.encoder_for(&count).unwrap();
        assert_eq!(writer.field(), reader.field());
        writer.set(9, 4000).unwrap();
        assert_eq!(reader.get(9).unwrap(), 4000);

        table.encoder_for(&city).unwrap().set(9, "Oslo".into()).unwrap();
        assert_eq!(table.encoder_for(&city).unwrap().get(9).unwrap(), "Oslo");

        let names: Vec<_> = table.headers().iter().map(Header::name).collect();
        assert_eq!(names, vec!["count", "city"]);
        assert!(!table.contains("city-index"));
        assert!(table.layout().position_for("city-index").is_some());
    }

    #[test]
    fn test_enum_header() {
        let shape = catalog::enum_type::<Shape>("shape").unwrap();
        let maybe = catalog::nullable_enum_type::<Shape>("maybe").unwrap();
        let table = Table::new([Header::from(&shape), Header::from(&maybe)]).unwrap();

        let shapes = table.encoder_for(&shape).unwrap();
        let maybes = table.encoder_for(&maybe).unwrap();
        shapes.set(1, Shape::Square).unwrap();
        maybes.set(1, Some(Shape::Circle)).unwrap();

        assert_eq!(shapes.get(1).unwrap(), Shape::Square);
        assert_eq!(maybes.get(1).unwrap(), Some(Shape::Circle));
        assert_eq!(maybes.get(0).unwrap(), None);
        assert_eq!(shapes.get(0).unwrap(), Shape::Circle);

        let other: BitHeader<EnumCodec<Shape>> =
            catalog::enum_type_on_bits("shape", 1, EnumCodec::ordinal()).unwrap();
        assert!(table.encoder_for(&other).is_some());
    }

    #[test]
    fn test_custom_layout() {
        let a = catalog::int32("a");
        let b = catalog::int32("b");
        let builder = CustomLayoutBuilder::non_overlapping(
            3,
            [
                (a.schema().clone(), MemoryPosition::new(2, 0)),
                (b.schema().clone(), MemoryPosition::new(0, 0)),
            ],
        )
        .unwrap();
        let table = Table::with_layout(&builder, [Header::from(&a), Header::from(&b)]).unwrap();

        table.encoder_for(&a).unwrap().set(1, -1).unwrap();
        assert_eq!(table.record_size(), 3);
        assert_eq!(table.word_store().unwrap().borrow().get_int(5).unwrap(), u32::MAX);
    }

    #[test]
    fn test_custom_layout_missing_header() {
        let a = catalog::int32("a");
        let b: BitHeader<IntCodec> = catalog::int32("b");
        let placed = [(a.schema().clone(), MemoryPosition::new(0, 0))];
        let builder = CustomLayoutBuilder::non_overlapping(1, placed).unwrap();
        assert_eq!(
            Table::with_layout(&builder, [Header::from(&a), Header::from(&b)]).unwrap_err(),
            StoreError::MissingPosition { name: "b".into() }
        );
    }
}
