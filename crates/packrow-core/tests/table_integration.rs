//! Integration tests: tables built from catalog headers.
//!
//! These tests go through the public API only: headers from the catalog,
//! tables with automatic, custom and recorded layouts, default and preloaded
//! store factories, and seeded randomized packing checks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use packrow_core::{
    catalog, AutomaticLayoutBuilder, BitSchema, CodecKind, CustomLayoutBuilder, Enumerated, Header,
    MemoryLayoutBuilder, ObjectHeader, ObjectStore, PoolHeader, PoolStore, PreloadedStoreFactory,
    RecordedLayoutBuilder, StoreError, Table, WORD_SIZE,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permission {
    Read,
    Write,
    Execute,
}

impl Enumerated for Permission {
    const COUNT: u32 = 3;

    fn ordinal(&self) -> u32 {
        *self as u32
    }

    fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Permission::Read),
            1 => Some(Permission::Write),
            2 => Some(Permission::Execute),
            _ => None,
        }
    }
}

fn random_schemas(rng: &mut StdRng, count: usize) -> Vec<BitSchema> {
    (0..count)
        .map(|i| {
            let name = format!("h{}", i);
            match rng.gen_range(0..4) {
                0 => BitSchema::new(name, 64, 64, CodecKind::Long).unwrap(),
                1 => {
                    let bits = rng.gen_range(1..=200);
                    BitSchema::new(name, bits, bits + WORD_SIZE, CodecKind::BitSet).unwrap()
                }
                _ => {
                    let bits = rng.gen_range(1..=31);
                    BitSchema::new(name, bits, WORD_SIZE, CodecKind::UnsignedInt).unwrap()
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Packing
// ---------------------------------------------------------------------------

#[test]
fn test_mixed_record_packs_into_two_words() {
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
fn test_automatic_layout_is_valid() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..200 {
        let count = rng.gen_range(1..=24);
        let headers = random_schemas(&mut rng, count);
        let layout = AutomaticLayoutBuilder.compute(WORD_SIZE, &headers).unwrap();

        let placed: Vec<_> = headers
            .iter()
            .map(|h| (h.clone(), layout.position_for(h.name()).unwrap()))
            .collect();
        let replay = CustomLayoutBuilder::non_overlapping(layout.record_size(), placed).unwrap();
        assert_eq!(replay.compute(WORD_SIZE, &headers).unwrap(), layout);
    }
}

#[test]
fn test_fields_do_not_bleed() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        let headers: Vec<_> = (0..rng.gen_range(2..=12))
            .map(|i| {
                catalog::unsigned_int_on_bits(format!("u{}", i), rng.gen_range(1..=31)).unwrap()
            })
            .collect();
        let table = Table::new(headers.iter().map(Header::from)).unwrap();
        let encoders: Vec<_> = headers.iter().map(|h| table.encoder_for(h).unwrap()).collect();

        let position = rng.gen_range(0..5000u64);
        let mut expected = Vec::new();
        for (header, encoder) in headers.iter().zip(&encoders) {
            let value = rng.gen_range(0..(1u32 << header.bits_count()));
            encoder.set(position, value).unwrap();
            expected.push(value);
        }

        let target = rng.gen_range(0..encoders.len());
        let value = rng.gen_range(0..(1u32 << headers[target].bits_count()));
        encoders[target].set(position, value).unwrap();
        expected[target] = value;

        for (encoder, value) in encoders.iter().zip(&expected) {
            assert_eq!(encoder.get(position).unwrap(), *value);
        }
    }
}

// ---------------------------------------------------------------------------
// Header kinds
// ---------------------------------------------------------------------------

#[test]
fn test_all_header_kinds_round_trip() {
    let long = catalog::long64("long");
    let double = catalog::double64("double");
    let float = catalog::float32("float");
    let ch = catalog::char16("char");
    let range = catalog::int_range("range", -500, 500).unwrap();
    let permission = catalog::enum_type::<Permission>("permission").unwrap();
    let permissions = catalog::enum_bit_set::<Permission>("permissions").unwrap();
    let flags = catalog::bit_set("flags", 100).unwrap();
    let note: ObjectHeader<String> = catalog::object("note");
    let table = Table::new([
        Header::from(&long),
        Header::from(&double),
        Header::from(&float),
        Header::from(&ch),
        Header::from(&range),
        Header::from(&permission),
        Header::from(&permissions),
        Header::from(&flags),
        Header::from(&note),
    ])
    .unwrap();

    let position = 70_000;
    table.encoder_for(&long).unwrap().set(position, -9_000_000_000).unwrap();
    table.encoder_for(&double).unwrap().set(position, 2.5e-8).unwrap();
    table.encoder_for(&float).unwrap().set(position, -1.25).unwrap();
    table.encoder_for(&ch).unwrap().set(position, 0xffff).unwrap();
    table.encoder_for(&range).unwrap().set(position, -500).unwrap();
    table.encoder_for(&permission).unwrap().set(position, Permission::Execute).unwrap();
    table.encoder_for(&permissions).unwrap().set_true(position, &Permission::Write).unwrap();
    table.encoder_for(&flags).unwrap().set_true(position, 99).unwrap();
    table.encoder_for(&note).unwrap().set(position, "hello".to_string());

    assert_eq!(table.encoder_for(&long).unwrap().get(position).unwrap(), -9_000_000_000);
    assert_eq!(table.encoder_for(&double).unwrap().get(position).unwrap(), 2.5e-8);
    assert_eq!(table.encoder_for(&float).unwrap().get(position).unwrap(), -1.25);
    assert_eq!(table.encoder_for(&ch).unwrap().get(position).unwrap(), 0xffff);
    assert_eq!(table.encoder_for(&range).unwrap().get(position).unwrap(), -500);
    assert_eq!(
        table.encoder_for(&permission).unwrap().get(position).unwrap(),
        Permission::Execute
    );

    let permissions = table.encoder_for(&permissions).unwrap();
    assert!(permissions.get(position, &Permission::Write).unwrap());
    assert!(!permissions.get(position, &Permission::Read).unwrap());

    let flags = table.encoder_for(&flags).unwrap();
    assert!(flags.get(position, 99).unwrap());
    assert!(!flags.get(position, 98).unwrap());
    assert_eq!(
        table.encoder_for(&note).unwrap().get(position).unwrap().as_deref(),
        Some("hello")
    );
}

#[test]
fn test_list_header() {
    let next = catalog::list_of_size("next", 1 << 20).unwrap();
    let table = Table::new([Header::from(&next)]).unwrap();
    let list = table.encoder_for(&next).unwrap();

    list.init(10).unwrap();
    list.add_next(10, 20).unwrap();
    list.add_next(20, 30).unwrap();
    list.add_previous(10, 40).unwrap();

    assert_eq!(list.collect_positions(10).unwrap(), vec![10, 20, 30, 40]);
    assert_eq!(list.previous(10).unwrap(), 40);

    list.init(50).unwrap();
    list.add_next(50, 60).unwrap();
    list.merge(30, 50).unwrap();
    assert_eq!(list.collect_positions(10).unwrap(), vec![10, 20, 30, 50, 60, 40]);
    assert_eq!(list.len(60).unwrap(), 6);
}

#[test]
fn test_read_past_allocated_storage() {
    let value = catalog::int32("value");
    let table = Table::with_parts(
        &AutomaticLayoutBuilder,
        &mut packrow_core::DefaultStoreFactory::new(packrow_core::StoreConfig::compact()).unwrap(),
        [Header::from(&value)],
    )
    .unwrap();
    let encoder = table.encoder_for(&value).unwrap();

    encoder.set(2000, 1).unwrap();
    assert_eq!(encoder.get(1999).unwrap(), 0);
    assert_eq!(encoder.get(2047).unwrap(), 0);
    assert!(matches!(
        encoder.get(2048),
        Err(StoreError::IndexOutOfRange { index: 2048, capacity: 2048 })
    ));
}

#[test]
fn test_huge_position_is_out_of_range() {
    let a = catalog::int32("a");
    let b = catalog::int32("b");
    let table = Table::new([Header::from(&a), Header::from(&b)]).unwrap();
    assert_eq!(table.record_size(), 2);

    let encoder = table.encoder_for(&a).unwrap();
    let position = u64::MAX / 2 + 1;
    assert!(matches!(encoder.get(position), Err(StoreError::IndexOutOfRange { .. })));
    assert!(matches!(encoder.set(position, 1), Err(StoreError::IndexOutOfRange { .. })));

    let wide = catalog::long64("wide");
    let table = Table::new([Header::from(&wide)]).unwrap();
    let encoder = table.encoder_for(&wide).unwrap();
    assert!(matches!(encoder.set(u64::MAX / 2 + 1, 1), Err(StoreError::IndexOutOfRange { .. })));
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

#[test]
fn test_pool_dedup_and_limit() {
    let pool = catalog::pool_of_size("colors", 2).unwrap();
    let color: PoolHeader<String> = catalog::object_pool("color", pool).unwrap();
    let table = Table::new([Header::from(&color)]).unwrap();
    let colors = table.encoder_for(&color).unwrap();

    colors.set(0, "red".into()).unwrap();
    colors.set(1, "blue".into()).unwrap();
    colors.set(2, "red".into()).unwrap();
    assert_eq!(colors.slot(0).unwrap(), colors.slot(2).unwrap());
    assert_eq!(colors.values().len(), 2);

    assert!(matches!(
        colors.set(3, "green".into()),
        Err(StoreError::PoolFull { .. })
    ));
    assert_eq!(colors.values().len(), 2);
}

// ---------------------------------------------------------------------------
// Reload from recorded layout and preloaded stores
// ---------------------------------------------------------------------------

#[test]
fn test_reload_from_recorded_state() {
    let id = catalog::int32("id");
    let score = catalog::int_on_bits("score", -10, 7).unwrap();
    let note: ObjectHeader<String> = catalog::object("note");
    let city: PoolHeader<String> =
        catalog::object_pool("city", catalog::pool_on_bits("cities", 6).unwrap()).unwrap();
    let headers = [
        Header::from(&id),
        Header::from(&score),
        Header::from(&note),
        Header::from(&city),
    ];

    let source = Table::new(headers.clone()).unwrap();
    for position in 0..100u64 {
        source.encoder_for(&id).unwrap().set(position, position as i32 * 3).unwrap();
        source.encoder_for(&score).unwrap().set(position, position as i32 - 10).unwrap();
        source.encoder_for(&city).unwrap().set(position, format!("city-{}", position % 7)).unwrap();
    }
    source.encoder_for(&note).unwrap().set(42, "answer".to_string());

    let layout = source.layout().clone();
    let checksum = layout.checksum();
    let words = source.word_store().unwrap().borrow().clone();
    let notes: ObjectStore<String> =
        source.object_store::<String>("note").unwrap().borrow().clone();
    let cities: PoolStore<String> = source.pool_store::<String>("cities").unwrap().borrow().clone();

    let mut factory = PreloadedStoreFactory::new()
        .with_word_store(words)
        .with_object_store("note", notes)
        .with_pool_store("cities", cities);
    let reloaded = Table::with_parts(
        &RecordedLayoutBuilder::verified(layout.clone(), checksum),
        &mut factory,
        headers,
    )
    .unwrap();

    assert_eq!(reloaded.layout(), &layout);
    for position in 0..100u64 {
        let stored_id = reloaded.encoder_for(&id).unwrap().get(position).unwrap();
        let stored_score = reloaded.encoder_for(&score).unwrap().get(position).unwrap();
        assert_eq!(stored_id, position as i32 * 3);
        assert_eq!(stored_score, position as i32 - 10);
        assert_eq!(
            reloaded.encoder_for(&city).unwrap().get(position).unwrap(),
            format!("city-{}", position % 7)
        );
    }
    assert_eq!(
        reloaded.encoder_for(&note).unwrap().get(42).unwrap().as_deref(),
        Some("answer")
    );
    assert_eq!(reloaded.pool_store::<String>("cities").unwrap().borrow().len(), 7);
}

#[test]
fn test_reload_object_only_table() {
    let note: ObjectHeader<String> = catalog::object("note");
    let source = Table::new([Header::from(&note)]).unwrap();
    source.encoder_for(&note).unwrap().set(5, "kept".to_string());

    let layout = source.layout().clone();
    let checksum = layout.checksum();
    let notes: ObjectStore<String> =
        source.object_store::<String>("note").unwrap().borrow().clone();

    let mut factory = PreloadedStoreFactory::new().with_object_store("note", notes);
    let reloaded = Table::with_parts(
        &RecordedLayoutBuilder::verified(layout, checksum),
        &mut factory,
        [Header::from(&note)],
    )
    .unwrap();

    assert_eq!(reloaded.record_size(), 0);
    assert!(reloaded.word_store().is_none());
    assert_eq!(
        reloaded.encoder_for(&note).unwrap().get(5).unwrap().as_deref(),
        Some("kept")
    );
}

#[test]
fn test_reload_rejects_tampered_layout() {
    let a = catalog::int32("a");
    let b = catalog::int32("b");
    let source = Table::new([Header::from(&a), Header::from(&b)]).unwrap();
    let checksum = source.layout().checksum();

    let positions = source
        .layout()
        .positions()
        .map(|(name, position)| {
            let word_offset = if name == "a" {
                1 - position.word_offset
            } else {
                position.word_offset
            };
            (name.to_string(), packrow_core::MemoryPosition::new(word_offset, 0))
        })
        .collect();
    let tampered = packrow_core::MemoryLayout::new(2, positions);

    let result = Table::with_layout(
        &RecordedLayoutBuilder::verified(tampered, checksum),
        [Header::from(&a), Header::from(&b)],
    );
    assert!(matches!(result, Err(StoreError::ChecksumMismatch { .. })));
}

#[test]
fn test_preloaded_factory_missing_store() {
    let note: ObjectHeader<String> = catalog::object("note");
    let result = Table::with_parts(
        &AutomaticLayoutBuilder,
        &mut PreloadedStoreFactory::new(),
        [Header::from(&note)],
    );
    assert_eq!(result.unwrap_err(), StoreError::MissingStore { name: "note".into() });
}

#[test]
fn test_preloaded_factory_wrong_store_type() {
    let note: ObjectHeader<String> = catalog::object("note");
    let wrong_type = ObjectStore::<u64>::new(1024).unwrap();
    let mut factory = PreloadedStoreFactory::new().with_object_store("note", wrong_type);
    let result = Table::with_parts(&AutomaticLayoutBuilder, &mut factory, [Header::from(&note)]);
    assert!(matches!(result, Err(StoreError::StoreTypeMismatch { .. })));
}
