use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use fieldlog_core::{
    field_value::FieldValue,
    ids::*,
    record::{Record, RecordFilter},
    schema::{Entity, Field, FieldType, RoleKind},
    timestamp::Timestamp,
    Labels,
};
use fieldlog_engine::{
    filter, paginate::paginate, roles, search, sort, ColumnSlot, ReportQuery, SchemaRegistry,
    SelectedColumns, SortColumn, SortDirection, SortSpec,
};
use proptest::prelude::*;

const ENTITY_NAMES: [&str; 3] = ["Bomba", "Válvula", "Compresor"];

struct World {
    registry: SchemaRegistry,
    entities: Vec<EntityId>,
    fields: Vec<FieldId>,
    columns: SelectedColumns,
}

fn world() -> World {
    let mut registry = SchemaRegistry::new(Labels::default());
    let fields: Vec<FieldId> = ["Lote", "Turno", "Nota"]
        .iter()
        .map(|name| {
            let field = Field::new(name, FieldType::Text);
            let id = field.id;
            registry.add_field(field).map(|_| id)
        })
        .collect::<Result<_, _>>()
        .unwrap();
    let entities = ENTITY_NAMES
        .iter()
        .map(|name| {
            let entity = Entity::new(name, fields.clone());
            let id = entity.id;
            registry.add_entity(entity).map(|_| id)
        })
        .collect::<Result<_, _>>()
        .unwrap();
    let columns = SelectedColumns {
        field1: Some(fields[0]),
        field2: Some(fields[1]),
        field3: None,
    };
    World {
        registry,
        entities,
        fields,
        columns,
    }
}

fn cell() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(prop_oneof![
        (0u32..500).prop_map(|n| n.to_string()),
        proptest::string::string_regex("[a-zA-Z]{1,6}").unwrap(),
    ])
}

/// (entity index, minutes after the epoch of the test range, three cells)
fn raw_records() -> impl Strategy<Value = Vec<(usize, i64, [Option<String>; 3])>> {
    proptest::collection::vec(
        (0usize..3, 0i64..(60 * 24 * 90), [cell(), cell(), cell()]),
        0..60,
    )
}

fn build(world: &World, raw: &[(usize, i64, [Option<String>; 3])]) -> Vec<Record> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    raw.iter()
        .map(|(entity, minutes, cells)| {
            let data: BTreeMap<FieldId, FieldValue> = world
                .fields
                .iter()
                .zip(cells)
                .filter_map(|(id, c)| c.clone().map(|c| (*id, FieldValue::Text(c))))
                .collect();
            let at = Timestamp::from_datetime(start + Duration::minutes(*minutes));
            Record::new(world.entities[*entity], data, at)
        })
        .collect()
}

proptest! {
    #[test]
    fn entity_filter_keeps_exactly_that_entity(raw in raw_records(), pick in 0usize..3) {
        let world = world();
        let records = build(&world, &raw);
        let target = world.entities[pick];

        let kept = filter::apply(&records, &RecordFilter::new().entities([target]));
        let expected: Vec<&Record> = records.iter().filter(|r| r.entity_id == target).collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn date_filter_respects_inclusive_bounds(raw in raw_records(), a in 0i64..90, b in 0i64..90) {
        let world = world();
        let records = build(&world, &raw);
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (lo, hi) = (start + Duration::days(a.min(b)), start + Duration::days(a.max(b)));

        let kept = filter::apply(&records, &RecordFilter::new().since(lo).until(hi));
        for record in &records {
            let date = record.timestamp.date();
            let inside = lo <= date && date <= hi;
            prop_assert_eq!(kept.iter().any(|r| r.id == record.id), inside);
        }
    }

    #[test]
    fn search_never_drops_entity_name_hits(
        raw in raw_records(),
        needle in prop_oneof![Just("bom"), Just("OMBA"), Just("válv"), Just("PRES"), Just("zz")],
    ) {
        let world = world();
        let records = build(&world, &raw);

        let found = search::apply(&records, needle, &world.columns, &world.registry);
        for record in &records {
            let name = world.registry.entity_name(record.entity_id).to_lowercase();
            if name.contains(&needle.to_lowercase()) {
                prop_assert!(found.iter().any(|r| r.id == record.id));
            }
        }
    }

    #[test]
    fn timestamp_ascending_is_ordered(raw in raw_records()) {
        let world = world();
        let records = build(&world, &raw);
        let mut refs: Vec<&Record> = records.iter().collect();

        let spec = SortSpec::new(SortColumn::Timestamp, SortDirection::Asc);
        sort::sort(&mut refs, &spec, &world.columns, &world.registry);
        for pair in refs.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn column_sort_is_a_stable_total_order(raw in raw_records(), desc in any::<bool>()) {
        let world = world();
        let records = build(&world, &raw);
        let mut refs: Vec<&Record> = records.iter().collect();
        let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };

        let spec = SortSpec::new(SortColumn::Field(ColumnSlot::Field1), direction);
        sort::sort(&mut refs, &spec, &world.columns, &world.registry);
        let position = |r: &Record| records.iter().position(|x| x.id == r.id);
        for pair in refs.windows(2) {
            let ordering = sort::compare(pair[0], pair[1], &spec, &world.columns, &world.registry);
            prop_assert!(ordering.is_le());
            if ordering.is_eq() {
                prop_assert!(position(pair[0]) < position(pair[1]));
            }
        }
    }

    #[test]
    fn pages_are_clipped_windows(len in 0usize..80, size in 1usize..15, page in 0usize..20) {
        let items: Vec<usize> = (0..len).collect();
        let served = paginate(&items, page, size);

        let total_pages = len.div_ceil(size);
        prop_assert_eq!(served.total_pages, total_pages);
        prop_assert_eq!(served.page, page.clamp(1, total_pages.max(1)));
        let start = (served.page - 1) * size;
        let expected: Vec<usize> = items.iter().copied().skip(start).take(size).collect();
        prop_assert_eq!(served.items, expected);
    }

    #[test]
    fn pipeline_is_idempotent(
        raw in raw_records(),
        search_text in prop_oneof![Just(""), Just("a"), Just("1"), Just("2024-02")],
        page in 0usize..6,
    ) {
        let world = world();
        let records = build(&world, &raw);
        let query = ReportQuery::new(world.columns, 7)
            .with_search(search_text)
            .toggle_sort(SortColumn::Field(ColumnSlot::Field2))
            .with_page(page);

        let first = query.run(&records, &world.registry);
        let second = query.run(&records, &world.registry);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_role_has_at_most_one_owner(
        moves in proptest::collection::vec((0usize..5, proptest::option::of(0usize..3)), 1..30),
    ) {
        let mut world = world();
        for (kind, owner) in moves {
            let kind = RoleKind::ALL[kind];
            let owner = owner.map(|i| world.fields[i]);
            let change = roles::assign(&mut world.registry, kind, owner).unwrap();
            prop_assert_eq!(world.registry.slots().get(kind), owner);
            prop_assert_eq!(change.slots, *world.registry.slots());

            let slots = world.registry.slots();
            for field in &world.fields {
                let display = RoleKind::ALL
                    .iter()
                    .filter(|k| k.is_display() && slots.get(**k) == Some(*field))
                    .count();
                let report = RoleKind::ALL
                    .iter()
                    .filter(|k| !k.is_display() && slots.get(**k) == Some(*field))
                    .count();
                prop_assert!(display <= 1);
                prop_assert!(report <= 1);
            }
        }
    }
}
