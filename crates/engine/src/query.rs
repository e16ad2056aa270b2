//! Query state for the record table and the filter → search → sort → paginate
//! pipeline that runs it against a snapshot.

use fieldlog_core::{
    config::DEFAULT_PAGE_SIZE,
    ids::RecordId,
    record::{Record, RecordFilter},
};

use crate::columns::{ColumnSlot, SelectedColumns};
use crate::paginate::{Page, paginate};
use crate::registry::SchemaRegistry;
use crate::sort::{SortColumn, SortDirection, SortSpec};
use crate::{filter, search, sort};

/// Shown in a table cell whose column is unassigned or whose value is absent.
pub const EMPTY_CELL: &str = "-";

/// Everything that decides what the record table shows. Transitions return a
/// new value; changing what matches or how it is ordered goes back to page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub filter: RecordFilter,
    pub search: String,
    pub sort: SortSpec,
    pub columns: SelectedColumns,
    /// 1-based. Clamped when the query runs.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            filter: RecordFilter::default(),
            search: String::new(),
            sort: SortSpec::default(),
            columns: SelectedColumns::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ReportQuery {
    pub fn new(columns: SelectedColumns, page_size: usize) -> Self {
        Self {
            columns,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_filter(&self, filter: RecordFilter) -> Self {
        Self {
            filter,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_search(&self, search: &str) -> Self {
        Self {
            search: search.to_string(),
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_sort(&self, sort: SortSpec) -> Self {
        Self {
            sort,
            page: 1,
            ..self.clone()
        }
    }

    /// Clicking a header: the current column flips direction, any other column
    /// starts ascending.
    pub fn toggle_sort(&self, column: SortColumn) -> Self {
        let direction = if self.sort.column == Some(column) {
            self.sort.direction.reversed()
        } else {
            SortDirection::Asc
        };
        self.with_sort(SortSpec::new(column, direction))
    }

    pub fn with_columns(&self, columns: SelectedColumns) -> Self {
        Self {
            columns,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn with_page_size(&self, page_size: usize) -> Self {
        Self {
            page_size,
            page: 1,
            ..self.clone()
        }
    }

    /// Run the pipeline over one snapshot. The snapshot is never re-read.
    pub fn run<'a>(&self, snapshot: &'a [Record], registry: &SchemaRegistry) -> QueryResult<'a> {
        let filtered = filter::apply(snapshot, &self.filter);
        let mut matched = search::apply(filtered, &self.search, &self.columns, registry);
        sort::sort(&mut matched, &self.sort, &self.columns, registry);
        let page = paginate(&matched, self.page, self.page_size);
        tracing::debug!(
            snapshot = snapshot.len(),
            matched = matched.len(),
            page = page.page,
            total_pages = page.total_pages,
            "ran query"
        );
        QueryResult {
            query: self.with_page(page.page),
            matched,
            page,
        }
    }
}

/// Output of [`ReportQuery::run`], borrowing from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<'a> {
    /// The query that was run, its page corrected to the one served.
    pub query: ReportQuery,
    /// Every matching record in display order, for export.
    pub matched: Vec<&'a Record>,
    pub page: Page<&'a Record>,
}

impl QueryResult<'_> {
    pub fn rows(&self, registry: &SchemaRegistry) -> Vec<TableRow> {
        self.page
            .items
            .iter()
            .map(|r| TableRow::from_record(r, &self.query.columns, registry))
            .collect()
    }
}

/// One record resolved for display: names instead of ids, text instead of
/// typed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub record_id: RecordId,
    pub entity: String,
    pub timestamp: String,
    pub columns: [String; 3],
}

impl TableRow {
    pub fn from_record(record: &Record, columns: &SelectedColumns, registry: &SchemaRegistry) -> Self {
        let cell = |slot: ColumnSlot| {
            columns
                .value(record, slot)
                .filter(|v| !v.is_blank())
                .map_or_else(|| EMPTY_CELL.to_string(), |v| v.display().into_owned())
        };
        Self {
            record_id: record.id,
            entity: registry.entity_name(record.entity_id).to_string(),
            timestamp: record.timestamp.formatted(),
            columns: ColumnSlot::ALL.map(cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use fieldlog_core::{Entity, Field, FieldId, FieldType, FieldValue, Labels, Timestamp};

    fn setup() -> (SchemaRegistry, FieldId, Vec<Record>) {
        let mut registry = SchemaRegistry::new(Labels::default());
        let amount = Field::new("Cantidad", FieldType::Number);
        let amount_id = amount.id;
        registry.add_field(amount).unwrap();
        let pump = Entity::new("Bomba", vec![amount_id]);
        let valve = Entity::new("Válvula", vec![amount_id]);
        let (pump_id, valve_id) = (pump.id, valve.id);
        registry.add_entity(pump).unwrap();
        registry.add_entity(valve).unwrap();

        let snapshot = (0..25)
            .map(|i| {
                let entity = if i % 2 == 0 { pump_id } else { valve_id };
                let data = BTreeMap::from([(amount_id, FieldValue::Number(i as f64))]);
                let ts = Timestamp::parse(&format!("2024-03-{:02}T08:00:00Z", i + 1)).unwrap();
                Record::new(entity, data, ts)
            })
            .collect();
        (registry, amount_id, snapshot)
    }

    #[test]
    fn transitions_reset_page() {
        let query = ReportQuery::default().with_page(3);
        assert_eq!(query.page, 3);
        assert_eq!(query.with_search("x").page, 1);
        assert_eq!(query.with_filter(RecordFilter::new()).page, 1);
        assert_eq!(query.toggle_sort(SortColumn::Entity).page, 1);
        assert_eq!(query.with_page_size(5).page, 1);
        // the original is untouched
        assert_eq!(query.page, 3);
        assert!(query.search.is_empty());
    }

    #[test]
    fn toggle_sort_flips_the_same_column() {
        let query = ReportQuery::default().toggle_sort(SortColumn::Timestamp);
        assert_eq!(query.sort, SortSpec::new(SortColumn::Timestamp, SortDirection::Asc));
        let query = query.toggle_sort(SortColumn::Timestamp);
        assert_eq!(query.sort.direction, SortDirection::Desc);
        let query = query.toggle_sort(SortColumn::Entity);
        assert_eq!(query.sort, SortSpec::new(SortColumn::Entity, SortDirection::Asc));
    }

    #[test]
    fn default_query_pages_newest_first() {
        let (registry, _, snapshot) = setup();
        let result = ReportQuery::new(SelectedColumns::default(), 10).run(&snapshot, &registry);
        assert_eq!(result.page.total_items, 25);
        assert_eq!(result.page.total_pages, 3);
        assert_eq!(result.page.items.len(), 10);
        assert_eq!(result.page.items[0].timestamp.date().to_string(), "2024-03-25");
    }

    #[test]
    fn out_of_range_page_is_corrected() {
        let (registry, _, snapshot) = setup();
        let query = ReportQuery::new(SelectedColumns::default(), 10).with_page(9);
        let result = query.run(&snapshot, &registry);
        assert_eq!(result.page.page, 3);
        assert_eq!(result.query.page, 3);
        assert_eq!(result.page.items.len(), 5);
    }

    #[test]
    fn search_and_sort_compose() {
        let (registry, amount, snapshot) = setup();
        let columns = SelectedColumns {
            field1: Some(amount),
            ..SelectedColumns::default()
        };
        let query = ReportQuery::new(columns, 50)
            .with_search("válv")
            .toggle_sort(SortColumn::Field(ColumnSlot::Field1));
        let result = query.run(&snapshot, &registry);

        assert_eq!(result.matched.len(), 12);
        let amounts: Vec<f64> = result
            .matched
            .iter()
            .filter_map(|r| r.value(amount).and_then(|v| v.as_number()))
            .collect();
        assert_eq!(amounts.first(), Some(&1.0));
        assert_eq!(amounts.last(), Some(&23.0));
        assert!(amounts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn rerunning_is_idempotent() {
        let (registry, _, snapshot) = setup();
        let query = ReportQuery::default().with_search("bomba").with_page(2);
        assert_eq!(query.run(&snapshot, &registry), query.run(&snapshot, &registry));
    }

    #[test]
    fn rows_resolve_names_and_placeholders() {
        let (registry, amount, snapshot) = setup();
        let columns = SelectedColumns {
            field2: Some(amount),
            ..SelectedColumns::default()
        };
        let result = ReportQuery::new(columns, 1).run(&snapshot, &registry);
        let rows = result.rows(&registry);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity, "Bomba");
        assert_eq!(rows[0].timestamp, "2024-03-25 08:00");
        assert_eq!(rows[0].columns, ["-".to_string(), "24".to_string(), "-".to_string()]);
    }
}
