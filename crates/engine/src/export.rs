use fieldlog_core::record::Record;

use crate::columns::{ColumnSlot, SelectedColumns};
use crate::query::{EMPTY_CELL, TableRow};
use crate::registry::SchemaRegistry;

/// Text cells for the CSV sink: a header row, then one row per record in the
/// order given. Column headers are the assigned fields' names.
pub fn export_rows(
    records: &[&Record],
    columns: &SelectedColumns,
    registry: &SchemaRegistry,
) -> Vec<Vec<String>> {
    let labels = registry.labels();
    let mut header = vec![labels.entity_name.clone(), labels.date_label.clone()];
    header.extend(ColumnSlot::ALL.iter().map(|slot| match columns.get(*slot) {
        Some(id) if registry.field(id).is_some() => registry.field_name(id).to_string(),
        Some(_) => labels.unknown_label.clone(),
        None => EMPTY_CELL.to_string(),
    }));

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header);
    rows.extend(records.iter().map(|r| {
        let TableRow {
            entity,
            timestamp,
            columns: cells,
            ..
        } = TableRow::from_record(r, columns, registry);
        let mut row = vec![entity, timestamp];
        row.extend(cells);
        row
    }));
    tracing::debug!(records = records.len(), "exported rows");
    rows
}
