use fieldlog_core::record::Record;

use crate::columns::{ColumnSlot, SelectedColumns};
use crate::registry::SchemaRegistry;

/// Keep the records containing `text`, case-insensitively, in input order.
/// Blank text keeps everything.
pub fn apply<'a, I>(
    records: I,
    text: &str,
    columns: &SelectedColumns,
    registry: &SchemaRegistry,
) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return records.into_iter().collect();
    }
    let kept: Vec<&Record> = records
        .into_iter()
        .filter(|r| matches(r, &needle, columns, registry))
        .collect();
    tracing::debug!(kept = kept.len(), "searched records");
    kept
}

/// `needle` must already be lowercase.
///
/// Looks at the entity name, the timestamp (formatted and ISO), the three
/// selected column values and every `"<field name>: <value>"` pair of the
/// record's data. Keys of deleted fields are searched with an empty name.
pub fn matches(
    record: &Record,
    needle: &str,
    columns: &SelectedColumns,
    registry: &SchemaRegistry,
) -> bool {
    if contains(registry.entity_name(record.entity_id), needle) {
        return true;
    }
    if contains(&record.timestamp.formatted(), needle)
        || contains(&record.timestamp.to_iso(), needle)
    {
        return true;
    }
    let column_hit = ColumnSlot::ALL
        .iter()
        .filter_map(|slot| columns.value(record, *slot))
        .any(|value| contains(&value.display(), needle));
    if column_hit {
        return true;
    }
    record.data.iter().any(|(field_id, value)| {
        let pair = format!("{}: {}", registry.field_name(*field_id), value.display());
        contains(&pair, needle)
    })
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
