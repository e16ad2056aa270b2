use fieldlog_core::record::{Record, RecordFilter};

/// Keep the records that pass the entity and date criteria, in input order.
pub fn apply<'a, I>(records: I, filter: &RecordFilter) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let kept: Vec<&Record> = records.into_iter().filter(|r| matches(filter, r)).collect();
    tracing::debug!(kept = kept.len(), "filtered records");
    kept
}

/// An empty entity list admits every entity. Date bounds are inclusive and
/// compare the calendar date of the timestamp.
pub fn matches(filter: &RecordFilter, record: &Record) -> bool {
    if !filter.entity_ids.is_empty() && !filter.entity_ids.contains(&record.entity_id) {
        return false;
    }
    let date = record.timestamp.date();
    if filter.from_date.is_some_and(|from| date < from) {
        return false;
    }
    if filter.to_date.is_some_and(|to| date > to) {
        return false;
    }
    true
}
