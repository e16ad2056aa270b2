use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field_value::FieldValue;
use crate::ids::*;
use crate::timestamp::{Timestamp, normalize_date};

/// One timestamped observation of field values for an entity.
///
/// `data` keys normally belong to the entity's fields, but keys of fields
/// deleted later are kept; every reader must tolerate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entity_id: EntityId,
    pub data: BTreeMap<FieldId, FieldValue>,
    pub timestamp: Timestamp,
}

impl Record {
    pub fn new(
        entity_id: EntityId,
        data: BTreeMap<FieldId, FieldValue>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::new(),
            entity_id,
            data,
            timestamp,
        }
    }

    pub fn value(&self, field_id: FieldId) -> Option<&FieldValue> {
        self.data.get(&field_id)
    }
}

/// Entity membership and inclusive date bounds, both optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Empty means every entity.
    pub entity_ids: Vec<EntityId>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from raw date strings, normalizing them to calendar dates.
    pub fn parse(
        entity_ids: Vec<EntityId>,
        from_date: Option<&str>,
        to_date: Option<&str>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            entity_ids,
            from_date: parse_bound(from_date)?,
            to_date: parse_bound(to_date)?,
        })
    }

    pub fn entities(mut self, entity_ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.entity_ids = entity_ids.into_iter().collect();
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.to_date = Some(date);
        self
    }
}

fn parse_bound(bound: Option<&str>) -> Result<Option<NaiveDate>, CoreError> {
    bound
        .filter(|s| !s.trim().is_empty())
        .map(normalize_date)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_bounds_are_ignored() {
        let filter = RecordFilter::parse(vec![], Some(""), Some("  ")).unwrap();
        assert_eq!(filter, RecordFilter::new());
    }

    #[test]
    fn malformed_bound_is_an_input_error() {
        assert!(matches!(
            RecordFilter::parse(vec![], Some("01/02/2024"), None),
            Err(CoreError::InvalidDate(_))
        ));
    }
}
