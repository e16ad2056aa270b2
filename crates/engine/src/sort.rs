use std::cmp::Ordering;

use fieldlog_core::{
    field_value::{FieldValue, parse_finite},
    record::Record,
};

use crate::columns::{ColumnSlot, SelectedColumns};
use crate::registry::SchemaRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Entity,
    Timestamp,
    Field(ColumnSlot),
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Timestamp => "timestamp",
            Self::Field(slot) => slot.as_str(),
        }
    }

    /// Unrecognized names yield `None`, which sorts with the fallback order.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entity" => Some(Self::Entity),
            "timestamp" => Some(Self::Timestamp),
            "field1" => Some(Self::Field(ColumnSlot::Field1)),
            "field2" => Some(Self::Field(ColumnSlot::Field2)),
            "field3" => Some(Self::Field(ColumnSlot::Field3)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Column and direction. Without a column, records sort newest first and the
/// direction is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub column: Option<SortColumn>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self {
            column: Some(column),
            direction,
        }
    }

    /// Build from raw names as they arrive from a table header.
    pub fn parse(column: &str, direction: &str) -> Self {
        Self {
            column: SortColumn::parse(column),
            direction: SortDirection::parse(direction).unwrap_or_default(),
        }
    }
}

pub fn compare(
    a: &Record,
    b: &Record,
    spec: &SortSpec,
    columns: &SelectedColumns,
    registry: &SchemaRegistry,
) -> Ordering {
    let ordering = match spec.column {
        Some(SortColumn::Entity) => compare_text_insensitive(
            registry.entity_name(a.entity_id),
            registry.entity_name(b.entity_id),
        ),
        Some(SortColumn::Timestamp) => a.timestamp.epoch_millis().cmp(&b.timestamp.epoch_millis()),
        Some(SortColumn::Field(slot)) => {
            compare_values(columns.value(a, slot), columns.value(b, slot))
        }
        None => return b.timestamp.epoch_millis().cmp(&a.timestamp.epoch_millis()),
    };
    spec.direction.apply(ordering)
}

/// Stable sort; records that compare equal keep their input order.
pub fn sort(
    records: &mut [&Record],
    spec: &SortSpec,
    columns: &SelectedColumns,
    registry: &SchemaRegistry,
) {
    records.sort_by(|a, b| compare(a, b, spec, columns, registry));
}

/// Missing values read as the empty string.
pub fn compare_values(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    let a = a.map(|v| v.display()).unwrap_or_default();
    let b = b.map(|v| v.display()).unwrap_or_default();
    compare_text(&a, &b)
}

/// Numeric when both sides parse as finite numbers, otherwise a
/// case-insensitive string comparison. Mixed pairs rank empty text first,
/// then numbers, then other text, which keeps the order total.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    match (parse_finite(a), parse_finite(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) | (None, Some(_)) => text_rank(a).cmp(&text_rank(b)),
        (None, None) => compare_text_insensitive(a, b),
    }
}

fn text_rank(s: &str) -> u8 {
    if s.is_empty() {
        0
    } else if parse_finite(s).is_some() {
        1
    } else {
        2
    }
}

fn compare_text_insensitive(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
