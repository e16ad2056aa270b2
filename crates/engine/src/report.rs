//! Comparative reports: records grouped by entity or by the value of a
//! horizontal axis field, with one aggregate per requested field and group.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use fieldlog_core::{
    ids::*,
    record::{Record, RecordFilter},
    schema::{Field, FieldType},
};

use crate::error::ReportError;
use crate::filter;
use crate::registry::SchemaRegistry;
use crate::sort::compare_text;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AggregationType {
    #[default]
    Sum,
    Average,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(Self::Sum),
            "average" => Some(Self::Average),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRequest {
    pub field_ids: Vec<FieldId>,
    pub aggregation: AggregationType,
    pub filter: RecordFilter,
    /// Group by this field's values instead of by entity.
    pub horizontal_axis: Option<FieldId>,
}

impl ReportRequest {
    pub fn new(field_ids: Vec<FieldId>, aggregation: AggregationType) -> Self {
        Self {
            field_ids,
            aggregation,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn grouped_by(mut self, axis: Option<FieldId>) -> Self {
        self.horizontal_axis = axis;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Entity(EntityId),
    Value(String),
    /// Records without a value on the horizontal axis field.
    Missing,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::Value(value) => f.write_str(value),
            Self::Missing => f.write_str("__missing__"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionCount {
    pub option: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportGroup {
    pub key: GroupKey,
    pub label: String,
    pub record_count: usize,
    /// Number fields only. Zero when the group has no numeric values.
    pub value: Option<f64>,
    /// Number fields only. How many values in the group were numeric.
    pub value_count: usize,
    /// Select fields only: observed options in declaration order, then any
    /// values no longer among the options.
    pub option_counts: Option<Vec<OptionCount>>,
}

impl ReportGroup {
    pub fn count_of(&self, option: &str) -> usize {
        self.option_counts
            .iter()
            .flatten()
            .find(|c| c.option == option)
            .map_or(0, |c| c.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    pub field_id: FieldId,
    pub field: String,
    pub field_type: FieldType,
    pub aggregation_type: AggregationType,
    pub groups: Vec<ReportGroup>,
    /// Number fields: sum of every value, or mean of every value for averages.
    pub grand_total: Option<f64>,
    /// Select fields: per-option counts across all groups.
    pub option_totals: Option<Vec<OptionCount>>,
}

impl FieldReport {
    pub fn group(&self, key: &GroupKey) -> Option<&ReportGroup> {
        self.groups.iter().find(|g| &g.key == key)
    }

    pub fn group_by_label(&self, label: &str) -> Option<&ReportGroup> {
        self.groups.iter().find(|g| g.label == label)
    }
}

/// One panel per requested field, all over the same grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub fields: Vec<FieldReport>,
    pub record_count: usize,
    pub axis_field: Option<String>,
}

impl Report {
    pub fn field(&self, field_id: FieldId) -> Option<&FieldReport> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }
}

struct Bucket<'a> {
    key: GroupKey,
    label: String,
    records: Vec<&'a Record>,
}

/// Build the report over `snapshot`, narrowed by the request's filter.
///
/// Misuse (no fields, unknown fields, text fields) comes back as a
/// [`ReportError`]. An empty working set is a valid, all-zero report.
pub fn generate_report(
    snapshot: &[Record],
    registry: &SchemaRegistry,
    request: &ReportRequest,
) -> Result<Report, ReportError> {
    let fields = resolve_fields(registry, &request.field_ids)?;
    let axis = request
        .horizontal_axis
        .map(|id| registry.field(id).ok_or(ReportError::UnknownAxisField(id)))
        .transpose()?;

    let working = filter::apply(snapshot, &request.filter);
    let buckets = match axis {
        Some(axis) => group_by_axis(&working, axis, registry),
        None => group_by_entity(&working, registry),
    };

    let reports = fields
        .iter()
        .map(|field| aggregate_field(field, request.aggregation, &buckets))
        .collect();

    tracing::debug!(
        records = working.len(),
        groups = buckets.len(),
        fields = fields.len(),
        aggregation = request.aggregation.as_str(),
        "generated report"
    );

    Ok(Report {
        fields: reports,
        record_count: working.len(),
        axis_field: axis.map(|f| f.name.clone()),
    })
}

fn resolve_fields<'r>(
    registry: &'r SchemaRegistry,
    field_ids: &[FieldId],
) -> Result<Vec<&'r Field>, ReportError> {
    if field_ids.is_empty() {
        return Err(ReportError::NoFields);
    }
    field_ids
        .iter()
        .map(|id| {
            let field = registry.field(*id).ok_or(ReportError::UnknownField(*id))?;
            match field.field_type {
                FieldType::Number | FieldType::Select => Ok(field),
                FieldType::Text => Err(ReportError::UnsupportedFieldType {
                    field: field.name.clone(),
                    field_type: field.field_type,
                }),
            }
        })
        .collect()
}

fn push_into<'a>(
    buckets: &mut Vec<Bucket<'a>>,
    index: &mut HashMap<GroupKey, usize>,
    key: GroupKey,
    label: impl FnOnce() -> String,
    record: &'a Record,
) {
    let slot = *index.entry(key.clone()).or_insert_with(|| {
        buckets.push(Bucket {
            key,
            label: label(),
            records: Vec::new(),
        });
        buckets.len() - 1
    });
    buckets[slot].records.push(record);
}

/// Groups in registry order; records of deleted entities come last.
fn group_by_entity<'a>(records: &[&'a Record], registry: &SchemaRegistry) -> Vec<Bucket<'a>> {
    let mut buckets = Vec::new();
    let mut index = HashMap::new();
    for record in records {
        if registry.entity(record.entity_id).is_none() {
            tracing::warn!(entity = %record.entity_id, "record references unknown entity");
        }
        push_into(
            &mut buckets,
            &mut index,
            GroupKey::Entity(record.entity_id),
            || registry.entity_name(record.entity_id).to_string(),
            record,
        );
    }
    buckets.sort_by_key(|b| match b.key {
        GroupKey::Entity(id) => registry.entity_position(id).unwrap_or(usize::MAX),
        _ => usize::MAX,
    });
    buckets
}

/// Groups by the axis value. Select axes follow option order; other values
/// sort numerically when they can. The missing-value bucket comes last.
fn group_by_axis<'a>(
    records: &[&'a Record],
    axis: &Field,
    registry: &SchemaRegistry,
) -> Vec<Bucket<'a>> {
    let missing_label = &registry.labels().missing_value_label;
    let mut buckets = Vec::new();
    let mut index = HashMap::new();
    for record in records {
        match record.value(axis.id).filter(|v| !v.is_blank()) {
            Some(value) => {
                let text = value.display().into_owned();
                push_into(
                    &mut buckets,
                    &mut index,
                    GroupKey::Value(text.clone()),
                    || text,
                    record,
                );
            }
            None => push_into(
                &mut buckets,
                &mut index,
                GroupKey::Missing,
                || missing_label.clone(),
                record,
            ),
        }
    }

    let option_rank = |label: &str| axis.options.iter().position(|o| o == label);
    buckets.sort_by(|a, b| match (&a.key, &b.key) {
        (GroupKey::Missing, GroupKey::Missing) => Ordering::Equal,
        (GroupKey::Missing, _) => Ordering::Greater,
        (_, GroupKey::Missing) => Ordering::Less,
        _ => match (option_rank(&a.label), option_rank(&b.label)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => compare_text(&a.label, &b.label),
        },
    });
    buckets
}

fn aggregate_field(field: &Field, aggregation: AggregationType, buckets: &[Bucket<'_>]) -> FieldReport {
    match field.field_type {
        FieldType::Select => histogram_field(field, aggregation, buckets),
        _ => numeric_field(field, aggregation, buckets),
    }
}

fn numeric_field(field: &Field, aggregation: AggregationType, buckets: &[Bucket<'_>]) -> FieldReport {
    let mut total_sum = 0.0;
    let mut total_count = 0usize;
    let groups = buckets
        .iter()
        .map(|bucket| {
            let values: Vec<f64> = bucket
                .records
                .iter()
                .filter_map(|r| r.value(field.id))
                .filter_map(|v| v.as_number())
                .collect();
            let sum: f64 = values.iter().sum();
            total_sum += sum;
            total_count += values.len();
            ReportGroup {
                key: bucket.key.clone(),
                label: bucket.label.clone(),
                record_count: bucket.records.len(),
                value: Some(aggregate(aggregation, sum, values.len())),
                value_count: values.len(),
                option_counts: None,
            }
        })
        .collect();

    FieldReport {
        field_id: field.id,
        field: field.name.clone(),
        field_type: field.field_type,
        aggregation_type: aggregation,
        groups,
        grand_total: Some(aggregate(aggregation, total_sum, total_count)),
        option_totals: None,
    }
}

fn aggregate(aggregation: AggregationType, sum: f64, count: usize) -> f64 {
    match aggregation {
        AggregationType::Sum => sum,
        AggregationType::Average if count == 0 => 0.0,
        AggregationType::Average => sum / count as f64,
    }
}

/// Categorical data is counted whatever aggregation was asked for.
fn histogram_field(field: &Field, aggregation: AggregationType, buckets: &[Bucket<'_>]) -> FieldReport {
    let mut totals: Vec<OptionCount> = Vec::new();
    let groups = buckets
        .iter()
        .map(|bucket| {
            let mut counts: Vec<OptionCount> = Vec::new();
            for value in bucket.records.iter().filter_map(|r| r.value(field.id)) {
                if value.is_blank() {
                    continue;
                }
                let option = value.display();
                bump(&mut counts, &option);
                bump(&mut totals, &option);
            }
            order_options(&mut counts, &field.options);
            ReportGroup {
                key: bucket.key.clone(),
                label: bucket.label.clone(),
                record_count: bucket.records.len(),
                value: None,
                value_count: 0,
                option_counts: Some(counts),
            }
        })
        .collect();
    order_options(&mut totals, &field.options);

    FieldReport {
        field_id: field.id,
        field: field.name.clone(),
        field_type: field.field_type,
        aggregation_type: aggregation,
        groups,
        grand_total: None,
        option_totals: Some(totals),
    }
}

fn bump(counts: &mut Vec<OptionCount>, option: &str) {
    match counts.iter_mut().find(|c| c.option == option) {
        Some(c) => c.count += 1,
        None => counts.push(OptionCount {
            option: option.to_string(),
            count: 1,
        }),
    }
}

/// Declared options first, in declaration order, then stale values by name.
fn order_options(counts: &mut [OptionCount], options: &[String]) {
    counts.sort_by(|a, b| {
        let rank = |o: &str| options.iter().position(|x| x == o).unwrap_or(usize::MAX);
        rank(&a.option)
            .cmp(&rank(&b.option))
            .then_with(|| a.option.cmp(&b.option))
    });
}
