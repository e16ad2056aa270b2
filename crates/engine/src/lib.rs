pub mod columns;
pub mod error;
pub mod export;
pub mod filter;
pub mod paginate;
pub mod query;
pub mod registry;
pub mod report;
pub mod roles;
pub mod search;
pub mod sort;

pub use columns::{ColumnSlot, SelectedColumns};
pub use error::{EngineError, ReportError};
pub use paginate::Page;
pub use query::{QueryResult, ReportQuery, TableRow};
pub use registry::SchemaRegistry;
pub use report::{AggregationType, FieldReport, GroupKey, Report, ReportGroup, ReportRequest};
pub use roles::RoleChange;
pub use sort::{SortColumn, SortDirection, SortSpec};

use std::collections::BTreeMap;

use fieldlog_core::{
    config::WorkspaceConfig,
    field_value::FieldValue,
    ids::*,
    record::{Record, RecordFilter},
    schema::{Entity, Field, RoleKind},
    timestamp::Timestamp,
};
use fieldlog_storage::{RecordStore, SchemaStore, SqliteStorage};

/// One page of the record table, resolved for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    /// The query that produced the page, its page number corrected.
    pub query: ReportQuery,
    pub rows: Page<TableRow>,
}

/// A storage backend together with the schema registry loaded from it.
///
/// Schema and role changes are applied to a copy of the registry, written
/// through to storage, and only then swapped in, so a failed write leaves the
/// in-memory view as it was.
pub struct Workspace<S = SqliteStorage> {
    storage: S,
    registry: SchemaRegistry,
    config: WorkspaceConfig,
}

impl Workspace<SqliteStorage> {
    pub fn open(path: &str, config: WorkspaceConfig) -> Result<Self, EngineError> {
        Self::new(SqliteStorage::open(path)?, config)
    }

    pub fn open_in_memory(config: WorkspaceConfig) -> Result<Self, EngineError> {
        Self::new(SqliteStorage::open_in_memory()?, config)
    }
}

impl<S: SchemaStore + RecordStore> Workspace<S> {
    pub fn new(storage: S, config: WorkspaceConfig) -> Result<Self, EngineError> {
        let registry = SchemaRegistry::load(&storage, config.labels.clone())?;
        Ok(Self {
            storage,
            registry,
            config,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ========================================================================
    // Schema
    // ========================================================================

    pub fn create_field(&mut self, field: Field) -> Result<FieldId, EngineError> {
        let mut next = self.registry.clone();
        next.add_field(field.clone())?;
        self.storage.create_field(&field)?;
        self.registry = next;
        tracing::info!(field = %field.id, name = %field.name, "created field");
        Ok(field.id)
    }

    pub fn update_field(&mut self, field: Field) -> Result<(), EngineError> {
        let mut next = self.registry.clone();
        next.update_field(field.clone())?;
        self.storage.update_field(&field)?;
        self.registry = next;
        tracing::info!(field = %field.id, name = %field.name, "updated field");
        Ok(())
    }

    /// Remove the field from every entity and clear its roles. Values already
    /// logged for it stay in the records.
    pub fn delete_field(&mut self, field_id: FieldId) -> Result<Field, EngineError> {
        let mut next = self.registry.clone();
        let removed = next.remove_field(field_id)?;
        self.storage.delete_field(field_id)?;
        self.registry = next;
        tracing::info!(field = %field_id, name = %removed.name, "deleted field");
        Ok(removed)
    }

    pub fn create_entity(&mut self, entity: Entity) -> Result<EntityId, EngineError> {
        let mut next = self.registry.clone();
        next.add_entity(entity.clone())?;
        self.storage.create_entity(&entity)?;
        self.registry = next;
        tracing::info!(entity = %entity.id, name = %entity.name, "created entity");
        Ok(entity.id)
    }

    pub fn update_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        let mut next = self.registry.clone();
        next.update_entity(entity.clone())?;
        self.storage.update_entity(&entity)?;
        self.registry = next;
        tracing::info!(entity = %entity.id, name = %entity.name, "updated entity");
        Ok(())
    }

    /// Remove the entity definition. Its records remain and resolve to the
    /// unknown label from now on.
    pub fn delete_entity(&mut self, entity_id: EntityId) -> Result<Entity, EngineError> {
        let mut next = self.registry.clone();
        let removed = next.remove_entity(entity_id)?;
        self.storage.delete_entity(entity_id)?;
        self.registry = next;
        tracing::info!(entity = %entity_id, name = %removed.name, "deleted entity");
        Ok(removed)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Give `kind` to `field_id`, or vacate it with `None`. The previous owner
    /// loses the role in the same storage write.
    pub fn assign_role(
        &mut self,
        kind: RoleKind,
        field_id: Option<FieldId>,
    ) -> Result<RoleChange, EngineError> {
        let mut next = self.registry.clone();
        let change = roles::assign(&mut next, kind, field_id)?;
        self.storage.set_role_slots(&change.slots)?;
        self.registry = next;
        Ok(change)
    }

    pub fn selected_columns(&self) -> SelectedColumns {
        SelectedColumns::from_slots(self.registry.slots())
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Validate and store a record stamped with the current time.
    pub fn create_record(
        &mut self,
        entity_id: EntityId,
        data: BTreeMap<FieldId, FieldValue>,
    ) -> Result<Record, EngineError> {
        self.check_record(entity_id, &data)?;
        let record = self.storage.create_record(entity_id, data)?;
        tracing::info!(record = %record.id, entity = %entity_id, "created record");
        Ok(record)
    }

    /// Validate and store a record with an explicit timestamp.
    pub fn create_record_at(
        &mut self,
        entity_id: EntityId,
        data: BTreeMap<FieldId, FieldValue>,
        timestamp: Timestamp,
    ) -> Result<Record, EngineError> {
        self.check_record(entity_id, &data)?;
        let record = Record::new(entity_id, data, timestamp);
        self.storage.insert_record(&record)?;
        tracing::info!(record = %record.id, entity = %entity_id, "created record");
        Ok(record)
    }

    /// Coerce raw form input against the entity's fields, then create.
    pub fn create_record_from_input(
        &mut self,
        entity_id: EntityId,
        input: &[(FieldId, &str)],
    ) -> Result<Record, EngineError> {
        let data = self
            .registry
            .coerce_input(entity_id, input)
            .inspect_err(|e| tracing::warn!(entity = %entity_id, error = %e, "rejected record input"))?;
        self.create_record(entity_id, data)
    }

    /// Replace the data and timestamp of a record. Its entity never changes,
    /// and values it holds for deleted fields may be sent back unchanged.
    pub fn update_record(
        &mut self,
        record_id: RecordId,
        data: BTreeMap<FieldId, FieldValue>,
        timestamp: Timestamp,
    ) -> Result<Record, EngineError> {
        let existing = self.require_record(record_id)?;
        self.registry
            .validate_record_edit(&existing, &data)
            .inspect_err(|e| tracing::warn!(record = %record_id, error = %e, "rejected record edit"))?;
        let record = self.storage.update_record(record_id, data, timestamp)?;
        tracing::info!(record = %record_id, "updated record");
        Ok(record)
    }

    pub fn update_record_date(
        &mut self,
        record_id: RecordId,
        timestamp: Timestamp,
    ) -> Result<Record, EngineError> {
        self.require_record(record_id)?;
        let record = self.storage.update_record_date(record_id, timestamp)?;
        tracing::info!(record = %record_id, timestamp = %record.timestamp, "moved record");
        Ok(record)
    }

    pub fn delete_record(&mut self, record_id: RecordId) -> Result<(), EngineError> {
        self.require_record(record_id)?;
        self.storage.delete_record(record_id)?;
        tracing::info!(record = %record_id, "deleted record");
        Ok(())
    }

    pub fn get_record(&self, record_id: RecordId) -> Result<Option<Record>, EngineError> {
        Ok(self.storage.get_record(record_id)?)
    }

    /// The newest records, up to the configured limit.
    pub fn recent_records(&self) -> Result<Vec<Record>, EngineError> {
        Ok(self.storage.get_recent(self.config.recent_limit)?)
    }

    fn require_record(&self, record_id: RecordId) -> Result<Record, EngineError> {
        self.storage
            .get_record(record_id)?
            .ok_or_else(|| EngineError::RecordNotFound(record_id.to_string()))
    }

    fn check_record(
        &self,
        entity_id: EntityId,
        data: &BTreeMap<FieldId, FieldValue>,
    ) -> Result<(), EngineError> {
        self.registry
            .validate_record_data(entity_id, data)
            .inspect_err(|e| tracing::warn!(entity = %entity_id, error = %e, "rejected record"))
    }

    // ========================================================================
    // Queries and reports
    // ========================================================================

    /// Point-in-time read of the records passing `filter`, newest first.
    pub fn snapshot(&self, filter: &RecordFilter) -> Result<Vec<Record>, EngineError> {
        Ok(self.storage.filter_multiple(filter)?)
    }

    /// A fresh query over the current column assignment and page size.
    pub fn default_query(&self) -> ReportQuery {
        ReportQuery::new(self.selected_columns(), self.config.page_size)
    }

    /// Take one snapshot and run the whole table pipeline over it.
    pub fn run_query(&self, query: &ReportQuery) -> Result<TablePage, EngineError> {
        let snapshot = self.snapshot(&query.filter)?;
        let result = query.run(&snapshot, &self.registry);
        let columns = result.query.columns;
        let rows = result
            .page
            .map(|r| TableRow::from_record(r, &columns, &self.registry));
        Ok(TablePage {
            query: result.query,
            rows,
        })
    }

    /// Every record matching `query` in display order, as CSV-ready cells.
    pub fn export_rows(&self, query: &ReportQuery) -> Result<Vec<Vec<String>>, EngineError> {
        let snapshot = self.snapshot(&query.filter)?;
        let result = query.run(&snapshot, &self.registry);
        Ok(export::export_rows(
            &result.matched,
            &query.columns,
            &self.registry,
        ))
    }

    /// The report the role slots describe: the compare field, grouped by the
    /// horizontal axis when one is assigned. `None` without a compare field.
    pub fn default_report_request(&self, aggregation: AggregationType) -> Option<ReportRequest> {
        let slots = self.registry.slots();
        let compare = slots.compare_field?;
        Some(ReportRequest::new(vec![compare], aggregation).grouped_by(slots.horizontal_axis))
    }

    pub fn generate_report(&self, request: &ReportRequest) -> Result<Report, EngineError> {
        let snapshot = self.snapshot(&request.filter)?;
        Ok(report::generate_report(&snapshot, &self.registry, request)?)
    }
}
