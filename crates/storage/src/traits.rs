use std::collections::BTreeMap;

use fieldlog_core::{
    field_value::FieldValue,
    ids::*,
    record::{Record, RecordFilter},
    schema::{Entity, Field, RoleSlots},
    timestamp::Timestamp,
};

use crate::error::StorageError;

/// Persistence of entity and field definitions and of the role slots.
///
/// Returned values are copies; mutating them has no effect on the store.
pub trait SchemaStore {
    /// All entities in creation order.
    fn get_all_entities(&self) -> Result<Vec<Entity>, StorageError>;

    fn get_entity(&self, entity_id: EntityId) -> Result<Option<Entity>, StorageError>;

    /// All fields in creation order.
    fn get_all_fields(&self) -> Result<Vec<Field>, StorageError>;

    fn get_field(&self, field_id: FieldId) -> Result<Option<Field>, StorageError>;

    /// Fields in the order of `field_ids`. Unknown ids are skipped.
    fn get_fields_by_ids(&self, field_ids: &[FieldId]) -> Result<Vec<Field>, StorageError>;

    fn create_field(&mut self, field: &Field) -> Result<(), StorageError>;

    fn update_field(&mut self, field: &Field) -> Result<(), StorageError>;

    /// Removes the field, its entity memberships and any role it holds in one
    /// transaction. Record data is left alone.
    fn delete_field(&mut self, field_id: FieldId) -> Result<(), StorageError>;

    fn create_entity(&mut self, entity: &Entity) -> Result<(), StorageError>;

    fn update_entity(&mut self, entity: &Entity) -> Result<(), StorageError>;

    /// Removes the entity definition. Its records are left alone.
    fn delete_entity(&mut self, entity_id: EntityId) -> Result<(), StorageError>;

    fn get_role_slots(&self) -> Result<RoleSlots, StorageError>;

    /// Replace every role assignment at once.
    fn set_role_slots(&mut self, slots: &RoleSlots) -> Result<(), StorageError>;
}

/// Persistence of records. Reads return point-in-time snapshots, newest first.
pub trait RecordStore {
    fn filter_multiple(&self, filter: &RecordFilter) -> Result<Vec<Record>, StorageError>;

    fn get_recent(&self, limit: usize) -> Result<Vec<Record>, StorageError>;

    fn get_record(&self, record_id: RecordId) -> Result<Option<Record>, StorageError>;

    /// Store a new record stamped with the current time.
    fn create_record(
        &mut self,
        entity_id: EntityId,
        data: BTreeMap<FieldId, FieldValue>,
    ) -> Result<Record, StorageError>;

    /// Store a fully formed record, keeping its id and timestamp.
    fn insert_record(&mut self, record: &Record) -> Result<(), StorageError>;

    fn update_record(
        &mut self,
        record_id: RecordId,
        data: BTreeMap<FieldId, FieldValue>,
        timestamp: Timestamp,
    ) -> Result<Record, StorageError>;

    fn update_record_date(
        &mut self,
        record_id: RecordId,
        timestamp: Timestamp,
    ) -> Result<Record, StorageError>;

    fn delete_record(&mut self, record_id: RecordId) -> Result<(), StorageError>;

    fn record_count(&self) -> Result<u64, StorageError>;
}
