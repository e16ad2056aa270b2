use std::collections::{BTreeMap, HashSet};

use fieldlog_core::{
    config::Labels,
    field_value::FieldValue,
    ids::*,
    record::Record,
    schema::{Entity, Field, RoleSlots},
};
use fieldlog_storage::{SchemaStore, StorageError};

use crate::error::EngineError;

/// In-memory view of every entity and field definition plus the role slots.
///
/// Mutations check the schema invariants before touching anything, so a
/// failed call leaves the registry unchanged. Lookups never fail: dangling
/// ids resolve to the configured placeholders.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    slots: RoleSlots,
    labels: Labels,
}

impl SchemaRegistry {
    pub fn new(labels: Labels) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    pub fn load<S: SchemaStore>(store: &S, labels: Labels) -> Result<Self, StorageError> {
        let registry = Self {
            entities: store.get_all_entities()?,
            fields: store.get_all_fields()?,
            slots: store.get_role_slots()?,
            labels,
        };
        tracing::debug!(
            entities = registry.entities.len(),
            fields = registry.fields.len(),
            "loaded schema"
        );
        Ok(registry)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn slots(&self) -> &RoleSlots {
        &self.slots
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn entity(&self, entity_id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == entity_id)
    }

    pub fn field(&self, field_id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    /// Position of the entity in creation order, used to order report groups.
    pub fn entity_position(&self, entity_id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| e.id == entity_id)
    }

    /// Name of the entity, or the unknown label for dangling ids.
    pub fn entity_name(&self, entity_id: EntityId) -> &str {
        self.entity(entity_id)
            .map(|e| e.name.as_str())
            .unwrap_or(&self.labels.unknown_label)
    }

    /// Name of the field, or an empty string for dangling ids.
    pub fn field_name(&self, field_id: FieldId) -> &str {
        self.field(field_id).map(|f| f.name.as_str()).unwrap_or("")
    }

    /// The entity's fields in form order. Ids of deleted fields are skipped.
    pub fn fields_of(&self, entity_id: EntityId) -> Vec<&Field> {
        self.entity(entity_id)
            .map(|e| e.field_ids.iter().filter_map(|id| self.field(*id)).collect())
            .unwrap_or_default()
    }

    /// Entities bucketed by group in first-seen order; ungrouped entities last.
    pub fn entities_by_group(&self) -> Vec<(Option<&str>, Vec<&Entity>)> {
        let mut groups: Vec<(Option<&str>, Vec<&Entity>)> = Vec::new();
        let mut ungrouped = Vec::new();
        for entity in &self.entities {
            match entity.group.as_deref().filter(|g| !g.trim().is_empty()) {
                Some(group) => match groups.iter().position(|(g, _)| *g == Some(group)) {
                    Some(index) => groups[index].1.push(entity),
                    None => groups.push((Some(group), vec![entity])),
                },
                None => ungrouped.push(entity),
            }
        }
        if !ungrouped.is_empty() {
            groups.push((None, ungrouped));
        }
        groups
    }

    /// Turn raw form input for an entity into typed record data. Blank input is
    /// left out; the record validator decides whether that is acceptable.
    pub fn coerce_input(
        &self,
        entity_id: EntityId,
        input: &[(FieldId, &str)],
    ) -> Result<BTreeMap<FieldId, FieldValue>, EngineError> {
        let entity = self
            .entity(entity_id)
            .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;
        let mut data = BTreeMap::new();
        for (field_id, raw) in input {
            if !entity.has_field(*field_id) {
                return Err(EngineError::InvalidRecord(format!(
                    "field {field_id} does not belong to entity '{}'",
                    entity.name
                )));
            }
            let field = self
                .field(*field_id)
                .ok_or_else(|| EngineError::FieldNotFound(field_id.to_string()))?;
            if raw.trim().is_empty() {
                continue;
            }
            let value = field
                .coerce(raw)
                .map_err(|e| EngineError::InvalidRecord(e.to_string()))?;
            data.insert(*field_id, value);
        }
        Ok(data)
    }

    /// Check record data against the entity's current definition.
    pub fn validate_record_data(
        &self,
        entity_id: EntityId,
        data: &BTreeMap<FieldId, FieldValue>,
    ) -> Result<(), EngineError> {
        self.check_record_data(entity_id, data, |_| false)
    }

    /// Check edited data for an existing record. Values the record already
    /// held for fields deleted since then may stay; keys of live fields
    /// outside the entity are still rejected.
    pub fn validate_record_edit(
        &self,
        existing: &Record,
        data: &BTreeMap<FieldId, FieldValue>,
    ) -> Result<(), EngineError> {
        self.check_record_data(existing.entity_id, data, |field_id| {
            self.field(field_id).is_none() && existing.data.contains_key(&field_id)
        })
    }

    fn check_record_data(
        &self,
        entity_id: EntityId,
        data: &BTreeMap<FieldId, FieldValue>,
        orphan_kept: impl Fn(FieldId) -> bool,
    ) -> Result<(), EngineError> {
        let entity = self
            .entity(entity_id)
            .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;
        for (field_id, value) in data {
            if !entity.has_field(*field_id) {
                if orphan_kept(*field_id) {
                    continue;
                }
                return Err(EngineError::InvalidRecord(format!(
                    "field {field_id} does not belong to entity '{}'",
                    entity.name
                )));
            }
            if let Some(field) = self.field(*field_id) {
                field
                    .check_value(value)
                    .map_err(|e| EngineError::InvalidRecord(e.to_string()))?;
            }
        }
        for field in self.fields_of(entity_id) {
            let present = data.get(&field.id).is_some_and(|v| !v.is_blank());
            if field.required && !present {
                return Err(EngineError::InvalidRecord(format!(
                    "required field '{}' is missing",
                    field.name
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn add_field(&mut self, field: Field) -> Result<(), EngineError> {
        field.validate()?;
        if self.field(field.id).is_some() {
            return Err(EngineError::InvalidSchema(format!(
                "field already exists: {}",
                field.id
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn update_field(&mut self, field: Field) -> Result<(), EngineError> {
        field.validate()?;
        let slot = self
            .fields
            .iter_mut()
            .find(|f| f.id == field.id)
            .ok_or_else(|| EngineError::FieldNotFound(field.id.to_string()))?;
        *slot = field;
        Ok(())
    }

    /// Remove a field from the registry, from every entity and from every role
    /// it holds. Records keep their values for it.
    pub fn remove_field(&mut self, field_id: FieldId) -> Result<Field, EngineError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.id == field_id)
            .ok_or_else(|| EngineError::FieldNotFound(field_id.to_string()))?;
        let field = self.fields.remove(index);
        for entity in &mut self.entities {
            entity.field_ids.retain(|id| *id != field_id);
        }
        self.slots = self.slots.without_field(field_id);
        Ok(field)
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        self.check_entity(&entity)?;
        if self.entity(entity.id).is_some() {
            return Err(EngineError::InvalidSchema(format!(
                "entity already exists: {}",
                entity.id
            )));
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn update_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        self.check_entity(&entity)?;
        let slot = self
            .entities
            .iter_mut()
            .find(|e| e.id == entity.id)
            .ok_or_else(|| EngineError::EntityNotFound(entity.id.to_string()))?;
        *slot = entity;
        Ok(())
    }

    pub fn remove_entity(&mut self, entity_id: EntityId) -> Result<Entity, EngineError> {
        let index = self
            .entities
            .iter()
            .position(|e| e.id == entity_id)
            .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;
        Ok(self.entities.remove(index))
    }

    pub(crate) fn set_slots(&mut self, slots: RoleSlots) {
        self.slots = slots;
    }

    fn check_entity(&self, entity: &Entity) -> Result<(), EngineError> {
        if entity.name.trim().is_empty() {
            return Err(EngineError::InvalidSchema("entity name is empty".into()));
        }
        let mut seen = HashSet::new();
        for field_id in &entity.field_ids {
            if self.field(*field_id).is_none() {
                return Err(EngineError::FieldNotFound(field_id.to_string()));
            }
            if !seen.insert(field_id) {
                return Err(EngineError::InvalidSchema(format!(
                    "field {field_id} listed twice on entity '{}'",
                    entity.name
                )));
            }
        }
        Ok(())
    }
}
