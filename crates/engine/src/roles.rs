//! Assignment of the mutually exclusive field roles: the three extra table
//! columns, the report's horizontal axis and its compare field.

use fieldlog_core::{
    ids::FieldId,
    schema::{RoleKind, RoleSlots},
};

use crate::error::EngineError;
use crate::registry::SchemaRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    pub kind: RoleKind,
    pub previous_owner: Option<FieldId>,
    pub new_owner: Option<FieldId>,
    /// The complete slot table after the change.
    pub slots: RoleSlots,
}

/// Compute the slot table that results from giving `kind` to `field_id`, or
/// from vacating it when `field_id` is `None`. Nothing is written.
pub fn plan(
    registry: &SchemaRegistry,
    kind: RoleKind,
    field_id: Option<FieldId>,
) -> Result<RoleChange, EngineError> {
    if let Some(id) = field_id {
        if registry.field(id).is_none() {
            return Err(EngineError::FieldNotFound(id.to_string()));
        }
    }
    let current = registry.slots();
    Ok(RoleChange {
        kind,
        previous_owner: current.get(kind),
        new_owner: field_id,
        slots: current.with(kind, field_id),
    })
}

/// Apply a role change to the registry in one step: the previous owner loses
/// the role in the same write that gives it to the new owner.
pub fn assign(
    registry: &mut SchemaRegistry,
    kind: RoleKind,
    field_id: Option<FieldId>,
) -> Result<RoleChange, EngineError> {
    let change = plan(registry, kind, field_id)?;
    registry.set_slots(change.slots);
    tracing::info!(
        role = kind.as_str(),
        previous = ?change.previous_owner,
        owner = ?change.new_owner,
        "assigned role"
    );
    Ok(change)
}
