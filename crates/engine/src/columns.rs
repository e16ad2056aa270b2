use fieldlog_core::{
    field_value::FieldValue,
    ids::FieldId,
    record::Record,
    schema::RoleSlots,
};

/// One of the three configurable table columns after entity and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnSlot {
    Field1,
    Field2,
    Field3,
}

impl ColumnSlot {
    pub const ALL: [ColumnSlot; 3] = [ColumnSlot::Field1, ColumnSlot::Field2, ColumnSlot::Field3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Field1 => "field1",
            Self::Field2 => "field2",
            Self::Field3 => "field3",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Field1 => 0,
            Self::Field2 => 1,
            Self::Field3 => 2,
        }
    }
}

/// Field ids feeding the three configurable columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectedColumns {
    pub field1: Option<FieldId>,
    pub field2: Option<FieldId>,
    pub field3: Option<FieldId>,
}

impl SelectedColumns {
    /// column3 feeds field1, column4 feeds field2, column5 feeds field3.
    pub fn from_slots(slots: &RoleSlots) -> Self {
        Self {
            field1: slots.column3,
            field2: slots.column4,
            field3: slots.column5,
        }
    }

    pub fn get(&self, slot: ColumnSlot) -> Option<FieldId> {
        match slot {
            ColumnSlot::Field1 => self.field1,
            ColumnSlot::Field2 => self.field2,
            ColumnSlot::Field3 => self.field3,
        }
    }

    /// The record's value for a column. Unassigned columns and absent keys
    /// both read as `None`.
    pub fn value<'r>(&self, record: &'r Record, slot: ColumnSlot) -> Option<&'r FieldValue> {
        self.get(slot).and_then(|id| record.value(id))
    }
}
