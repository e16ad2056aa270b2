use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field_value::{FieldValue, parse_finite};
use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Number,
    Select,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "select" => Ok(Self::Select),
            _ => Err(CoreError::InvalidField(format!("unknown field type: {s}"))),
        }
    }
}

/// A user-defined typed attribute. Role assignments are not stored here; see
/// [`RoleSlots`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Allowed values, in display order. Non-empty iff `field_type` is `Select`.
    pub options: Vec<String>,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            id: FieldId::new(),
            name: name.to_string(),
            field_type,
            required: false,
            options: Vec::new(),
        }
    }

    pub fn select(name: &str, options: &[&str]) -> Self {
        Self {
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Self::new(name, FieldType::Select)
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidField("field name is empty".into()));
        }
        match self.field_type {
            FieldType::Select if self.options.is_empty() => Err(CoreError::InvalidField(
                format!("select field '{}' has no options", self.name),
            )),
            FieldType::Select => Ok(()),
            _ if !self.options.is_empty() => Err(CoreError::InvalidField(format!(
                "{} field '{}' cannot carry options",
                self.field_type.as_str(),
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// Turn raw form input into a typed value for this field.
    pub fn coerce(&self, raw: &str) -> Result<FieldValue, CoreError> {
        match self.field_type {
            FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldType::Number => parse_finite(raw)
                .map(FieldValue::Number)
                .ok_or_else(|| self.invalid_value(format!("'{raw}' is not a number"))),
            FieldType::Select => {
                if self.options.iter().any(|o| o == raw) {
                    Ok(FieldValue::Option(raw.to_string()))
                } else {
                    Err(self.invalid_value(format!("'{raw}' is not one of the options")))
                }
            }
        }
    }

    /// Check that an already-typed value fits this field.
    pub fn check_value(&self, value: &FieldValue) -> Result<(), CoreError> {
        match (self.field_type, value) {
            (FieldType::Text, FieldValue::Text(_)) => Ok(()),
            (FieldType::Number, FieldValue::Number(n)) if n.is_finite() => Ok(()),
            (FieldType::Number, FieldValue::Number(_)) => {
                Err(self.invalid_value("number is not finite".into()))
            }
            (FieldType::Select, FieldValue::Option(o)) if self.options.contains(o) => Ok(()),
            (FieldType::Select, FieldValue::Option(o)) => {
                Err(self.invalid_value(format!("'{o}' is not one of the options")))
            }
            (expected, _) => Err(self.invalid_value(format!(
                "expected a {} value",
                expected.as_str()
            ))),
        }
    }

    fn invalid_value(&self, reason: String) -> CoreError {
        CoreError::InvalidValue {
            field: self.name.clone(),
            reason,
        }
    }
}

/// A user-defined category of tracked subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub group: Option<String>,
    /// Determines form and report field order.
    pub field_ids: Vec<FieldId>,
}

impl Entity {
    pub fn new(name: &str, field_ids: Vec<FieldId>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.to_string(),
            group: None,
            field_ids,
        }
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn has_field(&self, field_id: FieldId) -> bool {
        self.field_ids.contains(&field_id)
    }
}

/// The five mutually exclusive roles a field can be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Column3,
    Column4,
    Column5,
    HorizontalAxis,
    CompareField,
}

impl RoleKind {
    pub const ALL: [RoleKind; 5] = [
        RoleKind::Column3,
        RoleKind::Column4,
        RoleKind::Column5,
        RoleKind::HorizontalAxis,
        RoleKind::CompareField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Column3 => "column3",
            Self::Column4 => "column4",
            Self::Column5 => "column5",
            Self::HorizontalAxis => "horizontalAxis",
            Self::CompareField => "compareField",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::InvalidField(format!("unknown role: {s}")))
    }

    /// Display roles pick a table column; report roles drive comparisons.
    pub fn is_display(&self) -> bool {
        matches!(self, Self::Column3 | Self::Column4 | Self::Column5)
    }
}

/// Which field currently owns each role. One slot per role makes "at most one
/// owner" structural.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlots {
    pub column3: Option<FieldId>,
    pub column4: Option<FieldId>,
    pub column5: Option<FieldId>,
    pub horizontal_axis: Option<FieldId>,
    pub compare_field: Option<FieldId>,
}

impl RoleSlots {
    pub fn get(&self, kind: RoleKind) -> Option<FieldId> {
        match kind {
            RoleKind::Column3 => self.column3,
            RoleKind::Column4 => self.column4,
            RoleKind::Column5 => self.column5,
            RoleKind::HorizontalAxis => self.horizontal_axis,
            RoleKind::CompareField => self.compare_field,
        }
    }

    fn slot_mut(&mut self, kind: RoleKind) -> &mut Option<FieldId> {
        match kind {
            RoleKind::Column3 => &mut self.column3,
            RoleKind::Column4 => &mut self.column4,
            RoleKind::Column5 => &mut self.column5,
            RoleKind::HorizontalAxis => &mut self.horizontal_axis,
            RoleKind::CompareField => &mut self.compare_field,
        }
    }

    /// Return a copy with `kind` owned by `field_id` (or vacated for `None`).
    ///
    /// A field holds at most one display role and one report role, so any
    /// other slot of the same kind that `field_id` held is vacated as well.
    pub fn with(&self, kind: RoleKind, field_id: Option<FieldId>) -> Self {
        let mut next = *self;
        if let Some(id) = field_id {
            for other in RoleKind::ALL {
                if other != kind && other.is_display() == kind.is_display() {
                    let slot = next.slot_mut(other);
                    if *slot == Some(id) {
                        *slot = None;
                    }
                }
            }
        }
        *next.slot_mut(kind) = field_id;
        next
    }

    /// Return a copy with every slot owned by `field_id` vacated.
    pub fn without_field(&self, field_id: FieldId) -> Self {
        let mut next = *self;
        for kind in RoleKind::ALL {
            let slot = next.slot_mut(kind);
            if *slot == Some(field_id) {
                *slot = None;
            }
        }
        next
    }

    pub fn display_role_of(&self, field_id: FieldId) -> Option<RoleKind> {
        RoleKind::ALL
            .into_iter()
            .filter(RoleKind::is_display)
            .find(|kind| self.get(*kind) == Some(field_id))
    }

    pub fn report_role_of(&self, field_id: FieldId) -> Option<RoleKind> {
        RoleKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_display())
            .find(|kind| self.get(*kind) == Some(field_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoleKind, FieldId)> + '_ {
        RoleKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|id| (kind, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_without_options_is_invalid() {
        let field = Field::select("Estado", &[]);
        assert!(matches!(field.validate(), Err(CoreError::InvalidField(_))));
        assert!(Field::select("Estado", &["A"]).validate().is_ok());
    }

    #[test]
    fn options_on_non_select_are_invalid() {
        let mut field = Field::new("Horas", FieldType::Number);
        field.options = vec!["x".into()];
        assert!(field.validate().is_err());
    }

    #[test]
    fn coerce_by_type() {
        let n = Field::new("Horas", FieldType::Number);
        assert_eq!(n.coerce("4.5").unwrap(), FieldValue::Number(4.5));
        assert!(n.coerce("four").is_err());

        let s = Field::select("Estado", &["OK", "KO"]);
        assert_eq!(s.coerce("KO").unwrap(), FieldValue::Option("KO".into()));
        assert!(s.coerce("ok").is_err());

        let t = Field::new("Nota", FieldType::Text);
        assert_eq!(t.coerce("hola").unwrap(), FieldValue::Text("hola".into()));
    }

    #[test]
    fn check_value_rejects_mismatched_variant() {
        let n = Field::new("Horas", FieldType::Number);
        assert!(n.check_value(&FieldValue::Text("3".into())).is_err());
        assert!(n.check_value(&FieldValue::Number(f64::INFINITY)).is_err());
        assert!(n.check_value(&FieldValue::Number(3.0)).is_ok());
    }

    #[test]
    fn role_kind_names_round_trip() {
        for kind in RoleKind::ALL {
            assert_eq!(RoleKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(RoleKind::parse("column6").is_err());
    }

    #[test]
    fn assigning_a_slot_replaces_its_owner() {
        let x = FieldId::new();
        let y = FieldId::new();
        let slots = RoleSlots::default().with(RoleKind::Column3, Some(x));
        let slots = slots.with(RoleKind::Column3, Some(y));
        assert_eq!(slots.column3, Some(y));
        assert_eq!(slots.display_role_of(x), None);
    }

    #[test]
    fn field_moves_between_display_slots() {
        let x = FieldId::new();
        let slots = RoleSlots::default()
            .with(RoleKind::Column3, Some(x))
            .with(RoleKind::HorizontalAxis, Some(x))
            .with(RoleKind::Column5, Some(x));
        assert_eq!(slots.column3, None);
        assert_eq!(slots.column5, Some(x));
        // report role is independent of the display role
        assert_eq!(slots.horizontal_axis, Some(x));
    }

    #[test]
    fn clearing_and_removing_fields() {
        let x = FieldId::new();
        let y = FieldId::new();
        let slots = RoleSlots::default()
            .with(RoleKind::Column4, Some(x))
            .with(RoleKind::CompareField, Some(x))
            .with(RoleKind::HorizontalAxis, Some(y));
        let cleared = slots.with(RoleKind::Column4, None);
        assert_eq!(cleared.column4, None);
        assert_eq!(cleared.compare_field, Some(x));

        let removed = slots.without_field(x);
        assert_eq!(removed.iter().collect::<Vec<_>>(), vec![(RoleKind::HorizontalAxis, y)]);
    }
}
