pub mod config;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod record;
pub mod schema;
pub mod timestamp;

pub use config::{Labels, WorkspaceConfig};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use record::{Record, RecordFilter};
pub use schema::{Entity, Field, FieldType, RoleKind, RoleSlots};
pub use timestamp::Timestamp;
