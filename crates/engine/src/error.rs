use fieldlog_core::{CoreError, FieldId, FieldType};
use fieldlog_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// Expected misuse of the report generator. Returned, never panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("no fields selected for the report")]
    NoFields,

    #[error("unknown field: {0}")]
    UnknownField(FieldId),

    #[error("unknown horizontal axis field: {0}")]
    UnknownAxisField(FieldId),

    #[error("field '{field}' of type {} cannot be aggregated", .field_type.as_str())]
    UnsupportedFieldType { field: String, field_type: FieldType },
}
