use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("config error: {0}")]
    Config(String),
}
