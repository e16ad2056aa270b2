use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// User-facing wording. Never consulted by filtering, sorting or aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Labels {
    pub entity_name: String,
    pub record_name: String,
    pub title: String,
    pub description: String,
    /// Header of the timestamp column.
    pub date_label: String,
    /// Shown for references to entities or fields that no longer exist.
    pub unknown_label: String,
    /// Group label for records without a value on the horizontal axis field.
    pub missing_value_label: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            entity_name: "Entidad".into(),
            record_name: "Registro".into(),
            title: "Registros".into(),
            description: String::new(),
            date_label: "Fecha".into(),
            unknown_label: "Desconocido".into(),
            missing_value_label: "Sin valor".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub labels: Labels,
    pub page_size: usize,
    pub recent_limit: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            labels: Labels::default(),
            page_size: DEFAULT_PAGE_SIZE,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

impl WorkspaceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::Config(e.to_string()))?;
        if config.page_size == 0 {
            return Err(CoreError::Config("pageSize must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}
