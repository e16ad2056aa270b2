use std::collections::BTreeMap;
use std::path::PathBuf;

use fieldlog_core::{
    config::WorkspaceConfig,
    field_value::FieldValue,
    ids::*,
    record::Record,
    schema::{Entity, Field, FieldType},
    timestamp::Timestamp,
};
use fieldlog_engine::{EngineError, Workspace};
use fieldlog_storage::SqliteStorage;
use tempfile::TempDir;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Install a fmt subscriber honoring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A workspace plus shorthand for seeding schema and records.
pub struct TestSession {
    pub workspace: Workspace<SqliteStorage>,
    config: WorkspaceConfig,
    /// Present for file-backed sessions; the database lives inside it.
    dir: Option<TempDir>,
}

impl TestSession {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(WorkspaceConfig::default())
    }

    pub fn with_config(config: WorkspaceConfig) -> Result<Self, EngineError> {
        init_tracing();
        Ok(Self {
            workspace: Workspace::open_in_memory(config.clone())?,
            config,
            dir: None,
        })
    }

    /// A session backed by a database file in a temporary directory.
    pub fn on_disk() -> TestResult<Self> {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let config = WorkspaceConfig::default();
        let workspace = Workspace::open(&db_path(&dir)?, config.clone())?;
        Ok(Self {
            workspace,
            config,
            dir: Some(dir),
        })
    }

    /// Drop the workspace and open the same database again. In-memory
    /// sessions cannot be reopened.
    pub fn reopen(self) -> TestResult<Self> {
        let dir = self.dir.ok_or("in-memory sessions cannot be reopened")?;
        drop(self.workspace);
        let workspace = Workspace::open(&db_path(&dir)?, self.config.clone())?;
        Ok(Self {
            workspace,
            config: self.config,
            dir: Some(dir),
        })
    }

    pub fn text_field(&mut self, name: &str) -> Result<FieldId, EngineError> {
        self.workspace.create_field(Field::new(name, FieldType::Text))
    }

    pub fn number_field(&mut self, name: &str) -> Result<FieldId, EngineError> {
        self.workspace.create_field(Field::new(name, FieldType::Number))
    }

    pub fn select_field(&mut self, name: &str, options: &[&str]) -> Result<FieldId, EngineError> {
        self.workspace.create_field(Field::select(name, options))
    }

    pub fn entity(&mut self, name: &str, field_ids: &[FieldId]) -> Result<EntityId, EngineError> {
        self.workspace
            .create_entity(Entity::new(name, field_ids.to_vec()))
    }

    /// Log a record at `at`, which may be a bare date or a full timestamp.
    pub fn record(
        &mut self,
        entity_id: EntityId,
        at: &str,
        values: Vec<(FieldId, FieldValue)>,
    ) -> TestResult<Record> {
        let data: BTreeMap<FieldId, FieldValue> = values.into_iter().collect();
        Ok(self
            .workspace
            .create_record_at(entity_id, data, Timestamp::parse(at)?)?)
    }
}

fn db_path(dir: &TempDir) -> TestResult<String> {
    let path: PathBuf = dir.path().join("fieldlog.db");
    Ok(path.to_str().ok_or("temporary path is not valid UTF-8")?.to_string())
}
