use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS fields (
    rowid INTEGER PRIMARY KEY,
    field_id BLOB NOT NULL UNIQUE CHECK (length(field_id) = 16),
    name TEXT NOT NULL,
    field_type TEXT NOT NULL CHECK (field_type IN ('text', 'number', 'select')),
    required INTEGER NOT NULL DEFAULT 0,
    options BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS entities (
    rowid INTEGER PRIMARY KEY,
    entity_id BLOB NOT NULL UNIQUE CHECK (length(entity_id) = 16),
    name TEXT NOT NULL,
    entity_group TEXT
);

CREATE TABLE IF NOT EXISTS entity_fields (
    entity_id BLOB NOT NULL CHECK (length(entity_id) = 16),
    position INTEGER NOT NULL,
    field_id BLOB NOT NULL CHECK (length(field_id) = 16),
    PRIMARY KEY (entity_id, position)
);
CREATE INDEX IF NOT EXISTS idx_entity_fields_field ON entity_fields (field_id);

CREATE TABLE IF NOT EXISTS role_slots (
    role TEXT PRIMARY KEY CHECK (role IN ('column3', 'column4', 'column5', 'horizontalAxis', 'compareField')),
    field_id BLOB NOT NULL CHECK (length(field_id) = 16)
);

CREATE TABLE IF NOT EXISTS records (
    rowid INTEGER PRIMARY KEY,
    record_id BLOB NOT NULL UNIQUE CHECK (length(record_id) = 16),
    entity_id BLOB NOT NULL CHECK (length(entity_id) = 16),
    data BLOB NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records (timestamp);
CREATE INDEX IF NOT EXISTS idx_records_entity ON records (entity_id, timestamp);
";
