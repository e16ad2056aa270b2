use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, types::Value};

use fieldlog_core::{
    field_value::FieldValue,
    ids::*,
    record::{Record, RecordFilter},
    schema::{Entity, Field, FieldType, RoleKind, RoleSlots},
    timestamp::Timestamp,
};

use crate::error::StorageError;
use crate::traits::{RecordStore, SchemaStore};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

const RECORD_COLUMNS: &str = "record_id, entity_id, data, timestamp";

type RawRecord = (Vec<u8>, Vec<u8>, Vec<u8>, String);
type RawField = (Vec<u8>, String, String, bool, Vec<u8>);
type RawEntity = (Vec<u8>, String, Option<String>);

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        tracing::debug!(path, "opened record database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_records(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Record>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<RawRecord>, _>>()?;
        rows.into_iter().map(read_record).collect()
    }

    fn load_field_ids(&self, entity_id: &[u8]) -> Result<Vec<FieldId>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT field_id FROM entity_fields WHERE entity_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![entity_id], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|bytes| Ok(FieldId::from_bytes(to_array::<16>(bytes, "field_id")?)))
            .collect()
    }

    fn read_entity(
        &self,
        (id_bytes, name, group): RawEntity,
    ) -> Result<Entity, StorageError> {
        let field_ids = self.load_field_ids(&id_bytes)?;
        Ok(Entity {
            id: EntityId::from_bytes(to_array::<16>(id_bytes, "entity_id")?),
            name,
            group,
            field_ids,
        })
    }
}

fn read_record((record_id, entity_id, data, timestamp): RawRecord) -> Result<Record, StorageError> {
    let data: BTreeMap<FieldId, FieldValue> =
        rmp_serde::from_slice(&data).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(Record {
        id: RecordId::from_bytes(to_array::<16>(record_id, "record_id")?),
        entity_id: EntityId::from_bytes(to_array::<16>(entity_id, "entity_id")?),
        data,
        timestamp: Timestamp::parse(&timestamp)?,
    })
}

fn read_field((id_bytes, name, field_type, required, options): RawField) -> Result<Field, StorageError> {
    let options: Vec<String> = rmp_serde::from_slice(&options)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(Field {
        id: FieldId::from_bytes(to_array::<16>(id_bytes, "field_id")?),
        name,
        field_type: FieldType::parse(&field_type)?,
        required,
        options,
    })
}

fn encode_data(data: &BTreeMap<FieldId, FieldValue>) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn encode_options(options: &[String]) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(options).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn write_entity_fields(
    tx: &rusqlite::Transaction,
    entity: &Entity,
) -> Result<(), StorageError> {
    tx.execute(
        "DELETE FROM entity_fields WHERE entity_id = ?1",
        rusqlite::params![entity.id.as_bytes().as_slice()],
    )?;
    for (position, field_id) in entity.field_ids.iter().enumerate() {
        tx.execute(
            "INSERT INTO entity_fields (entity_id, position, field_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                entity.id.as_bytes().as_slice(),
                position as i64,
                field_id.as_bytes().as_slice(),
            ],
        )?;
    }
    Ok(())
}

impl SchemaStore for SqliteStorage {
    fn get_all_entities(&self) -> Result<Vec<Entity>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT entity_id, name, entity_group FROM entities ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<RawEntity>, _>>()?;
        rows.into_iter().map(|raw| self.read_entity(raw)).collect()
    }

    fn get_entity(&self, entity_id: EntityId) -> Result<Option<Entity>, StorageError> {
        let raw: Option<RawEntity> = self
            .conn
            .query_row(
                "SELECT entity_id, name, entity_group FROM entities WHERE entity_id = ?1",
                rusqlite::params![entity_id.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        raw.map(|raw| self.read_entity(raw)).transpose()
    }

    fn get_all_fields(&self) -> Result<Vec<Field>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT field_id, name, field_type, required, options FROM fields ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<Result<Vec<RawField>, _>>()?;
        rows.into_iter().map(read_field).collect()
    }

    fn get_field(&self, field_id: FieldId) -> Result<Option<Field>, StorageError> {
        let raw: Option<RawField> = self
            .conn
            .query_row(
                "SELECT field_id, name, field_type, required, options FROM fields WHERE field_id = ?1",
                rusqlite::params![field_id.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;
        raw.map(read_field).transpose()
    }

    fn get_fields_by_ids(&self, field_ids: &[FieldId]) -> Result<Vec<Field>, StorageError> {
        let mut fields = Vec::with_capacity(field_ids.len());
        for field_id in field_ids {
            if let Some(field) = self.get_field(*field_id)? {
                fields.push(field);
            }
        }
        Ok(fields)
    }

    fn create_field(&mut self, field: &Field) -> Result<(), StorageError> {
        let result = self.conn.execute(
            "INSERT INTO fields (field_id, name, field_type, required, options) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                field.id.as_bytes().as_slice(),
                field.name,
                field.field_type.as_str(),
                field.required,
                encode_options(&field.options)?,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "field already exists: {}",
                    field.id
                )))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn update_field(&mut self, field: &Field) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE fields SET name = ?1, field_type = ?2, required = ?3, options = ?4 WHERE field_id = ?5",
            rusqlite::params![
                field.name,
                field.field_type.as_str(),
                field.required,
                encode_options(&field.options)?,
                field.id.as_bytes().as_slice(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("field {}", field.id)));
        }
        Ok(())
    }

    fn delete_field(&mut self, field_id: FieldId) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let id = field_id.as_bytes().as_slice();
        let changed = tx.execute("DELETE FROM fields WHERE field_id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("field {field_id}")));
        }
        tx.execute("DELETE FROM entity_fields WHERE field_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM role_slots WHERE field_id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(())
    }

    fn create_entity(&mut self, entity: &Entity) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let result = tx.execute(
            "INSERT INTO entities (entity_id, name, entity_group) VALUES (?1, ?2, ?3)",
            rusqlite::params![entity.id.as_bytes().as_slice(), entity.name, entity.group],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StorageError::ConstraintViolation(format!(
                    "entity already exists: {}",
                    entity.id
                )));
            }
            Err(e) => return Err(StorageError::Sqlite(e)),
        }
        write_entity_fields(&tx, entity)?;
        tx.commit()?;
        Ok(())
    }

    fn update_entity(&mut self, entity: &Entity) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE entities SET name = ?1, entity_group = ?2 WHERE entity_id = ?3",
            rusqlite::params![entity.name, entity.group, entity.id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("entity {}", entity.id)));
        }
        write_entity_fields(&tx, entity)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_entity(&mut self, entity_id: EntityId) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let id = entity_id.as_bytes().as_slice();
        let changed = tx.execute("DELETE FROM entities WHERE entity_id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("entity {entity_id}")));
        }
        tx.execute("DELETE FROM entity_fields WHERE entity_id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(())
    }

    fn get_role_slots(&self) -> Result<RoleSlots, StorageError> {
        let mut stmt = self.conn.prepare("SELECT role, field_id FROM role_slots")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut slots = RoleSlots::default();
        for (role, field_bytes) in rows {
            let kind = RoleKind::parse(&role)?;
            let field_id = FieldId::from_bytes(to_array::<16>(field_bytes, "field_id")?);
            slots = slots.with(kind, Some(field_id));
        }
        Ok(slots)
    }

    fn set_role_slots(&mut self, slots: &RoleSlots) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM role_slots", [])?;
        for (kind, field_id) in slots.iter() {
            tx.execute(
                "INSERT INTO role_slots (role, field_id) VALUES (?1, ?2)",
                rusqlite::params![kind.as_str(), field_id.as_bytes().as_slice()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl RecordStore for SqliteStorage {
    fn filter_multiple(&self, filter: &RecordFilter) -> Result<Vec<Record>, StorageError> {
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE 1 = 1");
        let mut params = Vec::new();

        if !filter.entity_ids.is_empty() {
            let placeholders = vec!["?"; filter.entity_ids.len()].join(", ");
            sql.push_str(&format!(" AND entity_id IN ({placeholders})"));
            params.extend(
                filter
                    .entity_ids
                    .iter()
                    .map(|id| Value::Blob(id.as_bytes().to_vec())),
            );
        }
        // Stored timestamps are normalized ISO strings, so the first ten
        // characters are the UTC calendar date.
        if let Some(from) = filter.from_date {
            sql.push_str(" AND substr(timestamp, 1, 10) >= ?");
            params.push(Value::Text(from.to_string()));
        }
        if let Some(to) = filter.to_date {
            sql.push_str(" AND substr(timestamp, 1, 10) <= ?");
            params.push(Value::Text(to.to_string()));
        }
        sql.push_str(" ORDER BY timestamp DESC, rowid DESC");

        self.query_records(&sql, params)
    }

    fn get_recent(&self, limit: usize) -> Result<Vec<Record>, StorageError> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM records ORDER BY timestamp DESC, rowid DESC LIMIT ?"),
            vec![Value::Integer(limit as i64)],
        )
    }

    fn get_record(&self, record_id: RecordId) -> Result<Option<Record>, StorageError> {
        let raw: Option<RawRecord> = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
                rusqlite::params![record_id.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        raw.map(read_record).transpose()
    }

    fn create_record(
        &mut self,
        entity_id: EntityId,
        data: BTreeMap<FieldId, FieldValue>,
    ) -> Result<Record, StorageError> {
        let record = Record::new(entity_id, data, Timestamp::now());
        self.insert_record(&record)?;
        Ok(record)
    }

    fn insert_record(&mut self, record: &Record) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO records (record_id, entity_id, data, timestamp) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.id.as_bytes().as_slice(),
                record.entity_id.as_bytes().as_slice(),
                encode_data(&record.data)?,
                record.timestamp.to_iso(),
            ],
        )?;
        Ok(())
    }

    fn update_record(
        &mut self,
        record_id: RecordId,
        data: BTreeMap<FieldId, FieldValue>,
        timestamp: Timestamp,
    ) -> Result<Record, StorageError> {
        let changed = self.conn.execute(
            "UPDATE records SET data = ?1, timestamp = ?2 WHERE record_id = ?3",
            rusqlite::params![
                encode_data(&data)?,
                timestamp.to_iso(),
                record_id.as_bytes().as_slice(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("record {record_id}")));
        }
        self.get_record(record_id)?
            .ok_or_else(|| StorageError::NotFound(format!("record {record_id}")))
    }

    fn update_record_date(
        &mut self,
        record_id: RecordId,
        timestamp: Timestamp,
    ) -> Result<Record, StorageError> {
        let changed = self.conn.execute(
            "UPDATE records SET timestamp = ?1 WHERE record_id = ?2",
            rusqlite::params![timestamp.to_iso(), record_id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("record {record_id}")));
        }
        self.get_record(record_id)?
            .ok_or_else(|| StorageError::NotFound(format!("record {record_id}")))
    }

    fn delete_record(&mut self, record_id: RecordId) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "DELETE FROM records WHERE record_id = ?1",
            rusqlite::params![record_id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("record {record_id}")));
        }
        Ok(())
    }

    fn record_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn seeded() -> (SqliteStorage, Entity, Field) {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let field = Field::new("Horas", FieldType::Number);
        storage.create_field(&field).unwrap();
        let entity = Entity::new("Torno", vec![field.id]).in_group("Taller");
        storage.create_entity(&entity).unwrap();
        (storage, entity, field)
    }

    #[test]
    fn entity_round_trip_keeps_field_order() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let a = Field::new("A", FieldType::Text);
        let b = Field::select("B", &["x", "y"]);
        storage.create_field(&a).unwrap();
        storage.create_field(&b).unwrap();
        let entity = Entity::new("E", vec![b.id, a.id]);
        storage.create_entity(&entity).unwrap();

        let loaded = storage.get_entity(entity.id).unwrap().unwrap();
        assert_eq!(loaded, entity);
        let fields = storage.get_fields_by_ids(&loaded.field_ids).unwrap();
        assert_eq!(fields, vec![b, a]);
    }

    #[test]
    fn duplicate_entity_is_a_constraint_violation() {
        let (mut storage, entity, _) = seeded();
        let err = storage.create_entity(&entity).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[test]
    fn delete_field_detaches_and_clears_roles_but_keeps_record_data() {
        let (mut storage, entity, field) = seeded();
        storage
            .set_role_slots(&RoleSlots::default().with(RoleKind::Column3, Some(field.id)))
            .unwrap();
        let mut data = BTreeMap::new();
        data.insert(field.id, FieldValue::Number(3.0));
        let record = storage.create_record(entity.id, data).unwrap();

        storage.delete_field(field.id).unwrap();

        assert!(storage.get_field(field.id).unwrap().is_none());
        assert!(storage.get_entity(entity.id).unwrap().unwrap().field_ids.is_empty());
        assert_eq!(storage.get_role_slots().unwrap(), RoleSlots::default());
        let kept = storage.get_record(record.id).unwrap().unwrap();
        assert_eq!(kept.value(field.id), Some(&FieldValue::Number(3.0)));
    }

    #[test]
    fn filter_multiple_by_entity_and_inclusive_dates() {
        let (mut storage, entity, _) = seeded();
        let other = EntityId::new();
        for (entity_id, at) in [
            (entity.id, "2024-01-01T08:00:00Z"),
            (entity.id, "2024-01-02T23:59:00Z"),
            (other, "2024-01-02T12:00:00Z"),
            (entity.id, "2024-01-03T00:00:00Z"),
        ] {
            storage
                .insert_record(&Record::new(entity_id, BTreeMap::new(), ts(at)))
                .unwrap();
        }

        let filter = RecordFilter::new()
            .entities([entity.id])
            .since("2024-01-02".parse().unwrap())
            .until("2024-01-03".parse().unwrap());
        let records = storage.filter_multiple(&filter).unwrap();
        let stamps: Vec<String> = records.iter().map(|r| r.timestamp.to_iso()).collect();
        assert_eq!(
            stamps,
            vec!["2024-01-03T00:00:00.000Z", "2024-01-02T23:59:00.000Z"]
        );
        assert_eq!(storage.filter_multiple(&RecordFilter::new()).unwrap().len(), 4);
    }

    #[test]
    fn update_and_redate_records() {
        let (mut storage, entity, field) = seeded();
        let record = storage.create_record(entity.id, BTreeMap::new()).unwrap();

        let mut data = BTreeMap::new();
        data.insert(field.id, FieldValue::Number(7.5));
        let updated = storage
            .update_record(record.id, data, ts("2023-05-01T10:00:00Z"))
            .unwrap();
        assert_eq!(updated.entity_id, entity.id);
        assert_eq!(updated.value(field.id), Some(&FieldValue::Number(7.5)));

        let redated = storage
            .update_record_date(record.id, ts("2023-06-01"))
            .unwrap();
        assert_eq!(redated.timestamp.to_iso(), "2023-06-01T00:00:00.000Z");
        assert_eq!(redated.value(field.id), Some(&FieldValue::Number(7.5)));

        storage.delete_record(record.id).unwrap();
        assert!(matches!(
            storage.delete_record(record.id),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn recent_records_are_newest_first() {
        let (mut storage, entity, _) = seeded();
        for at in ["2024-01-01", "2024-03-01", "2024-02-01"] {
            storage
                .insert_record(&Record::new(entity.id, BTreeMap::new(), ts(at)))
                .unwrap();
        }
        let recent = storage.get_recent(2).unwrap();
        let dates: Vec<String> = recent.iter().map(|r| r.timestamp.date().to_string()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-02-01"]);
        assert_eq!(storage.record_count().unwrap(), 3);
    }

    #[test]
    fn file_backed_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldlog.db");
        let path = path.to_str().unwrap();

        let field_id = {
            let mut storage = SqliteStorage::open(path).unwrap();
            let field = Field::select("Estado", &["OK", "KO"]);
            storage.create_field(&field).unwrap();
            storage
                .set_role_slots(&RoleSlots::default().with(RoleKind::HorizontalAxis, Some(field.id)))
                .unwrap();
            field.id
        };

        let storage = SqliteStorage::open(path).unwrap();
        let field = storage.get_field(field_id).unwrap().unwrap();
        assert_eq!(field.options, vec!["OK".to_string(), "KO".to_string()]);
        assert_eq!(storage.get_role_slots().unwrap().horizontal_axis, Some(field_id));
    }
}
