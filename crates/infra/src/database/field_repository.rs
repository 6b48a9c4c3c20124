//! SQLite-backed implementation of the FieldStore port.
//!
//! `depends_on` persists as a JSON array; entity and field types persist as
//! their canonical string forms.

use std::sync::Arc;

use async_trait::async_trait;
use revline_core::store::ports::FieldStore;
use revline_domain::{EntityKind, FieldDefinition, FieldType, FieldValue, Result};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbPool;
use crate::errors::InfraError;

const DEFINITION_COLUMNS: &str = "id, entity_type, name, source_key, field_type, auto_populate, \
     auto_populate_trigger, is_calculated, formula, depends_on, is_active, \
     date_created, date_updated";

const VALUE_COLUMNS: &str = "id, field_id, entity_type, entity_id, value, date_updated";

/// SQLite implementation of FieldStore.
pub struct SqliteFieldStore {
    pool: Arc<DbPool>,
}

impl SqliteFieldStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn map_definition(row: &Row<'_>) -> rusqlite::Result<FieldDefinition> {
    let entity_type: String = row.get(1)?;
    let entity_type = EntityKind::parse(&entity_type)
        .ok_or_else(|| conversion_error(1, format!("unknown entity type: {entity_type}")))?;

    let field_type: String = row.get(4)?;
    let field_type = FieldType::parse(&field_type)
        .ok_or_else(|| conversion_error(4, format!("unknown field type: {field_type}")))?;

    let depends_on: Option<String> = row.get(9)?;
    let depends_on = match depends_on {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| conversion_error(9, format!("malformed depends_on: {e}")))?,
        None => Vec::new(),
    };

    Ok(FieldDefinition {
        id: row.get(0)?,
        entity_type,
        name: row.get(2)?,
        source_key: row.get(3)?,
        field_type,
        auto_populate: row.get(5)?,
        auto_populate_trigger: row.get(6)?,
        is_calculated: row.get(7)?,
        formula: row.get(8)?,
        depends_on,
        is_active: row.get(10)?,
        date_created: row.get(11)?,
        date_updated: row.get(12)?,
    })
}

fn map_value(row: &Row<'_>) -> rusqlite::Result<FieldValue> {
    let entity_type: String = row.get(2)?;
    let entity_type = EntityKind::parse(&entity_type)
        .ok_or_else(|| conversion_error(2, format!("unknown entity type: {entity_type}")))?;

    Ok(FieldValue {
        id: row.get(0)?,
        field_id: row.get(1)?,
        entity_type,
        entity_id: row.get(3)?,
        value: row.get(4)?,
        date_updated: row.get(5)?,
    })
}

#[async_trait]
impl FieldStore for SqliteFieldStore {
    #[instrument(skip(self, definition), fields(field_id = %definition.id))]
    async fn upsert_definition(&self, definition: &FieldDefinition) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let depends_on =
            serde_json::to_string(&definition.depends_on).map_err(InfraError::from)?;

        conn.execute(
            "INSERT INTO field_definitions (
                id, entity_type, name, source_key, field_type, auto_populate,
                auto_populate_trigger, is_calculated, formula, depends_on, is_active,
                date_created, date_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                entity_type = excluded.entity_type,
                name = excluded.name,
                source_key = excluded.source_key,
                field_type = excluded.field_type,
                auto_populate = excluded.auto_populate,
                auto_populate_trigger = excluded.auto_populate_trigger,
                is_calculated = excluded.is_calculated,
                formula = excluded.formula,
                depends_on = excluded.depends_on,
                is_active = excluded.is_active,
                date_created = excluded.date_created,
                date_updated = excluded.date_updated",
            rusqlite::params![
                definition.id,
                definition.entity_type.as_str(),
                definition.name,
                definition.source_key,
                definition.field_type.as_str(),
                definition.auto_populate,
                definition.auto_populate_trigger,
                definition.is_calculated,
                definition.formula,
                depends_on,
                definition.is_active,
                definition.date_created,
                definition.date_updated,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(field_id = %definition.id, "field definition upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn definition(&self, field_id: &str) -> Result<Option<FieldDefinition>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let definition = conn
            .query_row(
                &format!("SELECT {DEFINITION_COLUMNS} FROM field_definitions WHERE id = ?1"),
                rusqlite::params![field_id],
                map_definition,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(definition)
    }

    #[instrument(skip(self))]
    async fn definitions_for(
        &self,
        entity_type: EntityKind,
        active_only: bool,
    ) -> Result<Vec<FieldDefinition>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut sql =
            format!("SELECT {DEFINITION_COLUMNS} FROM field_definitions WHERE entity_type = ?1");
        if active_only {
            sql.push_str(" AND is_active = 1");
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(rusqlite::params![entity_type.as_str()], map_definition)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<FieldDefinition>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self, value), fields(field_id = %value.field_id))]
    async fn upsert_value(&self, value: &FieldValue) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        // One row per (field, entity) tuple; the row id survives overwrites.
        conn.execute(
            "INSERT INTO field_values (
                id, field_id, entity_type, entity_id, value, date_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(field_id, entity_type, entity_id) DO UPDATE SET
                value = excluded.value,
                date_updated = excluded.date_updated",
            rusqlite::params![
                value.id,
                value.field_id,
                value.entity_type.as_str(),
                value.entity_id,
                value.value,
                value.date_updated,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(field_id = %value.field_id, entity_id = %value.entity_id, "field value stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn value(
        &self,
        field_id: &str,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Option<FieldValue>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let value = conn
            .query_row(
                &format!(
                    "SELECT {VALUE_COLUMNS} FROM field_values
                     WHERE field_id = ?1 AND entity_type = ?2 AND entity_id = ?3"
                ),
                rusqlite::params![field_id, entity_type.as_str(), entity_id],
                map_value,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn values_for_entity(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<FieldValue>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VALUE_COLUMNS} FROM field_values
                 WHERE entity_type = ?1 AND entity_id = ?2
                 ORDER BY field_id"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(rusqlite::params![entity_type.as_str(), entity_id], map_value)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<FieldValue>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }
}
