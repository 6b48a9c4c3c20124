//! Field graph service.
//!
//! Calculated fields may never be written directly; writes to stored fields
//! trigger a depth-1 re-evaluation of every calculated field that lists the
//! changed field as a dependency. A calculated field depending on another
//! calculated field is not re-cascaded transitively.

use std::sync::Arc;

use chrono::Utc;
use revline_domain::{
    constants::{FINANCING_FEE_KEY, PERMIT_FEE_KEY},
    EntityKind, FieldDefinition, FieldType, FieldValue, FormulaFamily, Result, RevlineError,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::store::ports::{FieldStore, InvoiceStore};

/// Merged definition + value view for one entity, with calculated fields
/// evaluated on read.
#[derive(Debug, Clone, Serialize)]
pub struct EntityFieldValue {
    pub field_id: String,
    pub field_name: String,
    pub field_type: FieldType,
    pub value: Option<String>,
    pub is_calculated: bool,
}

/// Service over field definitions and values.
pub struct FieldGraphService {
    fields: Arc<dyn FieldStore>,
    invoices: Arc<dyn InvoiceStore>,
}

impl FieldGraphService {
    pub fn new(fields: Arc<dyn FieldStore>, invoices: Arc<dyn InvoiceStore>) -> Self {
        Self { fields, invoices }
    }

    /// Write a value to a stored field and propagate to dependents.
    ///
    /// # Errors
    ///
    /// `RevlineError::ImmutableField` when the field is calculated; the
    /// existing stored value is left unchanged. `NotFound` when no such
    /// field definition exists.
    #[instrument(skip(self, value))]
    pub async fn set_value(
        &self,
        field_id: &str,
        entity_type: EntityKind,
        entity_id: &str,
        value: &str,
    ) -> Result<()> {
        let definition = self
            .fields
            .definition(field_id)
            .await?
            .ok_or_else(|| RevlineError::NotFound(format!("field {field_id}")))?;

        if definition.is_calculated {
            return Err(RevlineError::ImmutableField(definition.name));
        }

        let stored = FieldValue::new(
            field_id,
            entity_type,
            entity_id,
            Some(value.to_string()),
            Utc::now().timestamp(),
        );
        self.fields.upsert_value(&stored).await?;
        debug!(field_id, entity_id, "field value stored");

        self.propagate(field_id, entity_type, entity_id).await
    }

    /// Evaluate a calculated field.
    ///
    /// Returns `Ok(None)` when the formula family is unrecognized or the
    /// required inputs are absent — not yet computable, not an error.
    #[instrument(skip(self, definition), fields(field_id = %definition.id))]
    pub async fn evaluate_calculated(
        &self,
        definition: &FieldDefinition,
        entity_id: &str,
    ) -> Result<Option<f64>> {
        let Some(family) = definition.formula_family() else {
            return Ok(None);
        };

        match family {
            FormulaFamily::InvoiceNetOfFees => {
                if definition.entity_type != EntityKind::Invoice {
                    return Ok(None);
                }
                let Some(invoice) = self.invoices.get(entity_id).await? else {
                    return Ok(None);
                };

                // Missing fee values count as zero; only the invoice itself
                // is a required input.
                let permit = self
                    .number_value(EntityKind::Invoice, entity_id, PERMIT_FEE_KEY)
                    .await?
                    .unwrap_or(0.0);
                let financing = self
                    .number_value(EntityKind::Invoice, entity_id, FINANCING_FEE_KEY)
                    .await?
                    .unwrap_or(0.0);

                Ok(Some(invoice.total - permit - financing))
            }
        }
    }

    /// Re-evaluate every calculated field of the entity type that depends on
    /// the changed field. Single-level cascade: dependents of dependents are
    /// not revisited.
    #[instrument(skip(self))]
    pub async fn propagate(
        &self,
        changed_field_id: &str,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<()> {
        let definitions = self.fields.definitions_for(entity_type, true).await?;

        for definition in definitions {
            if !definition.is_calculated {
                continue;
            }
            if !definition.depends_on.iter().any(|d| d == changed_field_id) {
                continue;
            }

            match self.evaluate_calculated(&definition, entity_id).await? {
                Some(value) => {
                    let stored = FieldValue::new(
                        definition.id.clone(),
                        entity_type,
                        entity_id,
                        Some(value.to_string()),
                        Utc::now().timestamp(),
                    );
                    self.fields.upsert_value(&stored).await?;
                    debug!(field_id = %definition.id, value, "dependent field recalculated");
                }
                None => {
                    // Not yet computable; the cached value stays as-is.
                    debug!(field_id = %definition.id, "dependent field unresolved, cache kept");
                }
            }
        }

        Ok(())
    }

    /// Fill unset date-typed fields flagged for the trigger with the current
    /// timestamp. Never overwrites an already-stored value. Returns the
    /// names of populated fields.
    #[instrument(skip(self))]
    pub async fn auto_populate(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
        trigger_event: &str,
    ) -> Result<Vec<String>> {
        let definitions = self.fields.definitions_for(entity_type, true).await?;
        let now = Utc::now().timestamp();
        let mut populated = Vec::new();

        for definition in definitions {
            if !definition.auto_populate
                || definition.auto_populate_trigger.as_deref() != Some(trigger_event)
            {
                continue;
            }
            if definition.field_type != FieldType::Date {
                warn!(field_id = %definition.id, "auto-populate supports date fields only");
                continue;
            }

            let existing =
                self.fields.value(&definition.id, entity_type, entity_id).await?;
            if existing.map(|v| v.value.is_some()).unwrap_or(false) {
                continue;
            }

            let stored = FieldValue::new(
                definition.id.clone(),
                entity_type,
                entity_id,
                Some(now.to_string()),
                now,
            );
            self.fields.upsert_value(&stored).await?;
            populated.push(definition.name);
        }

        Ok(populated)
    }

    /// Merged field view for an entity: active definitions with stored
    /// values, calculated fields evaluated on read.
    #[instrument(skip(self))]
    pub async fn values_for_entity(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<EntityFieldValue>> {
        let definitions = self.fields.definitions_for(entity_type, true).await?;
        let stored = self.fields.values_for_entity(entity_type, entity_id).await?;

        let mut result = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let value = if definition.is_calculated {
                self.evaluate_calculated(&definition, entity_id)
                    .await?
                    .map(|v| v.to_string())
            } else {
                stored
                    .iter()
                    .find(|v| v.field_id == definition.id)
                    .and_then(|v| v.value.clone())
            };

            result.push(EntityFieldValue {
                field_id: definition.id,
                field_name: definition.name,
                field_type: definition.field_type,
                value,
                is_calculated: definition.is_calculated,
            });
        }

        Ok(result)
    }

    /// Numeric field value for an entity, resolved by upstream field key.
    pub async fn number_value(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
        source_key: &str,
    ) -> Result<Option<f64>> {
        let definitions = self.fields.definitions_for(entity_type, true).await?;
        for definition in definitions {
            if definition.source_key.as_deref() != Some(source_key) {
                continue;
            }
            let value = self.fields.value(&definition.id, entity_type, entity_id).await?;
            if let Some(number) =
                value.and_then(|v| v.value).and_then(|text| text.parse::<f64>().ok())
            {
                return Ok(Some(number));
            }
        }
        Ok(None)
    }
}
