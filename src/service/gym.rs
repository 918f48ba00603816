//! Gym registration: the gym row and its tenant schema are created together.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::service::crud::CrudService;
use crate::state::AppState;
use crate::tenant::{provision_tenant_schema, SchemaName, TenantEntry};
use serde_json::Value;
use std::collections::HashMap;

const SLUG: &str = "slug";
const SCHEMA_NAME: &str = "schema_name";
const ACTIVE: &str = "active";

pub struct GymService;

impl GymService {
    /// Insert the gym and provision `gym_<slug>` in one transaction, then register the tenant.
    pub async fn register(
        state: &AppState,
        entity: &ResolvedEntity,
        mut body: HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let slug = body
            .get(SLUG)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation(format!("{} is required", SLUG)))?
            .to_string();
        let schema = SchemaName::for_slug(&slug)?;
        body.insert(SCHEMA_NAME.to_string(), Value::String(schema.as_str().to_string()));

        let mut tx = state.pool.begin().await?;
        let row = CrudService::create(&mut tx, entity, &SchemaName::public(), &body).await?;
        provision_tenant_schema(&mut tx, &state.config.tenant, &schema).await?;
        tx.commit().await?;

        Self::sync_registry(state, entity, &row)?;
        Ok(row)
    }

    /// Mirror a gym row into the in-memory registry: active gyms are registered, inactive ones dropped.
    pub fn sync_registry(state: &AppState, entity: &ResolvedEntity, row: &Value) -> Result<(), AppError> {
        let gym_id = gym_id(entity, row)?;
        let active = row.get(ACTIVE).and_then(Value::as_bool).unwrap_or(true);
        if !active {
            state.deregister_gym(gym_id);
            return Ok(());
        }
        let slug = row.get(SLUG).and_then(Value::as_str);
        let schema = row.get(SCHEMA_NAME).and_then(Value::as_str);
        if let (Some(slug), Some(schema)) = (slug, schema) {
            state.register_tenant(TenantEntry {
                gym_id,
                slug: slug.to_string(),
                schema: SchemaName::parse(schema)?,
            });
        }
        Ok(())
    }

    /// Called after the gym row was soft-deleted.
    pub fn deregister(state: &AppState, entity: &ResolvedEntity, row: &Value) -> Result<(), AppError> {
        state.deregister_gym(gym_id(entity, row)?);
        Ok(())
    }
}

fn gym_id(entity: &ResolvedEntity, row: &Value) -> Result<uuid::Uuid, AppError> {
    row.get(&entity.pk_column)
        .and_then(Value::as_str)
        .and_then(|s| uuid::Uuid::parse_str(s).ok())
        .ok_or_else(|| AppError::Internal("gym row has no id".into()))
}
