//! Request-level entity operations: validation, hooks and reference checks around [`CrudService`].

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::service::crud::{CrudService, ListParams};
use crate::service::gym::GymService;
use crate::service::password::apply_password_hook;
use crate::service::references::ReferenceGuard;
use crate::service::validation::RequestValidator;
use crate::state::AppState;
use crate::tenant::SchemaScope;
use serde_json::Value;
use std::collections::HashMap;

pub struct EntityService;

impl EntityService {
    pub async fn list(
        state: &AppState,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        params: &ListParams<'_>,
    ) -> Result<Vec<Value>, AppError> {
        let schema = scope.schema_for(entity.scope)?;
        let mut conn = state.pool.acquire().await?;
        CrudService::list(&mut conn, entity, &schema, params).await
    }

    pub async fn read(
        state: &AppState,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        id: &Value,
    ) -> Result<Value, AppError> {
        let schema = scope.schema_for(entity.scope)?;
        let mut conn = state.pool.acquire().await?;
        CrudService::read(&mut conn, entity, &schema, id).await
    }

    pub async fn create(
        state: &AppState,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        mut body: HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let schema = scope.schema_for(entity.scope)?;
        RequestValidator::check_types(&body, entity)?;
        RequestValidator::validate(&body, &entity.validation)?;
        apply_password_hook(entity, &mut body, true).await?;
        if entity.provisions_tenant {
            return GymService::register(state, entity, body).await;
        }
        let mut conn = state.pool.acquire().await?;
        ReferenceGuard::check_create(&mut conn, entity, scope, &body).await?;
        let row = CrudService::create(&mut conn, entity, &schema, &body).await?;
        tracing::info!(entity = %entity.path_segment, schema = %schema, "created");
        Ok(row)
    }

    pub async fn update(
        state: &AppState,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        id: &Value,
        mut body: HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let schema = scope.schema_for(entity.scope)?;
        RequestValidator::check_types(&body, entity)?;
        RequestValidator::validate_partial(&body, &entity.validation)?;
        apply_password_hook(entity, &mut body, false).await?;
        let mut conn = state.pool.acquire().await?;
        ReferenceGuard::check_update(&mut conn, entity, scope, id, &body).await?;
        let row = CrudService::update(&mut conn, entity, &schema, id, &body).await?;
        if entity.provisions_tenant {
            GymService::sync_registry(state, entity, &row)?;
        }
        Ok(row)
    }

    pub async fn delete(
        state: &AppState,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        id: &Value,
    ) -> Result<(), AppError> {
        let schema = scope.schema_for(entity.scope)?;
        let mut conn = state.pool.acquire().await?;
        let row = CrudService::delete(&mut conn, entity, &schema, id).await?;
        if entity.provisions_tenant {
            GymService::deregister(state, entity, &row)?;
        }
        tracing::info!(
            entity = %entity.path_segment,
            schema = %schema,
            soft = entity.soft_delete,
            "deleted"
        );
        Ok(())
    }
}
