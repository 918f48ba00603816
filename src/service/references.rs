//! Cross-table existence checks for references a foreign key cannot express:
//! ids that may live in one of several tables (possibly in another schema), soft-deleted
//! targets, and the `exercise_source` discriminator.

use crate::config::{ResolvedEntity, SourceSwitchSpec, TargetSpec};
use crate::error::AppError;
use crate::service::crud::CrudService;
use crate::sql;
use crate::tenant::SchemaScope;
use serde_json::Value;
use sqlx::PgConnection;
use std::collections::HashMap;

pub struct ReferenceGuard;

impl ReferenceGuard {
    pub async fn check_create(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        body: &HashMap<String, Value>,
    ) -> Result<(), AppError> {
        check_references(conn, entity, scope, body).await?;
        if let Some(sw) = &entity.source_switch {
            check_switch(conn, sw, scope, body).await?;
        }
        Ok(())
    }

    /// References present in `body` are probed. When the body touches any discriminator column,
    /// the switch is re-checked against the stored row with the body applied on top.
    pub async fn check_update(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        scope: &SchemaScope,
        id: &Value,
        body: &HashMap<String, Value>,
    ) -> Result<(), AppError> {
        check_references(conn, entity, scope, body).await?;
        let Some(sw) = &entity.source_switch else {
            return Ok(());
        };
        if !sw.columns().any(|c| body.contains_key(c)) {
            return Ok(());
        }
        let schema = scope.schema_for(entity.scope)?;
        let stored = CrudService::read(conn, entity, &schema, id).await?;
        let merged = merge(stored, body);
        check_switch(conn, sw, scope, &merged).await
    }
}

fn merge(stored: Value, body: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut view: HashMap<String, Value> = match stored {
        Value::Object(m) => m.into_iter().collect(),
        _ => HashMap::new(),
    };
    for (k, v) in body {
        view.insert(k.clone(), v.clone());
    }
    view
}

fn present<'a>(body: &'a HashMap<String, Value>, column: &str) -> Option<&'a Value> {
    body.get(column).filter(|v| !v.is_null())
}

async fn check_references(
    conn: &mut PgConnection,
    entity: &ResolvedEntity,
    scope: &SchemaScope,
    body: &HashMap<String, Value>,
) -> Result<(), AppError> {
    for r in &entity.references {
        let Some(value) = present(body, &r.column) else { continue };
        if !exists_in_any(conn, &r.targets, scope, value).await? {
            return Err(AppError::BadRequest(format!(
                "{} {} does not exist",
                r.column,
                display(value)
            )));
        }
    }
    Ok(())
}

async fn check_switch(
    conn: &mut PgConnection,
    sw: &SourceSwitchSpec,
    scope: &SchemaScope,
    view: &HashMap<String, Value>,
) -> Result<(), AppError> {
    let source = present(view, &sw.column)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", sw.column)))?;
    let variant = sw.variant(source).ok_or_else(|| {
        let options: Vec<&str> = sw.variants.iter().map(|v| v.value.as_str()).collect();
        AppError::BadRequest(format!("{} must be one of: {}", sw.column, options.join(", ")))
    })?;
    for other in sw.variants.iter().filter(|v| v.value != variant.value) {
        if present(view, &other.column).is_some() {
            return Err(AppError::BadRequest(format!(
                "{} must be empty when {} is '{}'",
                other.column, sw.column, source
            )));
        }
    }
    let id = present(view, &variant.column).ok_or_else(|| {
        AppError::BadRequest(format!(
            "{} is required when {} is '{}'",
            variant.column, sw.column, source
        ))
    })?;
    if !exists_in_any(conn, std::slice::from_ref(&variant.target), scope, id).await? {
        return Err(AppError::BadRequest(format!(
            "{} {} does not exist",
            variant.column,
            display(id)
        )));
    }
    Ok(())
}

/// Probe targets in order; the first live match wins.
async fn exists_in_any(
    conn: &mut PgConnection,
    targets: &[TargetSpec],
    scope: &SchemaScope,
    value: &Value,
) -> Result<bool, AppError> {
    for target in targets {
        let schema = scope.schema_for(target.scope)?;
        let q = sql::exists(target, &schema, value);
        tracing::debug!(sql = %q.sql, "reference probe");
        let mut query = sqlx::query_scalar::<sqlx::Postgres, bool>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        if query.fetch_one(&mut *conn).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn display(v: &Value) -> String {
    v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())
}
