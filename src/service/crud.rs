//! Generic CRUD execution against PostgreSQL.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::sql::{self, LinkFilter, QueryBuf};
use crate::tenant::SchemaName;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgConnection;
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 100;

/// Parsed list query: exact-match column filters, join-table filters and paging.
#[derive(Default)]
pub struct ListParams<'a> {
    pub filters: Vec<(String, Value)>,
    pub links: Vec<LinkFilter<'a>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub struct CrudService;

impl CrudService {
    /// List live rows; limit defaults to 100 and is capped at 1000.
    pub async fn list(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        schema: &SchemaName,
        params: &ListParams<'_>,
    ) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(
            entity,
            schema,
            &params.filters,
            &params.links,
            Some(params.limit.unwrap_or(DEFAULT_LIMIT)),
            params.offset,
        );
        let rows = bind_all(&q).fetch_all(&mut *conn).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    pub async fn read(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        schema: &SchemaName,
        id: &Value,
    ) -> Result<Value, AppError> {
        Self::find(conn, entity, schema, id)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    /// Fetch one live row by key, `None` when absent or soft-deleted.
    pub async fn find(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        schema: &SchemaName,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(entity, schema, id);
        let row = bind_all(&q).fetch_optional(&mut *conn).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    /// Insert one row. Unique violations surface as `Conflict` from the database.
    pub async fn create(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        schema: &SchemaName,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let q = sql::insert(entity, schema, body);
        let row = bind_all(&q).fetch_one(&mut *conn).await?;
        Ok(row_to_json(&row))
    }

    pub async fn update(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        schema: &SchemaName,
        id: &Value,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let q = sql::update(entity, schema, id, body);
        let row = bind_all(&q).fetch_optional(&mut *conn).await?;
        row.as_ref().map(row_to_json).ok_or_else(|| not_found(entity, id))
    }

    /// Hard or soft delete per the entity's policy. Returns the deleted key.
    pub async fn delete(
        conn: &mut PgConnection,
        entity: &ResolvedEntity,
        schema: &SchemaName,
        id: &Value,
    ) -> Result<Value, AppError> {
        let q = sql::delete(entity, schema, id);
        let row = bind_all(&q).fetch_optional(&mut *conn).await?;
        row.as_ref().map(row_to_json).ok_or_else(|| not_found(entity, id))
    }
}

fn not_found(entity: &ResolvedEntity, id: &Value) -> AppError {
    let id = id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string());
    AppError::NotFound(format!("{} {} not found", entity.path_segment, id))
}

pub(crate) fn bind_all(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
