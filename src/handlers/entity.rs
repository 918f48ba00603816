//! Entity CRUD handlers for `/api/v1/{entity}` and `/api/v1/tenant/{entity}`.

use crate::config::{PkType, ResolvedEntity, Scope};
use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{EntityService, ListParams};
use crate::sql::LinkFilter;
use crate::state::AppState;
use crate::tenant::{find_tenant, validate_slug, SchemaScope};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

const OP_CREATE: &str = "create";
const OP_READ: &str = "read";
const OP_UPDATE: &str = "update";
const OP_DELETE: &str = "delete";

fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str)
                .map_err(|_| AppError::BadRequest(format!("invalid id: {}", id_str)))?;
            Value::String(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str
                .parse()
                .map_err(|_| AppError::BadRequest(format!("invalid id: {}", id_str)))?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

fn body_to_map(body: Result<Json<Value>, JsonRejection>) -> Result<HashMap<String, Value>, AppError> {
    let Json(value) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Query-string values are strings; coerce them to the column's JSON shape so the bind matches.
fn query_value_for_column(entity: &ResolvedEntity, col: &str, s: &str) -> Value {
    let pg_type = entity.column(col).and_then(|c| c.pg_type.as_deref());
    match pg_type {
        Some("int2" | "int4" | "int8") => s
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(s.to_string())),
        Some("bool") if s.eq_ignore_ascii_case("true") => Value::Bool(true),
        Some("bool") if s.eq_ignore_ascii_case("false") => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

fn parse_u32(name: &str, v: &str) -> Result<u32, AppError> {
    v.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name)))
}

fn list_params<'a>(
    entity: &'a ResolvedEntity,
    params: HashMap<String, String>,
) -> Result<ListParams<'a>, AppError> {
    let mut out = ListParams::default();
    let mut keys: Vec<_> = params.into_iter().collect();
    keys.sort();
    for (k, v) in keys {
        match k.as_str() {
            "limit" => out.limit = Some(parse_u32("limit", &v)?),
            "offset" => out.offset = Some(parse_u32("offset", &v)?),
            _ => {
                if let Some(spec) = entity.list_filters.iter().find(|f| f.param == k) {
                    let ids = v
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| {
                            uuid::Uuid::parse_str(s)
                                .map(|u| u.to_string())
                                .map_err(|_| AppError::BadRequest(format!("{} must be a list of UUIDs", k)))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    if !ids.is_empty() {
                        out.links.push(LinkFilter { spec, ids });
                    }
                } else if entity.has_column(&k) {
                    let val = query_value_for_column(entity, &k, &v);
                    out.filters.push((k, val));
                }
            }
        }
    }
    Ok(out)
}

fn entity_for<'a>(
    state: &'a AppState,
    scope: Scope,
    path_segment: &str,
    operation: &str,
) -> Result<&'a ResolvedEntity, AppError> {
    let entity = state
        .catalog
        .model(scope)
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity: {}", path_segment)))?;
    if !entity.allows(operation) {
        return Err(AppError::BadRequest(format!(
            "{} is not supported for {}",
            operation, path_segment
        )));
    }
    Ok(entity)
}

/// Map `X-Tenant-ID` to its schema. A registry miss is retried once against the database.
pub async fn resolve_tenant(state: &AppState, tenant: TenantId) -> Result<SchemaScope, AppError> {
    let slug = tenant
        .0
        .ok_or_else(|| AppError::BadRequest("X-Tenant-ID header is required".into()))?;
    validate_slug(&slug).map_err(|_| AppError::BadRequest(format!("invalid X-Tenant-ID: {}", slug)))?;
    if let Some(entry) = state.tenant(&slug) {
        return Ok(SchemaScope::with_tenant(entry.schema));
    }
    match find_tenant(&state.pool, &slug).await? {
        Some(entry) => {
            let schema = entry.schema.clone();
            state.register_tenant(entry);
            Ok(SchemaScope::with_tenant(schema))
        }
        None => Err(AppError::NotFound(format!("tenant {} not found", slug))),
    }
}

async fn list_in(
    state: &AppState,
    entity: &ResolvedEntity,
    scope: &SchemaScope,
    params: HashMap<String, String>,
) -> Result<Response, AppError> {
    let params = list_params(entity, params)?;
    let rows = EntityService::list(state, entity, scope, &params).await?;
    Ok(success_many(format!("{} retrieved", entity.path_segment), rows).into_response())
}

async fn create_in(
    state: &AppState,
    entity: &ResolvedEntity,
    scope: &SchemaScope,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = body_to_map(body)?;
    let row = EntityService::create(state, entity, scope, body).await?;
    Ok(success_one(format!("{} created", entity.path_segment), row).into_response())
}

async fn read_in(
    state: &AppState,
    entity: &ResolvedEntity,
    scope: &SchemaScope,
    id_str: &str,
) -> Result<Response, AppError> {
    let id = parse_id(id_str, &entity.pk_type)?;
    let row = EntityService::read(state, entity, scope, &id).await?;
    Ok(success_one_ok(format!("{} retrieved", entity.path_segment), row).into_response())
}

async fn update_in(
    state: &AppState,
    entity: &ResolvedEntity,
    scope: &SchemaScope,
    id_str: &str,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(id_str, &entity.pk_type)?;
    let body = body_to_map(body)?;
    let row = EntityService::update(state, entity, scope, &id, body).await?;
    Ok(success_one_ok(format!("{} updated", entity.path_segment), row).into_response())
}

async fn delete_in(
    state: &AppState,
    entity: &ResolvedEntity,
    scope: &SchemaScope,
    id_str: &str,
) -> Result<Response, AppError> {
    let id = parse_id(id_str, &entity.pk_type)?;
    EntityService::delete(state, entity, scope, &id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Public, &path_segment, OP_READ)?;
    list_in(&state, entity, &SchemaScope::public_only(), params).await
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Public, &path_segment, OP_CREATE)?;
    create_in(&state, entity, &SchemaScope::public_only(), body).await
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Public, &path_segment, OP_READ)?;
    read_in(&state, entity, &SchemaScope::public_only(), &id_str).await
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Public, &path_segment, OP_UPDATE)?;
    update_in(&state, entity, &SchemaScope::public_only(), &id_str, body).await
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Public, &path_segment, OP_DELETE)?;
    delete_in(&state, entity, &SchemaScope::public_only(), &id_str).await
}

pub async fn tenant_list(
    State(state): State<AppState>,
    tenant: TenantId,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Tenant, &path_segment, OP_READ)?;
    let scope = resolve_tenant(&state, tenant).await?;
    list_in(&state, entity, &scope, params).await
}

pub async fn tenant_create(
    State(state): State<AppState>,
    tenant: TenantId,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Tenant, &path_segment, OP_CREATE)?;
    let scope = resolve_tenant(&state, tenant).await?;
    create_in(&state, entity, &scope, body).await
}

pub async fn tenant_read(
    State(state): State<AppState>,
    tenant: TenantId,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Tenant, &path_segment, OP_READ)?;
    let scope = resolve_tenant(&state, tenant).await?;
    read_in(&state, entity, &scope, &id_str).await
}

pub async fn tenant_update(
    State(state): State<AppState>,
    tenant: TenantId,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Tenant, &path_segment, OP_UPDATE)?;
    let scope = resolve_tenant(&state, tenant).await?;
    update_in(&state, entity, &scope, &id_str, body).await
}

pub async fn tenant_delete(
    State(state): State<AppState>,
    tenant: TenantId,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, Scope::Tenant, &path_segment, OP_DELETE)?;
    let scope = resolve_tenant(&state, tenant).await?;
    delete_in(&state, entity, &scope, &id_str).await
}
