//! Multi-tenant registry: one PostgreSQL schema per gym, loaded from the `gym` table.
//!
//! Schema names cannot be bound as parameters, so every tenant schema that reaches SQL text
//! goes through [`SchemaName::parse`] first.

use crate::config::{CatalogConfig, Scope};
use crate::error::AppError;
use crate::migration::apply_catalog;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub const PUBLIC_SCHEMA: &str = "public";
pub const TENANT_SCHEMA_PREFIX: &str = "gym_";

const SLUG_MIN: usize = 3;
const SLUG_MAX: usize = 40;

static SCHEMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("valid regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{2,39}$").expect("valid regex"));

/// A validated, lower-case PostgreSQL schema identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemaName(String);

impl SchemaName {
    /// Accepts `[a-z][a-z0-9_]*` up to 63 bytes; rejects system schemas.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let valid = SCHEMA_RE.is_match(s)
            && !s.starts_with("pg_")
            && s != "information_schema";
        if valid {
            Ok(SchemaName(s.to_string()))
        } else {
            Err(AppError::BadRequest(format!("invalid schema name: {:?}", s)))
        }
    }

    pub fn public() -> Self {
        SchemaName(PUBLIC_SCHEMA.to_string())
    }

    /// Schema owned by the gym with this slug.
    pub fn for_slug(slug: &str) -> Result<Self, AppError> {
        validate_slug(slug)?;
        Self::parse(&format!("{}{}", TENANT_SCHEMA_PREFIX, slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_public(&self) -> bool {
        self.0 == PUBLIC_SCHEMA
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Schemas one request may touch: `public`, plus the caller's tenant schema when one was resolved.
#[derive(Clone, Debug, Default)]
pub struct SchemaScope {
    tenant: Option<SchemaName>,
}

impl SchemaScope {
    pub fn public_only() -> Self {
        SchemaScope { tenant: None }
    }

    pub fn with_tenant(schema: SchemaName) -> Self {
        SchemaScope {
            tenant: Some(schema),
        }
    }

    pub fn schema_for(&self, scope: Scope) -> Result<SchemaName, AppError> {
        match scope {
            Scope::Public => Ok(SchemaName::public()),
            Scope::Tenant => self
                .tenant
                .clone()
                .ok_or_else(|| AppError::BadRequest("X-Tenant-ID header is required".into())),
        }
    }
}

/// Gym slugs: `[a-z][a-z0-9_]{2,39}`.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "slug must be {}-{} characters of a-z, 0-9 or _ and start with a letter",
            SLUG_MIN, SLUG_MAX
        )))
    }
}

/// Per-tenant entry from the `gym` table.
#[derive(Clone, Debug)]
pub struct TenantEntry {
    pub gym_id: Uuid,
    pub slug: String,
    pub schema: SchemaName,
}

/// In-memory tenant registry keyed by gym slug (the `X-Tenant-ID` value).
#[derive(Clone, Debug, Default)]
pub struct TenantRegistry {
    by_slug: HashMap<String, TenantEntry>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        TenantRegistry {
            by_slug: HashMap::new(),
        }
    }

    pub fn get(&self, slug: &str) -> Option<&TenantEntry> {
        self.by_slug.get(slug)
    }

    pub fn insert(&mut self, entry: TenantEntry) {
        self.by_slug.insert(entry.slug.clone(), entry);
    }

    pub fn remove_gym(&mut self, gym_id: Uuid) -> Option<TenantEntry> {
        let slug = self
            .by_slug
            .values()
            .find(|e| e.gym_id == gym_id)
            .map(|e| e.slug.clone())?;
        self.by_slug.remove(&slug)
    }

    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }
}

fn entry_from_row(id: Uuid, slug: String, schema_name: String) -> Option<TenantEntry> {
    match SchemaName::parse(&schema_name) {
        Ok(schema) => Some(TenantEntry {
            gym_id: id,
            slug,
            schema,
        }),
        Err(_) => {
            tracing::warn!(gym_id = %id, schema = %schema_name, "gym has an invalid schema name, skipping");
            None
        }
    }
}

/// Load active tenants from `public.gym`. Rows with unusable schema names are skipped.
pub async fn load_registry_from_pool(pool: &PgPool) -> Result<TenantRegistry, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, slug, schema_name FROM public.gym WHERE deleted_at IS NULL AND active ORDER BY slug",
    )
    .fetch_all(pool)
    .await?;

    let mut registry = TenantRegistry::new();
    for (id, slug, schema_name) in rows {
        if let Some(entry) = entry_from_row(id, slug, schema_name) {
            registry.insert(entry);
        }
    }
    tracing::info!(tenants = registry.len(), "tenant registry loaded");
    Ok(registry)
}

/// Look up one active tenant by slug, bypassing the in-memory registry.
pub async fn find_tenant(pool: &PgPool, slug: &str) -> Result<Option<TenantEntry>, AppError> {
    let row = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, slug, schema_name FROM public.gym WHERE slug = $1 AND deleted_at IS NULL AND active",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|(id, slug, schema_name)| entry_from_row(id, slug, schema_name)))
}

/// Create the tenant schema and its tables. Idempotent.
pub async fn provision_tenant_schema(
    conn: &mut PgConnection,
    tenant_catalog: &CatalogConfig,
    schema: &SchemaName,
) -> Result<(), AppError> {
    if schema.is_public() {
        return Err(AppError::BadRequest("tenant schema cannot be public".into()));
    }
    apply_catalog(conn, tenant_catalog, schema).await?;
    tracing::info!(schema = %schema, "tenant schema provisioned");
    Ok(())
}

/// Drop a tenant schema with everything in it.
pub async fn drop_tenant_schema(conn: &mut PgConnection, schema: &SchemaName) -> Result<(), AppError> {
    if schema.is_public() {
        return Err(AppError::BadRequest("refusing to drop the public schema".into()));
    }
    sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema))
        .execute(&mut *conn)
        .await?;
    tracing::warn!(schema = %schema, "tenant schema dropped");
    Ok(())
}
