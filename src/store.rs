//! Database bootstrap and the few statements that live outside the generic CRUD path.

use crate::error::AppError;
use crate::settings::Settings;
use crate::tenant::TenantEntry;
use sqlx::postgres::PgPoolOptions;
use sqlx::ConnectOptions;
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Open the shared pool.
pub async fn connect(settings: &Settings) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&settings.database_url())
        .await?;
    tracing::info!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}

/// Connect to the server's `postgres` database and create the target database if missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid database url: {}", e)))?;
    let mut conn: PgConnection = opts.connect().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

/// Split `postgres://…/name?opts` into the maintenance URL (same server, `postgres` db, same
/// options) and the database name.
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let (without_query, query) = match url.split_once('?') {
        Some((u, q)) => (u, Some(q)),
        None => (url, None),
    };
    let authority_start = without_query.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = without_query[authority_start..]
        .find('/')
        .map(|i| authority_start + i + 1)
        .ok_or_else(|| AppError::BadRequest("database url has no database name".into()))?;
    let db_name = without_query[path_start..].trim().to_string();
    let mut admin_url = format!("{}postgres", &without_query[..path_start]);
    if let Some(q) = query {
        admin_url.push('?');
        admin_url.push_str(q);
    }
    Ok((admin_url, db_name))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Every gym row that owns a schema, including inactive ones, for re-provisioning.
pub async fn all_tenants(pool: &PgPool) -> Result<Vec<TenantEntry>, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, slug, schema_name FROM public.gym WHERE deleted_at IS NULL ORDER BY slug",
    )
    .fetch_all(pool)
    .await?;
    let mut out = Vec::with_capacity(rows.len());
    for (gym_id, slug, schema_name) in rows {
        match crate::tenant::SchemaName::parse(&schema_name) {
            Ok(schema) => out.push(TenantEntry { gym_id, slug, schema }),
            Err(_) => tracing::warn!(slug = %slug, schema = %schema_name, "skipping gym with invalid schema name"),
        }
    }
    Ok(out)
}

/// Insert or refresh a platform admin, keyed by email.
pub async fn upsert_admin(pool: &PgPool, email: &str, name: &str, password_hash: &str) -> Result<Uuid, AppError> {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO public.admin (email, name, password_hash, role) VALUES ($1, $2, $3, 'superadmin') \
         ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, password_hash = EXCLUDED.password_hash, \
         role = 'superadmin', updated_at = NOW() RETURNING id",
    )
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Hard-delete a gym row, including soft-deleted ones. Returns whether a row was removed.
pub async fn delete_gym_row(conn: &mut PgConnection, gym_id: Uuid) -> Result<bool, AppError> {
    let done = sqlx::query("DELETE FROM public.gym WHERE id = $1")
        .bind(gym_id)
        .execute(&mut *conn)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Gym by slug regardless of deletion state, for cleanup.
pub async fn find_gym_any_state(pool: &PgPool, slug: &str) -> Result<Option<TenantEntry>, AppError> {
    let row = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, slug, schema_name FROM public.gym WHERE slug = $1 ORDER BY deleted_at NULLS FIRST LIMIT 1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    row.map(|(gym_id, slug, schema_name)| {
        Ok(TenantEntry {
            gym_id,
            slug,
            schema: crate::tenant::SchemaName::parse(&schema_name)?,
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintenance_url_keeps_server_and_options() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@db:5432/gymhub?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@db:5432/postgres?sslmode=disable");
        assert_eq!(db, "gymhub");
    }

    #[test]
    fn url_without_database_is_rejected() {
        assert!(parse_db_name_from_url("postgres://u@db:5432").is_err());
        let (_, db) = parse_db_name_from_url("postgres://u@db/").unwrap();
        assert_eq!(db, "");
    }

    #[test]
    fn identifiers_double_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
