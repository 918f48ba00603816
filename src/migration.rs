//! Render catalogue DDL into a target schema and apply it.
//! Order follows PostgreSQL dependencies: schema, tables (catalogue order), indexes.
//! Every statement is idempotent so `setup-db` and tenant provisioning can rerun safely.

use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::AppError;
use crate::tenant::SchemaName;
use sqlx::{PgConnection, PgPool};

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified(schema: &SchemaName, table: &str) -> String {
    format!("{}.{}", quote(schema.as_str()), quote(table))
}

fn type_str(ty: &ColumnTypeConfig) -> String {
    match ty {
        ColumnTypeConfig::Simple(s) => s.clone(),
        ColumnTypeConfig::Parameterized { name, params } => {
            let p = params
                .as_ref()
                .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            if p.is_empty() {
                name.clone()
            } else {
                format!("{}({})", name, p)
            }
        }
    }
}

fn unique_name(table: &str, cols: &[String]) -> String {
    format!("{}_{}_key", table, cols.join("_"))
}

fn column_def(c: &ColumnConfig, schema: &SchemaName) -> String {
    let mut def = format!("{} {}", quote(&c.name), type_str(&c.type_));
    if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(ref d) = c.default {
        def.push_str(" DEFAULT ");
        match d {
            ColumnDefaultConfig::Literal(s) => def.push_str(s),
            ColumnDefaultConfig::Expression { expression } => def.push_str(expression),
        }
    }
    if let Some(fk) = &c.references {
        def.push_str(&format!(
            " REFERENCES {} ({})",
            qualified(schema, &fk.table),
            quote(&fk.column)
        ));
        if let Some(action) = &fk.on_delete {
            def.push_str(" ON DELETE ");
            def.push_str(action);
        }
    }
    def
}

/// CREATE TABLE plus the partial unique indexes of soft-delete tables.
pub fn table_ddl(t: &TableConfig, schema: &SchemaName) -> Vec<String> {
    let full_name = qualified(schema, &t.name);
    let mut col_defs: Vec<String> = t.columns.iter().map(|c| column_def(c, schema)).collect();
    for sc in t.system_columns() {
        col_defs.push(format!("{} {}", quote(sc.name), sc.ddl));
    }
    col_defs.push(format!("PRIMARY KEY ({})", quote(&t.primary_key)));

    let mut after = Vec::new();
    for u in &t.unique {
        let cols: Vec<String> = u.iter().map(|s| quote(s)).collect();
        let name = quote(&unique_name(&t.name, u));
        if t.soft_delete {
            // Deleted rows must not block reuse of their values.
            after.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({}) WHERE {} IS NULL",
                name,
                full_name,
                cols.join(", "),
                quote(DELETED_AT)
            ));
        } else {
            col_defs.push(format!("CONSTRAINT {} UNIQUE ({})", name, cols.join(", ")));
        }
    }
    for ch in &t.check {
        col_defs.push(format!("CONSTRAINT {} CHECK ({})", quote(&ch.name), ch.expression));
    }

    let mut out = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        full_name,
        col_defs.join(",\n  ")
    )];
    out.extend(after);
    if let Some(comment) = &t.comment {
        out.push(format!(
            "COMMENT ON TABLE {} IS '{}'",
            full_name,
            comment.replace('\'', "''")
        ));
    }
    out
}

pub fn index_ddl(idx: &IndexConfig, schema: &SchemaName) -> String {
    let mut col_parts: Vec<String> = Vec::new();
    for col in &idx.columns {
        match col {
            IndexColumnEntry::Name(n) => col_parts.push(quote(n)),
            IndexColumnEntry::Spec { name, direction } => {
                let dir = direction
                    .as_deref()
                    .map(|d| format!(" {}", d.to_uppercase()))
                    .unwrap_or_default();
                col_parts.push(format!("{}{}", quote(name), dir));
            }
            IndexColumnEntry::Expression { expression } => col_parts.push(expression.clone()),
        }
    }
    let method = idx.method.as_deref().unwrap_or("btree");
    let unique = if idx.unique { "UNIQUE " } else { "" };
    let where_clause: String = idx
        .where_
        .as_ref()
        .map(|w| format!(" WHERE {}", w))
        .unwrap_or_default();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} USING {} ({}){}",
        unique,
        quote(&idx.name),
        qualified(schema, &idx.table),
        method,
        col_parts.join(", "),
        where_clause
    )
}

/// Every statement needed to bring `schema` up to the catalogue, in execution order.
pub fn render_catalog(catalog: &CatalogConfig, schema: &SchemaName) -> Vec<String> {
    let mut stmts = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema.as_str()))];
    for t in &catalog.tables {
        stmts.extend(table_ddl(t, schema));
    }
    for idx in &catalog.indexes {
        stmts.push(index_ddl(idx, schema));
    }
    stmts
}

/// Apply one scope's catalogue to `schema` on an open connection (or transaction).
pub async fn apply_catalog(
    conn: &mut PgConnection,
    catalog: &CatalogConfig,
    schema: &SchemaName,
) -> Result<(), AppError> {
    for sql in render_catalog(catalog, schema) {
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Validate the catalogue and apply the public scope to `public` in one transaction.
pub async fn apply_migrations(pool: &PgPool, config: &FullConfig) -> Result<(), AppError> {
    validate(config)?;
    let mut tx = pool.begin().await?;
    apply_catalog(&mut tx, &config.public, &SchemaName::public()).await?;
    tx.commit().await?;
    tracing::info!(tables = config.public.tables.len(), "public schema migrated");
    Ok(())
}
