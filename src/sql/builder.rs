//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resolved entity.
//! Identifiers come from the catalogue or a validated [`SchemaName`]; values are always bound.

use crate::config::{LinkFilterSpec, ResolvedEntity, TargetSpec, CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::sql::PgBindValue;
use crate::tenant::SchemaName;
use serde_json::Value;
use std::collections::HashMap;

const MAIN_ALIAS: &str = "main";
pub const MAX_LIMIT: u32 = 1000;

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &SchemaName, table: &str) -> String {
    format!("{}.{}", quoted(schema.as_str()), quoted(table))
}

fn placeholder(n: u32, pg_type: Option<&str>) -> String {
    match pg_type {
        Some(t) => format!("${}::{}", n, t),
        None => format!("${}", n),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }

    fn push_json(&mut self, v: &Value, pg_type: Option<&str>) -> u32 {
        self.push_param(PgBindValue::from_json(v, pg_type))
    }
}

/// A list filter on rows linked through a join table to any of `ids`.
pub struct LinkFilter<'a> {
    pub spec: &'a LinkFilterSpec,
    pub ids: Vec<String>,
}

/// SELECT list: every column except sensitive ones; numeric as text so it decodes as a string.
fn select_column_list(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .filter(|c| !entity.sensitive_columns.contains(&c.name))
        .map(|c| {
            let col = match alias {
                Some(a) => format!("{}.{}", a, quoted(&c.name)),
                None => quoted(&c.name),
            };
            if c.pg_type.as_deref() == Some("numeric") {
                format!("{}::text AS {}", col, quoted(&c.name))
            } else if alias.is_some() {
                format!("{} AS {}", col, quoted(&c.name))
            } else {
                col
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn pk_type(entity: &ResolvedEntity) -> Option<&str> {
    entity.column(&entity.pk_column).and_then(|c| c.pg_type.as_deref())
}

fn pk_placeholder(entity: &ResolvedEntity, n: u32) -> String {
    placeholder(n, pk_type(entity))
}

fn live_only(entity: &ResolvedEntity) -> String {
    if entity.soft_delete {
        format!(" AND {} IS NULL", quoted(DELETED_AT))
    } else {
        String::new()
    }
}

/// SELECT one live row by primary key.
pub fn select_by_id(entity: &ResolvedEntity, schema: &SchemaName, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_json(id, pk_type(entity));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}{}",
        select_column_list(entity, None),
        qualified_table(schema, &entity.table_name),
        quoted(&entity.pk_column),
        pk_placeholder(entity, n),
        live_only(entity)
    );
    q
}

/// SELECT list with exact-match column filters, link filters, ORDER BY the entity's order columns,
/// optional LIMIT/OFFSET. Filters on unknown columns are ignored.
pub fn select_list(
    entity: &ResolvedEntity,
    schema: &SchemaName,
    filters: &[(String, Value)],
    links: &[LinkFilter<'_>],
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &entity.table_name);

    let mut where_parts = Vec::new();
    if entity.soft_delete {
        where_parts.push(format!("{}.{} IS NULL", MAIN_ALIAS, quoted(DELETED_AT)));
    }
    for (col, val) in filters {
        let Some(c) = entity.column(col) else { continue };
        if entity.sensitive_columns.contains(col) {
            continue;
        }
        let n = q.push_json(val, c.pg_type.as_deref());
        where_parts.push(format!(
            "{}.{} = {}",
            MAIN_ALIAS,
            quoted(col),
            placeholder(n, c.pg_type.as_deref())
        ));
    }
    for link in links {
        let n = q.push_param(PgBindValue::TextArray(link.ids.clone()));
        where_parts.push(format!(
            "EXISTS (SELECT 1 FROM {} l WHERE l.{} = {}.{} AND l.{} = ANY(${}::uuid[]))",
            qualified_table(schema, &link.spec.table),
            quoted(&link.spec.local_column),
            MAIN_ALIAS,
            quoted(&entity.pk_column),
            quoted(&link.spec.match_column),
            n
        ));
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let mut order: Vec<String> = entity
        .order_by
        .iter()
        .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(c)))
        .collect();
    if !entity.order_by.contains(&entity.pk_column) {
        order.push(format!("{}.{}", MAIN_ALIAS, quoted(&entity.pk_column)));
    }
    let limit_clause = limit
        .map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT)))
        .unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}{}{}",
        select_column_list(entity, Some(MAIN_ALIAS)),
        table,
        MAIN_ALIAS,
        where_clause,
        order.join(", "),
        limit_clause,
        offset_clause
    );
    q
}

/// INSERT only the columns present in the body, so the database fills defaults.
/// Timestamps and `deleted_at` are never taken from the body.
pub fn insert(entity: &ResolvedEntity, schema: &SchemaName, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &entity.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if [CREATED_AT, UPDATED_AT, DELETED_AT].contains(&c.name.as_str()) {
            continue;
        }
        let Some(val) = body.get(&c.name) else { continue };
        let n = q.push_json(val, c.pg_type.as_deref());
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(n, c.pg_type.as_deref()));
    }
    let returning = select_column_list(entity, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE a live row by id: SET only mutable columns present in body, and always `updated_at = NOW()`.
pub fn update(
    entity: &ResolvedEntity,
    schema: &SchemaName,
    id: &Value,
    body: &HashMap<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &entity.table_name);
    let mut sets = Vec::new();
    // Iterate columns, not the body, so parameter order is deterministic.
    for c in &entity.columns {
        if entity.immutable_columns.contains(&c.name) {
            continue;
        }
        let Some(v) = body.get(&c.name) else { continue };
        let n = q.push_json(v, c.pg_type.as_deref());
        sets.push(format!("{} = {}", quoted(&c.name), placeholder(n, c.pg_type.as_deref())));
    }
    sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    let id_param = q.push_json(id, pk_type(entity));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}{} RETURNING {}",
        table,
        sets.join(", "),
        quoted(&entity.pk_column),
        pk_placeholder(entity, id_param),
        live_only(entity),
        select_column_list(entity, None)
    );
    q
}

/// DELETE by id, or mark `deleted_at` for soft-delete entities. Returns the key when a row matched.
pub fn delete(entity: &ResolvedEntity, schema: &SchemaName, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &entity.table_name);
    let pk = quoted(&entity.pk_column);
    let n = q.push_json(id, pk_type(entity));
    q.sql = if entity.soft_delete {
        format!(
            "UPDATE {} SET {} = NOW(), {} = NOW() WHERE {} = {}{} RETURNING {}",
            table,
            quoted(DELETED_AT),
            quoted(UPDATED_AT),
            pk,
            pk_placeholder(entity, n),
            live_only(entity),
            pk
        )
    } else {
        format!(
            "DELETE FROM {} WHERE {} = {} RETURNING {}",
            table,
            pk,
            pk_placeholder(entity, n),
            pk
        )
    };
    q
}

/// SELECT EXISTS for a live row in `target` whose key column equals `value`.
pub fn exists(target: &TargetSpec, schema: &SchemaName, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_json(value, target.pg_type.as_deref());
    let live = if target.soft_delete {
        format!(" AND {} IS NULL", quoted(DELETED_AT))
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = {}{})",
        qualified_table(schema, &target.table),
        quoted(&target.column),
        placeholder(n, target.pg_type.as_deref()),
        live
    );
    q
}
